//! The poll scheduler: walks due accounts, fetches their unseen events,
//! applies the account's filters and dispatches what survives.
//!
//! Ordering is the whole point of `poll_account`: the new watermark is
//! persisted before anything is dispatched, so a crash mid-dispatch can
//! only lose notifications, never repeat them.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::PollError;
use crate::event::normalize;
use crate::feed::{self, EventFeed};
use crate::filter;
use crate::notify::Notifier;
use crate::store::{Account, AccountStore};

/// Consecutive account failures tolerated before a cycle aborts.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Floor for an account's first poll. Without it a fresh account would
/// replay its entire reachable history; `DELIVER_BACKLOG=1` asks for
/// exactly that replay.
fn backlog_floor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 6, 30, 0, 0, 0).unwrap()
}

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("poll_cycles_total", "Completed poll cycles.");
        describe_counter!("poll_accounts_polled_total", "Accounts polled to completion.");
        describe_counter!(
            "poll_accounts_skipped_total",
            "Accounts skipped because their next poll is still in the future."
        );
        describe_counter!("poll_account_errors_total", "Account polls that failed.");
        describe_counter!("events_fetched_total", "Raw events fetched past the watermark.");
        describe_counter!(
            "events_delivered_total",
            "Events that survived filtering and reached the sinks."
        );
        describe_counter!("events_discarded_total", "Events dropped by filter verdicts.");
        describe_gauge!("poll_cycle_last_run_ts", "Unix ts when the last poll cycle ran.");
        describe_histogram!("feed_page_fetch_ms", "Feed page fetch time in milliseconds.");
    });
}

/// What one cycle did, for logs and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub accounts_polled: usize,
    pub accounts_skipped: usize,
    pub accounts_failed: usize,
    pub events_fetched: usize,
    pub events_delivered: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct AccountOutcome {
    fetched: usize,
    delivered: usize,
    discarded: usize,
}

pub struct Poller {
    store: Arc<dyn AccountStore>,
    feed: Arc<dyn EventFeed>,
    notifier: Arc<dyn Notifier>,
    config: Config,
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(
        store: Arc<dyn AccountStore>,
        feed: Arc<dyn EventFeed>,
        notifier: Arc<dyn Notifier>,
        config: Config,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            feed,
            notifier,
            config,
            cancel,
        }
    }

    /// Ticks forever, running one cycle per tick, until cancelled.
    pub async fn run(&self, interval: std::time::Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("poller stopping");
                    return;
                }
                _ = ticker.tick() => {}
            }

            match self.run_cycle(Utc::now()).await {
                Ok(summary) => tracing::debug!(
                    polled = summary.accounts_polled,
                    skipped = summary.accounts_skipped,
                    failed = summary.accounts_failed,
                    delivered = summary.events_delivered,
                    "poll cycle finished"
                ),
                Err(err) => tracing::error!(error = ?err, "poll cycle aborted"),
            }
        }
    }

    /// Polls every due account once, isolating their failures from each
    /// other. Aborts only when the store itself fails, when too many
    /// accounts fail back-to-back, or on cancellation.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleSummary, PollError> {
        ensure_metrics_described();

        let accounts = self
            .store
            .list_accounts()
            .await
            .map_err(|source| PollError::Persistence { source })?;

        let mut summary = CycleSummary::default();
        let mut consecutive_failures = 0u32;

        for account in &accounts {
            if self.cancel.is_cancelled() {
                tracing::info!("cycle interrupted by shutdown");
                break;
            }
            if !account.due(now) {
                tracing::debug!(account = account.id, handle = %account.handle, "not due yet");
                counter!("poll_accounts_skipped_total").increment(1);
                summary.accounts_skipped += 1;
                continue;
            }

            match self.poll_account(now, account).await {
                Ok(outcome) => {
                    consecutive_failures = 0;
                    counter!("poll_accounts_polled_total").increment(1);
                    summary.accounts_polled += 1;
                    summary.events_fetched += outcome.fetched;
                    summary.events_delivered += outcome.delivered;
                    if outcome.fetched > 0 {
                        tracing::info!(
                            account = account.id,
                            handle = %account.handle,
                            fetched = outcome.fetched,
                            delivered = outcome.delivered,
                            discarded = outcome.discarded,
                            "account polled"
                        );
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        account = account.id,
                        handle = %account.handle,
                        error = ?err,
                        "account poll failed"
                    );
                    counter!("poll_account_errors_total").increment(1);
                    summary.accounts_failed += 1;
                    consecutive_failures += 1;
                    if consecutive_failures > MAX_CONSECUTIVE_FAILURES {
                        return Err(PollError::CircuitOpen {
                            failures: consecutive_failures,
                        });
                    }
                }
            }
        }

        counter!("poll_cycles_total").increment(1);
        gauge!("poll_cycle_last_run_ts").set(now.timestamp() as f64);
        Ok(summary)
    }

    async fn poll_account(
        &self,
        now: DateTime<Utc>,
        account: &Account,
    ) -> Result<AccountOutcome, PollError> {
        let watermark = match account.last_seen_at {
            Some(seen) => Some(seen),
            None if self.config.deliver_backlog => None,
            None => Some(backlog_floor()),
        };

        let filters = self
            .store
            .list_filters(account.id)
            .await
            .map_err(|source| PollError::Persistence { source })?;

        let (raw_events, poll_interval) =
            feed::list_new_events(self.feed.as_ref(), &account.handle, watermark).await?;
        counter!("events_fetched_total").increment(raw_events.len() as u64);

        let mut outcome = AccountOutcome {
            fetched: raw_events.len(),
            ..Default::default()
        };
        let Some(newest) = raw_events.first() else {
            tracing::debug!(handle = %account.handle, "no new events");
            return Ok(outcome);
        };
        // Newest first, so the first event carries the new watermark.
        let last_seen_at = newest.created_at;

        let mut events = Vec::with_capacity(raw_events.len());
        for raw in raw_events {
            events.push(normalize(raw)?);
        }

        // Persist before dispatching: a crash between the two loses
        // notifications instead of repeating them.
        let next_poll_at = now + chrono::Duration::seconds(poll_interval.as_secs() as i64);
        self.store
            .record_poll_result(account.id, last_seen_at, next_poll_at)
            .await
            .map_err(|source| PollError::Persistence { source })?;

        filter::apply_verdicts(&mut events, &filters, account.default_discard);
        outcome.discarded = events.iter().filter(|e| !e.kept()).count();
        counter!("events_discarded_total").increment(outcome.discarded as u64);

        for event in events.iter().filter(|e| e.kept()) {
            self.notifier
                .notify(event)
                .await
                .map_err(|source| PollError::Dispatch { source })?;
            counter!("events_delivered_total").increment(1);
            outcome.delivered += 1;
        }

        Ok(outcome)
    }
}
