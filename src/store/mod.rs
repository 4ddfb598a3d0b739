//! Accounts, their poll state, and the store the poller talks to.

pub mod file;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filter::Filter;

pub use file::FileStore;

/// A feed to watch, together with its per-account poll state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    /// Login whose received-events feed we poll.
    pub handle: String,
    /// Watermark: `created_at` of the newest event ever observed.
    /// `None` means nothing has been observed yet.
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Earliest instant the next poll is allowed to run.
    #[serde(default)]
    pub next_poll_at: Option<DateTime<Utc>>,
    /// Policy when no filter matches an event: discard it or keep it.
    #[serde(default)]
    pub default_discard: bool,
}

impl Account {
    /// An account with no scheduled next poll is always due.
    pub fn due(&self, now: DateTime<Utc>) -> bool {
        self.next_poll_at.map_or(true, |next| now >= next)
    }
}

/// The durable slice of an [`Account`], persisted after every poll that
/// yielded events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollState {
    pub last_seen_at: Option<DateTime<Utc>>,
    pub next_poll_at: Option<DateTime<Utc>>,
}

/// Everything the poller needs from persistent storage.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn list_accounts(&self) -> anyhow::Result<Vec<Account>>;

    /// Ordered filters for one account; earlier filters take precedence.
    async fn list_filters(&self, account_id: i64) -> anyhow::Result<Vec<Filter>>;

    /// Records the outcome of a poll: the new watermark and when the
    /// account may next be polled. Must be durable before any dispatch.
    async fn record_poll_result(
        &self,
        account_id: i64,
        last_seen_at: DateTime<Utc>,
        next_poll_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;
}
