//! Incremental feed reading.
//!
//! [`list_new_events`] pages through an account's reverse-chronological
//! feed and collects everything newer than the watermark. The walk stops
//! at the first already-observed event, so in the common case a single
//! page request covers a whole poll.

pub mod github;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::PollError;
use crate::event::RawEvent;

pub use github::{GitHubFeed, DEFAULT_API_URL};

/// Delay until the next poll when the feed does not recommend one.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// One page of an account's feed, newest event first.
#[derive(Debug, Clone, Default)]
pub struct FeedPage {
    pub events: Vec<RawEvent>,
    pub next_page: Option<u32>,
    /// Verbatim poll-interval hint, when the feed sent one.
    pub poll_interval: Option<String>,
}

/// A paginated, reverse-chronological event feed.
#[async_trait]
pub trait EventFeed: Send + Sync {
    async fn received_events(&self, handle: &str, page: u32) -> anyhow::Result<FeedPage>;
}

/// Walks `handle`'s feed up to the watermark and returns the unseen
/// events, newest first, plus the feed's recommended delay until the
/// next poll.
///
/// An event stamped exactly at the watermark counts as observed: if two
/// events share a second across a poll boundary we drop one rather than
/// deliver it twice.
pub async fn list_new_events(
    feed: &dyn EventFeed,
    handle: &str,
    watermark: Option<DateTime<Utc>>,
) -> Result<(Vec<RawEvent>, Duration), PollError> {
    let mut events = Vec::new();
    let mut poll_interval = DEFAULT_POLL_INTERVAL;
    let mut page = 1;

    'pages: loop {
        debug!(handle, page, "fetching feed page");
        let fetched = feed
            .received_events(handle, page)
            .await
            .map_err(|source| PollError::Fetch {
                handle: handle.to_owned(),
                source,
            })?;

        // The hint may change between pages; the last one seen wins.
        if let Some(value) = fetched.poll_interval.as_deref() {
            poll_interval = parse_poll_interval(value)?;
        }

        for event in fetched.events {
            if have_observed(watermark, event.created_at) {
                break 'pages;
            }
            events.push(event);
        }

        match fetched.next_page {
            Some(next) => page = next,
            None => break,
        }
    }

    Ok((events, poll_interval))
}

// --- internals ---

fn have_observed(watermark: Option<DateTime<Utc>>, created_at: DateTime<Utc>) -> bool {
    matches!(watermark, Some(seen) if created_at <= seen)
}

/// The hint is whole seconds on the wire and must fit 32 bits.
fn parse_poll_interval(value: &str) -> Result<Duration, PollError> {
    let secs = value
        .trim()
        .parse::<u32>()
        .map_err(|source| PollError::Protocol {
            value: value.to_owned(),
            source,
        })?;
    Ok(Duration::from_secs(u64::from(secs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct ScriptedFeed {
        pages: Vec<FeedPage>,
        requests: Mutex<Vec<u32>>,
        fail: bool,
    }

    impl ScriptedFeed {
        fn new(pages: Vec<FeedPage>) -> Self {
            Self {
                pages,
                requests: Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl EventFeed for ScriptedFeed {
        async fn received_events(&self, _handle: &str, page: u32) -> anyhow::Result<FeedPage> {
            self.requests.lock().unwrap().push(page);
            if self.fail {
                anyhow::bail!("connection reset");
            }
            self.pages
                .get(page as usize - 1)
                .cloned()
                .context("page out of range")
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn ev(id: &str, secs: i64) -> RawEvent {
        RawEvent {
            id: id.into(),
            kind: "WatchEvent".into(),
            actor: None,
            repo: None,
            org: None,
            public: true,
            created_at: at(secs),
            payload: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn stops_at_the_watermark_within_a_page() {
        let feed = ScriptedFeed::new(vec![FeedPage {
            events: vec![ev("d", 3), ev("c", 2), ev("b", 1), ev("a", 0)],
            next_page: Some(2),
            poll_interval: None,
        }]);

        let (events, _) = list_new_events(&feed, "octocat", Some(at(0))).await.unwrap();

        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["d", "c", "b"]);
        // boundary hit, the advertised second page is never requested
        assert_eq!(*feed.requests.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn an_event_at_the_exact_watermark_is_treated_as_observed() {
        let feed = ScriptedFeed::new(vec![FeedPage {
            events: vec![ev("new", 10), ev("tied", 0)],
            next_page: None,
            poll_interval: None,
        }]);

        let (events, _) = list_new_events(&feed, "octocat", Some(at(0))).await.unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "new");
    }

    #[tokio::test]
    async fn without_a_watermark_the_whole_feed_is_walked() {
        let feed = ScriptedFeed::new(vec![
            FeedPage {
                events: vec![ev("c", 20), ev("b", 10)],
                next_page: Some(2),
                poll_interval: None,
            },
            FeedPage {
                events: vec![ev("a", 0)],
                next_page: None,
                poll_interval: None,
            },
        ]);

        let (events, interval) = list_new_events(&feed, "octocat", None).await.unwrap();

        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["c", "b", "a"]);
        assert_eq!(*feed.requests.lock().unwrap(), vec![1, 2]);
        assert_eq!(interval, DEFAULT_POLL_INTERVAL);
    }

    #[tokio::test]
    async fn last_poll_interval_hint_wins() {
        let feed = ScriptedFeed::new(vec![
            FeedPage {
                events: vec![ev("b", 10)],
                next_page: Some(2),
                poll_interval: Some("30".into()),
            },
            FeedPage {
                events: vec![ev("a", 0)],
                next_page: None,
                poll_interval: Some("120".into()),
            },
        ]);

        let (_, interval) = list_new_events(&feed, "octocat", None).await.unwrap();
        assert_eq!(interval, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn garbled_poll_interval_is_a_protocol_error() {
        let feed = ScriptedFeed::new(vec![FeedPage {
            events: vec![ev("a", 0)],
            next_page: None,
            poll_interval: Some("soon".into()),
        }]);

        let err = list_new_events(&feed, "octocat", None).await.unwrap_err();
        assert!(matches!(err, PollError::Protocol { ref value, .. } if value == "soon"));
    }

    #[tokio::test]
    async fn transport_failures_name_the_account() {
        let feed = ScriptedFeed {
            fail: true,
            ..ScriptedFeed::new(vec![])
        };

        let err = list_new_events(&feed, "octocat", None).await.unwrap_err();
        assert!(matches!(err, PollError::Fetch { ref handle, .. } if handle == "octocat"));
    }
}
