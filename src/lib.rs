// src/lib.rs
// Public library surface for the daemon binary and integration tests.

pub mod config;
pub mod error;
pub mod event;
pub mod feed;
pub mod filter;
pub mod notify;
pub mod poller;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::config::Config;
pub use crate::error::PollError;
pub use crate::event::{normalize, CanonicalEvent, EventPayload, RawEvent};
pub use crate::feed::{list_new_events, EventFeed, FeedPage, GitHubFeed};
pub use crate::filter::{evaluate, Condition, Filter};
pub use crate::notify::{Notifier, NotifierMux};
pub use crate::poller::{CycleSummary, Poller, MAX_CONSECUTIVE_FAILURES};
pub use crate::store::{Account, AccountStore, FileStore, PollState};
