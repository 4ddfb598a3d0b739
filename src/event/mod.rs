//! Event model: raw feed entries and their canonical form.

pub mod normalize;
pub mod raw;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

pub use normalize::normalize;
pub use raw::{EventPayload, RawEvent};

/// A normalized event, ready for rule evaluation and dispatch.
///
/// The semantic fields (`actor`, `action`, `subject`, `title`, `body`) are
/// derived renderings; rules match against `payload` and `raw`, so the
/// outcome does not depend on how we phrase a title.
#[derive(Debug, Clone)]
pub struct CanonicalEvent {
    pub kind: String,
    pub public: bool,
    pub created_at: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub subject: String,
    pub title: String,
    pub body: String,
    pub payload: EventPayload,
    /// The event as the feed delivered it, shared rather than copied so a
    /// later re-evaluation sees identical input.
    pub raw: Arc<RawEvent>,
    /// `None` until the rules have run, then the verdict.
    pub discarded: Option<bool>,
}

impl CanonicalEvent {
    /// True once the rules have run and decided to keep the event.
    pub fn kept(&self) -> bool {
        self.discarded == Some(false)
    }
}

impl fmt::Display for CanonicalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.title.is_empty() {
            write!(f, "[{}] {}", self.kind, self.raw.id)
        } else {
            f.write_str(&self.title)
        }
    }
}
