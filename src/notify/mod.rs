//! Notification sinks.
//!
//! Every kept event goes through [`Notifier::notify`]. The mux fans an
//! event out to each configured sink in order and fails fast: a sink
//! error stops the fan-out, and the poller abandons the account's
//! remaining dispatches for this cycle.

pub mod console;
pub mod email;
pub mod webhook;

use anyhow::Result;
use async_trait::async_trait;

use crate::event::CanonicalEvent;

pub use console::ConsoleNotifier;
pub use email::EmailNotifier;
pub use webhook::WebhookNotifier;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &CanonicalEvent) -> Result<()>;
}

/// Fans one event out to every configured sink, in order.
#[derive(Default)]
pub struct NotifierMux {
    sinks: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn Notifier>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl Notifier for NotifierMux {
    async fn notify(&self, event: &CanonicalEvent) -> Result<()> {
        for sink in &self.sinks {
            sink.notify(event).await?;
        }
        Ok(())
    }
}
