use std::io::{self, Write};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::Notifier;
use crate::event::CanonicalEvent;

/// Writes one `NOTIFY:` line per event to the wrapped writer.
pub struct ConsoleNotifier<W = io::Stdout> {
    writer: Mutex<W>,
}

impl ConsoleNotifier<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleNotifier<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

#[async_trait]
impl<W: Write + Send> Notifier for ConsoleNotifier<W> {
    async fn notify(&self, event: &CanonicalEvent) -> Result<()> {
        let mut writer = self.writer.lock().expect("console writer mutex poisoned");
        writeln!(writer, "NOTIFY: {event}").context("writing notification line")?;
        Ok(())
    }
}
