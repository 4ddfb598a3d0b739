//! Environment-driven configuration for the poller daemon.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// TOML document with the accounts and their filters.
    pub accounts_path: PathBuf,
    /// JSON file the poll state is persisted to.
    pub state_path: PathBuf,
    /// Delay between scheduler ticks.
    pub tick_interval: Duration,
    /// First poll delivers the whole reachable history instead of
    /// starting at the backlog floor.
    pub deliver_backlog: bool,
    pub github_api_url: String,
    pub github_token: Option<String>,
    /// Prometheus exporter listen address; unset disables the exporter.
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accounts_path: PathBuf::from("config/accounts.toml"),
            state_path: PathBuf::from("state/poll_state.json"),
            tick_interval: Duration::from_secs(60),
            deliver_backlog: false,
            github_api_url: crate::feed::DEFAULT_API_URL.to_string(),
            github_token: None,
            metrics_addr: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            accounts_path: std::env::var("ACCOUNTS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.accounts_path),
            state_path: std::env::var("STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_path),
            tick_interval: Duration::from_secs(
                std::env::var("POLL_TICK_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60),
            ),
            deliver_backlog: env_flag("DELIVER_BACKLOG"),
            github_api_url: std::env::var("GITHUB_API_URL").unwrap_or(defaults.github_api_url),
            github_token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            metrics_addr: std::env::var("METRICS_ADDR")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
