//! File-backed store: accounts and filters come from a TOML document,
//! poll state lives in a small JSON file that is rewritten after every
//! recorded poll.
//!
//! The accounts document is read once at startup. Poll state is keyed by
//! account id, so edits to the document keep each account's watermark as
//! long as its id is stable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::fs;
use tokio::sync::Mutex;

use crate::filter::{Filter, FilterSpec};
use crate::store::{Account, AccountStore, PollState};

#[derive(Debug, Default, Deserialize)]
struct AccountsDoc {
    #[serde(default)]
    accounts: Vec<AccountEntry>,
}

#[derive(Debug, Deserialize)]
struct AccountEntry {
    id: i64,
    handle: String,
    #[serde(default)]
    default_discard: bool,
    #[serde(default)]
    filters: Vec<FilterSpec>,
}

pub struct FileStore {
    accounts: Vec<Account>,
    filters: HashMap<i64, Vec<Filter>>,
    state_path: PathBuf,
    state: Mutex<HashMap<i64, PollState>>,
}

impl FileStore {
    /// Loads the accounts document, compiles its filters and merges in
    /// whatever poll state survives at `state_path`. A missing or corrupt
    /// state file starts from scratch; a broken accounts document or an
    /// uncompilable filter is fatal.
    pub async fn open(accounts_path: &Path, state_path: &Path) -> Result<Self> {
        let text = fs::read_to_string(accounts_path)
            .await
            .with_context(|| format!("reading accounts from {}", accounts_path.display()))?;
        let doc: AccountsDoc = toml::from_str(&text).context("parsing the accounts document")?;

        let mut accounts = Vec::with_capacity(doc.accounts.len());
        let mut filters = HashMap::new();
        for entry in doc.accounts {
            let compiled = entry
                .filters
                .iter()
                .map(FilterSpec::compile)
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("filters of account {} ({})", entry.id, entry.handle))?;
            filters.insert(entry.id, compiled);
            accounts.push(Account {
                id: entry.id,
                handle: entry.handle,
                last_seen_at: None,
                next_poll_at: None,
                default_discard: entry.default_discard,
            });
        }

        let state = read_state(state_path).await;
        Ok(Self {
            accounts,
            filters,
            state_path: state_path.to_path_buf(),
            state: Mutex::new(state),
        })
    }
}

async fn read_state(path: &Path) -> HashMap<i64, PollState> {
    match fs::read_to_string(path).await {
        Ok(s) => serde_json::from_str(&s).unwrap_or_default(),
        Err(_) => HashMap::new(),
    }
}

#[async_trait]
impl AccountStore for FileStore {
    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let state = self.state.lock().await;
        Ok(self
            .accounts
            .iter()
            .map(|account| {
                let mut account = account.clone();
                if let Some(s) = state.get(&account.id) {
                    account.last_seen_at = s.last_seen_at;
                    account.next_poll_at = s.next_poll_at;
                }
                account
            })
            .collect())
    }

    async fn list_filters(&self, account_id: i64) -> Result<Vec<Filter>> {
        Ok(self.filters.get(&account_id).cloned().unwrap_or_default())
    }

    async fn record_poll_result(
        &self,
        account_id: i64,
        last_seen_at: DateTime<Utc>,
        next_poll_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let entry = state.entry(account_id).or_default();
        // The watermark never moves backwards.
        match entry.last_seen_at {
            Some(seen) if seen > last_seen_at => {}
            _ => entry.last_seen_at = Some(last_seen_at),
        }
        entry.next_poll_at = Some(next_poll_at);

        let body = serde_json::to_vec_pretty(&*state).context("encoding poll state")?;
        if let Some(dir) = self
            .state_path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
        {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        fs::write(&self.state_path, body)
            .await
            .with_context(|| format!("writing poll state to {}", self.state_path.display()))?;
        Ok(())
    }
}
