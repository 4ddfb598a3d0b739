// tests/file_store.rs
use chrono::{DateTime, TimeZone, Utc};
use std::fs;
use std::path::Path;

use feedsift::store::{AccountStore, FileStore};

const ACCOUNTS_TOML: &str = r#"
[[accounts]]
id = 1
handle = "octocat"
default_discard = true

[[accounts.filters]]
discard = false

[[accounts.filters.conditions]]
kind = "IssuesEvent"
action = "opened"

[[accounts.filters]]
discard = true

[[accounts]]
id = 2
handle = "hubot"
"#;

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

async fn open(dir: &Path) -> FileStore {
    FileStore::open(&dir.join("accounts.toml"), &dir.join("state.json"))
        .await
        .unwrap()
}

#[tokio::test]
async fn loads_accounts_and_compiles_their_filters() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("accounts.toml"), ACCOUNTS_TOML).unwrap();

    let store = open(dir.path()).await;

    let accounts = store.list_accounts().await.unwrap();
    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[0].handle, "octocat");
    assert!(accounts[0].default_discard);
    assert!(accounts[0].last_seen_at.is_none());
    assert!(!accounts[1].default_discard);

    let filters = store.list_filters(1).await.unwrap();
    assert_eq!(filters.len(), 2);
    assert!(!filters[0].discard);
    assert_eq!(filters[0].conditions[0].kind.as_deref(), Some("IssuesEvent"));
    assert!(filters[1].discard);
    assert!(filters[1].conditions.is_empty());

    // accounts without filters, and unknown ids, come back empty
    assert!(store.list_filters(2).await.unwrap().is_empty());
    assert!(store.list_filters(99).await.unwrap().is_empty());
}

#[tokio::test]
async fn poll_results_survive_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("accounts.toml"), ACCOUNTS_TOML).unwrap();

    {
        let store = open(dir.path()).await;
        store.record_poll_result(1, at(100), at(160)).await.unwrap();
    }

    let store = open(dir.path()).await;
    let accounts = store.list_accounts().await.unwrap();
    assert_eq!(accounts[0].last_seen_at, Some(at(100)));
    assert_eq!(accounts[0].next_poll_at, Some(at(160)));
    // the other account is untouched
    assert!(accounts[1].last_seen_at.is_none());
}

#[tokio::test]
async fn the_watermark_never_regresses() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("accounts.toml"), ACCOUNTS_TOML).unwrap();

    let store = open(dir.path()).await;
    store.record_poll_result(1, at(100), at(160)).await.unwrap();
    store.record_poll_result(1, at(50), at(200)).await.unwrap();

    let accounts = store.list_accounts().await.unwrap();
    assert_eq!(accounts[0].last_seen_at, Some(at(100)));
    // the schedule still moves
    assert_eq!(accounts[0].next_poll_at, Some(at(200)));
}

#[tokio::test]
async fn a_corrupt_state_file_starts_from_scratch() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("accounts.toml"), ACCOUNTS_TOML).unwrap();
    fs::write(dir.path().join("state.json"), "{ not json").unwrap();

    let store = open(dir.path()).await;
    let accounts = store.list_accounts().await.unwrap();
    assert!(accounts[0].last_seen_at.is_none());
}

#[tokio::test]
async fn a_missing_accounts_document_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let result = FileStore::open(
        &dir.path().join("nowhere.toml"),
        &dir.path().join("state.json"),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn an_uncompilable_filter_pattern_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("accounts.toml"),
        r#"
[[accounts]]
id = 1
handle = "octocat"

[[accounts.filters]]
[[accounts.filters.conditions]]
title_matches = "(unclosed"
"#,
    )
    .unwrap();

    let result = FileStore::open(
        &dir.path().join("accounts.toml"),
        &dir.path().join("state.json"),
    )
    .await;
    assert!(result.is_err());
}
