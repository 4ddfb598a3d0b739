//! Lifts raw feed events into their canonical, human-readable form.

use std::sync::Arc;

use crate::error::PollError;
use crate::event::raw::{EventPayload, RawEvent};
use crate::event::CanonicalEvent;

/// Decodes `raw`'s payload and derives the canonical fields from it.
///
/// Kinds the pipeline does not understand normalize with empty semantic
/// fields instead of failing; for understood kinds the derived title is
/// never empty.
pub fn normalize(raw: RawEvent) -> Result<CanonicalEvent, PollError> {
    let payload =
        EventPayload::decode(&raw.kind, &raw.payload).map_err(|source| PollError::PayloadParse {
            kind: raw.kind.clone(),
            source,
        })?;

    let actor = raw
        .actor
        .as_ref()
        .map(|a| a.login.clone())
        .unwrap_or_default();
    let repo = raw.repo.as_ref().map(|r| r.name.as_str()).unwrap_or("?");

    let (action, subject, title, body) = describe(&payload, &actor, repo);

    Ok(CanonicalEvent {
        kind: raw.kind.clone(),
        public: raw.public,
        created_at: raw.created_at,
        actor,
        action,
        subject,
        title,
        body,
        payload,
        raw: Arc::new(raw),
        discarded: None,
    })
}

/// Renders (action, subject, title, body) for one decoded payload.
fn describe(payload: &EventPayload, actor: &str, repo: &str) -> (String, String, String, String) {
    match payload {
        EventPayload::CommitComment(p) => (
            "commented".into(),
            p.comment.commit_id.clone(),
            format!(
                "[{repo}] {actor} commented on commit {}",
                short_sha(&p.comment.commit_id)
            ),
            p.comment.body.clone(),
        ),
        EventPayload::Create(p) => match p.ref_name.as_deref() {
            Some(name) => (
                "created".into(),
                name.to_owned(),
                format!("[{repo}] {actor} created {} {name}", p.ref_type),
                String::new(),
            ),
            None => (
                "created".into(),
                repo.to_owned(),
                format!("[{repo}] {actor} created the repository"),
                String::new(),
            ),
        },
        EventPayload::Delete(p) => (
            "deleted".into(),
            p.ref_name.clone(),
            format!("[{repo}] {actor} deleted {} {}", p.ref_type, p.ref_name),
            String::new(),
        ),
        EventPayload::Fork(p) => (
            "forked".into(),
            p.forkee.full_name.clone(),
            format!(
                "[{repo}] {actor} forked the repository to {}",
                p.forkee.full_name
            ),
            String::new(),
        ),
        EventPayload::Gollum(p) => {
            let title = match p.pages.as_slice() {
                [page] => format!("[{repo}] {actor} updated wiki page {}", page.title),
                pages => format!("[{repo}] {actor} updated {} wiki pages", pages.len()),
            };
            ("edited".into(), repo.to_owned(), title, String::new())
        }
        EventPayload::IssueComment(p) => (
            "commented".into(),
            format!("{repo}#{}", p.issue.number),
            format!(
                "[{repo}] {actor} commented on #{}: {}",
                p.issue.number, p.issue.title
            ),
            p.comment.body.clone(),
        ),
        EventPayload::Issues(p) => (
            p.action.clone(),
            format!("{repo}#{}", p.issue.number),
            format!(
                "[{repo}] {actor} {} #{}: {}",
                p.action, p.issue.number, p.issue.title
            ),
            p.issue.body.clone().unwrap_or_default(),
        ),
        EventPayload::Member(p) => (
            p.action.clone(),
            p.member.login.clone(),
            format!(
                "[{repo}] {actor} {} collaborator {}",
                p.action, p.member.login
            ),
            String::new(),
        ),
        EventPayload::Public => (
            "open-sourced".into(),
            repo.to_owned(),
            format!("[{repo}] {actor} made the repository public"),
            String::new(),
        ),
        EventPayload::PullRequest(p) => (
            p.action.clone(),
            format!("{repo}#{}", p.pull_request.number),
            format!(
                "[{repo}] {actor} {} #{}: {}",
                p.action, p.pull_request.number, p.pull_request.title
            ),
            p.pull_request.body.clone().unwrap_or_default(),
        ),
        EventPayload::PullRequestReview(p) => (
            "reviewed".into(),
            format!("{repo}#{}", p.pull_request.number),
            format!(
                "[{repo}] {actor} reviewed #{}: {}",
                p.pull_request.number, p.pull_request.title
            ),
            p.review.body.clone().unwrap_or_default(),
        ),
        EventPayload::PullRequestReviewComment(p) => (
            "commented".into(),
            format!("{repo}#{}", p.pull_request.number),
            format!(
                "[{repo}] {actor} commented on #{}: {}",
                p.pull_request.number, p.pull_request.title
            ),
            p.comment.body.clone(),
        ),
        EventPayload::Push(p) => {
            let branch = short_ref(&p.ref_name);
            let commits = match p.commit_count() {
                1 => "1 commit".to_owned(),
                n => format!("{n} commits"),
            };
            (
                "pushed".into(),
                branch.to_owned(),
                format!("[{repo}] {actor} pushed {commits} to {branch}"),
                String::new(),
            )
        }
        EventPayload::Release(p) => (
            p.action.clone(),
            p.release.tag_name.clone(),
            format!(
                "[{repo}] {actor} {} release {}",
                p.action, p.release.tag_name
            ),
            p.release.body.clone().unwrap_or_default(),
        ),
        EventPayload::Watch(_) => (
            "starred".into(),
            repo.to_owned(),
            format!("[{repo}] {actor} starred the repository"),
            String::new(),
        ),
        EventPayload::Other => Default::default(),
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..10).unwrap_or(sha)
}

fn short_ref(ref_name: &str) -> &str {
    ref_name.rsplit('/').next().unwrap_or(ref_name)
}
