//! Wire model for the activity feed.
//!
//! A page of the feed decodes into [`RawEvent`]s with the payload kept as
//! raw JSON. [`EventPayload::decode`] then lifts the payload into a typed
//! union for the kinds the pipeline understands; everything else stays
//! matchable on the envelope alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repo {
    pub id: i64,
    pub name: String, // "owner/repo"
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Org {
    pub id: i64,
    pub login: String,
}

/// One event exactly as the feed returns it, newest first in a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub actor: Option<Actor>,
    #[serde(default)]
    pub repo: Option<Repo>,
    #[serde(default)]
    pub org: Option<Org>,
    #[serde(default)]
    pub public: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Milestone {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub milestone: Option<Milestone>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub milestone: Option<Milestone>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommitComment {
    pub commit_id: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub state: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Member {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Forkee {
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GollumPage {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PushCommit {
    #[serde(default)]
    pub sha: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommitCommentPayload {
    pub comment: CommitComment,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatePayload {
    // null when ref_type is "repository"
    #[serde(rename = "ref")]
    pub ref_name: Option<String>,
    pub ref_type: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeletePayload {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub ref_type: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForkPayload {
    pub forkee: Forkee,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GollumPayload {
    #[serde(default)]
    pub pages: Vec<GollumPage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IssueCommentPayload {
    pub action: String,
    pub issue: Issue,
    pub comment: Comment,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IssuesPayload {
    pub action: String,
    pub issue: Issue,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemberPayload {
    pub action: String,
    pub member: Member,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PullRequestPayload {
    pub action: String,
    pub pull_request: PullRequest,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PullRequestReviewPayload {
    pub action: String,
    pub review: Review,
    pub pull_request: PullRequest,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PullRequestReviewCommentPayload {
    pub action: String,
    pub comment: Comment,
    pub pull_request: PullRequest,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PushPayload {
    #[serde(rename = "ref")]
    pub ref_name: String,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub commits: Vec<PushCommit>,
}

impl PushPayload {
    pub fn commit_count(&self) -> usize {
        if self.size > 0 {
            self.size as usize
        } else {
            self.commits.len()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReleasePayload {
    pub action: String,
    pub release: Release,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WatchPayload {
    pub action: String,
}

/// Typed payload for the event kinds the pipeline understands.
///
/// `Other` carries every kind we do not decode. Such events still flow
/// through the rules and can match on kind, visibility and ownership;
/// only the payload-derived matchers come back empty for them.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    CommitComment(CommitCommentPayload),
    Create(CreatePayload),
    Delete(DeletePayload),
    Fork(ForkPayload),
    Gollum(GollumPayload),
    IssueComment(IssueCommentPayload),
    Issues(IssuesPayload),
    Member(MemberPayload),
    Public,
    PullRequest(PullRequestPayload),
    PullRequestReview(PullRequestReviewPayload),
    PullRequestReviewComment(PullRequestReviewCommentPayload),
    Push(PushPayload),
    Release(ReleasePayload),
    Watch(WatchPayload),
    Other,
}

impl EventPayload {
    /// Decodes the payload carried under `kind`. Unknown kinds come back
    /// as [`EventPayload::Other`]; only payloads of known kinds can fail.
    pub fn decode(kind: &str, payload: &Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            "CommitCommentEvent" => Self::CommitComment(Deserialize::deserialize(payload)?),
            "CreateEvent" => Self::Create(Deserialize::deserialize(payload)?),
            "DeleteEvent" => Self::Delete(Deserialize::deserialize(payload)?),
            "ForkEvent" => Self::Fork(Deserialize::deserialize(payload)?),
            "GollumEvent" => Self::Gollum(Deserialize::deserialize(payload)?),
            "IssueCommentEvent" => Self::IssueComment(Deserialize::deserialize(payload)?),
            "IssuesEvent" => Self::Issues(Deserialize::deserialize(payload)?),
            "MemberEvent" => Self::Member(Deserialize::deserialize(payload)?),
            "PublicEvent" => Self::Public,
            "PullRequestEvent" => Self::PullRequest(Deserialize::deserialize(payload)?),
            "PullRequestReviewEvent" => Self::PullRequestReview(Deserialize::deserialize(payload)?),
            "PullRequestReviewCommentEvent" => {
                Self::PullRequestReviewComment(Deserialize::deserialize(payload)?)
            }
            "PushEvent" => Self::Push(Deserialize::deserialize(payload)?),
            "ReleaseEvent" => Self::Release(Deserialize::deserialize(payload)?),
            "WatchEvent" => Self::Watch(Deserialize::deserialize(payload)?),
            _ => Self::Other,
        })
    }

    /// The payload-level action verb, e.g. `"opened"` on an issues event.
    pub fn action(&self) -> Option<&str> {
        match self {
            Self::IssueComment(p) => Some(&p.action),
            Self::Issues(p) => Some(&p.action),
            Self::Member(p) => Some(&p.action),
            Self::PullRequest(p) => Some(&p.action),
            Self::PullRequestReview(p) => Some(&p.action),
            Self::PullRequestReviewComment(p) => Some(&p.action),
            Self::Release(p) => Some(&p.action),
            Self::Watch(p) => Some(&p.action),
            _ => None,
        }
    }

    fn issue(&self) -> Option<&Issue> {
        match self {
            Self::IssueComment(p) => Some(&p.issue),
            Self::Issues(p) => Some(&p.issue),
            _ => None,
        }
    }

    fn pull_request(&self) -> Option<&PullRequest> {
        match self {
            Self::PullRequest(p) => Some(&p.pull_request),
            Self::PullRequestReview(p) => Some(&p.pull_request),
            Self::PullRequestReviewComment(p) => Some(&p.pull_request),
            _ => None,
        }
    }

    /// Labels on the issue or pull request the event is about.
    pub fn labels(&self) -> &[Label] {
        if let Some(issue) = self.issue() {
            &issue.labels
        } else if let Some(pr) = self.pull_request() {
            &pr.labels
        } else {
            &[]
        }
    }

    pub fn milestone_title(&self) -> Option<&str> {
        self.issue()
            .and_then(|i| i.milestone.as_ref())
            .or_else(|| self.pull_request().and_then(|p| p.milestone.as_ref()))
            .map(|m| m.title.as_str())
    }

    /// Title of the issue or pull request the event is about.
    pub fn subject_title(&self) -> Option<&str> {
        self.issue()
            .map(|i| i.title.as_str())
            .or_else(|| self.pull_request().map(|p| p.title.as_str()))
    }

    /// Body of the issue or pull request the event is about.
    pub fn subject_body(&self) -> Option<&str> {
        self.issue()
            .and_then(|i| i.body.as_deref())
            .or_else(|| self.pull_request().and_then(|p| p.body.as_deref()))
    }
}
