//! Per-account filtering rules.
//!
//! Accounts carry an ordered list of filters. The first filter whose
//! conditions all hold decides the event's fate via its `discard` flag;
//! when no filter matches, the account's default policy decides. A
//! condition is an AND of the matchers that are set on it:
//! - `kind`:    exact event kind, e.g. "IssuesEvent"
//! - `action`:  payload action verb, e.g. "opened"
//! - `label` / `milestone`: present on the issue or pull request
//! - `title_matches` / `body_matches`: regex over the subject
//! - `public` / `organization_id` / `repository_id`: envelope matchers
//!
//! `negate: true` inverts the one condition it is set on, nothing else.
//! Matching reads the raw event and its decoded payload only, so
//! re-evaluating an event with the same rules always agrees with the
//! first pass.

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

use crate::event::CanonicalEvent;

#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub conditions: Vec<Condition>,
    /// Matching events are dropped instead of delivered.
    pub discard: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Condition {
    pub negate: bool,
    pub kind: Option<String>,
    pub action: Option<String>,
    pub label: Option<String>,
    pub milestone: Option<String>,
    pub title_pattern: Option<Regex>,
    pub body_pattern: Option<Regex>,
    pub public: Option<bool>,
    pub organization_id: Option<i64>,
    pub repository_id: Option<i64>,
}

/// Serialized form of a [`Filter`], as written in the accounts file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub discard: bool,
    #[serde(default)]
    pub conditions: Vec<ConditionSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConditionSpec {
    #[serde(default)]
    pub negate: bool,
    pub kind: Option<String>,
    pub action: Option<String>,
    pub label: Option<String>,
    pub milestone: Option<String>,
    pub title_matches: Option<String>,
    pub body_matches: Option<String>,
    pub public: Option<bool>,
    pub organization_id: Option<i64>,
    pub repository_id: Option<i64>,
}

impl FilterSpec {
    /// Compiles the regex matchers up front so evaluation cannot fail.
    pub fn compile(&self) -> Result<Filter> {
        let conditions = self
            .conditions
            .iter()
            .map(ConditionSpec::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Filter {
            conditions,
            discard: self.discard,
        })
    }
}

impl ConditionSpec {
    pub fn compile(&self) -> Result<Condition> {
        let title_pattern = self
            .title_matches
            .as_deref()
            .map(Regex::new)
            .transpose()
            .with_context(|| format!("bad title pattern {:?}", self.title_matches))?;
        let body_pattern = self
            .body_matches
            .as_deref()
            .map(Regex::new)
            .transpose()
            .with_context(|| format!("bad body pattern {:?}", self.body_matches))?;
        Ok(Condition {
            negate: self.negate,
            kind: self.kind.clone(),
            action: self.action.clone(),
            label: self.label.clone(),
            milestone: self.milestone.clone(),
            title_pattern,
            body_pattern,
            public: self.public,
            organization_id: self.organization_id,
            repository_id: self.repository_id,
        })
    }
}

/// First matching filter wins; no match falls back to `default_discard`.
/// Returns true when the event should be discarded.
pub fn evaluate(event: &CanonicalEvent, filters: &[Filter], default_discard: bool) -> bool {
    filters
        .iter()
        .find(|f| f.matches(event))
        .map(|f| f.discard)
        .unwrap_or(default_discard)
}

/// Runs [`evaluate`] over a batch, stamping each event's verdict.
pub fn apply_verdicts(events: &mut [CanonicalEvent], filters: &[Filter], default_discard: bool) {
    for event in events.iter_mut() {
        event.discarded = Some(evaluate(event, filters, default_discard));
    }
}

impl Filter {
    /// A filter with no conditions matches every event.
    pub fn matches(&self, event: &CanonicalEvent) -> bool {
        self.conditions.iter().all(|c| c.matches(event))
    }
}

impl Condition {
    pub fn matches(&self, event: &CanonicalEvent) -> bool {
        let hit = self.holds(event);
        if self.negate {
            !hit
        } else {
            hit
        }
    }

    // A matcher whose field is absent on the event does not hold; an
    // unset matcher always does.
    fn holds(&self, event: &CanonicalEvent) -> bool {
        if let Some(kind) = &self.kind {
            if event.kind != *kind {
                return false;
            }
        }
        if let Some(action) = &self.action {
            if event.payload.action() != Some(action.as_str()) {
                return false;
            }
        }
        if let Some(label) = &self.label {
            if !event.payload.labels().iter().any(|l| l.name == *label) {
                return false;
            }
        }
        if let Some(milestone) = &self.milestone {
            if event.payload.milestone_title() != Some(milestone.as_str()) {
                return false;
            }
        }
        if let Some(pattern) = &self.title_pattern {
            match event.payload.subject_title() {
                Some(title) if pattern.is_match(title) => {}
                _ => return false,
            }
        }
        if let Some(pattern) = &self.body_pattern {
            match event.payload.subject_body() {
                Some(body) if pattern.is_match(body) => {}
                _ => return false,
            }
        }
        if let Some(public) = self.public {
            if event.public != public {
                return false;
            }
        }
        if let Some(org_id) = self.organization_id {
            if event.raw.org.as_ref().map(|o| o.id) != Some(org_id) {
                return false;
            }
        }
        if let Some(repo_id) = self.repository_id {
            if event.raw.repo.as_ref().map(|r| r.id) != Some(repo_id) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::raw::{Actor, Org, Repo};
    use crate::event::{normalize, RawEvent};
    use chrono::Utc;
    use serde_json::json;

    fn event(kind: &str, payload: serde_json::Value) -> CanonicalEvent {
        normalize(RawEvent {
            id: "1".into(),
            kind: kind.into(),
            actor: Some(Actor {
                id: 1,
                login: "alice".into(),
            }),
            repo: Some(Repo {
                id: 42,
                name: "octo/spoon-knife".into(),
            }),
            org: Some(Org {
                id: 7,
                login: "octo".into(),
            }),
            public: true,
            created_at: Utc::now(),
            payload,
        })
        .unwrap()
    }

    fn opened_issue() -> CanonicalEvent {
        event(
            "IssuesEvent",
            json!({
                "action": "opened",
                "issue": {
                    "number": 3,
                    "title": "panic on empty input",
                    "body": "stack trace attached",
                    "labels": [{ "name": "bug" }],
                    "milestone": { "title": "v1.1" }
                }
            }),
        )
    }

    fn keep_opened_issues() -> Filter {
        Filter {
            conditions: vec![Condition {
                kind: Some("IssuesEvent".into()),
                action: Some("opened".into()),
                ..Default::default()
            }],
            discard: false,
        }
    }

    fn discard_everything() -> Filter {
        Filter {
            conditions: vec![],
            discard: true,
        }
    }

    #[test]
    fn first_matching_filter_wins_over_a_later_catch_all() {
        let filters = vec![keep_opened_issues(), discard_everything()];
        assert!(!evaluate(&opened_issue(), &filters, false));

        let starred = event("WatchEvent", json!({ "action": "started" }));
        assert!(evaluate(&starred, &filters, false));
    }

    #[test]
    fn no_filters_fall_back_to_the_default_policy() {
        let ev = opened_issue();
        assert!(evaluate(&ev, &[], true));
        assert!(!evaluate(&ev, &[], false));
    }

    #[test]
    fn conditions_within_a_filter_are_anded() {
        let filter = Filter {
            conditions: vec![
                Condition {
                    kind: Some("IssuesEvent".into()),
                    ..Default::default()
                },
                Condition {
                    label: Some("security".into()),
                    ..Default::default()
                },
            ],
            discard: false,
        };
        // kind matches, label does not
        assert!(!filter.matches(&opened_issue()));
    }

    #[test]
    fn negate_inverts_only_its_own_condition() {
        let filter = Filter {
            conditions: vec![
                Condition {
                    kind: Some("IssuesEvent".into()),
                    ..Default::default()
                },
                Condition {
                    negate: true,
                    label: Some("wontfix".into()),
                    ..Default::default()
                },
            ],
            discard: false,
        };
        // is an issues event, does not carry "wontfix"
        assert!(filter.matches(&opened_issue()));
    }

    #[test]
    fn regex_matchers_read_the_subject_not_the_rendering() {
        let filter = Filter {
            conditions: vec![Condition {
                title_pattern: Some(Regex::new(r"(?i)panic").unwrap()),
                body_pattern: Some(Regex::new("trace").unwrap()),
                ..Default::default()
            }],
            discard: false,
        };
        assert!(filter.matches(&opened_issue()));

        // Watch events have no subject; a regex matcher cannot hold.
        let starred = event("WatchEvent", json!({ "action": "started" }));
        assert!(!filter.matches(&starred));
    }

    #[test]
    fn milestone_and_envelope_matchers() {
        let hit = Condition {
            milestone: Some("v1.1".into()),
            public: Some(true),
            organization_id: Some(7),
            repository_id: Some(42),
            ..Default::default()
        };
        assert!(hit.matches(&opened_issue()));

        let wrong_org = Condition {
            organization_id: Some(8),
            ..Default::default()
        };
        assert!(!wrong_org.matches(&opened_issue()));
    }

    #[test]
    fn action_matcher_never_holds_on_undecoded_kinds() {
        let ev = event("SponsorshipEvent", json!({ "action": "created" }));
        let cond = Condition {
            action: Some("created".into()),
            ..Default::default()
        };
        // the payload is not decoded, so the matcher has nothing to read
        assert!(!cond.matches(&ev));

        let by_kind = Condition {
            kind: Some("SponsorshipEvent".into()),
            ..Default::default()
        };
        assert!(by_kind.matches(&ev));
    }

    #[test]
    fn evaluation_is_deterministic_over_repeated_runs() {
        let filters = vec![keep_opened_issues(), discard_everything()];
        let ev = opened_issue();

        let first = evaluate(&ev, &filters, true);
        for _ in 0..3 {
            assert_eq!(evaluate(&ev, &filters, true), first);
        }
    }

    #[test]
    fn compile_rejects_bad_patterns_up_front() {
        let spec = FilterSpec {
            discard: false,
            conditions: vec![ConditionSpec {
                title_matches: Some("(unclosed".into()),
                ..Default::default()
            }],
        };
        assert!(spec.compile().is_err());
    }

    #[test]
    fn apply_verdicts_stamps_every_event() {
        let filters = vec![keep_opened_issues()];
        let mut events = vec![
            opened_issue(),
            event("WatchEvent", json!({ "action": "started" })),
        ];
        apply_verdicts(&mut events, &filters, true);

        assert_eq!(events[0].discarded, Some(false));
        assert!(events[0].kept());
        assert_eq!(events[1].discarded, Some(true));
        assert!(!events[1].kept());
    }
}
