//! Maps provider event kinds, actions, and sub-states onto the canonical
//! lifecycle labels through explicit rule tables. A delivery no rule
//! matches classifies as [`Classification::Unhandled`]; callers treat that
//! as an acknowledged drop, never as an error.

use db::models::EventType;

use crate::github::{GithubKind, LifecyclePayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Event(EventType),
    Unhandled,
}

#[derive(Debug, Clone, Copy)]
pub struct GithubRule {
    pub kind: GithubKind,
    pub action: &'static str,
    /// Review sub-state (`submitted` reviews fan out on it).
    pub review_state: Option<&'static str>,
    /// Closed pull requests fan out on the merged flag.
    pub merged: Option<bool>,
    pub event_type: EventType,
}

pub const GITHUB_RULES: &[GithubRule] = &[
    GithubRule {
        kind: GithubKind::PullRequest,
        action: "opened",
        review_state: None,
        merged: None,
        event_type: EventType::Opened,
    },
    GithubRule {
        kind: GithubKind::PullRequest,
        action: "synchronize",
        review_state: None,
        merged: None,
        event_type: EventType::Pushed,
    },
    GithubRule {
        kind: GithubKind::PullRequest,
        action: "closed",
        review_state: None,
        merged: Some(true),
        event_type: EventType::Merged,
    },
    GithubRule {
        kind: GithubKind::PullRequest,
        action: "closed",
        review_state: None,
        merged: Some(false),
        event_type: EventType::Closed,
    },
    GithubRule {
        kind: GithubKind::Review,
        action: "submitted",
        review_state: Some("changes_requested"),
        merged: None,
        event_type: EventType::ChangesRequested,
    },
    GithubRule {
        kind: GithubKind::Review,
        action: "submitted",
        review_state: Some("approved"),
        merged: None,
        event_type: EventType::Approved,
    },
    GithubRule {
        kind: GithubKind::Review,
        action: "dismissed",
        review_state: None,
        merged: None,
        event_type: EventType::Dismissed,
    },
    GithubRule {
        kind: GithubKind::ReviewThread,
        action: "resolved",
        review_state: None,
        merged: None,
        event_type: EventType::Resolved,
    },
    GithubRule {
        kind: GithubKind::ReviewThread,
        action: "unresolved",
        review_state: None,
        merged: None,
        event_type: EventType::Unresolved,
    },
];

pub fn classify_github(kind: GithubKind, payload: &LifecyclePayload) -> Classification {
    let review_state = payload.review.as_ref().map(|r| r.state.as_str());
    let merged = payload.pull_request.merged;

    for rule in GITHUB_RULES {
        if rule.kind != kind || rule.action != payload.action {
            continue;
        }
        if let Some(expected) = rule.review_state {
            if review_state != Some(expected) {
                continue;
            }
        }
        if let Some(expected) = rule.merged {
            if merged != expected {
                continue;
            }
        }
        return Classification::Event(rule.event_type);
    }
    Classification::Unhandled
}

pub const GITLAB_MERGE_REQUEST_RULES: &[(&str, EventType)] = &[
    ("open", EventType::Opened),
    ("merge", EventType::Merged),
    ("close", EventType::Dismissed),
    ("reopen", EventType::Reopen),
    ("approved", EventType::Approved),
    ("unapproved", EventType::Unapproved),
    ("update", EventType::Pushed),
];

pub fn classify_gitlab_merge_request(action: Option<&str>) -> Classification {
    let Some(action) = action else {
        return Classification::Unhandled;
    };
    GITLAB_MERGE_REQUEST_RULES
        .iter()
        .find(|(rule_action, _)| *rule_action == action)
        .map(|(_, event_type)| Classification::Event(*event_type))
        .unwrap_or(Classification::Unhandled)
}

/// Only inline review comments ("diff notes") count as a change request.
pub fn classify_gitlab_note(note_type: Option<&str>) -> Classification {
    match note_type {
        Some("DiffNote") => Classification::Event(EventType::ChangesRequested),
        _ => Classification::Unhandled,
    }
}

pub fn classify_gitlab(event: &crate::gitlab::GitlabEvent) -> Classification {
    use crate::gitlab::GitlabEvent;
    match event {
        GitlabEvent::MergeRequest(mr) => {
            classify_gitlab_merge_request(mr.object_attributes.action.as_deref())
        }
        GitlabEvent::Note(note) => {
            classify_gitlab_note(note.object_attributes.note_type.as_deref())
        }
        GitlabEvent::Push(_) => Classification::Event(EventType::Pushed),
        GitlabEvent::Unsupported { .. } => Classification::Unhandled,
    }
}
