pub mod github;
pub mod gitlab;
pub mod metrics;
pub mod resolver;
pub mod revision;
pub mod writer;

pub use github::GithubIngest;
pub use gitlab::GitlabIngest;
pub use resolver::{EntityResolver, ProjectKey, ResolveMode};
pub use revision::RevisionTracker;
pub use writer::{EventWriter, WriteOutcome};

use db::models::{EventRow, EventType, RevisionRow};

/// Policy drops. Acknowledged to the sender, never logged as failures,
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    WrongEventKind,
    IgnoredBranch,
    UnhandledAction,
    BotPush,
}

impl IgnoreReason {
    pub fn as_str(self) -> &'static str {
        match self {
            IgnoreReason::WrongEventKind => "wrong_event_kind",
            IgnoreReason::IgnoredBranch => "ignored_branch",
            IgnoreReason::UnhandledAction => "unhandled_action",
            IgnoreReason::BotPush => "bot_push",
        }
    }

    pub fn ack(self) -> &'static str {
        match self {
            IgnoreReason::WrongEventKind => "Event ignored",
            IgnoreReason::IgnoredBranch => "Branch ignored",
            IgnoreReason::UnhandledAction => "Unhandled action",
            IgnoreReason::BotPush => "Invalid push event from GitHub",
        }
    }
}

/// What one webhook delivery came to.
#[derive(Debug, Clone)]
pub enum Outcome {
    Recorded {
        event: EventRow,
        revision: Option<RevisionRow>,
    },
    Duplicate {
        event: EventRow,
    },
    Ignored(IgnoreReason),
}

impl Outcome {
    /// The short human-readable acknowledgement the HTTP layer returns.
    pub fn ack(&self) -> String {
        match self {
            Outcome::Ignored(reason) => reason.ack().to_string(),
            Outcome::Duplicate { .. } => "Duplicate PR. Skipped.".to_string(),
            Outcome::Recorded { event, .. } => match (event.event_type, event.pr_number) {
                (EventType::Pushed, None) => "Push event processed successfully.".to_string(),
                (event_type, _) => {
                    format!("Pull request {} event recorded.", ack_phrase(event_type))
                }
            },
        }
    }
}

fn ack_phrase(event_type: EventType) -> &'static str {
    match event_type {
        EventType::Opened => "opened",
        EventType::Pushed => "pushed",
        EventType::ChangesRequested => "change requested",
        EventType::Approved => "approved",
        EventType::Unapproved => "unapproved",
        EventType::Dismissed => "dismissed",
        EventType::Reopen => "reopen",
        EventType::Merged => "merged",
        EventType::Closed => "closed",
        EventType::Resolved => "review thread resolved",
        EventType::Unresolved => "review thread unresolved",
    }
}

fn ignored(provider: db::models::Provider, reason: IgnoreReason) -> Outcome {
    metrics::EVENTS_IGNORED_TOTAL
        .with_label_values(&[provider.as_str(), reason.as_str()])
        .inc();
    tracing::debug!(provider = %provider, reason = reason.as_str(), "delivery ignored");
    Outcome::Ignored(reason)
}
