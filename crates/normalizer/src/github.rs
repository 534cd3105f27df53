//! Typed views over GitHub webhook bodies. Adapters deserialize the raw
//! JSON into the variant matching the `X-GitHub-Event` header; everything
//! downstream operates on these structs, never on loose maps.

use serde::Deserialize;
use serde_json::Value;

use crate::NormalizeError;

#[derive(Debug, Clone, Deserialize)]
pub struct Actor {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub branch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: i64,
    #[serde(default)]
    pub merged: bool,
    pub head: GitRef,
    pub user: Actor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    pub state: String,
    pub user: Actor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LifecyclePayload {
    pub action: String,
    pub pull_request: PullRequest,
    pub repository: Repository,
    pub review: Option<Review>,
    pub sender: Option<Actor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Committer {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadCommit {
    pub id: String,
    pub committer: Committer,
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub modified: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pusher {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushPayload {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub before: String,
    pub after: String,
    pub pusher: Pusher,
    pub repository: Repository,
    pub head_commit: Option<HeadCommit>,
}

impl PushPayload {
    /// Total files touched by the head commit, the way the push payload
    /// reports them (file lists, not diff lines).
    pub fn changed_file_count(&self) -> i64 {
        self.head_commit
            .as_ref()
            .map(|c| (c.added.len() + c.removed.len() + c.modified.len()) as i64)
            .unwrap_or(0)
    }
}

/// Request-lifecycle kinds the classifier accepts. Anything else arrives
/// as [`GithubEvent::Unsupported`] and is acknowledged without a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GithubKind {
    PullRequest,
    Review,
    ReviewThread,
}

#[derive(Debug, Clone)]
pub enum GithubEvent {
    Lifecycle {
        kind: GithubKind,
        payload: LifecyclePayload,
    },
    Push(PushPayload),
    Unsupported {
        kind: String,
    },
}

pub fn parse(event_kind: &str, payload: &Value) -> Result<GithubEvent, NormalizeError> {
    let kind = match event_kind {
        "pull_request" => GithubKind::PullRequest,
        "pull_request_review" => GithubKind::Review,
        "pull_request_review_thread" => GithubKind::ReviewThread,
        "push" => {
            let payload: PushPayload = serde_json::from_value(payload.clone())
                .map_err(|err| NormalizeError::malformed("github", event_kind, err))?;
            return Ok(GithubEvent::Push(payload));
        }
        other => {
            return Ok(GithubEvent::Unsupported {
                kind: other.to_string(),
            })
        }
    };

    let payload: LifecyclePayload = serde_json::from_value(payload.clone())
        .map_err(|err| NormalizeError::malformed("github", event_kind, err))?;
    Ok(GithubEvent::Lifecycle { kind, payload })
}
