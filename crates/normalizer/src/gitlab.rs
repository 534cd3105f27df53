//! Typed views over GitLab webhook bodies. GitLab tags deliveries with
//! `event_type` (system hooks use `event_name`); the adapter accepts both.

use serde::Deserialize;
use serde_json::Value;

use crate::NormalizeError;

#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub path_with_namespace: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeRequestAttributes {
    pub iid: i64,
    pub action: Option<String>,
    pub source_branch: String,
    pub target_branch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeRequestPayload {
    pub project: Project,
    pub user: User,
    pub object_attributes: MergeRequestAttributes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoteAttributes {
    /// `DiffNote` marks an inline review comment; other note types carry
    /// no review signal.
    #[serde(rename = "type")]
    pub note_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NoteMergeRequest {
    pub iid: i64,
    pub source_branch: String,
    pub target_branch: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotePayload {
    pub project: Project,
    pub user: User,
    pub object_attributes: NoteAttributes,
    pub merge_request: Option<NoteMergeRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushPayload {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub before: String,
    pub after: String,
    pub user_username: String,
    pub project: Project,
}

#[derive(Debug, Clone)]
pub enum GitlabEvent {
    MergeRequest(MergeRequestPayload),
    Note(NotePayload),
    Push(PushPayload),
    Unsupported { kind: String },
}

pub fn parse(payload: &Value) -> Result<GitlabEvent, NormalizeError> {
    let kind = payload
        .get("event_type")
        .or_else(|| payload.get("event_name"))
        .and_then(Value::as_str)
        .ok_or(NormalizeError::MissingKind)?;

    match kind {
        "merge_request" => {
            let payload: MergeRequestPayload = serde_json::from_value(payload.clone())
                .map_err(|err| NormalizeError::malformed("gitlab", kind, err))?;
            Ok(GitlabEvent::MergeRequest(payload))
        }
        "note" => {
            let payload: NotePayload = serde_json::from_value(payload.clone())
                .map_err(|err| NormalizeError::malformed("gitlab", kind, err))?;
            Ok(GitlabEvent::Note(payload))
        }
        "push" => {
            let payload: PushPayload = serde_json::from_value(payload.clone())
                .map_err(|err| NormalizeError::malformed("gitlab", kind, err))?;
            Ok(GitlabEvent::Push(payload))
        }
        other => Ok(GitlabEvent::Unsupported {
            kind: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_merge_request_payload() {
        let body = json!({
            "event_type": "merge_request",
            "project": {"id": 5, "name": "app", "path_with_namespace": "org/app"},
            "user": {"username": "alice"},
            "object_attributes": {
                "iid": 3,
                "action": "open",
                "source_branch": "feature/ABC-1",
                "target_branch": "integration"
            }
        });
        match parse(&body).unwrap() {
            GitlabEvent::MergeRequest(mr) => {
                assert_eq!(mr.object_attributes.iid, 3);
                assert_eq!(mr.object_attributes.action.as_deref(), Some("open"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_event_name_for_pushes() {
        let body = json!({
            "event_name": "push",
            "ref": "refs/heads/feature/ABC-2",
            "before": "aaa",
            "after": "bbb",
            "user_username": "bob",
            "project": {"id": 5, "name": "app", "path_with_namespace": "org/app"}
        });
        assert!(matches!(parse(&body).unwrap(), GitlabEvent::Push(_)));
    }

    #[test]
    fn missing_kind_is_an_error() {
        assert!(matches!(
            parse(&json!({"foo": 1})),
            Err(NormalizeError::MissingKind)
        ));
    }

    #[test]
    fn unknown_kind_is_unsupported() {
        let body = json!({"event_type": "pipeline"});
        assert!(matches!(
            parse(&body).unwrap(),
            GitlabEvent::Unsupported { .. }
        ));
    }
}
