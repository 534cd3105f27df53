use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Canonical, provider-independent lifecycle labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Opened,
    Pushed,
    ChangesRequested,
    Approved,
    Unapproved,
    Dismissed,
    Reopen,
    Merged,
    Closed,
    Resolved,
    Unresolved,
}

impl EventType {
    pub const ALL: [EventType; 11] = [
        EventType::Opened,
        EventType::Pushed,
        EventType::ChangesRequested,
        EventType::Approved,
        EventType::Unapproved,
        EventType::Dismissed,
        EventType::Reopen,
        EventType::Merged,
        EventType::Closed,
        EventType::Resolved,
        EventType::Unresolved,
    ];

    /// Lifecycle transitions repeat, so every delivery is persisted as a
    /// new row. Only `opened` deliveries are deduplicated before insert.
    pub fn is_always_create(self) -> bool {
        !matches!(self, EventType::Opened)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Opened => "opened",
            EventType::Pushed => "pushed",
            EventType::ChangesRequested => "changes_requested",
            EventType::Approved => "approved",
            EventType::Unapproved => "unapproved",
            EventType::Dismissed => "dismissed",
            EventType::Reopen => "reopen",
            EventType::Merged => "merged",
            EventType::Closed => "closed",
            EventType::Resolved => "resolved",
            EventType::Unresolved => "unresolved",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "provider", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Github,
    Gitlab,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Github => "github",
            Provider::Gitlab => "gitlab",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectRow {
    pub id: i64,
    pub name: String,
    pub repository: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketRow {
    pub id: i64,
    pub code: String,
    pub project_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventRow {
    pub id: i64,
    pub project_id: i64,
    pub author_id: i64,
    pub ticket_id: Option<i64>,
    pub reviewer_id: Option<i64>,
    pub branch: String,
    pub pr_number: Option<i64>,
    pub source: Provider,
    pub event_type: EventType,
    pub additions: i64,
    pub deletions: i64,
    pub changed_files: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RevisionRow {
    pub id: i64,
    pub event_id: i64,
    pub reviewer_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub repository: String,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub project_id: i64,
    pub author_id: i64,
    pub ticket_id: Option<i64>,
    pub reviewer_id: Option<i64>,
    pub branch: String,
    pub pr_number: Option<i64>,
    pub source: Provider,
    pub event_type: EventType,
    pub additions: i64,
    pub deletions: i64,
    pub changed_files: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Natural key of the opened-event idempotency check.
#[derive(Debug, Clone)]
pub struct EventKey {
    pub author_id: i64,
    pub project_id: i64,
    pub ticket_id: Option<i64>,
    pub pr_number: Option<i64>,
}
