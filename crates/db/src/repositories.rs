use async_trait::async_trait;
use serde_json::Value;

use crate::errors::Result;
use crate::models::{
    EventKey, EventRow, NewEvent, NewProject, ProjectRow, RevisionRow, TicketRow, UserRow,
};

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Find-or-create by the unique repository key. Existing rows are
    /// returned untouched; projects are never mutated after creation.
    async fn upsert(&self, project: NewProject) -> Result<ProjectRow>;
    async fn find_by_repository(&self, repository: &str) -> Result<Option<ProjectRow>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn upsert(&self, username: &str) -> Result<UserRow>;
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRow>>;
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn upsert(&self, code: &str, project_id: i64) -> Result<TicketRow>;
    async fn find_by_code(&self, code: &str) -> Result<Option<TicketRow>>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Inserts the event row and its raw payload in one transaction.
    async fn create(&self, event: NewEvent, raw_payload: Value) -> Result<EventRow>;
    /// The opened-event idempotency lookup. NULL ticket/number still match.
    async fn find_duplicate(&self, key: &EventKey) -> Result<Option<EventRow>>;
    /// Most recent event on the project/ticket timeline, if any.
    async fn latest_for_project_ticket(
        &self,
        project_id: i64,
        ticket_id: Option<i64>,
    ) -> Result<Option<EventRow>>;
}

#[async_trait]
pub trait RevisionRepository: Send + Sync {
    async fn create(&self, event_id: i64, reviewer_id: i64) -> Result<RevisionRow>;
    async fn list_for_event(&self, event_id: i64) -> Result<Vec<RevisionRow>>;
}

pub trait Repositories: Send + Sync {
    fn projects(&self) -> &dyn ProjectRepository;
    fn users(&self) -> &dyn UserRepository;
    fn tickets(&self) -> &dyn TicketRepository;
    fn events(&self) -> &dyn EventRepository;
    fn revisions(&self) -> &dyn RevisionRepository;
}
