use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::time::{sleep, Duration};
use tracing::{instrument, warn};

use crate::errors::{DbError, Result};
use crate::models::{
    EventKey, EventRow, NewEvent, NewProject, ProjectRow, RevisionRow, TicketRow, UserRow,
};
use crate::repositories::{
    EventRepository, ProjectRepository, Repositories, RevisionRepository, TicketRepository,
    UserRepository,
};

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(DbError::Migration)
}

#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
    project_repo: Arc<PgProjectRepository>,
    user_repo: Arc<PgUserRepository>,
    ticket_repo: Arc<PgTicketRepository>,
    event_repo: Arc<PgEventRepository>,
    revision_repo: Arc<PgRevisionRepository>,
}

impl PgDatabase {
    pub async fn connect(database_url: &str) -> Result<Self> {
        const MAX_ATTEMPTS: u32 = 5;
        const BASE_DELAY_MS: u64 = 500;

        let mut attempts = 0;
        loop {
            match PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
            {
                Ok(pool) => {
                    run_migrations(&pool).await?;
                    return Ok(Self::from_pool(pool));
                }
                Err(err) => {
                    attempts += 1;
                    if attempts >= MAX_ATTEMPTS {
                        return Err(DbError::Query(err));
                    }

                    let exp = (attempts - 1).min(5);
                    let backoff = Duration::from_millis(BASE_DELAY_MS * (1u64 << exp));
                    warn!(
                        attempts,
                        error = %err,
                        wait_ms = backoff.as_millis(),
                        "database connection failed; retrying"
                    );
                    sleep(backoff).await;
                }
            }
        }
    }

    pub fn from_pool(pool: PgPool) -> Self {
        let project_repo = Arc::new(PgProjectRepository { pool: pool.clone() });
        let user_repo = Arc::new(PgUserRepository { pool: pool.clone() });
        let ticket_repo = Arc::new(PgTicketRepository { pool: pool.clone() });
        let event_repo = Arc::new(PgEventRepository { pool: pool.clone() });
        let revision_repo = Arc::new(PgRevisionRepository { pool: pool.clone() });

        Self {
            pool,
            project_repo,
            user_repo,
            ticket_repo,
            event_repo,
            revision_repo,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Repositories for PgDatabase {
    fn projects(&self) -> &dyn ProjectRepository {
        &*self.project_repo
    }

    fn users(&self) -> &dyn UserRepository {
        &*self.user_repo
    }

    fn tickets(&self) -> &dyn TicketRepository {
        &*self.ticket_repo
    }

    fn events(&self) -> &dyn EventRepository {
        &*self.event_repo
    }

    fn revisions(&self) -> &dyn RevisionRepository {
        &*self.revision_repo
    }
}

#[derive(Clone)]
struct PgProjectRepository {
    pool: PgPool,
}

#[async_trait]
impl ProjectRepository for PgProjectRepository {
    #[instrument(skip(self, project), fields(repository = %project.repository))]
    async fn upsert(&self, project: NewProject) -> Result<ProjectRow> {
        // The no-op DO UPDATE makes RETURNING yield the existing row when a
        // concurrent delivery created it first; stored columns never change.
        sqlx::query_as::<_, ProjectRow>(
            r#"
            INSERT INTO projects (name, repository)
            VALUES ($1, $2)
            ON CONFLICT (repository) DO UPDATE
                SET repository = EXCLUDED.repository
            RETURNING id, name, repository, created_at
            "#,
        )
        .bind(project.name)
        .bind(project.repository)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    async fn find_by_repository(&self, repository: &str) -> Result<Option<ProjectRow>> {
        sqlx::query_as::<_, ProjectRow>(
            r#"
            SELECT id, name, repository, created_at
            FROM projects
            WHERE repository = $1
            "#,
        )
        .bind(repository)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)
    }
}

#[derive(Clone)]
struct PgUserRepository {
    pool: PgPool,
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn upsert(&self, username: &str) -> Result<UserRow> {
        sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username)
            VALUES ($1)
            ON CONFLICT (username) DO UPDATE
                SET username = EXCLUDED.username
            RETURNING id, username, created_at
            "#,
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)
    }
}

#[derive(Clone)]
struct PgTicketRepository {
    pool: PgPool,
}

#[async_trait]
impl TicketRepository for PgTicketRepository {
    async fn upsert(&self, code: &str, project_id: i64) -> Result<TicketRow> {
        sqlx::query_as::<_, TicketRow>(
            r#"
            INSERT INTO tickets (code, project_id)
            VALUES ($1, $2)
            ON CONFLICT (code) DO UPDATE
                SET code = EXCLUDED.code
            RETURNING id, code, project_id, created_at
            "#,
        )
        .bind(code)
        .bind(project_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<TicketRow>> {
        sqlx::query_as::<_, TicketRow>(
            r#"
            SELECT id, code, project_id, created_at
            FROM tickets
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)
    }
}

#[derive(Clone)]
struct PgEventRepository {
    pool: PgPool,
}

const EVENT_COLUMNS: &str = "id, project_id, author_id, ticket_id, reviewer_id, branch, \
     pr_number, source, event_type, additions, deletions, changed_files, occurred_at";

#[async_trait]
impl EventRepository for PgEventRepository {
    #[instrument(
        skip(self, event, raw_payload),
        fields(event_type = %event.event_type, project_id = event.project_id)
    )]
    async fn create(&self, event: NewEvent, raw_payload: Value) -> Result<EventRow> {
        let mut tx = self.pool.begin().await.map_err(DbError::Query)?;

        let row = sqlx::query_as::<_, EventRow>(&format!(
            r#"
            INSERT INTO pull_request_events (
                project_id, author_id, ticket_id, reviewer_id, branch, pr_number,
                source, event_type, additions, deletions, changed_files, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {EVENT_COLUMNS}
            "#
        ))
        .bind(event.project_id)
        .bind(event.author_id)
        .bind(event.ticket_id)
        .bind(event.reviewer_id)
        .bind(event.branch)
        .bind(event.pr_number)
        .bind(event.source)
        .bind(event.event_type)
        .bind(event.additions)
        .bind(event.deletions)
        .bind(event.changed_files)
        .bind(event.occurred_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(DbError::Query)?;

        sqlx::query(
            r#"
            INSERT INTO raw_payloads (event_id, payload)
            VALUES ($1, $2)
            "#,
        )
        .bind(row.id)
        .bind(raw_payload)
        .execute(&mut *tx)
        .await
        .map_err(DbError::Query)?;

        tx.commit().await.map_err(DbError::Query)?;
        Ok(row)
    }

    async fn find_duplicate(&self, key: &EventKey) -> Result<Option<EventRow>> {
        sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM pull_request_events
            WHERE author_id = $1
              AND project_id = $2
              AND ticket_id IS NOT DISTINCT FROM $3
              AND pr_number IS NOT DISTINCT FROM $4
            ORDER BY occurred_at DESC
            LIMIT 1
            "#
        ))
        .bind(key.author_id)
        .bind(key.project_id)
        .bind(key.ticket_id)
        .bind(key.pr_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    async fn latest_for_project_ticket(
        &self,
        project_id: i64,
        ticket_id: Option<i64>,
    ) -> Result<Option<EventRow>> {
        sqlx::query_as::<_, EventRow>(&format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM pull_request_events
            WHERE project_id = $1
              AND ticket_id IS NOT DISTINCT FROM $2
            ORDER BY occurred_at DESC
            LIMIT 1
            "#
        ))
        .bind(project_id)
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::Query)
    }
}

#[derive(Clone)]
struct PgRevisionRepository {
    pool: PgPool,
}

#[async_trait]
impl RevisionRepository for PgRevisionRepository {
    async fn create(&self, event_id: i64, reviewer_id: i64) -> Result<RevisionRow> {
        sqlx::query_as::<_, RevisionRow>(
            r#"
            INSERT INTO revisions (event_id, reviewer_id)
            VALUES ($1, $2)
            RETURNING id, event_id, reviewer_id, created_at
            "#,
        )
        .bind(event_id)
        .bind(reviewer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::Query)
    }

    async fn list_for_event(&self, event_id: i64) -> Result<Vec<RevisionRow>> {
        sqlx::query_as::<_, RevisionRow>(
            r#"
            SELECT id, event_id, reviewer_id, created_at
            FROM revisions
            WHERE event_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Query)
    }
}
