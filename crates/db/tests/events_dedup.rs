use chrono::{Duration, Utc};
use db::models::{EventKey, EventType, NewEvent, NewProject, Provider};
use db::pg::PgDatabase;
use db::Repositories;
use db_test_fixture::DbFixture;
use serde_json::json;
use sqlx::{query_scalar, PgPool};

fn new_event(project_id: i64, author_id: i64, ticket_id: Option<i64>) -> NewEvent {
    NewEvent {
        project_id,
        author_id,
        ticket_id,
        reviewer_id: None,
        branch: "feature/ABC-42-login".into(),
        pr_number: Some(7),
        source: Provider::Github,
        event_type: EventType::Opened,
        additions: 10,
        deletions: 2,
        changed_files: 3,
        occurred_at: Utc::now(),
    }
}

#[tokio::test]
async fn entity_upserts_are_idempotent_by_natural_key() -> anyhow::Result<()> {
    let fixture = match DbFixture::from_env() {
        Ok(f) => f,
        Err(err) => {
            eprintln!("skipping entity_upserts_are_idempotent_by_natural_key: {err}");
            return Ok(());
        }
    };
    let handle = fixture.create("entity_upsert").await?;
    let db = PgDatabase::connect(handle.database_url()).await?;

    let first = db
        .projects()
        .upsert(NewProject {
            name: "app".into(),
            repository: "org/app".into(),
        })
        .await?;
    let second = db
        .projects()
        .upsert(NewProject {
            name: "renamed-later".into(),
            repository: "org/app".into(),
        })
        .await?;
    assert_eq!(first.id, second.id);
    // Projects are never mutated after creation.
    assert_eq!(second.name, "app");

    let alice = db.users().upsert("alice").await?;
    assert_eq!(db.users().upsert("alice").await?.id, alice.id);

    let ticket = db.tickets().upsert("ABC-42", first.id).await?;
    assert_eq!(db.tickets().upsert("ABC-42", first.id).await?.id, ticket.id);

    let pool: &PgPool = db.pool();
    let projects: i64 = query_scalar("SELECT COUNT(*) FROM projects")
        .fetch_one(pool)
        .await?;
    assert_eq!(projects, 1);

    handle.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn event_create_writes_raw_payload_and_duplicate_is_found() -> anyhow::Result<()> {
    let fixture = match DbFixture::from_env() {
        Ok(f) => f,
        Err(err) => {
            eprintln!("skipping event_create_writes_raw_payload_and_duplicate_is_found: {err}");
            return Ok(());
        }
    };
    let handle = fixture.create("event_create").await?;
    let db = PgDatabase::connect(handle.database_url()).await?;

    let project = db
        .projects()
        .upsert(NewProject {
            name: "app".into(),
            repository: "org/app".into(),
        })
        .await?;
    let author = db.users().upsert("alice").await?;

    let row = db
        .events()
        .create(
            new_event(project.id, author.id, None),
            json!({"action": "opened"}),
        )
        .await?;

    let pool: &PgPool = db.pool();
    let payloads: i64 = query_scalar("SELECT COUNT(*) FROM raw_payloads WHERE event_id = $1")
        .bind(row.id)
        .fetch_one(pool)
        .await?;
    assert_eq!(payloads, 1);

    // NULL ticket and a matching number still count as the same request.
    let duplicate = db
        .events()
        .find_duplicate(&EventKey {
            author_id: author.id,
            project_id: project.id,
            ticket_id: None,
            pr_number: Some(7),
        })
        .await?;
    assert_eq!(duplicate.map(|e| e.id), Some(row.id));

    let other_number = db
        .events()
        .find_duplicate(&EventKey {
            author_id: author.id,
            project_id: project.id,
            ticket_id: None,
            pr_number: Some(8),
        })
        .await?;
    assert!(other_number.is_none());

    handle.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn latest_event_lookup_orders_by_occurred_at() -> anyhow::Result<()> {
    let fixture = match DbFixture::from_env() {
        Ok(f) => f,
        Err(err) => {
            eprintln!("skipping latest_event_lookup_orders_by_occurred_at: {err}");
            return Ok(());
        }
    };
    let handle = fixture.create("latest_event").await?;
    let db = PgDatabase::connect(handle.database_url()).await?;

    let project = db
        .projects()
        .upsert(NewProject {
            name: "app".into(),
            repository: "org/app".into(),
        })
        .await?;
    let author = db.users().upsert("alice").await?;
    let ticket = db.tickets().upsert("ABC-42", project.id).await?;

    let earlier = NewEvent {
        event_type: EventType::ChangesRequested,
        occurred_at: Utc::now() - Duration::minutes(5),
        ..new_event(project.id, author.id, Some(ticket.id))
    };
    let later = NewEvent {
        event_type: EventType::Pushed,
        occurred_at: Utc::now(),
        ..new_event(project.id, author.id, Some(ticket.id))
    };
    db.events().create(earlier, json!({})).await?;
    let pushed = db.events().create(later, json!({})).await?;

    let latest = db
        .events()
        .latest_for_project_ticket(project.id, Some(ticket.id))
        .await?
        .expect("latest event");
    assert_eq!(latest.id, pushed.id);
    assert_eq!(latest.event_type, EventType::Pushed);

    handle.cleanup().await?;
    Ok(())
}
