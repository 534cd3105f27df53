use common::errors::{AppError, Result};
use db::models::{EventKey, EventRow, NewEvent};
use db::Repositories;
use serde_json::Value;
use tracing::debug;

use crate::metrics;

#[derive(Debug, Clone)]
pub enum WriteOutcome {
    Created(EventRow),
    Duplicate(EventRow),
}

/// Sole writer of the event and raw-payload tables. Applies the
/// idempotency guard for non-always-create kinds, then persists the event
/// and its untouched payload as one transactional write.
pub struct EventWriter<'a> {
    repos: &'a dyn Repositories,
}

impl<'a> EventWriter<'a> {
    pub fn new(repos: &'a dyn Repositories) -> Self {
        Self { repos }
    }

    pub async fn record(&self, event: NewEvent, raw_payload: &Value) -> Result<WriteOutcome> {
        if !event.event_type.is_always_create() {
            let key = EventKey {
                author_id: event.author_id,
                project_id: event.project_id,
                ticket_id: event.ticket_id,
                pr_number: event.pr_number,
            };
            if let Some(existing) = self
                .repos
                .events()
                .find_duplicate(&key)
                .await
                .map_err(AppError::db)?
            {
                debug!(
                    event_id = existing.id,
                    pr_number = ?key.pr_number,
                    "equivalent event already recorded; skipping insert"
                );
                metrics::DUPLICATES_SKIPPED_TOTAL.inc();
                return Ok(WriteOutcome::Duplicate(existing));
            }
        }

        let row = self
            .repos
            .events()
            .create(event, raw_payload.clone())
            .await
            .map_err(AppError::db)?;
        metrics::EVENTS_RECORDED_TOTAL
            .with_label_values(&[row.source.as_str(), row.event_type.as_str()])
            .inc();
        Ok(WriteOutcome::Created(row))
    }
}
