use common::errors::{AppError, Result};
use db::models::{EventRow, EventType, RevisionRow};
use db::Repositories;
use tracing::info;

use crate::metrics;

/// Links a push to the reviewer whose change request it addresses.
pub struct RevisionTracker<'a> {
    repos: &'a dyn Repositories,
}

impl<'a> RevisionTracker<'a> {
    pub fn new(repos: &'a dyn Repositories) -> Self {
        Self { repos }
    }

    /// `prior` is the tip of the project/ticket timeline captured before
    /// the push event was inserted. A revision is recorded only when that
    /// prior event is an unanswered change request with a known reviewer.
    pub async fn link(
        &self,
        push_event: &EventRow,
        prior: Option<&EventRow>,
    ) -> Result<Option<RevisionRow>> {
        let Some(prior) = prior else {
            return Ok(None);
        };
        if prior.event_type != EventType::ChangesRequested {
            return Ok(None);
        }
        let Some(reviewer_id) = prior.reviewer_id else {
            return Ok(None);
        };

        let revision = self
            .repos
            .revisions()
            .create(push_event.id, reviewer_id)
            .await
            .map_err(AppError::db)?;
        metrics::REVISIONS_RECORDED_TOTAL.inc();
        info!(
            event_id = push_event.id,
            reviewer_id, "push recorded as revision of a change request"
        );
        Ok(Some(revision))
    }
}
