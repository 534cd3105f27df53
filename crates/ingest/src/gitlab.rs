use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use common::branch;
use common::config::IngestConfig;
use common::errors::{AppError, Result};
use db::models::{NewEvent, Provider};
use db::{EventType, Repositories};
use normalizer::classify::{classify_gitlab_merge_request, classify_gitlab_note, Classification};
use normalizer::gitlab::{GitlabEvent, MergeRequestPayload, NotePayload, PushPayload};
use scm_client::diff::totals_from_text_diffs;
use scm_client::{stats, GitlabApi};
use serde_json::Value;
use tracing::{instrument, warn};

use crate::resolver::{EntityResolver, ProjectKey, ResolveMode};
use crate::revision::RevisionTracker;
use crate::writer::{EventWriter, WriteOutcome};
use crate::{ignored, metrics, IgnoreReason, Outcome};

pub struct GitlabIngest {
    repos: Arc<dyn Repositories>,
    api: Arc<dyn GitlabApi>,
    config: IngestConfig,
}

impl GitlabIngest {
    pub fn new(
        repos: Arc<dyn Repositories>,
        api: Arc<dyn GitlabApi>,
        config: IngestConfig,
    ) -> Self {
        Self { repos, api, config }
    }

    /// `split_branches` lists target branches that identify distinct
    /// projects within one repository, per delivery (query parameter).
    #[instrument(skip(self, payload, split_branches))]
    pub async fn handle(&self, payload: &Value, split_branches: &[String]) -> Result<Outcome> {
        metrics::WEBHOOKS_RECEIVED_TOTAL
            .with_label_values(&["gitlab"])
            .inc();
        let _timer = metrics::INGEST_DURATION
            .with_label_values(&["gitlab"])
            .start_timer();

        let event = normalizer::gitlab::parse(payload)
            .map_err(|err| AppError::invalid_payload(err.to_string()))?;

        match event {
            GitlabEvent::Unsupported { .. } => {
                Ok(ignored(Provider::Gitlab, IgnoreReason::WrongEventKind))
            }
            GitlabEvent::MergeRequest(mr) => {
                self.handle_merge_request(mr, payload, split_branches).await
            }
            GitlabEvent::Note(note) => self.handle_note(note, payload, split_branches).await,
            GitlabEvent::Push(push) => self.handle_push(push, payload).await,
        }
    }

    async fn handle_merge_request(
        &self,
        mr: MergeRequestPayload,
        raw: &Value,
        split_branches: &[String],
    ) -> Result<Outcome> {
        let attrs = &mr.object_attributes;
        let branch_name = attrs.source_branch.clone();
        if branch::is_ignored(&branch_name, &self.config.ignored_branch_prefixes) {
            return Ok(ignored(Provider::Gitlab, IgnoreReason::IgnoredBranch));
        }

        let event_type = match classify_gitlab_merge_request(attrs.action.as_deref()) {
            Classification::Event(event_type) => event_type,
            Classification::Unhandled => {
                return Ok(ignored(Provider::Gitlab, IgnoreReason::UnhandledAction))
            }
        };

        let key = ProjectKey::with_target_branch(
            &mr.project.path_with_namespace,
            &mr.project.name,
            &attrs.target_branch,
            split_branches,
        );
        let resolver = EntityResolver::new(self.repos.as_ref());
        let project = resolver.project(&key, ResolveMode::Upsert).await?;
        let author = resolver
            .user(&mr.user.username, ResolveMode::Upsert)
            .await?;
        let ticket_mode = if event_type == EventType::Opened {
            ResolveMode::Upsert
        } else {
            ResolveMode::Require
        };
        let ticket = resolver
            .ticket(
                branch::ticket_code(&branch_name).as_deref(),
                project.id,
                ticket_mode,
            )
            .await?;

        // Close, reopen and (un)approval deliveries are sent by the acting
        // reviewer; open, merge and update are authored transitions.
        let reviewer_id = match event_type {
            EventType::Dismissed
            | EventType::Reopen
            | EventType::Approved
            | EventType::Unapproved => Some(author.id),
            _ => None,
        };

        let changes = match self
            .api
            .merge_request_changes(mr.project.id, attrs.iid)
            .await
        {
            Ok(changes) => changes,
            Err(err) => {
                warn!(
                    project_id = mr.project.id,
                    iid = attrs.iid,
                    error = %err,
                    "failed to fetch merge request changes"
                );
                metrics::UPSTREAM_ERRORS_TOTAL
                    .with_label_values(&["gitlab", "merge_request_changes"])
                    .inc();
                return Err(AppError::upstream(anyhow!(
                    "diff stats unavailable for merge request !{}",
                    attrs.iid
                )));
            }
        };
        let totals = totals_from_text_diffs(&changes.changes);

        let ticket_id = ticket.as_ref().map(|t| t.id);
        let prior = if event_type == EventType::Pushed {
            self.repos
                .events()
                .latest_for_project_ticket(project.id, ticket_id)
                .await
                .map_err(AppError::db)?
        } else {
            None
        };

        let writer = EventWriter::new(self.repos.as_ref());
        let outcome = writer
            .record(
                NewEvent {
                    project_id: project.id,
                    author_id: author.id,
                    ticket_id,
                    reviewer_id,
                    branch: branch_name,
                    pr_number: Some(attrs.iid),
                    source: Provider::Gitlab,
                    event_type,
                    additions: totals.additions,
                    deletions: totals.deletions,
                    changed_files: totals.changed_files,
                    occurred_at: Utc::now(),
                },
                raw,
            )
            .await?;

        match outcome {
            WriteOutcome::Duplicate(event) => Ok(Outcome::Duplicate { event }),
            WriteOutcome::Created(event) => {
                // A push against a request with unresolved discussions is
                // the author answering a review; anything else is not.
                let revision = if event_type == EventType::Pushed
                    && !changes.blocking_discussions_resolved
                {
                    RevisionTracker::new(self.repos.as_ref())
                        .link(&event, prior.as_ref())
                        .await?
                } else {
                    None
                };
                Ok(Outcome::Recorded { event, revision })
            }
        }
    }

    async fn handle_note(
        &self,
        note: NotePayload,
        raw: &Value,
        split_branches: &[String],
    ) -> Result<Outcome> {
        let Some(mr_ref) = &note.merge_request else {
            // Notes on commits, issues or snippets carry no review signal.
            return Ok(ignored(Provider::Gitlab, IgnoreReason::UnhandledAction));
        };
        let branch_name = mr_ref.source_branch.clone();
        if branch::is_ignored(&branch_name, &self.config.ignored_branch_prefixes) {
            return Ok(ignored(Provider::Gitlab, IgnoreReason::IgnoredBranch));
        }

        let event_type = match classify_gitlab_note(note.object_attributes.note_type.as_deref()) {
            Classification::Event(event_type) => event_type,
            Classification::Unhandled => {
                return Ok(ignored(Provider::Gitlab, IgnoreReason::UnhandledAction))
            }
        };

        // A review comment presumes the opening delivery was seen; a miss
        // here is a data-consistency error, not a creation point.
        let key = ProjectKey::with_target_branch(
            &note.project.path_with_namespace,
            &note.project.name,
            &mr_ref.target_branch,
            split_branches,
        );
        let resolver = EntityResolver::new(self.repos.as_ref());
        let project = resolver.project(&key, ResolveMode::Require).await?;
        let commenter = resolver
            .user(&note.user.username, ResolveMode::Require)
            .await?;
        let ticket = resolver
            .ticket(
                branch::ticket_code(&branch_name).as_deref(),
                project.id,
                ResolveMode::Require,
            )
            .await?;

        let totals = stats::gitlab_merge_request_totals(self.api.as_ref(), note.project.id, mr_ref.iid)
            .await
            .ok_or_else(|| {
                metrics::UPSTREAM_ERRORS_TOTAL
                    .with_label_values(&["gitlab", "merge_request_changes"])
                    .inc();
                AppError::upstream(anyhow!(
                    "diff stats unavailable for merge request !{}",
                    mr_ref.iid
                ))
            })?;

        let writer = EventWriter::new(self.repos.as_ref());
        let outcome = writer
            .record(
                NewEvent {
                    project_id: project.id,
                    author_id: commenter.id,
                    ticket_id: ticket.as_ref().map(|t| t.id),
                    reviewer_id: Some(commenter.id),
                    branch: branch_name,
                    pr_number: Some(mr_ref.iid),
                    source: Provider::Gitlab,
                    event_type,
                    additions: totals.additions,
                    deletions: totals.deletions,
                    changed_files: totals.changed_files,
                    occurred_at: Utc::now(),
                },
                raw,
            )
            .await?;

        match outcome {
            WriteOutcome::Created(event) => Ok(Outcome::Recorded {
                event,
                revision: None,
            }),
            WriteOutcome::Duplicate(event) => Ok(Outcome::Duplicate { event }),
        }
    }

    async fn handle_push(&self, push: PushPayload, raw: &Value) -> Result<Outcome> {
        let branch_name = branch::strip_ref_prefix(&push.git_ref).to_string();
        if branch::is_ignored(&branch_name, &self.config.ignored_branch_prefixes) {
            return Ok(ignored(Provider::Gitlab, IgnoreReason::IgnoredBranch));
        }

        // Best effort: a push to a branch with an open merge request keeps
        // the request number on the event; lookup failures degrade to a
        // bare push rather than dropping the delivery.
        let iid = match self
            .api
            .open_merge_request_iid(push.project.id, &branch_name)
            .await
        {
            Ok(iid) => iid,
            Err(err) => {
                warn!(
                    project_id = push.project.id,
                    branch = %branch_name,
                    error = %err,
                    "failed to look up open merge request for branch"
                );
                metrics::UPSTREAM_ERRORS_TOTAL
                    .with_label_values(&["gitlab", "open_merge_requests"])
                    .inc();
                None
            }
        };

        let resolver = EntityResolver::new(self.repos.as_ref());
        let project = resolver
            .project(
                &ProjectKey::new(&push.project.path_with_namespace, &push.project.name),
                ResolveMode::Upsert,
            )
            .await?;
        let author = resolver
            .user(&push.user_username, ResolveMode::Upsert)
            .await?;
        let ticket = resolver
            .ticket(
                branch::ticket_code(&branch_name).as_deref(),
                project.id,
                ResolveMode::Require,
            )
            .await?;

        let totals = stats::gitlab_push_totals(
            self.api.as_ref(),
            push.project.id,
            &push.before,
            &push.after,
        )
        .await
        .ok_or_else(|| {
            metrics::UPSTREAM_ERRORS_TOTAL
                .with_label_values(&["gitlab", "compare"])
                .inc();
            AppError::upstream(anyhow!(
                "push stats unavailable for project {} {}..{}",
                push.project.id,
                push.before,
                push.after
            ))
        })?;

        let writer = EventWriter::new(self.repos.as_ref());
        let outcome = writer
            .record(
                NewEvent {
                    project_id: project.id,
                    author_id: author.id,
                    ticket_id: ticket.as_ref().map(|t| t.id),
                    reviewer_id: None,
                    branch: branch_name,
                    pr_number: iid,
                    source: Provider::Gitlab,
                    event_type: EventType::Pushed,
                    additions: totals.additions,
                    deletions: totals.deletions,
                    changed_files: totals.changed_files,
                    occurred_at: Utc::now(),
                },
                raw,
            )
            .await?;

        match outcome {
            WriteOutcome::Created(event) => Ok(Outcome::Recorded {
                event,
                revision: None,
            }),
            WriteOutcome::Duplicate(event) => Ok(Outcome::Duplicate { event }),
        }
    }
}
