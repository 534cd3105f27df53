use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use common::branch;
use common::config::IngestConfig;
use common::errors::{AppError, Result};
use db::models::{NewEvent, Provider};
use db::{EventType, Repositories};
use normalizer::classify::{classify_github, Classification};
use normalizer::github::{GithubEvent, GithubKind, LifecyclePayload, PushPayload};
use scm_client::{stats, GithubApi};
use serde_json::Value;
use tracing::instrument;

use crate::resolver::{EntityResolver, ProjectKey, ResolveMode};
use crate::revision::RevisionTracker;
use crate::writer::{EventWriter, WriteOutcome};
use crate::{ignored, metrics, IgnoreReason, Outcome};

/// Commits created through the GitHub UI (merge button, suggestions) are
/// committed by this actor and carry no author signal.
const GITHUB_BOT_COMMITTER: &str = "GitHub";

pub struct GithubIngest {
    repos: Arc<dyn Repositories>,
    api: Arc<dyn GithubApi>,
    config: IngestConfig,
}

impl GithubIngest {
    pub fn new(
        repos: Arc<dyn Repositories>,
        api: Arc<dyn GithubApi>,
        config: IngestConfig,
    ) -> Self {
        Self { repos, api, config }
    }

    #[instrument(skip(self, payload))]
    pub async fn handle(&self, event_kind: &str, payload: &Value) -> Result<Outcome> {
        metrics::WEBHOOKS_RECEIVED_TOTAL
            .with_label_values(&["github"])
            .inc();
        let _timer = metrics::INGEST_DURATION
            .with_label_values(&["github"])
            .start_timer();

        let event = normalizer::github::parse(event_kind, payload)
            .map_err(|err| AppError::invalid_payload(err.to_string()))?;

        match event {
            GithubEvent::Unsupported { .. } => {
                Ok(ignored(Provider::Github, IgnoreReason::WrongEventKind))
            }
            GithubEvent::Push(push) => self.handle_push(push, payload).await,
            GithubEvent::Lifecycle { kind, payload: lifecycle } => {
                self.handle_lifecycle(kind, lifecycle, payload).await
            }
        }
    }

    async fn handle_lifecycle(
        &self,
        kind: GithubKind,
        lifecycle: LifecyclePayload,
        raw: &Value,
    ) -> Result<Outcome> {
        let branch_name = lifecycle.pull_request.head.branch.clone();
        if branch::is_ignored(&branch_name, &self.config.ignored_branch_prefixes) {
            return Ok(ignored(Provider::Github, IgnoreReason::IgnoredBranch));
        }

        let event_type = match classify_github(kind, &lifecycle) {
            Classification::Event(event_type) => event_type,
            Classification::Unhandled => {
                return Ok(ignored(Provider::Github, IgnoreReason::UnhandledAction))
            }
        };

        let repository = &lifecycle.repository;
        let number = lifecycle.pull_request.number;

        // Stats come first: when the provider cannot describe the change,
        // the delivery fails before anything is written.
        let totals = stats::github_pull_request_totals(
            self.api.as_ref(),
            &repository.full_name,
            number,
        )
        .await
        .ok_or_else(|| {
            metrics::UPSTREAM_ERRORS_TOTAL
                .with_label_values(&["github", "pull_request_files"])
                .inc();
            AppError::upstream(anyhow!(
                "diff stats unavailable for {}#{number}",
                repository.full_name
            ))
        })?;

        let ticket_code = branch::ticket_code(&branch_name);
        let resolver = EntityResolver::new(self.repos.as_ref());
        let key = ProjectKey::new(&repository.full_name, &repository.name);

        // Opening a request is the one place entities may come into
        // existence; every later transition must find them.
        let mode = if event_type == EventType::Opened {
            ResolveMode::Upsert
        } else {
            ResolveMode::Require
        };
        let project = resolver.project(&key, mode).await?;
        let author = resolver
            .user(&lifecycle.pull_request.user.login, mode)
            .await?;
        let ticket = resolver
            .ticket(ticket_code.as_deref(), project.id, mode)
            .await?;

        let reviewer = match &lifecycle.review {
            Some(review) => Some(
                resolver
                    .user(&review.user.login, ResolveMode::Upsert)
                    .await?,
            ),
            None if kind == GithubKind::ReviewThread => match &lifecycle.sender {
                Some(sender) => Some(resolver.user(&sender.login, ResolveMode::Upsert).await?),
                None => None,
            },
            None => None,
        };

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
                    reviewer_id: reviewer.map(|r| r.id),
                    branch: branch_name,
                    pr_number: Some(number),
                    source: Provider::Github,
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
                let revision = if event_type == EventType::Pushed {
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

    async fn handle_push(&self, push: PushPayload, raw: &Value) -> Result<Outcome> {
        if push
            .head_commit
            .as_ref()
            .is_some_and(|commit| commit.committer.name == GITHUB_BOT_COMMITTER)
        {
            return Ok(ignored(Provider::Github, IgnoreReason::BotPush));
        }

        let branch_name = branch::strip_ref_prefix(&push.git_ref).to_string();
        if branch::is_ignored(&branch_name, &self.config.ignored_branch_prefixes) {
            return Ok(ignored(Provider::Github, IgnoreReason::IgnoredBranch));
        }

        let resolver = EntityResolver::new(self.repos.as_ref());
        let project = resolver
            .project(
                &ProjectKey::new(&push.repository.full_name, &push.repository.name),
                ResolveMode::Upsert,
            )
            .await?;
        let author = resolver
            .user(&push.pusher.name, ResolveMode::Upsert)
            .await?;
        let ticket = resolver
            .ticket(
                branch::ticket_code(&branch_name).as_deref(),
                project.id,
                ResolveMode::Require,
            )
            .await?;

        let totals = stats::github_push_totals(
            self.api.as_ref(),
            &push.repository.full_name,
            &push.before,
            &push.after,
        )
        .await
        .ok_or_else(|| {
            metrics::UPSTREAM_ERRORS_TOTAL
                .with_label_values(&["github", "compare"])
                .inc();
            AppError::upstream(anyhow!(
                "push stats unavailable for {} {}..{}",
                push.repository.full_name,
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
                    pr_number: None,
                    source: Provider::Github,
                    event_type: EventType::Pushed,
                    additions: totals.additions,
                    deletions: totals.deletions,
                    // The push payload already names the touched files.
                    changed_files: push.changed_file_count(),
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
