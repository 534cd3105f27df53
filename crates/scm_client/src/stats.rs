//! Diff-stat enrichment with the upstream-failure policy applied: any
//! transport or non-2xx failure is logged and surfaced as `None`, never
//! propagated. Callers that require stats before writing an event treat
//! `None` as a terminal failure for the delivery.

use tracing::warn;

use crate::diff::{totals_from_files, totals_from_text_diffs, DiffTotals, ZERO_SHA};
use crate::github::GithubApi;
use crate::gitlab::GitlabApi;

pub async fn github_pull_request_totals(
    api: &dyn GithubApi,
    repository: &str,
    number: i64,
) -> Option<DiffTotals> {
    match api.pull_request_files(repository, number).await {
        Ok(files) => Some(totals_from_files(&files)),
        Err(err) => {
            warn!(repository, number, error = %err, "failed to fetch pull request files");
            None
        }
    }
}

/// Stats for a pushed commit range. A zero base means the branch had no
/// prior history and only the head commit can be diffed.
pub async fn github_push_totals(
    api: &dyn GithubApi,
    repository: &str,
    before: &str,
    after: &str,
) -> Option<DiffTotals> {
    let files = if before == ZERO_SHA {
        api.commit_files(repository, after).await
    } else {
        api.compare(repository, before, after).await
    };
    match files {
        Ok(files) => Some(totals_from_files(&files)),
        Err(err) => {
            warn!(repository, before, after, error = %err, "failed to fetch push commit stats");
            None
        }
    }
}

pub async fn gitlab_merge_request_totals(
    api: &dyn GitlabApi,
    project_id: i64,
    iid: i64,
) -> Option<DiffTotals> {
    match api.merge_request_changes(project_id, iid).await {
        Ok(changes) => Some(totals_from_text_diffs(&changes.changes)),
        Err(err) => {
            warn!(project_id, iid, error = %err, "failed to fetch merge request changes");
            None
        }
    }
}

pub async fn gitlab_push_totals(
    api: &dyn GitlabApi,
    project_id: i64,
    before: &str,
    after: &str,
) -> Option<DiffTotals> {
    let diffs = if before == ZERO_SHA {
        api.commit_diff(project_id, after).await
    } else {
        api.compare(project_id, before, after).await
    };
    match diffs {
        Ok(diffs) => Some(totals_from_text_diffs(&diffs)),
        Err(err) => {
            warn!(project_id, before, after, error = %err, "failed to fetch push compare stats");
            None
        }
    }
}
