use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use ingest::{GithubIngest, GitlabIngest};
use prometheus::Encoder;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, instrument};

use crate::error::{ApiError, ApiResult};

pub struct ApiState {
    pub github: GithubIngest,
    pub gitlab: GitlabIngest,
    pub metrics_path: &'static str,
}

pub fn build_router(state: Arc<ApiState>) -> Router {
    let metrics_path: &'static str = state.metrics_path;
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/webhook", post(github_webhook))
        .route("/webhook/gitlab", post(gitlab_webhook))
        .route(metrics_path, get(metrics))
        .with_state(state)
}

async fn index() -> &'static str {
    "Workflow Insight API is running!"
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[instrument(skip_all)]
async fn github_webhook(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> ApiResult<String> {
    let event_kind = headers
        .get("x-github-event")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::bad_request("missing X-GitHub-Event header"))?
        .to_string();

    let outcome = state.github.handle(&event_kind, &payload).await?;
    Ok(outcome.ack())
}

#[derive(Debug, Deserialize)]
struct GitlabQuery {
    /// Comma-separated target branches that identify distinct projects.
    branches: Option<String>,
}

#[instrument(skip_all)]
async fn gitlab_webhook(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<GitlabQuery>,
    Json(payload): Json<Value>,
) -> String {
    let split_branches: Vec<String> = query
        .branches
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|branch| !branch.is_empty())
        .map(str::to_string)
        .collect();

    // GitLab disables hooks that keep failing; failures are logged and
    // acknowledged instead of surfaced as error statuses.
    match state.gitlab.handle(&payload, &split_branches).await {
        Ok(outcome) => outcome.ack(),
        Err(err) => {
            error!(error = %err, "gitlab webhook processing failed");
            "Webhook event not recorded.".to_string()
        }
    }
}

#[instrument(skip_all)]
async fn metrics() -> ApiResult<impl IntoResponse> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    let content_type = encoder.format_type().to_string();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok((
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, content_type)],
        buffer,
    ))
}
