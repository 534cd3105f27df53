use std::sync::Arc;

use anyhow::Result;
use api::{build_router, ApiState};
use axum::Router;
use common::{config::AppConfig, logging};
use db::pg::PgDatabase;
use db::Repositories;
use ingest::{GithubIngest, GitlabIngest};
use scm_client::{ReqwestGithubApi, ReqwestGitlabApi};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_logging("info");
    let config = AppConfig::load()?;

    let database = Arc::new(PgDatabase::connect(&config.database.url).await?);
    let repositories: Arc<dyn Repositories> = database.clone();

    let http = reqwest::Client::new();
    let github_api = Arc::new(ReqwestGithubApi::new(
        http.clone(),
        &config.github,
        config.ingest.page_size,
    )?);
    let gitlab_api = Arc::new(ReqwestGitlabApi::new(http, &config.gitlab)?);

    let metrics_path: &'static str =
        Box::leak(config.observability.metrics_path.clone().into_boxed_str());
    let state = Arc::new(ApiState {
        github: GithubIngest::new(repositories.clone(), github_api, config.ingest.clone()),
        gitlab: GitlabIngest::new(repositories, gitlab_api, config.ingest.clone()),
        metrics_path,
    });
    let app: Router = build_router(state);

    let addr: std::net::SocketAddr = config.server.bind.parse()?;
    info!("webhook listener on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
