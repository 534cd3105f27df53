use async_trait::async_trait;
use common::config::GithubConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::diff::FileDiff;
use crate::error::ScmError;

const PROVIDER: &str = "github";

#[async_trait]
pub trait GithubApi: Send + Sync {
    /// Per-file listing of a pull request, fully paginated.
    async fn pull_request_files(
        &self,
        repository: &str,
        number: i64,
    ) -> Result<Vec<FileDiff>, ScmError>;
    /// Per-file listing of a commit range.
    async fn compare(
        &self,
        repository: &str,
        base: &str,
        head: &str,
    ) -> Result<Vec<FileDiff>, ScmError>;
    /// Per-file listing of a single commit, for ranges with no base.
    async fn commit_files(&self, repository: &str, sha: &str) -> Result<Vec<FileDiff>, ScmError>;
}

pub struct ReqwestGithubApi {
    client: reqwest::Client,
    base: Url,
    token: String,
    user_agent: String,
    page_size: u32,
}

#[derive(Debug, Deserialize)]
struct FilesEnvelope {
    #[serde(default)]
    files: Vec<FileDiff>,
}

impl ReqwestGithubApi {
    pub fn new(
        client: reqwest::Client,
        config: &GithubConfig,
        page_size: u32,
    ) -> Result<Self, url::ParseError> {
        let mut base = config.api_base.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            client,
            base: Url::parse(&base)?,
            token: config.token.clone(),
            user_agent: config.user_agent.clone(),
            page_size,
        })
    }

    fn join(&self, path: &str) -> Result<Url, ScmError> {
        self.base
            .join(path)
            .map_err(|err| ScmError::invalid_url(PROVIDER, path, err))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ScmError> {
        let endpoint = url.path().trim_start_matches('/').to_string();
        debug!(endpoint = %endpoint, "dispatching github request");
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .header(http::header::USER_AGENT, self.user_agent.clone())
            .header(http::header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .send()
            .await
            .map_err(|err| ScmError::transport(PROVIDER, endpoint.clone(), err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScmError::status(PROVIDER, status, endpoint));
        }
        response
            .json::<T>()
            .await
            .map_err(|err| ScmError::transport(PROVIDER, endpoint, err))
    }
}

#[async_trait]
impl GithubApi for ReqwestGithubApi {
    async fn pull_request_files(
        &self,
        repository: &str,
        number: i64,
    ) -> Result<Vec<FileDiff>, ScmError> {
        let mut files = Vec::new();
        let mut page = 1u32;
        loop {
            let mut url = self.join(&format!("repos/{repository}/pulls/{number}/files"))?;
            url.query_pairs_mut()
                .append_pair("per_page", &self.page_size.to_string())
                .append_pair("page", &page.to_string());

            let batch: Vec<FileDiff> = self.get_json(url).await?;
            let batch_len = batch.len();
            files.extend(batch);
            if batch_len < self.page_size as usize {
                break;
            }
            page += 1;
        }
        Ok(files)
    }

    async fn compare(
        &self,
        repository: &str,
        base: &str,
        head: &str,
    ) -> Result<Vec<FileDiff>, ScmError> {
        let url = self.join(&format!("repos/{repository}/compare/{base}...{head}"))?;
        let envelope: FilesEnvelope = self.get_json(url).await?;
        Ok(envelope.files)
    }

    async fn commit_files(&self, repository: &str, sha: &str) -> Result<Vec<FileDiff>, ScmError> {
        let url = self.join(&format!("repos/{repository}/commits/{sha}"))?;
        let envelope: FilesEnvelope = self.get_json(url).await?;
        Ok(envelope.files)
    }
}
