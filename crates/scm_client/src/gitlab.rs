use async_trait::async_trait;
use common::config::GitlabConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::diff::TextDiff;
use crate::error::ScmError;

const PROVIDER: &str = "gitlab";
const PRIVATE_TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Merge-request changes plus the discussion state the revision gate
/// needs; fetched fresh at push time.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeRequestChanges {
    #[serde(default)]
    pub changes: Vec<TextDiff>,
    /// Missing from the response means no gate signal; treated as
    /// resolved so no revision is inferred.
    #[serde(default = "default_resolved")]
    pub blocking_discussions_resolved: bool,
}

fn default_resolved() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct CompareEnvelope {
    #[serde(default)]
    diffs: Vec<TextDiff>,
}

#[derive(Debug, Deserialize)]
struct MergeRequestSummary {
    iid: i64,
}

#[async_trait]
pub trait GitlabApi: Send + Sync {
    async fn merge_request_changes(
        &self,
        project_id: i64,
        iid: i64,
    ) -> Result<MergeRequestChanges, ScmError>;
    async fn compare(
        &self,
        project_id: i64,
        from: &str,
        to: &str,
    ) -> Result<Vec<TextDiff>, ScmError>;
    async fn commit_diff(&self, project_id: i64, sha: &str) -> Result<Vec<TextDiff>, ScmError>;
    /// The iid of the open merge request with the given source branch,
    /// if one exists.
    async fn open_merge_request_iid(
        &self,
        project_id: i64,
        source_branch: &str,
    ) -> Result<Option<i64>, ScmError>;
}

pub struct ReqwestGitlabApi {
    client: reqwest::Client,
    base: Url,
    token: String,
}

impl ReqwestGitlabApi {
    pub fn new(client: reqwest::Client, config: &GitlabConfig) -> Result<Self, url::ParseError> {
        let mut base = config.api_base.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            client,
            base: Url::parse(&base)?,
            token: config.token.clone(),
        })
    }

    fn join(&self, path: &str) -> Result<Url, ScmError> {
        self.base
            .join(path)
            .map_err(|err| ScmError::invalid_url(PROVIDER, path, err))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ScmError> {
        let endpoint = url.path().trim_start_matches('/').to_string();
        debug!(endpoint = %endpoint, "dispatching gitlab request");
        let response = self
            .client
            .get(url)
            .header(PRIVATE_TOKEN_HEADER, self.token.clone())
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
impl GitlabApi for ReqwestGitlabApi {
    async fn merge_request_changes(
        &self,
        project_id: i64,
        iid: i64,
    ) -> Result<MergeRequestChanges, ScmError> {
        let url = self.join(&format!("projects/{project_id}/merge_requests/{iid}/changes"))?;
        self.get_json(url).await
    }

    async fn compare(
        &self,
        project_id: i64,
        from: &str,
        to: &str,
    ) -> Result<Vec<TextDiff>, ScmError> {
        let mut url = self.join(&format!("projects/{project_id}/repository/compare"))?;
        url.query_pairs_mut()
            .append_pair("from", from)
            .append_pair("to", to);
        let envelope: CompareEnvelope = self.get_json(url).await?;
        Ok(envelope.diffs)
    }

    async fn commit_diff(&self, project_id: i64, sha: &str) -> Result<Vec<TextDiff>, ScmError> {
        let url = self.join(&format!("projects/{project_id}/repository/commits/{sha}/diff"))?;
        self.get_json(url).await
    }

    async fn open_merge_request_iid(
        &self,
        project_id: i64,
        source_branch: &str,
    ) -> Result<Option<i64>, ScmError> {
        let mut url = self.join(&format!("projects/{project_id}/merge_requests"))?;
        url.query_pairs_mut()
            .append_pair("state", "opened")
            .append_pair("source_branch", source_branch);
        let open: Vec<MergeRequestSummary> = self.get_json(url).await?;
        Ok(open.first().map(|mr| mr.iid))
    }
}
