use http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ScmError {
    #[error("{provider} api error: {status} for {endpoint}")]
    Status {
        provider: &'static str,
        status: StatusCode,
        endpoint: String,
    },
    #[error("{provider} transport error for {endpoint}: {source}")]
    Transport {
        provider: &'static str,
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid {provider} url for {endpoint}: {source}")]
    InvalidUrl {
        provider: &'static str,
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
}

impl ScmError {
    pub fn status(provider: &'static str, status: StatusCode, endpoint: impl Into<String>) -> Self {
        Self::Status {
            provider,
            status,
            endpoint: endpoint.into(),
        }
    }

    pub fn transport(
        provider: &'static str,
        endpoint: impl Into<String>,
        source: reqwest::Error,
    ) -> Self {
        Self::Transport {
            provider,
            endpoint: endpoint.into(),
            source,
        }
    }

    pub fn invalid_url(
        provider: &'static str,
        endpoint: impl Into<String>,
        source: url::ParseError,
    ) -> Self {
        Self::InvalidUrl {
            provider,
            endpoint: endpoint.into(),
            source,
        }
    }
}
