pub mod classify;
pub mod github;
pub mod gitlab;

pub use classify::{classify_github, classify_gitlab, Classification};

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("malformed {provider} {kind} payload: {source}")]
    Malformed {
        provider: &'static str,
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("delivery carries no event kind field")]
    MissingKind,
}

impl NormalizeError {
    pub fn malformed(
        provider: &'static str,
        kind: impl Into<String>,
        source: serde_json::Error,
    ) -> Self {
        Self::Malformed {
            provider,
            kind: kind.into(),
            source,
        }
    }
}
