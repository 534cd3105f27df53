pub mod diff;
pub mod error;
pub mod github;
pub mod gitlab;
pub mod stats;

pub use diff::{DiffTotals, FileDiff, TextDiff, ZERO_SHA};
pub use error::ScmError;
pub use github::{GithubApi, ReqwestGithubApi};
pub use gitlab::{GitlabApi, MergeRequestChanges, ReqwestGitlabApi};
