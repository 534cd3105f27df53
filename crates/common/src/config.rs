use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub github: GithubConfig,
    pub gitlab: GitlabConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(".")
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Config::builder()
            .add_source(
                File::with_name(
                    path.as_ref()
                        .join("config/default")
                        .to_string_lossy()
                        .as_ref(),
                )
                .required(false),
            )
            .add_source(
                File::with_name(
                    path.as_ref()
                        .join("config/local")
                        .to_string_lossy()
                        .as_ref(),
                )
                .required(false),
            )
            .add_source(Environment::default().separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default)]
    pub test_admin_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    pub token: String,
    #[serde(default = "GithubConfig::default_api_base")]
    pub api_base: String,
    pub user_agent: String,
}

impl GithubConfig {
    fn default_api_base() -> String {
        "https://api.github.com".to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitlabConfig {
    pub token: String,
    #[serde(default = "GitlabConfig::default_api_base")]
    pub api_base: String,
}

impl GitlabConfig {
    fn default_api_base() -> String {
        "https://gitlab.com/api/v4".to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "IngestConfig::default_ignored_branch_prefixes")]
    pub ignored_branch_prefixes: Vec<String>,
    #[serde(default = "IngestConfig::default_page_size")]
    pub page_size: u32,
}

impl IngestConfig {
    fn default_ignored_branch_prefixes() -> Vec<String> {
        ["dev", "develop", "staging", "main", "prod", "production"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    const fn default_page_size() -> u32 {
        100
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            ignored_branch_prefixes: Self::default_ignored_branch_prefixes(),
            page_size: Self::default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "ObservabilityConfig::default_metrics_path")]
    pub metrics_path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_path: Self::default_metrics_path(),
        }
    }
}

impl ObservabilityConfig {
    fn default_metrics_path() -> String {
        "/metrics".to_string()
    }
}
