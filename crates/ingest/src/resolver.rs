use common::errors::{AppError, Result};
use db::models::{NewProject, ProjectRow, TicketRow, UserRow};
use db::Repositories;

/// Whether a lookup may create the entity on first sight or must find an
/// existing row. A `Require` miss means the opening event was missed or
/// mis-routed; the delivery fails rather than inventing history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    Upsert,
    Require,
}

/// Identity of the project a delivery belongs to. Normally the repository
/// path alone; when the delivery targets one of the configured split
/// branches the branch becomes part of the identity, so branch-per-project
/// repositories map to distinct projects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectKey {
    pub repository: String,
    pub name: String,
}

impl ProjectKey {
    pub fn new(repository: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            name: name.into(),
        }
    }

    pub fn with_target_branch(
        repository: &str,
        name: &str,
        target_branch: &str,
        split_branches: &[String],
    ) -> Self {
        if split_branches.iter().any(|b| b == target_branch) {
            Self {
                repository: format!("{repository}@{target_branch}"),
                name: format!("{name} ({target_branch})"),
            }
        } else {
            Self::new(repository, name)
        }
    }
}

pub struct EntityResolver<'a> {
    repos: &'a dyn Repositories,
}

impl<'a> EntityResolver<'a> {
    pub fn new(repos: &'a dyn Repositories) -> Self {
        Self { repos }
    }

    pub async fn project(&self, key: &ProjectKey, mode: ResolveMode) -> Result<ProjectRow> {
        match mode {
            ResolveMode::Upsert => self
                .repos
                .projects()
                .upsert(NewProject {
                    name: key.name.clone(),
                    repository: key.repository.clone(),
                })
                .await
                .map_err(AppError::db),
            ResolveMode::Require => self
                .repos
                .projects()
                .find_by_repository(&key.repository)
                .await
                .map_err(AppError::db)?
                .ok_or(AppError::MissingEntity("project")),
        }
    }

    pub async fn user(&self, username: &str, mode: ResolveMode) -> Result<UserRow> {
        match mode {
            ResolveMode::Upsert => self
                .repos
                .users()
                .upsert(username)
                .await
                .map_err(AppError::db),
            ResolveMode::Require => self
                .repos
                .users()
                .find_by_username(username)
                .await
                .map_err(AppError::db)?
                .ok_or(AppError::MissingEntity("user")),
        }
    }

    /// Tickets are optional in both modes; `Require` merely refuses to
    /// create one outside the opening flow.
    pub async fn ticket(
        &self,
        code: Option<&str>,
        project_id: i64,
        mode: ResolveMode,
    ) -> Result<Option<TicketRow>> {
        let Some(code) = code else {
            return Ok(None);
        };
        match mode {
            ResolveMode::Upsert => self
                .repos
                .tickets()
                .upsert(code, project_id)
                .await
                .map(Some)
                .map_err(AppError::db),
            ResolveMode::Require => self
                .repos
                .tickets()
                .find_by_code(code)
                .await
                .map_err(AppError::db),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split() -> Vec<String> {
        vec!["release".to_string(), "hotfix".to_string()]
    }

    #[test]
    fn plain_target_branch_keeps_repository_identity() {
        let key = ProjectKey::with_target_branch("org/app", "app", "integration", &split());
        assert_eq!(key.repository, "org/app");
        assert_eq!(key.name, "app");
    }

    #[test]
    fn split_target_branch_extends_identity() {
        let key = ProjectKey::with_target_branch("org/app", "app", "release", &split());
        assert_eq!(key.repository, "org/app@release");
        assert_eq!(key.name, "app (release)");
    }
}
