//! Hand-written doubles: an in-memory `Repositories` implementation and
//! canned SCM APIs, so engine scenarios run without Postgres or network.
#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use db::errors::Result as DbResult;
use db::models::{
    EventKey, EventRow, NewEvent, NewProject, ProjectRow, RevisionRow, TicketRow, UserRow,
};
use db::repositories::{
    EventRepository, ProjectRepository, Repositories, RevisionRepository, TicketRepository,
    UserRepository,
};
use scm_client::diff::{FileDiff, TextDiff};
use scm_client::gitlab::MergeRequestChanges;
use scm_client::{GithubApi, GitlabApi, ScmError};
use serde_json::Value;

#[derive(Default)]
pub struct MemoryDb {
    next_id: AtomicI64,
    pub projects: Mutex<Vec<ProjectRow>>,
    pub users: Mutex<Vec<UserRow>>,
    pub tickets: Mutex<Vec<TicketRow>>,
    pub events: Mutex<Vec<EventRow>>,
    pub revisions: Mutex<Vec<RevisionRow>>,
    pub raw_payloads: Mutex<Vec<(i64, Value)>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn stored_events(&self) -> Vec<EventRow> {
        self.events.lock().unwrap().clone()
    }

    pub fn stored_revisions(&self) -> Vec<RevisionRow> {
        self.revisions.lock().unwrap().clone()
    }

    pub fn stored_projects(&self) -> Vec<ProjectRow> {
        self.projects.lock().unwrap().clone()
    }

    pub fn stored_users(&self) -> Vec<UserRow> {
        self.users.lock().unwrap().clone()
    }

    pub fn stored_tickets(&self) -> Vec<TicketRow> {
        self.tickets.lock().unwrap().clone()
    }

    pub fn row_count(&self) -> usize {
        self.stored_projects().len()
            + self.stored_users().len()
            + self.stored_tickets().len()
            + self.stored_events().len()
            + self.stored_revisions().len()
            + self.raw_payloads.lock().unwrap().len()
    }
}

#[async_trait]
impl ProjectRepository for MemoryDb {
    async fn upsert(&self, project: NewProject) -> DbResult<ProjectRow> {
        let mut projects = self.projects.lock().unwrap();
        if let Some(existing) = projects
            .iter()
            .find(|p| p.repository == project.repository)
        {
            return Ok(existing.clone());
        }
        let row = ProjectRow {
            id: self.next_id(),
            name: project.name,
            repository: project.repository,
            created_at: Utc::now(),
        };
        projects.push(row.clone());
        Ok(row)
    }

    async fn find_by_repository(&self, repository: &str) -> DbResult<Option<ProjectRow>> {
        Ok(self
            .projects
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.repository == repository)
            .cloned())
    }
}

#[async_trait]
impl UserRepository for MemoryDb {
    async fn upsert(&self, username: &str) -> DbResult<UserRow> {
        let mut users = self.users.lock().unwrap();
        if let Some(existing) = users.iter().find(|u| u.username == username) {
            return Ok(existing.clone());
        }
        let row = UserRow {
            id: self.next_id(),
            username: username.to_string(),
            created_at: Utc::now(),
        };
        users.push(row.clone());
        Ok(row)
    }

    async fn find_by_username(&self, username: &str) -> DbResult<Option<UserRow>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }
}

#[async_trait]
impl TicketRepository for MemoryDb {
    async fn upsert(&self, code: &str, project_id: i64) -> DbResult<TicketRow> {
        let mut tickets = self.tickets.lock().unwrap();
        if let Some(existing) = tickets.iter().find(|t| t.code == code) {
            return Ok(existing.clone());
        }
        let row = TicketRow {
            id: self.next_id(),
            code: code.to_string(),
            project_id,
            created_at: Utc::now(),
        };
        tickets.push(row.clone());
        Ok(row)
    }

    async fn find_by_code(&self, code: &str) -> DbResult<Option<TicketRow>> {
        Ok(self
            .tickets
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.code == code)
            .cloned())
    }
}

#[async_trait]
impl EventRepository for MemoryDb {
    async fn create(&self, event: NewEvent, raw_payload: Value) -> DbResult<EventRow> {
        let row = EventRow {
            id: self.next_id(),
            project_id: event.project_id,
            author_id: event.author_id,
            ticket_id: event.ticket_id,
            reviewer_id: event.reviewer_id,
            branch: event.branch,
            pr_number: event.pr_number,
            source: event.source,
            event_type: event.event_type,
            additions: event.additions,
            deletions: event.deletions,
            changed_files: event.changed_files,
            occurred_at: event.occurred_at,
        };
        self.events.lock().unwrap().push(row.clone());
        self.raw_payloads.lock().unwrap().push((row.id, raw_payload));
        Ok(row)
    }

    async fn find_duplicate(&self, key: &EventKey) -> DbResult<Option<EventRow>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                e.author_id == key.author_id
                    && e.project_id == key.project_id
                    && e.ticket_id == key.ticket_id
                    && e.pr_number == key.pr_number
            })
            .max_by_key(|e| (e.occurred_at, e.id))
            .cloned())
    }

    async fn latest_for_project_ticket(
        &self,
        project_id: i64,
        ticket_id: Option<i64>,
    ) -> DbResult<Option<EventRow>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.project_id == project_id && e.ticket_id == ticket_id)
            .max_by_key(|e| (e.occurred_at, e.id))
            .cloned())
    }
}

#[async_trait]
impl RevisionRepository for MemoryDb {
    async fn create(&self, event_id: i64, reviewer_id: i64) -> DbResult<RevisionRow> {
        let row = RevisionRow {
            id: self.next_id(),
            event_id,
            reviewer_id,
            created_at: Utc::now(),
        };
        self.revisions.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn list_for_event(&self, event_id: i64) -> DbResult<Vec<RevisionRow>> {
        Ok(self
            .revisions
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect())
    }
}

impl Repositories for MemoryDb {
    fn projects(&self) -> &dyn ProjectRepository {
        self
    }

    fn users(&self) -> &dyn UserRepository {
        self
    }

    fn tickets(&self) -> &dyn TicketRepository {
        self
    }

    fn events(&self) -> &dyn EventRepository {
        self
    }

    fn revisions(&self) -> &dyn RevisionRepository {
        self
    }
}

/// Canned GitHub diff listings; `fail: true` simulates an upstream outage.
pub struct StubGithubApi {
    pub files: Vec<FileDiff>,
    pub fail: bool,
}

impl StubGithubApi {
    pub fn with_files(files: Vec<FileDiff>) -> Self {
        Self { files, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            files: Vec::new(),
            fail: true,
        }
    }

    fn result(&self) -> Result<Vec<FileDiff>, ScmError> {
        if self.fail {
            Err(ScmError::status(
                "github",
                http::StatusCode::INTERNAL_SERVER_ERROR,
                "stub",
            ))
        } else {
            Ok(self.files.clone())
        }
    }
}

#[async_trait]
impl GithubApi for StubGithubApi {
    async fn pull_request_files(
        &self,
        _repository: &str,
        _number: i64,
    ) -> Result<Vec<FileDiff>, ScmError> {
        self.result()
    }

    async fn compare(
        &self,
        _repository: &str,
        _base: &str,
        _head: &str,
    ) -> Result<Vec<FileDiff>, ScmError> {
        self.result()
    }

    async fn commit_files(&self, _repository: &str, _sha: &str) -> Result<Vec<FileDiff>, ScmError> {
        self.result()
    }
}

pub fn sample_files() -> Vec<FileDiff> {
    vec![
        FileDiff {
            filename: "src/login.rs".into(),
            additions: 10,
            deletions: 2,
        },
        FileDiff {
            filename: "yarn.lock".into(),
            additions: 500,
            deletions: 400,
        },
    ]
}

/// Canned GitLab responses.
pub struct StubGitlabApi {
    pub diffs: Vec<TextDiff>,
    pub discussions_resolved: bool,
    pub open_iid: Option<i64>,
    pub fail_changes: bool,
}

impl StubGitlabApi {
    pub fn new() -> Self {
        Self {
            diffs: vec![TextDiff {
                old_path: "src/login.rs".into(),
                new_path: "src/login.rs".into(),
                diff: "+++ b/src/login.rs\n+let ok = true;\n-let ok = false;".into(),
            }],
            discussions_resolved: true,
            open_iid: None,
            fail_changes: false,
        }
    }

    pub fn with_unresolved_discussions(mut self) -> Self {
        self.discussions_resolved = false;
        self
    }

    pub fn with_open_iid(mut self, iid: i64) -> Self {
        self.open_iid = Some(iid);
        self
    }

    pub fn failing_changes(mut self) -> Self {
        self.fail_changes = true;
        self
    }
}

impl Default for StubGitlabApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitlabApi for StubGitlabApi {
    async fn merge_request_changes(
        &self,
        _project_id: i64,
        _iid: i64,
    ) -> Result<MergeRequestChanges, ScmError> {
        if self.fail_changes {
            return Err(ScmError::status(
                "gitlab",
                http::StatusCode::BAD_GATEWAY,
                "stub",
            ));
        }
        Ok(MergeRequestChanges {
            changes: self.diffs.clone(),
            blocking_discussions_resolved: self.discussions_resolved,
        })
    }

    async fn compare(
        &self,
        _project_id: i64,
        _from: &str,
        _to: &str,
    ) -> Result<Vec<TextDiff>, ScmError> {
        Ok(self.diffs.clone())
    }

    async fn commit_diff(&self, _project_id: i64, _sha: &str) -> Result<Vec<TextDiff>, ScmError> {
        Ok(self.diffs.clone())
    }

    async fn open_merge_request_iid(
        &self,
        _project_id: i64,
        _source_branch: &str,
    ) -> Result<Option<i64>, ScmError> {
        Ok(self.open_iid)
    }
}

pub mod payloads {
    use serde_json::{json, Value};

    pub fn github_pull_request(
        action: &str,
        branch: &str,
        author: &str,
        number: i64,
        merged: bool,
    ) -> Value {
        json!({
            "action": action,
            "pull_request": {
                "number": number,
                "merged": merged,
                "head": {"ref": branch},
                "user": {"login": author}
            },
            "repository": {"name": "app", "full_name": "org/app"}
        })
    }

    pub fn github_review(
        action: &str,
        state: &str,
        branch: &str,
        author: &str,
        reviewer: &str,
        number: i64,
    ) -> Value {
        json!({
            "action": action,
            "pull_request": {
                "number": number,
                "head": {"ref": branch},
                "user": {"login": author}
            },
            "repository": {"name": "app", "full_name": "org/app"},
            "review": {"state": state, "user": {"login": reviewer}},
            "sender": {"login": reviewer}
        })
    }

    pub fn github_push(branch: &str, pusher: &str, committer: &str) -> Value {
        json!({
            "ref": format!("refs/heads/{branch}"),
            "before": "1111111111111111111111111111111111111111",
            "after": "2222222222222222222222222222222222222222",
            "pusher": {"name": pusher},
            "repository": {"name": "app", "full_name": "org/app"},
            "head_commit": {
                "id": "2222222222222222222222222222222222222222",
                "committer": {"name": committer},
                "added": ["src/new.rs"],
                "removed": [],
                "modified": ["src/login.rs"]
            }
        })
    }

    pub fn gitlab_merge_request(
        action: &str,
        source_branch: &str,
        target_branch: &str,
        username: &str,
        iid: i64,
    ) -> Value {
        json!({
            "event_type": "merge_request",
            "project": {"id": 77, "name": "app", "path_with_namespace": "org/app"},
            "user": {"username": username},
            "object_attributes": {
                "iid": iid,
                "action": action,
                "source_branch": source_branch,
                "target_branch": target_branch
            }
        })
    }

    pub fn gitlab_note(
        note_type: &str,
        source_branch: &str,
        target_branch: &str,
        username: &str,
        iid: i64,
    ) -> Value {
        json!({
            "event_type": "note",
            "project": {"id": 77, "name": "app", "path_with_namespace": "org/app"},
            "user": {"username": username},
            "object_attributes": {"type": note_type},
            "merge_request": {
                "iid": iid,
                "source_branch": source_branch,
                "target_branch": target_branch
            }
        })
    }

    pub fn gitlab_push(branch: &str, username: &str) -> Value {
        json!({
            "event_name": "push",
            "ref": format!("refs/heads/{branch}"),
            "before": "1111111111111111111111111111111111111111",
            "after": "2222222222222222222222222222222222222222",
            "user_username": username,
            "project": {"id": 77, "name": "app", "path_with_namespace": "org/app"}
        })
    }
}
