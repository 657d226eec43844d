//! Pull request workflow for accepted suggestions.
//!
//! A suggestion is turned into a branch, one commit per file operation, and a
//! pull request against the repository's default branch. Each step is
//! reported; once a step fails the remaining ones are marked skipped.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use evolve_core::{FileAction, Suggestion, render_pr_body};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::github::{FileWrite, GitHubClient, PullRequest, RepoRef};
use crate::store::EvolutionLogStore;

const DEFAULT_BRANCH_PREFIX: &str = "evolve";
const COMMIT_PREFIX: &str = "AI Evolution";

/// Workflow status values.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Workflow step completed successfully.
    Success,
    /// Workflow step failed.
    Failed,
    /// Workflow step skipped due to earlier failure.
    Skipped,
}

impl WorkflowStatus {
    /// Human-readable status label.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Success => "success",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Skipped => "skipped",
        }
    }
}

/// Workflow step identifiers.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStepKind {
    /// Find the base branch and its head commit.
    ResolveBase,
    /// Create the suggestion branch.
    CreateBranch,
    /// Commit the suggestion's file operations.
    WriteFiles,
    /// Open the GitHub pull request.
    OpenPr,
}

impl WorkflowStepKind {
    /// Human-readable step label.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStepKind::ResolveBase => "resolve_base",
            WorkflowStepKind::CreateBranch => "create_branch",
            WorkflowStepKind::WriteFiles => "write_files",
            WorkflowStepKind::OpenPr => "open_pr",
        }
    }
}

/// Captures the outcome of a single workflow step.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct WorkflowStep {
    /// Step identifier.
    pub kind: WorkflowStepKind,
    /// Step status.
    pub status: WorkflowStatus,
    /// Optional detail or error message.
    pub detail: Option<String>,
}

/// Outcome of one pull request workflow.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct WorkflowResult {
    /// Workflow identifier.
    pub workflow_id: String,
    /// Overall workflow status.
    pub status: WorkflowStatus,
    /// Step-by-step results.
    pub steps: Vec<WorkflowStep>,
    /// Branch created for the suggestion.
    pub branch: Option<String>,
    /// GitHub pull request URL if created.
    pub pr_url: Option<String>,
}

/// Error type for workflow orchestration.
#[derive(Debug, Clone)]
pub struct WorkflowError {
    message: String,
}

impl WorkflowError {
    /// Build an error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for WorkflowError {}

/// Opens pull requests for suggestions.
#[derive(Clone)]
pub struct WorkflowRunner {
    github: Arc<dyn GitHubClient>,
    branch_prefix: String,
}

impl WorkflowRunner {
    /// Build a runner that names branches `<branch_prefix>-<millis>`.
    pub fn new(github: Arc<dyn GitHubClient>, branch_prefix: &str) -> Self {
        let prefix = branch_prefix.trim().trim_matches('-');
        Self {
            github,
            branch_prefix: if prefix.is_empty() {
                DEFAULT_BRANCH_PREFIX.to_string()
            } else {
                prefix.to_string()
            },
        }
    }

    /// Execute the workflow for `suggestion` against `repo`.
    pub fn run(&self, token: &str, repo: &RepoRef, suggestion: &Suggestion) -> WorkflowResult {
        let mut result = WorkflowResult {
            workflow_id: Uuid::new_v4().to_string(),
            status: WorkflowStatus::Success,
            steps: Vec::new(),
            branch: None,
            pr_url: None,
        };

        let (base_branch, base_sha) = match self.resolve_base(token, repo) {
            Ok(base) => base,
            Err(err) => return fail(result, WorkflowStepKind::ResolveBase, err),
        };
        result.steps.push(step_success(
            WorkflowStepKind::ResolveBase,
            Some(format!("{base_branch} at {base_sha}")),
        ));

        let branch = format!("{}-{}", self.branch_prefix, Utc::now().timestamp_millis());
        if let Err(err) = self.github.create_branch(token, repo, &branch, &base_sha) {
            return fail(result, WorkflowStepKind::CreateBranch, err.to_string());
        }
        result.steps.push(step_success(
            WorkflowStepKind::CreateBranch,
            Some(format!("created branch {branch} from {base_branch}")),
        ));
        result.branch = Some(branch.clone());

        let message = format!("{COMMIT_PREFIX}: {}", suggestion.title);
        match self.write_files(token, repo, &branch, &message, suggestion) {
            Ok(count) => result.steps.push(step_success(
                WorkflowStepKind::WriteFiles,
                Some(format!("committed {count} file(s)")),
            )),
            Err(err) => return fail(result, WorkflowStepKind::WriteFiles, err),
        }

        let body = render_pr_body(suggestion);
        let pr = PullRequest {
            title: &suggestion.title,
            body: &body,
            head: &branch,
            base: &base_branch,
        };
        match self.github.open_pr(token, repo, &pr) {
            Ok(url) => {
                info!("opened {url} for {}", repo.full_name());
                result
                    .steps
                    .push(step_success(WorkflowStepKind::OpenPr, Some(url.clone())));
                result.pr_url = Some(url);
                result
            }
            Err(err) => fail(result, WorkflowStepKind::OpenPr, err.to_string()),
        }
    }

    fn resolve_base(&self, token: &str, repo: &RepoRef) -> Result<(String, String), String> {
        let info = self
            .github
            .repository(token, repo)
            .map_err(|err| err.to_string())?;
        let sha = self
            .github
            .branch_sha(token, repo, &info.default_branch)
            .map_err(|err| err.to_string())?;
        Ok((info.default_branch, sha))
    }

    fn write_files(
        &self,
        token: &str,
        repo: &RepoRef,
        branch: &str,
        message: &str,
        suggestion: &Suggestion,
    ) -> Result<usize, String> {
        for op in &suggestion.files {
            let existing = self
                .github
                .file_sha(token, repo, &op.path, branch)
                .map_err(|err| format!("{}: {err}", op.path))?;
            let outcome = match op.action {
                FileAction::Create | FileAction::Modify => self.github.put_file(
                    token,
                    repo,
                    &FileWrite {
                        path: &op.path,
                        content: &op.content,
                        message,
                        branch,
                        sha: existing.as_deref(),
                    },
                ),
                FileAction::Delete => match existing.as_deref() {
                    Some(sha) => self
                        .github
                        .delete_file(token, repo, &op.path, message, branch, sha),
                    None => {
                        warn!("{} is already absent on {branch}", op.path);
                        Ok(())
                    }
                },
            };
            outcome.map_err(|err| format!("{}: {err}", op.path))?;
        }
        Ok(suggestion.files.len())
    }
}

/// Runs the workflow and records the pull request on the evolution log.
#[derive(Clone)]
pub struct WorkflowService {
    runner: WorkflowRunner,
}

impl WorkflowService {
    /// Build a workflow service around a runner.
    pub fn new(runner: WorkflowRunner) -> Self {
        Self { runner }
    }

    /// Build a workflow service from environment configuration.
    pub fn from_env(github: Arc<dyn GitHubClient>) -> Self {
        let prefix = std::env::var("EVOLVE_WORKFLOW_BRANCH_PREFIX")
            .unwrap_or_else(|_| DEFAULT_BRANCH_PREFIX.to_string());
        Self::new(WorkflowRunner::new(github, &prefix))
    }

    /// Open a pull request for `suggestion`; marks `log_id` as `pr_created` on success.
    pub fn apply(
        &self,
        store: &dyn EvolutionLogStore,
        token: &str,
        repo: &RepoRef,
        suggestion: &Suggestion,
        log_id: Option<&str>,
    ) -> Result<WorkflowResult, WorkflowError> {
        if suggestion.is_empty() {
            return Err(WorkflowError::new("suggestion has no file operations"));
        }
        let result = self.runner.run(token, repo, suggestion);
        if let (Some(log_id), Some(pr_url)) = (log_id, result.pr_url.as_deref()) {
            let found = store
                .mark_pr_created(log_id, pr_url)
                .map_err(|err| WorkflowError::new(format!("persist workflow failed: {err}")))?;
            if !found {
                warn!("evolution log {log_id} not found, {pr_url} left unrecorded");
            }
        }
        Ok(result)
    }
}

fn fail(mut result: WorkflowResult, kind: WorkflowStepKind, detail: String) -> WorkflowResult {
    warn!("workflow {} failed at {}: {detail}", result.workflow_id, kind.as_str());
    result.steps.push(step_failed(kind, detail));
    result.status = WorkflowStatus::Failed;
    push_skipped_steps(&mut result.steps, next_steps(kind));
    result
}

fn step_success(kind: WorkflowStepKind, detail: Option<String>) -> WorkflowStep {
    WorkflowStep {
        kind,
        status: WorkflowStatus::Success,
        detail,
    }
}

fn step_failed(kind: WorkflowStepKind, detail: String) -> WorkflowStep {
    WorkflowStep {
        kind,
        status: WorkflowStatus::Failed,
        detail: Some(detail),
    }
}

fn step_skipped(kind: WorkflowStepKind) -> WorkflowStep {
    WorkflowStep {
        kind,
        status: WorkflowStatus::Skipped,
        detail: Some("skipped due to prior failure".to_string()),
    }
}

fn next_steps(start: WorkflowStepKind) -> &'static [WorkflowStepKind] {
    match start {
        WorkflowStepKind::ResolveBase => &[
            WorkflowStepKind::CreateBranch,
            WorkflowStepKind::WriteFiles,
            WorkflowStepKind::OpenPr,
        ],
        WorkflowStepKind::CreateBranch => &[WorkflowStepKind::WriteFiles, WorkflowStepKind::OpenPr],
        WorkflowStepKind::WriteFiles => &[WorkflowStepKind::OpenPr],
        WorkflowStepKind::OpenPr => &[],
    }
}

fn push_skipped_steps(steps: &mut Vec<WorkflowStep>, remaining: &[WorkflowStepKind]) {
    for kind in remaining {
        steps.push(step_skipped(*kind));
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::github::{
        FileWrite, GitHubClient, GitHubError, PullRequest, RepoRef, RepositoryInfo,
    };

    /// Scripted GitHub client recording every mutating call.
    #[derive(Default)]
    pub(crate) struct FakeGitHub {
        pub files: HashMap<String, String>,
        pub existing: HashMap<String, String>,
        pub fail_on: Option<&'static str>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeGitHub {
        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls").clone()
        }

        fn record(&self, call: &'static str, detail: String) -> Result<(), GitHubError> {
            self.calls
                .lock()
                .expect("calls")
                .push(format!("{call} {detail}"));
            if self.fail_on == Some(call) {
                return Err(GitHubError::new(format!("{call} refused")));
            }
            Ok(())
        }
    }

    impl GitHubClient for FakeGitHub {
        fn repository(&self, _token: &str, repo: &RepoRef) -> Result<RepositoryInfo, GitHubError> {
            self.record("repository", repo.full_name())?;
            Ok(RepositoryInfo {
                full_name: repo.full_name(),
                description: Some("Demo app".to_string()),
                language: Some("TypeScript".to_string()),
                default_branch: "main".to_string(),
            })
        }

        fn get_file(&self, _token: &str, _repo: &RepoRef, path: &str) -> Result<String, GitHubError> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| GitHubError::new(format!("github api error (404 Not Found): {path}")))
        }

        fn branch_sha(&self, _token: &str, _repo: &RepoRef, branch: &str) -> Result<String, GitHubError> {
            self.record("branch_sha", branch.to_string())?;
            Ok("base-sha".to_string())
        }

        fn create_branch(
            &self,
            _token: &str,
            _repo: &RepoRef,
            branch: &str,
            sha: &str,
        ) -> Result<(), GitHubError> {
            self.record("create_branch", format!("{branch}@{sha}"))
        }

        fn file_sha(
            &self,
            _token: &str,
            _repo: &RepoRef,
            path: &str,
            _branch: &str,
        ) -> Result<Option<String>, GitHubError> {
            Ok(self.existing.get(path).cloned())
        }

        fn put_file(&self, _token: &str, _repo: &RepoRef, write: &FileWrite<'_>) -> Result<(), GitHubError> {
            self.record(
                "put_file",
                format!("{} sha={:?} msg={}", write.path, write.sha, write.message),
            )
        }

        fn delete_file(
            &self,
            _token: &str,
            _repo: &RepoRef,
            path: &str,
            _message: &str,
            _branch: &str,
            sha: &str,
        ) -> Result<(), GitHubError> {
            self.record("delete_file", format!("{path} sha={sha}"))
        }

        fn open_pr(&self, _token: &str, repo: &RepoRef, pr: &PullRequest<'_>) -> Result<String, GitHubError> {
            self.record("open_pr", format!("{} -> {}", pr.head, pr.base))?;
            Ok(format!("https://github.com/{}/pull/7", repo.full_name()))
        }
    }
}
