//! GitHub REST API access on behalf of the requesting user.
//!
//! Every call takes the caller's access token; the server holds no GitHub
//! credential of its own.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;

/// Public GitHub REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";
/// Per-request timeout unless `GITHUB_TIMEOUT_SECS` says otherwise.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A repository addressed as `owner/name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    /// Account or organization login.
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl RepoRef {
    /// Build a reference from its parts.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse `owner/name`, a GitHub web URL, or an SSH remote.
    pub fn parse(value: &str) -> Result<Self, GitHubError> {
        let trimmed = value.trim().trim_end_matches('/').trim_end_matches(".git");
        let path = trimmed
            .strip_prefix("https://github.com/")
            .or_else(|| trimmed.strip_prefix("http://github.com/"))
            .or_else(|| trimmed.strip_prefix("git@github.com:"))
            .unwrap_or(trimmed);
        let mut parts = path.split('/');
        let owner = parts
            .next()
            .filter(|owner| !owner.is_empty())
            .ok_or_else(|| GitHubError::new("missing github owner"))?;
        let name = parts
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| GitHubError::new("missing github repo"))?;
        Ok(Self::new(owner, name))
    }

    /// `owner/name` form.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Repository metadata used for prompts and pull requests.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepositoryInfo {
    /// `owner/name`.
    pub full_name: String,
    /// Repository description.
    pub description: Option<String>,
    /// Primary language reported by GitHub.
    pub language: Option<String>,
    /// Branch pull requests target.
    pub default_branch: String,
}

/// One file write on a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite<'a> {
    /// Repository-relative path.
    pub path: &'a str,
    /// New file content (plain text).
    pub content: &'a str,
    /// Commit message.
    pub message: &'a str,
    /// Target branch.
    pub branch: &'a str,
    /// Blob sha of the file being replaced, absent for new files.
    pub sha: Option<&'a str>,
}

/// Pull request to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest<'a> {
    /// Pull request title.
    pub title: &'a str,
    /// Pull request body (markdown).
    pub body: &'a str,
    /// Branch holding the changes.
    pub head: &'a str,
    /// Branch to merge into.
    pub base: &'a str,
}

/// Error type for GitHub API calls.
#[derive(Debug, Clone)]
pub struct GitHubError {
    message: String,
}

impl GitHubError {
    /// Build an error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for GitHubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for GitHubError {}

/// GitHub operations used by the suggest and pull request flows.
pub trait GitHubClient: Send + Sync {
    /// Repository metadata, including the default branch.
    fn repository(&self, token: &str, repo: &RepoRef) -> Result<RepositoryInfo, GitHubError>;
    /// Decoded content of `path` on the default branch.
    fn get_file(&self, token: &str, repo: &RepoRef, path: &str) -> Result<String, GitHubError>;
    /// Head commit sha of `branch`.
    fn branch_sha(&self, token: &str, repo: &RepoRef, branch: &str) -> Result<String, GitHubError>;
    /// Create `branch` pointing at `sha`.
    fn create_branch(
        &self,
        token: &str,
        repo: &RepoRef,
        branch: &str,
        sha: &str,
    ) -> Result<(), GitHubError>;
    /// Blob sha of `path` on `branch`, `None` when the file does not exist.
    fn file_sha(
        &self,
        token: &str,
        repo: &RepoRef,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>, GitHubError>;
    /// Create or replace a file with one commit.
    fn put_file(&self, token: &str, repo: &RepoRef, write: &FileWrite<'_>) -> Result<(), GitHubError>;
    /// Delete a file with one commit.
    fn delete_file(
        &self,
        token: &str,
        repo: &RepoRef,
        path: &str,
        message: &str,
        branch: &str,
        sha: &str,
    ) -> Result<(), GitHubError>;
    /// Open a pull request and return its web URL.
    fn open_pr(&self, token: &str, repo: &RepoRef, pr: &PullRequest<'_>) -> Result<String, GitHubError>;
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: Option<String>,
    encoding: Option<String>,
    sha: Option<String>,
}

/// Blocking GitHub REST client.
#[derive(Debug, Clone)]
pub struct GitHubApiClient {
    base_url: String,
    client: Client,
}

impl GitHubApiClient {
    /// Build a client for `base_url` whose requests give up after `timeout`.
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, GitHubError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|err| GitHubError::new(format!("http client setup failed: {err}")))?;
        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Build a GitHub API client from environment variables.
    pub fn from_env() -> Result<Self, GitHubError> {
        let base_url =
            std::env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let user_agent =
            std::env::var("GITHUB_USER_AGENT").unwrap_or_else(|_| "evolve-server".to_string());
        let timeout = parse_timeout(std::env::var("GITHUB_TIMEOUT_SECS").ok().as_deref())?;
        Self::new(&base_url, &user_agent, timeout)
    }

    fn repo_url(&self, repo: &RepoRef, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}{suffix}",
            self.base_url,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name)
        )
    }

    fn contents_url(&self, repo: &RepoRef, path: &str) -> String {
        self.repo_url(repo, &format!("/contents/{}", encode_path(path)))
    }

    fn request(&self, builder: RequestBuilder, token: &str) -> Result<Response, GitHubError> {
        if token.trim().is_empty() {
            return Err(GitHubError::new("github access token is required"));
        }
        builder
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(token)
            .send()
            .map_err(|err| GitHubError::new(format!("github request failed: {err}")))
    }

    fn send(&self, builder: RequestBuilder, token: &str) -> Result<Response, GitHubError> {
        let response = self.request(builder, token)?;
        if !response.status().is_success() {
            return Err(api_error(response));
        }
        Ok(response)
    }

    fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        builder: RequestBuilder,
        token: &str,
    ) -> Result<T, GitHubError> {
        self.send(builder, token)?
            .json()
            .map_err(|err| GitHubError::new(format!("github response decode failed: {err}")))
    }
}

impl GitHubClient for GitHubApiClient {
    fn repository(&self, token: &str, repo: &RepoRef) -> Result<RepositoryInfo, GitHubError> {
        self.send_json(self.client.get(self.repo_url(repo, "")), token)
    }

    fn get_file(&self, token: &str, repo: &RepoRef, path: &str) -> Result<String, GitHubError> {
        let payload: ContentsResponse =
            self.send_json(self.client.get(self.contents_url(repo, path)), token)?;
        decode_contents(payload)
    }

    fn branch_sha(&self, token: &str, repo: &RepoRef, branch: &str) -> Result<String, GitHubError> {
        let url = self.repo_url(repo, &format!("/git/ref/heads/{}", encode_path(branch)));
        let value: serde_json::Value = self.send_json(self.client.get(url), token)?;
        value
            .pointer("/object/sha")
            .and_then(|sha| sha.as_str())
            .map(str::to_string)
            .ok_or_else(|| GitHubError::new("github response missing object.sha"))
    }

    fn create_branch(
        &self,
        token: &str,
        repo: &RepoRef,
        branch: &str,
        sha: &str,
    ) -> Result<(), GitHubError> {
        let body = json!({
            "ref": format!("refs/heads/{branch}"),
            "sha": sha,
        });
        self.send(self.client.post(self.repo_url(repo, "/git/refs")).json(&body), token)?;
        Ok(())
    }

    fn file_sha(
        &self,
        token: &str,
        repo: &RepoRef,
        path: &str,
        branch: &str,
    ) -> Result<Option<String>, GitHubError> {
        let builder = self
            .client
            .get(self.contents_url(repo, path))
            .query(&[("ref", branch)]);
        let response = self.request(builder, token)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(api_error(response));
        }
        let payload: ContentsResponse = response
            .json()
            .map_err(|err| GitHubError::new(format!("github response decode failed: {err}")))?;
        Ok(payload.sha)
    }

    fn put_file(&self, token: &str, repo: &RepoRef, write: &FileWrite<'_>) -> Result<(), GitHubError> {
        let mut body = json!({
            "message": write.message,
            "content": STANDARD.encode(write.content),
            "branch": write.branch,
        });
        if let Some(sha) = write.sha {
            body["sha"] = json!(sha);
        }
        self.send(
            self.client.put(self.contents_url(repo, write.path)).json(&body),
            token,
        )?;
        Ok(())
    }

    fn delete_file(
        &self,
        token: &str,
        repo: &RepoRef,
        path: &str,
        message: &str,
        branch: &str,
        sha: &str,
    ) -> Result<(), GitHubError> {
        let body = json!({
            "message": message,
            "branch": branch,
            "sha": sha,
        });
        self.send(
            self.client.delete(self.contents_url(repo, path)).json(&body),
            token,
        )?;
        Ok(())
    }

    fn open_pr(&self, token: &str, repo: &RepoRef, pr: &PullRequest<'_>) -> Result<String, GitHubError> {
        let body = json!({
            "title": pr.title,
            "head": pr.head,
            "base": pr.base,
            "body": pr.body,
        });
        let value: serde_json::Value =
            self.send_json(self.client.post(self.repo_url(repo, "/pulls")).json(&body), token)?;
        let html_url = value
            .get("html_url")
            .and_then(|val| val.as_str())
            .ok_or_else(|| GitHubError::new("github response missing html_url"))?;
        Ok(html_url.to_string())
    }
}

/// Request timeout from an optional seconds value.
fn parse_timeout(value: Option<&str>) -> Result<Duration, GitHubError> {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    };
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(GitHubError::new(format!(
            "GITHUB_TIMEOUT_SECS must be a positive number of seconds, got {value}"
        ))),
    }
}

fn api_error(response: Response) -> GitHubError {
    let status = response.status();
    let body = response.text().unwrap_or_default();
    GitHubError::new(format!("github api error ({status}): {body}"))
}

fn encode_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn decode_contents(payload: ContentsResponse) -> Result<String, GitHubError> {
    let content = payload
        .content
        .ok_or_else(|| GitHubError::new("github response has no file content"))?;
    if let Some(encoding) = payload.encoding.as_deref() {
        if encoding != "base64" {
            return Err(GitHubError::new(format!(
                "unsupported content encoding `{encoding}`"
            )));
        }
    }
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|err| GitHubError::new(format!("invalid base64 content: {err}")))?;
    String::from_utf8(bytes).map_err(|err| GitHubError::new(format!("file is not utf-8: {err}")))
}
