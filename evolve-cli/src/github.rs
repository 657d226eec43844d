//! GitHub contents API access for the `github` command.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use evolve_core::RepositoryContext;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::time::Duration;

use crate::CliResult;

/// Public GitHub REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "evolve-cli";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// File payload returned by `GET /repos/{repo}/contents/{path}`.
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: Option<String>,
    encoding: Option<String>,
}

/// Subset of `GET /repos/{repo}` used as prompt and template context.
#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    full_name: String,
    description: Option<String>,
    language: Option<String>,
}

/// Read-only GitHub client.
#[derive(Clone)]
pub struct GitHubContents {
    client: Client,
    api_url: String,
    token: Option<String>,
}

impl GitHubContents {
    /// Build a client for `api_url`, authenticating with `token` when given.
    pub fn new(api_url: &str, token: Option<String>) -> CliResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim().trim_end_matches('/').to_string(),
            token: token.filter(|value| !value.trim().is_empty()),
        })
    }

    fn get(&self, url: String) -> RequestBuilder {
        let request = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Fetch repository metadata.
    pub async fn repository(&self, repo: &str) -> CliResult<RepositoryContext> {
        let url = format!("{}/repos/{repo}", self.api_url);
        let response = self.get(url).send().await?.error_for_status()?;
        let payload = response.json::<RepositoryResponse>().await?;
        Ok(RepositoryContext {
            full_name: payload.full_name,
            description: payload.description,
            language: payload.language,
        })
    }

    /// Fetch and decode one file from the default branch.
    pub async fn file(&self, repo: &str, path: &str) -> CliResult<String> {
        let url = format!(
            "{}/repos/{repo}/contents/{}",
            self.api_url,
            path.trim_start_matches('/')
        );
        let response = self.get(url).send().await?.error_for_status()?;
        let payload = response.json::<ContentsResponse>().await?;
        decode_contents(payload)
    }
}

/// Validate an `owner/name` repository reference.
pub fn parse_repository(repo: &str) -> CliResult<String> {
    let trimmed = repo.trim().trim_matches('/');
    let mut parts = trimmed.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {
            Ok(format!("{owner}/{name}"))
        }
        _ => Err(format!("repository must look like owner/name, got `{repo}`").into()),
    }
}

fn decode_contents(payload: ContentsResponse) -> CliResult<String> {
    let Some(content) = payload.content else {
        return Err("response has no file content".into());
    };
    if let Some(encoding) = payload.encoding.as_deref() {
        if encoding != "base64" {
            return Err(format!("unsupported content encoding `{encoding}`").into());
        }
    }
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact)?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use serde_json::json;

    #[test]
    fn parse_repository_accepts_owner_and_name() {
        assert_eq!(parse_repository(" octo/app/ ").expect("repo"), "octo/app");
        assert!(parse_repository("octo").is_err());
        assert!(parse_repository("octo/app/extra").is_err());
        assert!(parse_repository("/app").is_err());
    }

    #[test]
    fn decode_contents_handles_wrapped_base64() {
        let payload = ContentsResponse {
            content: Some("Y29uc29s\nZS5sb2coJ3gnKQ==\n".to_string()),
            encoding: Some("base64".to_string()),
        };
        assert_eq!(decode_contents(payload).expect("decode"), "console.log('x')");
    }

    #[test]
    fn decode_contents_rejects_directories_and_unknown_encodings() {
        let missing = ContentsResponse {
            content: None,
            encoding: None,
        };
        assert!(decode_contents(missing).is_err());

        let unknown = ContentsResponse {
            content: Some("abc".to_string()),
            encoding: Some("none".to_string()),
        };
        assert!(
            decode_contents(unknown)
                .unwrap_err()
                .to_string()
                .contains("unsupported content encoding")
        );
    }

    #[tokio::test]
    async fn file_fetches_and_decodes_with_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/repos/octo/app/contents/src/a.ts")
                    .header("authorization", "Bearer secret");
                then.status(200).json_body(json!({
                    "content": STANDARD.encode("const y = 1"),
                    "encoding": "base64"
                }));
            })
            .await;

        let github = GitHubContents::new(&server.base_url(), Some("secret".to_string()))
            .expect("client");
        let content = github.file("octo/app", "/src/a.ts").await.expect("file");

        assert_eq!(content, "const y = 1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn file_reports_http_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/app/contents/missing.ts");
                then.status(404).json_body(json!({ "message": "Not Found" }));
            })
            .await;

        let github = GitHubContents::new(&server.base_url(), None).expect("client");
        assert!(github.file("octo/app", "missing.ts").await.is_err());
    }

    #[tokio::test]
    async fn repository_reads_metadata() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/app");
                then.status(200).json_body(json!({
                    "full_name": "octo/app",
                    "description": "Demo app",
                    "language": "TypeScript",
                    "stargazers_count": 3
                }));
            })
            .await;

        let github = GitHubContents::new(&server.base_url(), None).expect("client");
        let context = github.repository("octo/app").await.expect("repository");

        assert_eq!(context.full_name, "octo/app");
        assert_eq!(context.description.as_deref(), Some("Demo app"));
        assert_eq!(context.language.as_deref(), Some("TypeScript"));
    }
}
