//! HTTP handlers for the Evolve server.

use std::sync::Arc;

use actix_web::{HttpResponse, Responder, get, post, web};
use evolve_core::{
    AnalysisReport, FAILED_CONTENT_PLACEHOLDER, ProviderKind, RepositoryContext, SourceFile,
    Suggestion, SuggestionEngine, SuggestionOutcome,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::github::{GitHubClient, GitHubError, RepoRef};
use crate::openapi::ApiDoc;
use crate::store::{EvolutionLog, EvolutionLogStore, LogStatus, NewEvolutionLog};
use crate::workflows::{WorkflowResult, WorkflowService};

const MAX_CONCURRENT_FETCHES: usize = 8;

#[derive(Clone)]
/// Shared application state for handlers.
pub struct AppState {
    /// Suggestion engine, heuristic or provider-backed.
    pub engine: Arc<SuggestionEngine>,
    /// GitHub API client.
    pub github: Arc<dyn GitHubClient>,
    /// Evolution log persistence.
    pub store: Arc<dyn EvolutionLogStore>,
    /// Pull request workflow.
    pub workflow: WorkflowService,
}

/// Error response payload.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    pub message: String,
}

/// Owner of a GitHub repository.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RepositoryOwner {
    /// Account or organization login.
    pub login: String,
}

/// Repository as returned by the GitHub repositories API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RepositoryPayload {
    /// Numeric GitHub repository id.
    pub id: i64,
    /// Repository name.
    pub name: String,
    /// `owner/name`.
    pub full_name: String,
    /// Repository owner.
    pub owner: RepositoryOwner,
    /// Repository description.
    #[serde(default)]
    pub description: Option<String>,
    /// Primary language.
    #[serde(default)]
    pub language: Option<String>,
}

impl RepositoryPayload {
    fn repo_ref(&self) -> RepoRef {
        RepoRef::new(&self.owner.login, &self.name)
    }

    fn context(&self) -> RepositoryContext {
        RepositoryContext {
            full_name: self.full_name.clone(),
            description: self.description.clone(),
            language: self.language.clone(),
        }
    }
}

/// Request payload for a repository suggestion.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuggestRequest {
    /// Target repository.
    pub repository: Option<RepositoryPayload>,
    /// Repository-relative paths to analyze.
    pub file_paths: Option<Vec<String>>,
    /// GitHub access token of the caller.
    pub access_token: Option<String>,
}

/// Suggestion tagged with the evolution log that records it.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoggedSuggestion {
    /// The suggestion.
    #[serde(flatten)]
    pub suggestion: Suggestion,
    /// Evolution log identifier.
    pub log_id: String,
}

/// Response payload for a repository suggestion.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SuggestResponse {
    /// Always `true`.
    pub success: bool,
    /// The suggestion and its log id.
    pub suggestion: LoggedSuggestion,
    /// Provider that produced the suggestion.
    pub source: ProviderKind,
    /// Facts computed from the fetched files.
    pub analysis: AnalysisReport,
    /// Paths whose content could not be fetched.
    #[serde(rename = "unreadableFiles")]
    pub unreadable_files: Vec<String>,
}

/// Request payload for a suggestion over inline files.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PreviewRequest {
    /// Files to analyze.
    pub files: Vec<SourceFile>,
    /// Optional repository metadata.
    #[serde(default)]
    pub repository: Option<RepositoryContext>,
}

/// Request payload for opening a pull request.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRequest {
    /// `owner/name` or GitHub URL.
    pub repository: String,
    /// Suggestion to apply.
    pub suggestion: Suggestion,
    /// GitHub access token of the caller.
    pub access_token: String,
    /// Evolution log to update once the pull request exists.
    #[serde(default)]
    pub log_id: Option<String>,
}

/// Request payload for a pull request status update.
#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusRequest {
    /// Pull request URL.
    pub pr_url: Option<String>,
    /// New status label.
    pub status: Option<String>,
}

/// Response payload for a status update.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    /// Always `true`.
    pub success: bool,
    /// Number of logs updated.
    pub updated: usize,
}

/// Request payload for rejecting a suggestion.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequest {
    /// Evolution log identifier.
    pub log_id: String,
}

/// Response payload for a rejection.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectResponse {
    /// Always `true`.
    pub success: bool,
    /// Rejected log identifier.
    pub log_id: String,
}

/// Query parameters for the log listing.
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    /// Restrict to one repository.
    pub repository_id: Option<String>,
}

/// Response payload for the log listing.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LogsResponse {
    /// Logs, newest first.
    pub logs: Vec<EvolutionLog>,
}

fn bad_request(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        message: message.to_string(),
    })
}

#[utoipa::path(
    post,
    path = "/evolution/suggest",
    request_body = SuggestRequest,
    responses(
        (status = 200, description = "Suggestion recorded as a pending log", body = SuggestResponse),
        (status = 400, description = "Missing required parameters", body = ErrorResponse),
        (status = 500, description = "Suggestion failed", body = ErrorResponse)
    ),
    tag = "evolution"
)]
#[post("/api/evolution/suggest")]
/// Fetch repository files, produce one suggestion and record it.
pub async fn suggest(
    state: web::Data<AppState>,
    payload: web::Json<SuggestRequest>,
) -> impl Responder {
    let SuggestRequest {
        repository: Some(repository),
        file_paths: Some(file_paths),
        access_token: Some(access_token),
    } = payload.into_inner()
    else {
        return bad_request("Missing required parameters");
    };
    if access_token.trim().is_empty() {
        return bad_request("Missing required parameters");
    }

    let state = state.into_inner();
    let result = web::block(move || {
        let repo = repository.repo_ref();
        let (files, unreadable_files) =
            fetch_files(state.github.as_ref(), &access_token, &repo, &file_paths);
        let outcome = state
            .engine
            .suggest(&files, &repository.context())
            .map_err(|err| format!("suggestion failed: {err}"))?;
        let log = state
            .store
            .insert(NewEvolutionLog {
                repository_id: repository.id.to_string(),
                suggestion_text: outcome.suggestion.description.clone(),
                diff_content: serde_json::to_string(&outcome.suggestion.files).ok(),
            })
            .map_err(|err| format!("store suggestion failed: {err}"))?;
        info!(
            "suggested `{}` for {} (log {})",
            outcome.suggestion.title, repository.full_name, log.id
        );
        Ok::<SuggestResponse, String>(SuggestResponse {
            success: true,
            suggestion: LoggedSuggestion {
                suggestion: outcome.suggestion,
                log_id: log.id,
            },
            source: outcome.source,
            analysis: outcome.analysis,
            unreadable_files,
        })
    })
    .await
    .unwrap_or_else(|err| Err(format!("suggestion task failed: {err}")));

    match result {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(message) => HttpResponse::InternalServerError().json(ErrorResponse { message }),
    }
}

/// Fetch `paths` in bounded parallel batches, keeping request order.
/// Failed fetches get the placeholder content and are listed separately.
fn fetch_files(
    github: &dyn GitHubClient,
    token: &str,
    repo: &RepoRef,
    paths: &[String],
) -> (Vec<SourceFile>, Vec<String>) {
    let mut files = Vec::with_capacity(paths.len());
    let mut unreadable = Vec::new();
    for batch in paths.chunks(MAX_CONCURRENT_FETCHES) {
        let contents: Vec<Result<String, GitHubError>> = std::thread::scope(|scope| {
            let handles: Vec<_> = batch
                .iter()
                .map(|path| scope.spawn(move || github.get_file(token, repo, path)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(GitHubError::new("fetch thread panicked")))
                })
                .collect()
        });
        for (path, content) in batch.iter().zip(contents) {
            match content {
                Ok(content) => files.push(SourceFile::new(path, content)),
                Err(err) => {
                    warn!("failed to load {path}: {err}");
                    unreadable.push(path.clone());
                    files.push(SourceFile::new(path, FAILED_CONTENT_PLACEHOLDER));
                }
            }
        }
    }
    (files, unreadable)
}

#[utoipa::path(
    post,
    path = "/evolution/preview",
    request_body = PreviewRequest,
    responses(
        (status = 200, description = "Suggestion for the inline files", body = SuggestionOutcome),
        (status = 500, description = "Suggestion failed", body = ErrorResponse)
    ),
    tag = "evolution"
)]
#[post("/api/evolution/preview")]
/// Produce a suggestion for inline files without touching GitHub or the store.
pub async fn preview(
    state: web::Data<AppState>,
    payload: web::Json<PreviewRequest>,
) -> impl Responder {
    let request = payload.into_inner();
    let engine = state.engine.clone();
    let result = web::block(move || -> evolve_core::Result<SuggestionOutcome> {
        let context = request.repository.unwrap_or_default();
        engine.suggest(&request.files, &context)
    })
    .await;

    match result {
        Ok(Ok(outcome)) => HttpResponse::Ok().json(outcome),
        Ok(Err(err)) => HttpResponse::InternalServerError().json(ErrorResponse {
            message: err.to_string(),
        }),
        Err(err) => HttpResponse::InternalServerError().json(ErrorResponse {
            message: format!("preview task failed: {err}"),
        }),
    }
}

#[utoipa::path(
    post,
    path = "/evolution/apply",
    request_body = ApplyRequest,
    responses(
        (status = 200, description = "Workflow result", body = WorkflowResult),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Workflow failed", body = ErrorResponse)
    ),
    tag = "evolution"
)]
#[post("/api/evolution/apply")]
/// Open a pull request carrying a suggestion's file operations.
pub async fn apply(state: web::Data<AppState>, payload: web::Json<ApplyRequest>) -> impl Responder {
    let request = payload.into_inner();
    let repo = match RepoRef::parse(&request.repository) {
        Ok(repo) => repo,
        Err(err) => return bad_request(&err.to_string()),
    };
    if request.access_token.trim().is_empty() {
        return bad_request("Missing required parameters");
    }
    if request.suggestion.is_empty() {
        return bad_request("Suggestion has no file operations");
    }

    let state = state.into_inner();
    let result = web::block(move || {
        state.workflow.apply(
            state.store.as_ref(),
            &request.access_token,
            &repo,
            &request.suggestion,
            request.log_id.as_deref(),
        )
    })
    .await;

    match result {
        Ok(Ok(response)) => HttpResponse::Ok().json(response),
        Ok(Err(err)) => HttpResponse::InternalServerError().json(ErrorResponse {
            message: err.to_string(),
        }),
        Err(err) => HttpResponse::InternalServerError().json(ErrorResponse {
            message: format!("workflow task failed: {err}"),
        }),
    }
}

#[utoipa::path(
    post,
    path = "/evolution/status",
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Logs updated", body = StatusResponse),
        (status = 400, description = "Missing or invalid parameters", body = ErrorResponse),
        (status = 500, description = "Update failed", body = ErrorResponse)
    ),
    tag = "evolution"
)]
#[post("/api/evolution/status")]
/// Update every log attached to a pull request.
pub async fn status(
    state: web::Data<AppState>,
    payload: web::Json<StatusRequest>,
) -> impl Responder {
    let StatusRequest {
        pr_url: Some(pr_url),
        status: Some(label),
    } = payload.into_inner()
    else {
        return bad_request("Missing pr_url or status");
    };
    let new_status = match label.parse::<LogStatus>() {
        Ok(parsed) => parsed,
        Err(err) => return bad_request(&err.to_string()),
    };

    let store = state.store.clone();
    let result = web::block(move || store.set_status_by_pr_url(&pr_url, new_status)).await;

    match result {
        Ok(Ok(updated)) => HttpResponse::Ok().json(StatusResponse {
            success: true,
            updated,
        }),
        Ok(Err(err)) => HttpResponse::InternalServerError().json(ErrorResponse {
            message: err.to_string(),
        }),
        Err(err) => HttpResponse::InternalServerError().json(ErrorResponse {
            message: format!("status task failed: {err}"),
        }),
    }
}

#[utoipa::path(
    post,
    path = "/evolution/reject",
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Suggestion rejected", body = RejectResponse),
        (status = 404, description = "Unknown log", body = ErrorResponse),
        (status = 500, description = "Update failed", body = ErrorResponse)
    ),
    tag = "evolution"
)]
#[post("/api/evolution/reject")]
/// Mark a suggestion as rejected.
pub async fn reject(
    state: web::Data<AppState>,
    payload: web::Json<RejectRequest>,
) -> impl Responder {
    let log_id = payload.into_inner().log_id;
    let store = state.store.clone();
    let id = log_id.clone();
    let result = web::block(move || store.set_status(&id, LogStatus::Rejected)).await;

    match result {
        Ok(Ok(true)) => HttpResponse::Ok().json(RejectResponse {
            success: true,
            log_id,
        }),
        Ok(Ok(false)) => HttpResponse::NotFound().json(ErrorResponse {
            message: format!("evolution log {log_id} not found"),
        }),
        Ok(Err(err)) => HttpResponse::InternalServerError().json(ErrorResponse {
            message: err.to_string(),
        }),
        Err(err) => HttpResponse::InternalServerError().json(ErrorResponse {
            message: format!("reject task failed: {err}"),
        }),
    }
}

#[utoipa::path(
    get,
    path = "/evolution/logs",
    params(
        ("repository_id" = Option<String>, Query, description = "Restrict to one repository")
    ),
    responses(
        (status = 200, description = "Evolution logs, newest first", body = LogsResponse),
        (status = 500, description = "Listing failed", body = ErrorResponse)
    ),
    tag = "evolution"
)]
#[get("/api/evolution/logs")]
/// List evolution logs.
pub async fn logs(state: web::Data<AppState>, query: web::Query<LogsQuery>) -> impl Responder {
    let repository_id = query.into_inner().repository_id;
    let store = state.store.clone();
    let result = web::block(move || store.list(repository_id.as_deref())).await;

    match result {
        Ok(Ok(entries)) => HttpResponse::Ok().json(LogsResponse { logs: entries }),
        Ok(Err(err)) => HttpResponse::InternalServerError().json(ErrorResponse {
            message: err.to_string(),
        }),
        Err(err) => HttpResponse::InternalServerError().json(ErrorResponse {
            message: format!("logs task failed: {err}"),
        }),
    }
}

#[utoipa::path(
    get,
    path = "/openapi.json",
    responses(
        (status = 200, description = "OpenAPI document", body = serde_json::Value)
    ),
    tag = "system"
)]
#[get("/api/openapi.json")]
/// Serve the OpenAPI document.
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}
