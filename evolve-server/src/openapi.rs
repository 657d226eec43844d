//! OpenAPI specification for the Evolve server.

use utoipa::OpenApi;

use evolve_core::{
    AnalysisReport, FileAction, LanguageLines, ProviderKind, QualityIssue, QualityRule,
    RepositoryContext, SourceFile, Suggestion, SuggestionFileOp, SuggestionKind,
    SuggestionOutcome,
};

use crate::routes::{
    ApplyRequest, ErrorResponse, LoggedSuggestion, LogsResponse, PreviewRequest, RejectRequest,
    RejectResponse, RepositoryOwner, RepositoryPayload, StatusRequest, StatusResponse,
    SuggestRequest, SuggestResponse,
};
use crate::store::{EvolutionLog, LogStatus};
use crate::workflows::{WorkflowResult, WorkflowStatus, WorkflowStep, WorkflowStepKind};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::suggest,
        crate::routes::preview,
        crate::routes::apply,
        crate::routes::status,
        crate::routes::reject,
        crate::routes::logs,
        crate::routes::openapi_json
    ),
    components(
        schemas(
            SuggestRequest,
            SuggestResponse,
            LoggedSuggestion,
            RepositoryPayload,
            RepositoryOwner,
            PreviewRequest,
            ApplyRequest,
            StatusRequest,
            StatusResponse,
            RejectRequest,
            RejectResponse,
            LogsResponse,
            ErrorResponse,
            EvolutionLog,
            LogStatus,
            WorkflowResult,
            WorkflowStep,
            WorkflowStepKind,
            WorkflowStatus,
            Suggestion,
            SuggestionFileOp,
            SuggestionKind,
            FileAction,
            SuggestionOutcome,
            SourceFile,
            RepositoryContext,
            AnalysisReport,
            LanguageLines,
            QualityIssue,
            QualityRule,
            ProviderKind
        )
    ),
    tags(
        (name = "evolution", description = "Suggestions and their pull requests"),
        (name = "system", description = "System endpoints")
    )
)]
/// OpenAPI specification for the Evolve server.
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::ApiDoc;
    use utoipa::OpenApi;

    #[test]
    fn openapi_includes_expected_paths() {
        let doc = ApiDoc::openapi();
        let paths = doc.paths.paths;

        assert!(paths.contains_key("/evolution/suggest"));
        assert!(paths.contains_key("/evolution/preview"));
        assert!(paths.contains_key("/evolution/apply"));
        assert!(paths.contains_key("/evolution/status"));
        assert!(paths.contains_key("/evolution/reject"));
        assert!(paths.contains_key("/evolution/logs"));
        assert!(paths.contains_key("/openapi.json"));
    }

    #[test]
    fn openapi_registers_wire_schemas() {
        let doc = ApiDoc::openapi();
        let schemas = doc.components.expect("components").schemas;

        for name in ["Suggestion", "EvolutionLog", "WorkflowResult", "AnalysisReport"] {
            assert!(schemas.contains_key(name), "{name}");
        }
    }
}
