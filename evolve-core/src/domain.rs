//! Domain entities for Evolve.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A repository file handed to the engine for analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SourceFile {
    /// Repository-relative path.
    pub path: String,
    /// Full text content.
    pub content: String,
}

impl SourceFile {
    /// Create a source file from a path and its content.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Descriptive repository metadata used for prompts and generated boilerplate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryContext {
    /// Full repository name (`owner/name`).
    pub full_name: String,
    /// Optional repository description.
    #[serde(default)]
    pub description: Option<String>,
    /// Primary language as reported by the hosting service.
    #[serde(default)]
    pub language: Option<String>,
}

impl RepositoryContext {
    /// Short project name (the part after the owner).
    pub fn project_name(&self) -> &str {
        self.full_name
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("project")
    }
}

/// Total line count observed for one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LanguageLines {
    /// Language display name.
    pub language: String,
    /// Accumulated line count.
    pub lines: usize,
}

/// Identifier of a heuristic quality check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum QualityRule {
    /// `fetch` calls without any try/catch in the file.
    UnguardedFetch,
    /// Leftover `console.*` calls outside of tests.
    ConsoleStatements,
    /// Large files that declare functions.
    LongFunctions,
    /// Explicit `any` annotations in TypeScript.
    LooseTypes,
    /// Long files without a single comment.
    MissingComments,
    /// Named imports that are never referenced.
    UnusedImports,
    /// Literal URLs outside configuration files.
    HardcodedUrls,
    /// Default-exported React components without an error boundary.
    MissingErrorBoundary,
}

impl QualityRule {
    /// Stable identifier for the rule.
    pub fn id(&self) -> &'static str {
        match self {
            Self::UnguardedFetch => "unguarded-fetch",
            Self::ConsoleStatements => "console-statements",
            Self::LongFunctions => "long-functions",
            Self::LooseTypes => "loose-types",
            Self::MissingComments => "missing-comments",
            Self::UnusedImports => "unused-imports",
            Self::HardcodedUrls => "hardcoded-urls",
            Self::MissingErrorBoundary => "missing-error-boundary",
        }
    }
}

/// A heuristic finding about a specific file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QualityIssue {
    /// Path of the offending file.
    pub path: String,
    /// Rule that produced the finding.
    pub rule: QualityRule,
    /// Human-readable description without the path prefix.
    pub description: String,
}

impl QualityIssue {
    /// Render as `"<path>: <description>"`.
    pub fn finding(&self) -> String {
        format!("{}: {}", self.path, self.description)
    }
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.description)
    }
}

/// Aggregate facts computed once per suggestion request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Line counts per language in first-seen order.
    pub language_line_counts: Vec<LanguageLines>,
    /// Language with the most lines, ties going to the first seen.
    pub main_language: Option<String>,
    /// Frameworks detected anywhere in the input.
    pub frameworks_detected: BTreeSet<String>,
    /// Findings in file scan order, then check order.
    pub quality_issues: Vec<QualityIssue>,
    /// Expected project files that are absent.
    pub missing_files: Vec<String>,
    /// Whether any test file or test framework marker was seen.
    pub has_tests: bool,
}

impl AnalysisReport {
    /// All findings rendered as `"<path>: <description>"`.
    pub fn findings(&self) -> Vec<String> {
        self.quality_issues.iter().map(QualityIssue::finding).collect()
    }

    /// Findings recorded for a single path.
    pub fn issues_for<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a QualityIssue> + 'a {
        self.quality_issues
            .iter()
            .filter(move |issue| issue.path == path)
    }

    /// Whether the given framework was detected.
    pub fn uses_framework(&self, name: &str) -> bool {
        self.frameworks_detected.contains(name)
    }

    /// Whether the main language matches `language`.
    pub fn main_language_is(&self, language: &str) -> bool {
        self.main_language.as_deref() == Some(language)
    }
}

/// Kind of change a suggestion represents.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    /// New functionality or project files.
    Feature,
    /// A fix for a concrete defect.
    Bugfix,
    /// Structural cleanup without behavior change.
    Refactor,
    /// Performance or efficiency improvement.
    Optimization,
}

impl SuggestionKind {
    /// Lowercase label used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feature => "feature",
            Self::Bugfix => "bugfix",
            Self::Refactor => "refactor",
            Self::Optimization => "optimization",
        }
    }
}

/// File mutation kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    /// Create a new file.
    Create,
    /// Replace an existing file's content.
    Modify,
    /// Delete a file.
    Delete,
}

impl FileAction {
    /// Lowercase label used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Modify => "modify",
            Self::Delete => "delete",
        }
    }
}

/// One file mutation proposed by a suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SuggestionFileOp {
    /// Target path.
    pub path: String,
    /// Mutation kind.
    pub action: FileAction,
    /// Full file content after the change.
    #[serde(default)]
    pub content: String,
}

/// The engine's single proposed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Suggestion {
    /// Kind of change.
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    /// Short title.
    pub title: String,
    /// What the change does.
    pub description: String,
    /// Why the change is worth making.
    #[serde(default)]
    pub reasoning: String,
    /// File operations, empty only for the no-code-files sentinel.
    pub files: Vec<SuggestionFileOp>,
}

impl Suggestion {
    /// Sentinel returned when the input holds no code to work on.
    pub fn no_code_files() -> Self {
        Self {
            kind: SuggestionKind::Refactor,
            title: "No code files found".to_string(),
            description: "None of the provided files is source code, so there is nothing to \
                          analyze. Select code files from the repository and try again."
                .to_string(),
            reasoning: "Suggestions are derived from source code content.".to_string(),
            files: Vec::new(),
        }
    }

    /// Whether this is the empty "nothing to do" sentinel.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggestion_serializes_wire_field_names() {
        let suggestion = Suggestion {
            kind: SuggestionKind::Bugfix,
            title: "Fix".to_string(),
            description: "desc".to_string(),
            reasoning: "why".to_string(),
            files: vec![SuggestionFileOp {
                path: "a.ts".to_string(),
                action: FileAction::Modify,
                content: "const y=1".to_string(),
            }],
        };

        let value = serde_json::to_value(&suggestion).expect("serialize");

        assert_eq!(value["type"], "bugfix");
        assert_eq!(value["files"][0]["action"], "modify");
        assert_eq!(value["files"][0]["path"], "a.ts");
        assert!(value.get("kind").is_none());
    }

    #[test]
    fn quality_issue_renders_finding() {
        let issue = QualityIssue {
            path: "src/app.ts".to_string(),
            rule: QualityRule::ConsoleStatements,
            description: "contains 2 console statements".to_string(),
        };
        assert_eq!(issue.finding(), "src/app.ts: contains 2 console statements");
        assert_eq!(issue.to_string(), issue.finding());
        assert_eq!(issue.rule.id(), "console-statements");
    }

    #[test]
    fn project_name_falls_back_when_blank() {
        let context = RepositoryContext {
            full_name: "octo/widgets".to_string(),
            ..RepositoryContext::default()
        };
        assert_eq!(context.project_name(), "widgets");
        assert_eq!(RepositoryContext::default().project_name(), "project");
    }
}
