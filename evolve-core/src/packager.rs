//! Wraps a selection and its produced content into a [`Suggestion`].

use crate::domain::{AnalysisReport, FileAction, QualityRule, Suggestion, SuggestionFileOp};
use crate::selector::Selection;
use crate::templates::test_path_for;
use crate::transformer::Rewrite;

/// Description and reasoning text for a suggestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rationale {
    /// What the change does.
    pub description: String,
    /// Why it is worth making.
    pub reasoning: String,
}

impl Rationale {
    /// Explain `selection` using the analysis facts and the rewrites that
    /// changed the content.
    pub fn describe(
        selection: &Selection,
        report: &AnalysisReport,
        applied: Option<&[Rewrite]>,
    ) -> Self {
        match selection {
            Selection::FixIssues { path, issues } => {
                let findings: Vec<&str> = issues
                    .iter()
                    .map(|issue| issue.description.as_str())
                    .collect();
                let mut description = format!(
                    "Addresses {} finding(s) in {path}: {}.",
                    issues.len(),
                    findings.join("; ")
                );
                let changes = summarize(applied.unwrap_or_default());
                if !changes.is_empty() {
                    description.push_str(&format!(" Changes: {changes}."));
                }
                let manual: Vec<&str> = issues
                    .iter()
                    .filter(|issue| needs_review(issue.rule))
                    .map(|issue| issue.description.as_str())
                    .collect();
                if !manual.is_empty() {
                    description.push_str(&format!(
                        " Left for manual review: {}.",
                        manual.join("; ")
                    ));
                }
                let reasoning = issues
                    .first()
                    .map(|issue| rule_reasoning(issue.rule))
                    .unwrap_or_default()
                    .to_string();
                Self {
                    description,
                    reasoning,
                }
            }
            Selection::CreateMissing { filename } => {
                let language = report.main_language.as_deref().unwrap_or("this");
                Self {
                    description: format!(
                        "Adds the missing {filename} expected in a {language} project."
                    ),
                    reasoning: file_reasoning(filename).to_string(),
                }
            }
            Selection::AddTests { path } => Self {
                description: format!(
                    "Adds a starter test suite at {} covering {path}, the largest untested file.",
                    test_path_for(path)
                ),
                reasoning: "No tests were found in the repository. A first test file gives \
                            later changes a safety net and a place to grow coverage."
                    .to_string(),
            },
            Selection::Refactor { path } => {
                let changes = summarize(applied.unwrap_or_default());
                let description = if changes.is_empty() {
                    format!("Tidies {path}.")
                } else {
                    format!("Tidies {path}: {changes}.")
                };
                Self {
                    description,
                    reasoning: format!(
                        "No outstanding issues were found. {path} is the largest code file, so \
                         consistent structure there helps readers the most."
                    ),
                }
            }
            Selection::NoCodeFiles => {
                let sentinel = Suggestion::no_code_files();
                Self {
                    description: sentinel.description,
                    reasoning: sentinel.reasoning,
                }
            }
        }
    }
}

fn summarize(applied: &[Rewrite]) -> String {
    applied
        .iter()
        .map(|rewrite| rewrite.summary())
        .collect::<Vec<_>>()
        .join(", ")
}

fn needs_review(rule: QualityRule) -> bool {
    matches!(
        rule,
        QualityRule::LongFunctions | QualityRule::HardcodedUrls | QualityRule::MissingErrorBoundary
    )
}

fn rule_reasoning(rule: QualityRule) -> &'static str {
    match rule {
        QualityRule::UnguardedFetch => {
            "Network requests can fail at any time. Without a catch the rejection surfaces as an \
             unhandled error far from its cause."
        }
        QualityRule::ConsoleStatements => {
            "Debug output left in shipped code clutters logs and can leak internal state."
        }
        QualityRule::LongFunctions => "Long functions are harder to read and to test in isolation.",
        QualityRule::LooseTypes => {
            "`any` switches off type checking. `unknown` keeps values safe until they are narrowed."
        }
        QualityRule::MissingComments => {
            "A short header tells readers what the module provides before they read its body."
        }
        QualityRule::UnusedImports => {
            "Unused imports are noise for readers and can pull dead code into bundles."
        }
        QualityRule::HardcodedUrls => {
            "Hardcoded URLs tie the code to one environment and should come from configuration."
        }
        QualityRule::MissingErrorBoundary => {
            "Without an error boundary a single render error unmounts the whole component tree."
        }
    }
}

fn file_reasoning(filename: &str) -> &'static str {
    match filename {
        "package.json" => "A manifest records dependencies and scripts so the project installs and runs reproducibly.",
        ".gitignore" => "Ignoring dependencies, build output and local secrets keeps them out of version control.",
        "tsconfig.json" => "An explicit compiler configuration makes TypeScript checks consistent across editors and CI.",
        "requirements.txt" => "Pinned requirements let anyone recreate the Python environment.",
        "go.mod" => "A module file pins the module path and Go version for reproducible builds.",
        "Cargo.toml" => "A manifest is required to build the crate with cargo.",
        "pom.xml" => "A build descriptor lets Maven resolve dependencies and run the build.",
        "README.md" => "A README is the first thing visitors read and explains how to get started.",
        _ => "The file is expected for this kind of project.",
    }
}

/// Build the suggestion for `selection` with the produced file `content`.
///
/// Always emits exactly one file operation, except for
/// [`Selection::NoCodeFiles`] which yields [`Suggestion::no_code_files`].
pub fn package(selection: &Selection, content: String, rationale: Rationale) -> Suggestion {
    let (title, path, action) = match selection {
        Selection::FixIssues { path, .. } => {
            (format!("Fix code issues in {path}"), path.clone(), FileAction::Modify)
        }
        Selection::CreateMissing { filename } => {
            (format!("Add missing {filename}"), filename.clone(), FileAction::Create)
        }
        Selection::AddTests { path } => {
            (format!("Add tests for {path}"), test_path_for(path), FileAction::Create)
        }
        Selection::Refactor { path } => (format!("Refactor {path}"), path.clone(), FileAction::Modify),
        Selection::NoCodeFiles => return Suggestion::no_code_files(),
    };

    Suggestion {
        kind: selection.category(),
        title,
        description: rationale.description,
        reasoning: rationale.reasoning,
        files: vec![SuggestionFileOp {
            path,
            action,
            content,
        }],
    }
}
