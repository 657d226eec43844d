//! Pull request bodies for suggestions, with optional repository templates.

use crate::EvolveError;
use crate::domain::Suggestion;
use crate::error::Result;
use crate::fs::FileSystem;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Placeholder token for the suggestion type.
pub const EVOLVE_TYPE: &str = "{{EVOLVE_TYPE}}";
/// Placeholder token for the suggestion description.
pub const EVOLVE_DESCRIPTION: &str = "{{EVOLVE_DESCRIPTION}}";
/// Placeholder token for the suggestion reasoning.
pub const EVOLVE_REASONING: &str = "{{EVOLVE_REASONING}}";
/// Placeholder token for the changed file list.
pub const EVOLVE_FILES: &str = "{{EVOLVE_FILES}}";

/// Interpolated PR template values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrTemplateContext {
    /// Text replacement for the type placeholder.
    pub kind: String,
    /// Text replacement for the description placeholder.
    pub description: String,
    /// Text replacement for the reasoning placeholder.
    pub reasoning: String,
    /// Text replacement for the files placeholder.
    pub files: String,
}

impl PrTemplateContext {
    /// Build a template context from a suggestion.
    pub fn from_suggestion(suggestion: &Suggestion) -> Self {
        Self {
            kind: suggestion.kind.as_str().to_string(),
            description: suggestion.description.clone(),
            reasoning: non_empty_or(&suggestion.reasoning, "No reasoning provided."),
            files: format_files(suggestion),
        }
    }
}

/// Default PR body used when the repository has no template.
pub fn render_pr_body(suggestion: &Suggestion) -> String {
    let context = PrTemplateContext::from_suggestion(suggestion);
    let mut output = String::new();
    let _ = writeln!(output, "## Automated Evolution\n");
    let _ = writeln!(output, "**Type:** {}\n", context.kind);
    let _ = writeln!(output, "**Description:**\n{}\n", context.description);
    let _ = writeln!(output, "**Reasoning:**\n{}\n", context.reasoning);
    let _ = writeln!(output, "**Files:**\n{}\n", context.files);
    let _ = writeln!(output, "---");
    let _ = write!(
        output,
        "*This pull request was generated automatically by Evolve.*"
    );
    output
}

/// Attempt to locate and interpolate a PR template for the given repository root.
pub fn interpolate_pr_template<F: FileSystem>(
    fs: &F,
    repo_root: &Path,
    context: &PrTemplateContext,
) -> Result<Option<String>> {
    let template_path = find_pr_template(repo_root);
    let Some(template_path) = template_path else {
        return Ok(None);
    };

    let template = fs.read_to_string(&template_path)?;
    let rendered = apply_context(template, context);
    Ok(Some(rendered))
}

/// PR body for a local checkout: the repository template when one exists,
/// otherwise [`render_pr_body`].
pub fn pr_body_for_checkout<F: FileSystem>(
    fs: &F,
    repo_root: &Path,
    suggestion: &Suggestion,
) -> Result<String> {
    let context = PrTemplateContext::from_suggestion(suggestion);
    match interpolate_pr_template(fs, repo_root, &context)? {
        Some(rendered) => Ok(rendered),
        None => Ok(render_pr_body(suggestion)),
    }
}

/// Locate a PR template in the repository, if it exists.
pub fn find_pr_template(repo_root: &Path) -> Option<PathBuf> {
    let candidates = [
        repo_root.join("PULL_REQUEST_TEMPLATE.md"),
        repo_root.join(".github").join("PULL_REQUEST_TEMPLATE.md"),
        repo_root.join("docs").join("PULL_REQUEST_TEMPLATE.md"),
    ];
    candidates.into_iter().find(|path| path.is_file())
}

fn format_files(suggestion: &Suggestion) -> String {
    if suggestion.files.is_empty() {
        return "No file changes.".to_string();
    }
    suggestion
        .files
        .iter()
        .map(|op| format!("- `{}` ({})", op.path, op.action.as_str()))
        .collect::<Vec<String>>()
        .join("\n")
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn apply_context(mut template: String, context: &PrTemplateContext) -> String {
    let replacements = [
        (EVOLVE_TYPE, &context.kind),
        (EVOLVE_DESCRIPTION, &context.description),
        (EVOLVE_REASONING, &context.reasoning),
        (EVOLVE_FILES, &context.files),
    ];
    for (token, value) in replacements {
        if template.contains(token) {
            template = template.replace(token, value.trim());
        }
    }
    template
}

/// Helper to ensure placeholders are present in a template, returning an error if not.
pub fn ensure_placeholders(template: &str) -> Result<()> {
    let missing: Vec<&str> = [EVOLVE_TYPE, EVOLVE_DESCRIPTION, EVOLVE_REASONING, EVOLVE_FILES]
        .into_iter()
        .filter(|token| !template.contains(*token))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EvolveError::Other(format!(
            "missing placeholders: {}",
            missing.join(", ")
        )))
    }
}
