//! Report formatting utilities for Evolve outputs.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::domain::{AnalysisReport, Suggestion};
use crate::provider::ProviderKind;

/// How the input files were obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum LoadStatus {
    /// Loading has not started.
    Pending,
    /// Files were read from a local checkout.
    Local,
    /// Files were fetched from the hosting service.
    Fetched,
    /// Loading failed with an error message.
    Failed(String),
}

/// Outcome of one `suggest` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionReport {
    /// Repository source (path or `owner/name`).
    pub source: String,
    /// Load status.
    pub load_status: LoadStatus,
    /// Number of files handed to the engine.
    pub files_analyzed: usize,
    /// Files replaced by placeholder content.
    pub unreadable_files: Vec<String>,
    /// Provider that produced the suggestion.
    pub provider: Option<ProviderKind>,
    /// The suggestion, when the engine ran.
    pub suggestion: Option<Suggestion>,
    /// Whether the file operations were written to disk.
    pub applied: bool,
    /// Errors encountered along the way.
    pub errors: Vec<String>,
}

impl SuggestionReport {
    /// Create a new report for a source.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            load_status: LoadStatus::Pending,
            files_analyzed: 0,
            unreadable_files: Vec::new(),
            provider: None,
            suggestion: None,
            applied: false,
            errors: Vec::new(),
        }
    }

    /// Create a report for a source that could not be loaded.
    pub fn failed(source: impl Into<String>, error: impl Into<String>) -> Self {
        let mut report = Self::new(source);
        report.load_status = LoadStatus::Failed(error.into());
        report
    }
}

/// Outcome of one `analyze` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRun {
    /// Repository source (path or `owner/name`).
    pub source: String,
    /// Load status.
    pub load_status: LoadStatus,
    /// Number of files analyzed.
    pub files_analyzed: usize,
    /// The analysis, when loading succeeded.
    pub analysis: Option<AnalysisReport>,
    /// Errors encountered along the way.
    pub errors: Vec<String>,
}

impl AnalysisRun {
    /// Create a new analysis run for a source.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            load_status: LoadStatus::Pending,
            files_analyzed: 0,
            analysis: None,
            errors: Vec::new(),
        }
    }
}

/// Render a suggestion report as Markdown.
pub fn render_suggestion_markdown(report: &SuggestionReport) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Evolve Suggestion\n");
    let _ = writeln!(output, "## {}\n", report.source);
    append_load_status(&mut output, &report.load_status, report.files_analyzed);
    if let Some(provider) = report.provider {
        let _ = writeln!(output, "- Provider: {provider}\n");
    }
    match &report.suggestion {
        Some(suggestion) => append_suggestion(&mut output, suggestion, report.applied),
        None => {
            let _ = writeln!(output, "### Suggestion\nNo suggestion produced.\n");
        }
    }
    append_list(
        &mut output,
        "Unreadable files",
        &report.unreadable_files,
        "All files loaded.",
    );
    append_list(&mut output, "Errors", &report.errors, "No errors reported.");
    output
}

/// Render a suggestion report as plain text.
pub fn render_suggestion_text(report: &SuggestionReport) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Source: {}", report.source);
    let _ = writeln!(output, "Status: {}", status_label(&report.load_status));
    let _ = writeln!(output, "Files analyzed: {}", report.files_analyzed);
    if let Some(provider) = report.provider {
        let _ = writeln!(output, "Provider: {provider}");
    }
    if let Some(suggestion) = &report.suggestion {
        let _ = writeln!(
            output,
            "\n[{}] {}\n",
            suggestion.kind.as_str(),
            suggestion.title
        );
        let _ = writeln!(output, "{}", suggestion.description);
        if !suggestion.reasoning.is_empty() {
            let _ = writeln!(output, "\nWhy: {}", suggestion.reasoning);
        }
        for op in &suggestion.files {
            let _ = writeln!(output, "  {} {}", op.action.as_str(), op.path);
        }
        if report.applied {
            let _ = writeln!(output, "\nChanges written to disk.");
        }
    }
    for file in &report.unreadable_files {
        let _ = writeln!(output, "warning: could not read {file}");
    }
    for error in &report.errors {
        let _ = writeln!(output, "error: {error}");
    }
    output
}

/// Render an analysis run as Markdown.
pub fn render_analysis_markdown(run: &AnalysisRun) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Evolve Analysis\n");
    let _ = writeln!(output, "## {}\n", run.source);
    append_load_status(&mut output, &run.load_status, run.files_analyzed);
    match &run.analysis {
        Some(analysis) => {
            append_languages(&mut output, analysis);
            let frameworks: Vec<String> = analysis.frameworks_detected.iter().cloned().collect();
            append_list(&mut output, "Frameworks", &frameworks, "No frameworks detected.");
            append_list(
                &mut output,
                "Findings",
                &analysis.findings(),
                "No findings.",
            );
            append_list(
                &mut output,
                "Missing files",
                &analysis.missing_files,
                "No missing files.",
            );
            let tests = if analysis.has_tests { "found" } else { "none found" };
            let _ = writeln!(output, "### Tests\n{tests}\n");
        }
        None => {
            let _ = writeln!(output, "### Analysis\nAnalysis unavailable.\n");
        }
    }
    append_list(&mut output, "Errors", &run.errors, "No errors reported.");
    output
}

/// Render an analysis run as plain text.
pub fn render_analysis_text(run: &AnalysisRun) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Source: {}", run.source);
    let _ = writeln!(output, "Status: {}", status_label(&run.load_status));
    let _ = writeln!(output, "Files analyzed: {}", run.files_analyzed);
    if let Some(analysis) = &run.analysis {
        let main = analysis.main_language.as_deref().unwrap_or("none");
        let _ = writeln!(output, "Main language: {main}");
        for (language, percent) in format_language_lines(analysis) {
            let _ = writeln!(output, "  {language}: {percent:.2}%");
        }
        for finding in analysis.findings() {
            let _ = writeln!(output, "finding: {finding}");
        }
        for missing in &analysis.missing_files {
            let _ = writeln!(output, "missing: {missing}");
        }
        let _ = writeln!(output, "Tests present: {}", analysis.has_tests);
    }
    for error in &run.errors {
        let _ = writeln!(output, "error: {error}");
    }
    output
}

/// Render any serializable report payload as JSON.
pub fn render_json<T: Serialize + ?Sized>(payload: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(payload)
}

/// Language shares by line count, largest first.
pub fn format_language_lines(analysis: &AnalysisReport) -> Vec<(String, f64)> {
    let total: usize = analysis
        .language_line_counts
        .iter()
        .map(|entry| entry.lines)
        .sum();
    if total == 0 {
        return Vec::new();
    }
    let mut items: Vec<(String, f64)> = analysis
        .language_line_counts
        .iter()
        .map(|entry| {
            (
                entry.language.clone(),
                entry.lines as f64 * 100.0 / total as f64,
            )
        })
        .collect();
    items.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    items
}

fn status_label(status: &LoadStatus) -> String {
    match status {
        LoadStatus::Pending => "pending".to_string(),
        LoadStatus::Local => "local".to_string(),
        LoadStatus::Fetched => "fetched".to_string(),
        LoadStatus::Failed(error) => format!("failed ({error})"),
    }
}

fn append_load_status(output: &mut String, status: &LoadStatus, files: usize) {
    let _ = writeln!(output, "- Status: {}", status_label(status));
    let _ = writeln!(output, "- Files analyzed: {files}");
    let _ = writeln!(output);
}

fn append_suggestion(output: &mut String, suggestion: &Suggestion, applied: bool) {
    let _ = writeln!(output, "### {}\n", suggestion.title);
    let _ = writeln!(output, "- Type: {}", suggestion.kind.as_str());
    if applied {
        let _ = writeln!(output, "- Applied: yes");
    }
    let _ = writeln!(output, "\n{}\n", suggestion.description);
    if !suggestion.reasoning.is_empty() {
        let _ = writeln!(output, "**Reasoning:** {}\n", suggestion.reasoning);
    }
    for op in &suggestion.files {
        let _ = writeln!(output, "#### `{}` ({})", op.path, op.action.as_str());
        let _ = writeln!(output, "```text\n{}\n```\n", op.content.trim_end());
    }
}

fn append_languages(output: &mut String, analysis: &AnalysisReport) {
    let languages = format_language_lines(analysis);
    if languages.is_empty() {
        let _ = writeln!(output, "### Languages\nNo languages detected.\n");
        return;
    }
    let _ = writeln!(output, "### Languages");
    for (language, percent) in languages {
        let _ = writeln!(output, "- {language}: {percent:.2}%");
    }
    let _ = writeln!(output);
}

fn append_list(output: &mut String, title: &str, items: &[String], empty_message: &str) {
    if items.is_empty() {
        let _ = writeln!(output, "### {title}\n{empty_message}\n");
        return;
    }
    let _ = writeln!(output, "### {title}");
    for item in items {
        let _ = writeln!(output, "- {item}");
    }
    let _ = writeln!(output);
}
