#![deny(missing_docs)]
//! Evolve core library.
//!
//! This crate turns a handful of repository files into one concrete,
//! self-contained improvement: it analyzes the files, selects what to work
//! on, rewrites or generates content, and packages the result as a
//! [`Suggestion`]. Everything here is synchronous and free of I/O except
//! the [`FileSystem`] adapter; remote model calls sit behind
//! [`TextGenerator`].

pub mod analyzer;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fs;
pub mod imports;
pub mod language;
pub mod packager;
pub mod pr_template;
pub mod prompt;
pub mod provider;
pub mod report;
pub mod selector;
pub mod templates;
pub mod transformer;

pub use analyzer::analyze;
pub use domain::{
    AnalysisReport, FileAction, LanguageLines, QualityIssue, QualityRule, RepositoryContext,
    SourceFile, Suggestion, SuggestionFileOp, SuggestionKind,
};
pub use engine::{
    FAILED_CONTENT_PLACEHOLDER, SuggestionEngine, SuggestionOutcome, heuristic_suggestion,
};
pub use error::{EvolveError, Result};
pub use fs::{FileSystem, StdFileSystem, load_sources};
pub use pr_template::{
    EVOLVE_DESCRIPTION, EVOLVE_FILES, EVOLVE_REASONING, EVOLVE_TYPE, PrTemplateContext,
    ensure_placeholders, find_pr_template, interpolate_pr_template, pr_body_for_checkout,
    render_pr_body,
};
pub use prompt::{build_prompt, parse_suggestion};
pub use provider::{ProviderConfig, ProviderKind, TextGenerator};
pub use report::{
    AnalysisRun, LoadStatus, SuggestionReport, format_language_lines, render_analysis_markdown,
    render_analysis_text, render_json, render_suggestion_markdown, render_suggestion_text,
};
pub use selector::{Selection, select, select_skipping};
pub use transformer::{TransformPlan, Transformed};
