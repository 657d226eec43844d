//! Picks the single change the engine will propose.

use crate::domain::{AnalysisReport, QualityIssue, SourceFile, SuggestionKind};
use crate::language::{is_code_file, is_fixable_code_file, is_test_path};

/// The candidate chosen by [`select`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Rewrite an existing code file to address its findings.
    FixIssues {
        /// Target path.
        path: String,
        /// Every finding recorded for the target, primary finding first.
        issues: Vec<QualityIssue>,
    },
    /// Create an expected project file that is absent.
    CreateMissing {
        /// File name from the language checklist.
        filename: String,
    },
    /// Create a test file for an untested code file.
    AddTests {
        /// Code file the tests will cover.
        path: String,
    },
    /// Tidy up the largest code file.
    Refactor {
        /// Target path.
        path: String,
    },
    /// The input holds no code at all.
    NoCodeFiles,
}

impl Selection {
    /// Suggestion kind for this candidate.
    pub fn category(&self) -> SuggestionKind {
        match self {
            Self::FixIssues { .. } => SuggestionKind::Bugfix,
            Self::CreateMissing { .. } | Self::AddTests { .. } => SuggestionKind::Feature,
            Self::Refactor { .. } | Self::NoCodeFiles => SuggestionKind::Refactor,
        }
    }

    /// Path the resulting file operation touches, if any.
    pub fn target_path(&self) -> Option<&str> {
        match self {
            Self::FixIssues { path, .. } | Self::AddTests { path } | Self::Refactor { path } => {
                Some(path)
            }
            Self::CreateMissing { filename } => Some(filename),
            Self::NoCodeFiles => None,
        }
    }
}

/// Choose one candidate; the first matching rule wins.
pub fn select(report: &AnalysisReport, files: &[SourceFile]) -> Selection {
    select_skipping(report, files, &[])
}

/// Like [`select`], but never targets the `skipped` paths for issue fixes.
/// Used when rewriting a flagged file would leave it unchanged.
pub fn select_skipping(report: &AnalysisReport, files: &[SourceFile], skipped: &[String]) -> Selection {
    if !files.iter().any(|file| is_code_file(&file.path)) {
        return Selection::NoCodeFiles;
    }

    if let Some(primary) = report
        .quality_issues
        .iter()
        .find(|issue| is_fixable_code_file(&issue.path) && !skipped.contains(&issue.path))
    {
        let issues = report.issues_for(&primary.path).cloned().collect();
        return Selection::FixIssues {
            path: primary.path.clone(),
            issues,
        };
    }

    if let Some(filename) = report.missing_files.first() {
        return Selection::CreateMissing {
            filename: filename.clone(),
        };
    }

    if !report.has_tests {
        if let Some(file) = largest(files, |path| is_code_file(path) && !is_test_path(path)) {
            return Selection::AddTests {
                path: file.path.clone(),
            };
        }
    }

    let target = largest(files, |path| is_code_file(path) && !is_test_path(path))
        .or_else(|| largest(files, is_code_file));
    match target {
        Some(file) => Selection::Refactor {
            path: file.path.clone(),
        },
        None => Selection::NoCodeFiles,
    }
}

/// Largest matching file by content length; ties go to the earliest.
fn largest<'a>(files: &'a [SourceFile], accept: impl Fn(&str) -> bool) -> Option<&'a SourceFile> {
    let mut best: Option<&SourceFile> = None;
    for file in files.iter().filter(|file| accept(&file.path)) {
        if best.is_none_or(|current| file.content.len() > current.content.len()) {
            best = Some(file);
        }
    }
    best
}
