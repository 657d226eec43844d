//! Text analysis over repository files.
//!
//! [`analyze`] builds an [`AnalysisReport`] from raw `(path, content)` pairs:
//! language line counts, detected frameworks, heuristic quality findings,
//! expected-but-missing project files, and whether any tests exist. Every check
//! is a plain text heuristic; a check that does not match simply yields nothing.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{AnalysisReport, LanguageLines, QualityIssue, QualityRule, SourceFile};
use crate::imports::unused_named_imports;
use crate::language::{
    extension, is_component_file, is_doc_path, is_test_path, is_typescript, language_for_extension,
};

/// Files longer than this with function syntax are flagged as long.
const LONG_FILE_LINES: usize = 50;
/// Files longer than this without comments are flagged as uncommented.
const UNCOMMENTED_FILE_LINES: usize = 30;

static FETCH_CALL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bfetch\s*\(").expect("valid fetch regex"));

static TRY_CATCH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:try|catch)\b").expect("valid try/catch regex"));

static CONSOLE_CALL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bconsole\s*\.\s*[A-Za-z_$][\w$]*\s*\(").expect("valid console regex")
});

static FUNCTION_SYNTAX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bfunction\b|=>|\bdef\s+\w+\s*\(|\bfn\s+\w+|\bfunc\s+\w+")
        .expect("valid function regex")
});

static ANY_TYPE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?::\s*any\b|\bas\s+any\b|<\s*any\s*[,>]|,\s*any\s*>|\bany\[\])").expect("valid any regex")
});

static COMMENT_MARKER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:^|\s)(?://|/\*|#|<!--)").expect("valid comment regex")
});

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://").expect("valid url regex"));

static TEST_CALL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:describe|it)\s*\(").expect("valid test call regex"));

const ERROR_BOUNDARY_MARKERS: &[&str] = &["errorboundary", "error-boundary", "componentdidcatch"];

const TEST_FRAMEWORK_MARKERS: &[&str] = &["pytest", "unittest"];

/// Framework names and the lowercase content markers that imply them.
const FRAMEWORKS: &[(&str, &[&str])] = &[
    (
        "React",
        &["from 'react", "from \"react", "require('react", "require(\"react"],
    ),
    ("Next.js", &["from 'next/", "from \"next/", "from 'next'", "from \"next\""]),
    ("Vue", &["from 'vue'", "from \"vue\"", "createapp("]),
    ("Angular", &["@angular/"]),
    ("Svelte", &["from 'svelte", "from \"svelte"]),
    (
        "Express",
        &["from 'express'", "from \"express\"", "require('express')", "require(\"express\")"],
    ),
    ("Django", &["django"]),
    ("Flask", &["from flask", "import flask"]),
    ("FastAPI", &["fastapi"]),
    ("Spring", &["org.springframework"]),
    ("Tailwind CSS", &["@tailwind", "tailwindcss"]),
];

/// An expected project file and the path fragments that satisfy it.
struct ExpectedFile {
    filename: &'static str,
    probes: &'static [&'static str],
}

const PACKAGE_JSON: ExpectedFile = ExpectedFile {
    filename: "package.json",
    probes: &["package.json"],
};
const GITIGNORE: ExpectedFile = ExpectedFile {
    filename: ".gitignore",
    probes: &[".gitignore"],
};
const TSCONFIG: ExpectedFile = ExpectedFile {
    filename: "tsconfig.json",
    probes: &["tsconfig"],
};
const REQUIREMENTS: ExpectedFile = ExpectedFile {
    filename: "requirements.txt",
    probes: &["requirements", "pyproject.toml", "setup.py", "pipfile"],
};
const POM: ExpectedFile = ExpectedFile {
    filename: "pom.xml",
    probes: &["pom.xml", "build.gradle"],
};
const GO_MOD: ExpectedFile = ExpectedFile {
    filename: "go.mod",
    probes: &["go.mod"],
};
const CARGO_TOML: ExpectedFile = ExpectedFile {
    filename: "Cargo.toml",
    probes: &["cargo.toml"],
};
const README: ExpectedFile = ExpectedFile {
    filename: "README.md",
    probes: &["readme"],
};

fn checklist(language: &str) -> Vec<&'static ExpectedFile> {
    let mut expected: Vec<&'static ExpectedFile> = match language {
        "JavaScript" => vec![&PACKAGE_JSON, &GITIGNORE],
        "TypeScript" => vec![&PACKAGE_JSON, &GITIGNORE, &TSCONFIG],
        "Python" => vec![&REQUIREMENTS, &GITIGNORE],
        "Java" => vec![&POM, &GITIGNORE],
        "Go" => vec![&GO_MOD, &GITIGNORE],
        "Rust" => vec![&CARGO_TOML, &GITIGNORE],
        _ => Vec::new(),
    };
    expected.push(&README);
    expected
}

/// Per-file view handed to each quality rule.
struct FileFacts<'a> {
    path: &'a str,
    lower_path: String,
    content: &'a str,
    lines: usize,
}

type RuleCheck = fn(&FileFacts<'_>) -> Option<String>;

/// The quality battery, in reporting order.
const QUALITY_RULES: &[(QualityRule, RuleCheck)] = &[
    (QualityRule::UnguardedFetch, check_unguarded_fetch),
    (QualityRule::ConsoleStatements, check_console_statements),
    (QualityRule::LongFunctions, check_long_functions),
    (QualityRule::LooseTypes, check_loose_types),
    (QualityRule::MissingComments, check_missing_comments),
    (QualityRule::UnusedImports, check_unused_imports),
    (QualityRule::HardcodedUrls, check_hardcoded_urls),
    (QualityRule::MissingErrorBoundary, check_missing_error_boundary),
];

/// Analyze a set of source files.
///
/// Pure and deterministic: the same input in the same order always produces
/// the same report.
pub fn analyze(files: &[SourceFile]) -> AnalysisReport {
    let mut report = AnalysisReport::default();

    for file in files {
        if let Some(language) = language_for_extension(&extension(&file.path)) {
            let lines = count_lines(&file.content);
            match report
                .language_line_counts
                .iter_mut()
                .find(|entry| entry.language == language)
            {
                Some(entry) => entry.lines += lines,
                None => report.language_line_counts.push(LanguageLines {
                    language: language.to_string(),
                    lines,
                }),
            }
        }

        detect_frameworks(&file.content, &mut report);

        if !is_doc_path(&file.path) {
            report.quality_issues.extend(check_quality(file));
        }

        if !report.has_tests && looks_like_test(file) {
            report.has_tests = true;
        }
    }

    report.main_language = main_language(&report.language_line_counts);
    if let Some(language) = report.main_language.clone() {
        report.missing_files = missing_files(&language, files);
    }

    log::debug!(
        "analyzed {} files: main language {:?}, {} findings, {} missing files",
        files.len(),
        report.main_language,
        report.quality_issues.len(),
        report.missing_files.len()
    );

    report
}

/// Run the quality battery for a single file.
pub fn check_quality(file: &SourceFile) -> Vec<QualityIssue> {
    let facts = FileFacts {
        path: &file.path,
        lower_path: file.path.to_lowercase(),
        content: &file.content,
        lines: count_lines(&file.content),
    };
    QUALITY_RULES
        .iter()
        .filter_map(|(rule, check)| {
            check(&facts).map(|description| QualityIssue {
                path: file.path.clone(),
                rule: *rule,
                description,
            })
        })
        .collect()
}

/// Number of `\n`-separated segments.
pub fn count_lines(content: &str) -> usize {
    content.split('\n').count()
}

/// Number of `console.*(` calls in the content.
pub fn count_console_calls(content: &str) -> usize {
    CONSOLE_CALL_REGEX.find_iter(content).count()
}

/// Whether the content contains an explicit `any` annotation.
pub fn has_any_annotation(content: &str) -> bool {
    ANY_TYPE_REGEX.is_match(content)
}

/// Whether the content has any comment marker.
pub fn has_comment_marker(content: &str) -> bool {
    COMMENT_MARKER_REGEX.is_match(content)
}

/// Whether the content calls `fetch` without any try/catch in sight.
pub fn has_unguarded_fetch(content: &str) -> bool {
    FETCH_CALL_REGEX.is_match(content) && !TRY_CATCH_REGEX.is_match(content)
}

fn main_language(counts: &[LanguageLines]) -> Option<String> {
    let mut best: Option<&LanguageLines> = None;
    for entry in counts {
        if best.is_none_or(|current| entry.lines > current.lines) {
            best = Some(entry);
        }
    }
    best.map(|entry| entry.language.clone())
}

fn missing_files(language: &str, files: &[SourceFile]) -> Vec<String> {
    let paths: Vec<String> = files.iter().map(|file| file.path.to_lowercase()).collect();
    let mut missing: Vec<String> = Vec::new();
    for expected in checklist(language) {
        let present = expected
            .probes
            .iter()
            .any(|probe| paths.iter().any(|path| path.contains(probe)));
        if !present && !missing.iter().any(|name| name == expected.filename) {
            missing.push(expected.filename.to_string());
        }
    }
    missing
}

fn detect_frameworks(content: &str, report: &mut AnalysisReport) {
    let lower = content.to_lowercase();
    for (name, markers) in FRAMEWORKS {
        if report.frameworks_detected.contains(*name) {
            continue;
        }
        if markers.iter().any(|marker| lower.contains(marker)) {
            report.frameworks_detected.insert((*name).to_string());
        }
    }
}

fn looks_like_test(file: &SourceFile) -> bool {
    if is_test_path(&file.path) {
        return true;
    }
    if TEST_CALL_REGEX.is_match(&file.content) {
        return true;
    }
    let lower = file.content.to_lowercase();
    TEST_FRAMEWORK_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

fn check_unguarded_fetch(facts: &FileFacts<'_>) -> Option<String> {
    has_unguarded_fetch(facts.content).then(|| "missing error handling for fetch calls".to_string())
}

fn check_console_statements(facts: &FileFacts<'_>) -> Option<String> {
    let count = count_console_calls(facts.content);
    if count == 0 || facts.lower_path.contains("test") || facts.lower_path.contains("spec") {
        return None;
    }
    Some(format!("contains {count} console statements"))
}

fn check_long_functions(facts: &FileFacts<'_>) -> Option<String> {
    (facts.lines > LONG_FILE_LINES && FUNCTION_SYNTAX_REGEX.is_match(facts.content))
        .then(|| "contains potentially long functions".to_string())
}

fn check_loose_types(facts: &FileFacts<'_>) -> Option<String> {
    (is_typescript(facts.path) && has_any_annotation(facts.content))
        .then(|| "contains loosely-typed annotations".to_string())
}

fn check_missing_comments(facts: &FileFacts<'_>) -> Option<String> {
    (facts.lines > UNCOMMENTED_FILE_LINES && !has_comment_marker(facts.content))
        .then(|| "lacks code comments".to_string())
}

fn check_unused_imports(facts: &FileFacts<'_>) -> Option<String> {
    let unused = unused_named_imports(facts.content);
    if unused.is_empty() {
        return None;
    }
    Some(format!("potentially unused imports: {}", unused.join(", ")))
}

fn check_hardcoded_urls(facts: &FileFacts<'_>) -> Option<String> {
    (!facts.lower_path.contains("config") && URL_REGEX.is_match(facts.content))
        .then(|| "contains hardcoded URLs".to_string())
}

fn check_missing_error_boundary(facts: &FileFacts<'_>) -> Option<String> {
    if !is_component_file(facts.path) || !facts.content.contains("export default") {
        return None;
    }
    let lower = facts.content.to_lowercase();
    let guarded = ERROR_BOUNDARY_MARKERS
        .iter()
        .any(|marker| lower.contains(marker));
    (!guarded).then(|| "React component missing error boundary".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, content: &str) -> SourceFile {
        SourceFile::new(path, content)
    }

    fn numbered_lines(count: usize, line: &str) -> String {
        (0..count).map(|_| line).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn counts_lines_per_language_in_first_seen_order() {
        let report = analyze(&[
            file("a.py", "x = 1\ny = 2"),
            file("b.ts", "const a = 1"),
            file("c.py", "z = 3"),
            file("notes.txt", "ignored\nlines"),
        ]);

        assert_eq!(
            report.language_line_counts,
            vec![
                LanguageLines {
                    language: "Python".to_string(),
                    lines: 3
                },
                LanguageLines {
                    language: "TypeScript".to_string(),
                    lines: 1
                },
            ]
        );
        assert_eq!(report.main_language.as_deref(), Some("Python"));
    }

    #[test]
    fn main_language_ties_go_to_first_seen() {
        let report = analyze(&[file("a.js", "1\n2"), file("b.py", "1\n2")]);
        assert_eq!(report.main_language.as_deref(), Some("JavaScript"));
    }

    #[test]
    fn detects_frameworks_once() {
        let report = analyze(&[
            file("a.tsx", "import React from 'react'\nimport Link from 'next/link'"),
            file("b.tsx", "import { useState } from \"react\""),
            file("views.py", "from django.http import HttpResponse"),
        ]);
        let frameworks: Vec<&str> = report
            .frameworks_detected
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(frameworks, vec!["Django", "Next.js", "React"]);
    }

    #[test]
    fn console_statements_are_counted_outside_tests() {
        let report = analyze(&[
            file("src/app.js", "console.log('a')\nconsole.warn('b')"),
            file("src/app.test.js", "console.log('a')"),
        ]);
        let findings = report.findings();
        assert!(findings.contains(&"src/app.js: contains 2 console statements".to_string()));
        assert!(!findings.iter().any(|f| f.starts_with("src/app.test.js")));
    }

    #[test]
    fn files_without_console_never_get_console_finding() {
        let report = analyze(&[file("src/quiet.ts", "export const consoleMessage = 'console'")]);
        assert!(
            !report
                .quality_issues
                .iter()
                .any(|issue| issue.rule == QualityRule::ConsoleStatements)
        );
    }

    #[test]
    fn readme_and_docs_are_never_checked() {
        let noisy = "console.log('x')\nfetch('https://example.com')";
        let report = analyze(&[
            file("README.md", noisy),
            file("docs/readme.txt", noisy),
            file("LICENSE", noisy),
            file("CHANGELOG", noisy),
        ]);
        assert!(report.quality_issues.is_empty());
    }

    #[test]
    fn fetch_without_try_catch_is_flagged() {
        let unguarded = analyze(&[file("api.ts", "const r = await fetch(url)")]);
        assert_eq!(unguarded.quality_issues[0].rule, QualityRule::UnguardedFetch);
        assert_eq!(
            unguarded.quality_issues[0].finding(),
            "api.ts: missing error handling for fetch calls"
        );

        let guarded = analyze(&[file(
            "api.ts",
            "try { await fetch(url) } catch (e) { throw e }",
        )]);
        assert!(
            !guarded
                .quality_issues
                .iter()
                .any(|issue| issue.rule == QualityRule::UnguardedFetch)
        );
    }

    #[test]
    fn long_and_uncommented_files_are_flagged() {
        let mut content = String::from("function big() {\n");
        content.push_str(&numbered_lines(55, "  step();"));
        let report = analyze(&[file("big.js", &content)]);
        let rules: Vec<QualityRule> = report.quality_issues.iter().map(|i| i.rule).collect();
        assert!(rules.contains(&QualityRule::LongFunctions));
        assert!(rules.contains(&QualityRule::MissingComments));

        let commented = format!("// entry point\n{content}");
        let report = analyze(&[file("big.js", &commented)]);
        assert!(
            !report
                .quality_issues
                .iter()
                .any(|issue| issue.rule == QualityRule::MissingComments)
        );
    }

    #[test]
    fn loose_types_only_in_typescript() {
        let content = "export function f(x: any) { return x as any }";
        let ts = analyze(&[file("f.ts", content)]);
        assert!(ts.quality_issues.iter().any(|i| i.rule == QualityRule::LooseTypes));
        let js = analyze(&[file("f.js", content)]);
        assert!(!js.quality_issues.iter().any(|i| i.rule == QualityRule::LooseTypes));
        let company = analyze(&[file("g.ts", "const company: Company = load()")]);
        assert!(!company.quality_issues.iter().any(|i| i.rule == QualityRule::LooseTypes));
    }

    #[test]
    fn unused_imports_are_listed() {
        let report = analyze(&[file(
            "view.ts",
            "import { a, b } from 'lib'\n\nexport const x = a()",
        )]);
        let issue = report
            .quality_issues
            .iter()
            .find(|issue| issue.rule == QualityRule::UnusedImports)
            .expect("unused import finding");
        assert_eq!(issue.description, "potentially unused imports: b");
    }

    #[test]
    fn hardcoded_urls_exempt_config_paths() {
        let content = "export const base = 'https://api.example.com'";
        let flagged = analyze(&[file("src/api.ts", content)]);
        assert!(flagged.quality_issues.iter().any(|i| i.rule == QualityRule::HardcodedUrls));
        let exempt = analyze(&[file("src/config/api.ts", content)]);
        assert!(!exempt.quality_issues.iter().any(|i| i.rule == QualityRule::HardcodedUrls));
    }

    #[test]
    fn components_need_error_boundaries() {
        let bare = analyze(&[file("App.tsx", "export default function App() { return null }")]);
        assert!(bare.quality_issues.iter().any(|i| i.rule == QualityRule::MissingErrorBoundary));

        let guarded = analyze(&[file(
            "App.tsx",
            "import { ErrorBoundary } from './ErrorBoundary'\nexport default function App() { return <ErrorBoundary /> }",
        )]);
        assert!(
            !guarded
                .quality_issues
                .iter()
                .any(|i| i.rule == QualityRule::MissingErrorBoundary)
        );
    }

    #[test]
    fn findings_follow_file_then_rule_order() {
        let report = analyze(&[
            file("b.ts", "console.log(1)\nconst r = await fetch('/x')"),
            file("a.ts", "console.log(2)"),
        ]);
        let findings = report.findings();
        assert_eq!(
            findings,
            vec![
                "b.ts: missing error handling for fetch calls".to_string(),
                "b.ts: contains 1 console statements".to_string(),
                "a.ts: contains 1 console statements".to_string(),
            ]
        );
    }

    #[test]
    fn detects_tests_by_path_or_marker() {
        assert!(analyze(&[file("src/util.spec.ts", "")]).has_tests);
        assert!(analyze(&[file("check.js", "describe('x', () => {})")]).has_tests);
        assert!(analyze(&[file("check.py", "import pytest")]).has_tests);
        assert!(!analyze(&[file("form.js", "form.submit(); process.exit(1)")]).has_tests);
    }

    #[test]
    fn missing_files_follow_checklist_order() {
        let report = analyze(&[file("index.ts", "export const x=1")]);
        assert_eq!(
            report.missing_files,
            vec!["package.json", ".gitignore", "tsconfig.json", "README.md"]
        );

        let report = analyze(&[
            file("app.py", "print('hi')"),
            file("pyproject.toml", "[project]"),
            file("Readme.rst", "hello"),
        ]);
        assert_eq!(report.missing_files, vec![".gitignore"]);
    }

    #[test]
    fn no_checklist_without_a_main_language() {
        let report = analyze(&[file("README.md", "# Title")]);
        assert!(report.main_language.is_none());
        assert!(report.missing_files.is_empty());
    }

    #[test]
    fn header_only_input_reports_c() {
        let report = analyze(&[file("include/util.h", "int add(int a, int b);")]);
        assert_eq!(report.main_language.as_deref(), Some("C"));
        assert_eq!(report.missing_files, vec!["README.md"]);
    }

    #[test]
    fn analysis_is_deterministic() {
        let files = vec![
            file("src/a.tsx", "import React from 'react'\nconsole.log(1)\nexport default () => null"),
            file("src/b.py", "import requests\nrequests.get('http://x')"),
            file("README.md", "# hi"),
        ];
        let first = serde_json::to_string(&analyze(&files)).expect("json");
        let second = serde_json::to_string(&analyze(&files)).expect("json");
        assert_eq!(first, second);
    }

    #[test]
    fn tolerates_binary_looking_content() {
        let content = "\u{0}\u{1}\u{fffd}\"unterminated 'string fetch( console.";
        let report = analyze(&[file("blob.js", content)]);
        assert_eq!(report.main_language.as_deref(), Some("JavaScript"));
    }
}
