//! The suggestion pipeline: analyze, select, transform, package.

use log::{debug, warn};
use serde::Serialize;
use utoipa::ToSchema;

use crate::analyzer::analyze;
use crate::domain::{AnalysisReport, RepositoryContext, SourceFile, Suggestion};
use crate::error::{EvolveError, Result};
use crate::packager::{package, Rationale};
use crate::prompt::{build_prompt, parse_suggestion};
use crate::provider::{ProviderConfig, ProviderKind, TextGenerator};
use crate::selector::{select, select_skipping, Selection};
use crate::templates::{generate, generate_test};
use crate::transformer::TransformPlan;

/// Content placed in a file whose fetch failed.
pub const FAILED_CONTENT_PLACEHOLDER: &str = "// Failed to load content";

/// Result of one suggestion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionOutcome {
    /// The proposed change.
    pub suggestion: Suggestion,
    /// Facts computed from the input files.
    pub analysis: AnalysisReport,
    /// Provider that produced the suggestion.
    pub source: ProviderKind,
}

/// Stateless suggestion engine. Safe to share between threads.
pub struct SuggestionEngine {
    provider: ProviderConfig,
    generator: Option<Box<dyn TextGenerator>>,
}

impl SuggestionEngine {
    /// Engine using only the local heuristics.
    pub fn heuristic() -> Self {
        Self {
            provider: ProviderConfig::heuristic(),
            generator: None,
        }
    }

    /// Engine that consults `generator` first when `provider` is remote.
    pub fn with_generator(provider: ProviderConfig, generator: Box<dyn TextGenerator>) -> Self {
        Self {
            provider,
            generator: Some(generator),
        }
    }

    /// Provider configuration in use.
    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    /// Produce one suggestion for `files`.
    ///
    /// A remote provider failure is logged and answered by the heuristics.
    pub fn suggest(&self, files: &[SourceFile], context: &RepositoryContext) -> Result<SuggestionOutcome> {
        let analysis = analyze(files);
        let selection = select(&analysis, files);

        if selection != Selection::NoCodeFiles {
            if let Some(generator) = self.remote_generator() {
                match self.remote_suggestion(generator, files, context) {
                    Ok(suggestion) => {
                        return Ok(SuggestionOutcome {
                            suggestion,
                            analysis,
                            source: self.provider.kind,
                        });
                    }
                    Err(err) => {
                        warn!(
                            "{} provider failed, using heuristics instead: {err}",
                            self.provider.kind
                        );
                    }
                }
            }
        }

        let suggestion = build_suggestion(&selection, &analysis, files, context)?;
        Ok(SuggestionOutcome {
            suggestion,
            analysis,
            source: ProviderKind::Heuristic,
        })
    }

    fn remote_generator(&self) -> Option<&dyn TextGenerator> {
        if self.provider.is_remote() {
            self.generator.as_deref()
        } else {
            None
        }
    }

    fn remote_suggestion(
        &self,
        generator: &dyn TextGenerator,
        files: &[SourceFile],
        context: &RepositoryContext,
    ) -> Result<Suggestion> {
        let prompt = build_prompt(context, files);
        debug!(
            "requesting suggestion from {} ({} prompt bytes)",
            self.provider.kind,
            prompt.len()
        );
        let response = generator.generate(&prompt)?;
        parse_suggestion(&response)
    }
}

impl Default for SuggestionEngine {
    fn default() -> Self {
        Self::heuristic()
    }
}

/// Run the local pipeline once: analyze, select, transform, package.
pub fn heuristic_suggestion(files: &[SourceFile], context: &RepositoryContext) -> Result<Suggestion> {
    let analysis = analyze(files);
    let selection = select(&analysis, files);
    build_suggestion(&selection, &analysis, files, context)
}

fn build_suggestion(
    selection: &Selection,
    analysis: &AnalysisReport,
    files: &[SourceFile],
    context: &RepositoryContext,
) -> Result<Suggestion> {
    let mut selection = selection.clone();
    let mut skipped: Vec<String> = Vec::new();
    let (content, applied) = loop {
        debug!("selected {:?} ({})", selection.target_path(), selection.category().as_str());
        match &selection {
            Selection::FixIssues { path, issues } => {
                let file = find_file(files, path)?;
                let mut transformed = TransformPlan::for_issues(issues).apply(file);
                if !transformed.is_substantive() {
                    debug!("no rewrite addresses the findings in {path}, tidying it instead");
                    transformed = TransformPlan::refactor().apply(file);
                }
                if transformed.is_substantive() {
                    debug!("applied rewrites {:?}", transformed.applied);
                    break (transformed.content, Some(transformed.applied));
                }
                debug!("{path} would be left unchanged, trying the next candidate");
                skipped.push(path.clone());
            }
            Selection::CreateMissing { filename } => {
                break (generate(filename, analysis, context)?, None);
            }
            Selection::AddTests { path } => break (generate_test(find_file(files, path)?), None),
            Selection::Refactor { path } => {
                let transformed = TransformPlan::refactor().apply(find_file(files, path)?);
                debug!("applied rewrites {:?}", transformed.applied);
                break (transformed.content, Some(transformed.applied));
            }
            Selection::NoCodeFiles => break (String::new(), None),
        }
        selection = select_skipping(analysis, files, &skipped);
    };

    let rationale = Rationale::describe(&selection, analysis, applied.as_deref());
    Ok(package(&selection, content, rationale))
}

fn find_file<'a>(files: &'a [SourceFile], path: &str) -> Result<&'a SourceFile> {
    files
        .iter()
        .find(|file| file.path == path)
        .ok_or_else(|| EvolveError::Other(format!("selected file {path} is not in the input")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FileAction, SuggestionKind};
    use crate::provider::MockTextGenerator;

    const REMOTE_RESPONSE: &str = r#"Here is my idea:
{"type":"optimization","title":"Memoize","description":"Cache results","reasoning":"Faster","files":[{"path":"a.ts","action":"modify","content":"const y = 1"}]}"#;

    fn file(path: &str, content: &str) -> SourceFile {
        SourceFile::new(path, content)
    }

    fn gemini() -> ProviderConfig {
        ProviderConfig::from_lookup(|name| (name == "GEMINI_API_KEY").then(|| "key".to_string()))
    }

    fn context() -> RepositoryContext {
        RepositoryContext {
            full_name: "octo/app".to_string(),
            ..RepositoryContext::default()
        }
    }

    #[test]
    fn console_statement_is_removed_in_a_bugfix() {
        let suggestion =
            heuristic_suggestion(&[file("a.ts", "console.log('x')\nconst y=1")], &context())
                .expect("suggestion");

        assert_eq!(suggestion.kind, SuggestionKind::Bugfix);
        assert_eq!(suggestion.files.len(), 1);
        assert_eq!(suggestion.files[0].path, "a.ts");
        assert_eq!(suggestion.files[0].action, FileAction::Modify);
        assert!(!suggestion.files[0].content.contains("console.log"));
    }

    #[test]
    fn clean_typescript_gets_a_package_manifest() {
        let suggestion = heuristic_suggestion(&[file("index.ts", "export const x=1")], &context())
            .expect("suggestion");

        assert_eq!(suggestion.kind, SuggestionKind::Feature);
        assert_eq!(suggestion.files[0].path, "package.json");
        assert_eq!(suggestion.files[0].action, FileAction::Create);
        let manifest: serde_json::Value =
            serde_json::from_str(&suggestion.files[0].content).expect("valid manifest");
        assert_eq!(manifest["name"], "app");
    }

    #[test]
    fn readme_only_input_yields_no_files() {
        let suggestion =
            heuristic_suggestion(&[file("README.md", "# Hello")], &context()).expect("suggestion");

        assert!(suggestion.files.is_empty());
        assert!(suggestion.description.contains("nothing to analyze"));
    }

    #[test]
    fn flagged_file_is_the_one_modified() {
        let suggestion = heuristic_suggestion(
            &[
                file("a.ts", "console.log('x')\nconst y=1"),
                file("b.ts", "export const b = 2"),
            ],
            &context(),
        )
        .expect("suggestion");

        assert_eq!(suggestion.files[0].path, "a.ts");
    }

    #[test]
    fn review_only_findings_still_change_the_file() {
        let component = "export default function App() {\n  return <div>Hello</div>\n}\n";
        let suggestion =
            heuristic_suggestion(&[file("src/App.tsx", component)], &context()).expect("suggestion");

        assert_eq!(suggestion.kind, SuggestionKind::Bugfix);
        assert_eq!(suggestion.files[0].path, "src/App.tsx");
        assert_ne!(suggestion.files[0].content, component);
        assert!(suggestion.files[0].content.starts_with("// App.tsx: exports App\n"));
        assert!(suggestion.description.contains("added a header comment"));
        assert!(suggestion.description.contains("Left for manual review"));
    }

    #[test]
    fn unchangeable_flagged_file_falls_through_to_next_candidate() {
        let component = "// App shell\nexport default function App() {\n  return <div>Hello</div>\n}\n";
        let suggestion =
            heuristic_suggestion(&[file("src/App.tsx", component)], &context()).expect("suggestion");

        assert_eq!(suggestion.kind, SuggestionKind::Feature);
        assert_eq!(suggestion.files[0].path, "package.json");
        assert_eq!(suggestion.files[0].action, FileAction::Create);
    }

    #[test]
    fn returned_fetch_chain_is_guarded() {
        let source = "export function load(url) {\n  return fetch(url).then((r) => r.json())\n}\n";
        let suggestion =
            heuristic_suggestion(&[file("src/api.js", source)], &context()).expect("suggestion");

        assert_eq!(suggestion.files[0].path, "src/api.js");
        assert!(suggestion.files[0].content.contains(".catch((error) => {"));
        assert!(suggestion.description.contains("added error handling to fetch calls"));
    }

    #[test]
    fn untested_code_gets_a_test_file() {
        let files = [
            file("src/math.js", "export function add(a, b) { return a + b }"),
            file("package.json", "{}"),
            file(".gitignore", "node_modules"),
            file("README.md", "# math"),
        ];
        let suggestion = heuristic_suggestion(&files, &context()).expect("suggestion");

        assert_eq!(suggestion.title, "Add tests for src/math.js");
        assert_eq!(suggestion.files[0].path, "src/math.test.js");
        assert!(suggestion.files[0].content.contains("subject.add"));
    }

    #[test]
    fn placeholder_content_does_not_abort() {
        let files = [
            file("src/a.ts", FAILED_CONTENT_PLACEHOLDER),
            file("src/b.ts", "console.debug('b')"),
        ];
        let suggestion = heuristic_suggestion(&files, &context()).expect("suggestion");
        assert_eq!(suggestion.files[0].path, "src/b.ts");
    }

    #[test]
    fn heuristic_engine_never_calls_generator() {
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().never();
        let engine = SuggestionEngine::with_generator(ProviderConfig::heuristic(), Box::new(generator));

        let outcome = engine
            .suggest(&[file("a.ts", "console.log('x')")], &context())
            .expect("outcome");
        assert_eq!(outcome.source, ProviderKind::Heuristic);
    }

    #[test]
    fn remote_suggestion_is_used_when_valid() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .withf(|prompt| prompt.contains("--- a.ts ---"))
            .returning(|_| Ok(REMOTE_RESPONSE.to_string()));
        let engine = SuggestionEngine::with_generator(gemini(), Box::new(generator));

        let outcome = engine
            .suggest(&[file("a.ts", "const y = compute()")], &context())
            .expect("outcome");
        assert_eq!(outcome.source, ProviderKind::Gemini);
        assert_eq!(outcome.suggestion.kind, SuggestionKind::Optimization);
        assert_eq!(outcome.suggestion.title, "Memoize");
    }

    #[test]
    fn remote_failure_falls_back_to_heuristics() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|_| Err(EvolveError::Provider("status 500".to_string())));
        let engine = SuggestionEngine::with_generator(gemini(), Box::new(generator));

        let outcome = engine
            .suggest(&[file("a.ts", "console.log('x')\nconst y=1")], &context())
            .expect("outcome");
        assert_eq!(outcome.source, ProviderKind::Heuristic);
        assert_eq!(outcome.suggestion.kind, SuggestionKind::Bugfix);
    }

    #[test]
    fn unparseable_remote_answer_falls_back() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .returning(|_| Ok("I cannot help with that.".to_string()));
        let engine = SuggestionEngine::with_generator(gemini(), Box::new(generator));

        let outcome = engine
            .suggest(&[file("index.ts", "export const x=1")], &context())
            .expect("outcome");
        assert_eq!(outcome.source, ProviderKind::Heuristic);
        assert_eq!(outcome.suggestion.files[0].path, "package.json");
    }

    #[test]
    fn sentinel_skips_remote_provider() {
        let mut generator = MockTextGenerator::new();
        generator.expect_generate().never();
        let engine = SuggestionEngine::with_generator(gemini(), Box::new(generator));

        let outcome = engine
            .suggest(&[file("README.md", "# x")], &context())
            .expect("outcome");
        assert!(outcome.suggestion.is_empty());
    }
}
