//! Prompt construction and response parsing for remote providers.

use serde_json::Value;

use crate::domain::{RepositoryContext, SourceFile, Suggestion};
use crate::error::{EvolveError, Result};

const RESPONSE_FORMAT: &str = r#"{
  "type": "feature|bugfix|refactor|optimization",
  "title": "Brief title of the improvement",
  "description": "Detailed description of what this improvement does",
  "reasoning": "Why this improvement is beneficial for THIS specific codebase",
  "files": [
    {
      "path": "path/to/actual/file/from/analysis",
      "action": "create|modify|delete",
      "content": "complete file content after changes"
    }
  ]
}"#;

/// Fields a provider response must fill in.
const REQUIRED_FIELDS: &[&str] = &["type", "title", "description", "files"];

/// Short repository summary embedded in prompts.
pub fn repository_summary(context: &RepositoryContext) -> String {
    let description = context
        .description
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or("No description");
    let language = context
        .language
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or("Unknown");
    format!(
        "Repository: {}\nDescription: {description}\nLanguage: {language}",
        context.full_name
    )
}

/// Build the prompt asking a model for exactly one improvement.
pub fn build_prompt(context: &RepositoryContext, files: &[SourceFile]) -> String {
    let file_contents = files
        .iter()
        .map(|file| format!("\n--- {} ---\n{}", file.path, file.content))
        .collect::<Vec<_>>()
        .join("\n");

    [
        "You are a code evolution assistant. Analyze this codebase and suggest ONE meaningful improvement.".to_string(),
        String::new(),
        "Repository Context:".to_string(),
        repository_summary(context),
        String::new(),
        "Current Files:".to_string(),
        file_contents,
        String::new(),
        "Base the suggestion on the files above. Improve an existing file or create a file this codebase actually needs.".to_string(),
        String::new(),
        "Suggest ONE of the following kinds of improvement:".to_string(),
        "1. NEW FEATURE: a useful feature building on the existing code".to_string(),
        "2. BUG FIX: a potential bug or issue in the provided files".to_string(),
        "3. REFACTOR: better structure or readability of existing files".to_string(),
        "4. OPTIMIZATION: better performance or efficiency of existing code".to_string(),
        String::new(),
        "Respond in this EXACT JSON format:".to_string(),
        RESPONSE_FORMAT.to_string(),
        String::new(),
        "Rules:".to_string(),
        "- Provide complete file content, not diffs".to_string(),
        "- Keep the change focused and atomic".to_string(),
        "- Make sure all code is syntactically correct".to_string(),
    ]
    .join("\n")
}

/// Extract and validate a suggestion from a free-form model response.
///
/// The outermost `{ ... }` span is decoded; surrounding prose and code fences
/// are ignored.
pub fn parse_suggestion(response: &str) -> Result<Suggestion> {
    let (Some(start), Some(end)) = (response.find('{'), response.rfind('}')) else {
        return Err(EvolveError::Provider("no JSON found in response".to_string()));
    };
    if end < start {
        return Err(EvolveError::Provider("no JSON found in response".to_string()));
    }

    let value: Value = serde_json::from_str(&response[start..=end])
        .map_err(|err| EvolveError::Provider(format!("invalid JSON in response: {err}")))?;
    for field in REQUIRED_FIELDS {
        if !is_filled(value.get(*field)) {
            return Err(EvolveError::Provider(format!(
                "invalid suggestion format: missing `{field}`"
            )));
        }
    }

    let suggestion: Suggestion = serde_json::from_value(value)
        .map_err(|err| EvolveError::Provider(format!("invalid suggestion format: {err}")))?;
    if suggestion.files.is_empty() {
        return Err(EvolveError::Provider(
            "invalid suggestion format: no file operations".to_string(),
        ));
    }
    Ok(suggestion)
}

fn is_filled(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.trim().is_empty(),
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FileAction, SuggestionKind};

    #[test]
    fn prompt_embeds_context_and_files() {
        let context = RepositoryContext {
            full_name: "octo/app".to_string(),
            description: None,
            language: Some("TypeScript".to_string()),
        };
        let prompt = build_prompt(&context, &[SourceFile::new("src/a.ts", "const a = 1")]);

        assert!(prompt.contains("Repository: octo/app\nDescription: No description\nLanguage: TypeScript"));
        assert!(prompt.contains("\n--- src/a.ts ---\nconst a = 1"));
        assert!(prompt.contains("\"type\": \"feature|bugfix|refactor|optimization\""));
    }

    #[test]
    fn parses_suggestion_wrapped_in_prose() {
        let response = "Sure! Here you go:\n```json\n{\"type\":\"refactor\",\"title\":\"Tidy\",\"description\":\"d\",\"reasoning\":\"r\",\"files\":[{\"path\":\"a.ts\",\"action\":\"modify\",\"content\":\"x\"}]}\n```\nEnjoy.";
        let suggestion = parse_suggestion(response).expect("suggestion");
        assert_eq!(suggestion.kind, SuggestionKind::Refactor);
        assert_eq!(suggestion.files[0].action, FileAction::Modify);
    }

    #[test]
    fn reasoning_is_optional() {
        let response = r#"{"type":"feature","title":"t","description":"d","files":[{"path":"b.ts","action":"create","content":""}]}"#;
        let suggestion = parse_suggestion(response).expect("suggestion");
        assert!(suggestion.reasoning.is_empty());
    }

    #[test]
    fn rejects_missing_json_and_fields() {
        let error = parse_suggestion("no braces here").unwrap_err();
        assert_eq!(error.to_string(), "provider error: no JSON found in response");

        let error = parse_suggestion(r#"{"type":"feature","title":"","description":"d","files":[]}"#)
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "provider error: invalid suggestion format: missing `title`"
        );

        let error = parse_suggestion(r#"{"type":"feature","title":"t","description":"d","files":[]}"#)
            .unwrap_err();
        assert!(error.to_string().contains("no file operations"));
    }

    #[test]
    fn rejects_unknown_kinds() {
        let response = r#"{"type":"rewrite","title":"t","description":"d","files":[{"path":"a","action":"modify","content":""}]}"#;
        assert!(matches!(
            parse_suggestion(response),
            Err(EvolveError::Provider(_))
        ));
    }
}
