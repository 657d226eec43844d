//! ES module import statements: parsing, usage checks, grouping, rendering.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

static IMPORT_STATEMENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*import\s+(?:[^;'"()]*?\s+from\s+)?['"][^'"\n]+['"][ \t]*;?"#)
        .expect("valid import statement regex")
});

static FROM_CLAUSE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)^\s*import\s+(type\s+)?(.*?)\s*from\s*(['"])([^'"]+)['"]\s*(;)?\s*$"#)
        .expect("valid from clause regex")
});

static SIDE_EFFECT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*import\s*(['"])([^'"]+)['"]\s*(;)?\s*$"#).expect("valid side effect regex")
});

const FRAMEWORK_MODULES: &[&str] = &[
    "react",
    "react-dom",
    "react-native",
    "next",
    "vue",
    "nuxt",
    "svelte",
    "@angular",
    "solid-js",
    "preact",
    "express",
];

/// One named binding inside `{ ... }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpecifier {
    /// Exported name in the source module.
    pub imported: String,
    /// Local binding name.
    pub local: String,
    /// Whether the specifier carries an inline `type` modifier.
    pub type_only: bool,
}

impl ImportSpecifier {
    fn render(&self) -> String {
        let prefix = if self.type_only { "type " } else { "" };
        if self.imported == self.local {
            format!("{prefix}{}", self.local)
        } else {
            format!("{prefix}{} as {}", self.imported, self.local)
        }
    }
}

/// Grouping bucket used when reordering imports.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ImportGroup {
    /// UI or server frameworks (`react`, `next/*`, `vue`, ...).
    Framework,
    /// Any other package import.
    ThirdParty,
    /// Relative or alias-rooted project imports.
    Local,
}

/// A parsed import statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    /// Original statement text.
    pub text: String,
    /// Module specifier.
    pub source: String,
    /// Default binding, if any.
    pub default: Option<String>,
    /// Namespace binding (`* as ns`), if any.
    pub namespace: Option<String>,
    /// Named bindings.
    pub named: Vec<ImportSpecifier>,
    /// Whether the statement had a `{ ... }` group.
    pub has_named_group: bool,
    /// `import type ...`
    pub type_only: bool,
    quote: char,
    semicolon: bool,
}

impl ImportStatement {
    /// Parse a complete import statement. Returns `None` for anything else.
    pub fn parse(text: &str) -> Option<Self> {
        if let Some(captures) = SIDE_EFFECT_REGEX.captures(text) {
            return Some(Self {
                text: text.trim().to_string(),
                source: captures[2].to_string(),
                default: None,
                namespace: None,
                named: Vec::new(),
                has_named_group: false,
                type_only: false,
                quote: captures[1].chars().next().unwrap_or('\''),
                semicolon: captures.get(3).is_some(),
            });
        }

        let captures = FROM_CLAUSE_REGEX.captures(text)?;
        let clause = captures[2].trim();
        let mut statement = Self {
            text: text.trim().to_string(),
            source: captures[4].to_string(),
            default: None,
            namespace: None,
            named: Vec::new(),
            has_named_group: false,
            type_only: captures.get(1).is_some(),
            quote: captures[3].chars().next().unwrap_or('\''),
            semicolon: captures.get(5).is_some(),
        };

        let outer = match (clause.find('{'), clause.rfind('}')) {
            (Some(start), Some(end)) if start < end => {
                statement.has_named_group = true;
                statement.named = parse_specifiers(&clause[start + 1..end]);
                format!("{}{}", &clause[..start], &clause[end + 1..])
            }
            _ => clause.to_string(),
        };

        for part in outer.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            if let Some(name) = part.strip_prefix('*') {
                let name = name.trim_start().strip_prefix("as").unwrap_or(name).trim();
                statement.namespace = Some(name.to_string());
            } else {
                statement.default = Some(part.to_string());
            }
        }

        Some(statement)
    }

    /// Grouping bucket for this statement's module.
    pub fn group(&self) -> ImportGroup {
        classify_source(&self.source)
    }

    /// Whether the statement only exists for its side effects.
    pub fn is_side_effect(&self) -> bool {
        self.default.is_none() && self.namespace.is_none() && !self.has_named_group
    }

    /// Keep only the named bindings accepted by `keep`. Returns `None` when
    /// nothing is left to import.
    pub fn retain_named(&self, mut keep: impl FnMut(&ImportSpecifier) -> bool) -> Option<Self> {
        let named: Vec<ImportSpecifier> = self.named.iter().filter(|spec| keep(spec)).cloned().collect();
        if named.len() == self.named.len() {
            return Some(self.clone());
        }
        if named.is_empty() && self.default.is_none() && self.namespace.is_none() {
            return None;
        }
        let mut updated = Self {
            has_named_group: !named.is_empty(),
            named,
            ..self.clone()
        };
        updated.text = updated.render();
        Some(updated)
    }

    /// Render the statement from its parts.
    pub fn render(&self) -> String {
        let quote = self.quote;
        let semicolon = if self.semicolon { ";" } else { "" };
        if self.is_side_effect() {
            return format!("import {quote}{}{quote}{semicolon}", self.source);
        }

        let mut clauses = Vec::new();
        if let Some(default) = &self.default {
            clauses.push(default.clone());
        }
        if let Some(namespace) = &self.namespace {
            clauses.push(format!("* as {namespace}"));
        }
        if self.has_named_group {
            let named: Vec<String> = self.named.iter().map(ImportSpecifier::render).collect();
            clauses.push(format!("{{ {} }}", named.join(", ")));
        }
        let type_prefix = if self.type_only { "type " } else { "" };
        format!(
            "import {type_prefix}{} from {quote}{}{quote}{semicolon}",
            clauses.join(", "),
            self.source
        )
    }
}

fn parse_specifiers(inner: &str) -> Vec<ImportSpecifier> {
    inner
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (type_only, part) = match part.strip_prefix("type ") {
                Some(rest) => (true, rest.trim()),
                None => (false, part),
            };
            match part.split_once(" as ") {
                Some((imported, local)) => ImportSpecifier {
                    imported: imported.trim().to_string(),
                    local: local.trim().to_string(),
                    type_only,
                },
                None => ImportSpecifier {
                    imported: part.to_string(),
                    local: part.to_string(),
                    type_only,
                },
            }
        })
        .collect()
}

/// Classify a module specifier into its grouping bucket.
pub fn classify_source(source: &str) -> ImportGroup {
    if source.starts_with('.')
        || source.starts_with('/')
        || source.starts_with("@/")
        || source.starts_with("~/")
    {
        return ImportGroup::Local;
    }
    let is_framework = FRAMEWORK_MODULES.iter().any(|module| {
        source == *module
            || source
                .strip_prefix(module)
                .is_some_and(|rest| rest.starts_with('/'))
    });
    if is_framework {
        ImportGroup::Framework
    } else {
        ImportGroup::ThirdParty
    }
}

/// Locate every import statement in `content` with its byte range.
pub fn find_imports(content: &str) -> Vec<(Range<usize>, ImportStatement)> {
    IMPORT_STATEMENT_REGEX
        .find_iter(content)
        .filter_map(|found| {
            ImportStatement::parse(found.as_str()).map(|statement| (found.range(), statement))
        })
        .collect()
}

/// Content with every import statement removed.
pub fn strip_imports(content: &str) -> String {
    let mut rest = String::with_capacity(content.len());
    let mut cursor = 0;
    for (range, _) in find_imports(content) {
        rest.push_str(&content[cursor..range.start]);
        cursor = range.end;
    }
    rest.push_str(&content[cursor..]);
    rest
}

/// Local names of named imports that never appear outside import statements,
/// in first-seen order.
pub fn unused_named_imports(content: &str) -> Vec<String> {
    let rest = strip_imports(content);
    let mut unused: Vec<String> = Vec::new();
    for (_, statement) in find_imports(content) {
        for spec in &statement.named {
            if !contains_identifier(&rest, &spec.local) && !unused.contains(&spec.local) {
                unused.push(spec.local.clone());
            }
        }
    }
    unused
}

/// Whether `name` occurs in `haystack` as a whole identifier.
pub fn contains_identifier(haystack: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    haystack.match_indices(name).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + name.len()..].chars().next();
        !before.is_some_and(is_identifier_char) && !after.is_some_and(is_identifier_char)
    })
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_and_named_bindings() {
        let statement =
            ImportStatement::parse("import React, { useState, useEffect as ue } from 'react';")
                .expect("parse");
        assert_eq!(statement.source, "react");
        assert_eq!(statement.default.as_deref(), Some("React"));
        assert_eq!(statement.named.len(), 2);
        assert_eq!(statement.named[1].imported, "useEffect");
        assert_eq!(statement.named[1].local, "ue");
        assert_eq!(statement.group(), ImportGroup::Framework);
    }

    #[test]
    fn parses_namespace_side_effect_and_multiline() {
        let namespace = ImportStatement::parse("import * as path from \"path\"").expect("ns");
        assert_eq!(namespace.namespace.as_deref(), Some("path"));
        assert!(!namespace.semicolon);

        let side_effect = ImportStatement::parse("import './styles.css';").expect("side");
        assert!(side_effect.is_side_effect());
        assert_eq!(side_effect.group(), ImportGroup::Local);

        let multiline =
            ImportStatement::parse("import {\n  a,\n  type B,\n} from '../lib';").expect("multi");
        assert_eq!(multiline.named.len(), 2);
        assert!(multiline.named[1].type_only);
    }

    #[test]
    fn retain_named_rewrites_or_drops_statement() {
        let statement = ImportStatement::parse("import { a, b } from 'lib';").expect("parse");
        let kept = statement
            .retain_named(|spec| spec.local == "a")
            .expect("statement kept");
        assert_eq!(kept.text, "import { a } from 'lib';");
        assert!(statement.retain_named(|_| false).is_none());

        let with_default = ImportStatement::parse("import X, { a } from 'lib'").expect("parse");
        let kept = with_default.retain_named(|_| false).expect("default kept");
        assert_eq!(kept.text, "import X from 'lib'");
    }

    #[test]
    fn classifies_sources() {
        assert_eq!(classify_source("next/router"), ImportGroup::Framework);
        assert_eq!(classify_source("nextjs-helper"), ImportGroup::ThirdParty);
        assert_eq!(classify_source("@angular/core"), ImportGroup::Framework);
        assert_eq!(classify_source("lodash"), ImportGroup::ThirdParty);
        assert_eq!(classify_source("@/lib/api"), ImportGroup::Local);
    }

    #[test]
    fn detects_unused_named_imports() {
        let content = "import { used, unused } from 'lib';\nimport { other as alias } from './x';\n\nused();\n";
        assert_eq!(unused_named_imports(content), vec!["unused", "alias"]);
    }

    #[test]
    fn identifier_matching_respects_boundaries() {
        assert!(contains_identifier("call(useState)", "useState"));
        assert!(!contains_identifier("useStateful()", "useState"));
        assert!(!contains_identifier("$useState", "useState"));
    }
}
