//! Rewrites an existing file to address its findings.
//!
//! Each rewrite is a small text pass that is safe to run twice: running a plan
//! over its own output changes nothing.

use std::sync::LazyLock;

use regex::Regex;

use crate::analyzer::has_comment_marker;
use crate::domain::{QualityIssue, QualityRule, SourceFile};
use crate::imports::{find_imports, unused_named_imports, ImportGroup, ImportStatement};
use crate::language::{extension, file_name, is_typescript};

/// How many lines a single statement may span before we give up on it.
const STATEMENT_WINDOW: usize = 20;

const RETHROW: &str =
    "throw new Error(`Request failed: ${error instanceof Error ? error.message : String(error)}`);";

static CONSOLE_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*console\s*\.\s*[A-Za-z_$][\w$]*\s*\(").expect("valid console line regex")
});

static AWAIT_FETCH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bawait\s+fetch\s*\(").expect("valid await fetch regex"));

static FETCH_CALL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bfetch\s*\(").expect("valid fetch call regex"));

static CATCH_CHAIN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\s*catch\s*\(").expect("valid catch chain regex"));

static STATEMENT_START_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*(?:export\s+)?(?:(?:const|let|var)\s|return\b|await\b|fetch\s*\()")
        .expect("valid statement start regex")
});

static FETCH_DECLARATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)^([ \t]*)(export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::\s*([^=]+?))?\s*=\s*(.*)$",
    )
    .expect("valid fetch declaration regex")
});

static AWAITED_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*(?:return\s+)?await\b").expect("valid awaited statement regex")
});

static FETCH_HEAD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*(?:return\s+)?fetch\s*\(").expect("valid fetch head regex")
});

static ANNOTATION_ANY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(:\s*)any\b").expect("valid annotation regex"));

static CAST_ANY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bas(\s+)any\b").expect("valid cast regex"));

static GENERIC_ANY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([<,]\s*)any(\s*[,>])").expect("valid generic argument regex")
});

static ARRAY_ANY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bany\[\]").expect("valid array regex"));

static SCRIPT_EXPORT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^export\s+(?:default\s+)?(?:async\s+)?(?:function\*?|class|const|let|var|interface|type|enum)\s+([A-Za-z_$][\w$]*)",
    )
    .expect("valid export regex")
});

static PYTHON_EXPORT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(?:async\s+)?(?:def|class)\s+([A-Za-z][\w]*)").expect("valid python export regex")
});

/// One text pass the transformer knows how to run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rewrite {
    /// Drop whole-line `console.*(...)` statements.
    StripConsole,
    /// Add error handling around `fetch(...)` statements.
    GuardFetch,
    /// Replace `any` with `unknown` in TypeScript.
    TightenTypes,
    /// Regroup the leading import block.
    OrganizeImports,
    /// Remove named imports that are never used.
    DropUnusedImports,
    /// Prepend a header comment listing exports.
    HeaderComment,
    /// Strip trailing whitespace and collapse blank runs.
    NormalizeWhitespace,
}

impl Rewrite {
    /// Rewrites that address a quality rule. Rules without a rewrite stay
    /// review notes in the suggestion text.
    fn for_rule(rule: QualityRule) -> &'static [Rewrite] {
        match rule {
            QualityRule::ConsoleStatements => &[Rewrite::StripConsole],
            QualityRule::UnguardedFetch => &[Rewrite::GuardFetch],
            QualityRule::LooseTypes => &[Rewrite::TightenTypes],
            QualityRule::UnusedImports => &[Rewrite::OrganizeImports, Rewrite::DropUnusedImports],
            QualityRule::MissingComments => &[Rewrite::HeaderComment],
            QualityRule::LongFunctions
            | QualityRule::HardcodedUrls
            | QualityRule::MissingErrorBoundary => &[],
        }
    }

    /// Short description used in suggestion text.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::StripConsole => "removed console statements",
            Self::GuardFetch => "added error handling to fetch calls",
            Self::TightenTypes => "replaced `any` with `unknown`",
            Self::OrganizeImports => "grouped imports by origin",
            Self::DropUnusedImports => "removed unused imports",
            Self::HeaderComment => "added a header comment",
            Self::NormalizeWhitespace => "normalized whitespace",
        }
    }

    /// Run this rewrite over `content`.
    pub fn apply(&self, path: &str, content: &str) -> String {
        match self {
            Self::StripConsole => strip_console_statements(content),
            Self::GuardFetch => guard_fetch_calls(content, is_typescript(path)),
            Self::TightenTypes if is_typescript(path) => tighten_any_types(content),
            Self::OrganizeImports if is_script(path) => organize_imports(content),
            Self::DropUnusedImports if is_script(path) => drop_unused_imports(content),
            Self::HeaderComment => add_header_comment(path, content),
            Self::NormalizeWhitespace => normalize_whitespace(content),
            _ => content.to_string(),
        }
    }
}

/// Ordered set of rewrites for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformPlan {
    rewrites: Vec<Rewrite>,
}

impl TransformPlan {
    /// Plan addressing the given findings. Whitespace normalization always
    /// runs last.
    pub fn for_issues(issues: &[QualityIssue]) -> Self {
        let mut rewrites: Vec<Rewrite> = issues
            .iter()
            .flat_map(|issue| Rewrite::for_rule(issue.rule).iter().copied())
            .collect();
        rewrites.push(Rewrite::NormalizeWhitespace);
        rewrites.sort();
        rewrites.dedup();
        Self { rewrites }
    }

    /// Plan for a tidy-up pass on a file with no findings.
    pub fn refactor() -> Self {
        Self {
            rewrites: vec![
                Rewrite::OrganizeImports,
                Rewrite::HeaderComment,
                Rewrite::NormalizeWhitespace,
            ],
        }
    }

    /// Rewrites in execution order.
    pub fn rewrites(&self) -> &[Rewrite] {
        &self.rewrites
    }

    /// Run every rewrite over the file content, recording which ones changed
    /// it.
    pub fn apply(&self, file: &SourceFile) -> Transformed {
        let mut content = file.content.clone();
        let mut applied = Vec::new();
        for rewrite in &self.rewrites {
            let next = rewrite.apply(&file.path, &content);
            if next != content {
                applied.push(*rewrite);
                content = next;
            }
        }
        Transformed { content, applied }
    }
}

/// Output of one [`TransformPlan`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    /// Rewritten file content.
    pub content: String,
    /// Rewrites that changed the content, in execution order.
    pub applied: Vec<Rewrite>,
}

impl Transformed {
    /// Whether anything beyond whitespace changed.
    pub fn is_substantive(&self) -> bool {
        self.applied
            .iter()
            .any(|rewrite| *rewrite != Rewrite::NormalizeWhitespace)
    }
}

/// Rewrite `file` to address `issues`.
pub fn transform(file: &SourceFile, issues: &[QualityIssue]) -> String {
    TransformPlan::for_issues(issues).apply(file).content
}

/// Tidy up `file` without any specific finding.
pub fn refactor(file: &SourceFile) -> String {
    TransformPlan::refactor().apply(file).content
}

fn is_script(path: &str) -> bool {
    matches!(
        extension(path).as_str(),
        "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx"
    )
}

/// Parenthesis depth tracker that skips string literals and line comments.
#[derive(Debug, Default)]
struct ParenScanner {
    depth: isize,
    quote: Option<char>,
    escaped: bool,
}

impl ParenScanner {
    /// Scan `text` and return the offset just past the first `)` that brings
    /// the depth back to zero.
    fn scan_until_closed(&mut self, text: &str) -> Option<usize> {
        let mut chars = text.char_indices().peekable();
        while let Some((offset, ch)) = chars.next() {
            if let Some(open) = self.quote {
                if self.escaped {
                    self.escaped = false;
                } else if ch == '\\' {
                    self.escaped = true;
                } else if ch == open || (ch == '\n' && open != '`') {
                    self.quote = None;
                }
                continue;
            }
            match ch {
                '\'' | '"' | '`' => self.quote = Some(ch),
                '/' if chars.peek().is_some_and(|&(_, next)| next == '/') => {
                    while chars.next_if(|&(_, next)| next != '\n').is_some() {}
                }
                '(' => self.depth += 1,
                ')' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        return Some(offset + 1);
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn end_line(&mut self) {
        if matches!(self.quote, Some('\'' | '"')) {
            self.quote = None;
        }
        self.escaped = false;
    }
}

/// Line and offset just past the `)` matching the `(` at `column`.
fn closing_paren(lines: &[&str], line: usize, column: usize) -> Option<(usize, usize)> {
    let mut scanner = ParenScanner::default();
    let end = (line + STATEMENT_WINDOW).min(lines.len());
    for (index, text) in lines.iter().enumerate().take(end).skip(line) {
        let offset = if index == line { column } else { 0 };
        if let Some(close) = scanner.scan_until_closed(&text[offset..]) {
            return Some((index, offset + close));
        }
        scanner.end_line();
    }
    None
}

/// Last line of the statement starting at `start`, following chained calls,
/// with the offset just past its last top-level `)` when that line has one.
fn statement_end(lines: &[&str], start: usize) -> Option<(usize, Option<usize>)> {
    let mut scanner = ParenScanner::default();
    let end = (start + STATEMENT_WINDOW).min(lines.len());
    for index in start..end {
        let line = lines[index];
        let mut consumed = 0;
        let mut last_close = None;
        while let Some(close) = scanner.scan_until_closed(&line[consumed..]) {
            consumed += close;
            last_close = Some(consumed);
        }
        scanner.end_line();
        if scanner.depth < 0 {
            return None;
        }
        if scanner.depth == 0 && scanner.quote.is_none() {
            let chained = lines.get(index + 1).is_some_and(|next| {
                let next = next.trim_start();
                next.starts_with('.') || next.starts_with("?.")
            });
            if !chained {
                return Some((index, last_close));
            }
        }
    }
    None
}

/// Whether what follows a call closes the statement.
fn is_statement_tail(rest: &str) -> bool {
    let rest = rest.trim();
    let rest = rest.strip_prefix(';').unwrap_or(rest).trim_start();
    rest.is_empty() || rest.starts_with("//")
}

/// Whether `previous` introduces a body without braces, so removing the next
/// statement would change what it controls.
fn is_braceless_body(previous: Option<&str>) -> bool {
    let Some(previous) = previous.map(str::trim) else {
        return false;
    };
    if previous.ends_with("=>") || ends_with_word(previous, "else") || ends_with_word(previous, "do") {
        return true;
    }
    let mut head = previous.trim_start_matches('}').trim_start();
    if let Some(rest) = head.strip_prefix("else") {
        if rest.starts_with(char::is_whitespace) {
            head = rest.trim_start();
        }
    }
    let control = ["if", "for", "while", "do"].iter().any(|keyword| {
        head.strip_prefix(keyword).is_some_and(|rest| {
            rest.starts_with(' ') || rest.starts_with('(')
        })
    });
    control && !head.ends_with(['{', ';', '}'])
}

fn ends_with_word(text: &str, word: &str) -> bool {
    text.strip_suffix(word).is_some_and(|before| {
        !before.ends_with(|ch: char| ch.is_alphanumeric() || ch == '_' || ch == '$')
    })
}

fn last_code_line<S: AsRef<str>>(lines: &[S]) -> Option<&str> {
    lines
        .iter()
        .rev()
        .map(|line| line.as_ref())
        .find(|line| !line.trim().is_empty())
}

/// Remove `console.*(...)` statements that occupy whole lines.
pub fn strip_console_statements(content: &str) -> String {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut index = 0;
    while index < lines.len() {
        let line = lines[index];
        if let Some(found) = CONSOLE_LINE_REGEX.find(line) {
            if !is_braceless_body(last_code_line(&kept)) {
                if let Some((last, close)) = closing_paren(&lines, index, found.end() - 1) {
                    if is_statement_tail(&lines[last][close..]) {
                        index = last + 1;
                        continue;
                    }
                }
            }
        }
        kept.push(line);
        index += 1;
    }
    kept.join("\n")
}

/// Add error handling to unguarded `fetch(...)` statements. Awaited calls are
/// wrapped in try/catch that rethrows a descriptive error, with declarations
/// split so the binding stays in scope. Promise chains get a rethrowing
/// `.catch(...)` instead.
pub fn guard_fetch_calls(content: &str, typescript: bool) -> String {
    let lines: Vec<&str> = content.split('\n').collect();
    let mut output: Vec<String> = Vec::with_capacity(lines.len());
    let mut index = 0;
    while index < lines.len() {
        let line = lines[index];
        let already_guarded = last_code_line(&output).is_some_and(|previous| previous.trim() == "try {");
        if STATEMENT_START_REGEX.is_match(line) && !already_guarded {
            if let Some((last, close)) = statement_end(&lines, index) {
                let statement = &lines[index..=last];
                if let Some(guarded) = guard_statement(statement, close, lines.get(last + 1..), typescript) {
                    output.extend(guarded);
                    index = last + 1;
                    continue;
                }
            }
        }
        output.push(line.to_string());
        index += 1;
    }
    output.join("\n")
}

fn guard_statement(
    lines: &[&str],
    close: Option<usize>,
    following: Option<&[&str]>,
    typescript: bool,
) -> Option<Vec<String>> {
    let statement = lines.join("\n");
    if !FETCH_CALL_REGEX.is_match(&statement) || CATCH_CHAIN_REGEX.is_match(&statement) {
        return None;
    }

    if let Some(captures) = FETCH_DECLARATION_REGEX.captures(&statement) {
        let rhs = &captures[5];
        if FETCH_HEAD_REGEX.is_match(rhs) {
            return chain_catch(lines, close);
        }
        if !AWAITED_REGEX.is_match(rhs) || !is_standalone(&statement, following) {
            return None;
        }
        let indent = &captures[1];
        let export = if captures.get(2).is_some() { "export " } else { "" };
        let name = &captures[3];
        let annotation = match captures.get(4) {
            Some(annotation) => format!(": {}", annotation.as_str().trim()),
            None if typescript && is_plain_fetch(rhs) => ": Response".to_string(),
            None => String::new(),
        };
        let mut guarded = vec![
            format!("{indent}{export}let {name}{annotation};"),
            format!("{indent}try {{"),
        ];
        for (position, part) in rhs.split('\n').enumerate() {
            if position == 0 {
                guarded.push(format!("{indent}  {name} = {part}"));
            } else {
                guarded.push(format!("  {part}"));
            }
        }
        guarded.extend(catch_block(indent));
        return Some(guarded);
    }

    if FETCH_HEAD_REGEX.is_match(&statement) {
        return chain_catch(lines, close);
    }

    if AWAITED_REGEX.is_match(&statement) && is_standalone(&statement, following) {
        let indent = leading_indent(&statement);
        let mut guarded = vec![format!("{indent}try {{")];
        guarded.extend(lines.iter().map(|part| format!("  {part}")));
        guarded.extend(catch_block(&indent));
        return Some(guarded);
    }

    None
}

/// Append a rethrowing `.catch(...)` after the statement's last call.
fn chain_catch(lines: &[&str], close: Option<usize>) -> Option<Vec<String>> {
    let (last, head) = lines.split_last()?;
    let (code, tail) = last.split_at(close?);
    if !is_statement_tail(tail) {
        return None;
    }
    let indent = leading_indent(lines.first()?);
    let mut guarded: Vec<String> = head.iter().map(|line| line.to_string()).collect();
    guarded.push(format!("{code}.catch((error) => {{"));
    guarded.push(format!("{indent}  {RETHROW}"));
    guarded.push(format!("{indent}}}){tail}"));
    Some(guarded)
}

/// Whether the statement stands on its own rather than sitting inside an
/// array literal or argument list, where a try block cannot go.
fn is_standalone(statement: &str, following: Option<&[&str]>) -> bool {
    if statement.trim_end().ends_with(',') {
        return false;
    }
    let next = following.and_then(first_code_line);
    !next.is_some_and(|next| next.trim_start().starts_with([']', ')']))
}

fn first_code_line<'a>(lines: &[&'a str]) -> Option<&'a str> {
    lines.iter().copied().find(|line| !line.trim().is_empty())
}

fn leading_indent(text: &str) -> String {
    text.chars()
        .take_while(|ch| *ch == ' ' || *ch == '\t')
        .collect()
}

/// Whether `rhs` is exactly `await fetch(...)`, optionally with a semicolon.
fn is_plain_fetch(rhs: &str) -> bool {
    let rhs = rhs.trim_end();
    let rhs = rhs.strip_suffix(';').unwrap_or(rhs);
    let Some(found) = AWAIT_FETCH_REGEX.find(rhs) else {
        return false;
    };
    if found.start() != 0 {
        return false;
    }
    let mut scanner = ParenScanner::default();
    scanner.scan_until_closed(&rhs[found.end() - 1..]) == Some(rhs.len() - found.end() + 1)
}

fn catch_block(indent: &str) -> [String; 3] {
    [
        format!("{indent}}} catch (error) {{"),
        format!("{indent}  {RETHROW}"),
        format!("{indent}}}"),
    ]
}

/// Replace `any` annotations with `unknown`.
pub fn tighten_any_types(content: &str) -> String {
    let content = ANNOTATION_ANY_REGEX.replace_all(content, "${1}unknown");
    let content = CAST_ANY_REGEX.replace_all(&content, "as${1}unknown");
    let content = GENERIC_ANY_REGEX.replace_all(&content, "${1}unknown${2}");
    ARRAY_ANY_REGEX.replace_all(&content, "unknown[]").into_owned()
}

/// Regroup the leading import block into framework, third-party and local
/// groups separated by one blank line. Order within a group is kept.
pub fn organize_imports(content: &str) -> String {
    let imports = find_imports(content);
    let Some(first) = imports.first() else {
        return content.to_string();
    };

    let mut block: Vec<&ImportStatement> = vec![&first.1];
    let mut end = first.0.end;
    for (range, statement) in imports.iter().skip(1) {
        if !content[end..range.start].trim().is_empty() {
            break;
        }
        block.push(statement);
        end = range.end;
    }
    block.sort_by_key(|statement| statement.group());

    let mut rendered = String::new();
    let mut previous: Option<ImportGroup> = None;
    for statement in block {
        let group = statement.group();
        if let Some(previous) = previous {
            rendered.push_str(if previous == group { "\n" } else { "\n\n" });
        }
        rendered.push_str(&statement.text);
        previous = Some(group);
    }

    let start = first.0.start;
    let indent: String = content[start..]
        .chars()
        .take_while(|ch| *ch == ' ' || *ch == '\t')
        .collect();
    format!("{}{indent}{rendered}{}", &content[..start], &content[end..])
}

/// Remove named import specifiers that are never referenced; statements left
/// with nothing to import are removed entirely.
pub fn drop_unused_imports(content: &str) -> String {
    let unused = unused_named_imports(content);
    if unused.is_empty() {
        return content.to_string();
    }

    let mut output = String::with_capacity(content.len());
    let mut cursor = 0;
    for (range, statement) in find_imports(content) {
        if !statement.named.iter().any(|spec| unused.contains(&spec.local)) {
            continue;
        }
        output.push_str(&content[cursor..range.start]);
        cursor = range.end;
        match statement.retain_named(|spec| !unused.contains(&spec.local)) {
            Some(kept) => {
                let indent: String = content[range.start..]
                    .chars()
                    .take_while(|ch| *ch == ' ' || *ch == '\t')
                    .collect();
                output.push_str(&indent);
                output.push_str(&kept.text);
            }
            None => {
                if content[cursor..].starts_with('\n') {
                    cursor += 1;
                }
            }
        }
    }
    output.push_str(&content[cursor..]);
    output
}

/// Prepend a header comment naming the file's exported symbols. Files that
/// already carry a comment are left alone.
pub fn add_header_comment(path: &str, content: &str) -> String {
    if has_comment_marker(content) {
        return content.to_string();
    }

    let exports = exported_symbols(path, content);
    let summary = if exports.is_empty() {
        format!("{}: internal module", file_name(path))
    } else {
        format!("{}: exports {}", file_name(path), exports.join(", "))
    };
    let header = match extension(path).as_str() {
        "py" | "rb" | "sh" | "bash" | "ps1" => format!("# {summary}"),
        "vue" | "svelte" | "html" => format!("<!-- {summary} -->"),
        "css" | "scss" | "less" => format!("/* {summary} */"),
        _ => format!("// {summary}"),
    };

    match content.split_once('\n') {
        Some((first, rest)) if first.starts_with("#!") => format!("{first}\n{header}\n{rest}"),
        _ => format!("{header}\n{content}"),
    }
}

/// Public symbols declared at the top level, in declaration order.
pub fn exported_symbols(path: &str, content: &str) -> Vec<String> {
    let regex: &Regex = if extension(path) == "py" {
        &PYTHON_EXPORT_REGEX
    } else if is_script(path) {
        &SCRIPT_EXPORT_REGEX
    } else {
        return Vec::new();
    };
    let mut symbols: Vec<String> = Vec::new();
    for captures in regex.captures_iter(content) {
        let name = captures[1].to_string();
        if !symbols.contains(&name) {
            symbols.push(name);
        }
    }
    symbols
}

/// Strip trailing whitespace per line and collapse runs of blank lines into
/// a single blank line.
pub fn normalize_whitespace(content: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut blank_run = 0;
    for line in content.split('\n') {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        lines.push(line);
    }
    lines.join("\n")
}
