//! Path classification: extensions, languages, and file roles.

/// Languages recognized by extension. Data and prose formats are left out so
/// they never win the main-language count.
const LANGUAGES: &[(&str, &str)] = &[
    ("js", "JavaScript"),
    ("jsx", "JavaScript"),
    ("mjs", "JavaScript"),
    ("cjs", "JavaScript"),
    ("ts", "TypeScript"),
    ("tsx", "TypeScript"),
    ("py", "Python"),
    ("java", "Java"),
    ("cpp", "C++"),
    ("c", "C"),
    ("h", "C"),
    ("cs", "C#"),
    ("php", "PHP"),
    ("rb", "Ruby"),
    ("go", "Go"),
    ("rs", "Rust"),
    ("swift", "Swift"),
    ("kt", "Kotlin"),
    ("scala", "Scala"),
    ("clj", "Clojure"),
    ("vue", "Vue"),
    ("svelte", "Svelte"),
    ("html", "HTML"),
    ("css", "CSS"),
    ("scss", "SCSS"),
    ("less", "Less"),
    ("sql", "SQL"),
    ("sh", "Shell"),
    ("bash", "Bash"),
    ("ps1", "PowerShell"),
];

/// Extensions eligible for quality fixes.
const WEB_CODE_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx"];

/// Extensions that count as code when looking for any analyzable input.
const CODE_EXTENSIONS: &[&str] = &[
    "js", "jsx", "mjs", "cjs", "ts", "tsx", "py", "java", "cpp", "c", "h", "cs", "php", "rb",
    "go", "rs", "swift", "kt", "scala", "vue", "svelte",
];

/// Path fragments that mark documentation.
const DOC_MARKERS: &[&str] = &["readme", ".md", "license", "changelog"];

/// Path fragments that mark configuration or manifest files.
const CONFIG_MARKERS: &[&str] = &[
    "package.json",
    "package-lock",
    "yarn.lock",
    "pnpm-lock",
    "tsconfig",
    "jsconfig",
    "next.config",
    "tailwind.config",
    "postcss.config",
    "vite.config",
    "webpack.config",
    "babel.config",
    "jest.config",
    "eslint",
    "prettier",
    ".gitignore",
    ".env",
];

/// Lowercased extension of the final path segment, empty when absent.
pub fn extension(path: &str) -> String {
    let file_name = file_name(path);
    match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    }
}

/// Final path segment.
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// File name without its final extension.
pub fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Language display name for an extension, if known.
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, language)| *language)
}

/// Language display name for a path, if known.
pub fn language_for_path(path: &str) -> Option<&'static str> {
    language_for_extension(&extension(path))
}

/// Whether the path is documentation by name.
pub fn is_doc_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    DOC_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Whether the path is a configuration or manifest file by name.
pub fn is_config_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    CONFIG_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Whether the path looks like a test file.
pub fn is_test_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.contains("test") || lower.contains("spec")
}

/// Whether the path is TypeScript.
pub fn is_typescript(path: &str) -> bool {
    matches!(extension(path).as_str(), "ts" | "tsx")
}

/// Whether the path is a JSX-bearing component file.
pub fn is_component_file(path: &str) -> bool {
    matches!(extension(path).as_str(), "tsx" | "jsx")
}

/// Whether the path is source code of any supported language, excluding
/// documentation and configuration by name.
pub fn is_code_file(path: &str) -> bool {
    CODE_EXTENSIONS.contains(&extension(path).as_str()) && !is_doc_path(path) && !is_config_path(path)
}

/// Whether the path is a JavaScript/TypeScript file the transformer can fix.
pub fn is_fixable_code_file(path: &str) -> bool {
    WEB_CODE_EXTENSIONS.contains(&extension(path).as_str())
        && !is_doc_path(path)
        && !is_config_path(path)
}
