//! Boilerplate for files the engine creates from scratch.

use serde_json::{json, Map, Value};

use crate::domain::{AnalysisReport, RepositoryContext, SourceFile};
use crate::error::Result;
use crate::language::{extension, file_stem};
use crate::transformer::exported_symbols;

/// Framework dependencies added to a generated `package.json`.
const NPM_DEPENDENCIES: &[(&str, &[(&str, &str)])] = &[
    ("React", &[("react", "^18.2.0"), ("react-dom", "^18.2.0")]),
    ("Next.js", &[("next", "^14.0.0")]),
    ("Vue", &[("vue", "^3.4.0")]),
    ("Svelte", &[("svelte", "^4.2.0")]),
    ("Express", &[("express", "^4.18.2")]),
    ("Angular", &[("@angular/core", "^17.0.0")]),
];

/// Framework requirements added to a generated `requirements.txt`.
const PYTHON_REQUIREMENTS: &[(&str, &[&str])] = &[
    ("Django", &["django>=4.2"]),
    ("Flask", &["flask>=3.0"]),
    ("FastAPI", &["fastapi>=0.110", "uvicorn>=0.29"]),
];

/// Content for a missing project file.
///
/// Unknown file names get a short placeholder rather than an error so the
/// caller always has something to propose.
pub fn generate(filename: &str, report: &AnalysisReport, context: &RepositoryContext) -> Result<String> {
    let content = match filename {
        ".gitignore" => gitignore(report),
        "package.json" => package_json(report, context)?,
        "tsconfig.json" => tsconfig_json(report)?,
        "requirements.txt" => requirements_txt(report, context),
        "go.mod" => go_mod(context),
        "Cargo.toml" => cargo_toml(context),
        "pom.xml" => pom_xml(context),
        "README.md" => readme(report, context),
        other => format!("# {other}\n"),
    };
    Ok(content)
}

fn gitignore(report: &AnalysisReport) -> String {
    let mut lines = vec![
        "# Dependencies",
        "node_modules/",
        "",
        "# Build output",
        "dist/",
        "build/",
        "coverage/",
        "",
        "# Environment",
        ".env",
        ".env.local",
        "",
        "# Logs and editor files",
        "*.log",
        ".DS_Store",
        ".idea/",
        ".vscode/",
    ];
    if report.main_language_is("Python") {
        lines.extend([
            "",
            "# Python",
            "__pycache__/",
            "*.py[cod]",
            ".venv/",
            "venv/",
            ".pytest_cache/",
        ]);
    }
    if report.main_language_is("Java") {
        lines.extend(["", "# Java", "target/", "*.class", ".gradle/"]);
    }
    if report.main_language_is("Rust") {
        lines.extend(["", "# Rust", "target/"]);
    }
    if report.uses_framework("Next.js") {
        lines.extend(["", "# Next.js", ".next/", "out/"]);
    }
    lines.push("");
    lines.join("\n")
}

fn package_json(report: &AnalysisReport, context: &RepositoryContext) -> Result<String> {
    let mut dependencies = Map::new();
    for (framework, packages) in NPM_DEPENDENCIES {
        if report.uses_framework(framework) {
            for (name, version) in *packages {
                dependencies.insert((*name).to_string(), Value::from(*version));
            }
        }
    }

    let typescript = report.main_language_is("TypeScript");
    let mut dev_dependencies = Map::new();
    dev_dependencies.insert("jest".to_string(), Value::from("^29.7.0"));
    if typescript {
        dev_dependencies.insert("typescript".to_string(), Value::from("^5.3.0"));
        dev_dependencies.insert("@types/node".to_string(), Value::from("^20.10.0"));
        dev_dependencies.insert("ts-jest".to_string(), Value::from("^29.1.0"));
        if report.uses_framework("React") {
            dev_dependencies.insert("@types/react".to_string(), Value::from("^18.2.0"));
        }
    }

    let scripts = if report.uses_framework("Next.js") {
        json!({
            "dev": "next dev",
            "build": "next build",
            "start": "next start",
            "test": "jest",
        })
    } else if typescript {
        json!({
            "build": "tsc",
            "start": "node dist/index.js",
            "test": "jest",
        })
    } else {
        json!({
            "start": "node index.js",
            "test": "jest",
        })
    };

    let mut manifest = json!({
        "name": npm_name(context.project_name()),
        "version": "0.1.0",
        "private": true,
        "scripts": scripts,
        "dependencies": dependencies,
        "devDependencies": dev_dependencies,
    });
    if let Some(description) = non_blank(context.description.as_deref()) {
        manifest["description"] = Value::from(description);
    }

    let mut rendered = serde_json::to_string_pretty(&manifest)?;
    rendered.push('\n');
    Ok(rendered)
}

fn npm_name(project: &str) -> String {
    let name: String = project
        .to_lowercase()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '-'
            }
        })
        .collect();
    let name = name.trim_matches(['-', '.', '_']);
    if name.is_empty() {
        "project".to_string()
    } else {
        name.to_string()
    }
}

fn tsconfig_json(report: &AnalysisReport) -> Result<String> {
    let mut compiler_options = json!({
        "target": "ES2020",
        "lib": ["dom", "dom.iterable", "esnext"],
        "module": "esnext",
        "moduleResolution": "node",
        "strict": true,
        "esModuleInterop": true,
        "skipLibCheck": true,
        "forceConsistentCasingInFileNames": true,
        "resolveJsonModule": true,
    });
    if report.uses_framework("Next.js") {
        compiler_options["jsx"] = Value::from("preserve");
    } else if report.uses_framework("React") {
        compiler_options["jsx"] = Value::from("react-jsx");
    }

    let config = json!({
        "compilerOptions": compiler_options,
        "include": ["**/*.ts", "**/*.tsx"],
        "exclude": ["node_modules"],
    });
    let mut rendered = serde_json::to_string_pretty(&config)?;
    rendered.push('\n');
    Ok(rendered)
}

fn requirements_txt(report: &AnalysisReport, context: &RepositoryContext) -> String {
    let mut lines = vec![format!("# Python dependencies for {}", context.project_name())];
    for (framework, requirements) in PYTHON_REQUIREMENTS {
        if report.uses_framework(framework) {
            lines.extend(requirements.iter().map(|line| (*line).to_string()));
        }
    }
    lines.push("pytest>=8.0".to_string());
    lines.push(String::new());
    lines.join("\n")
}

fn go_mod(context: &RepositoryContext) -> String {
    let module = if context.full_name.contains('/') {
        format!("github.com/{}", context.full_name)
    } else {
        context.project_name().to_string()
    };
    [format!("module {module}"), String::new(), "go 1.21".to_string(), String::new()].join("\n")
}

fn cargo_toml(context: &RepositoryContext) -> String {
    let name = npm_name(context.project_name()).replace('.', "-");
    [
        "[package]".to_string(),
        format!("name = \"{name}\""),
        "version = \"0.1.0\"".to_string(),
        "edition = \"2021\"".to_string(),
        String::new(),
        "[dependencies]".to_string(),
        String::new(),
    ]
    .join("\n")
}

fn pom_xml(context: &RepositoryContext) -> String {
    let artifact = npm_name(context.project_name());
    [
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>".to_string(),
        "<project xmlns=\"http://maven.apache.org/POM/4.0.0\"".to_string(),
        "         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\"".to_string(),
        "         xsi:schemaLocation=\"http://maven.apache.org/POM/4.0.0 http://maven.apache.org/xsd/maven-4.0.0.xsd\">".to_string(),
        "  <modelVersion>4.0.0</modelVersion>".to_string(),
        "  <groupId>com.example</groupId>".to_string(),
        format!("  <artifactId>{artifact}</artifactId>"),
        "  <version>0.1.0</version>".to_string(),
        "  <properties>".to_string(),
        "    <maven.compiler.release>17</maven.compiler.release>".to_string(),
        "  </properties>".to_string(),
        "</project>".to_string(),
        String::new(),
    ]
    .join("\n")
}

fn readme(report: &AnalysisReport, context: &RepositoryContext) -> String {
    let mut lines = vec![format!("# {}", context.project_name()), String::new()];
    lines.push(
        non_blank(context.description.as_deref())
            .unwrap_or("Project description goes here.")
            .to_string(),
    );
    lines.push(String::new());

    if report.main_language.is_some() || !report.frameworks_detected.is_empty() {
        lines.push("## Tech stack".to_string());
        lines.push(String::new());
        if let Some(language) = &report.main_language {
            lines.push(format!("- {language}"));
        }
        for framework in &report.frameworks_detected {
            lines.push(format!("- {framework}"));
        }
        lines.push(String::new());
    }

    let (install, test) = match report.main_language.as_deref() {
        Some("JavaScript" | "TypeScript") => ("npm install", "npm test"),
        Some("Python") => ("pip install -r requirements.txt", "pytest"),
        Some("Go") => ("go mod download", "go test ./..."),
        Some("Rust") => ("cargo build", "cargo test"),
        Some("Java") => ("mvn install", "mvn test"),
        _ => ("", ""),
    };
    if !install.is_empty() {
        lines.extend([
            "## Getting started".to_string(),
            String::new(),
            "```sh".to_string(),
            install.to_string(),
            test.to_string(),
            "```".to_string(),
            String::new(),
        ]);
    }
    lines.join("\n")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Path of the test file created for `path`.
pub fn test_path_for(path: &str) -> String {
    let (directory, _) = split_directory(path);
    let stem = file_stem(path);
    let ext = extension(path);
    let name = match ext.as_str() {
        "py" => format!("test_{stem}.py"),
        "go" => format!("{stem}_test.go"),
        "java" => format!("{stem}Test.java"),
        "" => format!("{stem}.test"),
        _ => format!("{stem}.test.{ext}"),
    };
    format!("{directory}{name}")
}

fn split_directory(path: &str) -> (&str, &str) {
    match path.rfind(['/', '\\']) {
        Some(index) => path.split_at(index + 1),
        None => ("", path),
    }
}

/// Test skeleton exercising the exports of `file`.
pub fn generate_test(file: &SourceFile) -> String {
    let stem = file_stem(&file.path);
    let exports = exported_symbols(&file.path, &file.content);
    match extension(&file.path).as_str() {
        "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" => script_test(stem, &exports),
        "py" => python_test(stem, &exports),
        "go" => go_test(stem, &file.content),
        "java" => java_test(stem),
        _ => format!("// Tests for {}\n", file.path),
    }
}

fn script_test(stem: &str, exports: &[String]) -> String {
    let mut lines = vec![
        format!("import * as subject from './{stem}';"),
        String::new(),
        format!("describe('{stem}', () => {{"),
        "  it('loads the module', () => {".to_string(),
        "    expect(subject).toBeDefined();".to_string(),
        "  });".to_string(),
    ];
    for name in exports {
        lines.extend([
            String::new(),
            format!("  it('exports {name}', () => {{"),
            format!("    expect(subject.{name}).toBeDefined();"),
            "  });".to_string(),
        ]);
    }
    lines.extend(["});".to_string(), String::new()]);
    lines.join("\n")
}

fn python_test(stem: &str, exports: &[String]) -> String {
    let mut lines = vec![
        format!("import {stem}"),
        String::new(),
        String::new(),
        "def test_module_imports():".to_string(),
        format!("    assert {stem} is not None"),
    ];
    for name in exports {
        lines.extend([
            String::new(),
            String::new(),
            format!("def test_{}_is_defined():", name.to_lowercase()),
            format!("    assert hasattr({stem}, \"{name}\")"),
        ]);
    }
    lines.push(String::new());
    lines.join("\n")
}

fn go_test(stem: &str, content: &str) -> String {
    let package = content
        .lines()
        .find_map(|line| line.trim().strip_prefix("package "))
        .map(str::trim)
        .unwrap_or("main");
    let name: String = stem
        .split(['_', '-', '.'])
        .filter(|part| !part.is_empty())
        .map(capitalize)
        .collect();
    [
        format!("package {package}"),
        String::new(),
        "import \"testing\"".to_string(),
        String::new(),
        format!("func Test{name}(t *testing.T) {{"),
        "\tt.Skip(\"add assertions\")".to_string(),
        "}".to_string(),
        String::new(),
    ]
    .join("\n")
}

fn java_test(stem: &str) -> String {
    [
        "import org.junit.jupiter.api.Test;".to_string(),
        String::new(),
        "import static org.junit.jupiter.api.Assertions.assertNotNull;".to_string(),
        String::new(),
        format!("class {stem}Test {{"),
        "    @Test".to_string(),
        "    void createsInstance() {".to_string(),
        format!("        assertNotNull(new {stem}());"),
        "    }".to_string(),
        "}".to_string(),
        String::new(),
    ]
    .join("\n")
}

fn capitalize(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
