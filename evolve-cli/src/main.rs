#![deny(missing_docs)]
//! Evolve command-line interface.
//!
//! Runs the suggestion engine against a local checkout or against files
//! fetched from a GitHub repository.

mod github;

use clap::{Args, Parser, Subcommand, ValueEnum};
use evolve_core::fs::{candidate_paths, relative_path};
use evolve_core::{
    AnalysisRun, FAILED_CONTENT_PLACEHOLDER, FileAction, FileSystem, LoadStatus,
    RepositoryContext, SourceFile, StdFileSystem, Suggestion, SuggestionEngine, SuggestionReport,
    analyze, pr_body_for_checkout, render_analysis_markdown, render_analysis_text, render_json,
    render_suggestion_markdown, render_suggestion_text,
};
use github::{DEFAULT_API_URL, GitHubContents, parse_repository};
use log::{info, warn};
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub(crate) type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser)]
#[command(name = "evolve", version, about = "Evolve CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct LocalArgs {
    /// Local repository checkout to read.
    #[arg(long, default_value = ".")]
    path: PathBuf,
    /// Maximum number of files handed to the engine.
    #[arg(long, default_value_t = 50)]
    max_files: usize,
    /// Maximum number of concurrent file reads.
    #[arg(short = 'j', long, default_value_t = 8)]
    concurrency: usize,
}

#[derive(Args, Clone)]
struct GithubArgs {
    /// Repository as `owner/name`.
    #[arg(long)]
    repo: String,
    /// Files to fetch (repeatable or comma-separated).
    #[arg(long = "file", value_delimiter = ',', required = true)]
    files: Vec<String>,
    /// Token used for the GitHub API.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,
    /// GitHub REST API base URL.
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,
    /// Maximum number of concurrent requests.
    #[arg(short = 'j', long, default_value_t = 5)]
    concurrency: usize,
}

#[derive(Args, Clone)]
struct OutputArgs {
    /// Output format for report data.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Write the report to a file instead of stdout.
    #[arg(long = "report-output")]
    report_output: Option<PathBuf>,
}

#[derive(ValueEnum, Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Suggest one improvement for a local checkout.
    Suggest {
        #[command(flatten)]
        local: LocalArgs,
        #[command(flatten)]
        report: OutputArgs,
        /// Apply the suggested file operations in place.
        #[arg(long)]
        write: bool,
        /// Write a pull request body for the suggestion to this file.
        #[arg(long = "pr-body-output")]
        pr_body_output: Option<PathBuf>,
    },
    /// Print the analysis of a local checkout.
    Analyze {
        #[command(flatten)]
        local: LocalArgs,
        #[command(flatten)]
        report: OutputArgs,
    },
    /// Suggest one improvement for files fetched from GitHub.
    Github {
        #[command(flatten)]
        github: GithubArgs,
        #[command(flatten)]
        report: OutputArgs,
    },
}

#[cfg(not(test))]
#[tokio::main]
async fn main() -> CliResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Suggest {
            local,
            report,
            write,
            pr_body_output,
        } => run_suggest(local, report, write, pr_body_output).await?,
        Commands::Analyze { local, report } => run_analyze(local, report).await?,
        Commands::Github { github, report } => run_github(github, report).await?,
    }

    Ok(())
}

#[cfg(test)]
fn main() {}

/// Files handed to the engine plus the ones that had to be replaced.
struct LoadedFiles {
    files: Vec<SourceFile>,
    unreadable: Vec<String>,
}

async fn run_suggest(
    local: LocalArgs,
    output: OutputArgs,
    write: bool,
    pr_body_output: Option<PathBuf>,
) -> CliResult<()> {
    let root = local.path.clone();
    let source = root.display().to_string();
    let loaded = match load_local(&root, local.max_files, local.concurrency).await {
        Ok(loaded) => loaded,
        Err(err) => {
            let report = SuggestionReport::failed(source, err.to_string());
            return emit_suggestion_report(&report, &output).await;
        }
    };

    let mut report = SuggestionReport::new(source);
    report.load_status = LoadStatus::Local;
    let suggestion = suggest_into(&mut report, loaded, &local_context(&root))?;

    if write && !suggestion.is_empty() {
        match apply_suggestion(&StdFileSystem::new(), &root, &suggestion) {
            Ok(touched) => {
                info!("wrote {} file(s) under {}", touched.len(), root.display());
                report.applied = true;
            }
            Err(err) => report.errors.push(err.to_string()),
        }
    }
    if let Some(path) = pr_body_output {
        let body = pr_body_for_checkout(&StdFileSystem::new(), &root, &suggestion)?;
        write_output_file(&path, body).await?;
    }

    report.suggestion = Some(suggestion);
    emit_suggestion_report(&report, &output).await
}

async fn run_analyze(local: LocalArgs, output: OutputArgs) -> CliResult<()> {
    let mut run = AnalysisRun::new(local.path.display().to_string());
    match load_local(&local.path, local.max_files, local.concurrency).await {
        Ok(loaded) => {
            run.load_status = LoadStatus::Local;
            run.files_analyzed = loaded.files.len();
            run.errors = loaded
                .unreadable
                .iter()
                .map(|path| format!("could not read {path}"))
                .collect();
            run.analysis = Some(analyze(&loaded.files));
        }
        Err(err) => run.load_status = LoadStatus::Failed(err.to_string()),
    }
    emit_analysis_run(&run, &output).await
}

async fn run_github(args: GithubArgs, output: OutputArgs) -> CliResult<()> {
    let repo = parse_repository(&args.repo)?;
    let paths = normalize_file_args(&args.files);
    if paths.is_empty() {
        return Err("at least one --file is required".into());
    }

    let github = Arc::new(GitHubContents::new(&args.api_url, args.token.clone())?);
    let context = match github.repository(&repo).await {
        Ok(context) => context,
        Err(err) => {
            warn!("could not read repository metadata for {repo}: {err}");
            RepositoryContext {
                full_name: repo.clone(),
                ..RepositoryContext::default()
            }
        }
    };

    let fetcher = github.clone();
    let fetch_repo = repo.clone();
    let loaded = load_concurrently(paths, args.concurrency, move |path| {
        let github = fetcher.clone();
        let repo = fetch_repo.clone();
        async move { github.file(&repo, &path).await }
    })
    .await?;

    let mut report = SuggestionReport::new(repo);
    report.load_status = LoadStatus::Fetched;
    let suggestion = suggest_into(&mut report, loaded, &context)?;
    report.suggestion = Some(suggestion);
    emit_suggestion_report(&report, &output).await
}

fn suggest_into(
    report: &mut SuggestionReport,
    loaded: LoadedFiles,
    context: &RepositoryContext,
) -> CliResult<Suggestion> {
    report.files_analyzed = loaded.files.len();
    report.unreadable_files = loaded.unreadable;
    let outcome = SuggestionEngine::heuristic().suggest(&loaded.files, context)?;
    report.provider = Some(outcome.source);
    Ok(outcome.suggestion)
}

fn normalize_file_args(files: &[String]) -> Vec<String> {
    files
        .iter()
        .map(|path| path.trim().trim_start_matches('/').to_string())
        .filter(|path| !path.is_empty())
        .collect()
}

fn local_context(root: &Path) -> RepositoryContext {
    let name = root
        .canonicalize()
        .ok()
        .and_then(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_default();
    RepositoryContext {
        full_name: name,
        ..RepositoryContext::default()
    }
}

async fn load_local(root: &Path, max_files: usize, concurrency: usize) -> CliResult<LoadedFiles> {
    if !root.is_dir() {
        return Err(format!("path not found: {}", root.display()).into());
    }
    let paths: Vec<String> = candidate_paths(&StdFileSystem::new(), root, max_files)?
        .iter()
        .map(|path| relative_path(root, path))
        .collect();
    let root = root.to_path_buf();
    load_concurrently(paths, concurrency, move |relative| {
        read_local(root.join(relative))
    })
    .await
}

async fn read_local(path: PathBuf) -> CliResult<String> {
    Ok(tokio::fs::read_to_string(path).await?)
}

/// Read every path with bounded concurrency, keeping input order. Failed
/// reads are logged and replaced by the placeholder content.
async fn load_concurrently<F, Fut>(
    paths: Vec<String>,
    concurrency: usize,
    read: F,
) -> CliResult<LoadedFiles>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = CliResult<String>> + Send + 'static,
{
    let concurrency = if concurrency == 0 { 1 } else { concurrency };
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();

    for (index, path) in paths.iter().enumerate() {
        let permit = semaphore.clone().acquire_owned().await?;
        let pending = read(path.clone());
        tasks.spawn(async move {
            let _permit = permit;
            (index, pending.await)
        });
    }

    let mut contents: Vec<Option<String>> = vec![None; paths.len()];
    while let Some(joined) = tasks.join_next().await {
        let (index, result) = joined?;
        match result {
            Ok(content) => contents[index] = Some(content),
            Err(err) => warn!("failed to load {}: {err}", paths[index]),
        }
    }

    let mut loaded = LoadedFiles {
        files: Vec::with_capacity(paths.len()),
        unreadable: Vec::new(),
    };
    for (path, content) in paths.into_iter().zip(contents) {
        let content = match content {
            Some(content) => content,
            None => {
                loaded.unreadable.push(path.clone());
                FAILED_CONTENT_PLACEHOLDER.to_string()
            }
        };
        loaded.files.push(SourceFile::new(path, content));
    }
    Ok(loaded)
}

/// Write the suggestion's file operations below `root`. Every path is checked
/// before anything is written.
fn apply_suggestion<F: FileSystem>(
    fs: &F,
    root: &Path,
    suggestion: &Suggestion,
) -> CliResult<Vec<String>> {
    for op in &suggestion.files {
        ensure_inside_checkout(&op.path)?;
    }

    let mut touched = Vec::new();
    for op in &suggestion.files {
        let target = root.join(&op.path);
        match op.action {
            FileAction::Create | FileAction::Modify => fs.write(&target, &op.content)?,
            FileAction::Delete => fs.remove_file(&target)?,
        }
        touched.push(op.path.clone());
    }
    Ok(touched)
}

fn ensure_inside_checkout(path: &str) -> CliResult<()> {
    let candidate = Path::new(path);
    let escapes = candidate.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if path.trim().is_empty() || escapes {
        return Err(format!("refusing to write outside the checkout: `{path}`").into());
    }
    Ok(())
}

async fn emit_suggestion_report(report: &SuggestionReport, output: &OutputArgs) -> CliResult<()> {
    let contents = match output.format {
        OutputFormat::Text => render_suggestion_text(report),
        OutputFormat::Markdown => render_suggestion_markdown(report),
        OutputFormat::Json => render_json(report)?,
    };
    emit_output(output, contents).await
}

async fn emit_analysis_run(run: &AnalysisRun, output: &OutputArgs) -> CliResult<()> {
    let contents = match output.format {
        OutputFormat::Text => render_analysis_text(run),
        OutputFormat::Markdown => render_analysis_markdown(run),
        OutputFormat::Json => render_json(run)?,
    };
    emit_output(output, contents).await
}

async fn emit_output(output: &OutputArgs, contents: String) -> CliResult<()> {
    if let Some(path) = &output.report_output {
        write_output_file(path, contents).await?;
    } else {
        print!("{contents}");
    }
    Ok(())
}

async fn write_output_file(path: &Path, contents: String) -> CliResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use evolve_core::{SuggestionFileOp, SuggestionKind};
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use serde_json::{Value, json};

    static UNIQUE_COUNTER: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

    fn unique_dir() -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        let counter = UNIQUE_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        std::env::temp_dir().join(format!("evolve_cli_test_{nanos}_{counter}"))
    }

    fn local_args(path: &Path) -> LocalArgs {
        LocalArgs {
            path: path.to_path_buf(),
            max_files: 50,
            concurrency: 2,
        }
    }

    fn json_output(path: &Path) -> OutputArgs {
        OutputArgs {
            format: OutputFormat::Json,
            report_output: Some(path.to_path_buf()),
        }
    }

    fn read_json(path: &Path) -> Value {
        let contents = std::fs::read_to_string(path).expect("read report");
        serde_json::from_str(&contents).expect("parse report")
    }

    #[tokio::test]
    async fn load_concurrently_keeps_order_and_replaces_failures() {
        let paths = vec!["a.ts".to_string(), "b.ts".to_string(), "c.ts".to_string()];
        let loaded = load_concurrently(paths, 2, |path| async move {
            let result: CliResult<String> = if path == "b.ts" {
                Err("boom".into())
            } else {
                Ok(format!("content of {path}"))
            };
            result
        })
        .await
        .expect("loaded");

        let order: Vec<&str> = loaded.files.iter().map(|file| file.path.as_str()).collect();
        assert_eq!(order, vec!["a.ts", "b.ts", "c.ts"]);
        assert_eq!(loaded.files[0].content, "content of a.ts");
        assert_eq!(loaded.files[1].content, FAILED_CONTENT_PLACEHOLDER);
        assert_eq!(loaded.unreadable, vec!["b.ts".to_string()]);
    }

    #[tokio::test]
    async fn load_local_filters_candidates() {
        let root = unique_dir();
        std::fs::create_dir_all(root.join("src")).expect("src");
        std::fs::create_dir_all(root.join("node_modules/dep")).expect("deps");
        std::fs::write(root.join("src/b.ts"), "export const b = 1").expect("b");
        std::fs::write(root.join("src/a.ts"), "export const a = 1").expect("a");
        std::fs::write(root.join("README.md"), "# demo").expect("readme");
        std::fs::write(root.join("logo.png"), [0u8, 1, 2]).expect("logo");
        std::fs::write(root.join("bad.ts"), [0xffu8, 0xfe, 0xfd]).expect("bad");
        std::fs::write(root.join("node_modules/dep/index.js"), "x").expect("dep");

        let loaded = load_local(&root, 50, 3).await.expect("loaded");
        let order: Vec<&str> = loaded.files.iter().map(|file| file.path.as_str()).collect();

        assert_eq!(order, vec!["README.md", "bad.ts", "src/a.ts", "src/b.ts"]);
        assert_eq!(loaded.unreadable, vec!["bad.ts".to_string()]);
        assert_eq!(loaded.files[1].content, FAILED_CONTENT_PLACEHOLDER);

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn load_local_rejects_missing_path() {
        let root = unique_dir();
        assert!(load_local(&root, 10, 1).await.is_err());
    }

    #[test]
    fn apply_suggestion_writes_inside_checkout() {
        let root = unique_dir();
        std::fs::create_dir_all(&root).expect("root");
        let suggestion = Suggestion {
            kind: SuggestionKind::Feature,
            title: "Add missing .gitignore".to_string(),
            description: String::new(),
            reasoning: String::new(),
            files: vec![SuggestionFileOp {
                path: "config/.gitignore".to_string(),
                action: FileAction::Create,
                content: "node_modules/\n".to_string(),
            }],
        };

        let touched = apply_suggestion(&StdFileSystem::new(), &root, &suggestion).expect("apply");
        assert_eq!(touched, vec!["config/.gitignore".to_string()]);
        assert_eq!(
            std::fs::read_to_string(root.join("config/.gitignore")).expect("read"),
            "node_modules/\n"
        );

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[test]
    fn apply_suggestion_refuses_escaping_paths() {
        let root = unique_dir();
        let mut suggestion = Suggestion::no_code_files();
        suggestion.files.push(SuggestionFileOp {
            path: "../outside.ts".to_string(),
            action: FileAction::Modify,
            content: String::new(),
        });

        let error = apply_suggestion(&StdFileSystem::new(), &root, &suggestion).unwrap_err();
        assert!(error.to_string().contains("outside the checkout"));
        assert!(!root.exists());
        assert!(ensure_inside_checkout("/etc/passwd").is_err());
        assert!(ensure_inside_checkout(" ").is_err());
        assert!(ensure_inside_checkout("src/app.ts").is_ok());
    }

    #[test]
    fn normalize_file_args_drops_blanks_and_leading_slashes() {
        let files = vec![" /src/a.ts ".to_string(), "".to_string(), "b.ts".to_string()];
        assert_eq!(normalize_file_args(&files), vec!["src/a.ts", "b.ts"]);
    }

    #[test]
    fn local_context_uses_directory_name() {
        let root = unique_dir();
        std::fs::create_dir_all(&root).expect("root");
        let context = local_context(&root);
        assert_eq!(
            context.full_name,
            root.file_name().expect("name").to_string_lossy()
        );
        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn run_suggest_fixes_and_writes_files() {
        let root = unique_dir();
        std::fs::create_dir_all(&root).expect("root");
        std::fs::write(root.join("a.ts"), "console.log('x')\nconst y=1").expect("a");
        let report_path = root.join("out/report.json");
        let body_path = root.join("out/pr.md");

        run_suggest(
            local_args(&root),
            json_output(&report_path),
            true,
            Some(body_path.clone()),
        )
        .await
        .expect("suggest");

        let report = read_json(&report_path);
        assert_eq!(report["loadStatus"]["status"], "local");
        assert_eq!(report["provider"], "heuristic");
        assert_eq!(report["applied"], true);
        assert_eq!(report["suggestion"]["type"], "bugfix");
        assert_eq!(report["suggestion"]["files"][0]["path"], "a.ts");

        let rewritten = std::fs::read_to_string(root.join("a.ts")).expect("a");
        assert!(!rewritten.contains("console.log"));
        assert!(rewritten.contains("const y=1"));

        let body = std::fs::read_to_string(&body_path).expect("body");
        assert!(body.starts_with("## Automated Evolution"));

        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn run_suggest_reports_missing_checkout() {
        let root = unique_dir();
        let report_dir = unique_dir();
        let report_path = report_dir.join("report.md");
        let output = OutputArgs {
            format: OutputFormat::Markdown,
            report_output: Some(report_path.clone()),
        };

        run_suggest(local_args(&root), output, false, None)
            .await
            .expect("suggest");

        let report = std::fs::read_to_string(&report_path).expect("report");
        assert!(report.contains("Status: failed (path not found"));
        std::fs::remove_dir_all(&report_dir).expect("cleanup");
    }

    #[tokio::test]
    async fn run_analyze_renders_text() {
        let root = unique_dir();
        std::fs::create_dir_all(&root).expect("root");
        std::fs::write(root.join("main.py"), "print('hi')\n").expect("main");
        let report_path = root.join("analysis.txt");
        let output = OutputArgs {
            format: OutputFormat::Text,
            report_output: Some(report_path.clone()),
        };

        run_analyze(local_args(&root), output).await.expect("analyze");

        let text = std::fs::read_to_string(&report_path).expect("report");
        assert!(text.contains("Main language: Python"));
        assert!(text.contains("missing: requirements.txt"));
        std::fs::remove_dir_all(&root).expect("cleanup");
    }

    #[tokio::test]
    async fn run_github_fetches_files_and_tolerates_failures() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/app");
                then.status(200).json_body(json!({
                    "full_name": "octo/app",
                    "description": null,
                    "language": "TypeScript"
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/app/contents/src/a.ts");
                then.status(200).json_body(json!({
                    "content": STANDARD.encode("console.log('x')\nconst y=1"),
                    "encoding": "base64"
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/repos/octo/app/contents/src/b.ts");
                then.status(500);
            })
            .await;

        let report_dir = unique_dir();
        let report_path = report_dir.join("report.json");
        let args = GithubArgs {
            repo: "octo/app".to_string(),
            files: vec!["src/a.ts".to_string(), "src/b.ts".to_string()],
            token: None,
            api_url: server.base_url(),
            concurrency: 2,
        };

        run_github(args, json_output(&report_path))
            .await
            .expect("github");

        let report = read_json(&report_path);
        assert_eq!(report["source"], "octo/app");
        assert_eq!(report["loadStatus"]["status"], "fetched");
        assert_eq!(report["filesAnalyzed"], 2);
        assert_eq!(report["unreadableFiles"], json!(["src/b.ts"]));
        assert_eq!(report["suggestion"]["files"][0]["path"], "src/a.ts");
        std::fs::remove_dir_all(&report_dir).expect("cleanup");
    }

    #[tokio::test]
    async fn run_github_requires_files() {
        let args = GithubArgs {
            repo: "octo/app".to_string(),
            files: vec![" ".to_string()],
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
            concurrency: 1,
        };
        let output = OutputArgs {
            format: OutputFormat::Text,
            report_output: None,
        };
        assert!(run_github(args, output).await.is_err());
    }
}
