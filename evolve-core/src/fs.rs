//! Filesystem access for local checkouts.

use std::path::{Path, PathBuf};

use crate::domain::SourceFile;
use crate::engine::FAILED_CONTENT_PLACEHOLDER;
use crate::error::Result;
use crate::language::{is_config_path, is_doc_path, language_for_path};

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "dist", "build", "vendor", "__pycache__"];

/// Abstraction over filesystem access for testability.
#[cfg_attr(test, mockall::automock)]
pub trait FileSystem {
    /// List all files reachable from the root path.
    fn list_files(&self, root: &Path) -> Result<Vec<PathBuf>>;
    /// Read a file into a string.
    fn read_to_string(&self, path: &Path) -> Result<String>;
    /// Write a string to a file, creating parent directories.
    fn write(&self, path: &Path, contents: &str) -> Result<()>;
    /// Remove a file.
    fn remove_file(&self, path: &Path) -> Result<()>;
}

/// Default filesystem implementation backed by `std::fs`.
#[derive(Debug, Default, Clone)]
pub struct StdFileSystem;

impl StdFileSystem {
    /// Create a new standard filesystem adapter.
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for StdFileSystem {
    fn list_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                let file_type = entry.file_type()?;
                if file_type.is_dir() {
                    if !is_hidden(&path) && !is_skipped_dir(&path) {
                        pending.push(path);
                    }
                } else if file_type.is_file() {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn write(&self, path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(std::fs::write(path, contents)?)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        Ok(std::fs::remove_file(path)?)
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn is_skipped_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| SKIPPED_DIRS.contains(&name))
        .unwrap_or(false)
}

/// Whether a repository-relative path is worth handing to the engine: source
/// code, documentation, or project configuration.
pub fn is_candidate(relative: &str) -> bool {
    language_for_path(relative).is_some() || is_doc_path(relative) || is_config_path(relative)
}

/// Repository-relative path with `/` separators.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Candidate files under `root`, sorted, at most `max_files`.
pub fn candidate_paths<F: FileSystem + ?Sized>(
    fs: &F,
    root: &Path,
    max_files: usize,
) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs
        .list_files(root)?
        .into_iter()
        .filter(|path| is_candidate(&relative_path(root, path)))
        .collect();
    paths.sort();
    paths.truncate(max_files);
    Ok(paths)
}

/// Read one file as a [`SourceFile`]; unreadable files get the placeholder
/// content instead of failing the batch.
pub fn load_source<F: FileSystem + ?Sized>(fs: &F, root: &Path, path: &Path) -> SourceFile {
    let relative = relative_path(root, path);
    let content = match fs.read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            log::warn!("failed to read {relative}: {err}");
            FAILED_CONTENT_PLACEHOLDER.to_string()
        }
    };
    SourceFile::new(relative, content)
}

/// Load every candidate file under `root`.
pub fn load_sources<F: FileSystem + ?Sized>(
    fs: &F,
    root: &Path,
    max_files: usize,
) -> Result<Vec<SourceFile>> {
    Ok(candidate_paths(fs, root, max_files)?
        .iter()
        .map(|path| load_source(fs, root, path))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvolveError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static UNIQUE_COUNTER: AtomicUsize = AtomicUsize::new(0);

    #[test]
    fn std_filesystem_lists_and_skips_vendored_dirs() {
        let root = std::env::temp_dir().join(unique_dir_name());
        std::fs::create_dir_all(root.join("src")).expect("create src");
        std::fs::create_dir_all(root.join("node_modules/lib")).expect("create node_modules");
        std::fs::create_dir_all(root.join(".git")).expect("create .git");
        std::fs::write(root.join("src/app.ts"), "export const a = 1").expect("write app");
        std::fs::write(root.join("node_modules/lib/index.js"), "x").expect("write dep");
        std::fs::write(root.join(".git/HEAD"), "ref").expect("write head");
        std::fs::write(root.join(".gitignore"), "node_modules").expect("write ignore");

        let fs = StdFileSystem::new();
        let files = fs.list_files(&root).expect("list files");
        assert_eq!(files, vec![root.join(".gitignore"), root.join("src/app.ts")]);

        let contents = fs.read_to_string(&root.join("src/app.ts")).expect("read file");
        assert_eq!(contents, "export const a = 1");

        std::fs::remove_dir_all(&root).expect("cleanup temp dir");
    }

    #[test]
    fn std_filesystem_writes_nested_files() {
        let root = std::env::temp_dir().join(unique_dir_name());
        let fs = StdFileSystem::new();
        let target = root.join("src/new/file.ts");

        fs.write(&target, "export {}").expect("write");
        assert_eq!(std::fs::read_to_string(&target).expect("read"), "export {}");
        fs.remove_file(&target).expect("remove");
        assert!(!target.exists());

        std::fs::remove_dir_all(&root).expect("cleanup temp dir");
    }

    #[test]
    fn load_sources_filters_and_uses_placeholder() {
        let root = PathBuf::from("/repo");
        let mut fs = MockFileSystem::new();
        fs.expect_list_files().returning(|root| {
            Ok(vec![
                root.join("logo.png"),
                root.join("src/b.ts"),
                root.join("README.md"),
                root.join("src/a.ts"),
            ])
        });
        fs.expect_read_to_string().returning(|path| {
            if path.ends_with("a.ts") {
                Err(EvolveError::Other("denied".to_string()))
            } else {
                Ok(format!("content of {}", path.display()))
            }
        });

        let sources = load_sources(&fs, &root, 10).expect("load");
        let paths: Vec<&str> = sources.iter().map(|file| file.path.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "src/a.ts", "src/b.ts"]);
        assert_eq!(sources[1].content, FAILED_CONTENT_PLACEHOLDER);
        assert_eq!(sources[2].content, "content of /repo/src/b.ts");
    }

    #[test]
    fn candidate_paths_respects_limit() {
        let mut fs = MockFileSystem::new();
        fs.expect_list_files()
            .returning(|root| Ok(vec![root.join("c.py"), root.join("a.py"), root.join("b.py")]));

        let paths = candidate_paths(&fs, Path::new("/repo"), 2).expect("paths");
        assert_eq!(paths, vec![PathBuf::from("/repo/a.py"), PathBuf::from("/repo/b.py")]);
    }

    fn unique_dir_name() -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        let counter = UNIQUE_COUNTER.fetch_add(1, Ordering::Relaxed);
        PathBuf::from(format!("evolve_core_fs_test_{nanos}_{counter}"))
    }
}
