//! Source file discovery

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Directories that never contain project sources.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "target",
    "node_modules",
    "__pycache__",
    "venv",
    ".venv",
    "env",
    "build",
    "dist",
    ".git",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "site-packages",
    ".idea",
    ".vscode",
];

/// Collect every file under `root` whose extension is in `extensions`.
///
/// Directories named in `exclude_dirs` or starting with `.` are skipped, and
/// symbolic links are never followed. Unreadable entries are logged and
/// skipped. The result is in depth-first order with siblings sorted by name.
pub fn discover(root: &Path, extensions: &[&str], exclude_dirs: &[String]) -> Vec<PathBuf> {
    if !root.exists() {
        warn!("Project root does not exist: {:?}", root);
        return Vec::new();
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_excluded(e, exclude_dirs));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if has_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }

    debug!("Discovered {} files under {:?}", files.len(), root);
    files
}

/// Check if a directory entry should not be descended into
fn is_excluded(entry: &DirEntry, exclude_dirs: &[String]) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.') || exclude_dirs.iter().any(|d| d == name))
        .unwrap_or(false)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            extensions
                .iter()
                .any(|wanted| wanted.trim_start_matches('.') == ext)
        })
        .unwrap_or(false)
}

/// The default exclusion set extended with `extra` entries.
pub fn exclusion_set(extra: &[String]) -> Vec<String> {
    let mut dirs: Vec<String> = DEFAULT_EXCLUDES.iter().map(|d| d.to_string()).collect();
    for dir in extra {
        if !dirs.contains(dir) {
            dirs.push(dir.clone());
        }
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_discover_skips_excluded_and_hidden_dirs() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/main.rs");
        touch(dir.path(), "src/util/mod.rs");
        touch(dir.path(), "target/debug/build.rs");
        touch(dir.path(), ".hidden/secret.rs");
        touch(dir.path(), "notes.txt");

        let files = discover(dir.path(), &[".rs"], &exclusion_set(&[]));
        let relative: Vec<PathBuf> = files
            .iter()
            .map(|f| f.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            relative,
            vec![PathBuf::from("src/main.rs"), PathBuf::from("src/util/mod.rs")]
        );
    }

    #[test]
    fn test_discover_honours_extra_exclusions() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "app/a.py");
        touch(dir.path(), "generated/b.py");

        let files = discover(dir.path(), &["py"], &exclusion_set(&["generated".to_string()]));
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("app/a.py"));
    }

    #[test]
    fn test_discover_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let files = discover(&dir.path().join("nope"), &[".rs"], &[]);
        assert!(files.is_empty());
    }
}
