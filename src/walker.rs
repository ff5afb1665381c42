use std::path::{Path, PathBuf};

use crate::config::RepomapConfig;
use crate::language::Language;

/// A discovered source file: absolute path for I/O, repository-relative POSIX
/// path for everything else.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub abs_path: PathBuf,
    pub rel_path: String,
    pub language: Language,
}

/// Directory names that are never indexed, regardless of configuration.
/// `.repomap` is the index output directory itself.
const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".repomap",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    ".mypy_cache",
    ".pytest_cache",
    "dist",
    "build",
    "out",
    ".next",
    ".cache",
    "coverage",
];

/// Walk the repository and collect source files for all supported languages.
///
/// Respects `.gitignore` rules, always excludes the directories in
/// [`EXCLUDED_DIRS`], and applies any additional exclusion globs from config.
/// Symlinks are not followed. The result is sorted by `rel_path` so every
/// downstream stage sees files in a stable order.
pub fn discover_sources(root: &Path, config: &RepomapConfig) -> anyhow::Result<Vec<SourceFile>> {
    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(true)
        // Read .gitignore files even when the directory is not inside a git
        // repository, so exclusions work for exported trees and test fixtures.
        .require_git(false)
        .build();

    let mut files = Vec::new();

    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!("walk error: {err}");
                continue;
            }
        };

        let path = entry.path();

        if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
            continue;
        }

        if path_has_excluded_component(path) {
            continue;
        }

        if is_excluded_by_config(path, config) {
            continue;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let Some(language) = Language::from_extension(ext) else {
            continue;
        };

        let rel_path = match relative_posix(root, path) {
            Some(rel) => rel,
            None => continue, // outside the root (should not happen from the walk)
        };

        files.push(SourceFile {
            abs_path: path.to_path_buf(),
            rel_path,
            language,
        });
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

/// Compute the repository-relative path of `path` with `/` separators.
pub fn relative_posix(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = rel
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Returns true if any component of `path` is one of the hard-excluded
/// directory names.
fn path_has_excluded_component(path: &Path) -> bool {
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| EXCLUDED_DIRS.contains(&s))
            .unwrap_or(false)
    })
}

/// Returns true if `path` matches any exclusion pattern from config.
fn is_excluded_by_config(path: &Path, config: &RepomapConfig) -> bool {
    let patterns = match &config.exclude {
        Some(p) => p,
        None => return false,
    };

    let path_str = path.to_string_lossy();

    for pattern in patterns {
        if let Ok(matched) = glob::Pattern::new(pattern)
            && matched.matches(&path_str)
        {
            return true;
        }
        // Also check if any single component matches the pattern directly.
        for component in path.components() {
            if let Some(s) = component.as_os_str().to_str()
                && let Ok(matched) = glob::Pattern::new(pattern)
                && matched.matches(s)
            {
                return true;
            }
        }
    }

    false
}
