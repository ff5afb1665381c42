use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};

/// Source of changed/deleted paths for the incremental driver.
///
/// Implementations return repository-relative POSIX paths. A trait seam so
/// tests can drive incremental updates without a git checkout.
pub trait DiffSource {
    /// Paths changed (added, copied, modified, renamed) in the range, or in
    /// the working tree when `range` is `None`.
    fn changed(&self, root: &Path, range: Option<&str>) -> Result<Vec<String>>;
    /// Paths deleted in the range or working tree.
    fn deleted(&self, root: &Path, range: Option<&str>) -> Result<Vec<String>>;
}

/// Diff retrieval backed by the `git` CLI.
///
/// A root that is not a git repository degrades to empty change sets with a
/// warning; the driver then only picks up files new to discovery.
pub struct GitDiffSource;

impl GitDiffSource {
    fn name_only(&self, root: &Path, range: Option<&str>, filter: &str) -> Result<Vec<String>> {
        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(root)
            .args(["diff", "--name-only", filter]);
        match range {
            Some(range) => {
                cmd.arg(range);
            }
            None => {
                cmd.arg("HEAD");
            }
        }

        let output = cmd.output().context("failed to invoke git")?;
        if !output.status.success() {
            tracing::warn!(
                "git diff failed under {} ({}); treating change set as empty",
                root.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(Vec::new());
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| l.replace('\\', "/"))
            .collect())
    }
}

impl DiffSource for GitDiffSource {
    fn changed(&self, root: &Path, range: Option<&str>) -> Result<Vec<String>> {
        self.name_only(root, range, "--diff-filter=ACMR")
    }

    fn deleted(&self, root: &Path, range: Option<&str>) -> Result<Vec<String>> {
        self.name_only(root, range, "--diff-filter=D")
    }
}

/// A fixed change set, used by tests and by callers that already know the
/// changed paths.
#[derive(Debug, Default, Clone)]
pub struct StaticDiffSource {
    pub changed: Vec<String>,
    pub deleted: Vec<String>,
}

impl DiffSource for StaticDiffSource {
    fn changed(&self, _root: &Path, _range: Option<&str>) -> Result<Vec<String>> {
        Ok(self.changed.clone())
    }

    fn deleted(&self, _root: &Path, _range: Option<&str>) -> Result<Vec<String>> {
        Ok(self.deleted.clone())
    }
}
