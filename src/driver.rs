use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::Result;
use thiserror::Error;

use crate::config::RepomapConfig;
use crate::diff::DiffSource;
use crate::graph::RepoGraph;
use crate::graph::builder::build_graph;
use crate::index::{RefreshOutcome, refresh_index};
use crate::resolver::ModuleResolver;
use crate::store::{self, StateFile};
use crate::walker::{SourceFile, discover_sources};

/// The result of a build or update run: the rebuilt graph, the persisted
/// state, and parse accounting for the summary.
pub struct BuildOutcome {
    pub graph: RepoGraph,
    pub state: StateFile,
    pub parsed_files: usize,
    pub reused_files: usize,
    pub skipped_files: usize,
}

/// Raised when ranking is requested before any index exists.
#[derive(Debug, Error)]
#[error("no index found under {root} — run `repomap build` first")]
pub struct MissingIndexError {
    pub root: String,
}

/// Discover every source file, refresh the index, build, and persist.
///
/// Records from a previous run are reused on matching content hash. A
/// corrupt state file is the one condition `build` recovers from by itself:
/// it warns and starts over, since rebuilding is exactly what was asked for.
pub fn full_build(root: &Path, config: &RepomapConfig) -> Result<BuildOutcome> {
    let sources = discover_sources(root, config)?;
    let previous = match store::load_state(root) {
        Ok(Some(state)) => state.files,
        Ok(None) => BTreeMap::new(),
        Err(err) => {
            tracing::warn!("previous state unreadable ({err}); rebuilding from scratch");
            BTreeMap::new()
        }
    };
    let refreshed = refresh_index(&sources, &previous);
    finish(root, refreshed)
}

/// Incremental path: re-parse only files that changed or are new to
/// discovery, drop records for files that disappeared or were deleted, then
/// rebuild the graph from the merged record set. With no previous state this
/// degrades to a full build.
pub fn incremental_update(
    root: &Path,
    config: &RepomapConfig,
    range: Option<&str>,
    diff: &dyn DiffSource,
) -> Result<BuildOutcome> {
    let Some(previous) = store::load_state(root)? else {
        return full_build(root, config);
    };

    let sources = discover_sources(root, config)?;
    let changed: HashSet<String> = diff.changed(root, range)?.into_iter().collect();
    let deleted: HashSet<String> = diff.deleted(root, range)?.into_iter().collect();

    let candidates: Vec<SourceFile> = sources
        .iter()
        .filter(|s| changed.contains(&s.rel_path) || !previous.files.contains_key(&s.rel_path))
        .cloned()
        .collect();

    // Keep records that are still discovered and not reported deleted.
    let discovered: HashSet<&str> = sources.iter().map(|s| s.rel_path.as_str()).collect();
    let mut merged: BTreeMap<_, _> = previous
        .files
        .into_iter()
        .filter(|(path, _)| discovered.contains(path.as_str()) && !deleted.contains(path))
        .collect();

    let refreshed = refresh_index(&candidates, &merged);
    let parsed_files = refreshed.parsed_files;
    let skipped_files = refreshed.skipped_files;
    for (path, record) in refreshed.files {
        merged.insert(path, record);
    }

    let reused_files = merged.len().saturating_sub(parsed_files);
    finish(
        root,
        RefreshOutcome {
            files: merged,
            parsed_files,
            reused_files,
            skipped_files,
        },
    )
}

/// Load the persisted state and graph for ranking. Absence of either artifact
/// is the user-facing "build first" condition; corrupt artifacts propagate as
/// store errors.
pub fn load_index(root: &Path) -> Result<(StateFile, RepoGraph)> {
    let missing = || MissingIndexError {
        root: store::index_dir(root).display().to_string(),
    };
    let state = store::load_state(root)?.ok_or_else(missing)?;
    let model = store::load_graph(root)?.ok_or_else(missing)?;
    let graph = RepoGraph::from_model(&model)?;
    Ok((state, graph))
}

fn finish(root: &Path, refreshed: RefreshOutcome) -> Result<BuildOutcome> {
    let resolver = ModuleResolver::load(root);
    let graph = build_graph(&refreshed.files, resolver.as_ref());

    let state = StateFile::new(root, refreshed.files);
    store::save_state(root, &state)?;
    store::save_graph(root, &graph.to_model())?;

    Ok(BuildOutcome {
        graph,
        state,
        parsed_files: refreshed.parsed_files,
        reused_files: refreshed.reused_files,
        skipped_files: refreshed.skipped_files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::StaticDiffSource;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn graph_json(graph: &RepoGraph) -> String {
        serde_json::to_string(&graph.to_model()).unwrap()
    }

    #[test]
    fn test_full_build_persists_artifacts() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/a.ts", "export function a() {}\n");
        write(
            dir.path(),
            "src/b.ts",
            "import { a } from './a';\na();\n",
        );

        let outcome = full_build(dir.path(), &RepomapConfig::default()).unwrap();
        assert_eq!(outcome.parsed_files, 2);
        assert_eq!(outcome.graph.file_count(), 2);
        assert!(store::state_path(dir.path()).exists());
        assert!(store::graph_path(dir.path()).exists());
    }

    #[test]
    fn test_update_without_state_is_full_build() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.ts", "export const a = 1;\n");

        let diff = StaticDiffSource::default();
        let outcome =
            incremental_update(dir.path(), &RepomapConfig::default(), None, &diff).unwrap();
        assert_eq!(outcome.parsed_files, 1);
    }

    #[test]
    fn test_update_reparses_only_changed() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.ts", "export function one() {}\n");
        write(dir.path(), "b.ts", "export function two() {}\n");
        full_build(dir.path(), &RepomapConfig::default()).unwrap();

        write(dir.path(), "b.ts", "export function twotwo() {}\n");
        let diff = StaticDiffSource {
            changed: vec!["b.ts".to_owned()],
            deleted: vec![],
        };
        let outcome =
            incremental_update(dir.path(), &RepomapConfig::default(), None, &diff).unwrap();
        assert_eq!(outcome.parsed_files, 1, "only b.ts should re-parse");
        assert_eq!(outcome.reused_files, 1);
        assert!(
            outcome.state.files["b.ts"].tags.iter().any(|t| t.name == "twotwo"),
            "updated record should carry the new symbol"
        );
    }

    #[test]
    fn test_update_equals_full_rebuild() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "core.ts", "export function boot() {}\n");
        write(dir.path(), "app.ts", "import { boot } from './core';\nboot();\n");
        full_build(dir.path(), &RepomapConfig::default()).unwrap();

        // Change one file, add one, delete one (core survives).
        write(dir.path(), "app.ts", "import { boot } from './core';\nboot();\nboot();\n");
        write(dir.path(), "extra.ts", "export function extra() {}\n");

        let diff = StaticDiffSource {
            changed: vec!["app.ts".to_owned()],
            deleted: vec![],
        };
        let incremental =
            incremental_update(dir.path(), &RepomapConfig::default(), None, &diff).unwrap();

        // From-scratch build of the same tree must produce the same graph.
        let scratch = {
            fs::remove_dir_all(store::index_dir(dir.path())).unwrap();
            full_build(dir.path(), &RepomapConfig::default()).unwrap()
        };
        assert_eq!(graph_json(&incremental.graph), graph_json(&scratch.graph));
    }

    #[test]
    fn test_update_drops_deleted_and_missing_files() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "keep.ts", "export function keep() {}\n");
        write(dir.path(), "gone.ts", "export function gone() {}\n");
        write(dir.path(), "vanished.ts", "export function vanished() {}\n");
        full_build(dir.path(), &RepomapConfig::default()).unwrap();

        // `gone.ts` is reported deleted by the diff source; `vanished.ts`
        // simply disappears from discovery.
        fs::remove_file(dir.path().join("gone.ts")).unwrap();
        fs::remove_file(dir.path().join("vanished.ts")).unwrap();
        let diff = StaticDiffSource {
            changed: vec![],
            deleted: vec!["gone.ts".to_owned()],
        };
        let outcome =
            incremental_update(dir.path(), &RepomapConfig::default(), None, &diff).unwrap();

        assert!(outcome.state.files.contains_key("keep.ts"));
        assert!(!outcome.state.files.contains_key("gone.ts"));
        assert!(!outcome.state.files.contains_key("vanished.ts"));
        assert_eq!(outcome.graph.file_count(), 1);
    }

    #[test]
    fn test_load_index_missing_is_instructive() {
        let dir = TempDir::new().unwrap();
        let err = load_index(dir.path()).unwrap_err();
        assert!(err.to_string().contains("repomap build"), "got: {err}");
    }

    #[test]
    fn test_load_index_roundtrip() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.ts", "export function a() {}\n");
        let built = full_build(dir.path(), &RepomapConfig::default()).unwrap();

        let (state, graph) = load_index(dir.path()).unwrap();
        assert_eq!(state.files.len(), 1);
        assert_eq!(graph_json(&graph), graph_json(&built.graph));
    }
}
