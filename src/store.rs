use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::GraphModel;
use crate::index::FileRecord;

/// Index directory created under the repository root.
pub const INDEX_DIR: &str = ".repomap";
/// The authoritative per-file parse records.
pub const STATE_FILE: &str = "state.json";
/// The serialized dependency graph.
pub const GRAPH_FILE: &str = "graph.json";
/// Bump when the state layout changes incompatibly.
pub const STATE_VERSION: u32 = 1;

/// Persistence failures. An absent artifact is `Ok(None)` on load, never an
/// error; corrupt JSON is surfaced so the caller can decide between a full
/// rebuild and aborting.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON in {path}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// `state.json`: the input every build and ranking run starts from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateFile {
    pub version: u32,
    /// RFC 3339 timestamp of the run that produced this state.
    pub generated_at: String,
    pub repo_root: String,
    pub files: BTreeMap<String, FileRecord>,
}

impl StateFile {
    pub fn new(repo_root: &Path, files: BTreeMap<String, FileRecord>) -> Self {
        StateFile {
            version: STATE_VERSION,
            generated_at: Utc::now().to_rfc3339(),
            repo_root: repo_root.to_string_lossy().into_owned(),
            files,
        }
    }
}

pub fn index_dir(root: &Path) -> PathBuf {
    root.join(INDEX_DIR)
}

pub fn state_path(root: &Path) -> PathBuf {
    index_dir(root).join(STATE_FILE)
}

pub fn graph_path(root: &Path) -> PathBuf {
    index_dir(root).join(GRAPH_FILE)
}

pub fn save_state(root: &Path, state: &StateFile) -> Result<(), StoreError> {
    write_json(&state_path(root), state)
}

pub fn load_state(root: &Path) -> Result<Option<StateFile>, StoreError> {
    read_json(&state_path(root))
}

pub fn save_graph(root: &Path, model: &GraphModel) -> Result<(), StoreError> {
    write_json(&graph_path(root), model)
}

pub fn load_graph(root: &Path) -> Result<Option<GraphModel>, StoreError> {
    read_json(&graph_path(root))
}

/// Write via a temp file in the target directory, then rename into place, so
/// a crash mid-write never leaves a torn artifact behind.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(&mut tmp, value).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    tmp.as_file().flush().map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tmp.persist(path).map_err(|err| StoreError::Io {
        path: path.to_path_buf(),
        source: err.error,
    })?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, StoreError> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let value = serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RepoGraph;
    use crate::language::Language;
    use tempfile::TempDir;

    fn sample_state(root: &Path) -> StateFile {
        let mut files = BTreeMap::new();
        files.insert(
            "src/a.ts".to_owned(),
            FileRecord {
                hash: "cafe".into(),
                language: Language::TypeScript,
                tags: Vec::new(),
                imports: Vec::new(),
                last_parsed_at: Some("2025-06-01T12:00:00+00:00".into()),
            },
        );
        StateFile::new(root, files)
    }

    #[test]
    fn test_state_roundtrip() {
        let dir = TempDir::new().unwrap();
        let state = sample_state(dir.path());
        save_state(dir.path(), &state).unwrap();

        let loaded = load_state(dir.path()).unwrap().expect("state should exist");
        assert_eq!(loaded.version, STATE_VERSION);
        assert_eq!(loaded.files.len(), 1);
        assert_eq!(loaded.files["src/a.ts"].hash, "cafe");
    }

    #[test]
    fn test_state_json_uses_camel_case_keys() {
        let dir = TempDir::new().unwrap();
        save_state(dir.path(), &sample_state(dir.path())).unwrap();
        let raw = std::fs::read_to_string(state_path(dir.path())).unwrap();
        assert!(raw.contains("\"generatedAt\""));
        assert!(raw.contains("\"repoRoot\""));
        assert!(raw.contains("\"lastParsedAt\""));
    }

    #[test]
    fn test_load_absent_is_none_not_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_state(dir.path()).unwrap().is_none());
        assert!(load_graph(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_corrupt_is_error() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(index_dir(dir.path())).unwrap();
        std::fs::write(state_path(dir.path()), "{ broken").unwrap();
        match load_state(dir.path()) {
            Err(StoreError::Corrupt { .. }) => {}
            other => panic!("expected Corrupt error, got {other:?}"),
        }
    }

    #[test]
    fn test_graph_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut graph = RepoGraph::new();
        graph.ensure_file("src/a.ts", Language::TypeScript, false);
        let model = graph.to_model();

        save_graph(dir.path(), &model).unwrap();
        let loaded = load_graph(dir.path()).unwrap().expect("graph should exist");
        assert_eq!(loaded, model);
    }
}
