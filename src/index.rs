use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::language::Language;
use crate::parser::{self, ImportBinding, Tag};
use crate::walker::SourceFile;

/// Per-file cached parse result. Lives across runs via `state.json`; replaced
/// only when the content hash changes, dropped when the file disappears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub hash: String,
    pub language: Language,
    pub tags: Vec<Tag>,
    pub imports: Vec<ImportBinding>,
    /// RFC 3339 timestamp of the last actual parse. Kept as text so legacy or
    /// hand-edited state files degrade to a freshness penalty, not an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_parsed_at: Option<String>,
}

/// Result of refreshing the index against the discovered source set.
#[derive(Debug, Default)]
pub struct RefreshOutcome {
    pub files: BTreeMap<String, FileRecord>,
    pub parsed_files: usize,
    pub reused_files: usize,
    /// Files skipped because they could not be read or parsed.
    pub skipped_files: usize,
}

/// Stable content fingerprint (SHA-256, lowercase hex).
pub fn content_hash(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

enum Refresh {
    Reused(FileRecord),
    Parsed(FileRecord),
    Failed,
}

/// Bring the index up to date for the given source files.
///
/// Each file is read and hashed; a cached record with a matching hash is
/// reused verbatim, anything else is re-parsed. Read/parse is the only
/// parallel stage (rayon workers with thread-local parsers); the merge is
/// sequential and ordered by the already-sorted source list, so the outcome
/// is independent of worker completion order.
///
/// A file that fails to read or parse is skipped with a warning; its previous
/// record (when one exists) is retained so a transient error does not erase
/// known structure.
pub fn refresh_index(
    sources: &[SourceFile],
    previous: &BTreeMap<String, FileRecord>,
) -> RefreshOutcome {
    let results: Vec<(String, Refresh)> = sources
        .par_iter()
        .map(|sf| (sf.rel_path.clone(), refresh_one(sf, previous)))
        .collect();

    let mut outcome = RefreshOutcome::default();
    for (rel_path, result) in results {
        match result {
            Refresh::Reused(record) => {
                outcome.reused_files += 1;
                outcome.files.insert(rel_path, record);
            }
            Refresh::Parsed(record) => {
                outcome.parsed_files += 1;
                outcome.files.insert(rel_path, record);
            }
            Refresh::Failed => {
                outcome.skipped_files += 1;
                if let Some(old) = previous.get(&rel_path) {
                    outcome.files.insert(rel_path, old.clone());
                }
            }
        }
    }

    outcome
}

fn refresh_one(sf: &SourceFile, previous: &BTreeMap<String, FileRecord>) -> Refresh {
    let content = match std::fs::read(&sf.abs_path) {
        Ok(c) => c,
        Err(err) => {
            tracing::warn!("skipping {}: {err}", sf.rel_path);
            return Refresh::Failed;
        }
    };

    let hash = content_hash(&content);
    if let Some(cached) = previous.get(&sf.rel_path)
        && cached.hash == hash
    {
        return Refresh::Reused(cached.clone());
    }

    match parser::parse_source(&sf.rel_path, sf.language, &content) {
        Ok(output) => Refresh::Parsed(FileRecord {
            hash,
            language: sf.language,
            tags: output.tags,
            imports: output.imports,
            last_parsed_at: Some(Utc::now().to_rfc3339()),
        }),
        Err(err) => {
            tracing::warn!("skipping {}: {err}", sf.rel_path);
            Refresh::Failed
        }
    }
}
