use std::collections::{BTreeMap, HashMap};

use crate::index::FileRecord;
use crate::parser::TagKind;
use crate::resolver::{ModuleResolver, dirname_posix, join_posix, normalize_posix};

use super::RepoGraph;
use super::edge::{Confidence, EdgeAttrs, Relation, Resolution};
use super::node::{file_node_id, is_test_path, symbol_node_id, SymbolNode};

/// Extensions probed when a candidate path does not name an indexed file
/// directly, in priority order. `.d.ts` last so implementation files win
/// over ambient declarations.
const PROBE_EXTENSIONS: &[&str] = &[
    ".ts", ".tsx", ".mts", ".cts", ".js", ".jsx", ".mjs", ".cjs", ".py", ".d.ts",
];

/// A definition recorded during phase A: enough to find its symbol node again.
#[derive(Debug, Clone)]
struct DefEntry {
    file: String,
    name: String,
    line: usize,
}

/// An import binding after candidate resolution. `owner_file` is `None` when
/// the specifier matched nothing in the index; such bindings still suppress
/// name-match fallback for their local name but emit no edges.
#[derive(Debug, Clone)]
struct ResolvedBinding {
    owner_file: Option<String>,
    local_name: String,
    imported_name: String,
    line: Option<usize>,
}

/// Build the repository graph from the authoritative FileRecord set.
///
/// The graph is a pure function of `records` (plus the resolver's rules):
/// files are processed in sorted path order and edge keys are deterministic,
/// so identical inputs always serialize to an identical graph.
///
/// Three phases:
/// - **A** — file nodes, symbol nodes, `defines` edges, definition indices.
/// - **B** — translate each import binding into zero or more owner files by
///   probing resolver candidates against the index.
/// - **C** — emit `depends_on` for import declarations, then resolve each
///   reference tag through its import binding (which suppresses global
///   name-match for that tag) or through same-name fallback.
pub fn build_graph(
    records: &BTreeMap<String, FileRecord>,
    resolver: Option<&ModuleResolver>,
) -> RepoGraph {
    let mut graph = RepoGraph::new();

    // -----------------------------------------------------------------------
    // Phase A: definitions
    // -----------------------------------------------------------------------
    let mut defs_by_name: HashMap<String, Vec<DefEntry>> = HashMap::new();
    let mut defs_by_file: HashMap<String, HashMap<String, Vec<DefEntry>>> = HashMap::new();

    for (path, record) in records {
        let file_idx = graph.ensure_file(path, record.language, is_test_path(path));

        for tag in record.tags.iter().filter(|t| t.kind == TagKind::Def) {
            let sym_idx = graph.ensure_symbol(SymbolNode {
                name: tag.name.clone(),
                owner_file: path.clone(),
                line: tag.line,
                symbol_type: tag.tag_type.clone(),
            });
            let inserted = graph.add_edge(
                Relation::Defines,
                file_idx,
                sym_idx,
                EdgeAttrs {
                    symbol: tag.name.clone(),
                    local_symbol: None,
                    line: Some(tag.line),
                    owner_file: path.clone(),
                    confidence: Confidence::High,
                    resolution: Resolution::Definition,
                },
            );
            // Overlapping query patterns can tag the same definition twice;
            // index it once.
            if inserted {
                let entry = DefEntry {
                    file: path.clone(),
                    name: tag.name.clone(),
                    line: tag.line,
                };
                defs_by_name
                    .entry(tag.name.clone())
                    .or_default()
                    .push(entry.clone());
                defs_by_file
                    .entry(path.clone())
                    .or_default()
                    .entry(tag.name.clone())
                    .or_default()
                    .push(entry);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Phase B: import resolution
    // -----------------------------------------------------------------------
    let mut bindings_by_file: HashMap<&str, Vec<ResolvedBinding>> = HashMap::new();

    for (path, record) in records {
        let mut resolved = Vec::new();
        for binding in &record.imports {
            resolved.extend(resolve_binding(
                path,
                &binding.local_name,
                &binding.imported_name,
                &binding.module_specifier,
                binding.line,
                records,
                resolver,
            ));
        }
        bindings_by_file.insert(path.as_str(), resolved);
    }

    // -----------------------------------------------------------------------
    // Phase C: edge emission
    // -----------------------------------------------------------------------
    let empty: Vec<ResolvedBinding> = Vec::new();

    for (path, record) in records {
        let Some(file_idx) = graph.node_index(&file_node_id(path)) else {
            continue;
        };
        let source_is_test = is_test_path(path);
        let bindings = bindings_by_file.get(path.as_str()).unwrap_or(&empty);

        // File-level depends_on from every resolved import declaration.
        for binding in bindings {
            let Some(owner) = &binding.owner_file else {
                continue;
            };
            if owner == path {
                continue;
            }
            let Some(owner_idx) = graph.node_index(&file_node_id(owner)) else {
                continue;
            };
            graph.add_edge(
                Relation::DependsOn,
                file_idx,
                owner_idx,
                EdgeAttrs {
                    symbol: binding.imported_name.clone(),
                    local_symbol: Some(binding.local_name.clone()),
                    line: binding.line,
                    owner_file: owner.clone(),
                    confidence: Confidence::ImportOnly,
                    resolution: Resolution::ImportDeclaration,
                },
            );
        }

        // Index this file's bindings by local name for reference lookup.
        let mut by_local: HashMap<&str, Vec<&ResolvedBinding>> = HashMap::new();
        for binding in bindings {
            by_local
                .entry(binding.local_name.as_str())
                .or_default()
                .push(binding);
        }

        for tag in record.tags.iter().filter(|t| t.kind == TagKind::Ref) {
            if let Some(tag_bindings) = by_local.get(tag.name.as_str()) {
                // An import binding exists for this name: resolve only
                // through it. Global name-match is suppressed even when the
                // binding itself is unresolved.
                for binding in tag_bindings {
                    let Some(owner) = &binding.owner_file else {
                        continue;
                    };

                    // A default import re-binds under the local name; `*`
                    // namespaces never match individual definitions.
                    let expected = if binding.imported_name == "default" {
                        tag.name.clone()
                    } else {
                        binding.imported_name.clone()
                    };
                    let no_defs: &[DefEntry] = &[];
                    let defs: &[DefEntry] = if binding.imported_name == "*" {
                        no_defs
                    } else {
                        defs_by_file
                            .get(owner)
                            .and_then(|m| m.get(&expected))
                            .map(Vec::as_slice)
                            .unwrap_or(no_defs)
                    };

                    if defs.is_empty() {
                        if owner != path
                            && let Some(owner_idx) = graph.node_index(&file_node_id(owner))
                        {
                            graph.add_edge(
                                Relation::DependsOn,
                                file_idx,
                                owner_idx,
                                EdgeAttrs {
                                    symbol: expected.clone(),
                                    local_symbol: Some(tag.name.clone()),
                                    line: Some(tag.line),
                                    owner_file: owner.clone(),
                                    confidence: Confidence::ImportOnly,
                                    resolution: Resolution::Import,
                                },
                            );
                        }
                        continue;
                    }

                    for def in defs {
                        let attrs = EdgeAttrs {
                            symbol: expected.clone(),
                            local_symbol: Some(tag.name.clone()),
                            line: Some(tag.line),
                            owner_file: owner.clone(),
                            confidence: Confidence::High,
                            resolution: Resolution::Import,
                        };
                        if let Some(sym_idx) =
                            graph.node_index(&symbol_node_id(&def.file, &def.name, def.line))
                        {
                            graph.add_edge(Relation::References, file_idx, sym_idx, attrs.clone());
                        }
                        if owner != path
                            && let Some(owner_idx) = graph.node_index(&file_node_id(owner))
                        {
                            graph.add_edge(
                                Relation::DependsOn,
                                file_idx,
                                owner_idx,
                                attrs.clone(),
                            );
                            if source_is_test {
                                graph.add_edge(
                                    Relation::TestCovers,
                                    file_idx,
                                    owner_idx,
                                    attrs.clone(),
                                );
                            }
                        }
                    }
                }
            } else if let Some(defs) = defs_by_name.get(&tag.name) {
                // No import binding: global same-name fallback.
                for def in defs {
                    let attrs = EdgeAttrs {
                        symbol: tag.name.clone(),
                        local_symbol: None,
                        line: Some(tag.line),
                        owner_file: def.file.clone(),
                        confidence: Confidence::Fallback,
                        resolution: Resolution::NameMatch,
                    };
                    if let Some(sym_idx) =
                        graph.node_index(&symbol_node_id(&def.file, &def.name, def.line))
                    {
                        graph.add_edge(Relation::References, file_idx, sym_idx, attrs.clone());
                    }
                    if def.file != *path
                        && let Some(owner_idx) = graph.node_index(&file_node_id(&def.file))
                    {
                        graph.add_edge(Relation::DependsOn, file_idx, owner_idx, attrs.clone());
                        if source_is_test {
                            graph.add_edge(Relation::TestCovers, file_idx, owner_idx, attrs.clone());
                        }
                    }
                }
            }
        }
    }

    graph
}

// ---------------------------------------------------------------------------
// Import binding resolution (phase B)
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn resolve_binding(
    source_file: &str,
    local_name: &str,
    imported_name: &str,
    specifier: &str,
    line: Option<usize>,
    records: &BTreeMap<String, FileRecord>,
    resolver: Option<&ModuleResolver>,
) -> Vec<ResolvedBinding> {
    let mut hits: Vec<String> = Vec::new();
    for candidate in candidate_paths(source_file, specifier, resolver) {
        for hit in probe_index(&candidate, records) {
            if !hits.contains(&hit) {
                hits.push(hit);
            }
        }
    }

    if hits.is_empty() {
        return vec![ResolvedBinding {
            owner_file: None,
            local_name: local_name.to_owned(),
            imported_name: imported_name.to_owned(),
            line,
        }];
    }

    hits.into_iter()
        .map(|owner| ResolvedBinding {
            owner_file: Some(owner),
            local_name: local_name.to_owned(),
            imported_name: imported_name.to_owned(),
            line,
        })
        .collect()
}

/// Candidate repo-relative paths for a specifier, before index probing.
fn candidate_paths(
    source_file: &str,
    specifier: &str,
    resolver: Option<&ModuleResolver>,
) -> Vec<String> {
    if specifier.starts_with('.') {
        return vec![join_posix(dirname_posix(source_file), specifier)];
    }

    let mut out = resolver
        .map(|r| r.candidates(specifier))
        .unwrap_or_default();

    // A bare specifier may simply be a repository-relative path.
    let as_rel = normalize_posix(specifier);
    if !as_rel.is_empty() && !out.contains(&as_rel) {
        out.push(as_rel);
    }
    out
}

/// Check a candidate against the index: as-is when it already carries an
/// extension, else with each probe extension appended, then as a directory
/// with `index.<ext>`. Every hit is recorded.
fn probe_index(candidate: &str, records: &BTreeMap<String, FileRecord>) -> Vec<String> {
    if has_extension(candidate) && records.contains_key(candidate) {
        return vec![candidate.to_owned()];
    }

    let mut hits = Vec::new();
    for ext in PROBE_EXTENSIONS {
        let probe = format!("{candidate}{ext}");
        if records.contains_key(&probe) {
            hits.push(probe);
        }
    }
    for ext in PROBE_EXTENSIONS {
        let probe = format!("{candidate}/index{ext}");
        if records.contains_key(&probe) {
            hits.push(probe);
        }
    }
    hits
}

fn has_extension(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .is_some_and(|(stem, _)| !stem.is_empty())
}
