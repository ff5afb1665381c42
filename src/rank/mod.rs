pub mod pagerank;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use petgraph::Direction;
use petgraph::visit::EdgeRef;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::graph::edge::Relation;
use crate::graph::{GraphNode, RepoGraph};
use crate::index::FileRecord;

use pagerank::personalized_pagerank;

// Score weights. Graph centrality dominates; freshness is a light nudge.
const W_PPR: f64 = 0.45;
const W_RISK: f64 = 0.25;
const W_BOUNDARY: f64 = 0.15;
const W_TEST_GAP: f64 = 0.10;
const W_FRESHNESS: f64 = 0.05;

/// Neighbor count at which boundary impact saturates.
const BOUNDARY_SATURATION: f64 = 12.0;

const ONE_WEEK_MS: f64 = 7.0 * 24.0 * 60.0 * 60.0 * 1000.0;

/// Per-file feature vector, each component in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFeatures {
    pub ppr: f64,
    pub risk: f64,
    pub boundary_impact: f64,
    pub test_gap: f64,
    pub freshness: f64,
}

impl FileFeatures {
    /// Placeholder features for a seed file absent from the graph.
    pub fn zeroed() -> Self {
        FileFeatures {
            ppr: 0.0,
            risk: 0.0,
            boundary_impact: 0.0,
            test_gap: 0.0,
            freshness: 0.0,
        }
    }

    fn score(&self) -> f64 {
        W_PPR * self.ppr
            + W_RISK * self.risk
            + W_BOUNDARY * self.boundary_impact
            + W_TEST_GAP * self.test_gap
            + W_FRESHNESS * self.freshness
    }
}

/// A ranked file with its score, features, and human-readable reason tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedFile {
    pub path: String,
    pub score: f64,
    pub features: FileFeatures,
    pub reasons: Vec<String>,
}

/// Rank every file in the graph by relevance to the seed files.
///
/// Seeds receive teleport weight 1.0 and everything else 0.01; with no seeds
/// the teleport distribution is uniform. `now` is injected so repeated calls
/// over the same inputs return identical results.
pub fn rank_files(
    graph: &RepoGraph,
    files: &BTreeMap<String, FileRecord>,
    seeds: &[String],
    top_k: usize,
    now: DateTime<Utc>,
) -> Vec<RankedFile> {
    let seed_set: HashSet<&str> = seeds.iter().map(String::as_str).collect();

    let personalization = if seed_set.is_empty() {
        None
    } else {
        let mut weights = HashMap::new();
        for idx in graph.graph.node_indices() {
            let weight = match &graph.graph[idx] {
                GraphNode::File(f) if seed_set.contains(f.path.as_str()) => 1.0,
                _ => 0.01,
            };
            weights.insert(idx, weight);
        }
        Some(weights)
    };

    let raw_ranks = personalized_pagerank(graph, personalization.as_ref());

    // Min-max normalize PageRank over file nodes only.
    let file_nodes: Vec<(petgraph::stable_graph::NodeIndex, String)> = graph
        .file_nodes()
        .map(|(idx, f)| (idx, f.path.clone()))
        .collect();
    let raw: Vec<f64> = file_nodes
        .iter()
        .map(|(idx, _)| raw_ranks.get(idx).copied().unwrap_or(0.0))
        .collect();
    let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;

    let mut ranked: Vec<RankedFile> = file_nodes
        .iter()
        .zip(raw.iter())
        .map(|((idx, path), &raw_ppr)| {
            let ppr = if spread > f64::EPSILON {
                (raw_ppr - min) / spread
            } else {
                0.5
            };
            let features = FileFeatures {
                ppr,
                risk: risk_score(path),
                boundary_impact: boundary_impact(graph, *idx),
                test_gap: test_gap(graph, *idx, path),
                freshness: freshness(files.get(path), now),
            };
            let reasons = reasons_for(&features);
            RankedFile {
                path: path.clone(),
                score: features.score(),
                features,
                reasons,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
    ranked.truncate(top_k);
    ranked
}

// ---------------------------------------------------------------------------
// Features
// ---------------------------------------------------------------------------

/// Path-based risk heuristic, first match wins.
fn risk_score(path: &str) -> f64 {
    static RULES: OnceLock<Vec<(Regex, f64)>> = OnceLock::new();
    let rules = RULES.get_or_init(|| {
        vec![
            (
                Regex::new(r"auth|permission|acl|policy|security").expect("static regex"),
                1.0,
            ),
            (
                Regex::new(r"payment|billing|invoice|money|wallet").expect("static regex"),
                0.95,
            ),
            (
                Regex::new(r"migration|schema|db|database|sql|model").expect("static regex"),
                0.85,
            ),
            (
                Regex::new(r"api|route|controller|handler").expect("static regex"),
                0.7,
            ),
            (Regex::new(r"test|spec").expect("static regex"), 0.25),
        ]
    });

    let lowered = path.to_lowercase();
    for (pattern, score) in rules {
        if pattern.is_match(&lowered) {
            return *score;
        }
    }
    0.45
}

/// Unique file-node neighbors over any in- or out-edge, saturating at
/// [`BOUNDARY_SATURATION`].
fn boundary_impact(graph: &RepoGraph, idx: petgraph::stable_graph::NodeIndex) -> f64 {
    let mut neighbors: HashSet<petgraph::stable_graph::NodeIndex> = HashSet::new();
    for direction in [Direction::Outgoing, Direction::Incoming] {
        for edge in graph.graph.edges_directed(idx, direction) {
            let other = if direction == Direction::Outgoing {
                edge.target()
            } else {
                edge.source()
            };
            if other != idx && matches!(graph.graph[other], GraphNode::File(_)) {
                neighbors.insert(other);
            }
        }
    }
    (neighbors.len() as f64 / BOUNDARY_SATURATION).clamp(0.0, 1.0)
}

fn test_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"test|spec").expect("static regex"))
}

/// Suspicion that the file lacks test coverage. Test files themselves score
/// low; covered files slightly higher; everything else high.
fn test_gap(graph: &RepoGraph, idx: petgraph::stable_graph::NodeIndex, path: &str) -> f64 {
    if test_path_re().is_match(&path.to_lowercase()) {
        return 0.2;
    }
    let covered = graph
        .graph
        .edges_directed(idx, Direction::Incoming)
        .any(|e| {
            e.weight().relation == Relation::TestCovers
                && matches!(graph.graph[e.source()], GraphNode::File(_))
        });
    if covered { 0.1 } else { 0.9 }
}

/// Linear one-week decay from the last parse time. A missing timestamp scores
/// zero; an unparseable one gets a neutral-low 0.4.
fn freshness(record: Option<&FileRecord>, now: DateTime<Utc>) -> f64 {
    let Some(stamp) = record.and_then(|r| r.last_parsed_at.as_deref()) else {
        return 0.0;
    };
    let Ok(parsed) = DateTime::parse_from_rfc3339(stamp) else {
        return 0.4;
    };
    let age_ms = (now - parsed.with_timezone(&Utc)).num_milliseconds() as f64;
    (1.0 - age_ms / ONE_WEEK_MS).clamp(0.0, 1.0)
}

fn reasons_for(features: &FileFeatures) -> Vec<String> {
    let mut reasons = Vec::new();
    if features.ppr >= 0.7 {
        reasons.push("high-graph-relevance".to_owned());
    }
    if features.risk >= 0.8 {
        reasons.push("high-risk-path".to_owned());
    }
    if features.boundary_impact >= 0.6 {
        reasons.push("cross-module-impact".to_owned());
    }
    if features.test_gap >= 0.7 {
        reasons.push("test-gap-suspected".to_owned());
    }
    if features.freshness <= 0.3 {
        reasons.push("stale-index-signal".to_owned());
    }
    if reasons.is_empty() {
        reasons.push("baseline-score".to_owned());
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::builder::build_graph;
    use crate::graph::node::file_node_id;
    use crate::index::content_hash;
    use crate::language::Language;
    use crate::parser::parse_source;

    fn record_with_stamp(rel: &str, source: &str, stamp: Option<&str>) -> (String, FileRecord) {
        let ext = rel.rsplit('.').next().unwrap();
        let language = Language::from_extension(ext).unwrap();
        let output = parse_source(rel, language, source.as_bytes()).unwrap();
        (
            rel.to_owned(),
            FileRecord {
                hash: content_hash(source.as_bytes()),
                language,
                tags: output.tags,
                imports: output.imports,
                last_parsed_at: stamp.map(str::to_owned),
            },
        )
    }

    fn fixture() -> (RepoGraph, BTreeMap<String, FileRecord>) {
        let files: BTreeMap<String, FileRecord> = [
            record_with_stamp(
                "src/auth/service.ts",
                "export function checkAccess(u: string) { return u.length > 0; }\n",
                Some("2025-01-01T00:00:00+00:00"),
            ),
            record_with_stamp(
                "src/app/main.ts",
                "import { checkAccess } from '../auth/service';\ncheckAccess('root');\n",
                Some("2025-01-01T00:00:00+00:00"),
            ),
            record_with_stamp(
                "__tests__/service.test.ts",
                "import { checkAccess } from '../src/auth/service';\ncheckAccess('x');\n",
                Some("2025-01-01T00:00:00+00:00"),
            ),
        ]
        .into_iter()
        .collect();
        let graph = build_graph(&files, None);
        (graph, files)
    }

    fn fixed_now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-02T00:00:00+00:00")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_risk_cascade_first_match_wins() {
        assert_eq!(risk_score("src/auth/login.ts"), 1.0);
        assert_eq!(risk_score("src/billing/invoice.ts"), 0.95);
        assert_eq!(risk_score("db/migrations/001.py"), 0.85);
        assert_eq!(risk_score("src/api/users.ts"), 0.7);
        assert_eq!(risk_score("src/util.test.ts"), 0.25);
        assert_eq!(risk_score("src/render.ts"), 0.45);
        // auth outranks the later api row even when both match
        assert_eq!(risk_score("src/api/auth.ts"), 1.0);
    }

    #[test]
    fn test_rank_scores_bounded_and_sorted() {
        let (graph, files) = fixture();
        let seeds = vec!["src/app/main.ts".to_owned()];
        let ranked = rank_files(&graph, &files, &seeds, 10, fixed_now());

        assert!(!ranked.is_empty());
        let max_score = W_PPR + W_RISK + W_BOUNDARY + W_TEST_GAP + W_FRESHNESS;
        for file in &ranked {
            for feature in [
                file.features.ppr,
                file.features.risk,
                file.features.boundary_impact,
                file.features.test_gap,
                file.features.freshness,
            ] {
                assert!((0.0..=1.0).contains(&feature), "feature out of range: {file:?}");
            }
            assert!((0.0..=max_score).contains(&file.score));
            assert!(!file.reasons.is_empty());
        }
        for pair in ranked.windows(2) {
            assert!(pair[0].score >= pair[1].score, "ranking must be sorted");
        }
    }

    #[test]
    fn test_rank_is_idempotent() {
        let (graph, files) = fixture();
        let seeds = vec!["src/app/main.ts".to_owned()];
        let first = rank_files(&graph, &files, &seeds, 10, fixed_now());
        let second = rank_files(&graph, &files, &seeds, 10, fixed_now());
        assert_eq!(first, second);
    }

    #[test]
    fn test_seeded_dependency_ranks_above_unrelated() {
        let mut entries = vec![
            record_with_stamp(
                "src/core/engine.ts",
                "export function run() {}\n",
                None,
            ),
            record_with_stamp(
                "src/app/main.ts",
                "import { run } from '../core/engine';\nrun();\n",
                None,
            ),
            record_with_stamp("src/orphan/loner.ts", "export function lonely() {}\n", None),
        ];
        let files: BTreeMap<String, FileRecord> = entries.drain(..).collect();
        let graph = build_graph(&files, None);
        let ranked = rank_files(
            &graph,
            &files,
            &["src/app/main.ts".to_owned()],
            10,
            fixed_now(),
        );

        let position = |path: &str| ranked.iter().position(|r| r.path == path).unwrap();
        assert!(
            position("src/core/engine.ts") < position("src/orphan/loner.ts"),
            "seed dependency should outrank unrelated file: {ranked:?}"
        );
    }

    #[test]
    fn test_ppr_degenerate_spread_is_half() {
        // Two files, no edges, no seeds: identical PageRank everywhere.
        let files: BTreeMap<String, FileRecord> = [
            record_with_stamp("a.ts", "export const a = 1;\n", None),
            record_with_stamp("b.ts", "export const b = 2;\n", None),
        ]
        .into_iter()
        .collect();
        let graph = build_graph(&files, None);
        let ranked = rank_files(&graph, &files, &[], 10, fixed_now());
        for file in &ranked {
            assert!((file.features.ppr - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_test_gap_levels() {
        let (graph, _files) = fixture();
        let covered = graph
            .node_index(&file_node_id("src/auth/service.ts"))
            .unwrap();
        assert_eq!(test_gap(&graph, covered, "src/auth/service.ts"), 0.1);

        let test_file = graph
            .node_index(&file_node_id("__tests__/service.test.ts"))
            .unwrap();
        assert_eq!(test_gap(&graph, test_file, "__tests__/service.test.ts"), 0.2);

        let uncovered = graph.node_index(&file_node_id("src/app/main.ts")).unwrap();
        assert_eq!(test_gap(&graph, uncovered, "src/app/main.ts"), 0.9);
    }

    #[test]
    fn test_freshness_cases() {
        let now = fixed_now();
        assert_eq!(freshness(None, now), 0.0);

        let (_, missing) = record_with_stamp("a.ts", "export const a = 1;\n", None);
        assert_eq!(freshness(Some(&missing), now), 0.0);

        let (_, garbled) = record_with_stamp("a.ts", "export const a = 1;\n", Some("not-a-date"));
        assert_eq!(freshness(Some(&garbled), now), 0.4);

        // One day old: 1 - 1/7.
        let (_, recent) =
            record_with_stamp("a.ts", "export const a = 1;\n", Some("2025-01-01T00:00:00+00:00"));
        let value = freshness(Some(&recent), now);
        assert!((value - (1.0 - 1.0 / 7.0)).abs() < 1e-9);

        // Ancient: clamps to zero.
        let (_, old) =
            record_with_stamp("a.ts", "export const a = 1;\n", Some("2020-01-01T00:00:00+00:00"));
        assert_eq!(freshness(Some(&old), now), 0.0);
    }

    #[test]
    fn test_reasons_thresholds() {
        let reasons = reasons_for(&FileFeatures {
            ppr: 0.9,
            risk: 0.85,
            boundary_impact: 0.7,
            test_gap: 0.9,
            freshness: 0.1,
        });
        assert_eq!(
            reasons,
            vec![
                "high-graph-relevance",
                "high-risk-path",
                "cross-module-impact",
                "test-gap-suspected",
                "stale-index-signal",
            ]
        );

        let baseline = reasons_for(&FileFeatures {
            ppr: 0.5,
            risk: 0.45,
            boundary_impact: 0.1,
            test_gap: 0.1,
            freshness: 0.9,
        });
        assert_eq!(baseline, vec!["baseline-score"]);
    }
}
