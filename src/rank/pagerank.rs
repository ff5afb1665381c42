use std::collections::HashMap;

use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeRef;

use crate::graph::RepoGraph;

/// Damping factor.
pub const ALPHA: f64 = 0.85;
/// Power-iteration cap.
pub const MAX_ITERATIONS: usize = 100;
/// Convergence tolerance: iteration stops when the L1 delta drops below
/// `TOLERANCE * node_count`.
pub const TOLERANCE: f64 = 1e-6;

/// Personalized PageRank over the whole graph (file and symbol nodes alike).
///
/// `personalization` is an unnormalized teleport weight per node; `None`
/// means uniform. Parallel edges each carry their own share of a node's
/// outgoing mass, and dangling mass teleports along the personalization
/// vector, so scores stay a probability distribution.
pub fn personalized_pagerank(
    graph: &RepoGraph,
    personalization: Option<&HashMap<NodeIndex, f64>>,
) -> HashMap<NodeIndex, f64> {
    let nodes: Vec<NodeIndex> = graph.graph.node_indices().collect();
    let n = nodes.len();
    if n == 0 {
        return HashMap::new();
    }

    let uniform = 1.0 / n as f64;
    let teleport: HashMap<NodeIndex, f64> = match personalization {
        Some(weights) => {
            let total: f64 = nodes
                .iter()
                .map(|idx| weights.get(idx).copied().unwrap_or(0.0))
                .sum();
            if total > 0.0 {
                nodes
                    .iter()
                    .map(|&idx| (idx, weights.get(&idx).copied().unwrap_or(0.0) / total))
                    .collect()
            } else {
                nodes.iter().map(|&idx| (idx, uniform)).collect()
            }
        }
        None => nodes.iter().map(|&idx| (idx, uniform)).collect(),
    };

    let out_degree: HashMap<NodeIndex, usize> = nodes
        .iter()
        .map(|&idx| {
            (
                idx,
                graph.graph.edges_directed(idx, Direction::Outgoing).count(),
            )
        })
        .collect();

    let mut ranks = teleport.clone();

    for _ in 0..MAX_ITERATIONS {
        let mut next: HashMap<NodeIndex, f64> = nodes.iter().map(|&idx| (idx, 0.0)).collect();
        let mut dangling_mass = 0.0;

        for &idx in &nodes {
            let rank = ranks[&idx];
            let degree = out_degree[&idx];
            if degree == 0 {
                dangling_mass += rank;
                continue;
            }
            let share = ALPHA * rank / degree as f64;
            for edge in graph.graph.edges_directed(idx, Direction::Outgoing) {
                *next.get_mut(&edge.target()).expect("target is a graph node") += share;
            }
        }

        for &idx in &nodes {
            let teleport_weight = teleport[&idx];
            *next.get_mut(&idx).expect("node present") +=
                (1.0 - ALPHA) * teleport_weight + ALPHA * dangling_mass * teleport_weight;
        }

        let delta: f64 = nodes
            .iter()
            .map(|idx| (next[idx] - ranks[idx]).abs())
            .sum();
        ranks = next;
        if delta < TOLERANCE * n as f64 {
            break;
        }
    }

    ranks
}
