pub mod builder;
pub mod edge;
pub mod node;

use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, bail};
use petgraph::Directed;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use serde::{Deserialize, Serialize};

use crate::language::Language;
use edge::{EdgeAttrs, GraphEdge, Relation, edge_key};
pub use node::{FileNode, GraphNode, SymbolNode};

/// The in-memory repository graph: a petgraph multigraph with a stable
/// string-key index over nodes and a key set that deduplicates edges.
///
/// Nodes and edges are rebuilt from scratch from the authoritative FileRecord
/// set on every build or update; nothing is mutated in place across runs.
#[derive(Debug)]
pub struct RepoGraph {
    pub graph: StableGraph<GraphNode, GraphEdge, Directed>,
    /// Node key → index for O(1) lookup.
    node_ids: HashMap<String, NodeIndex>,
    /// Keys of every edge added so far; duplicate keys are silently dropped.
    edge_keys: HashSet<String>,
}

impl RepoGraph {
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            node_ids: HashMap::new(),
            edge_keys: HashSet::new(),
        }
    }

    /// Add a file node, returning the existing index when already present.
    pub fn ensure_file(&mut self, path: &str, language: Language, is_test: bool) -> NodeIndex {
        let id = node::file_node_id(path);
        if let Some(&idx) = self.node_ids.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(GraphNode::File(FileNode {
            path: path.to_owned(),
            language,
            is_test,
        }));
        self.node_ids.insert(id, idx);
        idx
    }

    /// Add a symbol node, returning the existing index when an identical
    /// definition (same owner, name, and line) was already added.
    pub fn ensure_symbol(&mut self, symbol: SymbolNode) -> NodeIndex {
        let id = node::symbol_node_id(&symbol.owner_file, &symbol.name, symbol.line);
        if let Some(&idx) = self.node_ids.get(&id) {
            return idx;
        }
        let idx = self.graph.add_node(GraphNode::Symbol(symbol));
        self.node_ids.insert(id, idx);
        idx
    }

    /// Add an edge unless an edge with the identical key exists. Returns true
    /// when the edge was inserted.
    pub fn add_edge(
        &mut self,
        relation: Relation,
        source: NodeIndex,
        target: NodeIndex,
        attrs: EdgeAttrs,
    ) -> bool {
        let key = edge_key(
            relation,
            &self.graph[source].id(),
            &self.graph[target].id(),
            &attrs,
        );
        if !self.edge_keys.insert(key) {
            return false;
        }
        self.graph
            .add_edge(source, target, GraphEdge { relation, attrs });
        true
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.node_ids.get(id).copied()
    }

    /// All file nodes with their indices.
    pub fn file_nodes(&self) -> impl Iterator<Item = (NodeIndex, &FileNode)> {
        self.graph.node_indices().filter_map(|idx| match &self.graph[idx] {
            GraphNode::File(f) => Some((idx, f)),
            GraphNode::Symbol(_) => None,
        })
    }

    pub fn file_count(&self) -> usize {
        self.file_nodes().count()
    }

    pub fn symbol_count(&self) -> usize {
        self.graph.node_count() - self.file_count()
    }

    /// Iterate every edge as `(source, target, value)`.
    pub fn edge_triples(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, &GraphEdge)> {
        self.graph.edge_indices().filter_map(|idx| {
            let (source, target) = self.graph.edge_endpoints(idx)?;
            Some((source, target, &self.graph[idx]))
        })
    }

    /// Edge counts broken down by relation, for summaries.
    pub fn relation_counts(&self) -> HashMap<Relation, usize> {
        let mut counts = HashMap::new();
        for (_, _, edge) in self.edge_triples() {
            *counts.entry(edge.relation).or_insert(0) += 1;
        }
        counts
    }

    // -----------------------------------------------------------------------
    // Serial model
    // -----------------------------------------------------------------------

    /// Produce the serializable model: nodes and edges sorted by key, so the
    /// serialized graph is byte-stable for identical inputs.
    pub fn to_model(&self) -> GraphModel {
        let mut nodes: Vec<NodeModel> = self
            .graph
            .node_indices()
            .map(|idx| {
                let node = &self.graph[idx];
                NodeModel {
                    key: node.id(),
                    attributes: match node.clone() {
                        GraphNode::File(f) => NodeAttrs::File(f),
                        GraphNode::Symbol(s) => NodeAttrs::Symbol(s),
                    },
                }
            })
            .collect();
        nodes.sort_by(|a, b| a.key.cmp(&b.key));

        let mut edges: Vec<EdgeModel> = self
            .edge_triples()
            .map(|(source_idx, target_idx, weight)| {
                let source = self.graph[source_idx].id();
                let target = self.graph[target_idx].id();
                EdgeModel {
                    key: edge_key(weight.relation, &source, &target, &weight.attrs),
                    source,
                    target,
                    attributes: weight.attrs.clone(),
                }
            })
            .collect();
        edges.sort_by(|a, b| a.key.cmp(&b.key));

        GraphModel { nodes, edges }
    }

    /// Rebuild a graph from its serialized model. The edge relation is
    /// recovered from the key prefix.
    pub fn from_model(model: &GraphModel) -> anyhow::Result<RepoGraph> {
        let mut graph = RepoGraph::new();

        for node in &model.nodes {
            match &node.attributes {
                NodeAttrs::File(f) => {
                    graph.ensure_file(&f.path, f.language, f.is_test);
                }
                NodeAttrs::Symbol(s) => {
                    graph.ensure_symbol(s.clone());
                }
            }
        }

        for edge in &model.edges {
            let relation = relation_from_key(&edge.key)
                .ok_or_else(|| anyhow!("edge key {:?} has no known relation", edge.key))?;
            let source = graph
                .node_index(&edge.source)
                .ok_or_else(|| anyhow!("edge {:?} references missing node {:?}", edge.key, edge.source))?;
            let target = graph
                .node_index(&edge.target)
                .ok_or_else(|| anyhow!("edge {:?} references missing node {:?}", edge.key, edge.target))?;
            graph.add_edge(relation, source, target, edge.attributes.clone());
        }

        if graph.graph.edge_count() != model.edges.len() {
            bail!("serialized graph carries duplicate edge keys");
        }

        Ok(graph)
    }
}

impl Default for RepoGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn relation_from_key(key: &str) -> Option<Relation> {
    match key.split('|').next()? {
        "defines" => Some(Relation::Defines),
        "references" => Some(Relation::References),
        "depends_on" => Some(Relation::DependsOn),
        "test_covers" => Some(Relation::TestCovers),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Serialized shapes (graph.json)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphModel {
    pub nodes: Vec<NodeModel>,
    pub edges: Vec<EdgeModel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeModel {
    pub key: String,
    pub attributes: NodeAttrs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeAttrs {
    File(FileNode),
    Symbol(SymbolNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeModel {
    pub key: String,
    pub source: String,
    pub target: String,
    pub attributes: EdgeAttrs,
}
