use serde::{Deserialize, Serialize};

/// The typed relation carried by a directed edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// File → Symbol: the file defines this symbol.
    Defines,
    /// File → Symbol: a reference tag resolved to this symbol.
    References,
    /// File → File: a reference or import declaration links the files.
    DependsOn,
    /// File → File: a test file references an export of the target.
    TestCovers,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Defines => "defines",
            Relation::References => "references",
            Relation::DependsOn => "depends_on",
            Relation::TestCovers => "test_covers",
        }
    }
}

/// How much trust the builder places in an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// An import binding resolved to a matching definition.
    High,
    /// An import declaration linked the files but no definition matched.
    ImportOnly,
    /// Global same-name matching with no import evidence.
    Fallback,
}

/// Which mechanism produced an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Definition,
    Import,
    ImportDeclaration,
    NameMatch,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Definition => "definition",
            Resolution::Import => "import",
            Resolution::ImportDeclaration => "import_declaration",
            Resolution::NameMatch => "name_match",
        }
    }
}

/// The closed attribute bag every edge carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeAttrs {
    /// The symbol name the edge is about (the imported/expected name).
    pub symbol: String,
    /// The local alias in the source file, when it differs from `symbol` or
    /// the edge came through an import.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// The file owning the symbol this edge resolves to.
    pub owner_file: String,
    pub confidence: Confidence,
    pub resolution: Resolution,
}

/// An edge value stored in the graph: relation plus attributes. The key
/// preserves multi-edge multiplicity while letting exact duplicates collapse.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub relation: Relation,
    pub attrs: EdgeAttrs,
}

/// Deterministic multi-edge key: relation, endpoints, and the attribute salts
/// that distinguish parallel edges.
pub fn edge_key(relation: Relation, source: &str, target: &str, attrs: &EdgeAttrs) -> String {
    format!(
        "{}|{}|{}|{}|{}|{}|{}|{}",
        relation.as_str(),
        source,
        target,
        attrs.symbol,
        attrs.local_symbol.as_deref().unwrap_or(""),
        attrs.line.map(|l| l.to_string()).unwrap_or_default(),
        attrs.owner_file,
        attrs.resolution.as_str(),
    )
}
