use serde::{Deserialize, Serialize};

use crate::language::Language;

/// Metadata carried by a file node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    /// Repository-relative POSIX path.
    pub path: String,
    pub language: Language,
    pub is_test: bool,
}

/// Metadata carried by a symbol node. One node per definition tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolNode {
    pub name: String,
    /// The defining file — the source of this node's single `defines` edge.
    pub owner_file: String,
    pub line: usize,
    pub symbol_type: String,
}

/// A node in the repository graph.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphNode {
    File(FileNode),
    Symbol(SymbolNode),
}

impl GraphNode {
    /// The node's stable string key.
    pub fn id(&self) -> String {
        match self {
            GraphNode::File(f) => file_node_id(&f.path),
            GraphNode::Symbol(s) => symbol_node_id(&s.owner_file, &s.name, s.line),
        }
    }
}

/// `file:<relPath>`
pub fn file_node_id(path: &str) -> String {
    format!("file:{path}")
}

/// `sym:<urlencoded(path)>:<urlencoded(name)>:<line>` — encoding keeps the
/// `:`-separated key unambiguous for arbitrary path and symbol text.
pub fn symbol_node_id(path: &str, name: &str, line: usize) -> String {
    format!(
        "sym:{}:{}:{line}",
        encode_component(path),
        encode_component(name)
    )
}

/// Percent-encode everything outside the URL-unreserved set.
fn encode_component(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                out.push('%');
                out.push(char::from_digit((byte >> 4) as u32, 16).unwrap().to_ascii_uppercase());
                out.push(char::from_digit((byte & 0xf) as u32, 16).unwrap().to_ascii_uppercase());
            }
        }
    }
    out
}

/// Path heuristic for test files: a `test`/`tests`/`__tests__` path segment,
/// or a file name ending in `.test.<ext>` / `.spec.<ext>`.
pub fn is_test_path(path: &str) -> bool {
    let mut segments = path.split('/').peekable();
    while let Some(segment) = segments.next() {
        let is_last = segments.peek().is_none();
        if !is_last && matches!(segment, "test" | "tests" | "__tests__") {
            return true;
        }
        if is_last {
            let stem = match segment.rsplit_once('.') {
                Some((stem, _ext)) => stem,
                None => segment,
            };
            if stem.ends_with(".test") || stem.ends_with(".spec") {
                return true;
            }
        }
    }
    false
}
