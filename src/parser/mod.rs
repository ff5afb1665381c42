pub mod imports;
pub mod queries;

use std::cell::RefCell;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use tree_sitter::{Parser, QueryCursor, StreamingIterator, Tree};

use crate::language::Language;

use imports::extract_import_bindings;
use queries::{grammar, tag_query};

// Thread-local Parser instances — one per rayon worker thread, zero lock
// contention. Each Parser is initialised once per thread with its grammar.
thread_local! {
    static PARSER_PY: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&grammar(Language::Python)).unwrap();
        p
    });
    static PARSER_JS: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&grammar(Language::JavaScript)).unwrap();
        p
    });
    static PARSER_TS: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&grammar(Language::TypeScript)).unwrap();
        p
    });
    static PARSER_TSX: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&grammar(Language::Tsx)).unwrap();
        p
    });
}

// ---------------------------------------------------------------------------
// Parse output data model
// ---------------------------------------------------------------------------

/// Whether a tag is a symbol definition or a reference to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    Def,
    Ref,
}

/// A captured identifier occurrence in a file. Owned by a FileRecord;
/// immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub name: String,
    pub kind: TagKind,
    /// Grammar-specific label from the capture suffix: `function`, `class`,
    /// `method`, `interface`, `type`, `enum`, `call`, ...
    #[serde(rename = "type")]
    pub tag_type: String,
    /// 1-based line number.
    pub line: usize,
}

/// How an import entry reached the file: a plain import declaration, or a
/// re-export. Only `Import` is produced today; the `ReExport` variant keeps
/// the serialized format stable for when re-export extraction lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Import,
    ReExport,
}

/// Synthetic local-name prefix for bindings created by side-effect imports
/// (`import './setup'`), which introduce no identifier of their own.
pub const SIDE_EFFECT_PREFIX: &str = "__side_effect__:";

/// A lexical import entry produced by a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBinding {
    /// Name visible in the importing file; `__side_effect__:<spec>` for
    /// side-effect imports.
    pub local_name: String,
    /// `"default"`, `"*"`, or the imported identifier.
    pub imported_name: String,
    /// The module specifier exactly as written in source.
    pub module_specifier: String,
    pub is_type_only: bool,
    pub source_kind: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

/// The result of parsing a single source file: definition/reference tags and
/// (for non-Python files) the lexical import bindings.
#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    pub tags: Vec<Tag>,
    pub imports: Vec<ImportBinding>,
}

// ---------------------------------------------------------------------------
// Parse contract
// ---------------------------------------------------------------------------

/// Parse a source file into tags and import bindings.
///
/// Reuses the thread-local Parser for the file's language, so this is safe
/// and cheap to call from rayon workers. Python files produce tags only —
/// their imports are recovered through name-match fallback at graph-build
/// time rather than lexical bindings.
///
/// # Errors
/// Returns an error when tree-sitter yields no tree (malformed or truncated
/// source). Per-file failures are skipped by the caller, never fatal.
pub fn parse_source(rel_path: &str, language: Language, source: &[u8]) -> Result<ParseOutput> {
    let tree = parse_tree(language, source)
        .ok_or_else(|| anyhow!("tree-sitter returned no tree for {rel_path:?}"))?;

    let tags = extract_tags(&tree, source, language);
    let imports = if language.has_import_bindings() {
        extract_import_bindings(&tree, source)
    } else {
        Vec::new()
    };

    Ok(ParseOutput { tags, imports })
}

fn parse_tree(language: Language, source: &[u8]) -> Option<Tree> {
    match language {
        Language::Python => PARSER_PY.with(|p| p.borrow_mut().parse(source, None)),
        Language::JavaScript => PARSER_JS.with(|p| p.borrow_mut().parse(source, None)),
        Language::TypeScript => PARSER_TS.with(|p| p.borrow_mut().parse(source, None)),
        Language::Tsx => PARSER_TSX.with(|p| p.borrow_mut().parse(source, None)),
    }
}

/// Run the language's tag query over a parsed tree and materialize one Tag
/// per `name.definition.*` / `name.reference.*` capture.
fn extract_tags(tree: &Tree, source: &[u8], language: Language) -> Vec<Tag> {
    let query = tag_query(language);
    let mut tags = Vec::new();

    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(query, tree.root_node(), source);

    while let Some(m) = matches.next() {
        for capture in m.captures {
            let capture_name = query.capture_names()[capture.index as usize];
            let (kind, tag_type) =
                if let Some(rest) = capture_name.strip_prefix("name.definition.") {
                    (TagKind::Def, rest)
                } else if let Some(rest) = capture_name.strip_prefix("name.reference.") {
                    (TagKind::Ref, rest)
                } else {
                    continue;
                };

            let name = capture.node.utf8_text(source).unwrap_or("").to_owned();
            if name.is_empty() {
                continue;
            }

            tags.push(Tag {
                name,
                kind,
                tag_type: tag_type.to_owned(),
                line: capture.node.start_position().row + 1,
            });
        }
    }

    tags
}
