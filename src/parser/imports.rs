use std::sync::OnceLock;

use regex::Regex;
use tree_sitter::{Node, Tree};

use super::{ImportBinding, SIDE_EFFECT_PREFIX, SourceKind};

// TODO: extract re-export declarations (`export { X } from './y'`) and
// CommonJS `require()` calls; both currently produce no bindings.

/// Matches `import type { ... } from '...'` statements, where every specifier
/// is type-only.
fn type_only_statement_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*import\s+type\b").expect("static regex"))
}

fn node_text<'a>(node: Node<'a>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// Walk top-level `import_statement` nodes and produce one binding per local
/// name the statement introduces.
///
/// Handled forms:
/// - `import './setup'`                → synthetic `__side_effect__:./setup`
/// - `import React from 'react'`       → importedName `default`
/// - `import * as ns from 'mod'`       → importedName `*`
/// - `import { a, b as c } from 'mod'` → one binding per specifier
/// - `import type { T } from 'mod'` / `import { type T } from 'mod'` →
///   `isTypeOnly` set on the statement or the individual specifier
pub fn extract_import_bindings(tree: &Tree, source: &[u8]) -> Vec<ImportBinding> {
    let mut bindings = Vec::new();
    let root = tree.root_node();

    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        if child.kind() == "import_statement" {
            collect_statement_bindings(child, source, &mut bindings);
        }
    }

    bindings
}

fn collect_statement_bindings(stmt: Node, source: &[u8], out: &mut Vec<ImportBinding>) {
    // The string-literal module specifier (single- or double-quoted). An
    // import statement without one (e.g. mid-edit source) produces nothing.
    let Some(specifier) = module_specifier(stmt, source) else {
        return;
    };

    let line = Some(stmt.start_position().row + 1);
    let statement_type_only = type_only_statement_re().is_match(node_text(stmt, source));

    let clause = find_child_of_kind(stmt, "import_clause");

    let Some(clause) = clause else {
        // No clause: a bare side-effect import.
        out.push(ImportBinding {
            local_name: format!("{SIDE_EFFECT_PREFIX}{specifier}"),
            imported_name: "*".to_owned(),
            module_specifier: specifier,
            is_type_only: statement_type_only,
            source_kind: SourceKind::Import,
            line,
        });
        return;
    };

    let mut cursor = clause.walk();
    for child in clause.children(&mut cursor) {
        match child.kind() {
            "identifier" => {
                // Default import: `import React from ...`
                out.push(ImportBinding {
                    local_name: node_text(child, source).to_owned(),
                    imported_name: "default".to_owned(),
                    module_specifier: specifier.clone(),
                    is_type_only: statement_type_only,
                    source_kind: SourceKind::Import,
                    line,
                });
            }
            "namespace_import" => {
                if let Some(name) = namespace_local_name(child, source) {
                    out.push(ImportBinding {
                        local_name: name,
                        imported_name: "*".to_owned(),
                        module_specifier: specifier.clone(),
                        is_type_only: statement_type_only,
                        source_kind: SourceKind::Import,
                        line,
                    });
                }
            }
            "named_imports" => {
                collect_named_specifiers(child, source, &specifier, statement_type_only, line, out);
            }
            _ => {}
        }
    }
}

/// Extract the string-literal specifier from the statement's `source` field.
fn module_specifier(stmt: Node, source: &[u8]) -> Option<String> {
    let string_node = stmt.child_by_field_name("source")?;
    // The string's first named child is the string_fragment between quotes.
    let fragment = string_node.named_child(0)?;
    Some(node_text(fragment, source).to_owned())
}

/// Extract the identifier from a `namespace_import` node (`* as identifier`).
/// The identifier is not assigned a field name in the grammar — find it by kind.
fn namespace_local_name(ns_node: Node, source: &[u8]) -> Option<String> {
    let mut cursor = ns_node.walk();
    for child in ns_node.children(&mut cursor) {
        if child.kind() == "identifier" {
            return Some(node_text(child, source).to_owned());
        }
    }
    None
}

/// One binding per `import_specifier` in a `named_imports` node.
///
/// In `import { foo as bar }` the grammar assigns `name` = foo (the exported
/// name) and `alias` = bar (the local binding).
fn collect_named_specifiers(
    named: Node,
    source: &[u8],
    specifier: &str,
    statement_type_only: bool,
    line: Option<usize>,
    out: &mut Vec<ImportBinding>,
) {
    let mut cursor = named.walk();
    for child in named.children(&mut cursor) {
        if child.kind() != "import_specifier" {
            continue;
        }
        let Some(name_node) = child.child_by_field_name("name") else {
            continue;
        };
        let imported = node_text(name_node, source).to_owned();
        let local = child
            .child_by_field_name("alias")
            .map(|a| node_text(a, source).to_owned())
            .unwrap_or_else(|| imported.clone());

        // `import { type Foo }` marks a single specifier as type-only.
        let specifier_type_only =
            statement_type_only || node_text(child, source).trim_start().starts_with("type ");

        out.push(ImportBinding {
            local_name: local,
            imported_name: imported,
            module_specifier: specifier.to_owned(),
            is_type_only: specifier_type_only,
            source_kind: SourceKind::Import,
            line,
        });
    }
}

fn find_child_of_kind<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;
    use crate::parser::parse_source;

    fn bindings(src: &str) -> Vec<ImportBinding> {
        parse_source("test.ts", Language::TypeScript, src.as_bytes())
            .unwrap()
            .imports
    }

    #[test]
    fn test_named_imports() {
        let out = bindings("import { useState, useEffect } from 'react';\n");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].local_name, "useState");
        assert_eq!(out[0].imported_name, "useState");
        assert_eq!(out[0].module_specifier, "react");
        assert!(!out[0].is_type_only);
        assert_eq!(out[0].line, Some(1));
    }

    #[test]
    fn test_aliased_named_import() {
        let out = bindings("import { original as local } from './mod';\n");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].imported_name, "original");
        assert_eq!(out[0].local_name, "local");
    }

    #[test]
    fn test_default_import() {
        let out = bindings("import React from 'react';\n");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].local_name, "React");
        assert_eq!(out[0].imported_name, "default");
    }

    #[test]
    fn test_namespace_import() {
        let out = bindings("import * as path from 'node:path';\n");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].local_name, "path");
        assert_eq!(out[0].imported_name, "*");
    }

    #[test]
    fn test_combined_default_and_named() {
        let out = bindings("import React, { useState } from 'react';\n");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].imported_name, "default");
        assert_eq!(out[1].local_name, "useState");
    }

    #[test]
    fn test_side_effect_import() {
        let out = bindings("import './setup';\n");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].local_name, "__side_effect__:./setup");
        assert_eq!(out[0].imported_name, "*");
        assert_eq!(out[0].module_specifier, "./setup");
    }

    #[test]
    fn test_type_only_statement() {
        let out = bindings("import type { Config } from './config';\n");
        assert_eq!(out.len(), 1);
        assert!(out[0].is_type_only);
        assert_eq!(out[0].imported_name, "Config");
    }

    #[test]
    fn test_type_only_specifier() {
        let out = bindings("import { type Config, load } from './config';\n");
        assert_eq!(out.len(), 2);
        assert!(out[0].is_type_only, "marked specifier should be type-only");
        assert!(!out[1].is_type_only, "plain specifier should not");
    }

    #[test]
    fn test_double_quoted_specifier() {
        let out = bindings("import { a } from \"./mod\";\n");
        assert_eq!(out[0].module_specifier, "./mod");
    }

    #[test]
    fn test_non_import_source_has_no_bindings() {
        let out = bindings("const x = 1;\nexport function f() { return x; }\n");
        assert!(out.is_empty());
    }
}
