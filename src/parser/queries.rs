use std::sync::OnceLock;

use tree_sitter::{Language as TsLanguage, Query};

use crate::language::Language;

// ---------------------------------------------------------------------------
// Grammars
// ---------------------------------------------------------------------------

/// The tree-sitter grammar for a language.
pub fn grammar(language: Language) -> TsLanguage {
    match language {
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
    }
}

// ---------------------------------------------------------------------------
// Query sources
// ---------------------------------------------------------------------------

// Primary tag queries ship as data files next to the binary sources. Capture
// names follow the `name.definition.<type>` / `name.reference.<type>` scheme.
const PYTHON_TAGS: &str = include_str!("../../queries/python.scm");
const JAVASCRIPT_TAGS: &str = include_str!("../../queries/javascript.scm");
const TYPESCRIPT_TAGS: &str = include_str!("../../queries/typescript.scm");
const TSX_TAGS: &str = include_str!("../../queries/tsx.scm");

// Minimal built-in fallbacks used when a shipped query no longer compiles
// against the linked grammar version. They keep classes, functions, methods,
// and call references flowing so a grammar bump degrades instead of breaking.
const FALLBACK_PYTHON: &str = r#"
    (class_definition name: (identifier) @name.definition.class)
    (function_definition name: (identifier) @name.definition.function)
    (call function: (identifier) @name.reference.call)
"#;

const FALLBACK_JAVASCRIPT: &str = r#"
    (class_declaration name: (identifier) @name.definition.class)
    (function_declaration name: (identifier) @name.definition.function)
    (method_definition name: (property_identifier) @name.definition.method)
    (call_expression function: (identifier) @name.reference.call)
"#;

const FALLBACK_TYPESCRIPT: &str = r#"
    (class_declaration name: (type_identifier) @name.definition.class)
    (function_declaration name: (identifier) @name.definition.function)
    (method_definition name: (property_identifier) @name.definition.method)
    (call_expression function: (identifier) @name.reference.call)
"#;

fn primary_source(language: Language) -> &'static str {
    match language {
        Language::Python => PYTHON_TAGS,
        Language::JavaScript => JAVASCRIPT_TAGS,
        Language::TypeScript => TYPESCRIPT_TAGS,
        Language::Tsx => TSX_TAGS,
    }
}

fn fallback_source(language: Language) -> &'static str {
    match language {
        Language::Python => FALLBACK_PYTHON,
        Language::JavaScript => FALLBACK_JAVASCRIPT,
        Language::TypeScript | Language::Tsx => FALLBACK_TYPESCRIPT,
    }
}

// ---------------------------------------------------------------------------
// Compiled query cache
// ---------------------------------------------------------------------------

static QUERY_PYTHON: OnceLock<Query> = OnceLock::new();
static QUERY_JAVASCRIPT: OnceLock<Query> = OnceLock::new();
static QUERY_TYPESCRIPT: OnceLock<Query> = OnceLock::new();
static QUERY_TSX: OnceLock<Query> = OnceLock::new();

/// The compiled tag query for a language. Compiled once per process; on a
/// compile failure the built-in fallback is used and a single warning is
/// emitted for that language.
pub fn tag_query(language: Language) -> &'static Query {
    let slot = match language {
        Language::Python => &QUERY_PYTHON,
        Language::JavaScript => &QUERY_JAVASCRIPT,
        Language::TypeScript => &QUERY_TYPESCRIPT,
        Language::Tsx => &QUERY_TSX,
    };
    slot.get_or_init(|| compile_tag_query(language))
}

fn compile_tag_query(language: Language) -> Query {
    let grammar = grammar(language);
    match Query::new(&grammar, primary_source(language)) {
        Ok(query) => query,
        Err(err) => {
            tracing::warn!(
                "tag query for {} rejected by grammar ({err}); using built-in fallback",
                language.as_str()
            );
            Query::new(&grammar, fallback_source(language))
                .expect("built-in fallback tag query must compile")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_shipped_queries_compile() {
        for lang in [
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::Tsx,
        ] {
            let grammar = grammar(lang);
            Query::new(&grammar, primary_source(lang))
                .unwrap_or_else(|e| panic!("{} tag query rejected: {e}", lang.as_str()));
        }
    }

    #[test]
    fn test_all_fallback_queries_compile() {
        for lang in [
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::Tsx,
        ] {
            let grammar = grammar(lang);
            Query::new(&grammar, fallback_source(lang))
                .unwrap_or_else(|e| panic!("{} fallback query rejected: {e}", lang.as_str()));
        }
    }

    #[test]
    fn test_tag_query_has_expected_capture_prefixes() {
        let query = tag_query(Language::TypeScript);
        assert!(
            query
                .capture_names()
                .iter()
                .any(|n| n.starts_with("name.definition.")),
            "typescript query should carry definition captures"
        );
        assert!(
            query
                .capture_names()
                .iter()
                .any(|n| n.starts_with("name.reference.")),
            "typescript query should carry reference captures"
        );
    }
}
