use serde::{Deserialize, Serialize};

/// A source language handled by repomap.
///
/// Uses a plain enum (not trait objects) to avoid `dyn` overhead. Cheap to copy
/// and pattern-matched at dispatch boundaries. `Tsx` is a distinct entry because
/// it is parsed with a different tree-sitter grammar than plain TypeScript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
}

impl Language {
    /// Map a file extension to its language. `jsx` files use the JavaScript
    /// grammar; `tsx` gets its own grammar.
    pub fn from_extension(ext: &str) -> Option<Language> {
        match ext {
            "py" => Some(Language::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "mts" | "cts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            _ => None,
        }
    }

    /// Stable lowercase name used in serialized records and summaries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
        }
    }

    /// True for languages whose files carry lexical import declarations that
    /// the parser extracts. Python dependencies are recovered through
    /// name-match fallback instead.
    pub fn has_import_bindings(&self) -> bool {
        !matches!(self, Language::Python)
    }
}
