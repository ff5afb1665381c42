use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Root configuration model
// ---------------------------------------------------------------------------

/// Raw shape of a tsconfig/jsconfig file. Parsed with json5 so the comments
/// and trailing commas common in real-world tsconfig files don't break us.
#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    extends: Option<String>,
    #[serde(default, rename = "compilerOptions")]
    compiler_options: RawCompilerOptions,
}

#[derive(Debug, Deserialize, Default)]
struct RawCompilerOptions {
    #[serde(rename = "baseUrl")]
    base_url: Option<String>,
    paths: Option<BTreeMap<String, Vec<String>>>,
}

/// Effective configuration after walking the `extends` chain. Child values
/// win over parent values; `paths` is replaced wholesale when redeclared.
#[derive(Debug, Default)]
struct MergedConfig {
    base_url: Option<String>,
    paths: Option<BTreeMap<String, Vec<String>>>,
}

const MAX_EXTENDS_DEPTH: usize = 8;

fn load_config_chain(path: &Path, depth: usize) -> anyhow::Result<MergedConfig> {
    if depth > MAX_EXTENDS_DEPTH {
        anyhow::bail!("extends chain exceeds {MAX_EXTENDS_DEPTH} levels at {}", path.display());
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let raw: RawConfig = serde_json5::from_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?;

    let mut merged = match &raw.extends {
        Some(parent_ref) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            load_config_chain(&resolve_extends_target(dir, parent_ref), depth + 1)?
        }
        None => MergedConfig::default(),
    };

    if raw.compiler_options.base_url.is_some() {
        merged.base_url = raw.compiler_options.base_url;
    }
    if raw.compiler_options.paths.is_some() {
        merged.paths = raw.compiler_options.paths;
    }
    Ok(merged)
}

/// `extends` targets may omit the `.json` extension.
fn resolve_extends_target(dir: &Path, target: &str) -> PathBuf {
    let mut path = dir.join(target);
    if path.extension().is_none() {
        path.set_extension("json");
    }
    path
}

// ---------------------------------------------------------------------------
// Path rules
// ---------------------------------------------------------------------------

/// A compiled `paths` mapping entry. The pattern carries at most one `*`
/// wildcard, split into prefix/suffix for matching.
#[derive(Debug, Clone)]
struct PathRule {
    pattern: String,
    prefix: String,
    suffix: String,
    has_wildcard: bool,
    targets: Vec<String>,
}

impl PathRule {
    fn compile(pattern: &str, targets: &[String]) -> Option<PathRule> {
        let stars = pattern.matches('*').count();
        if stars > 1 {
            tracing::warn!("ignoring paths pattern {pattern:?}: more than one wildcard");
            return None;
        }
        let (prefix, suffix) = match pattern.split_once('*') {
            Some((p, s)) => (p.to_owned(), s.to_owned()),
            None => (String::new(), String::new()),
        };
        Some(PathRule {
            pattern: pattern.to_owned(),
            prefix,
            suffix,
            has_wildcard: stars == 1,
            targets: targets.to_vec(),
        })
    }

    /// Longer fixed text wins over shorter when several rules match.
    fn specificity(&self) -> usize {
        if self.has_wildcard {
            self.prefix.len() + self.suffix.len()
        } else {
            self.pattern.len()
        }
    }

    /// Returns the wildcard value on a match (empty for exact patterns).
    fn match_specifier<'a>(&self, specifier: &'a str) -> Option<&'a str> {
        if self.has_wildcard {
            if specifier.len() >= self.prefix.len() + self.suffix.len()
                && specifier.starts_with(&self.prefix)
                && specifier.ends_with(&self.suffix)
            {
                Some(&specifier[self.prefix.len()..specifier.len() - self.suffix.len()])
            } else {
                None
            }
        } else if specifier == self.pattern {
            Some("")
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Translates bare module specifiers into candidate repository-relative paths
/// using the root-level tsconfig/jsconfig path aliases and base directory.
///
/// Candidates are not checked for existence here — the graph builder checks
/// them against the file index, which is the authority on what was indexed.
#[derive(Debug)]
pub struct ModuleResolver {
    /// Repo-relative base directory ("" = root) that expansions resolve
    /// against: the explicit `baseUrl`, else the config file's directory.
    base_dir: String,
    /// An explicit `baseUrl` additionally enables resolving bare specifiers
    /// directly against the base directory.
    base_url_declared: bool,
    rules: Vec<PathRule>,
}

impl ModuleResolver {
    /// Load the resolver from `tsconfig.json` (else `jsconfig.json`) at the
    /// repository root. Returns `None` when no config exists or when loading
    /// fails — alias resolution is then disabled, relative imports still work.
    pub fn load(root: &Path) -> Option<ModuleResolver> {
        for name in ["tsconfig.json", "jsconfig.json"] {
            let path = root.join(name);
            if !path.exists() {
                continue;
            }
            return match load_config_chain(&path, 0) {
                Ok(config) => Some(Self::from_config(config)),
                Err(err) => {
                    tracing::warn!("module resolver disabled: {err:#}");
                    None
                }
            };
        }
        None
    }

    fn from_config(config: MergedConfig) -> ModuleResolver {
        let base_url_declared = config.base_url.is_some();
        let base_dir = config
            .base_url
            .as_deref()
            .map(normalize_posix)
            .unwrap_or_default();

        let mut rules: Vec<PathRule> = config
            .paths
            .unwrap_or_default()
            .iter()
            .filter_map(|(pattern, targets)| PathRule::compile(pattern, targets))
            .collect();

        // Most-specific rule first; lexicographic tie-break keeps the order
        // stable across runs.
        rules.sort_by(|a, b| {
            b.specificity()
                .cmp(&a.specificity())
                .then_with(|| a.pattern.cmp(&b.pattern))
        });

        ModuleResolver {
            base_dir,
            base_url_declared,
            rules,
        }
    }

    /// Test seam: build a resolver directly from parts.
    #[cfg(test)]
    pub(crate) fn from_parts(
        base_url: Option<&str>,
        paths: &[(&str, &[&str])],
    ) -> ModuleResolver {
        Self::from_config(MergedConfig {
            base_url: base_url.map(str::to_owned),
            paths: Some(
                paths
                    .iter()
                    .map(|(p, t)| ((*p).to_owned(), t.iter().map(|s| (*s).to_owned()).collect()))
                    .collect(),
            ),
        })
    }

    /// Candidate repository-relative paths for a module specifier.
    ///
    /// Relative specifiers return an empty list — the caller resolves those
    /// against the importing file's directory directly. The returned order is
    /// rule order (specificity-sorted), then the baseUrl join; duplicates are
    /// collapsed keeping the first occurrence.
    pub fn candidates(&self, specifier: &str) -> Vec<String> {
        if specifier.starts_with('.') {
            return Vec::new();
        }

        let mut out: Vec<String> = Vec::new();

        for rule in &self.rules {
            let Some(wildcard_value) = rule.match_specifier(specifier) else {
                continue;
            };
            for target in &rule.targets {
                let expanded = if rule.has_wildcard {
                    target.replacen('*', wildcard_value, 1)
                } else {
                    target.clone()
                };
                push_unique(&mut out, join_posix(&self.base_dir, &expanded));
            }
        }

        if self.base_url_declared {
            push_unique(&mut out, join_posix(&self.base_dir, specifier));
        }

        out
    }
}

fn push_unique(out: &mut Vec<String>, candidate: String) {
    if !candidate.is_empty() && !out.contains(&candidate) {
        out.push(candidate);
    }
}

// ---------------------------------------------------------------------------
// POSIX path helpers (shared with the graph builder)
// ---------------------------------------------------------------------------

/// Collapse `.` and `..` segments of a `/`-separated path. `..` above the
/// root is dropped — such a candidate can never name an indexed file.
pub fn normalize_posix(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Join two repo-relative POSIX paths and normalize the result.
pub fn join_posix(base: &str, rel: &str) -> String {
    if base.is_empty() {
        normalize_posix(rel)
    } else {
        normalize_posix(&format!("{base}/{rel}"))
    }
}

/// The directory part of a repo-relative POSIX path ("" for root-level files).
pub fn dirname_posix(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_posix() {
        assert_eq!(normalize_posix("./src/a.ts"), "src/a.ts");
        assert_eq!(normalize_posix("src/sub/../a.ts"), "src/a.ts");
        assert_eq!(normalize_posix("src//a.ts"), "src/a.ts");
        assert_eq!(normalize_posix("../../a.ts"), "a.ts");
        assert_eq!(dirname_posix("src/app/main.ts"), "src/app");
        assert_eq!(dirname_posix("main.ts"), "");
    }

    #[test]
    fn test_relative_specifier_returns_empty() {
        let resolver = ModuleResolver::from_parts(Some("."), &[("@core/*", &["src/core/*"])]);
        assert!(resolver.candidates("./local").is_empty());
        assert!(resolver.candidates("../up").is_empty());
    }

    #[test]
    fn test_wildcard_rule_expansion() {
        let resolver = ModuleResolver::from_parts(Some("."), &[("@core/*", &["src/core/*"])]);
        let candidates = resolver.candidates("@core/config");
        assert_eq!(candidates[0], "src/core/config");
    }

    #[test]
    fn test_exact_rule_match() {
        let resolver = ModuleResolver::from_parts(None, &[("shared", &["src/shared/index"])]);
        assert_eq!(resolver.candidates("shared"), vec!["src/shared/index"]);
        assert!(resolver.candidates("shared/extra").is_empty());
    }

    #[test]
    fn test_specificity_orders_rules() {
        let resolver = ModuleResolver::from_parts(
            None,
            &[
                ("@app/*", &["src/app/*"]),
                ("@app/core/*", &["src/core/*"]),
            ],
        );
        let candidates = resolver.candidates("@app/core/db");
        // The longer-prefix rule must come first.
        assert_eq!(candidates, vec!["src/core/db", "src/app/core/db"]);
    }

    #[test]
    fn test_base_url_join() {
        let resolver = ModuleResolver::from_parts(Some("."), &[]);
        assert_eq!(resolver.candidates("src/lib/types"), vec!["src/lib/types"]);
    }

    #[test]
    fn test_base_url_subdirectory() {
        let resolver = ModuleResolver::from_parts(Some("./src"), &[("@ui/*", &["ui/*"])]);
        assert_eq!(
            resolver.candidates("@ui/button"),
            vec!["src/ui/button", "src/@ui/button"]
        );
    }

    #[test]
    fn test_load_missing_config_disables_resolver() {
        let dir = TempDir::new().unwrap();
        assert!(ModuleResolver::load(dir.path()).is_none());
    }

    #[test]
    fn test_load_malformed_config_disables_resolver() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("tsconfig.json"), "{ not json at all").unwrap();
        assert!(ModuleResolver::load(dir.path()).is_none());
    }

    #[test]
    fn test_load_with_comments_and_extends_chain() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("tsconfig.base.json"),
            r#"{
  // shared compiler options
  "compilerOptions": {
    "baseUrl": ".",
    "paths": { "@pkg/*": ["packages/*/src"] },
  },
}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("tsconfig.json"),
            r#"{ "extends": "./tsconfig.base.json" }"#,
        )
        .unwrap();

        let resolver = ModuleResolver::load(dir.path()).expect("resolver should load");
        let candidates = resolver.candidates("@pkg/core");
        assert_eq!(candidates[0], "packages/core/src");
    }

    #[test]
    fn test_child_overrides_parent_paths() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("tsconfig.base.json"),
            r#"{ "compilerOptions": { "baseUrl": ".", "paths": { "@old/*": ["old/*"] } } }"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("tsconfig.json"),
            r#"{ "extends": "./tsconfig.base", "compilerOptions": { "paths": { "@new/*": ["new/*"] } } }"#,
        )
        .unwrap();

        let resolver = ModuleResolver::load(dir.path()).unwrap();
        assert!(resolver.candidates("@old/x").is_empty());
        assert_eq!(resolver.candidates("@new/x")[0], "new/x");
    }

    #[test]
    fn test_multi_wildcard_pattern_is_skipped() {
        let resolver = ModuleResolver::from_parts(None, &[("@*/thing/*", &["src/*/*"])]);
        assert!(resolver.candidates("@a/thing/b").is_empty());
    }
}
