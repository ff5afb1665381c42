use std::path::Path;

use serde::Deserialize;

/// Configuration loaded from `repomap.toml` at the repository root.
#[derive(Debug, Deserialize, Default)]
pub struct RepomapConfig {
    /// Additional path patterns to exclude from indexing (beyond the built-in
    /// directory exclusions).
    pub exclude: Option<Vec<String>>,
}

impl RepomapConfig {
    /// Load configuration from `repomap.toml` in the given root directory.
    ///
    /// Returns a default (empty) configuration if the file does not exist or
    /// cannot be parsed.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join("repomap.toml");

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!("failed to parse repomap.toml: {err}. Using defaults.");
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!("failed to read repomap.toml: {err}. Using defaults.");
                Self::default()
            }
        }
    }

    /// Append extra exclusion globs (e.g. from the CLI) to the loaded set.
    pub fn with_extra_excludes(mut self, extra: &[String]) -> Self {
        if extra.is_empty() {
            return self;
        }
        let mut patterns = self.exclude.take().unwrap_or_default();
        patterns.extend(extra.iter().cloned());
        self.exclude = Some(patterns);
        self
    }
}
