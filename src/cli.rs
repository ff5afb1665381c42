use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Offline repository analyzer for code review context.
///
/// repomap indexes a polyglot source tree into a symbol-level dependency
/// graph, then ranks files by relevance to a set of seed files (e.g. the
/// files touched by a pull request).
#[derive(Parser, Debug)]
#[command(
    name = "repomap",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for rank results.
#[derive(Clone, Debug, ValueEnum, Default)]
pub enum RankFormat {
    /// Compact one-line-per-file format (default).
    #[default]
    Compact,
    /// Structured JSON with features and review buckets.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index a repository from scratch: discover, parse, build the graph,
    /// and persist state under `<path>/.repomap/`.
    Build {
        /// Path to the repository root.
        path: PathBuf,

        /// Print each indexed file path during the run.
        #[arg(short, long)]
        verbose: bool,

        /// Output the summary as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,

        /// Additional exclusion globs (repeatable), merged with repomap.toml.
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Incrementally refresh the index: re-parse only changed or new files
    /// (per `git diff`), drop deleted ones, and rebuild the graph.
    Update {
        /// Path to the repository root.
        path: PathBuf,

        /// Git revision range to diff (e.g. "main..HEAD"). Defaults to the
        /// working tree against HEAD.
        #[arg(long)]
        range: Option<String>,

        /// Print each indexed file path during the run.
        #[arg(short, long)]
        verbose: bool,

        /// Output the summary as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },

    /// Rank indexed files by relevance to seed files. Requires a prior
    /// `build` (or `update`).
    Rank {
        /// Path to the repository root.
        path: PathBuf,

        /// Seed file (repeatable), as a repository-relative POSIX path.
        /// With no seeds, ranking uses uniform graph centrality.
        #[arg(long = "seed")]
        seeds: Vec<String>,

        /// Number of ranked files to return.
        #[arg(long, default_value_t = 20)]
        top: usize,

        /// Size of the causal review bucket.
        #[arg(long, default_value_t = 10)]
        causal: usize,

        /// Output format.
        #[arg(long, value_enum, default_value_t = RankFormat::Compact)]
        format: RankFormat,
    },
}
