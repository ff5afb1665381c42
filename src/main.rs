mod cli;
mod config;
mod context;
mod diff;
mod driver;
mod graph;
mod index;
mod language;
mod output;
mod parser;
mod rank;
mod resolver;
mod store;
mod walker;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;

use cli::{Cli, Commands, RankFormat};
use config::RepomapConfig;
use diff::GitDiffSource;
use driver::BuildOutcome;
use graph::edge::Relation;
use language::Language;
use output::{BuildSummary, RankReport, print_build_summary, print_rank_report};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// Fold a build outcome into the printable summary.
fn summarize(outcome: &BuildOutcome, elapsed_secs: f64) -> BuildSummary {
    let mut python_files = 0;
    let mut javascript_files = 0;
    let mut typescript_files = 0;
    let mut tsx_files = 0;
    for record in outcome.state.files.values() {
        match record.language {
            Language::Python => python_files += 1,
            Language::JavaScript => javascript_files += 1,
            Language::TypeScript => typescript_files += 1,
            Language::Tsx => tsx_files += 1,
        }
    }

    let relations = outcome.graph.relation_counts();
    let count = |relation: Relation| relations.get(&relation).copied().unwrap_or(0);

    BuildSummary {
        file_count: outcome.graph.file_count(),
        parsed_files: outcome.parsed_files,
        reused_files: outcome.reused_files,
        skipped_files: outcome.skipped_files,
        python_files,
        javascript_files,
        typescript_files,
        tsx_files,
        symbol_count: outcome.graph.symbol_count(),
        defines_edges: count(Relation::Defines),
        references_edges: count(Relation::References),
        depends_on_edges: count(Relation::DependsOn),
        test_covers_edges: count(Relation::TestCovers),
        elapsed_secs,
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            path,
            verbose,
            json,
            exclude,
        } => {
            let config = RepomapConfig::load(&path).with_extra_excludes(&exclude);
            let start = std::time::Instant::now();
            let outcome = driver::full_build(&path, &config)?;

            if verbose {
                for rel_path in outcome.state.files.keys() {
                    eprintln!("{rel_path}");
                }
            }
            print_build_summary(&summarize(&outcome, start.elapsed().as_secs_f64()), json);
        }

        Commands::Update {
            path,
            range,
            verbose,
            json,
        } => {
            let config = RepomapConfig::load(&path);
            let start = std::time::Instant::now();
            let outcome =
                driver::incremental_update(&path, &config, range.as_deref(), &GitDiffSource)?;

            if verbose {
                for rel_path in outcome.state.files.keys() {
                    eprintln!("{rel_path}");
                }
            }
            print_build_summary(&summarize(&outcome, start.elapsed().as_secs_f64()), json);
        }

        Commands::Rank {
            path,
            seeds,
            top,
            causal,
            format,
        } => {
            let (state, graph) = driver::load_index(&path)?;
            let ranked = rank::rank_files(&graph, &state.files, &seeds, top, Utc::now());
            let buckets = context::select_buckets(&ranked, &seeds, causal);

            let report = RankReport {
                seeds: &seeds,
                ranked: &ranked,
                buckets: &buckets,
            };
            print_rank_report(&report, matches!(format, RankFormat::Json));
        }
    }

    Ok(())
}
