use serde::Serialize;

use crate::context::ContextBuckets;
use crate::rank::RankedFile;

/// Aggregate statistics produced by a build or update run.
#[derive(Debug, Serialize)]
pub struct BuildSummary {
    pub file_count: usize,
    pub parsed_files: usize,
    pub reused_files: usize,
    /// Files skipped due to read or parse errors.
    pub skipped_files: usize,
    pub python_files: usize,
    pub javascript_files: usize,
    pub typescript_files: usize,
    pub tsx_files: usize,
    pub symbol_count: usize,
    pub defines_edges: usize,
    pub references_edges: usize,
    pub depends_on_edges: usize,
    pub test_covers_edges: usize,
    /// Wall-clock time for the run in seconds.
    pub elapsed_secs: f64,
}

/// Print a build/update summary.
///
/// - `json = true`: emit a pretty-printed JSON object to stdout.
/// - `json = false`: emit a cargo-style human-readable summary to stdout.
///
/// The skipped-files warning goes to **stderr** so the stdout stream stays
/// clean for downstream JSON consumers.
pub fn print_build_summary(summary: &BuildSummary, json: bool) {
    if json {
        match serde_json::to_string_pretty(summary) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("error serialising summary: {}", e),
        }
        return;
    }

    println!(
        "Indexed {} files in {:.2}s ({} parsed, {} reused)",
        summary.file_count, summary.elapsed_secs, summary.parsed_files, summary.reused_files
    );

    if summary.python_files > 0 {
        println!("  Python: {} files", summary.python_files);
    }
    if summary.javascript_files > 0 {
        println!("  JavaScript: {} files", summary.javascript_files);
    }
    if summary.typescript_files > 0 {
        println!("  TypeScript: {} files", summary.typescript_files);
    }
    if summary.tsx_files > 0 {
        println!("  TSX: {} files", summary.tsx_files);
    }

    println!(
        "  {} symbols, {} defines edges",
        summary.symbol_count, summary.defines_edges
    );
    println!(
        "  {} references, {} depends_on, {} test_covers edges",
        summary.references_edges, summary.depends_on_edges, summary.test_covers_edges
    );

    if summary.skipped_files > 0 {
        eprintln!("  {} files skipped (read or parse errors)", summary.skipped_files);
    }
}

/// The full output of a rank run: the ordered list plus review buckets.
#[derive(Debug, Serialize)]
pub struct RankReport<'a> {
    pub seeds: &'a [String],
    pub ranked: &'a [RankedFile],
    pub buckets: &'a ContextBuckets,
}

/// Print ranked files.
///
/// Compact format is one line per file (rank, score, path, reasons) —
/// token-friendly for agent consumption. JSON carries features and buckets.
pub fn print_rank_report(report: &RankReport, json: bool) {
    if json {
        match serde_json::to_string_pretty(report) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("error serialising rank report: {}", e),
        }
        return;
    }

    for (position, file) in report.ranked.iter().enumerate() {
        println!(
            "{:>3}. {:.3}  {}  [{}]",
            position + 1,
            file.score,
            file.path,
            file.reasons.join(",")
        );
    }
}
