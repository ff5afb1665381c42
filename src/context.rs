use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::rank::{FileFeatures, RankedFile};

/// The four-bucket review context assembled around a ranked file list.
///
/// `primary` always carries every seed, whether or not it appears in the
/// ranking; the remaining buckets are drawn from the non-seed ranked tail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBuckets {
    /// The seed files themselves.
    pub primary: Vec<RankedFile>,
    /// The top of the non-seed tail: files most likely causally involved.
    pub causal: Vec<RankedFile>,
    /// Schema/API-shaped files from the tail.
    pub contract: Vec<RankedFile>,
    /// Test and sensitive-domain files from the tail.
    pub guardrail: Vec<RankedFile>,
}

fn contract_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(api|route|router|controller|handler|schema|contract|dto|migration|openapi|proto)")
            .expect("static regex")
    })
}

fn guardrail_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(test|spec|auth|permission|security|policy|payment|billing|migration)")
            .expect("static regex")
    })
}

/// Select review buckets from a ranked list.
///
/// `causal_limit` caps the causal bucket; the contract and guardrail buckets
/// each take up to `max(5, ceil(causal_limit / 2))` pattern-matching files
/// from the same tail. A seed missing from the ranking still surfaces in
/// `primary` with zeroed features and a `seed-file` reason.
pub fn select_buckets(
    ranked: &[RankedFile],
    seeds: &[String],
    causal_limit: usize,
) -> ContextBuckets {
    let seed_set: HashSet<&str> = seeds.iter().map(String::as_str).collect();

    let primary = seeds
        .iter()
        .map(|seed| {
            ranked
                .iter()
                .find(|r| r.path == *seed)
                .cloned()
                .unwrap_or_else(|| RankedFile {
                    path: seed.clone(),
                    score: 0.0,
                    features: FileFeatures::zeroed(),
                    reasons: vec!["seed-file".to_owned()],
                })
        })
        .collect();

    let tail: Vec<&RankedFile> = ranked
        .iter()
        .filter(|r| !seed_set.contains(r.path.as_str()))
        .collect();

    let causal: Vec<RankedFile> = tail
        .iter()
        .take(causal_limit)
        .map(|r| (*r).clone())
        .collect();

    let quota = 5usize.max(causal_limit.div_ceil(2));
    let contract: Vec<RankedFile> = tail
        .iter()
        .filter(|r| contract_re().is_match(&r.path))
        .take(quota)
        .map(|r| (*r).clone())
        .collect();
    let guardrail: Vec<RankedFile> = tail
        .iter()
        .filter(|r| guardrail_re().is_match(&r.path))
        .take(quota)
        .map(|r| (*r).clone())
        .collect();

    ContextBuckets {
        primary,
        causal,
        contract,
        guardrail,
    }
}
