//! Multi-measure lexical similarity.
//!
//! # Overview
//!
//! Four measures are computed between a normalized query and a normalized
//! candidate text, each on a `0..=100` scale:
//!
//! | Measure        | Definition                                                        |
//! |----------------|-------------------------------------------------------------------|
//! | `token_set`    | Jaccard overlap of the two token sets                             |
//! | `partial`      | 100 on full containment, else share of query tokens found inside a candidate token |
//! | `token_sort`   | normalized Levenshtein ratio of the alphabetically sorted tokens  |
//! | `ratio`        | normalized Levenshtein ratio of the full strings                  |
//!
//! They are fused with a weight profile picked from the length of the user's
//! query (before synonym expansion). Short queries lean on set overlap, long
//! queries on partial overlap.

use replymatch_core::config::{FusionConfig, FusionWeights};
use replymatch_core::model::WeightProfile;
use serde::Serialize;
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Prepared text
// ---------------------------------------------------------------------------

/// A normalized string with its token views precomputed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prepared {
    text: String,
    tokens: Vec<String>,
    set: HashSet<String>,
    sorted: String,
}

impl Prepared {
    /// Wrap an already normalized string.
    #[must_use]
    pub fn new(normalized: String) -> Self {
        let tokens: Vec<String> = normalized.split_whitespace().map(str::to_string).collect();
        let set: HashSet<String> = tokens.iter().cloned().collect();

        let mut sorted_tokens: Vec<&str> = tokens.iter().map(String::as_str).collect();
        sorted_tokens.sort_unstable();
        let sorted = sorted_tokens.join(" ");

        Self {
            text: normalized,
            tokens,
            set,
            sorted,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    #[must_use]
    pub const fn token_set(&self) -> &HashSet<String> {
        &self.set
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Measures
// ---------------------------------------------------------------------------

/// The four similarity measures for one query/candidate pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SubScores {
    pub token_set: f64,
    pub partial: f64,
    pub token_sort: f64,
    pub ratio: f64,
}

/// `|Q ∩ C| / |Q ∪ C| × 100`.
#[must_use]
pub fn token_set_overlap(query: &Prepared, candidate: &Prepared) -> f64 {
    if query.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    let intersection = query.set.intersection(&candidate.set).count() as f64;
    let union = query.set.union(&candidate.set).count() as f64;
    intersection / union * 100.0
}

/// 100 if either string contains the other, otherwise the share of query
/// tokens that occur inside some candidate token.
#[must_use]
pub fn partial_overlap(query: &Prepared, candidate: &Prepared) -> f64 {
    if query.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    if candidate.text.contains(&query.text) || query.text.contains(&candidate.text) {
        return 100.0;
    }

    let found = query
        .tokens
        .iter()
        .filter(|q| candidate.tokens.iter().any(|c| c.contains(q.as_str())))
        .count() as f64;
    found / query.tokens.len() as f64 * 100.0
}

/// Levenshtein ratio of the alphabetically sorted token strings.
#[must_use]
pub fn token_sort_overlap(query: &Prepared, candidate: &Prepared) -> f64 {
    if query.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&query.sorted, &candidate.sorted) * 100.0
}

/// Levenshtein ratio of the full strings.
#[must_use]
pub fn raw_ratio(query: &Prepared, candidate: &Prepared) -> f64 {
    if query.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&query.text, &candidate.text) * 100.0
}

#[must_use]
pub fn sub_scores(query: &Prepared, candidate: &Prepared) -> SubScores {
    SubScores {
        token_set: token_set_overlap(query, candidate),
        partial: partial_overlap(query, candidate),
        token_sort: token_sort_overlap(query, candidate),
        ratio: raw_ratio(query, candidate),
    }
}

/// Weighted sum of the measures, clamped to `[0, 100]`.
#[must_use]
pub fn fuse(scores: &SubScores, weights: &FusionWeights) -> f64 {
    let fused = scores.token_set * weights.token_set
        + scores.partial * weights.partial
        + scores.token_sort * weights.token_sort
        + scores.ratio * weights.ratio;
    fused.clamp(0.0, 100.0)
}

// ---------------------------------------------------------------------------
// SimilarityFusion
// ---------------------------------------------------------------------------

/// Fused similarity for one query against one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fused {
    pub scores: SubScores,
    pub profile: WeightProfile,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct SimilarityFusion {
    config: FusionConfig,
}

impl SimilarityFusion {
    #[must_use]
    pub const fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    /// Profile for a query with `token_count` tokens before expansion.
    #[must_use]
    pub const fn profile_for(&self, token_count: usize) -> WeightProfile {
        self.config.profile_for(token_count)
    }

    #[must_use]
    pub fn fuse(&self, query: &Prepared, candidate: &Prepared, profile: WeightProfile) -> Fused {
        let scores = sub_scores(query, candidate);
        Fused {
            scores,
            profile,
            score: fuse(&scores, self.config.weights(profile)),
        }
    }

    /// Convenience form over two already normalized strings. The profile is
    /// picked from the query's own token count.
    #[must_use]
    pub fn similarity(&self, query: &str, candidate: &str) -> f64 {
        let query = Prepared::new(query.to_string());
        let candidate = Prepared::new(candidate.to_string());
        let profile = self.profile_for(query.tokens.len());
        self.fuse(&query, &candidate, profile).score
    }
}

impl Default for SimilarityFusion {
    fn default() -> Self {
        Self::new(FusionConfig::default())
    }
}
