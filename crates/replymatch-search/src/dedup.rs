//! Near-duplicate consolidation across corpora.
//!
//! Used offline when merging several answer sets into one. Entries are
//! visited in corpus order, then row order, and each is compared with every
//! entry kept so far. The first occurrence wins; later near-copies are
//! dropped and reported with the id of the entry they duplicated.
//!
//! Two answers are near-duplicates when both are longer than
//! [`DedupConfig::min_length`] characters and either
//!
//! - one lower-cased answer contains the other, or
//! - more than [`DedupConfig::overlap_ratio`] of the shorter answer's words
//!   also occur in the longer one.
//!
//! Survivors are pairwise distinct under the same test, so consolidating a
//! consolidated corpus drops nothing.

use replymatch_core::config::DedupConfig;
use replymatch_core::model::CorpusEntry;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// An entry removed as a near-copy of an earlier one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedEntry {
    pub entry: CorpusEntry,
    /// `source_id` of the surviving entry it duplicated.
    pub duplicate_of: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsolidationReport {
    pub kept: Vec<CorpusEntry>,
    pub dropped: Vec<DroppedEntry>,
}

impl ConsolidationReport {
    #[must_use]
    pub fn input_count(&self) -> usize {
        self.kept.len() + self.dropped.len()
    }
}

struct Fingerprint {
    lower: String,
    words: HashSet<String>,
}

impl Fingerprint {
    fn new(answer: &str) -> Self {
        let lower = answer.to_lowercase();
        let words = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        Self { lower, words }
    }

    fn chars(&self) -> usize {
        self.lower.chars().count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DedupConsolidator {
    config: DedupConfig,
}

impl DedupConsolidator {
    #[must_use]
    pub const fn new(config: DedupConfig) -> Self {
        Self { config }
    }

    /// Merge `corpora` in order, dropping near-duplicates.
    #[instrument(skip_all, fields(corpora = corpora.len()))]
    pub fn consolidate(&self, corpora: &[Vec<CorpusEntry>]) -> ConsolidationReport {
        let mut kept: Vec<CorpusEntry> = Vec::new();
        let mut kept_prints: Vec<Fingerprint> = Vec::new();
        let mut dropped: Vec<DroppedEntry> = Vec::new();

        for entry in corpora.iter().flatten() {
            let print = Fingerprint::new(entry.answer_text());
            let original = kept_prints
                .iter()
                .position(|existing| self.prints_match(existing, &print));

            if let Some(index) = original {
                let duplicate_of = kept[index].source_id().to_string();
                debug!(dropped = entry.source_id(), %duplicate_of, "near-duplicate answer");
                dropped.push(DroppedEntry {
                    entry: entry.clone(),
                    duplicate_of,
                });
            } else {
                kept.push(entry.clone());
                kept_prints.push(print);
            }
        }

        info!(kept = kept.len(), dropped = dropped.len(), "consolidation finished");
        ConsolidationReport { kept, dropped }
    }

    /// Whether two answers are near-duplicates.
    #[must_use]
    pub fn is_duplicate(&self, a: &str, b: &str) -> bool {
        self.prints_match(&Fingerprint::new(a), &Fingerprint::new(b))
    }

    fn prints_match(&self, a: &Fingerprint, b: &Fingerprint) -> bool {
        let min = self.config.min_length;
        if a.chars() <= min || b.chars() <= min {
            return false;
        }
        if a.lower.contains(&b.lower) || b.lower.contains(&a.lower) {
            return true;
        }
        word_overlap(a, b) > self.config.overlap_ratio
    }
}

/// Share of the shorter answer's words found in the longer one. Equal-length
/// answers take the larger of the two directions so the test is symmetric.
fn word_overlap(a: &Fingerprint, b: &Fingerprint) -> f64 {
    let contained = |small: &Fingerprint, large: &Fingerprint| {
        if small.words.is_empty() {
            return 0.0;
        }
        small.words.intersection(&large.words).count() as f64 / small.words.len() as f64
    };

    match a.chars().cmp(&b.chars()) {
        std::cmp::Ordering::Less => contained(a, b),
        std::cmp::Ordering::Greater => contained(b, a),
        std::cmp::Ordering::Equal => contained(a, b).max(contained(b, a)),
    }
}
