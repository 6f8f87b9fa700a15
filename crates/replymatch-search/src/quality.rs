//! Query-independent content quality heuristic.
//!
//! A fixed base plus capped sub-scores for technical vocabulary, standards
//! references, professional language, service-area names, a topic indicator
//! bonus and completeness by length. Terms match on whole words of the
//! cleaned text, so `bal` does not fire inside `balance`.

use replymatch_core::config::{QualityConfig, Vocabulary};
use replymatch_core::model::{CorpusEntry, EntryDraft};
use replymatch_core::normalize::Normalizer;
use serde::Serialize;
use tracing::warn;

/// Per-component quality breakdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct QualityBreakdown {
    pub base: f64,
    pub technical: f64,
    pub standards: f64,
    pub professional: f64,
    pub locations: f64,
    pub category: f64,
    pub completeness: f64,
    pub total: f64,
}

#[derive(Debug, Clone)]
pub struct QualityScorer {
    config: QualityConfig,
}

impl QualityScorer {
    #[must_use]
    pub const fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    /// Quality in `[0, 100]`. Blank text scores 0.
    #[must_use]
    pub fn score(&self, text: &str, category: &str) -> f64 {
        self.breakdown(text, category).total
    }

    #[must_use]
    pub fn breakdown(&self, text: &str, category: &str) -> QualityBreakdown {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return QualityBreakdown::default();
        }

        let haystack = padded(trimmed);
        let cfg = &self.config;

        let mut out = QualityBreakdown {
            base: cfg.base,
            technical: vocabulary_score(&cfg.technical, &haystack),
            standards: vocabulary_score(&cfg.standards, &haystack),
            professional: vocabulary_score(&cfg.professional, &haystack),
            locations: vocabulary_score(&cfg.locations, &haystack),
            category: self.category_score(&haystack, category),
            completeness: self.completeness(trimmed.chars().count()),
            total: 0.0,
        };
        out.total = (out.base
            + out.technical
            + out.standards
            + out.professional
            + out.locations
            + out.category
            + out.completeness)
            .clamp(0.0, 100.0);
        out
    }

    /// Score each draft and build its entry. Drafts that fail validation are
    /// logged and skipped.
    #[must_use]
    pub fn build_entries(&self, drafts: Vec<EntryDraft>) -> Vec<CorpusEntry> {
        drafts
            .into_iter()
            .filter_map(|draft| {
                let score = self.score(&draft.answer_text, &draft.category);
                CorpusEntry::new(draft, score)
                    .map_err(|err| warn!(error = %err, "skipping entry"))
                    .ok()
            })
            .collect()
    }

    fn category_score(&self, haystack: &str, category: &str) -> f64 {
        let category = Normalizer::clean(category);
        if category.is_empty() {
            return 0.0;
        }

        let hit = self.config.category_indicators.iter().any(|topic| {
            topic.category_terms.iter().any(|t| category.contains(&Normalizer::clean(t)))
                && topic.indicators.iter().any(|i| contains_term(haystack, i))
        });

        if hit { self.config.category_bonus } else { 0.0 }
    }

    fn completeness(&self, chars: usize) -> f64 {
        self.config
            .length_steps
            .iter()
            .find(|step| chars > step.min_chars)
            .map_or(self.config.length_floor, |step| step.points)
    }
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new(QualityConfig::default())
    }
}

fn padded(text: &str) -> String {
    format!(" {} ", Normalizer::clean(text))
}

fn contains_term(haystack: &str, term: &str) -> bool {
    let term = Normalizer::clean(term);
    !term.is_empty() && haystack.contains(&format!(" {term} "))
}

fn vocabulary_score(vocabulary: &Vocabulary, haystack: &str) -> f64 {
    let raw: f64 = vocabulary
        .groups
        .iter()
        .map(|group| {
            let hits = group.terms.iter().filter(|t| contains_term(haystack, t)).count();
            hits as f64 * group.points
        })
        .sum();
    raw.min(vocabulary.cap)
}
