//! Tiered relevance ranking over an immutable corpus.
//!
//! # Overview
//!
//! [`RankingEngine`] owns a [`Corpus`] handle and an [`EngineConfig`]. At
//! construction every entry's searchable text is normalized once and cached.
//! Per query the engine
//!
//! 1. normalizes the query once,
//! 2. scores each entry as fused similarity plus context bonuses (in
//!    parallel, entries are independent),
//! 3. scales raw scores under the penalty threshold, clamps the rest to 100,
//! 4. sorts by final score, then quality, then corpus order,
//! 5. classifies the top result into a [`Tier`].
//!
//! Ranking is total: an empty query yields a low-confidence closest match and
//! an empty corpus yields a configured generic answer flagged as `fallback`.

use crate::adapt::Adapter;
use crate::context::ContextScorer;
use crate::quality::QualityScorer;
use crate::similarity::{Prepared, SimilarityFusion};
use crate::SearchError;
use rayon::prelude::*;
use replymatch_core::config::{EngineConfig, RankingConfig};
use replymatch_core::model::{
    CorpusEntry, EntryDraft, MatchResult, ScoreBreakdown, Tier, WeightProfile,
};
use replymatch_core::normalize::Normalizer;
use std::cmp::Ordering as CmpOrdering;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, instrument};

// ---------------------------------------------------------------------------
// Corpus
// ---------------------------------------------------------------------------

/// An immutable, ordered set of entries.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    entries: Vec<Arc<CorpusEntry>>,
}

impl Corpus {
    #[must_use]
    pub fn new(entries: Vec<CorpusEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(Arc::new).collect(),
        }
    }

    /// Score each draft's quality and build entries.
    #[must_use]
    pub fn from_drafts(drafts: Vec<EntryDraft>, quality: &QualityScorer) -> Self {
        Self::new(quality.build_entries(drafts))
    }

    #[must_use]
    pub fn entries(&self) -> &[Arc<CorpusEntry>] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Options and cancellation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankOptions {
    /// Maximum number of results.
    pub limit: usize,
    /// Results whose raw confidence is below this are dropped, unless that
    /// would leave nothing. Reported confidence is floored per tier and is
    /// not used here.
    pub min_confidence: f64,
}

impl Default for RankOptions {
    fn default() -> Self {
        Self {
            limit: RankingConfig::default().default_limit,
            min_confidence: 0.0,
        }
    }
}

/// Cooperative cancellation flag shared with a running ranking.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Indexed {
    entry: Arc<CorpusEntry>,
    text: Prepared,
    category: Prepared,
}

struct Query {
    prepared: Prepared,
    profile: WeightProfile,
}

#[derive(Debug, Clone)]
struct Scored {
    index: usize,
    breakdown: ScoreBreakdown,
}

pub struct RankingEngine {
    config: EngineConfig,
    normalizer: Normalizer,
    fusion: SimilarityFusion,
    context: ContextScorer,
    adapter: Adapter,
    index: Vec<Indexed>,
    fallback: Arc<CorpusEntry>,
}

impl std::fmt::Debug for RankingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankingEngine")
            .field("entries", &self.index.len())
            .field("rules", &self.normalizer.rule_count())
            .finish_non_exhaustive()
    }
}

impl RankingEngine {
    /// Validate `config`, compile its normalizer and index `corpus`.
    ///
    /// # Errors
    ///
    /// Fails if the config does not validate or a normalizer rule does not
    /// compile.
    pub fn new(corpus: &Corpus, config: EngineConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let normalizer = Normalizer::new(&config.normalizer)?;

        let index = corpus
            .entries()
            .par_iter()
            .filter(|entry| !entry.answer_text().trim().is_empty())
            .map(|entry| Indexed {
                entry: Arc::clone(entry),
                text: Prepared::new(normalizer.normalize(&entry.searchable_text())),
                category: Prepared::new(Normalizer::clean(entry.category())),
            })
            .collect();

        let quality = QualityScorer::new(config.quality.clone());
        let fallback_draft = EntryDraft {
            category: config.ranking.fallback_category.clone(),
            subtopic: String::new(),
            keywords: Vec::new(),
            answer_text: config.ranking.fallback_answer.clone(),
            source_id: "fallback".to_string(),
        };
        let fallback_quality = quality.score(
            &fallback_draft.answer_text,
            &fallback_draft.category,
        );
        let fallback = Arc::new(CorpusEntry::new(fallback_draft, fallback_quality)?);

        Ok(Self {
            fusion: SimilarityFusion::new(config.fusion.clone()),
            context: ContextScorer::new(config.context.clone()),
            adapter: Adapter::new(&config.adaptation),
            config,
            normalizer,
            index,
            fallback,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Best answer for `query`. Never fails.
    #[instrument(skip(self))]
    pub fn rank(&self, query: &str) -> MatchResult {
        let prepared = self.prepare(query);
        let scored = self.score_all(&prepared, None).unwrap_or_default();
        let result = scored.first().map_or_else(
            || self.fallback_result(&prepared),
            |top| self.tiered(top, query),
        );
        debug!(
            tier = %result.tier,
            confidence = result.confidence,
            raw = result.raw_confidence,
            source = result.entry.source_id(),
            "ranked"
        );
        result
    }

    /// Like [`rank`](Self::rank), but stops early when `cancel` is tripped.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Cancelled`] if cancellation was observed.
    pub fn rank_cancellable(
        &self,
        query: &str,
        cancel: &CancelToken,
    ) -> Result<MatchResult, SearchError> {
        let prepared = self.prepare(query);
        let scored = self.score_all(&prepared, Some(cancel))?;
        Ok(scored.first().map_or_else(
            || self.fallback_result(&prepared),
            |top| self.tiered(top, query),
        ))
    }

    /// Up to `options.limit` tiered results, best first. Never empty.
    #[instrument(skip(self))]
    pub fn rank_top(&self, query: &str, options: &RankOptions) -> Vec<MatchResult> {
        let prepared = self.prepare(query);
        let scored = self.score_all(&prepared, None).unwrap_or_default();
        if scored.is_empty() {
            return vec![self.fallback_result(&prepared)];
        }

        let mut all = scored.iter().map(|s| self.tiered(s, query));
        let Some(best) = all.next() else {
            return vec![self.fallback_result(&prepared)];
        };

        let limit = options.limit.max(1);
        let results: Vec<MatchResult> = std::iter::once(best.clone())
            .chain(all)
            .filter(|r| r.raw_confidence >= options.min_confidence)
            .take(limit)
            .collect();

        if results.is_empty() { vec![best] } else { results }
    }

    /// Full scoring breakdown of `entry` against `query`.
    #[must_use]
    pub fn score_entry(&self, query: &str, entry: &CorpusEntry) -> ScoreBreakdown {
        let prepared = self.prepare(query);
        let indexed = Indexed {
            entry: Arc::new(entry.clone()),
            text: Prepared::new(self.normalizer.normalize(&entry.searchable_text())),
            category: Prepared::new(Normalizer::clean(entry.category())),
        };
        self.breakdown(&prepared, &indexed)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn prepare(&self, query: &str) -> Query {
        let cleaned_tokens = Normalizer::clean(query).split_whitespace().count();
        Query {
            prepared: Prepared::new(self.normalizer.normalize(query)),
            profile: self.fusion.profile_for(cleaned_tokens),
        }
    }

    fn breakdown(&self, query: &Query, item: &Indexed) -> ScoreBreakdown {
        let fused = self.fusion.fuse(&query.prepared, &item.text, query.profile);
        let bonus = self.context.score(&query.prepared, &item.text, &item.category);

        let raw_score = fused.score + bonus.total();
        let ranking = &self.config.ranking;
        let penalized = raw_score < ranking.penalty_threshold;
        let final_score = if penalized {
            raw_score * ranking.penalty_factor
        } else {
            raw_score.min(100.0)
        };

        ScoreBreakdown {
            token_set: fused.scores.token_set,
            partial: fused.scores.partial,
            token_sort: fused.scores.token_sort,
            ratio: fused.scores.ratio,
            weight_profile: fused.profile,
            base_score: fused.score,
            exact_bonus: bonus.exact,
            category_bonus: bonus.category,
            keyword_bonus: bonus.keyword,
            raw_score,
            final_score: final_score.clamp(0.0, 100.0),
            penalized,
        }
    }

    /// Score every entry and sort best first.
    fn score_all(
        &self,
        query: &Query,
        cancel: Option<&CancelToken>,
    ) -> Result<Vec<Scored>, SearchError> {
        let mut scored = self
            .index
            .par_iter()
            .enumerate()
            .map(|(index, item)| {
                if cancel.is_some_and(CancelToken::is_cancelled) {
                    return Err(SearchError::Cancelled);
                }
                Ok(Scored {
                    index,
                    breakdown: self.breakdown(query, item),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(SearchError::Cancelled);
        }

        scored.sort_by(|a, b| self.order(a, b));
        Ok(scored)
    }

    fn order(&self, a: &Scored, b: &Scored) -> CmpOrdering {
        let quality = |s: &Scored| self.index[s.index].entry.quality_score();
        b.breakdown
            .final_score
            .total_cmp(&a.breakdown.final_score)
            .then_with(|| quality(b).total_cmp(&quality(a)))
            .then_with(|| a.index.cmp(&b.index))
    }

    fn tiered(&self, scored: &Scored, query: &str) -> MatchResult {
        let ranking = &self.config.ranking;
        let entry = Arc::clone(&self.index[scored.index].entry);
        let score = scored.breakdown.final_score;

        let (tier, response, confidence, adaptations) = if score >= ranking.direct_threshold {
            (Tier::Direct, entry.answer_text().to_string(), score, Vec::new())
        } else if score >= ranking.adapted_threshold {
            let adapted = self.adapter.adapt(entry.answer_text(), query);
            let confidence = (score + ranking.adapted_boost).min(ranking.adapted_cap);
            (Tier::Adapted, adapted.text, confidence, adapted.applied)
        } else {
            let response = format!("{}{}", ranking.closest_prefix, entry.answer_text());
            let confidence = score.max(ranking.closest_floor);
            (Tier::ClosestAvailable, response, confidence, Vec::new())
        };

        MatchResult {
            ranking_score: self.ranking_score(confidence, entry.quality_score()),
            quality_score: entry.quality_score(),
            entry,
            response,
            confidence,
            raw_confidence: score,
            tier,
            breakdown: scored.breakdown,
            fallback: false,
            adaptations,
        }
    }

    fn fallback_result(&self, query: &Query) -> MatchResult {
        let ranking = &self.config.ranking;
        let entry = Arc::clone(&self.fallback);
        let confidence = ranking.closest_floor;

        MatchResult {
            response: entry.answer_text().to_string(),
            ranking_score: self.ranking_score(confidence, entry.quality_score()),
            quality_score: entry.quality_score(),
            entry,
            confidence,
            raw_confidence: 0.0,
            tier: Tier::ClosestAvailable,
            breakdown: ScoreBreakdown {
                token_set: 0.0,
                partial: 0.0,
                token_sort: 0.0,
                ratio: 0.0,
                weight_profile: query.profile,
                base_score: 0.0,
                exact_bonus: 0.0,
                category_bonus: 0.0,
                keyword_bonus: 0.0,
                raw_score: 0.0,
                final_score: 0.0,
                penalized: false,
            },
            fallback: true,
            adaptations: Vec::new(),
        }
    }

    fn ranking_score(&self, confidence: f64, quality: f64) -> f64 {
        let ranking = &self.config.ranking;
        confidence * ranking.confidence_weight + quality * ranking.quality_weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(id: &str, category: &str, subtopic: &str, keywords: &[&str], answer: &str) -> EntryDraft {
        EntryDraft {
            category: category.to_string(),
            subtopic: subtopic.to_string(),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            answer_text: answer.to_string(),
            source_id: id.to_string(),
        }
    }

    fn engine(drafts: Vec<EntryDraft>) -> RankingEngine {
        let corpus = Corpus::from_drafts(drafts, &QualityScorer::default());
        RankingEngine::new(&corpus, EngineConfig::default()).expect("engine")
    }

    fn sample() -> RankingEngine {
        engine(vec![
            draft(
                "faq:0",
                "Thermal Performance",
                "R-value",
                &["r-value", "thermal resistance"],
                "Closed-cell spray foam delivers an R-value of about R4.0 per 100mm.",
            ),
            draft(
                "faq:1",
                "Acoustics",
                "Soundproofing",
                &["noise", "soundproofing"],
                "Open-cell foam reduces airborne noise between rooms.",
            ),
            draft(
                "faq:2",
                "Pet Safety",
                "Is it safe for pets",
                &["dogs", "cats"],
                "Once cured the foam is inert and non-toxic.",
            ),
        ])
    }

    #[test]
    fn empty_corpus_returns_flagged_fallback() {
        let engine = engine(Vec::new());
        let result = engine.rank("anything at all");
        assert!(result.fallback);
        assert_eq!(result.tier, Tier::ClosestAvailable);
        assert!((result.confidence - 60.0).abs() < f64::EPSILON);
        assert_eq!(result.response, RankingConfig::default().fallback_answer);
    }

    #[test]
    fn rank_prefers_topical_entry() {
        let result = sample().rank("what is the r-value of spray foam");
        assert_eq!(result.entry.source_id(), "faq:0");
        assert!(!result.fallback);
    }

    #[test]
    fn penalty_applies_below_threshold() {
        let engine = sample();
        let entry = engine.index[1].entry.clone();
        let breakdown = engine.score_entry("warranty period", &entry);
        assert!(breakdown.raw_score < 60.0);
        assert!(breakdown.penalized);
        assert!((breakdown.final_score - breakdown.raw_score * 0.8).abs() < 1e-9);
    }

    #[test]
    fn closest_available_is_framed_and_floored() {
        let result = sample().rank("warranty period");
        assert_eq!(result.tier, Tier::ClosestAvailable);
        assert!(result.response.starts_with("Based on closest match: "));
        assert!((result.confidence - 60.0).abs() < f64::EPSILON);
        assert!(result.raw_confidence < 40.0);
    }

    #[test]
    fn ranking_score_blends_confidence_and_quality() {
        let result = sample().rank("r-value");
        let expected = result.confidence * 0.7 + result.quality_score * 0.3;
        assert!((result.ranking_score - expected).abs() < 1e-9);
    }

    #[test]
    fn rank_top_honours_limit_and_never_empties() {
        let engine = sample();
        let two = engine.rank_top("foam", &RankOptions { limit: 2, min_confidence: 0.0 });
        assert_eq!(two.len(), 2);

        let strict = engine.rank_top("foam", &RankOptions { limit: 3, min_confidence: 99.9 });
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].entry.source_id(), engine.rank("foam").entry.source_id());
    }

    #[test]
    fn min_confidence_drops_weak_matches_despite_the_floor() {
        let engine = sample();
        let all = engine.rank_top("warranty period", &RankOptions { limit: 3, min_confidence: 0.0 });
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|r| r.tier == Tier::ClosestAvailable));

        let filtered = engine.rank_top("warranty period", &RankOptions { limit: 3, min_confidence: 50.0 });
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].entry.source_id(), engine.rank("warranty period").entry.source_id());
        assert!((filtered[0].confidence - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cancelled_token_stops_ranking() {
        let engine = sample();
        let token = CancelToken::new();
        token.cancel();
        assert!(matches!(
            engine.rank_cancellable("foam", &token),
            Err(SearchError::Cancelled)
        ));
        assert!(engine.rank_cancellable("foam", &CancelToken::new()).is_ok());
    }

    #[test]
    fn ties_fall_back_to_quality_then_order() {
        let engine = engine(vec![
            draft("a", "General", "", &[], "Plain answer."),
            draft("b", "General", "", &[], "Plain answer."),
        ]);
        let results = engine.rank_top("plain answer", &RankOptions { limit: 2, min_confidence: 0.0 });
        assert_eq!(results[0].entry.source_id(), "a");
        assert_eq!(results[1].entry.source_id(), "b");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.ranking.direct_threshold = 30.0;
        let err = RankingEngine::new(&Corpus::default(), config).expect_err("invalid");
        assert_eq!(err.error_code(), replymatch_core::ErrorCode::ConfigInvalid);
    }
}
