//! End-to-end ranking behaviour on a small curated corpus.

use proptest::prelude::*;
use replymatch_core::config::{EngineConfig, FusionConfig};
use replymatch_core::corpus::parse_corpus;
use replymatch_core::model::{CorpusEntry, EntryDraft, Tier, WeightProfile};
use replymatch_search::similarity::{SubScores, fuse};
use replymatch_search::{Corpus, DedupConsolidator, QualityScorer, RankOptions, RankingEngine};
use std::sync::LazyLock;

static ENGINE: LazyLock<RankingEngine> = LazyLock::new(|| {
    let loaded = parse_corpus("faq", include_str!("fixtures/corpus.json")).expect("fixture parses");
    let corpus = Corpus::from_drafts(loaded.drafts, &QualityScorer::default());
    RankingEngine::new(&corpus, EngineConfig::default()).expect("engine")
});

#[test]
fn standards_query_returns_fire_answer_directly() {
    let result = ENGINE.rank("fire safety standards");

    assert_eq!(result.entry.source_id(), "faq:fire");
    assert_eq!(result.tier, Tier::Direct);
    assert!(result.confidence >= 70.0, "confidence {}", result.confidence);
    assert_eq!(result.response, result.entry.answer_text());
    assert!(!result.fallback);
}

#[test]
fn empty_query_degrades_to_closest_available() {
    let result = ENGINE.rank("");

    assert_eq!(result.tier, Tier::ClosestAvailable);
    assert!((result.confidence - 60.0).abs() < f64::EPSILON);
    assert!(result.response.starts_with("Based on closest match: "));
    assert!(result.raw_confidence.abs() < f64::EPSILON);
    assert!(!result.fallback);
}

#[test]
fn pricing_shorthand_reaches_pricing_answer() {
    let result = ENGINE.rank("how much pm2");

    assert_eq!(result.entry.source_id(), "faq:pricing");
    assert_eq!(result.tier, Tier::Direct);
    assert!(result.breakdown.keyword_bonus > 0.0);
}

#[test]
fn weight_profile_follows_query_length() {
    let short = ENGINE.rank("cost");
    let long = ENGINE.rank("what is the r-value of closed cell spray foam insulation in melbourne");

    assert_eq!(short.breakdown.weight_profile, WeightProfile::Short);
    assert_eq!(long.breakdown.weight_profile, WeightProfile::Long);

    let set_only = SubScores {
        token_set: 100.0,
        ..SubScores::default()
    };
    let fusion = FusionConfig::default();
    assert!((fuse(&set_only, &fusion.short) - 45.0).abs() < 1e-9);
    assert!((fuse(&set_only, &fusion.long) - 30.0).abs() < 1e-9);
}

fn fixture_entry(source_id: &str) -> CorpusEntry {
    let loaded = parse_corpus("faq", include_str!("fixtures/corpus.json")).expect("fixture parses");
    QualityScorer::default()
        .build_entries(loaded.drafts)
        .into_iter()
        .find(|entry| entry.source_id() == source_id)
        .expect("fixture entry")
}

#[test]
fn short_and_long_pricing_queries_fuse_differently() {
    let pricing = fixture_entry("faq:pricing");
    let short = ENGINE.score_entry("cost", &pricing);
    let long = ENGINE.score_entry("how much does installation cost per square meter", &pricing);

    assert_eq!(short.weight_profile, WeightProfile::Short);
    assert_eq!(long.weight_profile, WeightProfile::Long);
    assert!(
        (short.base_score - long.base_score).abs() > 1.0,
        "short {} long {}",
        short.base_score,
        long.base_score
    );
}

#[test]
fn min_confidence_filters_weak_matches_on_raw_confidence() {
    let everything = ENGINE.rank_top("warranty period", &RankOptions { limit: 6, min_confidence: 0.0 });
    assert_eq!(everything.len(), 6);

    let filtered = ENGINE.rank_top("warranty period", &RankOptions { limit: 6, min_confidence: 50.0 });
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].tier, Tier::ClosestAvailable);
    assert_eq!(filtered[0].entry.source_id(), ENGINE.rank("warranty period").entry.source_id());
}

#[test]
fn mid_confidence_answer_is_adapted_for_pets() {
    let result = ENGINE.rank("toxic to dogs");

    assert_eq!(result.entry.source_id(), "faq:pets");
    assert_eq!(result.tier, Tier::Adapted);
    assert!(result.response.contains("non-toxic for pets"));
    assert_eq!(result.adaptations, vec!["pets".to_string()]);
    assert!(
        (result.confidence - (result.raw_confidence + 10.0).min(85.0)).abs() < 1e-9,
        "adapted confidence is boosted and capped"
    );
}

#[test]
fn top_n_is_sorted_and_limited() {
    let results = ENGINE.rank_top("foam", &RankOptions { limit: 4, min_confidence: 0.0 });

    assert_eq!(results.len(), 4);
    for pair in results.windows(2) {
        assert!(pair[0].raw_confidence >= pair[1].raw_confidence);
    }
}

#[test]
fn ranking_is_deterministic() {
    let first = ENGINE.rank_top("closed cell foam", &RankOptions::default());
    let second = ENGINE.rank_top("closed cell foam", &RankOptions::default());
    assert_eq!(first, second);
}

#[test]
fn merged_corpora_keep_the_earlier_copy() {
    let answer = "Closed-cell spray foam is applied by our certified team across Melbourne \
                  and regional Victoria, and every job is checked against the relevant \
                  Australian standards before sign-off so you get a compliant result.";
    let near_copy = answer.replace("every job", "each job");

    let entry = |id: &str, text: &str| {
        CorpusEntry::new(
            EntryDraft {
                category: "Standards".to_string(),
                subtopic: String::new(),
                keywords: Vec::new(),
                answer_text: text.to_string(),
                source_id: id.to_string(),
            },
            60.0,
        )
        .expect("entry")
    };

    let report = DedupConsolidator::default()
        .consolidate(&[vec![entry("first:0", answer)], vec![entry("second:0", &near_copy)]]);

    assert_eq!(report.kept.len(), 1);
    assert_eq!(report.kept[0].source_id(), "first:0");
    assert_eq!(report.dropped.len(), 1);
    assert_eq!(report.dropped[0].duplicate_of, "first:0");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_ranking_is_total(query in "[a-zA-Z0-9 ?'-]{0,60}") {
        let result = ENGINE.rank(&query);
        prop_assert!((0.0..=100.0).contains(&result.confidence));
        prop_assert!((0.0..=100.0).contains(&result.raw_confidence));
        prop_assert!(!result.response.is_empty());
    }

    #[test]
    fn prop_penalty_is_applied_below_threshold(query in "[a-z ]{0,40}") {
        for entry in ENGINE.rank_top(&query, &RankOptions { limit: 10, min_confidence: 0.0 }) {
            let b = entry.breakdown;
            if b.raw_score < 60.0 {
                prop_assert!(b.penalized);
                prop_assert!((b.final_score - b.raw_score * 0.8).abs() < 1e-9);
            } else {
                prop_assert!((b.final_score - b.raw_score.min(100.0)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn prop_tier_matches_raw_confidence(query in "[a-z ]{1,40}") {
        let result = ENGINE.rank(&query);
        let expected = if result.raw_confidence >= 70.0 {
            Tier::Direct
        } else if result.raw_confidence >= 40.0 {
            Tier::Adapted
        } else {
            Tier::ClosestAvailable
        };
        prop_assert_eq!(result.tier, expected);
    }
}
