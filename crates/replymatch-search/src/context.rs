//! Contextual bonuses added on top of fused similarity.
//!
//! Three independent, non-negative bonuses reward a candidate for carrying
//! the query's distinctive words (`exact`), for sitting in a category the
//! query names (`category`), and for sharing meaningful keywords
//! (`keyword`). Bonuses only ever add to a score.

use crate::similarity::Prepared;
use replymatch_core::config::{ContextConfig, step_bonus};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ContextBonus {
    pub exact: f64,
    pub category: f64,
    pub keyword: f64,
}

impl ContextBonus {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.exact + self.category + self.keyword
    }
}

#[derive(Debug, Clone)]
pub struct ContextScorer {
    config: ContextConfig,
    stop_words: HashSet<String>,
}

impl ContextScorer {
    #[must_use]
    pub fn new(config: ContextConfig) -> Self {
        let stop_words = config.stop_words.iter().map(|w| w.to_lowercase()).collect();
        Self { config, stop_words }
    }

    /// Bonuses for one candidate. `category` is the cleaned category name.
    #[must_use]
    pub fn score(&self, query: &Prepared, candidate: &Prepared, category: &Prepared) -> ContextBonus {
        if query.is_empty() {
            return ContextBonus::default();
        }

        let significant: Vec<&str> = query
            .tokens()
            .iter()
            .map(String::as_str)
            .filter(|t| t.chars().count() > self.config.exact_min_token_chars)
            .collect();

        ContextBonus {
            exact: self.exact_bonus(&significant, candidate),
            category: self.category_bonus(&significant, query, category),
            keyword: self.keyword_bonus(query, candidate),
        }
    }

    fn exact_bonus(&self, significant: &[&str], candidate: &Prepared) -> f64 {
        let ratio = share_present(significant, candidate.token_set());
        ratio.map_or(0.0, |ratio| step_bonus(&self.config.exact_steps, ratio))
    }

    fn category_bonus(&self, significant: &[&str], query: &Prepared, category: &Prepared) -> f64 {
        if category.is_empty() {
            return 0.0;
        }
        if share_present(significant, category.token_set())
            .is_some_and(|ratio| ratio >= self.config.category_ratio)
        {
            return self.config.category_bonus;
        }
        if category_overlap(category, query) > self.config.category_partial_threshold {
            return self.config.category_partial_bonus;
        }
        0.0
    }

    fn keyword_bonus(&self, query: &Prepared, candidate: &Prepared) -> f64 {
        let query_words = self.meaningful(query);
        if query_words.is_empty() {
            return 0.0;
        }
        let candidate_words = self.meaningful(candidate);
        let common = query_words.intersection(&candidate_words).count() as f64;
        let density = common / query_words.len() as f64;
        step_bonus(&self.config.keyword_steps, density)
    }

    fn meaningful<'a>(&self, text: &'a Prepared) -> HashSet<&'a str> {
        text.token_set()
            .iter()
            .map(String::as_str)
            .filter(|t| t.chars().count() > self.config.keyword_max_ignored_chars)
            .filter(|t| !self.stop_words.contains(*t))
            .collect()
    }
}

impl Default for ContextScorer {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}

/// Partial overlap of the category name with the query on word boundaries.
///
/// 100 when either word sequence contains the other as a contiguous run,
/// else the share of category words that are query words.
fn category_overlap(category: &Prepared, query: &Prepared) -> f64 {
    if category.is_empty() || query.is_empty() {
        return 0.0;
    }
    let (cat, q) = (category.tokens(), query.tokens());
    if contains_run(q, cat) || contains_run(cat, q) {
        return 100.0;
    }
    let found = cat.iter().filter(|t| query.token_set().contains(*t)).count() as f64;
    found / cat.len() as f64 * 100.0
}

fn contains_run(haystack: &[String], needle: &[String]) -> bool {
    needle.len() <= haystack.len() && haystack.windows(needle.len()).any(|w| w == needle)
}

/// Share of `tokens` found in `set`, or `None` when `tokens` is empty.
fn share_present(tokens: &[&str], set: &HashSet<String>) -> Option<f64> {
    if tokens.is_empty() {
        return None;
    }
    let found = tokens.iter().filter(|t| set.contains(**t)).count() as f64;
    Some(found / tokens.len() as f64)
}
