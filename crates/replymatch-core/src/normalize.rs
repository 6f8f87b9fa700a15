//! Text normalization with domain synonym expansion.
//!
//! Queries and corpus text both pass through the same [`Normalizer`] so that
//! similarity is measured in one vocabulary. Normalization has two stages:
//!
//! 1. **Clean**: lower-case, replace punctuation with spaces, strip leading
//!    and trailing `-`/`.` from tokens, collapse whitespace. Internal hyphens
//!    and periods survive (`as-1530`, `r-4.5`).
//! 2. **Expand**: run the ordered rule table over the cleaned text and append
//!    the expansion words of every rule that matched. Original tokens are
//!    never removed, and a word already present is never appended twice.
//!
//! Rules are tried longest pattern first. A match that overlaps a span
//! already claimed in the same pass is skipped, so `thermal resistance`
//! claims its words before a shorter rule can. Expansion repeats until no
//! new words appear, which makes `normalize` idempotent.

use crate::config::{ExpansionRule, NormalizerConfig};
use crate::error::CoreError;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static DEFAULT: LazyLock<Normalizer> = LazyLock::new(Normalizer::default);

/// Normalize `text` with the built-in rule table.
#[must_use]
pub fn normalize(text: &str) -> String {
    DEFAULT.normalize(text)
}

/// Split a normalized string into tokens.
pub fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
}

#[derive(Debug, Clone)]
struct CompiledRule {
    pattern: Regex,
    expansion: Vec<String>,
}

/// A compiled expansion rule table.
#[derive(Debug, Clone)]
pub struct Normalizer {
    rules: Vec<CompiledRule>,
    max_passes: usize,
}

impl Normalizer {
    /// Compile a rule table.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRule`] for the first pattern that does not
    /// compile.
    pub fn new(config: &NormalizerConfig) -> Result<Self, CoreError> {
        Self::from_rules(&config.rules)
    }

    /// Compile an explicit list of rules.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRule`] for the first pattern that does not
    /// compile.
    pub fn from_rules(rules: &[ExpansionRule]) -> Result<Self, CoreError> {
        let mut ordered: Vec<&ExpansionRule> = rules.iter().collect();
        ordered.sort_by(|a, b| b.pattern.len().cmp(&a.pattern.len()));

        let mut compiled = Vec::with_capacity(ordered.len());
        let mut vocabulary: HashSet<String> = HashSet::new();
        for rule in ordered {
            let pattern = Regex::new(&rule.pattern).map_err(|source| CoreError::InvalidRule {
                pattern: rule.pattern.clone(),
                source,
            })?;
            let expansion: Vec<String> = Self::clean(&rule.expansion)
                .split_whitespace()
                .map(str::to_string)
                .collect();
            vocabulary.extend(expansion.iter().cloned());
            compiled.push(CompiledRule { pattern, expansion });
        }

        // Every productive pass adds at least one vocabulary word.
        let max_passes = vocabulary.len() + 1;

        Ok(Self {
            rules: compiled,
            max_passes,
        })
    }

    /// A normalizer that only cleans.
    #[must_use]
    pub const fn without_rules() -> Self {
        Self {
            rules: Vec::new(),
            max_passes: 1,
        }
    }

    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Lower-case, strip punctuation and collapse whitespace.
    #[must_use]
    pub fn clean(text: &str) -> String {
        let lowered = text.to_lowercase();
        let replaced: String = lowered
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c.is_whitespace() || c == '-' || c == '.' {
                    c
                } else {
                    ' '
                }
            })
            .collect();

        replaced
            .split_whitespace()
            .map(|token| token.trim_matches(|c| c == '-' || c == '.'))
            .filter(|token| !token.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Clean and expand `text`. Empty or punctuation-only input yields `""`.
    #[must_use]
    pub fn normalize(&self, text: &str) -> String {
        let mut current = Self::clean(text);
        if current.is_empty() || self.rules.is_empty() {
            return current;
        }

        for _ in 0..self.max_passes {
            match self.expand_once(&current) {
                Some(next) => current = next,
                None => break,
            }
        }
        current
    }

    /// One expansion pass. `None` when nothing new would be appended.
    fn expand_once(&self, text: &str) -> Option<String> {
        let present: HashSet<&str> = text.split_whitespace().collect();
        let mut claimed: Vec<(usize, usize)> = Vec::new();
        let mut additions: Vec<&str> = Vec::new();

        for rule in &self.rules {
            for found in rule.pattern.find_iter(text) {
                let (start, end) = (found.start(), found.end());
                if claimed.iter().any(|&(s, e)| start < e && s < end) {
                    continue;
                }
                claimed.push((start, end));

                for word in &rule.expansion {
                    let word = word.as_str();
                    if !present.contains(word) && !additions.contains(&word) {
                        additions.push(word);
                    }
                }
            }
        }

        if additions.is_empty() {
            return None;
        }

        let mut expanded = String::with_capacity(text.len() + additions.len() * 8);
        expanded.push_str(text);
        for word in additions {
            expanded.push(' ');
            expanded.push_str(word);
        }
        Some(expanded)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&NormalizerConfig::default()).unwrap_or_else(|err| {
            tracing::error!(error = %err, "default normalizer rules failed to compile");
            Self::without_rules()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rule(pattern: &str, expansion: &str) -> ExpansionRule {
        ExpansionRule {
            pattern: pattern.to_string(),
            expansion: expansion.to_string(),
        }
    }

    #[test]
    fn default_rules_compile() {
        let normalizer = Normalizer::new(&NormalizerConfig::default()).expect("compile");
        assert_eq!(normalizer.rule_count(), NormalizerConfig::default().rules.len());
    }

    #[test]
    fn clean_strips_punctuation_and_keeps_internal_hyphens() {
        assert_eq!(Normalizer::clean("  What's the R-Value?? "), "what s the r-value");
        assert_eq!(Normalizer::clean("AS-1530... compliant!"), "as-1530 compliant");
        assert_eq!(Normalizer::clean("-- r-4.5 --"), "r-4.5");
        assert_eq!(Normalizer::clean("?!"), "");
    }

    #[test]
    fn empty_input_normalizes_to_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   ...   "), "");
    }

    #[test]
    fn expansion_appends_without_removing_original() {
        let out = normalize("R-value of spray foam");
        assert!(out.starts_with("r-value of spray foam"));
        assert!(out.contains("thermal"));
        assert!(out.contains("resistance"));
        assert!(out.contains("polyurethane"));
    }

    #[test]
    fn words_already_present_are_not_repeated() {
        let out = normalize("thermal resistance");
        let count = out.split_whitespace().filter(|w| *w == "thermal").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn longer_rule_claims_span_first() {
        let normalizer = Normalizer::from_rules(&[
            rule(r"\bfire\b", "flame"),
            rule(r"\bfire\s+rating\b", "as1530"),
        ])
        .expect("compile");
        assert_eq!(normalizer.normalize("fire rating"), "fire rating as1530");
        assert_eq!(normalizer.normalize("fire"), "fire flame");
    }

    #[test]
    fn chained_expansions_reach_fixed_point() {
        let normalizer = Normalizer::from_rules(&[
            rule(r"\bpm2\b", "per m2"),
            rule(r"\bper\s+m2\b", "square meter"),
        ])
        .expect("compile");
        let out = normalizer.normalize("pm2");
        assert_eq!(out, "pm2 per m2 square meter");
        assert_eq!(normalizer.normalize(&out), out);
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = Normalizer::from_rules(&[rule(r"(unclosed", "x")]).expect_err("bad regex");
        assert_eq!(err.error_code(), crate::error::ErrorCode::InvalidExpansionRule);
    }

    #[test]
    fn pricing_query_expands_to_cost_vocabulary() {
        let out = normalize("how much pm2");
        for word in ["cost", "price", "pricing", "per", "square", "meter"] {
            assert!(out.split_whitespace().any(|w| w == word), "missing {word} in {out}");
        }
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(text in "[a-zA-Z0-9 .,?!'-]{0,80}") {
            let once = normalize(&text);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_domain_phrases_are_idempotent(
            words in proptest::collection::vec(
                prop_oneof![
                    Just("r-value"), Just("spray foam"), Just("as 1530"), Just("pm2"),
                    Just("per m2"), Just("cable"), Just("dogs"), Just("vapour barrier"),
                    Just("fire rating"), Just("how much"), Just("melbourne"), Just("the"),
                ],
                0..8,
            )
        ) {
            let text = words.join(" ");
            let once = normalize(&text);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_clean_output_has_no_outer_punctuation(text in ".{0,60}") {
            let cleaned = Normalizer::clean(&text);
            for token in cleaned.split_whitespace() {
                prop_assert!(!token.starts_with(['-', '.']));
                prop_assert!(!token.ends_with(['-', '.']));
            }
        }
    }
}
