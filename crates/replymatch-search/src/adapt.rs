//! Safe textual adaptation of mid-confidence answers.
//!
//! Query triggers match whole words of the cleaned query. A trigger word
//! also matches its plural, so `dog` fires on "dogs" but `pet` does not fire
//! on "carpet" or "petrol".

use replymatch_core::config::{AdaptationConfig, AdaptationRule};
use replymatch_core::normalize::Normalizer;

#[derive(Debug, Clone, Default)]
pub struct Adapter {
    rules: Vec<AdaptationRule>,
}

/// An adapted response and the names of the rules that changed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adapted {
    pub text: String,
    pub applied: Vec<String>,
}

impl Adapter {
    #[must_use]
    pub fn new(config: &AdaptationConfig) -> Self {
        let rules = config
            .rules
            .iter()
            .map(|rule| AdaptationRule {
                query_triggers: rule
                    .query_triggers
                    .iter()
                    .map(String::as_str)
                    .map(Normalizer::clean)
                    .collect(),
                requires: lowered(&rule.requires),
                forbids: lowered(&rule.forbids),
                ..rule.clone()
            })
            .collect();
        Self { rules }
    }

    /// Apply every matching rule in order. Each rule replaces only the first
    /// occurrence of its `find` text.
    #[must_use]
    pub fn adapt(&self, answer: &str, query: &str) -> Adapted {
        let cleaned = Normalizer::clean(query);
        let words: Vec<&str> = cleaned.split_whitespace().collect();
        let mut text = answer.to_string();
        let mut applied = Vec::new();

        for rule in &self.rules {
            if !rule.query_triggers.iter().any(|t| mentions(&words, t)) {
                continue;
            }

            let lower = text.to_lowercase();
            let requirements_met = rule.requires.iter().all(|t| lower.contains(t.as_str()));
            let forbidden = rule.forbids.iter().any(|t| lower.contains(t.as_str()));
            if !requirements_met || forbidden || !text.contains(&rule.find) {
                continue;
            }

            text = text.replacen(&rule.find, &rule.replace, 1);
            applied.push(rule.name.clone());
        }

        Adapted { text, applied }
    }
}

/// Whether `trigger` (one or more cleaned words) occurs as a run of whole
/// words in `words`.
fn mentions(words: &[&str], trigger: &str) -> bool {
    let wanted: Vec<&str> = trigger.split_whitespace().collect();
    if wanted.is_empty() || wanted.len() > words.len() {
        return false;
    }
    words.windows(wanted.len()).any(|window| {
        window
            .iter()
            .zip(&wanted)
            .all(|(word, want)| same_word(word, want))
    })
}

fn same_word(word: &str, trigger: &str) -> bool {
    word.strip_prefix(trigger)
        .is_some_and(|rest| rest.is_empty() || rest == "s" || rest == "es")
}

fn lowered(terms: &[String]) -> Vec<String> {
    terms.iter().map(|t| t.to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> Adapter {
        Adapter::new(&AdaptationConfig::default())
    }

    #[test]
    fn pet_query_qualifies_non_toxic_claim() {
        let out = adapter().adapt(
            "Once cured the foam is inert and non-toxic. It is non-toxic to handle.",
            "Is it safe for my dog?",
        );
        assert_eq!(
            out.text,
            "Once cured the foam is inert and non-toxic for pets. It is non-toxic to handle."
        );
        assert_eq!(out.applied, vec!["pets".to_string()]);
    }

    #[test]
    fn answer_already_mentioning_pets_is_left_alone() {
        let answer = "It is non-toxic and safe around pets once cured.";
        let out = adapter().adapt(answer, "what about my pet");
        assert_eq!(out.text, answer);
        assert!(out.applied.is_empty());
    }

    #[test]
    fn cable_rule_needs_both_required_terms() {
        let answer = "We spray around electrical fittings with care.";
        let out = adapter().adapt(answer, "can you spray near a cable");
        assert_eq!(out.text, "We spray around electrical cables fittings with care.");

        let answer = "Electrical work is done by others.";
        assert_eq!(adapter().adapt(answer, "cable").text, answer);
    }

    #[test]
    fn pricing_rule_rewrites_contact() {
        let out = adapter().adapt("Please contact the office for a quote.", "price pm2?");
        assert_eq!(out.text, "Please contact us for per m2 pricing the office for a quote.");
    }

    #[test]
    fn trigger_inside_a_longer_word_does_not_fire() {
        let answer = "Once cured the foam is inert and non-toxic.";
        for query in [
            "is foam toxic under carpet",
            "how do you compare to a competitor",
            "petrol smell",
            "toxic during application",
        ] {
            let out = adapter().adapt(answer, query);
            assert_eq!(out.text, answer, "query {query:?}");
            assert!(out.applied.is_empty());
        }
    }

    #[test]
    fn plural_trigger_and_multi_word_trigger_fire() {
        let out = adapter().adapt("It is non-toxic once cured.", "Is it safe for dogs?");
        assert_eq!(out.applied, vec!["pets".to_string()]);

        let out = adapter().adapt("It is non-toxic once cured.", "will it bother my cat");
        assert_eq!(out.applied, vec!["pets".to_string()]);

        let out = adapter().adapt("Please contact the office.", "price per m2");
        assert_eq!(out.applied, vec!["per_m2_pricing".to_string()]);
    }

    #[test]
    fn no_trigger_no_change() {
        let answer = "It is non-toxic once cured.";
        let out = adapter().adapt(answer, "how long does curing take");
        assert_eq!(out.text, answer);
    }
}
