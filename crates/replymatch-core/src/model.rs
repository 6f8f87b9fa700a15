//! Corpus and result types shared by the engine and the CLI.

use crate::error::CoreError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Ingestion shape
// ---------------------------------------------------------------------------

/// One record as it appears in a corpus file.
///
/// Corpus exports disagree on field names, so the answer text may arrive under
/// any of several keys. [`CorpusRecord::answer_text`] picks the first
/// non-empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusRecord {
    #[serde(default)]
    pub category: String,
    #[serde(default, alias = "subcategory", skip_serializing_if = "Option::is_none")]
    pub subtopic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(
        default,
        alias = "context_keywords",
        deserialize_with = "keywords_from_list_or_csv"
    )]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standardized_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    #[serde(default, alias = "source", skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl CorpusRecord {
    /// First non-empty answer field, trimmed.
    #[must_use]
    pub fn answer_text(&self) -> Option<&str> {
        [
            &self.answer,
            &self.standardized_response,
            &self.response_text,
            &self.response,
            &self.original_text,
        ]
        .into_iter()
        .flatten()
        .map(|text| text.trim())
        .find(|text| !text.is_empty())
    }

    /// Subtopic, falling back to the question text.
    #[must_use]
    pub fn subtopic_text(&self) -> &str {
        [&self.subtopic, &self.question]
            .into_iter()
            .flatten()
            .map(|text| text.trim())
            .find(|text| !text.is_empty())
            .unwrap_or("")
    }

    /// Turn the record into a draft entry.
    ///
    /// `fallback_id` is used when the record carries no `source_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyAnswer`] if no answer field has text.
    pub fn into_draft(self, fallback_id: impl Into<String>) -> Result<EntryDraft, CoreError> {
        let source_id = match self.source_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => fallback_id.into(),
        };

        let Some(answer_text) = self.answer_text().map(str::to_string) else {
            return Err(CoreError::EmptyAnswer { source_id });
        };
        let subtopic = self.subtopic_text().to_string();

        Ok(EntryDraft {
            category: self.category.trim().to_string(),
            subtopic,
            keywords: self.keywords,
            answer_text,
            source_id,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KeywordsField {
    List(Vec<String>),
    Csv(String),
    Missing(()),
}

fn keywords_from_list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let keywords = match KeywordsField::deserialize(deserializer)? {
        KeywordsField::List(list) => list,
        KeywordsField::Csv(csv) => csv.split(',').map(str::to_string).collect(),
        KeywordsField::Missing(()) => Vec::new(),
    };
    Ok(keywords)
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Validated entry fields awaiting a quality score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDraft {
    pub category: String,
    pub subtopic: String,
    pub keywords: Vec<String>,
    pub answer_text: String,
    pub source_id: String,
}

/// One curated answer. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusEntry {
    category: String,
    subtopic: String,
    keywords: Vec<String>,
    answer_text: String,
    source_id: String,
    quality_score: f64,
}

impl CorpusEntry {
    /// Build an entry from a draft and its precomputed quality score.
    ///
    /// Keywords are trimmed and de-duplicated keeping first occurrence.
    /// The quality score is clamped to `[0, 100]`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyAnswer`] if the answer text is blank.
    pub fn new(draft: EntryDraft, quality_score: f64) -> Result<Self, CoreError> {
        let answer_text = draft.answer_text.trim().to_string();
        if answer_text.is_empty() {
            return Err(CoreError::EmptyAnswer {
                source_id: draft.source_id,
            });
        }

        let mut keywords: Vec<String> = Vec::with_capacity(draft.keywords.len());
        for keyword in draft.keywords {
            let keyword = keyword.trim();
            if !keyword.is_empty() && !keywords.iter().any(|k| k == keyword) {
                keywords.push(keyword.to_string());
            }
        }

        let quality_score = if quality_score.is_finite() {
            quality_score.clamp(0.0, 100.0)
        } else {
            0.0
        };

        Ok(Self {
            category: draft.category,
            subtopic: draft.subtopic,
            keywords,
            answer_text,
            source_id: draft.source_id,
            quality_score,
        })
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    #[must_use]
    pub fn subtopic(&self) -> &str {
        &self.subtopic
    }

    #[must_use]
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    #[must_use]
    pub fn answer_text(&self) -> &str {
        &self.answer_text
    }

    #[must_use]
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    #[must_use]
    pub const fn quality_score(&self) -> f64 {
        self.quality_score
    }

    /// Subtopic, keywords and answer joined by single spaces.
    #[must_use]
    pub fn searchable_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.keywords.len() + 2);
        if !self.subtopic.is_empty() {
            parts.push(&self.subtopic);
        }
        parts.extend(self.keywords.iter().map(String::as_str));
        parts.push(&self.answer_text);
        parts.join(" ")
    }

    /// Back to the ingestion shape, for writing consolidated corpora.
    #[must_use]
    pub fn to_record(&self) -> CorpusRecord {
        CorpusRecord {
            category: self.category.clone(),
            subtopic: (!self.subtopic.is_empty()).then(|| self.subtopic.clone()),
            keywords: self.keywords.clone(),
            answer: Some(self.answer_text.clone()),
            source_id: Some(self.source_id.clone()),
            ..CorpusRecord::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring results
// ---------------------------------------------------------------------------

/// Confidence tier of a ranked answer.
///
/// | Tier               | Confidence   | Response                         |
/// |--------------------|--------------|----------------------------------|
/// | `direct`           | `>= 70`      | answer verbatim                  |
/// | `adapted`          | `40 ..< 70`  | answer with safe substitutions   |
/// | `closest_available`| `< 40`       | answer framed as closest match   |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Direct,
    Adapted,
    ClosestAvailable,
}

impl Tier {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Adapted => "adapted",
            Self::ClosestAvailable => "closest_available",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which fusion weight set a query length selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightProfile {
    Short,
    Medium,
    Long,
}

/// Every component that went into one entry's score for one query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub token_set: f64,
    pub partial: f64,
    pub token_sort: f64,
    pub ratio: f64,
    pub weight_profile: WeightProfile,
    /// Weighted fusion score in `[0, 100]`.
    pub base_score: f64,
    pub exact_bonus: f64,
    pub category_bonus: f64,
    pub keyword_bonus: f64,
    /// `base_score` plus all bonuses. May exceed 100.
    pub raw_score: f64,
    /// Penalized or clamped score in `[0, 100]`.
    pub final_score: f64,
    pub penalized: bool,
}

impl ScoreBreakdown {
    /// Sum of the three context bonuses.
    #[must_use]
    pub fn bonus_total(&self) -> f64 {
        self.exact_bonus + self.category_bonus + self.keyword_bonus
    }
}

/// A ranked answer ready for presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub entry: Arc<CorpusEntry>,
    /// Text to present, after adaptation or framing.
    pub response: String,
    /// Reported confidence after tier adjustment.
    pub confidence: f64,
    /// Final score before tier adjustment.
    pub raw_confidence: f64,
    pub quality_score: f64,
    pub tier: Tier,
    pub ranking_score: f64,
    pub breakdown: ScoreBreakdown,
    /// True only for the generic answer returned when nothing could be scored.
    pub fallback: bool,
    /// Names of the adaptation rules applied to `response`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub adaptations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(answer: &str) -> EntryDraft {
        EntryDraft {
            category: "Thermal".to_string(),
            subtopic: "R-value".to_string(),
            keywords: vec![
                " r-value ".to_string(),
                "thermal".to_string(),
                "r-value".to_string(),
                String::new(),
            ],
            answer_text: answer.to_string(),
            source_id: "faq:0".to_string(),
        }
    }

    #[test]
    fn entry_rejects_blank_answer() {
        let err = CorpusEntry::new(draft("   "), 50.0).expect_err("blank answer");
        assert!(matches!(err, CoreError::EmptyAnswer { ref source_id } if source_id == "faq:0"));
    }

    #[test]
    fn entry_dedupes_keywords_in_order() {
        let entry = CorpusEntry::new(draft("R4.0 per 100mm."), 50.0).expect("entry");
        assert_eq!(entry.keywords(), ["r-value", "thermal"]);
    }

    #[test]
    fn entry_clamps_quality() {
        let high = CorpusEntry::new(draft("text"), 140.0).expect("entry");
        assert!((high.quality_score() - 100.0).abs() < f64::EPSILON);
        let nan = CorpusEntry::new(draft("text"), f64::NAN).expect("entry");
        assert!(nan.quality_score().abs() < f64::EPSILON);
    }

    #[test]
    fn searchable_text_joins_fields() {
        let entry = CorpusEntry::new(draft("R4.0 per 100mm."), 50.0).expect("entry");
        assert_eq!(entry.searchable_text(), "R-value r-value thermal R4.0 per 100mm.");
    }

    #[test]
    fn record_picks_first_non_empty_answer_alias() {
        let record: CorpusRecord = serde_json::from_str(
            r#"{"category":"Pricing","standardized_response":"  ","response_text":"Contact us.","original_text":"ignored"}"#,
        )
        .expect("parse");
        assert_eq!(record.answer_text(), Some("Contact us."));
    }

    #[test]
    fn record_accepts_csv_keywords_and_aliases() {
        let record: CorpusRecord = serde_json::from_str(
            r#"{"category":"Pricing","subcategory":"Per m2","context_keywords":"pm2, cost","answer":"Quote.","source":"csv:4"}"#,
        )
        .expect("parse");
        let draft = record.into_draft("fallback:0").expect("draft");
        assert_eq!(draft.subtopic, "Per m2");
        assert_eq!(draft.keywords, vec!["pm2".to_string(), " cost".to_string()]);
        assert_eq!(draft.source_id, "csv:4");
    }

    #[test]
    fn record_without_source_uses_fallback_id() {
        let record: CorpusRecord =
            serde_json::from_str(r#"{"question":"Is it safe?","answer":"Yes."}"#).expect("parse");
        let draft = record.into_draft("faq:7").expect("draft");
        assert_eq!(draft.source_id, "faq:7");
        assert_eq!(draft.subtopic, "Is it safe?");
        assert!(draft.keywords.is_empty());
    }

    #[test]
    fn record_without_answer_is_rejected() {
        let record: CorpusRecord =
            serde_json::from_str(r#"{"category":"General","keywords":["x"]}"#).expect("parse");
        assert!(record.into_draft("faq:1").is_err());
    }

    #[test]
    fn tier_serializes_snake_case() {
        let json = serde_json::to_string(&Tier::ClosestAvailable).expect("serialize");
        assert_eq!(json, "\"closest_available\"");
    }
}
