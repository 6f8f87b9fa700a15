//! Engine configuration.
//!
//! Every weight, bonus, threshold and vocabulary the ranking engine uses lives
//! here with its default value. A `replymatch.toml` file may override any
//! subset of fields; missing fields fall back to the defaults below.
//!
//! ```toml
//! [ranking]
//! direct_threshold = 72.0
//!
//! [fusion.short]
//! token_set = 0.5
//! partial = 0.2
//! token_sort = 0.2
//! ratio = 0.1
//! ```

use crate::error::CoreError;
use crate::model::WeightProfile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "replymatch.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub normalizer: NormalizerConfig,
    pub fusion: FusionConfig,
    pub context: ContextConfig,
    pub quality: QualityConfig,
    pub ranking: RankingConfig,
    pub adaptation: AdaptationConfig,
    pub dedup: DedupConfig,
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// One `pattern -> expansion` rewrite. The pattern is a regex matched against
/// cleaned, lower-cased text; the expansion words are appended, never
/// substituted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionRule {
    pub pattern: String,
    pub expansion: String,
}

impl ExpansionRule {
    fn new(pattern: &str, expansion: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            expansion: expansion.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub rules: Vec<ExpansionRule>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            rules: default_expansion_rules(),
        }
    }
}

fn default_expansion_rules() -> Vec<ExpansionRule> {
    [
        // thermal performance
        (r"\br[-\s]?values?\b", "thermal resistance r value"),
        (r"\bthermal\s+resistance\b", "r value thermal resistance"),
        (r"\bthermal\s+bridg\w*\b", "thermal bridging cold bridge heat transfer"),
        (r"\bcold\s+bridge\b", "thermal bridging cold bridge heat transfer"),
        (r"\benergy\s+effic\w*\b", "energy efficiency thermal performance"),
        (r"\bheat\s+transfer\b", "thermal bridging heat transfer"),
        // standards and compliance
        (r"\bas\s?-?\d{4}(?:\.\d+)?\b", "australian standard as compliance"),
        (r"\baustralian\s+standards?\b", "as compliance australian standard"),
        (r"\bbuilding\s+codes?\b", "compliance building standards regulations"),
        (r"\bcompliance\b", "standards compliance regulations"),
        (r"\bfire\s+rating\b", "fire safety as1530 fire performance"),
        (r"\bfire\s+safety\b", "fire rating fire performance as1530"),
        // materials
        (r"\bspray\s*foam\b", "polyurethane closed cell insulation"),
        (r"\bpolyurethane\s+foam\b", "closed cell polyurethane insulation"),
        (r"\bclosed[-\s]?cell\b", "closed cell polyurethane rigid foam"),
        (r"\bopen[-\s]?cell\b", "open cell foam spray insulation"),
        (r"\bvapou?r\s+barrier\b", "moisture barrier vapour barrier air seal"),
        (r"\bmoisture\s+barrier\b", "vapour barrier moisture protection"),
        (r"\bair\s+seal\w*\b", "airtight vapour barrier air sealing"),
        (r"\bmou?ld\b", "mold mould moisture condensation"),
        // acoustics
        (r"\bsound\s*proof\w*\b", "acoustic soundproofing sound dampening noise reduction"),
        (r"\bacoustic\w*\b", "soundproofing sound dampening acoustic performance"),
        (r"\bnoise\s+reduct\w*\b", "soundproofing acoustic sound dampening"),
        // installation
        (r"\binstal\w*\b", "installation application install"),
        (r"\bapplicat\w*\b", "installation application install"),
        (r"\bcuring\s+time\b", "curing application installation"),
        (r"\bsubstrate\b", "surface application substrate preparation"),
        // pricing
        (r"\bpm2\b", "per m2 square meter"),
        (r"\bper\s+m2\b", "per square meter pm2"),
        (r"\bsquare\s+met(?:er|re)s?\b", "square meter m2"),
        (r"\bhow\s+much\b", "cost price pricing"),
        (r"\b(?:cost|price)s?\b", "cost price pricing"),
        // electrical
        (r"\bcables?\b", "wiring electrical cable"),
        (r"\brewir\w*\b", "electrical wiring"),
        (r"\bsub\s*floors?\b", "subfloor underfloor"),
        (r"\bpvc\b", "polyvinyl chloride cable wiring"),
        // safety
        (r"\bis\s+it\s+safe\b", "safety health"),
        (r"\b(?:dogs?|cats?|pets?)\b", "pet animal safety"),
        // service areas
        (r"\bvic\b", "victoria melbourne"),
        (r"\bmelb\w*\b", "melbourne victoria"),
        (r"\btas\b", "tasmania"),
        // general abbreviations
        (r"\bdiy\b", "do it yourself self install"),
        (r"\bhvac\b", "heating ventilation air conditioning"),
        (r"\beps\b", "expanded polystyrene foam insulation"),
    ]
    .into_iter()
    .map(|(pattern, expansion)| ExpansionRule::new(pattern, expansion))
    .collect()
}

// ---------------------------------------------------------------------------
// Fusion
// ---------------------------------------------------------------------------

/// Weights for the four similarity sub-measures. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub token_set: f64,
    pub partial: f64,
    pub token_sort: f64,
    pub ratio: f64,
}

impl FusionWeights {
    #[must_use]
    pub fn sum(&self) -> f64 {
        self.token_set + self.partial + self.token_sort + self.ratio
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Queries with at most this many tokens use the `short` profile.
    pub short_max_tokens: usize,
    /// Queries with at most this many tokens (and more than
    /// `short_max_tokens`) use the `medium` profile.
    pub medium_max_tokens: usize,
    pub short: FusionWeights,
    pub medium: FusionWeights,
    pub long: FusionWeights,
}

impl FusionConfig {
    /// Pick the weight profile for a query of `token_count` tokens.
    #[must_use]
    pub const fn profile_for(&self, token_count: usize) -> WeightProfile {
        if token_count <= self.short_max_tokens {
            WeightProfile::Short
        } else if token_count <= self.medium_max_tokens {
            WeightProfile::Medium
        } else {
            WeightProfile::Long
        }
    }

    #[must_use]
    pub const fn weights(&self, profile: WeightProfile) -> &FusionWeights {
        match profile {
            WeightProfile::Short => &self.short,
            WeightProfile::Medium => &self.medium,
            WeightProfile::Long => &self.long,
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            short_max_tokens: 2,
            medium_max_tokens: 4,
            short: FusionWeights {
                token_set: 0.45,
                partial: 0.25,
                token_sort: 0.20,
                ratio: 0.10,
            },
            medium: FusionWeights {
                token_set: 0.40,
                partial: 0.30,
                token_sort: 0.20,
                ratio: 0.10,
            },
            long: FusionWeights {
                token_set: 0.30,
                partial: 0.40,
                token_sort: 0.20,
                ratio: 0.10,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Context bonuses
// ---------------------------------------------------------------------------

/// A step in a threshold -> bonus table. Steps are checked in order and the
/// first one whose `min` is reached wins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BonusStep {
    pub min: f64,
    pub bonus: f64,
}

impl BonusStep {
    const fn new(min: f64, bonus: f64) -> Self {
        Self { min, bonus }
    }
}

/// First matching step's bonus, or `0.0` when no step is reached.
#[must_use]
pub fn step_bonus(steps: &[BonusStep], value: f64) -> f64 {
    steps
        .iter()
        .find(|step| value >= step.min)
        .map_or(0.0, |step| step.bonus)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Only query tokens longer than this count toward the exact and
    /// category ratios.
    pub exact_min_token_chars: usize,
    /// Exact-token ratio steps.
    pub exact_steps: Vec<BonusStep>,
    /// Category-token ratio at or above which `category_bonus` applies.
    pub category_ratio: f64,
    pub category_bonus: f64,
    /// Partial-overlap score above which `category_partial_bonus` applies.
    pub category_partial_threshold: f64,
    pub category_partial_bonus: f64,
    /// Tokens this long or shorter are not "meaningful" for keyword density.
    pub keyword_max_ignored_chars: usize,
    /// Keyword-density steps.
    pub keyword_steps: Vec<BonusStep>,
    pub stop_words: Vec<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            exact_min_token_chars: 3,
            exact_steps: vec![BonusStep::new(0.9, 10.0), BonusStep::new(0.7, 5.0)],
            category_ratio: 0.6,
            category_bonus: 20.0,
            category_partial_threshold: 70.0,
            category_partial_bonus: 10.0,
            keyword_max_ignored_chars: 2,
            keyword_steps: vec![
                BonusStep::new(0.8, 10.0),
                BonusStep::new(0.6, 8.0),
                BonusStep::new(0.4, 6.0),
                BonusStep::new(0.2, 4.0),
            ],
            stop_words: [
                "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
                "is", "are", "was", "were", "a", "an",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Quality
// ---------------------------------------------------------------------------

/// Terms that all score the same number of points when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermGroup {
    pub points: f64,
    pub terms: Vec<String>,
}

/// A capped vocabulary sub-score built from one or more [`TermGroup`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub cap: f64,
    pub groups: Vec<TermGroup>,
}

impl Vocabulary {
    fn new(cap: f64, groups: &[(f64, &[&str])]) -> Self {
        Self {
            cap,
            groups: groups
                .iter()
                .map(|(points, terms)| TermGroup {
                    points: *points,
                    terms: terms.iter().map(|t| (*t).to_string()).collect(),
                })
                .collect(),
        }
    }
}

/// Topic-specific indicator bonus: when the category mentions any of
/// `category_terms`, the text earns the bonus if it carries an indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryIndicators {
    pub category_terms: Vec<String>,
    pub indicators: Vec<String>,
}

/// Completeness step: texts longer than `min_chars` earn `points`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LengthStep {
    pub min_chars: usize,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub base: f64,
    pub technical: Vocabulary,
    pub standards: Vocabulary,
    pub professional: Vocabulary,
    pub locations: Vocabulary,
    pub category_bonus: f64,
    pub category_indicators: Vec<CategoryIndicators>,
    /// Checked in order; the first step whose `min_chars` is exceeded wins.
    pub length_steps: Vec<LengthStep>,
    /// Points for texts too short to reach any length step.
    pub length_floor: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            base: 25.0,
            technical: Vocabulary::new(
                25.0,
                &[
                    (
                        4.0,
                        &["r-value", "thermal resistance", "polyurethane", "closed-cell", "vapour barrier"],
                    ),
                    (
                        2.0,
                        &[
                            "spray foam",
                            "insulation",
                            "thermal",
                            "open-cell",
                            "foam",
                            "air seal",
                            "rigid",
                            "dense",
                            "substrate",
                            "application",
                            "curing",
                        ],
                    ),
                ],
            ),
            standards: Vocabulary::new(
                20.0,
                &[
                    (
                        8.0,
                        &["as 1530", "as 3837", "as 3000", "as 3999", "as 3660", "australian standard"],
                    ),
                    (5.0, &["astm e96", "compliance"]),
                    (
                        3.0,
                        &[
                            "building code",
                            "class 1",
                            "class 2",
                            "certification",
                            "bal",
                            "bushfire attack level",
                        ],
                    ),
                ],
            ),
            professional: Vocabulary::new(
                10.0,
                &[
                    (3.0, &["professional", "certified", "assessment", "installation"]),
                    (
                        1.0,
                        &[
                            "recommend",
                            "experience",
                            "quality",
                            "applicators",
                            "installers",
                            "calibrated",
                            "trained",
                            "site visit",
                            "quote",
                            "enquiry",
                            "contact",
                        ],
                    ),
                ],
            ),
            locations: Vocabulary::new(
                5.0,
                &[
                    (2.0, &["victoria", "braeside", "melbourne"]),
                    (
                        1.0,
                        &["tasmania", "australia", "victorian", "dandenong", "gippsland", "wodonga", "regional"],
                    ),
                ],
            ),
            category_bonus: 5.0,
            category_indicators: vec![
                indicators(
                    &["fire safety"],
                    &["as 1530", "fire rating", "class 1", "class 2", "fire performance"],
                ),
                indicators(
                    &["thermal"],
                    &["r-value", "thermal resistance", "r4", "r-4", "thermal bridging"],
                ),
                indicators(
                    &["standards", "compliance"],
                    &["australian standard", "building code", "compliance", "as 1530", "as 3837"],
                ),
                indicators(
                    &["moisture"],
                    &["vapour barrier", "moisture barrier", "astm e96", "permeability"],
                ),
            ],
            length_steps: vec![
                LengthStep { min_chars: 2000, points: 10.0 },
                LengthStep { min_chars: 1000, points: 8.0 },
                LengthStep { min_chars: 500, points: 6.0 },
                LengthStep { min_chars: 200, points: 4.0 },
                LengthStep { min_chars: 100, points: 2.0 },
            ],
            length_floor: 1.0,
        }
    }
}

fn indicators(category_terms: &[&str], indicators: &[&str]) -> CategoryIndicators {
    CategoryIndicators {
        category_terms: category_terms.iter().map(|t| (*t).to_string()).collect(),
        indicators: indicators.iter().map(|t| (*t).to_string()).collect(),
    }
}

// ---------------------------------------------------------------------------
// Ranking and tiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Raw scores below this are scaled by `penalty_factor`.
    pub penalty_threshold: f64,
    pub penalty_factor: f64,
    /// Confidence at or above which the top answer is returned verbatim.
    pub direct_threshold: f64,
    /// Confidence at or above which the top answer is adapted.
    pub adapted_threshold: f64,
    pub adapted_boost: f64,
    pub adapted_cap: f64,
    /// Reported confidence for closest-available answers.
    pub closest_floor: f64,
    pub closest_prefix: String,
    /// `ranking_score = confidence * confidence_weight + quality * quality_weight`.
    pub confidence_weight: f64,
    pub quality_weight: f64,
    /// Returned when the corpus has nothing to score.
    pub fallback_answer: String,
    pub fallback_category: String,
    /// Default `limit` for top-N ranking.
    pub default_limit: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            penalty_threshold: 60.0,
            penalty_factor: 0.8,
            direct_threshold: 70.0,
            adapted_threshold: 40.0,
            adapted_boost: 10.0,
            adapted_cap: 85.0,
            closest_floor: 60.0,
            closest_prefix: "Based on closest match: ".to_string(),
            confidence_weight: 0.7,
            quality_weight: 0.3,
            fallback_answer: "Our closed-cell spray foam insulation is designed for Australian \
                              conditions. For specific information about your project, please \
                              contact us and our team will follow up."
                .to_string(),
            fallback_category: "General".to_string(),
            default_limit: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Adaptation
// ---------------------------------------------------------------------------

/// A safe textual substitution applied to adapted-tier answers.
///
/// Fires when the query mentions any `query_triggers` as whole words
/// (plurals allowed), the lower-cased answer contains every `requires` term and none of the
/// `forbids` terms. Only the first occurrence of `find` is replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptationRule {
    pub name: String,
    pub query_triggers: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub forbids: Vec<String>,
    pub find: String,
    pub replace: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationConfig {
    pub rules: Vec<AdaptationRule>,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| -> Vec<String> { items.iter().map(|s| (*s).to_string()).collect() };
        Self {
            rules: vec![
                AdaptationRule {
                    name: "pets".to_string(),
                    query_triggers: strings(&["dog", "cat", "pet"]),
                    requires: strings(&["non-toxic"]),
                    forbids: strings(&["pet"]),
                    find: "non-toxic".to_string(),
                    replace: "non-toxic for pets".to_string(),
                },
                AdaptationRule {
                    name: "cables".to_string(),
                    query_triggers: strings(&["cable"]),
                    requires: strings(&["electrical", "around"]),
                    forbids: strings(&["cable"]),
                    find: "electrical".to_string(),
                    replace: "electrical cables".to_string(),
                },
                AdaptationRule {
                    name: "per_m2_pricing".to_string(),
                    query_triggers: strings(&["pm2", "per m2"]),
                    requires: strings(&["contact"]),
                    forbids: strings(&["per m2"]),
                    find: "contact".to_string(),
                    replace: "contact us for per m2 pricing".to_string(),
                },
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Dedup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Both answers must be longer than this (in chars) to be compared.
    pub min_length: usize,
    /// Share of the shorter answer's words that must appear in the longer
    /// answer for the pair to count as a duplicate.
    pub overlap_ratio: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            min_length: 100,
            overlap_ratio: 0.8,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation and loading
// ---------------------------------------------------------------------------

const WEIGHT_TOLERANCE: f64 = 1e-6;

impl EngineConfig {
    /// Check weights and thresholds for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigInvalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, weights) in [
            ("short", &self.fusion.short),
            ("medium", &self.fusion.medium),
            ("long", &self.fusion.long),
        ] {
            let parts = [weights.token_set, weights.partial, weights.token_sort, weights.ratio];
            if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
                return Err(CoreError::ConfigInvalid(format!(
                    "fusion.{name} weights must be finite and non-negative"
                )));
            }
            if (weights.sum() - 1.0).abs() > WEIGHT_TOLERANCE {
                return Err(CoreError::ConfigInvalid(format!(
                    "fusion.{name} weights sum to {:.4}, expected 1.0",
                    weights.sum()
                )));
            }
        }

        if self.fusion.short_max_tokens > self.fusion.medium_max_tokens {
            return Err(CoreError::ConfigInvalid(
                "fusion.short_max_tokens must not exceed fusion.medium_max_tokens".to_string(),
            ));
        }

        let ranking = &self.ranking;
        for (name, value) in [
            ("penalty_threshold", ranking.penalty_threshold),
            ("direct_threshold", ranking.direct_threshold),
            ("adapted_threshold", ranking.adapted_threshold),
            ("adapted_cap", ranking.adapted_cap),
            ("closest_floor", ranking.closest_floor),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(CoreError::ConfigInvalid(format!(
                    "ranking.{name} = {value} is outside [0, 100]"
                )));
            }
        }
        if ranking.adapted_threshold > ranking.direct_threshold {
            return Err(CoreError::ConfigInvalid(
                "ranking.adapted_threshold must not exceed ranking.direct_threshold".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&ranking.penalty_factor) {
            return Err(CoreError::ConfigInvalid(
                "ranking.penalty_factor must lie in [0, 1]".to_string(),
            ));
        }
        if ranking.fallback_answer.trim().is_empty() {
            return Err(CoreError::ConfigInvalid(
                "ranking.fallback_answer must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.dedup.overlap_ratio) {
            return Err(CoreError::ConfigInvalid(
                "dedup.overlap_ratio must lie in [0, 1]".to_string(),
            ));
        }

        Ok(())
    }
}

/// Load and validate a config file.
///
/// # Errors
///
/// Fails if the file cannot be read, is not valid TOML for [`EngineConfig`],
/// or does not pass [`EngineConfig::validate`].
pub fn load_config(path: &Path) -> Result<EngineConfig, CoreError> {
    let content = std::fs::read_to_string(path).map_err(|source| CoreError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;

    let config = toml::from_str::<EngineConfig>(&content).map_err(|source| {
        CoreError::ConfigParse {
            path: path.to_path_buf(),
            source,
        }
    })?;

    config.validate()?;
    Ok(config)
}

/// A loaded config together with the file it came from, if any.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: EngineConfig,
    pub source: Option<PathBuf>,
}

/// Resolve the effective configuration.
///
/// Precedence: `explicit` path, then `replymatch.toml` in `working_dir`, then
/// the user config directory (`<config_dir>/replymatch/config.toml`), then
/// built-in defaults.
///
/// # Errors
///
/// Fails if an explicit path is missing, or if any discovered file fails to
/// load.
pub fn resolve_config(
    explicit: Option<&Path>,
    working_dir: &Path,
) -> Result<ResolvedConfig, CoreError> {
    if let Some(path) = explicit {
        return Ok(ResolvedConfig {
            config: load_config(path)?,
            source: Some(path.to_path_buf()),
        });
    }

    let candidates = [
        Some(working_dir.join(CONFIG_FILE_NAME)),
        dirs::config_dir().map(|dir| dir.join("replymatch/config.toml")),
    ];

    for path in candidates.into_iter().flatten() {
        if path.exists() {
            tracing::debug!(path = %path.display(), "loading config");
            return Ok(ResolvedConfig {
                config: load_config(&path)?,
                source: Some(path),
            });
        }
    }

    Ok(ResolvedConfig {
        config: EngineConfig::default(),
        source: None,
    })
}
