#![forbid(unsafe_code)]
//! replymatch-search: scoring, ranking and consolidation.
//!
//! | Module        | Role                                                   |
//! |---------------|--------------------------------------------------------|
//! | `similarity`  | four lexical measures fused by query-length profile    |
//! | `context`     | exact-token, category and keyword-density bonuses      |
//! | `quality`     | query-independent content quality heuristic            |
//! | `adapt`       | safe substitutions for mid-confidence answers          |
//! | `ranking`     | corpus handle, tiered ranking engine, cancellation     |
//! | `dedup`       | near-duplicate consolidation across corpora            |
//!
//! # Conventions
//!
//! - **Errors**: fallible operations return [`SearchError`].
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `debug!`).

pub mod adapt;
pub mod context;
pub mod dedup;
pub mod quality;
pub mod ranking;
pub mod similarity;

pub use dedup::{ConsolidationReport, DedupConsolidator, DroppedEntry};
pub use quality::QualityScorer;
pub use ranking::{CancelToken, Corpus, RankOptions, RankingEngine};

use replymatch_core::{CoreError, ErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("ranking cancelled")]
    Cancelled,

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl SearchError {
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Cancelled => ErrorCode::RankingCancelled,
            Self::Core(err) => err.error_code(),
        }
    }
}
