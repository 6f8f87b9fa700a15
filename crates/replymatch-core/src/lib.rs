//! replymatch-core: data model, configuration and text normalization for the
//! replymatch ranking engine.
//!
//! # Conventions
//!
//! - **Errors**: library functions return [`error::CoreError`], which maps to a
//!   stable [`error::ErrorCode`].
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`).

pub mod config;
pub mod corpus;
pub mod error;
pub mod model;
pub mod normalize;
pub mod timing;

pub use config::EngineConfig;
pub use error::{CoreError, ErrorCode};
pub use model::{CorpusEntry, CorpusRecord, EntryDraft, MatchResult, ScoreBreakdown, Tier};
pub use normalize::{Normalizer, normalize};
