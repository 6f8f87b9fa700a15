//! Corpus file ingestion.
//!
//! Three layouts are accepted:
//!
//! - a JSON array of records,
//! - a JSON object whose `items` field is an array of records,
//! - JSON Lines, one record per non-blank line.
//!
//! Records that do not deserialize or have no answer text are skipped with a
//! warning and counted in [`LoadReport`]. I/O failures and files that match
//! none of the layouts are errors.

use crate::error::CoreError;
use crate::model::{CorpusRecord, EntryDraft};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Result of loading one corpus file.
#[derive(Debug, Clone)]
pub struct LoadedCorpus {
    pub drafts: Vec<EntryDraft>,
    pub report: LoadReport,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// File stem, used as the prefix of generated source ids.
    pub name: String,
    pub total: usize,
    pub accepted: usize,
    pub skipped: usize,
}

/// Read and parse a corpus file.
///
/// # Errors
///
/// Returns [`CoreError::CorpusRead`] if the file cannot be read and
/// [`CoreError::CorpusParse`] if it is neither JSON nor JSON Lines.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_corpus(path: &Path) -> Result<LoadedCorpus, CoreError> {
    let content = std::fs::read_to_string(path).map_err(|source| CoreError::CorpusRead {
        path: path.to_path_buf(),
        source,
    })?;

    let name = path
        .file_stem()
        .map_or_else(|| "corpus".to_string(), |stem| stem.to_string_lossy().into_owned());

    let values = parse_values(&content).map_err(|detail| CoreError::CorpusParse {
        path: path.to_path_buf(),
        detail,
    })?;

    let loaded = drafts_from_values(&name, values);
    info!(
        corpus = %loaded.report.name,
        accepted = loaded.report.accepted,
        skipped = loaded.report.skipped,
        "corpus loaded"
    );
    Ok(loaded)
}

/// Parse corpus text already in memory. `name` prefixes generated ids.
///
/// # Errors
///
/// Returns the parse problem as a message when the text matches no layout.
pub fn parse_corpus(name: &str, content: &str) -> Result<LoadedCorpus, String> {
    parse_values(content).map(|values| drafts_from_values(name, values))
}

fn parse_values(content: &str) -> Result<Vec<Value>, String> {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str::<Vec<Value>>(trimmed).map_err(|e| format!("{e}"));
    }

    // A single object is either an `{items: [...]}` wrapper or the first
    // line of a JSON Lines file.
    if let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(trimmed) {
        return match object.remove("items") {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err("`items` must be an array".to_string()),
            None => Ok(vec![Value::Object(object)]),
        };
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<Value>(line)
                .map_err(|e| format!("line {}: {e}", index + 1))
        })
        .collect()
}

fn drafts_from_values(name: &str, values: Vec<Value>) -> LoadedCorpus {
    let total = values.len();
    let mut drafts = Vec::with_capacity(total);

    for (index, value) in values.into_iter().enumerate() {
        let fallback_id = format!("{name}:{index}");
        let record = match serde_json::from_value::<CorpusRecord>(value) {
            Ok(record) => record,
            Err(err) => {
                warn!(source_id = %fallback_id, error = %err, "skipping malformed record");
                continue;
            }
        };

        match record.into_draft(fallback_id) {
            Ok(draft) => drafts.push(draft),
            Err(err) => warn!(error = %err, "skipping record"),
        }
    }

    let accepted = drafts.len();
    LoadedCorpus {
        drafts,
        report: LoadReport {
            name: name.to_string(),
            total,
            accepted,
            skipped: total - accepted,
        },
    }
}
