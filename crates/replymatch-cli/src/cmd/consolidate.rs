//! `replymatch consolidate`: offline merge of corpus files.
//!
//! Corpora are merged in the order given. An entry whose answer is a
//! near-copy of one already kept is dropped; survivors are written back out
//! as corpus records, so the output can be fed straight into `rank`.

use super::{CorpusArgs, load_corpora};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::{Context, Result};
use clap::Args;
use replymatch_core::EngineConfig;
use replymatch_core::corpus::LoadReport;
use replymatch_core::model::{CorpusEntry, CorpusRecord};
use replymatch_core::timing;
use replymatch_search::{ConsolidationReport, DedupConsolidator};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug)]
pub struct ConsolidateArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Write surviving records to this file as a JSON array.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct DropRow {
    source_id: String,
    category: String,
    duplicate_of: String,
}

#[derive(Debug, Serialize)]
struct ConsolidateOutput {
    inputs: Vec<LoadReport>,
    input_entries: usize,
    kept: usize,
    dropped: Vec<DropRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<PathBuf>,
}

fn write_records(path: &Path, report: &ConsolidationReport) -> Result<()> {
    let records: Vec<CorpusRecord> = report.kept.iter().map(CorpusEntry::to_record).collect();
    let json = serde_json::to_string_pretty(&records)?;
    std::fs::write(path, json + "\n")
        .with_context(|| format!("writing consolidated corpus {}", path.display()))?;
    info!(path = %path.display(), records = records.len(), "wrote consolidated corpus");
    Ok(())
}

/// Execute `replymatch consolidate`.
///
/// # Errors
///
/// Returns an error if a corpus cannot be loaded or the output file cannot
/// be written.
pub fn run_consolidate(
    args: &ConsolidateArgs,
    config: &EngineConfig,
    output: OutputMode,
) -> Result<()> {
    let loaded = load_corpora(&args.corpus, config)?;
    let consolidator = DedupConsolidator::new(config.dedup);
    let report = timing::timed("dedup.consolidate", || {
        consolidator.consolidate(&loaded.corpora)
    });

    if let Some(path) = &args.output {
        write_records(path, &report)?;
    }

    let payload = ConsolidateOutput {
        inputs: loaded.reports,
        input_entries: report.input_count(),
        kept: report.kept.len(),
        dropped: report
            .dropped
            .iter()
            .map(|d| DropRow {
                source_id: d.entry.source_id().to_string(),
                category: d.entry.category().to_string(),
                duplicate_of: d.duplicate_of.clone(),
            })
            .collect(),
        output: args.output.clone(),
    };

    render_mode(
        output,
        &payload,
        |p, w| {
            writeln!(w, "kept\t{}", p.kept)?;
            writeln!(w, "dropped\t{}", p.dropped.len())?;
            for row in &p.dropped {
                writeln!(w, "drop\t{}\t{}", row.source_id, row.duplicate_of)?;
            }
            Ok(())
        },
        |p, w| {
            pretty_section(w, "Consolidation")?;
            for input in &p.inputs {
                pretty_kv(
                    w,
                    &input.name,
                    format!("{} accepted, {} skipped", input.accepted, input.skipped),
                )?;
            }
            pretty_kv(w, "Entries", p.input_entries.to_string())?;
            pretty_kv(w, "Kept", p.kept.to_string())?;
            pretty_kv(w, "Dropped", p.dropped.len().to_string())?;
            if let Some(path) = &p.output {
                pretty_kv(w, "Written", path.display().to_string())?;
            }
            if !p.dropped.is_empty() {
                writeln!(w)?;
                for row in &p.dropped {
                    writeln!(w, "  {} duplicates {}", row.source_id, row.duplicate_of)?;
                }
            }
            Ok(())
        },
    )
}
