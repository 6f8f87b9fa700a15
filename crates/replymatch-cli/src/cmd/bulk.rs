//! `replymatch bulk`: best answer for every query in a file.

use super::rank::write_row;
use super::{CorpusArgs, load_engine};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::{Context, Result, bail};
use clap::Args;
use rayon::prelude::*;
use replymatch_core::EngineConfig;
use replymatch_core::model::{MatchResult, Tier};
use replymatch_core::timing;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct BulkArgs {
    /// File with one query per line. Blank lines are ignored.
    #[arg(long, value_name = "FILE")]
    pub queries: PathBuf,

    #[command(flatten)]
    pub corpus: CorpusArgs,
}

#[derive(Debug, Serialize)]
struct BulkItem {
    query: String,
    result: MatchResult,
}

#[derive(Debug, Default, PartialEq, Serialize)]
struct BulkSummary {
    queries: usize,
    direct: usize,
    adapted: usize,
    closest_available: usize,
    fallback: usize,
    mean_confidence: f64,
}

impl BulkSummary {
    fn from_results<'a>(results: impl IntoIterator<Item = &'a MatchResult>) -> Self {
        let mut summary = Self::default();
        let mut total = 0.0;
        for result in results {
            summary.queries += 1;
            total += result.confidence;
            match result.tier {
                Tier::Direct => summary.direct += 1,
                Tier::Adapted => summary.adapted += 1,
                Tier::ClosestAvailable => summary.closest_available += 1,
            }
            if result.fallback {
                summary.fallback += 1;
            }
        }
        if summary.queries > 0 {
            summary.mean_confidence = total / summary.queries as f64;
        }
        summary
    }
}

#[derive(Debug, Serialize)]
struct BulkOutput {
    results: Vec<BulkItem>,
    summary: BulkSummary,
}

fn read_queries(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading queries {}", path.display()))?;
    let queries: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if queries.is_empty() {
        bail!("queries file {} has no queries", path.display());
    }
    Ok(queries)
}

/// Execute `replymatch bulk --queries FILE`.
///
/// Queries are ranked in parallel; output keeps file order.
///
/// # Errors
///
/// Returns an error if the queries or corpus cannot be read.
pub fn run_bulk(args: &BulkArgs, config: &EngineConfig, output: OutputMode) -> Result<()> {
    let queries = read_queries(&args.queries)?;
    let engine = load_engine(&args.corpus, config)?;

    let results: Vec<BulkItem> = timing::timed("bulk.rank", || {
        queries
            .into_par_iter()
            .map(|query| {
                let result = engine.rank(&query);
                BulkItem { query, result }
            })
            .collect()
    });
    let summary = BulkSummary::from_results(results.iter().map(|item| &item.result));
    let payload = BulkOutput { results, summary };

    render_mode(
        output,
        &payload,
        |p, w| {
            for item in &p.results {
                write!(w, "{}\t", item.query)?;
                write_row(&item.result, w)?;
            }
            Ok(())
        },
        |p, w| {
            for item in &p.results {
                pretty_section(w, &format!("Q: {}", item.query))?;
                pretty_kv(w, "Source", item.result.entry.source_id())?;
                pretty_kv(w, "Tier", item.result.tier.as_str())?;
                pretty_kv(w, "Confidence", format!("{:.1}", item.result.confidence))?;
                writeln!(w, "{}", item.result.response)?;
                writeln!(w)?;
            }
            let s = &p.summary;
            pretty_section(w, "Summary")?;
            pretty_kv(w, "Queries", s.queries.to_string())?;
            pretty_kv(w, "Direct", s.direct.to_string())?;
            pretty_kv(w, "Adapted", s.adapted.to_string())?;
            pretty_kv(w, "Closest", s.closest_available.to_string())?;
            pretty_kv(w, "Fallback", s.fallback.to_string())?;
            pretty_kv(w, "Mean conf.", format!("{:.1}", s.mean_confidence))
        },
    )
}
