//! `replymatch search`: top-N ranked answers.

use super::rank::one_line;
use super::{CorpusArgs, load_engine};
use crate::output::{OutputMode, Renderable, pretty_kv, render_list};
use anyhow::Result;
use clap::Args;
use replymatch_core::EngineConfig;
use replymatch_core::model::MatchResult;
use replymatch_search::RankOptions;
use serde::Serialize;
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Customer query.
    pub query: String,

    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Maximum number of results to return.
    #[arg(short = 'n', long, default_value = "5")]
    pub limit: usize,

    /// Drop results whose raw confidence is below this (the best result is
    /// always kept).
    #[arg(long, default_value = "0")]
    pub min_confidence: f64,
}

/// A single search result row.
#[derive(Debug, Serialize)]
pub struct ResultRow {
    pub rank: usize,
    pub source_id: String,
    pub category: String,
    pub tier: String,
    pub confidence: f64,
    pub raw_confidence: f64,
    pub quality_score: f64,
    pub response: String,
}

impl ResultRow {
    fn from_result(rank: usize, result: &MatchResult) -> Self {
        Self {
            rank,
            source_id: result.entry.source_id().to_string(),
            category: result.entry.category().to_string(),
            tier: result.tier.to_string(),
            confidence: result.confidence,
            raw_confidence: result.raw_confidence,
            quality_score: result.quality_score,
            response: result.response.clone(),
        }
    }
}

impl Renderable for ResultRow {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "{:>2}. {} [{}]", self.rank, self.source_id, self.tier)?;
        pretty_kv(w, "  Confidence", format!("{:.1}", self.confidence))?;
        pretty_kv(w, "  Category", &self.category)?;
        writeln!(w, "    {}", one_line(&self.response))?;
        writeln!(w)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *w, self)?;
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{:.1}\t{}",
            self.rank,
            self.source_id,
            self.tier,
            self.confidence,
            one_line(&self.response)
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["RANK", "SOURCE", "TIER", "CONFIDENCE", "RESPONSE"]
    }
}

/// Execute `replymatch search <query>`.
///
/// # Errors
///
/// Returns an error if the corpus cannot be loaded or output fails.
pub fn run_search(args: &SearchArgs, config: &EngineConfig, output: OutputMode) -> Result<()> {
    let engine = load_engine(&args.corpus, config)?;
    let options = RankOptions {
        limit: args.limit.min(1000),
        min_confidence: args.min_confidence,
    };

    let rows: Vec<ResultRow> = engine
        .rank_top(&args.query, &options)
        .iter()
        .enumerate()
        .map(|(i, result)| ResultRow::from_result(i + 1, result))
        .collect();

    render_list(&rows, output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::render_list_to;
    use replymatch_core::model::{CorpusEntry, EntryDraft, ScoreBreakdown, Tier, WeightProfile};
    use std::sync::Arc;

    fn result() -> MatchResult {
        let entry = CorpusEntry::new(
            EntryDraft {
                category: "Pricing".to_string(),
                subtopic: String::new(),
                keywords: Vec::new(),
                answer_text: "From $28 per m2.".to_string(),
                source_id: "faq:pricing".to_string(),
            },
            40.0,
        )
        .expect("entry");
        MatchResult {
            entry: Arc::new(entry),
            response: "From $28\nper m2.".to_string(),
            confidence: 76.31,
            raw_confidence: 76.31,
            quality_score: 40.0,
            tier: Tier::Direct,
            ranking_score: 65.4,
            breakdown: ScoreBreakdown {
                token_set: 70.0,
                partial: 70.0,
                token_sort: 60.0,
                ratio: 50.0,
                weight_profile: WeightProfile::Medium,
                base_score: 66.0,
                exact_bonus: 0.0,
                category_bonus: 0.0,
                keyword_bonus: 10.0,
                raw_score: 76.31,
                final_score: 76.31,
                penalized: false,
            },
            fallback: false,
            adaptations: Vec::new(),
        }
    }

    #[test]
    fn text_row_is_tab_separated_on_one_line() {
        let rows = vec![ResultRow::from_result(1, &result())];
        let mut buf = Vec::new();
        render_list_to(&mut buf, &rows, OutputMode::Text).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert_eq!(
            text,
            "RANK\tSOURCE\tTIER\tCONFIDENCE\tRESPONSE\n1\tfaq:pricing\tdirect\t76.3\tFrom $28 per m2.\n"
        );
    }

    #[test]
    fn json_rows_carry_tier_and_confidence() {
        let rows = vec![ResultRow::from_result(1, &result())];
        let mut buf = Vec::new();
        render_list_to(&mut buf, &rows, OutputMode::Json).expect("render");
        let value: serde_json::Value = serde_json::from_slice(&buf).expect("json");
        assert_eq!(value[0]["tier"], "direct");
        assert_eq!(value[0]["source_id"], "faq:pricing");
    }
}
