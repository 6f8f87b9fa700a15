//! `replymatch rank`: best answer for one query.

use super::{CorpusArgs, load_engine};
use crate::output::{OutputMode, pretty_kv, pretty_rule, pretty_section, render_mode};
use anyhow::Result;
use clap::Args;
use replymatch_core::EngineConfig;
use replymatch_core::model::{MatchResult, ScoreBreakdown};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct RankArgs {
    /// Customer query.
    pub query: String,

    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Show the score breakdown behind the result.
    #[arg(long)]
    pub explain: bool,
}

#[derive(Debug, Serialize)]
struct RankOutput<'a> {
    query: &'a str,
    result: &'a MatchResult,
}

/// Execute `replymatch rank <query>`.
///
/// # Errors
///
/// Returns an error if the corpus cannot be loaded or output fails.
pub fn run_rank(args: &RankArgs, config: &EngineConfig, output: OutputMode) -> Result<()> {
    let engine = load_engine(&args.corpus, config)?;
    let result = engine.rank(&args.query);

    let payload = RankOutput {
        query: &args.query,
        result: &result,
    };

    render_mode(
        output,
        &payload,
        |p, w| write_row(p.result, w),
        |p, w| write_pretty(p.result, args.explain, w),
    )
}

pub fn write_row(result: &MatchResult, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{:.1}\t{}\t{}",
        result.tier,
        result.confidence,
        result.entry.source_id(),
        one_line(&result.response)
    )
}

pub fn write_pretty(result: &MatchResult, explain: bool, w: &mut dyn Write) -> io::Result<()> {
    let heading = if result.fallback {
        "No match (generic answer)".to_string()
    } else {
        format!("{} [{}]", result.entry.source_id(), result.tier)
    };
    pretty_section(w, &heading)?;
    pretty_kv(w, "Confidence", format!("{:.1}", result.confidence))?;
    pretty_kv(w, "Raw", format!("{:.1}", result.raw_confidence))?;
    pretty_kv(w, "Quality", format!("{:.1}", result.quality_score))?;
    pretty_kv(w, "Category", result.entry.category())?;
    if !result.adaptations.is_empty() {
        pretty_kv(w, "Adapted", result.adaptations.join(", "))?;
    }
    writeln!(w)?;
    writeln!(w, "{}", result.response)?;
    if explain {
        writeln!(w)?;
        write_breakdown(&result.breakdown, w)?;
    }
    pretty_rule(w)
}

fn write_breakdown(b: &ScoreBreakdown, w: &mut dyn Write) -> io::Result<()> {
    pretty_kv(w, "Profile", format!("{:?}", b.weight_profile).to_lowercase())?;
    pretty_kv(
        w,
        "Similarity",
        format!(
            "set {:.1}  partial {:.1}  sort {:.1}  ratio {:.1}",
            b.token_set, b.partial, b.token_sort, b.ratio
        ),
    )?;
    pretty_kv(w, "Base", format!("{:.1}", b.base_score))?;
    pretty_kv(
        w,
        "Bonuses",
        format!(
            "exact +{:.0}  category +{:.0}  keyword +{:.0}",
            b.exact_bonus, b.category_bonus, b.keyword_bonus
        ),
    )?;
    let penalty = if b.penalized { " (penalized)" } else { "" };
    pretty_kv(
        w,
        "Final",
        format!("{:.1} from raw {:.1}{penalty}", b.final_score, b.raw_score),
    )
}

/// Collapse whitespace so a response fits on one text row.
#[must_use]
pub fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
