//! `replymatch quality`: dataset quality report.

use super::{CorpusArgs, load_corpora};
use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use anyhow::Result;
use clap::Args;
use replymatch_core::EngineConfig;
use replymatch_core::model::CorpusEntry;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

const HIGH: f64 = 70.0;
const MEDIUM: f64 = 50.0;

#[derive(Args, Debug)]
pub struct QualityArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,
}

#[derive(Debug, Default, PartialEq, Serialize)]
struct CategoryQuality {
    count: usize,
    mean: f64,
}

#[derive(Debug, Default, PartialEq, Serialize)]
struct QualityReport {
    count: usize,
    mean: f64,
    high: usize,
    medium: usize,
    low: usize,
    categories: BTreeMap<String, CategoryQuality>,
}

impl QualityReport {
    fn from_entries(entries: &[CorpusEntry]) -> Self {
        let mut report = Self::default();
        let mut total = 0.0;
        let mut sums: BTreeMap<String, (usize, f64)> = BTreeMap::new();

        for entry in entries {
            let q = entry.quality_score();
            report.count += 1;
            total += q;
            if q >= HIGH {
                report.high += 1;
            } else if q >= MEDIUM {
                report.medium += 1;
            } else {
                report.low += 1;
            }
            let slot = sums.entry(entry.category().to_string()).or_default();
            slot.0 += 1;
            slot.1 += q;
        }

        if report.count > 0 {
            report.mean = total / report.count as f64;
        }
        report.categories = sums
            .into_iter()
            .map(|(name, (count, sum))| {
                let mean = sum / count as f64;
                (name, CategoryQuality { count, mean })
            })
            .collect();
        report
    }
}

/// Execute `replymatch quality`.
///
/// # Errors
///
/// Returns an error if a corpus cannot be loaded.
pub fn run_quality(args: &QualityArgs, config: &EngineConfig, output: OutputMode) -> Result<()> {
    let entries = load_corpora(&args.corpus, config)?.flatten();
    let report = QualityReport::from_entries(&entries);

    render_mode(
        output,
        &report,
        |r, w| {
            writeln!(w, "count\t{}", r.count)?;
            writeln!(w, "mean\t{:.1}", r.mean)?;
            writeln!(w, "high\t{}", r.high)?;
            writeln!(w, "medium\t{}", r.medium)?;
            writeln!(w, "low\t{}", r.low)?;
            for (name, cat) in &r.categories {
                writeln!(w, "category\t{name}\t{}\t{:.1}", cat.count, cat.mean)?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, "Quality")?;
            pretty_kv(w, "Entries", r.count.to_string())?;
            pretty_kv(w, "Mean", format!("{:.1}", r.mean))?;
            pretty_kv(w, "High", format!("{} (>= {HIGH})", r.high))?;
            pretty_kv(w, "Medium", format!("{} ({MEDIUM} to {HIGH})", r.medium))?;
            pretty_kv(w, "Low", format!("{} (< {MEDIUM})", r.low))?;
            if !r.categories.is_empty() {
                writeln!(w)?;
                pretty_section(w, "By category")?;
                for (name, cat) in &r.categories {
                    writeln!(w, "{name:<32} {:>4}  {:>5.1}", cat.count, cat.mean)?;
                }
            }
            Ok(())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use replymatch_core::model::EntryDraft;

    fn entry(category: &str, quality: f64) -> CorpusEntry {
        CorpusEntry::new(
            EntryDraft {
                category: category.to_string(),
                subtopic: String::new(),
                keywords: Vec::new(),
                answer_text: "Some answer.".to_string(),
                source_id: format!("{category}:{quality}"),
            },
            quality,
        )
        .expect("entry")
    }

    #[test]
    fn buckets_use_inclusive_lower_bounds() {
        let entries = [
            entry("Fire", 70.0),
            entry("Fire", 50.0),
            entry("Pricing", 49.9),
            entry("Pricing", 90.0),
        ];
        let report = QualityReport::from_entries(&entries);
        assert_eq!(report.count, 4);
        assert_eq!((report.high, report.medium, report.low), (2, 1, 1));
        assert!((report.mean - 64.975).abs() < 1e-9);
    }

    #[test]
    fn per_category_means_are_sorted_by_name() {
        let entries = [entry("Pricing", 40.0), entry("Fire", 60.0), entry("Pricing", 60.0)];
        let report = QualityReport::from_entries(&entries);
        let names: Vec<&str> = report.categories.keys().map(String::as_str).collect();
        assert_eq!(names, ["Fire", "Pricing"]);
        assert_eq!(report.categories["Pricing"].count, 2);
        assert!((report.categories["Pricing"].mean - 50.0).abs() < 1e-9);
    }

    #[test]
    fn empty_corpus_reports_zeroes() {
        assert_eq!(QualityReport::from_entries(&[]), QualityReport::default());
    }
}
