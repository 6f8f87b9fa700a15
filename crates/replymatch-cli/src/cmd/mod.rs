pub mod bulk;
pub mod completions;
pub mod config;
pub mod consolidate;
pub mod quality;
pub mod rank;
pub mod search;

use anyhow::{Context, Result};
use clap::Args;
use replymatch_core::EngineConfig;
use replymatch_core::corpus::{LoadReport, load_corpus};
use replymatch_core::model::CorpusEntry;
use replymatch_core::timing;
use replymatch_search::{Corpus, QualityScorer, RankingEngine};
use std::path::PathBuf;

/// `--corpus` arguments shared by every command that reads answers.
#[derive(Args, Debug, Clone)]
pub struct CorpusArgs {
    /// Corpus file (JSON array, `{ "items": [...] }` or JSON Lines). Repeatable;
    /// files are read in the order given.
    #[arg(long = "corpus", short = 'c', value_name = "FILE", required = true, num_args = 1..)]
    pub paths: Vec<PathBuf>,
}

/// Entries of each corpus file, in file order, with their load reports.
pub struct LoadedCorpora {
    pub corpora: Vec<Vec<CorpusEntry>>,
    pub reports: Vec<LoadReport>,
}

impl LoadedCorpora {
    pub fn flatten(self) -> Vec<CorpusEntry> {
        self.corpora.into_iter().flatten().collect()
    }
}

/// Load every corpus file and score entry quality.
///
/// # Errors
///
/// Returns an error if any file cannot be read or parsed.
pub fn load_corpora(args: &CorpusArgs, config: &EngineConfig) -> Result<LoadedCorpora> {
    timing::timed("load.corpora", || {
        let quality = QualityScorer::new(config.quality.clone());
        let mut corpora = Vec::with_capacity(args.paths.len());
        let mut reports = Vec::with_capacity(args.paths.len());

        for path in &args.paths {
            let loaded = load_corpus(path)
                .with_context(|| format!("loading corpus {}", path.display()))?;
            corpora.push(quality.build_entries(loaded.drafts));
            reports.push(loaded.report);
        }

        Ok(LoadedCorpora { corpora, reports })
    })
}

/// Load corpora and build a ranking engine over their concatenation.
///
/// # Errors
///
/// Returns an error if loading fails or the configuration is rejected.
pub fn load_engine(args: &CorpusArgs, config: &EngineConfig) -> Result<RankingEngine> {
    let loaded = load_corpora(args, config)?;
    let corpus = Corpus::new(loaded.flatten());
    timing::timed("engine.index", || {
        RankingEngine::new(&corpus, config.clone()).context("building ranking engine")
    })
}
