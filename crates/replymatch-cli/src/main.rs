#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use replymatch_core::config::resolve_config;
use replymatch_core::timing;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "replymatch: rank canned answers against customer queries",
    long_about = None
)]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit command timing report to stderr.
    #[arg(long, global = true)]
    timing: bool,

    /// Output format. Defaults to pretty on a terminal and text when piped.
    #[arg(long, value_enum, global = true)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Engine configuration file (TOML).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Query",
        about = "Best answer for a query",
        long_about = "Rank every corpus entry against the query and print the best answer \
                      with its tier and confidence. Confidence of 70 or more is a direct \
                      answer, 40 to 70 is adapted, anything lower is framed as the closest \
                      available match.",
        after_help = "EXAMPLES:\n    # Best answer from one corpus\n    replymatch rank \"how much per m2\" --corpus faq.json\n\n\
                      # Show the score breakdown\n    replymatch rank \"fire rating\" --corpus faq.json --explain\n\n\
                      # Machine-readable output\n    replymatch rank \"cost\" --corpus faq.json --format json"
    )]
    Rank(cmd::rank::RankArgs),

    #[command(
        next_help_heading = "Query",
        about = "Top-N answers for a query",
        long_about = "Rank the corpus against the query and list the best N answers, \
                      ordered by confidence then quality.",
        after_help = "EXAMPLES:\n    # Top five answers\n    replymatch search \"spray foam\" --corpus faq.json\n\n\
                      # Top two, dropping weak matches\n    replymatch search \"foam\" --corpus faq.json -n 2 --min-confidence 40"
    )]
    Search(cmd::search::SearchArgs),

    #[command(
        next_help_heading = "Query",
        about = "Best answer for every query in a file",
        long_about = "Rank each non-blank line of the queries file and print the best answer \
                      per query, followed by tier counts and mean confidence.",
        after_help = "EXAMPLES:\n    # Rank a batch of queries\n    replymatch bulk --queries questions.txt --corpus faq.json\n\n\
                      # As JSON\n    replymatch bulk --queries questions.txt --corpus faq.json --format json"
    )]
    Bulk(cmd::bulk::BulkArgs),

    #[command(
        next_help_heading = "Corpus",
        about = "Merge corpora and drop near-duplicate answers",
        long_about = "Merge corpus files in the order given. Later entries whose answers are \
                      near-copies of an earlier entry are dropped.",
        after_help = "EXAMPLES:\n    # Report duplicates across two exports\n    replymatch consolidate --corpus old.json new.jsonl\n\n\
                      # Write the merged corpus\n    replymatch consolidate --corpus old.json new.jsonl --output merged.json"
    )]
    Consolidate(cmd::consolidate::ConsolidateArgs),

    #[command(
        next_help_heading = "Corpus",
        about = "Corpus quality report",
        long_about = "Score every entry's answer quality and report the mean, high/medium/low \
                      bucket counts and per-category means.",
        after_help = "EXAMPLES:\n    # Quality report\n    replymatch quality --corpus faq.json"
    )]
    Quality(cmd::quality::QualityArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Print the effective configuration",
        long_about = "Print the configuration in effect after resolving --config, \
                      ./replymatch.toml and the user config directory, as TOML.",
        after_help = "EXAMPLES:\n    # Save the defaults as a starting point\n    replymatch config > replymatch.toml\n\n\
                      # Where did the config come from?\n    replymatch config --source"
    )]
    Config(cmd::config::ConfigArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    # Bash\n    replymatch completions bash > /etc/bash_completion.d/replymatch"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("REPLYMATCH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "replymatch=debug,info"
        } else {
            "replymatch=info,warn"
        })
    });

    let format = env::var("REPLYMATCH_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: Cli, output: OutputMode) -> anyhow::Result<()> {
    let working_dir = env::current_dir()?;
    let resolved = resolve_config(cli.config.as_deref(), &working_dir)?;
    debug!(source = ?resolved.source, "configuration resolved");
    let config = &resolved.config;

    match cli.command {
        Commands::Rank(ref args) => {
            timing::timed("cmd.rank", || cmd::rank::run_rank(args, config, output))
        }
        Commands::Search(ref args) => {
            timing::timed("cmd.search", || cmd::search::run_search(args, config, output))
        }
        Commands::Bulk(ref args) => {
            timing::timed("cmd.bulk", || cmd::bulk::run_bulk(args, config, output))
        }
        Commands::Consolidate(ref args) => timing::timed("cmd.consolidate", || {
            cmd::consolidate::run_consolidate(args, config, output)
        }),
        Commands::Quality(ref args) => {
            timing::timed("cmd.quality", || cmd::quality::run_quality(args, config, output))
        }
        Commands::Config(ref args) => timing::timed("cmd.config", || {
            cmd::config::run_config(args, config, resolved.source.as_deref(), output)
        }),
        Commands::Completions(args) => timing::timed("cmd.completions", || {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }),
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let timing_enabled = cli.timing || timing::enabled_from_env();
    timing::set_enabled(timing_enabled);

    let output = cli.output_mode();
    let result = run(cli, output);

    if timing_enabled {
        let report = timing::take_report();
        eprintln!("timing report:");
        eprintln!("{}", report.table());
        if output.is_json() && !report.is_empty() {
            eprintln!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            render_error(output, &CliError::from_anyhow(&err))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_before_subcommand() {
        let cli = Cli::parse_from([
            "replymatch",
            "--timing",
            "--format",
            "json",
            "rank",
            "cost",
            "--corpus",
            "faq.json",
        ]);
        assert!(cli.timing);
        assert_eq!(cli.format, Some(OutputMode::Json));
        match cli.command {
            Commands::Rank(args) => {
                assert_eq!(args.query, "cost");
                assert_eq!(args.corpus.paths, [PathBuf::from("faq.json")]);
                assert!(!args.explain);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::parse_from([
            "replymatch",
            "search",
            "foam",
            "-c",
            "a.json",
            "b.jsonl",
            "-n",
            "2",
            "--json",
            "--config",
            "custom.toml",
        ]);
        assert!(cli.json);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.limit, 2);
                assert_eq!(args.corpus.paths.len(), 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rank_requires_a_corpus() {
        let parsed = Cli::try_parse_from(["replymatch", "rank", "cost"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn search_limit_defaults_to_five() {
        let cli = Cli::parse_from(["replymatch", "search", "foam", "--corpus", "faq.json"]);
        match cli.command {
            Commands::Search(args) => assert_eq!(args.limit, 5),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn bulk_takes_queries_file() {
        let cli = Cli::parse_from([
            "replymatch",
            "bulk",
            "--queries",
            "q.txt",
            "--corpus",
            "faq.json",
        ]);
        assert!(matches!(cli.command, Commands::Bulk(ref a) if a.queries == PathBuf::from("q.txt")));
    }
}
