//! `replymatch config`: print the effective configuration.

use crate::output::OutputMode;
use anyhow::{Context, Result};
use clap::Args;
use replymatch_core::EngineConfig;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print only where the configuration was loaded from.
    #[arg(long)]
    pub source: bool,
}

#[derive(Debug, Serialize)]
struct ConfigOutput<'a> {
    source: Option<&'a Path>,
    config: &'a EngineConfig,
}

fn source_label(source: Option<&Path>) -> String {
    source.map_or_else(|| "built-in defaults".to_string(), |p| p.display().to_string())
}

/// Execute `replymatch config`.
///
/// Non-JSON output is valid TOML, so it can be saved as a starting
/// `replymatch.toml`.
///
/// # Errors
///
/// Returns an error if the configuration cannot be serialized.
pub fn run_config(
    args: &ConfigArgs,
    config: &EngineConfig,
    source: Option<&Path>,
    output: OutputMode,
) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if output.is_json() {
        let payload = ConfigOutput { source, config };
        if args.source {
            serde_json::to_writer_pretty(&mut out, &serde_json::json!({ "source": source }))?;
        } else {
            serde_json::to_writer_pretty(&mut out, &payload)?;
        }
        writeln!(out)?;
        return Ok(());
    }

    if args.source {
        writeln!(out, "{}", source_label(source))?;
        return Ok(());
    }

    let rendered = toml::to_string_pretty(config).context("serializing configuration")?;
    writeln!(out, "# source: {}", source_label(source))?;
    write!(out, "{rendered}")?;
    Ok(())
}
