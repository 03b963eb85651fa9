//! Minimal worked example of wiring `buildmessage::capture` and
//! `linker::full_link` together: reads a manifest describing a directory of
//! already-compiled source files plus their install options, links them into
//! one bundle, and writes the bundle and its source map to disk.
//!
//! This binary exists only to demonstrate the wiring; it does not attempt
//! configuration loading, plugin discovery, or any of the other CLI concerns
//! this crate places out of scope (see DESIGN.md).

use clap::Parser;
use linker::{full_link, FullLinkInput, OutputFile};
use linker_core::buildmessage::{self, JobOptions};
use linker_core::core::{format_error_with_help, LinkerConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "modlink")]
#[command(about = "Link a directory of compiled module files into one bundle")]
#[command(version)]
struct Cli {
    /// Path to a JSON manifest describing the files to link (see DESIGN.md
    /// for its shape, a direct JSON encoding of `FullLinkInput`).
    manifest: PathBuf,

    /// Directory to write the bundle and its source map into.
    #[arg(short, long, default_value = "dist")]
    out_dir: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = LinkerConfig::from_env();

    if config.requires_legacy_linker() {
        eprintln!(
            "{}",
            format_error_with_help(&linker_core::core::LinkerError::LegacyLinkerUnsupported)
        );
        return ExitCode::FAILURE;
    }

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), String> {
    let manifest_text = std::fs::read_to_string(&cli.manifest)
        .map_err(|e| format!("reading {}: {e}", cli.manifest.display()))?;
    let input: FullLinkInput = serde_json::from_str(&manifest_text)
        .map_err(|e| format!("parsing {}: {e}", cli.manifest.display()))?;

    let (outputs, message_set) = buildmessage::capture(
        Some(JobOptions::titled(format!("linking {}", cli.manifest.display()))),
        || full_link(input),
    )
    .await;

    if !message_set.is_empty() {
        eprint!("{}", message_set.format_messages());
    }

    let outputs = outputs.map_err(|e| format_error_with_help(&e))?;
    write_outputs(&cli.out_dir, &outputs)
}

fn write_outputs(out_dir: &PathBuf, outputs: &[OutputFile]) -> Result<(), String> {
    std::fs::create_dir_all(out_dir).map_err(|e| format!("creating {}: {e}", out_dir.display()))?;

    for output in outputs {
        let dest = out_dir.join(output.serve_path.trim_start_matches('/'));
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| format!("creating {}: {e}", parent.display()))?;
        }
        std::fs::write(&dest, &output.source).map_err(|e| format!("writing {}: {e}", dest.display()))?;

        if let Some(map) = &output.source_map {
            let map_path = PathBuf::from(format!("{}.map", dest.display()));
            let map_json = serde_json::to_string(map).map_err(|e| e.to_string())?;
            std::fs::write(&map_path, map_json).map_err(|e| format!("writing {}: {e}", map_path.display()))?;
        }
        tracing::debug!(path = %dest.display(), "wrote bundle output");
    }

    Ok(())
}
