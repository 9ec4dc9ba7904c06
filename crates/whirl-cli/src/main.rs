//! whirl - concurrent wheel installer CLI

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use whirl_cli::{Cli, Settings, build_pipeline, load_requirements, write_report, write_retry_list};

/// Conventional exit status for a run stopped by SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Logs on stderr; stdout carries the retry listing only
    let filter = match cli.log_directive() {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("whirl=info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_cli(&cli)?;
    let requirements = load_requirements(&settings)?;
    let pipeline = build_pipeline(&settings)?;

    let report = tokio::select! {
        report = pipeline.run(requirements) => report,
        Ok(()) = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, abandoning in-flight requirements");
            return Ok(ExitCode::from(EXIT_INTERRUPTED));
        }
    };

    write_retry_list(&report, &mut std::io::stdout().lock())?;
    if let Some(path) = &settings.report {
        write_report(&report, path)?;
        tracing::debug!(path = %path.display(), "wrote report");
    }
    Ok(ExitCode::SUCCESS)
}
