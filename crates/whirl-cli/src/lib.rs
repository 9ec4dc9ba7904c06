//! whirl - concurrent wheel installer
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Reads a list of `name==version` requirements, looks each one up on a
//! simple package index, picks the best wheel for the target interpreter
//! and unpacks it into a target directory. Every requirement runs as its
//! own task; nothing waits on anything else.
//!
//! # Output
//!
//! Diagnostics go to stderr. Stdout carries one `name==version` line per
//! requirement that was not installed, so a caller can hand them to a
//! slower installer:
//!
//! ```text
//! whirl -r requirements.txt --target ./site-packages > leftovers.txt
//! ```

pub mod config;
pub mod ui;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use whirl_core::{Pipeline, PipelineConfig, Report, ReqwestClient, WheelUnpacker};
use whirl_schema::{Requirement, TargetEnvironment};

pub use config::{ConfigError, FileConfig, Settings};

#[derive(Debug, Parser)]
#[command(name = "whirl")]
#[command(author, version, about = "whirl - concurrent wheel installer")]
pub struct Cli {
    /// Requirements, `name` or `name==version`
    pub requirements: Vec<String>,

    /// Read requirements from a file, one per line
    #[arg(short = 'r', long = "requirement", env = "WHIRL_REQUIREMENTS")]
    pub requirements_file: Option<PathBuf>,

    /// TOML config file
    #[arg(long, env = "WHIRL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base URL of the simple index
    #[arg(long, short = 'i', env = "WHIRL_INDEX_URL")]
    pub index_url: Option<String>,

    /// Host whose TLS certificate is not verified
    #[arg(long, env = "WHIRL_TRUSTED_HOST")]
    pub trusted_host: Option<String>,

    /// Directory wheels are unpacked into
    #[arg(long, short = 't', env = "WHIRL_TARGET")]
    pub target: Option<PathBuf>,

    /// Interpreter version wheels are selected for (X.Y)
    #[arg(long, env = "WHIRL_PYTHON_VERSION")]
    pub python_version: Option<String>,

    /// Interpreter implementation tag (cp, pp, ...)
    #[arg(long, env = "WHIRL_IMPLEMENTATION")]
    pub implementation: Option<String>,

    /// ABI tag override
    #[arg(long, env = "WHIRL_ABI")]
    pub abi: Option<String>,

    /// Platform tags, most specific first (repeatable)
    #[arg(long = "platform", env = "WHIRL_PLATFORMS", value_delimiter = ',')]
    pub platforms: Vec<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "WHIRL_TIMEOUT")]
    pub timeout_secs: Option<u64>,

    /// Maximum number of requirements in flight
    #[arg(long, short = 'j', env = "WHIRL_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Refuse to overwrite files already present in the target
    #[arg(long)]
    pub no_clobber: bool,

    /// Write every outcome as JSON to this path
    #[arg(long, env = "WHIRL_REPORT")]
    pub report: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Default `EnvFilter` directive for the chosen verbosity. `None` means
    /// defer to `RUST_LOG`.
    pub fn log_directive(&self) -> Option<&'static str> {
        if self.verbose {
            Some("whirl=debug")
        } else if self.quiet {
            Some("whirl=warn")
        } else {
            None
        }
    }
}

/// Requirements from the file (if any) followed by the positional ones.
///
/// Fails on an unreadable file or any line that is not `name` or
/// `name==version`; no requirement is attempted in that case.
pub fn load_requirements(settings: &Settings) -> Result<Vec<Requirement>, ConfigError> {
    let mut requirements = match &settings.requirements_file {
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            Requirement::parse_listing(&text)?
        }
        None => Vec::new(),
    };

    for (idx, text) in settings.requirements.iter().enumerate() {
        if let Some(requirement) = Requirement::parse_line(text, idx + 1)? {
            requirements.push(requirement);
        }
    }
    Ok(requirements)
}

/// Wire the reqwest client, the wheel unpacker and the target environment
/// into a pipeline.
pub fn build_pipeline(settings: &Settings) -> anyhow::Result<Pipeline> {
    let client = ReqwestClient::new(settings.trusted_host.as_deref())?;
    let env = TargetEnvironment::new(
        &settings.implementation,
        settings.python_version,
        settings.abi.as_deref(),
        &settings.platforms,
    );
    tracing::debug!(
        implementation = env.implementation(),
        python = ?env.python_version(),
        tags = env.supported_tags().len(),
        "target environment"
    );

    let config = PipelineConfig {
        index_url: settings.index_url.clone(),
        timeout: settings.timeout,
        concurrency: settings.concurrency,
        force_reinstall: settings.force_reinstall,
        temp_root: None,
    };

    Ok(Pipeline::with_reporter(
        Arc::new(client),
        Arc::new(WheelUnpacker::new(&settings.target)),
        env,
        config,
        Arc::new(ui::LogReporter),
    ))
}

/// One `name==version` line per requirement that was not installed.
pub fn write_retry_list(report: &Report, out: &mut impl Write) -> std::io::Result<()> {
    for line in report.retry_lines() {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

/// Dump every outcome as pretty JSON.
pub fn write_report(report: &Report, path: &std::path::Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), report)?;
    Ok(())
}
