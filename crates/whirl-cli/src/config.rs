//! Layered settings: built-in defaults, then the TOML config file, then
//! environment variables and flags (clap folds those two together).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use whirl_schema::RequirementError;
use whirl_schema::tags::{host_platforms, parse_python_version};

use crate::Cli;

pub const DEFAULT_TARGET: &str = "site-packages";
pub const DEFAULT_PYTHON: (u32, u32) = (3, 12);
pub const DEFAULT_IMPLEMENTATION: &str = "cp";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid python version '{0}', expected X.Y")]
    PythonVersion(String),

    #[error("concurrency must be at least 1")]
    Concurrency,

    #[error(transparent)]
    Requirement(#[from] RequirementError),
}

/// Contents of the optional config file. Every key is optional.
///
/// ```toml
/// index_url = "https://mirror.example/simple"
/// python_version = "3.11"
/// platforms = ["manylinux_2_28_x86_64", "linux_x86_64"]
/// concurrency = 16
/// ```
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub index_url: Option<String>,
    pub trusted_host: Option<String>,
    pub requirements: Option<PathBuf>,
    pub target: Option<PathBuf>,
    pub python_version: Option<String>,
    pub implementation: Option<String>,
    pub abi: Option<String>,
    pub platforms: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
    pub concurrency: Option<usize>,
    pub force_reinstall: Option<bool>,
    pub report: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub index_url: String,
    pub trusted_host: Option<String>,
    pub requirements_file: Option<PathBuf>,
    pub requirements: Vec<String>,
    pub target: PathBuf,
    pub python_version: (u32, u32),
    pub implementation: String,
    pub abi: Option<String>,
    pub platforms: Vec<String>,
    pub timeout: Option<Duration>,
    pub concurrency: Option<usize>,
    pub force_reinstall: bool,
    pub report: Option<PathBuf>,
}

impl Settings {
    /// Read the config file named by `--config` / `WHIRL_CONFIG`, if any,
    /// and merge it under the command line.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(cli, file)
    }

    /// Flags and environment win over the file, the file wins over defaults.
    pub fn resolve(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let python_version = match cli.python_version.as_ref().or(file.python_version.as_ref()) {
            Some(text) => parse_python_version(text)
                .ok_or_else(|| ConfigError::PythonVersion(text.clone()))?,
            None => DEFAULT_PYTHON,
        };

        let concurrency = cli.concurrency.or(file.concurrency);
        if concurrency == Some(0) {
            return Err(ConfigError::Concurrency);
        }

        let platforms = if cli.platforms.is_empty() {
            file.platforms.unwrap_or_else(host_platforms)
        } else {
            cli.platforms.clone()
        };

        Ok(Self {
            index_url: cli
                .index_url
                .clone()
                .or(file.index_url)
                .unwrap_or_else(|| whirl_core::DEFAULT_INDEX_URL.to_string()),
            trusted_host: cli.trusted_host.clone().or(file.trusted_host),
            requirements_file: cli.requirements_file.clone().or(file.requirements),
            requirements: cli.requirements.clone(),
            target: cli
                .target
                .clone()
                .or(file.target)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TARGET)),
            python_version,
            implementation: cli
                .implementation
                .clone()
                .or(file.implementation)
                .unwrap_or_else(|| DEFAULT_IMPLEMENTATION.to_string()),
            abi: cli.abi.clone().or(file.abi),
            platforms,
            timeout: cli
                .timeout_secs
                .or(file.timeout_secs)
                .map(Duration::from_secs),
            concurrency,
            force_reinstall: !cli.no_clobber && file.force_reinstall.unwrap_or(true),
            report: cli.report.clone().or(file.report),
        })
    }
}
