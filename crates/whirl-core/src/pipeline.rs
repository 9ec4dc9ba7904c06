//! Pipeline coordinator.
//!
//! One task per requirement, all spawned up front on a `JoinSet`:
//!
//! ```text
//! fetch_index --> parse_releases --> select_candidate --> download_artifact --> install
//!      |                                   |                      |               |
//!   Missing                      NoCompatibleArtifact       DownloadFailed   InstallFailed
//! ```
//!
//! Tasks share nothing mutable. The HTTP client, installer and target
//! environment sit behind one `Arc`; each task owns a private temporary
//! directory that is removed when the task ends, however it ends.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use whirl_schema::{InstallOutcome, OutcomeStatus, Requirement, TargetEnvironment};

use crate::index::parse_releases;
use crate::io::fetch::Fetcher;
use crate::io::http::HttpClient;
use crate::io::install::ArtifactInstaller;
use crate::reporter::{NullReporter, Reporter};
use crate::select::select_candidate;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Base URL; package pages live at `{index_url}/{name}`.
    pub index_url: String,
    /// Upper bound on each network operation. `None` leaves it to the client.
    pub timeout: Option<Duration>,
    /// Maximum number of requirements in flight. `None` runs all at once.
    pub concurrency: Option<usize>,
    /// Passed through to the installer.
    pub force_reinstall: bool,
    /// Where per-task temporary directories are created. `None` uses the
    /// system default.
    pub temp_root: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            index_url: crate::DEFAULT_INDEX_URL.to_string(),
            timeout: None,
            concurrency: None,
            force_reinstall: true,
            temp_root: None,
        }
    }
}

/// Every outcome of one run, one per input requirement, in completion order.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub outcomes: Vec<InstallOutcome>,
    pub elapsed_secs: f64,
}

impl Report {
    pub fn installed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_installed()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &InstallOutcome> {
        self.outcomes.iter().filter(|o| !o.is_installed())
    }

    /// `name==version` for every requirement that was not installed.
    pub fn retry_lines(&self) -> Vec<String> {
        self.failures().map(|o| o.requirement.retry_line()).collect()
    }
}

struct Shared {
    fetcher: Fetcher,
    installer: Arc<dyn ArtifactInstaller>,
    env: TargetEnvironment,
    reporter: Arc<dyn Reporter>,
    config: PipelineConfig,
}

#[derive(Clone)]
pub struct Pipeline {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.shared.config)
            .field("env", &self.shared.env.implementation())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        client: Arc<dyn HttpClient>,
        installer: Arc<dyn ArtifactInstaller>,
        env: TargetEnvironment,
        config: PipelineConfig,
    ) -> Self {
        Self::with_reporter(client, installer, env, config, Arc::new(NullReporter))
    }

    pub fn with_reporter(
        client: Arc<dyn HttpClient>,
        installer: Arc<dyn ArtifactInstaller>,
        env: TargetEnvironment,
        config: PipelineConfig,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let fetcher = Fetcher::new(client).with_timeout(config.timeout);
        Self {
            shared: Arc::new(Shared {
                fetcher,
                installer,
                env,
                reporter,
                config,
            }),
        }
    }

    /// Resolve and install every requirement concurrently, waiting for all
    /// of them.
    ///
    /// Dropping the returned future aborts every task still running; their
    /// temporary directories are removed as the tasks unwind.
    pub async fn run(&self, requirements: Vec<Requirement>) -> Report {
        let start_time = Instant::now();
        let shared = &self.shared;
        shared.reporter.prepare_pipeline(&requirements);

        let semaphore = shared
            .config
            .concurrency
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));

        let mut set = JoinSet::new();
        let mut pending = HashMap::with_capacity(requirements.len());

        for requirement in requirements {
            let task_shared = Arc::clone(shared);
            let semaphore = semaphore.clone();
            let task_requirement = requirement.clone();

            let handle = set.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                task_shared.resolve(task_requirement).await
            });
            pending.insert(handle.id(), requirement);
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        while let Some(joined) = set.join_next_with_id().await {
            match joined {
                Ok((id, outcome)) => {
                    pending.remove(&id);
                    outcomes.push(outcome);
                }
                Err(err) => {
                    if let Some(requirement) = pending.remove(&err.id()) {
                        tracing::error!(%requirement, "resolution task failed: {err}");
                        let outcome = InstallOutcome::new(requirement, OutcomeStatus::InstallFailed)
                            .with_detail(format!("task failed: {err}"));
                        shared.report(&outcome);
                        outcomes.push(outcome);
                    }
                }
            }
        }

        let report = Report {
            outcomes,
            elapsed_secs: start_time.elapsed().as_secs_f64(),
        };
        let installed = report.installed();
        shared.reporter.summary(
            installed,
            report.outcomes.len() - installed,
            report.elapsed_secs,
        );
        report
    }

    /// Resolve and install a single requirement on the current task.
    pub async fn resolve(&self, requirement: Requirement) -> InstallOutcome {
        self.shared.resolve(requirement).await
    }
}

impl Shared {
    async fn resolve(&self, requirement: Requirement) -> InstallOutcome {
        let outcome = self.resolve_inner(requirement).await;
        self.report(&outcome);
        outcome
    }

    async fn resolve_inner(&self, requirement: Requirement) -> InstallOutcome {
        self.reporter.resolving(&requirement);

        let Some(page) = self
            .fetcher
            .fetch_index(&self.config.index_url, requirement.name())
            .await
        else {
            return InstallOutcome::new(requirement, OutcomeStatus::Missing)
                .with_detail("no index page");
        };

        let records = parse_releases(&page.body, &page.url);
        tracing::debug!(%requirement, records = records.len(), "parsed index page");

        let selection = match select_candidate(&requirement, records, &self.env) {
            Ok(selection) => selection,
            Err(rejection) => {
                return InstallOutcome::new(requirement, OutcomeStatus::NoCompatibleArtifact)
                    .with_detail(rejection);
            }
        };
        let filename = selection.record.filename.clone();

        let temp_dir = match self.temp_dir() {
            Ok(dir) => dir,
            Err(e) => {
                return InstallOutcome::new(requirement, OutcomeStatus::DownloadFailed)
                    .with_artifact(filename)
                    .with_detail(format!("cannot create temporary directory: {e}"));
            }
        };
        let dest = temp_dir.path().join(local_name(&filename));

        self.reporter.downloading(&requirement, &filename);
        if let Err(e) = self
            .fetcher
            .download_artifact(
                selection.record.download_url(),
                &dest,
                selection.record.sha256(),
            )
            .await
        {
            return InstallOutcome::new(requirement, OutcomeStatus::DownloadFailed)
                .with_artifact(filename)
                .with_detail(e);
        }

        self.reporter.installing(&requirement, &filename);
        let status = match self
            .installer
            .install(&dest, self.config.force_reinstall)
            .await
        {
            Ok(()) => InstallOutcome::new(requirement, OutcomeStatus::Installed),
            Err(e) => InstallOutcome::new(requirement, OutcomeStatus::InstallFailed).with_detail(e),
        };
        status.with_artifact(filename)
    }

    fn temp_dir(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("whirl-");
        match &self.config.temp_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
    }

    fn report(&self, outcome: &InstallOutcome) {
        tracing::debug!(
            requirement = %outcome.requirement,
            status = %outcome.status,
            artifact = ?outcome.artifact,
            "terminal outcome"
        );
        if outcome.is_installed() {
            self.reporter.done(outcome);
        } else {
            self.reporter.failed(outcome);
        }
    }
}

/// Final path component of a listing filename, so a hostile link text
/// cannot point the download outside the task's directory.
fn local_name(filename: &str) -> &str {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("artifact.whl")
}
