//! Progress reporting for the terminal.
//!
//! Everything goes through `tracing`, which the binary routes to stderr;
//! stdout is reserved for the retry listing.

use whirl_core::Reporter;
use whirl_schema::{InstallOutcome, Requirement};

/// [`Reporter`] that turns pipeline progress into log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn prepare_pipeline(&self, requirements: &[Requirement]) {
        tracing::info!("resolving {} requirement(s)", requirements.len());
    }

    fn resolving(&self, requirement: &Requirement) {
        tracing::debug!(%requirement, "fetching index page");
    }

    fn downloading(&self, requirement: &Requirement, filename: &str) {
        tracing::debug!(%requirement, filename, "downloading");
    }

    fn installing(&self, requirement: &Requirement, filename: &str) {
        tracing::debug!(%requirement, filename, "installing");
    }

    fn done(&self, outcome: &InstallOutcome) {
        tracing::info!(
            requirement = %outcome.requirement,
            artifact = outcome.artifact.as_deref().unwrap_or(""),
            "installed"
        );
    }

    fn failed(&self, outcome: &InstallOutcome) {
        tracing::warn!(
            requirement = %outcome.requirement,
            status = %outcome.status,
            "{}",
            outcome.detail.as_deref().unwrap_or("not installed")
        );
    }

    fn summary(&self, installed: usize, failed: usize, elapsed_secs: f64) {
        tracing::info!("{installed} installed, {failed} left over in {elapsed_secs:.1}s");
    }
}
