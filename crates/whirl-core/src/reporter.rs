//! Reporter trait for dependency injection
//!
//! This trait allows the pipeline to report progress and status without
//! being coupled to a specific presentation. Calls may arrive from many
//! tasks at once.

use whirl_schema::{InstallOutcome, Requirement};

pub trait Reporter: Send + Sync {
    /// Called once with every requirement before any task starts.
    fn prepare_pipeline(&self, requirements: &[Requirement]);

    /// The index page for a requirement is being fetched.
    fn resolving(&self, requirement: &Requirement);

    /// The selected wheel is being downloaded.
    fn downloading(&self, requirement: &Requirement, filename: &str);

    /// The downloaded wheel was handed to the installer.
    fn installing(&self, requirement: &Requirement, filename: &str);

    /// A requirement reached `Installed`.
    fn done(&self, outcome: &InstallOutcome);

    /// A requirement reached any other terminal state.
    fn failed(&self, outcome: &InstallOutcome);

    /// Display a final summary once every task has finished.
    fn summary(&self, installed: usize, failed: usize, elapsed_secs: f64);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn prepare_pipeline(&self, requirements: &[Requirement]) {
        (**self).prepare_pipeline(requirements);
    }
    fn resolving(&self, requirement: &Requirement) {
        (**self).resolving(requirement);
    }
    fn downloading(&self, requirement: &Requirement, filename: &str) {
        (**self).downloading(requirement, filename);
    }
    fn installing(&self, requirement: &Requirement, filename: &str) {
        (**self).installing(requirement, filename);
    }
    fn done(&self, outcome: &InstallOutcome) {
        (**self).done(outcome);
    }
    fn failed(&self, outcome: &InstallOutcome) {
        (**self).failed(outcome);
    }
    fn summary(&self, installed: usize, failed: usize, elapsed_secs: f64) {
        (**self).summary(installed, failed, elapsed_secs);
    }
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn prepare_pipeline(&self, _: &[Requirement]) {}
    fn resolving(&self, _: &Requirement) {}
    fn downloading(&self, _: &Requirement, _: &str) {}
    fn installing(&self, _: &Requirement, _: &str) {}
    fn done(&self, _: &InstallOutcome) {}
    fn failed(&self, _: &InstallOutcome) {}
    fn summary(&self, _: usize, _: usize, _: f64) {}
}
