//! Terminal result of resolving and installing one requirement.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::requirement::Requirement;

/// The kind of terminal state a requirement reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The chosen wheel was downloaded and accepted by the installer.
    Installed,
    /// The index has no page for the name.
    Missing,
    /// Wheels exist, but none match the pinned version or the target tags.
    NoCompatibleArtifact,
    /// The chosen wheel could not be retrieved or failed verification.
    DownloadFailed,
    /// The installer rejected the downloaded wheel.
    InstallFailed,
}

impl OutcomeStatus {
    /// Short lowercase label used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::Missing => "missing",
            Self::NoCompatibleArtifact => "no compatible artifact",
            Self::DownloadFailed => "download failed",
            Self::InstallFailed => "install failed",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One requirement's terminal state, produced exactly once per requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallOutcome {
    /// The requirement this outcome belongs to.
    pub requirement: Requirement,
    /// What happened.
    pub status: OutcomeStatus,
    /// Filename of the selected wheel, once one was chosen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    /// Human-readable reason for failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl InstallOutcome {
    /// An outcome with no artifact and no detail.
    pub fn new(requirement: Requirement, status: OutcomeStatus) -> Self {
        Self {
            requirement,
            status,
            artifact: None,
            detail: None,
        }
    }

    /// Attach the selected wheel's filename.
    pub fn with_artifact(mut self, filename: impl Into<String>) -> Self {
        self.artifact = Some(filename.into());
        self
    }

    /// Attach a failure reason.
    pub fn with_detail(mut self, detail: impl fmt::Display) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    /// `true` only for [`OutcomeStatus::Installed`].
    pub fn is_installed(&self) -> bool {
        self.status == OutcomeStatus::Installed
    }
}
