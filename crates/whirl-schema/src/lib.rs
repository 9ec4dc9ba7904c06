//! Shared types for whirl.
//!
//! Everything in this crate is synchronous and side-effect free: parsing of
//! requirement lines and wheel filenames, the tag model used to rank wheels
//! against an interpreter, and the per-requirement outcome that the pipeline
//! reports.

pub mod outcome;
pub mod requirement;
pub mod tags;
pub mod wheel;

// Re-exports
pub use outcome::{InstallOutcome, OutcomeStatus};
pub use requirement::{Requirement, RequirementError};
pub use tags::{CompatibilityRank, Tag, TargetEnvironment};
pub use wheel::{ArtifactDescriptor, matches_version};
