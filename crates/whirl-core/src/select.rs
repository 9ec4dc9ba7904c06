//! Candidate selection: pick the best wheel from an index listing.

use whirl_schema::{ArtifactDescriptor, CompatibilityRank, Requirement, TargetEnvironment};

use crate::index::ReleaseRecord;

/// The wheel chosen for a requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// The listing entry to download.
    pub record: ReleaseRecord,
    /// Its parsed filename.
    pub descriptor: ArtifactDescriptor,
    /// How well it fits the target; never `Incompatible`.
    pub rank: CompatibilityRank,
}

/// No listed wheel satisfies the requirement on this target.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no compatible wheel ({wheels} wheels listed, {matching} matching the requested version)")]
pub struct NoCompatibleArtifact {
    /// Listing entries that parsed as wheels.
    pub wheels: usize,
    /// Wheels left after the version filter.
    pub matching: usize,
}

/// Choose the best wheel for `requirement` out of `records`.
///
/// Non-wheel entries are dropped, then wheels whose version is not exactly
/// the pinned one. The rest are ranked against `env`; ties keep listing
/// order. The first compatible wheel wins.
///
/// # Errors
///
/// Returns [`NoCompatibleArtifact`] when nothing survives filtering or
/// every survivor is incompatible.
pub fn select_candidate(
    requirement: &Requirement,
    records: Vec<ReleaseRecord>,
    env: &TargetEnvironment,
) -> Result<Selection, NoCompatibleArtifact> {
    let wheels: Vec<(ReleaseRecord, ArtifactDescriptor)> = records
        .into_iter()
        .filter_map(|record| {
            let descriptor = ArtifactDescriptor::parse(&record.filename)?;
            Some((record, descriptor))
        })
        .collect();
    let wheel_count = wheels.len();

    let mut ranked: Vec<Selection> = wheels
        .into_iter()
        .filter(|(_, descriptor)| {
            requirement
                .version()
                .is_none_or(|pinned| descriptor.matches_version(pinned))
        })
        .map(|(record, descriptor)| {
            let rank = env.rank(&descriptor);
            Selection {
                record,
                descriptor,
                rank,
            }
        })
        .collect();
    let matching = ranked.len();

    // `sort_by_key` is stable, so equal ranks keep listing order.
    ranked.sort_by_key(|candidate| candidate.rank);

    let chosen = ranked
        .into_iter()
        .find(|candidate| candidate.rank.is_compatible());

    match chosen {
        Some(selection) => {
            tracing::debug!(
                requirement = %requirement,
                filename = %selection.record.filename,
                rank = ?selection.rank,
                "selected wheel"
            );
            Ok(selection)
        }
        None => Err(NoCompatibleArtifact {
            wheels: wheel_count,
            matching,
        }),
    }
}
