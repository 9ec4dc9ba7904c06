//! Artifact installer capability.
//!
//! The pipeline hands over a local wheel path and only cares whether the
//! installer accepted it. [`WheelUnpacker`] is the bundled implementation:
//! it unpacks the archive into a target directory (a `site-packages` style
//! layout), without script generation or `RECORD` rewriting.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid wheel archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("archive entry escapes the target directory: {0}")]
    UnsafePath(String),

    #[error("refusing to overwrite existing file: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("installer task failed: {0}")]
    Task(String),
}

#[async_trait]
pub trait ArtifactInstaller: Send + Sync {
    /// Install the wheel at `artifact`. With `force_overwrite` unset an
    /// already-present file is an error.
    async fn install(&self, artifact: &Path, force_overwrite: bool) -> Result<(), InstallError>;
}

/// Unpacks wheels into a fixed directory.
#[derive(Debug, Clone)]
pub struct WheelUnpacker {
    target: PathBuf,
}

impl WheelUnpacker {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }
}

#[async_trait]
impl ArtifactInstaller for WheelUnpacker {
    async fn install(&self, artifact: &Path, force_overwrite: bool) -> Result<(), InstallError> {
        let artifact = artifact.to_path_buf();
        let target = self.target.clone();
        tokio::task::spawn_blocking(move || unpack(&artifact, &target, force_overwrite))
            .await
            .map_err(|e| InstallError::Task(e.to_string()))?
    }
}

/// Extract every entry of the wheel under `target`.
///
/// All entry paths are validated before anything is written, so a rejected
/// archive leaves the target untouched.
fn unpack(artifact: &Path, target: &Path, force_overwrite: bool) -> Result<(), InstallError> {
    let file = fs::File::open(artifact)?;
    let mut archive = zip::ZipArchive::new(file)?;

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| InstallError::UnsafePath(entry.name().to_string()))?;
        let dest = target.join(relative);
        if !force_overwrite && !entry.is_dir() && dest.exists() {
            return Err(InstallError::AlreadyExists(dest));
        }
        entries.push((i, dest, entry.is_dir()));
    }

    fs::create_dir_all(target)?;
    for (i, dest, is_dir) in entries {
        if is_dir {
            fs::create_dir_all(&dest)?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut entry = archive.by_index(i)?;
        let mut out = fs::File::create(&dest)?;
        io::copy(&mut entry, &mut out)?;
    }

    tracing::debug!(
        artifact = %artifact.display(),
        target = %target.display(),
        files = archive.len(),
        "unpacked wheel"
    );
    Ok(())
}
