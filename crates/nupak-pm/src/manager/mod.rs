//! Execution managers tying plans to projects and the shared pool.

mod project;
mod solution;

pub use project::ProjectManager;
pub use solution::{ProjectScope, SolutionPackageManager};

use std::fs;
use std::sync::Arc;

use crate::error::Result;
use crate::package::{PackageIdentity, PackageMetadata};
use crate::repository::SharedPackageRepository;

/// How far an action got, for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    Planning,
    Executing,
    Committed,
    RolledBack,
}

/// Where a package's files live in the pool. Satellite package files are
/// laid into their core package's directory so resources resolve next to
/// the assemblies they localize.
pub(crate) fn install_directory(
    shared: &SharedPackageRepository,
    package: &PackageMetadata,
) -> std::path::PathBuf {
    let identity = match package.satellite_core_id() {
        Some(core_id) => PackageIdentity::new(core_id.to_string(), package.version().clone()),
        None => package.identity(),
    };
    shared.package_directory(&identity)
}

/// Lay a satellite package's files into its core directory.
pub(crate) fn expand_satellite_files(
    shared: &SharedPackageRepository,
    package: &Arc<PackageMetadata>,
) -> Result<()> {
    if !package.is_satellite() {
        return Ok(());
    }
    let core_directory = install_directory(shared, package);
    for file in package.files() {
        let target = core_directory.join(&file.path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        if !target.is_file() {
            fs::write(&target, [])?;
        }
    }
    Ok(())
}

/// Remove a satellite package's files from its core directory. Best
/// effort; the core directory may already be gone.
pub(crate) fn collapse_satellite_files(
    shared: &SharedPackageRepository,
    package: &Arc<PackageMetadata>,
) {
    if !package.is_satellite() {
        return;
    }
    let core_directory = install_directory(shared, package);
    for file in package.files() {
        let target = core_directory.join(&file.path);
        if target.is_file() {
            if let Err(error) = fs::remove_file(&target) {
                log::warn!("could not remove '{}': {}", target.display(), error);
            }
        }
    }
}
