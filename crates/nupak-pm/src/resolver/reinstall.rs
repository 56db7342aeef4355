//! Reinstall planning: remove then re-add the exact installed version.
//!
//! The two phases are planned together but kept as separate lists so the
//! removal fully completes before any install runs; they are never merged
//! or cross-reduced.

use std::collections::HashSet;
use std::sync::Arc;

use crate::constraints::ConstraintProvider;
use crate::error::Result;
use crate::operation::{reduce, PackageAction, PackageOperation};
use crate::package::{PackageIdentity, PackageMetadata, TargetPlatform};
use crate::repository::Repository;
use crate::resolver::{InstallWalker, UninstallWalker};

#[derive(Debug, Default)]
pub struct ReinstallPlan {
    pub uninstall: Vec<PackageOperation>,
    pub install: Vec<PackageOperation>,
}

impl ReinstallPlan {
    pub fn is_empty(&self) -> bool {
        self.uninstall.is_empty() && self.install.is_empty()
    }
}

/// A view of the installed set with the packages of the removal phase
/// masked out, so the install phase plans against the state the removal
/// will leave behind.
struct MaskedRepository {
    inner: Arc<dyn Repository>,
    masked: HashSet<PackageIdentity>,
}

impl Repository for MaskedRepository {
    fn source(&self) -> String {
        self.inner.source()
    }

    fn get_packages(&self) -> Vec<Arc<PackageMetadata>> {
        self.inner
            .get_packages()
            .into_iter()
            .filter(|package| !self.masked.contains(&package.identity()))
            .collect()
    }
}

/// Plan reinstalling `installed` at its exact version. Returns `None` with
/// a warning when the source no longer offers that version; pre-release
/// handling follows the installed version automatically.
pub fn plan_reinstall(
    local: Arc<dyn Repository>,
    source: Arc<dyn Repository>,
    constraints: Arc<dyn ConstraintProvider>,
    target_platform: Option<TargetPlatform>,
    installed: &Arc<PackageMetadata>,
    remove_dependencies: bool,
) -> Result<Option<ReinstallPlan>> {
    let Some(replacement) = source.find_package(installed.id(), Some(installed.version())) else {
        log::warn!(
            "skipping reinstall of '{}': version {} is no longer available from {}",
            installed.id(),
            installed.version(),
            source.source()
        );
        return Ok(None);
    };

    let mut remover = UninstallWalker::new(local.clone(), constraints.clone(), target_platform.clone())
        .remove_dependencies(remove_dependencies)
        .force(true);
    remover.resolve_operations(installed)?;
    let uninstall = reduce(remover.into_operations());

    let masked: HashSet<PackageIdentity> = uninstall
        .iter()
        .filter(|op| op.action == PackageAction::Uninstall)
        .map(|op| op.identity())
        .collect();
    let masked_local: Arc<dyn Repository> = Arc::new(MaskedRepository {
        inner: local,
        masked,
    });

    let mut installer = InstallWalker::new(masked_local, source, constraints, target_platform)
        .allow_prerelease(installed.version().is_prerelease())
        .skip_dependencies(!remove_dependencies);
    installer.resolve_operations(&replacement)?;
    let install = reduce(installer.into_operations());

    Ok(Some(ReinstallPlan { uninstall, install }))
}
