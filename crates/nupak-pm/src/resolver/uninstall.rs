//! Removal planning: the target leaves first, then dependencies that
//! nothing else needs.

use std::sync::Arc;

use crate::constraints::ConstraintProvider;
use crate::error::{PlanningError, Result};
use crate::operation::{PackageAction, PackageOperation};
use crate::package::{PackageDependency, PackageMetadata, TargetPlatform};
use crate::repository::Repository;
use crate::walker::{walk, DependentsWalker, PackageMarker, WalkerStrategy};

/// Plans removals from an installed set. Refuses to remove a package other
/// installed packages still depend on unless forced; with
/// `remove_dependencies` it also removes dependencies that would be
/// orphaned, skipping (with a warning) any that are still needed or pinned.
pub struct UninstallWalker {
    installed: Arc<dyn Repository>,
    constraints: Arc<dyn ConstraintProvider>,
    target_platform: Option<TargetPlatform>,
    remove_dependencies: bool,
    force: bool,
    marker: PackageMarker,
    operations: Vec<PackageOperation>,
}

impl UninstallWalker {
    pub fn new(
        installed: Arc<dyn Repository>,
        constraints: Arc<dyn ConstraintProvider>,
        target_platform: Option<TargetPlatform>,
    ) -> Self {
        Self {
            installed,
            constraints,
            target_platform,
            remove_dependencies: false,
            force: false,
            marker: PackageMarker::new(),
            operations: Vec::new(),
        }
    }

    pub fn remove_dependencies(mut self, remove: bool) -> Self {
        self.remove_dependencies = remove;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn resolve_operations(&mut self, target: &Arc<PackageMetadata>) -> Result<()> {
        let dependents = self.remaining_dependents(target);
        if !dependents.is_empty() {
            let names: Vec<String> = dependents
                .iter()
                .map(|package| package.identity().to_string())
                .collect();
            if !self.force {
                return Err(PlanningError::PackageInUse {
                    package: target.identity().to_string(),
                    dependents: names.join(", "),
                });
            }
            log::warn!(
                "removing '{}' even though '{}' depend(s) on it",
                target.identity(),
                names.join(", ")
            );
        }

        let platform = self.target_platform.clone();
        let mut marker = std::mem::take(&mut self.marker);
        let walked = walk(self, &mut marker, platform.as_ref(), target);
        self.marker = marker;
        walked
    }

    pub fn into_operations(self) -> Vec<PackageOperation> {
        self.operations
    }

    fn scheduled(&self, package: &Arc<PackageMetadata>) -> bool {
        self.operations
            .iter()
            .any(|op| op.action == PackageAction::Uninstall && op.identity() == package.identity())
    }

    /// Dependents that will still be installed once everything scheduled so
    /// far is gone.
    fn remaining_dependents(&self, package: &Arc<PackageMetadata>) -> Vec<Arc<PackageMetadata>> {
        DependentsWalker::new(self.installed.as_ref(), self.target_platform.clone())
            .direct_dependents(package.id())
            .into_iter()
            .filter(|dependent| !self.scheduled(dependent))
            .collect()
    }
}

impl WalkerStrategy for UninstallWalker {
    fn resolve_dependency(
        &mut self,
        dependency: &PackageDependency,
    ) -> Result<Option<Arc<PackageMetadata>>> {
        let Some(installed) = self
            .installed
            .find_packages_by_id(&dependency.id)
            .into_iter()
            .find(|package| dependency.satisfied_by(package.version()))
        else {
            return Ok(None);
        };

        // Only remove a dependency nothing else still needs.
        let dependents = self.remaining_dependents(&installed);
        if !dependents.is_empty() {
            log::warn!(
                "keeping '{}': '{}' still depend(s) on it",
                installed.identity(),
                dependents
                    .iter()
                    .map(|package| package.identity().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            return Ok(None);
        }
        if self.constraints.constraint(&dependency.id).is_some() {
            log::warn!(
                "keeping '{}': pinned in {}",
                installed.identity(),
                self.constraints.source()
            );
            return Ok(None);
        }
        Ok(Some(installed))
    }

    fn on_before_walk(&mut self, package: &Arc<PackageMetadata>) -> Result<()> {
        // Roots-first: a package is removed before its dependencies.
        if !self.scheduled(package) {
            self.operations.push(PackageOperation::uninstall(package.clone()));
        }
        Ok(())
    }

    fn on_dependency_resolve_error(&mut self, dependency: &PackageDependency) -> Result<()> {
        log::debug!("'{}' is not installed, nothing to remove", dependency.id);
        Ok(())
    }

    fn ignore_dependencies(&self) -> bool {
        !self.remove_dependencies
    }
}
