//! Generic depth-first dependency traversal.
//!
//! One walk function serves every planning strategy: the strategy supplies
//! dependency resolution and hooks, the walker supplies ordering, platform
//! selection and cycle protection.

mod dependents;

pub use dependents::DependentsWalker;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{PlanningError, Result};
use crate::package::{PackageDependency, PackageIdentity, PackageMetadata, TargetPlatform};

/// Where a package stands in the current traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    /// On the recursion stack; seeing it again is a cycle, treated as
    /// already satisfied.
    Processing,
    Visited,
}

/// Explicit visited tracking threaded through the walk, keyed by package
/// identity. Shared across walks when several roots belong to one plan.
#[derive(Debug, Default)]
pub struct PackageMarker {
    states: HashMap<PackageIdentity, VisitState>,
}

impl PackageMarker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_processing(&mut self, identity: PackageIdentity) {
        self.states.insert(identity, VisitState::Processing);
    }

    pub fn mark_visited(&mut self, identity: PackageIdentity) {
        self.states.insert(identity, VisitState::Visited);
    }

    pub fn state(&self, identity: &PackageIdentity) -> Option<VisitState> {
        self.states.get(identity).copied()
    }

    pub fn contains(&self, identity: &PackageIdentity) -> bool {
        self.states.contains_key(identity)
    }
}

/// The pluggable part of a walk. `resolve_dependency` turns a declaration
/// into a concrete package (or `None` when it cannot); the hooks let
/// strategies record operations around the traversal.
pub trait WalkerStrategy {
    fn resolve_dependency(
        &mut self,
        dependency: &PackageDependency,
    ) -> Result<Option<Arc<PackageMetadata>>>;

    /// Called before a package's dependencies are walked. Removal
    /// strategies record their operation here (roots-first).
    fn on_before_walk(&mut self, _package: &Arc<PackageMetadata>) -> Result<()> {
        Ok(())
    }

    fn on_after_resolve(
        &mut self,
        _package: &Arc<PackageMetadata>,
        _dependency: &PackageDependency,
        _resolved: &Arc<PackageMetadata>,
    ) -> Result<()> {
        Ok(())
    }

    /// Called after a package's dependencies are walked. Install
    /// strategies record their operation here (leaves-first).
    fn on_after_walk(&mut self, _package: &Arc<PackageMetadata>) -> Result<()> {
        Ok(())
    }

    /// Called when `resolve_dependency` returns `None`. The default raises;
    /// strategies that tolerate unresolvable dependencies override this
    /// with a warning.
    fn on_dependency_resolve_error(&mut self, dependency: &PackageDependency) -> Result<()> {
        Err(PlanningError::DependencyResolution {
            dependency: dependency.to_string(),
        })
    }

    /// When true, dependencies are not walked at all.
    fn ignore_dependencies(&self) -> bool {
        false
    }
}

/// Walk `package` depth-first, resolving dependencies through `strategy`.
///
/// Dependencies are selected for `platform` (the most specific compatible
/// dependency set). Packages already processing or visited in `marker` are
/// skipped, which both breaks cycles and deduplicates shared dependencies.
pub fn walk(
    strategy: &mut dyn WalkerStrategy,
    marker: &mut PackageMarker,
    platform: Option<&TargetPlatform>,
    package: &Arc<PackageMetadata>,
) -> Result<()> {
    let identity = package.identity();
    if marker.contains(&identity) {
        log::trace!("'{}' already seen, skipping", identity);
        return Ok(());
    }
    marker.mark_processing(identity.clone());
    log::trace!("walking '{}'", identity);

    strategy.on_before_walk(package)?;

    if !strategy.ignore_dependencies() {
        for dependency in package.dependencies_for(platform) {
            match strategy.resolve_dependency(dependency)? {
                Some(resolved) => {
                    strategy.on_after_resolve(package, dependency, &resolved)?;
                    walk(strategy, marker, platform, &resolved)?;
                }
                None => strategy.on_dependency_resolve_error(dependency)?,
            }
        }
    }

    marker.mark_visited(identity);
    strategy.on_after_walk(package)
}
