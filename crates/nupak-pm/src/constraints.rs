//! Per-project allowed-version constraints consulted during planning.

use std::sync::Arc;

use nupak_semver::{SafeBound, VersionSpec};

use crate::repository::{ProjectReferenceRepository, Repository};

/// Supplies the allowed-versions pin for a package id, if the project has
/// one. Candidates falling outside the pin fail planning with a
/// constraint-violation error naming [`source`].
///
/// [`source`]: ConstraintProvider::source
pub trait ConstraintProvider: Send + Sync {
    fn constraint(&self, id: &str) -> Option<VersionSpec>;

    /// Where the constraint is defined, for error messages.
    fn source(&self) -> String;
}

/// No constraints. Solution-level planning and tests use this.
pub struct NullConstraintProvider;

impl ConstraintProvider for NullConstraintProvider {
    fn constraint(&self, _id: &str) -> Option<VersionSpec> {
        None
    }

    fn source(&self) -> String {
        String::new()
    }
}

impl ConstraintProvider for ProjectReferenceRepository {
    fn constraint(&self, id: &str) -> Option<VersionSpec> {
        self.get_allowed_versions(id)
    }

    fn source(&self) -> String {
        "packages.config".to_string()
    }
}

/// Wraps another provider for safe updates: every package the project
/// already has is additionally pinned to the safe range above its
/// installed version, so candidate resolution cannot cross the configured
/// boundary even when a newer version exists in the source.
pub struct SafeUpdateConstraintProvider {
    inner: Arc<dyn ConstraintProvider>,
    installed: Arc<dyn Repository>,
    bound: SafeBound,
}

impl SafeUpdateConstraintProvider {
    pub fn new(
        inner: Arc<dyn ConstraintProvider>,
        installed: Arc<dyn Repository>,
        bound: SafeBound,
    ) -> Self {
        Self {
            inner,
            installed,
            bound,
        }
    }
}

impl ConstraintProvider for SafeUpdateConstraintProvider {
    fn constraint(&self, id: &str) -> Option<VersionSpec> {
        let pinned = self.inner.constraint(id);
        let installed = self.installed.find_package(id, None);
        match (pinned, installed) {
            (Some(pin), Some(package)) => {
                Some(pin.intersect(&VersionSpec::safe_range(package.version(), self.bound)))
            }
            (Some(pin), None) => Some(pin),
            (None, Some(package)) => Some(VersionSpec::safe_range(package.version(), self.bound)),
            (None, None) => None,
        }
    }

    fn source(&self) -> String {
        let inner = self.inner.source();
        if inner.is_empty() {
            "the safe update range".to_string()
        } else {
            inner
        }
    }
}
