//! Package catalogs: the capability traits plus in-memory, aggregate,
//! pool-backed and per-project implementations.

mod aggregate;
mod local;
mod memory;
mod references;
mod shared;

pub use aggregate::{AggregateRepository, FallbackRepository};
pub use local::LocalRepository;
pub use memory::MemoryRepository;
pub use references::{PackageReferenceFile, ProjectReferenceRepository, ReferenceEntry};
pub use shared::SharedPackageRepository;

use std::sync::Arc;

use nupak_semver::SemanticVersion;

use crate::error::Result;
use crate::package::{PackageDependency, PackageIdentity, PackageMetadata};

/// Which candidate to pick among the versions satisfying a dependency
/// range. Install planning resolves `Lowest` so transitive dependencies are
/// not needlessly upgraded; update target resolution uses `Highest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyVersion {
    #[default]
    Lowest,
    HighestPatch,
    HighestMinor,
    Highest,
}

impl DependencyVersion {
    /// Pick the preferred version out of `candidates` per this policy.
    pub fn select(
        self,
        mut candidates: Vec<Arc<PackageMetadata>>,
    ) -> Option<Arc<PackageMetadata>> {
        if candidates.is_empty() {
            return None;
        }
        candidates.sort_by(|a, b| a.version().cmp(b.version()));

        match self {
            DependencyVersion::Lowest => candidates.into_iter().next(),
            DependencyVersion::Highest => candidates.into_iter().last(),
            DependencyVersion::HighestPatch => {
                let floor = candidates[0].version().clone();
                candidates
                    .into_iter()
                    .take_while(|p| {
                        p.version().major() == floor.major() && p.version().minor() == floor.minor()
                    })
                    .last()
            }
            DependencyVersion::HighestMinor => {
                let floor = candidates[0].version().clone();
                candidates
                    .into_iter()
                    .take_while(|p| p.version().major() == floor.major())
                    .last()
            }
        }
    }
}

/// A queryable catalog of package metadata. Implementations cover the
/// remote source feed, the solution pool and per-project reference sets.
pub trait Repository: Send + Sync {
    /// A human-readable name used in log output and error messages.
    fn source(&self) -> String;

    fn get_packages(&self) -> Vec<Arc<PackageMetadata>>;

    fn find_packages_by_id(&self, id: &str) -> Vec<Arc<PackageMetadata>> {
        self.get_packages()
            .into_iter()
            .filter(|package| package.id().eq_ignore_ascii_case(id))
            .collect()
    }

    /// An exact version when given, otherwise the highest release version
    /// (or the highest version outright when only pre-releases exist).
    fn find_package(
        &self,
        id: &str,
        version: Option<&SemanticVersion>,
    ) -> Option<Arc<PackageMetadata>> {
        let candidates = self.find_packages_by_id(id);
        match version {
            Some(version) => candidates
                .into_iter()
                .find(|package| package.version() == version),
            None => {
                let releases: Vec<Arc<PackageMetadata>> = candidates
                    .iter()
                    .filter(|package| package.is_release_version())
                    .cloned()
                    .collect();
                let pool = if releases.is_empty() {
                    candidates
                } else {
                    releases
                };
                pool.into_iter().max_by(|a, b| a.version().cmp(b.version()))
            }
        }
    }

    fn exists(&self, id: &str, version: Option<&SemanticVersion>) -> bool {
        self.find_package(id, version).is_some()
    }

    /// Resolve a dependency to a concrete package. Unlisted packages are
    /// skipped when `prefer_listed` and any listed candidate satisfies the
    /// range; pre-releases are only considered when `allow_prerelease`.
    fn resolve_dependency(
        &self,
        dependency: &PackageDependency,
        allow_prerelease: bool,
        prefer_listed: bool,
        policy: DependencyVersion,
    ) -> Option<Arc<PackageMetadata>> {
        let mut candidates: Vec<Arc<PackageMetadata>> = self
            .find_packages_by_id(&dependency.id)
            .into_iter()
            .filter(|package| dependency.satisfied_by(package.version()))
            .filter(|package| allow_prerelease || package.is_release_version())
            .collect();

        if prefer_listed && candidates.iter().any(|package| package.is_listed()) {
            candidates.retain(|package| package.is_listed());
        }

        policy.select(candidates)
    }
}

/// A catalog packages can be added to and removed from.
pub trait MutableRepository: Repository {
    fn add_package(&self, package: Arc<PackageMetadata>) -> Result<()>;

    fn remove_package(&self, identity: &PackageIdentity) -> Result<()>;
}
