//! Client-side package management: dependency resolution, operation
//! planning and installation bookkeeping over a shared package pool.
//!
//! Planning is split from execution. Resolvers walk dependency graphs and
//! produce [`PackageOperation`] lists; managers apply those lists to
//! projects and the pool, rolling back on partial failure.

pub mod constraints;
pub mod error;
pub mod event;
pub mod manager;
pub mod operation;
pub mod package;
pub mod project;
pub mod repository;
pub mod resolver;
pub mod walker;

pub use constraints::{ConstraintProvider, NullConstraintProvider, SafeUpdateConstraintProvider};
pub use error::{PlanningError, Result};
pub use event::{EventDispatcher, PackageEventKind, PackageEventListener, PackageOperationEvent};
pub use manager::{ActionState, ProjectManager, ProjectScope, SolutionPackageManager};
pub use operation::{reduce, PackageAction, PackageOperation};
pub use package::{
    DependencySet, PackageDependency, PackageFile, PackageIdentity, PackageMetadata,
    TargetPlatform,
};
pub use project::{FileSystemProject, ProjectSystem};
pub use repository::{
    AggregateRepository, DependencyVersion, FallbackRepository, LocalRepository,
    MemoryRepository, MutableRepository, PackageReferenceFile, ProjectReferenceRepository,
    Repository, SharedPackageRepository,
};
pub use resolver::{
    plan_reinstall, plan_update, resolve_update_target, InstallWalker, ReinstallPlan,
    UninstallWalker, UpdateOptions,
};
pub use walker::{walk, DependentsWalker, PackageMarker, VisitState, WalkerStrategy};

pub use nupak_semver::{SafeBound, SemanticVersion, VersionError, VersionSpec};

use lazy_static::lazy_static;

/// The client version packages gate on via `minClientVersion`.
pub const CLIENT_VERSION: &str = "3.1.0";

lazy_static! {
    static ref PARSED_CLIENT_VERSION: SemanticVersion = SemanticVersion::parse(CLIENT_VERSION)
        .unwrap_or_else(|_| SemanticVersion::new(0, 0, 0, 0));
}

pub(crate) fn client_version() -> SemanticVersion {
    PARSED_CLIENT_VERSION.clone()
}
