//! Package model: identity, target platforms, dependency declarations and
//! package metadata.

mod dependency;
mod identity;
mod metadata;
mod platform;

pub use dependency::{DependencySet, PackageDependency};
pub use identity::PackageIdentity;
pub use metadata::{PackageFile, PackageMetadata};
pub use platform::{best_platform_match, get_compatible_items, TargetPlatform};
