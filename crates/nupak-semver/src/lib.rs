//! Semantic versioning library compatible with NuGet versioning
//!
//! This crate provides version parsing, comparison and version-spec (interval)
//! matching compatible with the NuGet packaging ecosystem: up to four numeric
//! components, pre-release tags that sort before the stable version, and the
//! bracket interval notation (`1.0`, `[1.0]`, `[1.0, 2.0)`, `(, 1.0]`).

mod version;
mod version_spec;

pub use version::{SemanticVersion, VersionError};
pub use version_spec::{SafeBound, VersionSpec};
