use std::fmt;
use std::hash::{Hash, Hasher};

use nupak_semver::SemanticVersion;
use serde::{Deserialize, Serialize};

/// A package id paired with an exact version.
///
/// Equality compares the id case-insensitively and the version exactly, so
/// `castle.core 1.0` and `Castle.Core 1.0.0.0` are the same identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageIdentity {
    id: String,
    version: SemanticVersion,
}

impl PackageIdentity {
    pub fn new(id: impl Into<String>, version: SemanticVersion) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &SemanticVersion {
        &self.version
    }

    /// True when `other` names the same package id, any version.
    pub fn same_id(&self, other_id: &str) -> bool {
        self.id.eq_ignore_ascii_case(other_id)
    }

    /// The pool directory name for this identity: `{id}.{version}`.
    pub fn directory_name(&self) -> String {
        format!("{}.{}", self.id, self.version)
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

impl PartialEq for PackageIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id.eq_ignore_ascii_case(&other.id) && self.version == other.version
    }
}

impl Eq for PackageIdentity {}

impl Hash for PackageIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.id.bytes() {
            byte.to_ascii_lowercase().hash(state);
        }
        self.version.hash(state);
    }
}
