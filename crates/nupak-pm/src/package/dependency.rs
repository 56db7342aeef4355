use std::fmt;

use indexmap::IndexMap;
use nupak_semver::VersionSpec;
use serde::{Deserialize, Serialize};

use super::platform::TargetPlatform;

/// A declared dependency on another package.
///
/// A missing version spec means any version satisfies it; resolution then
/// prefers the dependency package's lowest available version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageDependency {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub version_spec: Option<VersionSpec>,
}

impl PackageDependency {
    pub fn new(id: impl Into<String>, version_spec: Option<VersionSpec>) -> Self {
        Self {
            id: id.into(),
            version_spec,
        }
    }

    /// Dependency on any version of `id`.
    pub fn any(id: impl Into<String>) -> Self {
        Self::new(id, None)
    }

    pub fn satisfied_by(&self, version: &nupak_semver::SemanticVersion) -> bool {
        match &self.version_spec {
            Some(spec) => spec.satisfies(version),
            None => true,
        }
    }
}

impl fmt::Display for PackageDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version_spec {
            Some(spec) => {
                let pretty = spec.pretty_print();
                if pretty.is_empty() {
                    write!(f, "{}", self.id)
                } else {
                    write!(f, "{} {}", self.id, pretty)
                }
            }
            None => write!(f, "{}", self.id),
        }
    }
}

/// The dependencies a package declares for one target platform. A set with
/// no platform applies everywhere. Dependencies are unique by id,
/// insertion-ordered; re-adding an id replaces the earlier declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySet {
    target_platform: Option<TargetPlatform>,
    dependencies: IndexMap<String, PackageDependency>,
}

impl DependencySet {
    pub fn new(target_platform: Option<TargetPlatform>) -> Self {
        Self {
            target_platform,
            dependencies: IndexMap::new(),
        }
    }

    pub fn target_platform(&self) -> Option<&TargetPlatform> {
        self.target_platform.as_ref()
    }

    pub fn add(&mut self, dependency: PackageDependency) {
        self.dependencies
            .insert(dependency.id.to_ascii_lowercase(), dependency);
    }

    pub fn get(&self, id: &str) -> Option<&PackageDependency> {
        self.dependencies.get(&id.to_ascii_lowercase())
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &PackageDependency> {
        self.dependencies.values()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

impl Serialize for DependencySet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("DependencySet", 2)?;
        state.serialize_field("targetPlatform", &self.target_platform)?;
        let dependencies: Vec<&PackageDependency> = self.dependencies.values().collect();
        state.serialize_field("dependencies", &dependencies)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for DependencySet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Raw {
            #[serde(default)]
            target_platform: Option<TargetPlatform>,
            #[serde(default)]
            dependencies: Vec<PackageDependency>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let mut set = DependencySet::new(raw.target_platform);
        for dependency in raw.dependencies {
            set.add(dependency);
        }
        Ok(set)
    }
}
