use nupak_semver::{SemanticVersion, VersionSpec};
use serde::{Deserialize, Serialize};

use super::dependency::{DependencySet, PackageDependency};
use super::identity::PackageIdentity;
use super::platform::{best_platform_match, get_compatible_items, TargetPlatform};

/// A file the package carries, with the platform it targets when the path
/// is platform-specific (`lib/net45/...`). File bytes live outside the
/// planning engine; only paths are tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageFile {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_platform: Option<TargetPlatform>,
}

impl PackageFile {
    pub fn new(path: impl Into<String>, target_platform: Option<TargetPlatform>) -> Self {
        Self {
            path: path.into(),
            target_platform,
        }
    }
}

/// Everything the planner knows about one package version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    id: String,
    version: SemanticVersion,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    dependency_sets: Vec<DependencySet>,
    /// Locale tag (`fr-FR`) on satellite packages.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    min_client_version: Option<SemanticVersion>,
    #[serde(default = "default_listed")]
    listed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    files: Vec<PackageFile>,
}

fn default_listed() -> bool {
    true
}

impl PackageMetadata {
    pub fn new(id: impl Into<String>, version: SemanticVersion) -> Self {
        Self {
            id: id.into(),
            version,
            dependency_sets: Vec::new(),
            language: None,
            min_client_version: None,
            listed: true,
            files: Vec::new(),
        }
    }

    /// Add a dependency to the platform-agnostic dependency set.
    pub fn with_dependency(mut self, id: &str, spec: Option<VersionSpec>) -> Self {
        let set = match self
            .dependency_sets
            .iter_mut()
            .find(|set| set.target_platform().is_none())
        {
            Some(set) => set,
            None => {
                self.dependency_sets.push(DependencySet::new(None));
                self.dependency_sets.last_mut().unwrap()
            }
        };
        set.add(PackageDependency::new(id, spec));
        self
    }

    pub fn with_dependency_set(mut self, set: DependencySet) -> Self {
        self.dependency_sets.push(set);
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    pub fn with_min_client_version(mut self, version: SemanticVersion) -> Self {
        self.min_client_version = Some(version);
        self
    }

    pub fn with_listed(mut self, listed: bool) -> Self {
        self.listed = listed;
        self
    }

    pub fn with_file(mut self, path: &str, target_platform: Option<TargetPlatform>) -> Self {
        self.files.push(PackageFile::new(path, target_platform));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> &SemanticVersion {
        &self.version
    }

    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity::new(self.id.clone(), self.version.clone())
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn min_client_version(&self) -> Option<&SemanticVersion> {
        self.min_client_version.as_ref()
    }

    pub fn is_listed(&self) -> bool {
        self.listed
    }

    pub fn is_release_version(&self) -> bool {
        !self.version.is_prerelease()
    }

    pub fn files(&self) -> &[PackageFile] {
        &self.files
    }

    /// True when the package carries lib/content/build files that need
    /// project-level installation. Packages without project content are
    /// tracked once per solution.
    pub fn has_project_content(&self) -> bool {
        self.files.iter().any(|file| {
            let path = file.path.as_str();
            path.starts_with("lib/") || path.starts_with("content/") || path.starts_with("build/")
        })
    }

    pub fn dependency_sets(&self) -> &[DependencySet] {
        &self.dependency_sets
    }

    /// The dependencies that apply to a project on `platform`: the most
    /// specific compatible platform set, falling back to the agnostic set.
    /// Without a project platform the agnostic set wins; if there is none,
    /// every declared dependency applies (first declaration per id).
    pub fn dependencies_for(&self, platform: Option<&TargetPlatform>) -> Vec<&PackageDependency> {
        if let Some(index) = best_platform_match(
            platform,
            self.dependency_sets.iter().map(|set| set.target_platform()),
        ) {
            return self.dependency_sets[index].dependencies().collect();
        }

        if let Some(set) = self
            .dependency_sets
            .iter()
            .find(|set| set.target_platform().is_none())
        {
            return set.dependencies().collect();
        }

        if platform.is_none() {
            let mut seen = std::collections::HashSet::new();
            return self
                .dependency_sets
                .iter()
                .flat_map(|set| set.dependencies())
                .filter(|dep| seen.insert(dep.id.to_ascii_lowercase()))
                .collect();
        }

        Vec::new()
    }

    pub fn find_dependency(
        &self,
        id: &str,
        platform: Option<&TargetPlatform>,
    ) -> Option<&PackageDependency> {
        self.dependencies_for(platform)
            .into_iter()
            .find(|dep| dep.id.eq_ignore_ascii_case(id))
    }

    /// A satellite package carries only localized resources: its id is the
    /// core package's id suffixed with its language tag, and it depends on
    /// the core package at the exact same version.
    pub fn is_satellite(&self) -> bool {
        self.satellite_core_id().is_some()
    }

    /// The core package id this satellite localizes, when this is one.
    pub fn satellite_core_id(&self) -> Option<&str> {
        let language = self.language.as_deref()?;
        let suffix_len = language.len() + 1;
        if self.id.len() <= suffix_len {
            return None;
        }
        let (core, suffix) = self.id.split_at(self.id.len() - suffix_len);
        if suffix[1..].eq_ignore_ascii_case(language) && suffix.starts_with('.') {
            Some(core)
        } else {
            None
        }
    }

    /// True when `other` is an installed satellite of this package.
    pub fn is_satellite_of(&self, core_id: &str) -> bool {
        self.satellite_core_id()
            .is_some_and(|id| id.eq_ignore_ascii_case(core_id))
    }

    /// The files a project on `platform` receives from this package.
    pub fn compatible_files(&self, platform: Option<&TargetPlatform>) -> Vec<&PackageFile> {
        get_compatible_items(platform, &self.files, |file| file.target_platform.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemanticVersion {
        s.parse().unwrap()
    }

    fn spec(s: &str) -> VersionSpec {
        s.parse().unwrap()
    }

    fn tp(s: &str) -> TargetPlatform {
        TargetPlatform::parse(s).unwrap()
    }

    #[test]
    fn test_release_version() {
        assert!(PackageMetadata::new("A", v("1.0")).is_release_version());
        assert!(!PackageMetadata::new("A", v("1.0-beta")).is_release_version());
    }

    #[test]
    fn test_has_project_content() {
        let tools_only = PackageMetadata::new("A", v("1.0")).with_file("tools/init.ps1", None);
        assert!(!tools_only.has_project_content());

        let lib = PackageMetadata::new("A", v("1.0")).with_file("lib/A.dll", None);
        assert!(lib.has_project_content());
    }

    #[test]
    fn test_dependencies_for_picks_best_platform_set() {
        let mut net40 = DependencySet::new(Some(tp("net40")));
        net40.add(PackageDependency::any("ForNet40"));
        let mut agnostic = DependencySet::new(None);
        agnostic.add(PackageDependency::any("ForAll"));

        let package = PackageMetadata::new("A", v("1.0"))
            .with_dependency_set(agnostic)
            .with_dependency_set(net40);

        let for_net45: Vec<&str> = package
            .dependencies_for(Some(&tp("net45")))
            .iter()
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(for_net45, vec!["ForNet40"]);

        let for_net20: Vec<&str> = package
            .dependencies_for(Some(&tp("net20")))
            .iter()
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(for_net20, vec!["ForAll"]);

        let for_unknown: Vec<&str> = package
            .dependencies_for(None)
            .iter()
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(for_unknown, vec!["ForAll"]);
    }

    #[test]
    fn test_satellite_detection() {
        let satellite = PackageMetadata::new("Localized.fr-FR", v("1.0"))
            .with_language("fr-FR")
            .with_dependency("Localized", Some(spec("[1.0]")));
        assert!(satellite.is_satellite());
        assert_eq!(satellite.satellite_core_id(), Some("Localized"));
        assert!(satellite.is_satellite_of("localized"));

        let core = PackageMetadata::new("Localized", v("1.0"));
        assert!(!core.is_satellite());

        // Language alone is not enough; the id must carry the suffix.
        let mismatched = PackageMetadata::new("Other", v("1.0")).with_language("fr-FR");
        assert!(!mismatched.is_satellite());
    }

    #[test]
    fn test_compatible_files_by_platform() {
        let package = PackageMetadata::new("A", v("1.0"))
            .with_file("lib/net40/A.dll", Some(tp("net40")))
            .with_file("lib/net45/A.dll", Some(tp("net45")))
            .with_file("content/readme.txt", None);

        let files: Vec<&str> = package
            .compatible_files(Some(&tp("net45")))
            .iter()
            .map(|file| file.path.as_str())
            .collect();
        assert_eq!(files, vec!["lib/net45/A.dll"]);
    }

    #[test]
    fn test_serde_round_trip() {
        let package = PackageMetadata::new("A", v("1.2.3"))
            .with_dependency("B", Some(spec("[1.0, 2.0)")))
            .with_language("fr-FR")
            .with_min_client_version(v("2.5"))
            .with_listed(false)
            .with_file("lib/net45/A.dll", Some(tp("net45")));

        let json = serde_json::to_string_pretty(&package).unwrap();
        let back: PackageMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, package);
    }
}
