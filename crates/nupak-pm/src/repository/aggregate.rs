use std::collections::HashSet;
use std::sync::Arc;

use nupak_semver::SemanticVersion;

use crate::package::{PackageDependency, PackageMetadata};

use super::{DependencyVersion, Repository};

/// Several catalogs behind one query surface. Lookups ask each catalog in
/// priority order and the first match wins; enumeration merges all catalogs,
/// first occurrence of an identity wins.
pub struct AggregateRepository {
    repositories: Vec<Arc<dyn Repository>>,
}

impl AggregateRepository {
    pub fn new(repositories: Vec<Arc<dyn Repository>>) -> Self {
        Self { repositories }
    }

    pub fn repositories(&self) -> &[Arc<dyn Repository>] {
        &self.repositories
    }
}

impl Repository for AggregateRepository {
    fn source(&self) -> String {
        let names: Vec<String> = self.repositories.iter().map(|r| r.source()).collect();
        names.join(", ")
    }

    fn get_packages(&self) -> Vec<Arc<PackageMetadata>> {
        let mut seen = HashSet::new();
        let mut packages = Vec::new();
        for repository in &self.repositories {
            for package in repository.get_packages() {
                if seen.insert(package.identity()) {
                    packages.push(package);
                }
            }
        }
        packages
    }

    fn find_packages_by_id(&self, id: &str) -> Vec<Arc<PackageMetadata>> {
        let mut seen = HashSet::new();
        let mut packages = Vec::new();
        for repository in &self.repositories {
            for package in repository.find_packages_by_id(id) {
                if seen.insert(package.identity()) {
                    packages.push(package);
                }
            }
        }
        packages
    }

    fn find_package(
        &self,
        id: &str,
        version: Option<&SemanticVersion>,
    ) -> Option<Arc<PackageMetadata>> {
        self.repositories
            .iter()
            .find_map(|repository| repository.find_package(id, version))
    }

    fn resolve_dependency(
        &self,
        dependency: &PackageDependency,
        allow_prerelease: bool,
        prefer_listed: bool,
        policy: DependencyVersion,
    ) -> Option<Arc<PackageMetadata>> {
        self.repositories.iter().find_map(|repository| {
            repository.resolve_dependency(dependency, allow_prerelease, prefer_listed, policy)
        })
    }
}

/// A primary catalog with a secondary consulted only on a miss. Used to
/// put the already-materialized pool in front of the remote source.
pub struct FallbackRepository {
    primary: Arc<dyn Repository>,
    secondary: Arc<dyn Repository>,
}

impl FallbackRepository {
    pub fn new(primary: Arc<dyn Repository>, secondary: Arc<dyn Repository>) -> Self {
        Self { primary, secondary }
    }
}

impl Repository for FallbackRepository {
    fn source(&self) -> String {
        self.primary.source()
    }

    fn get_packages(&self) -> Vec<Arc<PackageMetadata>> {
        self.primary.get_packages()
    }

    /// Candidate enumeration merges both catalogs so version selection
    /// (lowest for installs, highest for updates) sees everything the
    /// secondary offers beyond what is already materialized.
    fn find_packages_by_id(&self, id: &str) -> Vec<Arc<PackageMetadata>> {
        let mut seen = HashSet::new();
        let mut packages = Vec::new();
        for package in self
            .primary
            .find_packages_by_id(id)
            .into_iter()
            .chain(self.secondary.find_packages_by_id(id))
        {
            if seen.insert(package.identity()) {
                packages.push(package);
            }
        }
        packages
    }

    fn find_package(
        &self,
        id: &str,
        version: Option<&SemanticVersion>,
    ) -> Option<Arc<PackageMetadata>> {
        self.primary
            .find_package(id, version)
            .or_else(|| self.secondary.find_package(id, version))
    }
}

#[cfg(test)]
mod tests {
    use super::super::MemoryRepository;
    use super::*;

    fn pkg(id: &str, version: &str) -> Arc<PackageMetadata> {
        Arc::new(PackageMetadata::new(id, version.parse().unwrap()))
    }

    fn repo(name: &str, packages: &[(&str, &str)]) -> Arc<dyn Repository> {
        let repo = MemoryRepository::new(name);
        for (id, version) in packages {
            repo.add(pkg(id, version));
        }
        Arc::new(repo)
    }

    #[test]
    fn test_aggregate_first_match_wins() {
        let aggregate = AggregateRepository::new(vec![
            repo("one", &[("A", "1.0")]),
            repo("two", &[("A", "1.0"), ("B", "1.0")]),
        ]);

        assert_eq!(aggregate.get_packages().len(), 2);
        let found = aggregate
            .find_package("A", Some(&"1.0".parse().unwrap()))
            .unwrap();
        assert_eq!(found.id(), "A");
    }

    #[test]
    fn test_aggregate_merges_versions_across_catalogs() {
        let aggregate = AggregateRepository::new(vec![
            repo("one", &[("A", "1.0")]),
            repo("two", &[("A", "2.0")]),
        ]);
        assert_eq!(aggregate.find_packages_by_id("A").len(), 2);
    }

    #[test]
    fn test_fallback_consults_secondary_on_miss() {
        let fallback = FallbackRepository::new(
            repo("pool", &[("A", "1.0")]),
            repo("source", &[("B", "2.0")]),
        );

        assert!(fallback.exists("A", None));
        assert!(fallback.exists("B", Some(&"2.0".parse().unwrap())));
        // Enumeration stays scoped to the primary.
        assert_eq!(fallback.get_packages().len(), 1);
    }

    #[test]
    fn test_fallback_primary_shadows_secondary() {
        let fallback = FallbackRepository::new(
            repo("pool", &[("A", "1.0")]),
            repo("source", &[("A", "2.0")]),
        );
        let found = fallback.find_package("A", None).unwrap();
        assert_eq!(found.version(), &"1.0".parse().unwrap());
        // Enumeration still sees both versions.
        assert_eq!(fallback.find_packages_by_id("A").len(), 2);
    }
}
