use std::collections::HashSet;
use std::sync::Arc;

use crate::package::{PackageIdentity, PackageMetadata, TargetPlatform};
use crate::repository::Repository;

/// Answers "who depends on this package?" over an installed set. Built from
/// a snapshot of the repository so repeated queries during planning see a
/// consistent view.
pub struct DependentsWalker {
    packages: Vec<Arc<PackageMetadata>>,
    platform: Option<TargetPlatform>,
}

impl DependentsWalker {
    pub fn new(repository: &dyn Repository, platform: Option<TargetPlatform>) -> Self {
        Self {
            packages: repository.get_packages(),
            platform,
        }
    }

    /// Installed packages declaring a direct dependency on `id`.
    pub fn direct_dependents(&self, id: &str) -> Vec<Arc<PackageMetadata>> {
        self.packages
            .iter()
            .filter(|package| !package.id().eq_ignore_ascii_case(id))
            .filter(|package| {
                package
                    .dependencies_for(self.platform.as_ref())
                    .iter()
                    .any(|dependency| dependency.id.eq_ignore_ascii_case(id))
            })
            .cloned()
            .collect()
    }

    /// All packages that depend on `id` directly or through other installed
    /// packages, unique by identity.
    pub fn dependents(&self, id: &str) -> Vec<Arc<PackageMetadata>> {
        let mut seen: HashSet<PackageIdentity> = HashSet::new();
        let mut result = Vec::new();
        let mut queue: Vec<String> = vec![id.to_string()];

        while let Some(current) = queue.pop() {
            for dependent in self.direct_dependents(&current) {
                if seen.insert(dependent.identity()) {
                    queue.push(dependent.id().to_string());
                    result.push(dependent);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;

    fn repo(edges: &[(&str, &[&str])]) -> MemoryRepository {
        let repository = MemoryRepository::new("test");
        for (id, deps) in edges {
            let mut package = PackageMetadata::new(*id, "1.0".parse().unwrap());
            for dep in *deps {
                package = package.with_dependency(dep, None);
            }
            repository.add(Arc::new(package));
        }
        repository
    }

    #[test]
    fn test_direct_dependents() {
        let repository = repo(&[("A", &[]), ("B", &["A"]), ("C", &["A"]), ("D", &["B"])]);
        let walker = DependentsWalker::new(&repository, None);

        let mut ids: Vec<String> = walker
            .direct_dependents("a")
            .iter()
            .map(|p| p.id().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["B", "C"]);
    }

    #[test]
    fn test_transitive_dependents_are_unique() {
        // D depends on both B and C, which both depend on A.
        let repository = repo(&[("A", &[]), ("B", &["A"]), ("C", &["A"]), ("D", &["B", "C"])]);
        let walker = DependentsWalker::new(&repository, None);

        let dependents = walker.dependents("A");
        assert_eq!(dependents.len(), 3);
    }

    #[test]
    fn test_no_dependents() {
        let repository = repo(&[("A", &[]), ("B", &[])]);
        let walker = DependentsWalker::new(&repository, None);
        assert!(walker.dependents("A").is_empty());
    }
}
