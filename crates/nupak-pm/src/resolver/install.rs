//! Install planning: resolves a target package plus its dependency closure
//! into an ordered operation list.

use std::collections::HashSet;
use std::sync::Arc;

use nupak_semver::SemanticVersion;

use crate::constraints::ConstraintProvider;
use crate::error::{PlanningError, Result};
use crate::operation::{PackageAction, PackageOperation};
use crate::package::{PackageDependency, PackageIdentity, PackageMetadata, TargetPlatform};
use crate::repository::{DependencyVersion, Repository};
use crate::walker::{walk, DependentsWalker, PackageMarker, WalkerStrategy};

/// Plans installs against `local` (what the target already has) resolving
/// candidates from `source`. Dependencies already satisfied locally are
/// reused; otherwise the lowest satisfying version is pulled from the
/// source, uninstalling a superseded local version when the range forces an
/// upgrade.
pub struct InstallWalker {
    local: Arc<dyn Repository>,
    source: Arc<dyn Repository>,
    constraints: Arc<dyn ConstraintProvider>,
    target_platform: Option<TargetPlatform>,
    allow_prerelease: bool,
    ignore_dependencies: bool,
    dependency_version: DependencyVersion,
    client_version: SemanticVersion,
    marker: PackageMarker,
    cascaded: HashSet<String>,
    operations: Vec<PackageOperation>,
}

impl InstallWalker {
    pub fn new(
        local: Arc<dyn Repository>,
        source: Arc<dyn Repository>,
        constraints: Arc<dyn ConstraintProvider>,
        target_platform: Option<TargetPlatform>,
    ) -> Self {
        Self {
            local,
            source,
            constraints,
            target_platform,
            allow_prerelease: false,
            ignore_dependencies: false,
            dependency_version: DependencyVersion::Lowest,
            client_version: crate::client_version(),
            marker: PackageMarker::new(),
            cascaded: HashSet::new(),
            operations: Vec::new(),
        }
    }

    pub fn allow_prerelease(mut self, allow: bool) -> Self {
        self.allow_prerelease = allow;
        self
    }

    pub fn skip_dependencies(mut self, skip: bool) -> Self {
        self.ignore_dependencies = skip;
        self
    }

    pub fn dependency_version(mut self, policy: DependencyVersion) -> Self {
        self.dependency_version = policy;
        self
    }

    /// Plan the operations needed to bring `target` (and its closure) into
    /// the local set. May be called for several targets; the shared visited
    /// marker keeps a package from being planned twice.
    pub fn resolve_operations(&mut self, target: &Arc<PackageMetadata>) -> Result<()> {
        if !self.cascaded.insert(target.id().to_ascii_lowercase()) {
            return Ok(());
        }

        // Installing a different version of an already referenced package
        // is an in-place upgrade: the old version leaves first.
        if let Some(installed) = self.installed_version(target.id()) {
            if installed.version() != target.version() {
                self.check_conflicts(&installed, target)?;
                self.schedule_uninstall(installed);
            }
        }

        let platform = self.target_platform.clone();
        let mut marker = std::mem::take(&mut self.marker);
        let walked = walk(self, &mut marker, platform.as_ref(), target);
        self.marker = marker;
        walked?;

        self.cascade_satellites(target)
    }

    pub fn into_operations(self) -> Vec<PackageOperation> {
        self.operations
    }

    fn installed_version(&self, id: &str) -> Option<Arc<PackageMetadata>> {
        self.local
            .find_packages_by_id(id)
            .into_iter()
            .max_by(|a, b| a.version().cmp(b.version()))
    }

    fn scheduled(&self, identity: &PackageIdentity, action: PackageAction) -> bool {
        self.operations
            .iter()
            .any(|op| op.action == action && op.identity() == *identity)
    }

    fn schedule_uninstall(&mut self, package: Arc<PackageMetadata>) {
        let identity = package.identity();
        if !self.scheduled(&identity, PackageAction::Uninstall) {
            log::debug!("scheduling removal of superseded '{}'", identity);
            self.operations.push(PackageOperation::uninstall(package));
        }
    }

    /// Replacing `installed` with `candidate` must not break any other
    /// local package that depends on it, unless that dependent is itself
    /// scheduled for removal.
    fn check_conflicts(
        &self,
        installed: &Arc<PackageMetadata>,
        candidate: &Arc<PackageMetadata>,
    ) -> Result<()> {
        let dependents = DependentsWalker::new(self.local.as_ref(), self.target_platform.clone())
            .direct_dependents(installed.id());
        for dependent in dependents {
            if self.scheduled(&dependent.identity(), PackageAction::Uninstall) {
                continue;
            }
            let broken = dependent
                .find_dependency(installed.id(), self.target_platform.as_ref())
                .is_some_and(|dependency| !dependency.satisfied_by(candidate.version()));
            if broken {
                return Err(PlanningError::Conflict {
                    id: installed.id().to_string(),
                    dependent: dependent.identity().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Apply the project pin on top of the declared range.
    fn effective_dependency(
        &self,
        dependency: &PackageDependency,
    ) -> (PackageDependency, Option<String>) {
        match self.constraints.constraint(&dependency.id) {
            Some(pin) => {
                let spec = match &dependency.version_spec {
                    Some(declared) => declared.intersect(&pin),
                    None => pin.clone(),
                };
                (
                    PackageDependency::new(dependency.id.clone(), Some(spec)),
                    Some(pin.pretty_print()),
                )
            }
            None => (dependency.clone(), None),
        }
    }

    fn ensure_client_version(&self, package: &Arc<PackageMetadata>) -> Result<()> {
        if let Some(required) = package.min_client_version() {
            if *required > self.client_version {
                return Err(PlanningError::MinClientVersion {
                    package: package.id().to_string(),
                    required: required.to_string(),
                    current: self.client_version.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Keep satellites version-locked to their core: planning a satellite
    /// also plans its core at the same version, and planning a core pulls
    /// every locally installed satellite along to the new version (skipped
    /// with a warning when the source has no matching satellite build).
    fn cascade_satellites(&mut self, target: &Arc<PackageMetadata>) -> Result<()> {
        if let Some(core_id) = target.satellite_core_id() {
            let core = self
                .source
                .find_package(core_id, Some(target.version()))
                .ok_or_else(|| PlanningError::DependencyResolution {
                    dependency: PackageDependency::new(
                        core_id,
                        Some(nupak_semver::VersionSpec::exact(target.version().clone())),
                    )
                    .to_string(),
                })?;
            return self.resolve_operations(&core);
        }

        let satellites: Vec<Arc<PackageMetadata>> = self
            .local
            .get_packages()
            .into_iter()
            .filter(|package| package.is_satellite_of(target.id()))
            .filter(|package| package.version() != target.version())
            .collect();
        for satellite in satellites {
            match self
                .source
                .find_package(satellite.id(), Some(target.version()))
            {
                Some(replacement) => {
                    self.schedule_uninstall(satellite);
                    self.resolve_operations(&replacement)?;
                }
                None => log::warn!(
                    "no '{}' build for version {}, leaving '{}' behind",
                    satellite.id(),
                    target.version(),
                    satellite.identity()
                ),
            }
        }
        Ok(())
    }
}

impl WalkerStrategy for InstallWalker {
    fn resolve_dependency(
        &mut self,
        dependency: &PackageDependency,
    ) -> Result<Option<Arc<PackageMetadata>>> {
        let (effective, pin) = self.effective_dependency(dependency);

        // A locally installed version satisfying the effective range wins
        // outright, unless it is already scheduled for removal.
        let satisfied_locally = self
            .local
            .find_packages_by_id(&dependency.id)
            .into_iter()
            .filter(|package| effective.satisfied_by(package.version()))
            .filter(|package| !self.scheduled(&package.identity(), PackageAction::Uninstall))
            .max_by(|a, b| a.version().cmp(b.version()));
        if let Some(installed) = satisfied_locally {
            return Ok(Some(installed));
        }

        let candidate = self.source.resolve_dependency(
            &effective,
            self.allow_prerelease,
            true,
            self.dependency_version,
        );
        let Some(candidate) = candidate else {
            // Distinguish "nothing satisfies the declaration" from "the
            // project pin ruled every candidate out".
            if let Some(constraint) = pin {
                let unpinned = self.source.resolve_dependency(
                    dependency,
                    self.allow_prerelease,
                    true,
                    self.dependency_version,
                );
                if unpinned.is_some() {
                    return Err(PlanningError::ConstraintViolation {
                        dependency: dependency.to_string(),
                        id: dependency.id.clone(),
                        constraint,
                        manifest: self.constraints.source(),
                    });
                }
            }
            return Ok(None);
        };

        // The range forces a version the local set does not have; an
        // installed sibling version has to make way, provided no other
        // dependent breaks.
        if let Some(installed) = self.installed_version(&dependency.id) {
            self.check_conflicts(&installed, &candidate)?;
            self.schedule_uninstall(installed);
        }

        Ok(Some(candidate))
    }

    fn on_before_walk(&mut self, package: &Arc<PackageMetadata>) -> Result<()> {
        self.ensure_client_version(package)
    }

    fn on_after_walk(&mut self, package: &Arc<PackageMetadata>) -> Result<()> {
        if self.local.exists(package.id(), Some(package.version())) {
            log::debug!("'{}' already installed, skipping", package.identity());
            return Ok(());
        }
        let operation = PackageOperation::install(package.clone());
        if !self.scheduled(&operation.identity(), PackageAction::Install) {
            self.operations.push(operation);
        }
        Ok(())
    }

    fn ignore_dependencies(&self) -> bool {
        self.ignore_dependencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::NullConstraintProvider;
    use crate::operation::reduce;
    use crate::repository::MemoryRepository;
    use nupak_semver::VersionSpec;

    fn pkg(id: &str, version: &str) -> Arc<PackageMetadata> {
        Arc::new(PackageMetadata::new(id, version.parse().unwrap()))
    }

    fn pkg_dep(id: &str, version: &str, dep: &str, range: Option<&str>) -> Arc<PackageMetadata> {
        Arc::new(
            PackageMetadata::new(id, version.parse().unwrap())
                .with_dependency(dep, range.map(|r| VersionSpec::parse(r).unwrap())),
        )
    }

    fn repo(packages: Vec<Arc<PackageMetadata>>) -> Arc<MemoryRepository> {
        let repository = MemoryRepository::new("test");
        for package in packages {
            repository.add(package);
        }
        Arc::new(repository)
    }

    fn plan(
        local: Arc<MemoryRepository>,
        source: Arc<MemoryRepository>,
        target: &Arc<PackageMetadata>,
    ) -> Result<Vec<PackageOperation>> {
        let mut walker = InstallWalker::new(local, source, Arc::new(NullConstraintProvider), None);
        walker.resolve_operations(target)?;
        Ok(reduce(walker.into_operations()))
    }

    fn describe(operations: &[PackageOperation]) -> Vec<String> {
        operations.iter().map(|op| op.to_string()).collect()
    }

    #[test]
    fn test_dependencies_install_before_dependent() {
        let a = pkg("A", "1.0");
        let b = pkg_dep("B", "1.0", "A", Some("1.0"));
        let source = repo(vec![a, b.clone()]);

        let operations = plan(repo(vec![]), source, &b).unwrap();
        assert_eq!(describe(&operations), vec!["install A 1.0", "install B 1.0"]);
    }

    #[test]
    fn test_lowest_satisfying_version_is_chosen() {
        let b = pkg_dep("B", "1.0", "A", Some("1.0"));
        let source = repo(vec![pkg("A", "1.0"), pkg("A", "1.5"), pkg("A", "2.0"), b.clone()]);

        let operations = plan(repo(vec![]), source, &b).unwrap();
        assert_eq!(describe(&operations), vec!["install A 1.0", "install B 1.0"]);
    }

    #[test]
    fn test_installed_dependency_is_reused() {
        let b = pkg_dep("B", "1.0", "A", Some("1.0"));
        let local = repo(vec![pkg("A", "1.2")]);
        let source = repo(vec![pkg("A", "1.0"), b.clone()]);

        let operations = plan(local, source, &b).unwrap();
        assert_eq!(describe(&operations), vec!["install B 1.0"]);
    }

    #[test]
    fn test_range_forces_upgrade_of_installed_dependency() {
        // B 2.0 needs A >= 2.0 but A 1.0 is installed.
        let b = pkg_dep("B", "2.0", "A", Some("2.0"));
        let local = repo(vec![pkg("A", "1.0"), pkg_dep("B", "1.0", "A", Some("1.0"))]);
        let source = repo(vec![pkg("A", "2.0"), b.clone()]);

        let operations = plan(local, source, &b).unwrap();
        assert_eq!(
            describe(&operations),
            vec![
                "uninstall B 1.0",
                "uninstall A 1.0",
                "install A 2.0",
                "install B 2.0"
            ]
        );
    }

    #[test]
    fn test_upgrade_conflicting_with_other_dependent_fails() {
        // C pins A to < 2.0 and stays installed, so B 2.0 cannot come in.
        let b = pkg_dep("B", "2.0", "A", Some("2.0"));
        let local = repo(vec![
            pkg("A", "1.0"),
            pkg_dep("B", "1.0", "A", Some("1.0")),
            pkg_dep("C", "1.0", "A", Some("[1.0,2.0)")),
        ]);
        let source = repo(vec![pkg("A", "2.0"), b.clone()]);

        let error = plan(local, source, &b).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Unable to find a version of 'A' that is compatible with 'C 1.0'."
        );
    }

    #[test]
    fn test_unresolvable_dependency_fails() {
        let b = pkg_dep("B", "1.0", "A", Some("3.0"));
        let source = repo(vec![pkg("A", "1.0"), b.clone()]);

        let error = plan(repo(vec![]), source, &b).unwrap_err();
        assert_eq!(error.to_string(), "Unable to resolve dependency 'A (>= 3.0)'.");
    }

    #[test]
    fn test_constraint_violation_names_pin() {
        struct Pin;
        impl ConstraintProvider for Pin {
            fn constraint(&self, id: &str) -> Option<VersionSpec> {
                (id == "A").then(|| VersionSpec::parse("[1.0,2.0)").unwrap())
            }
            fn source(&self) -> String {
                "packages.config".to_string()
            }
        }

        let b = pkg_dep("B", "1.0", "A", Some("2.0"));
        let source = repo(vec![pkg("A", "2.0"), b.clone()]);

        let mut walker = InstallWalker::new(repo(vec![]), source, Arc::new(Pin), None);
        let error = walker.resolve_operations(&b).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Unable to resolve dependency 'A (>= 2.0)'.'A' has an additional constraint ((>= 1.0 && < 2.0)) defined in packages.config."
        );
    }

    #[test]
    fn test_min_client_version_gate() {
        let target = Arc::new(
            PackageMetadata::new("A", "1.0".parse().unwrap())
                .with_min_client_version("99.0".parse().unwrap()),
        );
        let source = repo(vec![target.clone()]);

        let error = plan(repo(vec![]), source, &target).unwrap_err();
        assert!(matches!(error, PlanningError::MinClientVersion { .. }));
    }

    #[test]
    fn test_prerelease_excluded_by_default() {
        let b = pkg_dep("B", "1.0", "A", None);
        let source = repo(vec![pkg("A", "1.0-beta"), b.clone()]);

        let error = plan(repo(vec![]), source, &b).unwrap_err();
        assert!(matches!(error, PlanningError::DependencyResolution { .. }));

        let source = repo(vec![pkg("A", "1.0-beta"), b.clone()]);
        let mut walker = InstallWalker::new(
            repo(vec![]),
            source,
            Arc::new(NullConstraintProvider),
            None,
        )
        .allow_prerelease(true);
        walker.resolve_operations(&b).unwrap();
        let operations = reduce(walker.into_operations());
        assert_eq!(
            describe(&operations),
            vec!["install A 1.0-beta", "install B 1.0"]
        );
    }

    #[test]
    fn test_skip_dependencies() {
        let b = pkg_dep("B", "1.0", "A", Some("1.0"));
        let source = repo(vec![b.clone()]);

        let mut walker = InstallWalker::new(
            repo(vec![]),
            source,
            Arc::new(NullConstraintProvider),
            None,
        )
        .skip_dependencies(true);
        walker.resolve_operations(&b).unwrap();
        assert_eq!(describe(&walker.into_operations()), vec!["install B 1.0"]);
    }

    #[test]
    fn test_installing_core_upgrade_carries_satellite() {
        let satellite_old = Arc::new(
            PackageMetadata::new("A.fr-FR", "1.0".parse().unwrap())
                .with_language("fr-FR")
                .with_dependency("A", None),
        );
        let satellite_new = Arc::new(
            PackageMetadata::new("A.fr-FR", "2.0".parse().unwrap())
                .with_language("fr-FR")
                .with_dependency("A", None),
        );
        let core_new = pkg("A", "2.0");

        let local = repo(vec![pkg("A", "1.0"), satellite_old]);
        let source = repo(vec![core_new.clone(), satellite_new]);

        let operations = plan(local, source, &core_new).unwrap();
        assert_eq!(
            describe(&operations),
            vec![
                "uninstall A.fr-FR 1.0",
                "uninstall A 1.0",
                "install A 2.0",
                "install A.fr-FR 2.0"
            ]
        );
    }

    #[test]
    fn test_installing_satellite_pulls_core() {
        let satellite = Arc::new(
            PackageMetadata::new("A.fr-FR", "1.0".parse().unwrap())
                .with_language("fr-FR")
                .with_dependency("A", None),
        );
        let source = repo(vec![pkg("A", "1.0"), satellite.clone()]);

        let operations = plan(repo(vec![]), source, &satellite).unwrap();
        assert_eq!(
            describe(&operations),
            vec!["install A 1.0", "install A.fr-FR 1.0"]
        );
    }
}
