//! Update planning: pick the new version, then delegate to install
//! planning for the closure.

use std::sync::Arc;

use nupak_semver::{SafeBound, SemanticVersion, VersionSpec};

use crate::constraints::{ConstraintProvider, SafeUpdateConstraintProvider};
use crate::error::{PlanningError, Result};
use crate::operation::{reduce, PackageOperation};
use crate::package::{PackageDependency, PackageMetadata, TargetPlatform};
use crate::repository::{DependencyVersion, Repository};
use crate::resolver::InstallWalker;

#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Update to this exact version instead of the latest.
    pub version: Option<SemanticVersion>,
    /// Stay within the safe range above the installed version.
    pub safe: Option<SafeBound>,
    pub allow_prerelease: bool,
    /// Permit an explicit version below the installed one.
    pub allow_downgrade: bool,
}

/// Pick the version `installed` should move to, or `None` when it is
/// already where it should be. Pre-releases are considered when asked for
/// or when the installed version is itself a pre-release.
pub fn resolve_update_target(
    installed: &Arc<PackageMetadata>,
    source: &dyn Repository,
    options: &UpdateOptions,
) -> Result<Option<Arc<PackageMetadata>>> {
    let allow_prerelease = options.allow_prerelease || installed.version().is_prerelease();

    if let Some(version) = &options.version {
        let candidate = source.find_package(installed.id(), Some(version)).ok_or_else(|| {
            PlanningError::VersionNotFound {
                id: installed.id().to_string(),
                version: version.to_string(),
            }
        })?;
        if candidate.version() == installed.version() {
            return Ok(None);
        }
        if candidate.version() < installed.version() && !options.allow_downgrade {
            return Err(PlanningError::VersionDowngrade {
                id: installed.id().to_string(),
            });
        }
        return Ok(Some(candidate));
    }

    let range = options
        .safe
        .map(|bound| VersionSpec::safe_range(installed.version(), bound));
    let dependency = PackageDependency::new(installed.id(), range);
    let candidate = source.resolve_dependency(
        &dependency,
        allow_prerelease,
        true,
        DependencyVersion::Highest,
    );
    match candidate {
        None => {
            log::info!("no update available for '{}'", installed.id());
            Ok(None)
        }
        Some(candidate) if candidate.version() == installed.version() => Ok(None),
        Some(candidate) if candidate.version() < installed.version() => {
            Err(PlanningError::VersionDowngrade {
                id: installed.id().to_string(),
            })
        }
        Some(candidate) => Ok(Some(candidate)),
    }
}

/// Plan the full update of `installed`: resolve the target version, then
/// plan its install. With a safe bound, dependencies are additionally
/// pinned to their own safe ranges during the walk. An empty plan means
/// there was nothing to update.
pub fn plan_update(
    local: Arc<dyn Repository>,
    source: Arc<dyn Repository>,
    constraints: Arc<dyn ConstraintProvider>,
    target_platform: Option<TargetPlatform>,
    installed: &Arc<PackageMetadata>,
    options: &UpdateOptions,
) -> Result<Vec<PackageOperation>> {
    let Some(target) = resolve_update_target(installed, source.as_ref(), options)? else {
        return Ok(Vec::new());
    };
    log::info!("updating '{}' to {}", installed.id(), target.version());

    let constraints: Arc<dyn ConstraintProvider> = match options.safe {
        Some(bound) => Arc::new(SafeUpdateConstraintProvider::new(
            constraints,
            local.clone(),
            bound,
        )),
        None => constraints,
    };
    let allow_prerelease = options.allow_prerelease || installed.version().is_prerelease();

    let mut walker = InstallWalker::new(local, source, constraints, target_platform)
        .allow_prerelease(allow_prerelease);
    walker.resolve_operations(&target)?;
    Ok(reduce(walker.into_operations()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::NullConstraintProvider;
    use crate::repository::MemoryRepository;

    fn pkg(id: &str, version: &str) -> Arc<PackageMetadata> {
        Arc::new(PackageMetadata::new(id, version.parse().unwrap()))
    }

    fn repo(packages: &[Arc<PackageMetadata>]) -> Arc<MemoryRepository> {
        let repository = MemoryRepository::new("source");
        for package in packages {
            repository.add(package.clone());
        }
        Arc::new(repository)
    }

    #[test]
    fn test_latest_release_is_chosen() {
        let installed = pkg("A", "1.0");
        let source = repo(&[pkg("A", "1.0"), pkg("A", "1.5"), pkg("A", "2.0-beta")]);

        let target = resolve_update_target(&installed, source.as_ref(), &UpdateOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(target.version(), &"1.5".parse().unwrap());
    }

    #[test]
    fn test_installed_prerelease_considers_prereleases() {
        let installed = pkg("A", "2.0-alpha");
        let source = repo(&[pkg("A", "1.0"), pkg("A", "2.0-beta")]);

        let target = resolve_update_target(&installed, source.as_ref(), &UpdateOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(target.version(), &"2.0-beta".parse().unwrap());
    }

    #[test]
    fn test_already_latest_is_a_noop() {
        let installed = pkg("A", "2.0");
        let source = repo(&[pkg("A", "1.0"), pkg("A", "2.0")]);

        let target =
            resolve_update_target(&installed, source.as_ref(), &UpdateOptions::default()).unwrap();
        assert!(target.is_none());
    }

    #[test]
    fn test_newer_installed_than_source_is_a_downgrade() {
        let installed = pkg("A", "3.0");
        let source = repo(&[pkg("A", "2.0")]);

        let error = resolve_update_target(&installed, source.as_ref(), &UpdateOptions::default())
            .unwrap_err();
        assert_eq!(error.to_string(), "Already referencing a newer version of 'A'.");
    }

    #[test]
    fn test_explicit_version_must_exist() {
        let installed = pkg("A", "1.0");
        let source = repo(&[pkg("A", "1.0")]);

        let options = UpdateOptions {
            version: Some("9.9".parse().unwrap()),
            ..Default::default()
        };
        let error = resolve_update_target(&installed, source.as_ref(), &options).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Unable to find version '9.9' of package 'A'."
        );
    }

    #[test]
    fn test_explicit_downgrade_requires_flag() {
        let installed = pkg("A", "2.0");
        let source = repo(&[pkg("A", "1.0"), pkg("A", "2.0")]);

        let options = UpdateOptions {
            version: Some("1.0".parse().unwrap()),
            ..Default::default()
        };
        let error = resolve_update_target(&installed, source.as_ref(), &options).unwrap_err();
        assert!(matches!(error, PlanningError::VersionDowngrade { .. }));

        let options = UpdateOptions {
            version: Some("1.0".parse().unwrap()),
            allow_downgrade: true,
            ..Default::default()
        };
        let target = resolve_update_target(&installed, source.as_ref(), &options)
            .unwrap()
            .unwrap();
        assert_eq!(target.version(), &"1.0".parse().unwrap());
    }

    #[test]
    fn test_safe_update_stays_within_minor_line() {
        let installed = pkg("A", "1.2");
        let source = repo(&[pkg("A", "1.2.5"), pkg("A", "1.3"), pkg("A", "2.0")]);

        let options = UpdateOptions {
            safe: Some(SafeBound::NextMinor),
            ..Default::default()
        };
        let target = resolve_update_target(&installed, source.as_ref(), &options)
            .unwrap()
            .unwrap();
        assert_eq!(target.version(), &"1.2.5".parse().unwrap());
    }

    #[test]
    fn test_safe_update_next_major_stays_within_major_line() {
        let installed = pkg("A", "1.2");
        let source = repo(&[pkg("A", "1.9"), pkg("A", "2.0")]);

        let options = UpdateOptions {
            safe: Some(SafeBound::NextMajor),
            ..Default::default()
        };
        let target = resolve_update_target(&installed, source.as_ref(), &options)
            .unwrap()
            .unwrap();
        assert_eq!(target.version(), &"1.9".parse().unwrap());
    }

    #[test]
    fn test_plan_update_replaces_old_version() {
        let installed = pkg("A", "1.0");
        let local = repo(&[installed.clone()]);
        let source = repo(&[pkg("A", "1.0"), pkg("A", "2.0")]);

        let operations = plan_update(
            local,
            source,
            Arc::new(NullConstraintProvider),
            None,
            &installed,
            &UpdateOptions::default(),
        )
        .unwrap();

        let described: Vec<String> = operations.iter().map(|op| op.to_string()).collect();
        assert_eq!(described, vec!["uninstall A 1.0", "install A 2.0"]);
    }
}
