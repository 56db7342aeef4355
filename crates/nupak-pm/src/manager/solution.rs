//! Solution-scope orchestration: one shared pool, one remote feed, many
//! projects.

use std::sync::{Arc, RwLock};

use nupak_semver::SemanticVersion;

use crate::error::{PlanningError, Result};
use crate::manager::{collapse_satellite_files, expand_satellite_files, ProjectManager};
use crate::operation::{PackageAction, PackageOperation};
use crate::package::{PackageIdentity, PackageMetadata};
use crate::project::ProjectSystem;
use crate::repository::{
    FallbackRepository, MutableRepository, Repository, SharedPackageRepository,
};
use crate::resolver::UpdateOptions;

/// Which projects an action applies to.
#[derive(Debug, Clone, Default)]
pub enum ProjectScope {
    #[default]
    All,
    Projects(Vec<String>),
}

pub struct SolutionPackageManager {
    shared: Arc<SharedPackageRepository>,
    /// Pool-first view used both for lookups and project planning, so
    /// packages already expanded in the pool are not re-fetched.
    source: Arc<dyn Repository>,
    projects: RwLock<Vec<Arc<ProjectManager>>>,
}

impl SolutionPackageManager {
    pub fn new(remote: Arc<dyn Repository>, shared: Arc<SharedPackageRepository>) -> Self {
        let pool: Arc<dyn Repository> = shared.clone();
        let source: Arc<dyn Repository> = Arc::new(FallbackRepository::new(pool, remote));
        Self {
            shared,
            source,
            projects: RwLock::new(Vec::new()),
        }
    }

    pub fn shared(&self) -> &Arc<SharedPackageRepository> {
        &self.shared
    }

    pub fn add_project(&self, project: Arc<dyn ProjectSystem>) -> Result<Arc<ProjectManager>> {
        let manager = Arc::new(ProjectManager::new(
            self.shared.clone(),
            self.source.clone(),
            project,
        )?);
        self.projects.write().unwrap().push(manager.clone());
        Ok(manager)
    }

    pub fn project(&self, name: &str) -> Option<Arc<ProjectManager>> {
        self.projects
            .read()
            .unwrap()
            .iter()
            .find(|manager| manager.project_name() == name)
            .cloned()
    }

    fn scoped_projects(&self, scope: &ProjectScope) -> Vec<Arc<ProjectManager>> {
        let projects = self.projects.read().unwrap();
        match scope {
            ProjectScope::All => projects.clone(),
            ProjectScope::Projects(names) => projects
                .iter()
                .filter(|manager| names.iter().any(|name| *name == manager.project_name()))
                .cloned()
                .collect(),
        }
    }

    fn find_target(
        &self,
        id: &str,
        version: Option<&SemanticVersion>,
        allow_prerelease: bool,
    ) -> Result<Arc<PackageMetadata>> {
        let found = match version {
            Some(_) => self.source.find_package(id, version),
            // Without a version, find_package prefers releases; opting
            // into pre-releases means the highest version outright.
            None if allow_prerelease => self
                .source
                .find_packages_by_id(id)
                .into_iter()
                .max_by(|a, b| a.version().cmp(b.version())),
            None => self.source.find_package(id, None),
        };
        found.ok_or_else(|| match version {
                Some(version) => PlanningError::VersionNotFound {
                    id: id.to_string(),
                    version: version.to_string(),
                },
                None => PlanningError::PackageNotFound { id: id.to_string() },
            })
    }

    /// Install `id` into the scoped projects, or record it at solution
    /// level when it carries no project content. Across multiple projects
    /// failures are isolated; the action only fails outright when every
    /// project fails.
    pub fn install_package(
        &self,
        id: &str,
        version: Option<&SemanticVersion>,
        scope: &ProjectScope,
        ignore_dependencies: bool,
        allow_prerelease: bool,
    ) -> Result<()> {
        let target = self.find_target(id, version, allow_prerelease)?;

        if !target.has_project_content() {
            log::info!("'{}' has no project content, installing at solution level", id);
            self.shared.add_package(target.clone())?;
            expand_satellite_files(&self.shared, &target)?;
            return self.shared.add_package_reference_entry(&target, None);
        }

        let executed = self.for_each_project(&self.scoped_projects(scope), |manager| {
            manager.add_package_reference(&target, ignore_dependencies, allow_prerelease)
        })?;
        self.purge_unreferenced(&executed);
        Ok(())
    }

    /// Remove `id` from the scoped projects (or from the solution level).
    /// Without an explicit version, referencing two different versions
    /// across projects is ambiguous.
    pub fn uninstall_package(
        &self,
        id: &str,
        version: Option<&SemanticVersion>,
        scope: &ProjectScope,
        force: bool,
        remove_dependencies: bool,
    ) -> Result<()> {
        // Solution-level packages are tracked in the pool root manifest.
        if let Some(package) = self.shared.find_package(id, version) {
            if self
                .shared
                .is_solution_referenced(package.id(), package.version())
            {
                self.shared
                    .remove_package_reference_entry(&package.identity())?;
                self.purge_unreferenced(&[PackageOperation::uninstall(package)]);
                return Ok(());
            }
        }

        let projects = self.scoped_projects(scope);
        let referencing: Vec<&Arc<ProjectManager>> = projects
            .iter()
            .filter(|manager| manager.references().referenced_version(id).is_some())
            .collect();
        if referencing.is_empty() {
            return Err(PlanningError::PackageNotFound { id: id.to_string() });
        }

        if version.is_none() {
            let mut versions: Vec<SemanticVersion> = referencing
                .iter()
                .filter_map(|manager| manager.references().referenced_version(id))
                .collect();
            versions.sort();
            versions.dedup();
            if versions.len() > 1 {
                return Err(PlanningError::AmbiguousMatch { id: id.to_string() });
            }
        }

        let targeted: Vec<Arc<ProjectManager>> = referencing
            .into_iter()
            .filter(|manager| {
                version.is_none()
                    || manager.references().referenced_version(id).as_ref() == version
            })
            .cloned()
            .collect();
        let executed = self.for_each_project(&targeted, |manager| {
            manager.remove_package_reference(id, force, remove_dependencies)
        })?;
        self.purge_unreferenced(&executed);
        Ok(())
    }

    pub fn update_package(
        &self,
        id: &str,
        scope: &ProjectScope,
        options: &UpdateOptions,
    ) -> Result<()> {
        let projects: Vec<Arc<ProjectManager>> = self
            .scoped_projects(scope)
            .into_iter()
            .filter(|manager| manager.references().referenced_version(id).is_some())
            .collect();
        if projects.is_empty() {
            return Err(PlanningError::PackageNotFound { id: id.to_string() });
        }

        let executed = self.for_each_project(&projects, |manager| {
            manager.update_package_reference(id, options)
        })?;
        self.purge_unreferenced(&executed);
        Ok(())
    }

    /// Update every referenced package in the scoped projects. Packages
    /// already at (or beyond) their best candidate are skipped quietly;
    /// other failures are logged and do not stop the sweep.
    pub fn update_all_packages(&self, scope: &ProjectScope, options: &UpdateOptions) -> Result<()> {
        let mut executed = Vec::new();
        for manager in self.scoped_projects(scope) {
            let ids: Vec<String> = manager
                .references()
                .get_packages()
                .iter()
                .filter(|package| !package.is_satellite())
                .map(|package| package.id().to_string())
                .collect();
            for id in ids {
                match manager.update_package_reference(&id, options) {
                    Ok(operations) => executed.extend(operations),
                    Err(PlanningError::VersionDowngrade { id }) => {
                        log::info!("Already referencing a newer version of '{}'.", id);
                    }
                    Err(error) => log::warn!(
                        "could not update '{}' in '{}': {}",
                        id,
                        manager.project_name(),
                        error
                    ),
                }
            }
        }
        self.purge_unreferenced(&executed);
        Ok(())
    }

    /// Remove and re-add `id` (or, with `None`, everything) project by
    /// project, in registration order. Like the other batch actions, a
    /// failing project is logged and the sweep carries on; only a full
    /// wipe becomes an error.
    pub fn reinstall_packages(
        &self,
        id: Option<&str>,
        scope: &ProjectScope,
        remove_dependencies: bool,
    ) -> Result<()> {
        let executed = self.for_each_project(&self.scoped_projects(scope), |manager| {
            let ids: Vec<String> = match id {
                Some(id) => manager
                    .references()
                    .referenced_version(id)
                    .map(|_| vec![id.to_string()])
                    .unwrap_or_default(),
                None => manager
                    .references()
                    .get_packages()
                    .iter()
                    .map(|package| package.id().to_string())
                    .collect(),
            };
            let mut operations = Vec::new();
            for id in ids {
                operations.extend(manager.reinstall_package_reference(&id, remove_dependencies)?);
            }
            Ok(operations)
        })?;
        self.purge_unreferenced(&executed);
        Ok(())
    }

    /// Run `action` against each project. A single project propagates its
    /// error; across several, failures are collected and only a full wipe
    /// becomes an error.
    fn for_each_project<F>(
        &self,
        projects: &[Arc<ProjectManager>],
        mut action: F,
    ) -> Result<Vec<PackageOperation>>
    where
        F: FnMut(&ProjectManager) -> Result<Vec<PackageOperation>>,
    {
        if projects.len() == 1 {
            return action(&projects[0]);
        }

        let mut executed = Vec::new();
        let mut failures: Vec<(String, String)> = Vec::new();
        for manager in projects {
            match action(manager) {
                Ok(operations) => executed.extend(operations),
                Err(error) => {
                    log::warn!("'{}': {}", manager.project_name(), error);
                    failures.push((manager.project_name(), error.to_string()));
                }
            }
        }
        if !projects.is_empty() && failures.len() == projects.len() {
            return Err(PlanningError::Batch { failures });
        }
        Ok(executed)
    }

    /// Drop pool entries the executed removals left without any project or
    /// solution reference. Still-referenced versions stay expanded.
    fn purge_unreferenced(&self, executed: &[PackageOperation]) {
        let mut purged: Vec<PackageIdentity> = Vec::new();
        for operation in executed {
            if operation.action != PackageAction::Uninstall {
                continue;
            }
            let identity = operation.identity();
            if purged.contains(&identity) {
                continue;
            }
            let still_needed = self
                .shared
                .is_referenced(identity.id(), identity.version())
                || self
                    .shared
                    .is_solution_referenced(identity.id(), identity.version());
            if still_needed {
                log::debug!("keeping '{}' in the pool, still referenced", identity);
                continue;
            }
            collapse_satellite_files(&self.shared, &operation.package);
            if let Err(error) = self.shared.remove_package(&identity) {
                log::warn!("could not purge '{}' from the pool: {}", identity, error);
            }
            purged.push(identity);
        }
    }
}
