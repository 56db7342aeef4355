//! Applies operation plans to one project: manifest entries, content
//! files, references and imports, with rollback on partial failure.

use std::sync::Arc;

use crate::constraints::ConstraintProvider;
use crate::error::{PlanningError, Result};
use crate::event::{EventDispatcher, PackageEventKind, PackageEventListener, PackageOperationEvent};
use crate::manager::{expand_satellite_files, install_directory, ActionState};
use crate::operation::{reduce, PackageAction, PackageOperation};
use crate::package::PackageMetadata;
use crate::project::ProjectSystem;
use crate::repository::{
    MutableRepository, ProjectReferenceRepository, Repository, SharedPackageRepository,
};
use crate::resolver::{
    plan_reinstall, plan_update, InstallWalker, UninstallWalker, UpdateOptions,
};

pub struct ProjectManager {
    shared: Arc<SharedPackageRepository>,
    /// Candidate source for planning, normally the pool fronting the
    /// remote feed.
    source: Arc<dyn Repository>,
    project: Arc<dyn ProjectSystem>,
    references: Arc<ProjectReferenceRepository>,
    events: EventDispatcher,
}

impl ProjectManager {
    pub fn new(
        shared: Arc<SharedPackageRepository>,
        source: Arc<dyn Repository>,
        project: Arc<dyn ProjectSystem>,
    ) -> Result<Self> {
        let pool: Arc<dyn Repository> = shared.clone();
        let references = Arc::new(ProjectReferenceRepository::open(pool, &project.root())?);
        Ok(Self {
            shared,
            source,
            project,
            references,
            events: EventDispatcher::new(),
        })
    }

    pub fn project(&self) -> &Arc<dyn ProjectSystem> {
        &self.project
    }

    pub fn project_name(&self) -> String {
        self.project.project_name()
    }

    pub fn references(&self) -> &Arc<ProjectReferenceRepository> {
        &self.references
    }

    pub fn add_listener(&mut self, listener: Arc<dyn PackageEventListener>) {
        self.events.register(listener);
    }

    /// Add `package` (and whatever its closure needs) to this project.
    /// Referencing an already referenced version is a logged no-op.
    pub fn add_package_reference(
        &self,
        package: &Arc<PackageMetadata>,
        ignore_dependencies: bool,
        allow_prerelease: bool,
    ) -> Result<Vec<PackageOperation>> {
        if self
            .references
            .reference_exists(package.id(), package.version())
        {
            log::info!(
                "'{}' already references '{}'",
                self.project_name(),
                package.identity()
            );
            return Ok(Vec::new());
        }

        let constraints: Arc<dyn ConstraintProvider> = self.references.clone();
        let local: Arc<dyn Repository> = self.references.clone();
        let mut walker =
            InstallWalker::new(local, self.source.clone(), constraints, self.project.target_platform())
                .allow_prerelease(allow_prerelease)
                .skip_dependencies(ignore_dependencies);
        walker.resolve_operations(package)?;
        let operations = reduce(walker.into_operations());
        self.execute(&operations)?;
        Ok(operations)
    }

    pub fn remove_package_reference(
        &self,
        id: &str,
        force: bool,
        remove_dependencies: bool,
    ) -> Result<Vec<PackageOperation>> {
        let installed = self
            .references
            .find_package(id, None)
            .ok_or_else(|| PlanningError::PackageNotFound { id: id.to_string() })?;

        let constraints: Arc<dyn ConstraintProvider> = self.references.clone();
        let local: Arc<dyn Repository> = self.references.clone();
        let mut walker =
            UninstallWalker::new(local, constraints, self.project.target_platform())
                .force(force)
                .remove_dependencies(remove_dependencies);
        walker.resolve_operations(&installed)?;
        let operations = reduce(walker.into_operations());
        self.execute(&operations)?;
        Ok(operations)
    }

    pub fn update_package_reference(
        &self,
        id: &str,
        options: &UpdateOptions,
    ) -> Result<Vec<PackageOperation>> {
        let installed = self
            .references
            .find_package(id, None)
            .ok_or_else(|| PlanningError::PackageNotFound { id: id.to_string() })?;

        let constraints: Arc<dyn ConstraintProvider> = self.references.clone();
        let local: Arc<dyn Repository> = self.references.clone();
        let operations = plan_update(
            local,
            self.source.clone(),
            constraints,
            self.project.target_platform(),
            &installed,
            options,
        )?;
        if operations.is_empty() {
            log::info!(
                "'{}' in '{}' is already up to date",
                id,
                self.project_name()
            );
            return Ok(Vec::new());
        }
        self.execute(&operations)?;
        Ok(operations)
    }

    /// Remove and re-add the referenced version of `id`, repointing files
    /// and references. Returns the executed operations; empty when the
    /// source no longer carries the version.
    pub fn reinstall_package_reference(
        &self,
        id: &str,
        remove_dependencies: bool,
    ) -> Result<Vec<PackageOperation>> {
        let installed = self
            .references
            .find_package(id, None)
            .ok_or_else(|| PlanningError::PackageNotFound { id: id.to_string() })?;

        let constraints: Arc<dyn ConstraintProvider> = self.references.clone();
        let local: Arc<dyn Repository> = self.references.clone();
        let Some(plan) = plan_reinstall(
            local,
            self.source.clone(),
            constraints,
            self.project.target_platform(),
            &installed,
            remove_dependencies,
        )?
        else {
            return Ok(Vec::new());
        };

        // The removal commits before any install starts.
        self.execute(&plan.uninstall)?;
        self.execute(&plan.install)?;
        let mut executed = plan.uninstall;
        executed.extend(plan.install);
        Ok(executed)
    }

    /// Run the operations in order. A failure rolls back everything
    /// already applied (inverse operations, best effort, quietly) before
    /// the error surfaces.
    pub fn execute(&self, operations: &[PackageOperation]) -> Result<()> {
        if operations.is_empty() {
            return Ok(());
        }
        log::debug!(
            "'{}': {:?} {} operation(s)",
            self.project_name(),
            ActionState::Executing,
            operations.len()
        );

        let mut completed: Vec<&PackageOperation> = Vec::new();
        for operation in operations {
            if let Err(error) = self.apply(operation, false) {
                self.rollback(&completed);
                return Err(error);
            }
            completed.push(operation);
        }
        log::debug!("'{}': {:?}", self.project_name(), ActionState::Committed);
        Ok(())
    }

    fn rollback(&self, completed: &[&PackageOperation]) {
        for operation in completed.iter().rev() {
            let inverse = match operation.action {
                PackageAction::Install => PackageOperation::uninstall(operation.package.clone()),
                PackageAction::Uninstall => PackageOperation::install(operation.package.clone()),
            };
            if let Err(error) = self.apply(&inverse, true) {
                log::debug!("rollback of '{}' failed: {}", inverse, error);
            }
        }
        log::debug!("'{}': {:?}", self.project_name(), ActionState::RolledBack);
    }

    fn apply(&self, operation: &PackageOperation, quiet: bool) -> Result<()> {
        let package = &operation.package;
        let platform = self.project.target_platform();
        let install_path = install_directory(&self.shared, package);
        let event = PackageOperationEvent::new(
            package.clone(),
            install_path.clone(),
            Some(self.project_name()),
        );

        match operation.action {
            PackageAction::Install => {
                if !quiet {
                    self.events.dispatch(PackageEventKind::ReferenceAdding, &event)?;
                }
                // The pool holds the package before any project points
                // into it.
                self.shared.add_package(package.clone())?;
                expand_satellite_files(&self.shared, package)?;

                for file in package.compatible_files(platform.as_ref()) {
                    let source = install_path.join(&file.path);
                    if let Some(relative) = file.path.strip_prefix("content/") {
                        self.project.add_file(relative, &source)?;
                    } else if file.path.starts_with("lib/") {
                        self.project.add_reference(&source)?;
                    } else if file.path.starts_with("build/") {
                        self.project.add_import(&source)?;
                    }
                }

                self.references.add_reference(package, platform)?;
                self.shared
                    .register_repository(&self.references.reference_file_path())?;

                if !quiet {
                    self.events.dispatch(PackageEventKind::ReferenceAdded, &event)?;
                    log::info!(
                        "Added '{}' to '{}'.",
                        package.identity(),
                        self.project_name()
                    );
                }
            }
            PackageAction::Uninstall => {
                if !quiet {
                    self.events
                        .dispatch(PackageEventKind::ReferenceRemoving, &event)?;
                }

                for file in package.compatible_files(platform.as_ref()) {
                    if let Some(relative) = file.path.strip_prefix("content/") {
                        self.project.delete_file(relative)?;
                    } else if file.path.starts_with("lib/") {
                        let name = file
                            .path
                            .rsplit('/')
                            .next()
                            .unwrap_or(file.path.as_str());
                        self.project.remove_reference(name)?;
                    } else if file.path.starts_with("build/") {
                        self.project.remove_import(&install_path.join(&file.path))?;
                    }
                }

                self.references.remove_package(&package.identity())?;

                if !quiet {
                    self.events
                        .dispatch(PackageEventKind::ReferenceRemoved, &event)?;
                    log::info!(
                        "Removed '{}' from '{}'.",
                        package.identity(),
                        self.project_name()
                    );
                }
            }
        }
        Ok(())
    }
}
