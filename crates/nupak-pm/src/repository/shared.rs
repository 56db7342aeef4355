use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use nupak_semver::SemanticVersion;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::package::{PackageIdentity, PackageMetadata, TargetPlatform};

use super::references::{PackageReferenceFile, ReferenceEntry};
use super::{LocalRepository, MutableRepository, Repository};

const STORE_FILE: &str = "repositories.json";
const SOLUTION_REFERENCES_FILE: &str = "packages.config.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct RepositoryStore {
    repositories: Vec<String>,
}

/// The solution-scoped package repository: the on-disk pool plus the
/// bookkeeping that makes reference counting work across projects.
///
/// `repositories.json` beside the pool lists every registered per-project
/// reference manifest; a package is referenced while at least one of those
/// manifests declares it. Solution-level packages (no project content) are
/// tracked in the pool's own reference manifest instead.
pub struct SharedPackageRepository {
    pool: LocalRepository,
    // Guards the load-merge-save cycle of the store file.
    store_lock: Mutex<()>,
    solution_references: Mutex<PackageReferenceFile>,
}

impl SharedPackageRepository {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let pool = LocalRepository::open(root)?;
        let solution_references =
            PackageReferenceFile::load(pool.root().join(SOLUTION_REFERENCES_FILE))?;
        Ok(Self {
            pool,
            store_lock: Mutex::new(()),
            solution_references: Mutex::new(solution_references),
        })
    }

    pub fn pool(&self) -> &LocalRepository {
        &self.pool
    }

    pub fn package_directory(&self, identity: &PackageIdentity) -> PathBuf {
        self.pool.package_directory(identity)
    }

    fn store_path(&self) -> PathBuf {
        self.pool.root().join(STORE_FILE)
    }

    // Missing or corrupt store files count as empty; the store is rebuilt
    // in full on the next write.
    fn load_store(&self) -> BTreeSet<String> {
        let path = self.store_path();
        if !path.exists() {
            return BTreeSet::new();
        }
        match fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                serde_json::from_str::<RepositoryStore>(&content).map_err(|e| e.to_string())
            }) {
            Ok(store) => store.repositories.into_iter().collect(),
            Err(error) => {
                log::warn!("treating unreadable store '{}' as empty: {}", path.display(), error);
                BTreeSet::new()
            }
        }
    }

    fn save_store(&self, paths: &BTreeSet<String>) -> Result<()> {
        let store = RepositoryStore {
            repositories: paths.iter().cloned().collect(),
        };
        let mut content = serde_json::to_string_pretty(&store)?;
        content.push('\n');
        fs::write(self.store_path(), content)?;
        Ok(())
    }

    /// Record a per-project reference manifest so its entries count toward
    /// `is_referenced`. Registering the same path twice is a no-op.
    pub fn register_repository(&self, reference_file: &Path) -> Result<()> {
        let _guard = self.store_lock.lock().unwrap();
        let mut paths = self.load_store();
        if paths.insert(reference_file.display().to_string()) {
            self.save_store(&paths)?;
            log::debug!("registered reference manifest '{}'", reference_file.display());
        }
        Ok(())
    }

    pub fn unregister_repository(&self, reference_file: &Path) -> Result<()> {
        let _guard = self.store_lock.lock().unwrap();
        let mut paths = self.load_store();
        if paths.remove(&reference_file.display().to_string()) {
            self.save_store(&paths)?;
            log::debug!(
                "unregistered reference manifest '{}'",
                reference_file.display()
            );
        }
        Ok(())
    }

    pub fn registered_repositories(&self) -> Vec<PathBuf> {
        let _guard = self.store_lock.lock().unwrap();
        self.load_store().into_iter().map(PathBuf::from).collect()
    }

    /// True while at least one registered project manifest declares
    /// `(id, version)`.
    pub fn is_referenced(&self, id: &str, version: &SemanticVersion) -> bool {
        self.registered_repositories().into_iter().any(|path| {
            PackageReferenceFile::load_tolerant(path).entry_exists(id, version)
        })
    }

    /// Record a solution-level package (one without project content) in
    /// the pool's own reference manifest.
    pub fn add_package_reference_entry(
        &self,
        package: &PackageMetadata,
        target_platform: Option<TargetPlatform>,
    ) -> Result<()> {
        self.solution_references.lock().unwrap().add_entry(ReferenceEntry {
            id: package.id().to_string(),
            version: package.version().clone(),
            target_platform,
            allowed_versions: None,
        })
    }

    pub fn remove_package_reference_entry(&self, identity: &PackageIdentity) -> Result<()> {
        self.solution_references
            .lock()
            .unwrap()
            .delete_entry(identity.id(), identity.version())
    }

    pub fn is_solution_referenced(&self, id: &str, version: &SemanticVersion) -> bool {
        self.solution_references
            .lock()
            .unwrap()
            .entry_exists(id, version)
    }
}

impl Repository for SharedPackageRepository {
    fn source(&self) -> String {
        self.pool.source()
    }

    fn get_packages(&self) -> Vec<Arc<PackageMetadata>> {
        self.pool.get_packages()
    }
}

impl MutableRepository for SharedPackageRepository {
    fn add_package(&self, package: Arc<PackageMetadata>) -> Result<()> {
        self.pool.add_package(package)
    }

    fn remove_package(&self, identity: &PackageIdentity) -> Result<()> {
        self.pool.remove_package(identity)
    }
}
