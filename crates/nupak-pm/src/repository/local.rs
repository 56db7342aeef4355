use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::{PlanningError, Result};
use crate::package::{PackageIdentity, PackageMetadata};

use super::{MutableRepository, Repository};

const INDEX_FILE: &str = "packages.json";
const DELETEME_SUFFIX: &str = ".deleteme";

/// The on-disk pool of installed package content: one `{id}.{version}`
/// directory per package plus a `packages.json` index of their metadata.
///
/// A directory that cannot be deleted (a locked file, typically) is marked
/// with a `.deleteme` file instead of failing the operation; marked
/// directories are swept on the next pool load.
pub struct LocalRepository {
    root: PathBuf,
    packages: RwLock<Vec<Arc<PackageMetadata>>>,
}

impl LocalRepository {
    /// Open (or create) the pool at `root`, loading the index and sweeping
    /// directories left behind by deferred removals.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let repository = Self {
            packages: RwLock::new(load_index(&root)?),
            root,
        };
        repository.run_deferred_cleanup();
        Ok(repository)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory holding a package's content: `{root}/{id}.{version}`.
    pub fn package_directory(&self, identity: &PackageIdentity) -> PathBuf {
        self.root.join(identity.directory_name())
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn save_index(&self, packages: &[Arc<PackageMetadata>]) -> Result<()> {
        let records: Vec<&PackageMetadata> = packages.iter().map(Arc::as_ref).collect();
        let mut content = serde_json::to_string_pretty(&records)?;
        content.push('\n');
        fs::write(self.index_path(), content)?;
        Ok(())
    }

    /// Remove directories marked for deferred deletion, and their markers.
    pub fn run_deferred_cleanup(&self) {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(directory) = name.strip_suffix(DELETEME_SUFFIX) else {
                continue;
            };
            let target = self.root.join(directory);
            if target.is_dir() {
                if let Err(error) = fs::remove_dir_all(&target) {
                    log::warn!("deferred removal of '{}' failed again: {}", directory, error);
                    continue;
                }
                log::debug!("removed deferred package directory '{}'", directory);
            }
            let _ = fs::remove_file(entry.path());
        }
    }
}

impl Repository for LocalRepository {
    fn source(&self) -> String {
        self.root.display().to_string()
    }

    fn get_packages(&self) -> Vec<Arc<PackageMetadata>> {
        self.packages.read().unwrap().clone()
    }
}

impl MutableRepository for LocalRepository {
    fn add_package(&self, package: Arc<PackageMetadata>) -> Result<()> {
        let identity = package.identity();
        fs::create_dir_all(self.package_directory(&identity))?;

        let mut packages = self.packages.write().unwrap();
        if packages.iter().any(|existing| existing.identity() == identity) {
            log::debug!("'{}' is already in the pool", identity);
            return Ok(());
        }
        packages.push(package);
        self.save_index(&packages)?;
        log::debug!("added '{}' to the pool", identity);
        Ok(())
    }

    fn remove_package(&self, identity: &PackageIdentity) -> Result<()> {
        {
            let mut packages = self.packages.write().unwrap();
            packages.retain(|existing| existing.identity() != *identity);
            self.save_index(&packages)?;
        }

        let directory = self.package_directory(identity);
        if directory.exists() {
            if let Err(error) = fs::remove_dir_all(&directory) {
                // A locked file is not fatal; mark the directory and sweep
                // it on the next pool load.
                log::warn!(
                    "could not delete '{}', scheduling deferred removal: {}",
                    identity,
                    error
                );
                let marker = self
                    .root
                    .join(format!("{}{}", identity.directory_name(), DELETEME_SUFFIX));
                fs::write(marker, b"")?;
            }
        }
        log::debug!("removed '{}' from the pool", identity);
        Ok(())
    }
}

fn load_index(root: &Path) -> Result<Vec<Arc<PackageMetadata>>> {
    let path = root.join(INDEX_FILE);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(&path)?;
    // A corrupt index is an error; treating it as empty would silently
    // desynchronize projects from the content on disk.
    let records: Vec<PackageMetadata> =
        serde_json::from_str(&content).map_err(|source| PlanningError::StoreParse {
            path: path.display().to_string(),
            source,
        })?;
    Ok(records.into_iter().map(Arc::new).collect())
}
