use std::sync::{Arc, RwLock};

use crate::error::Result;
use crate::package::{PackageIdentity, PackageMetadata};

use super::{MutableRepository, Repository};

/// An in-memory catalog. Stands in for the remote source feed in tests and
/// backs the installed-set views that other repositories compose.
pub struct MemoryRepository {
    name: String,
    packages: RwLock<Vec<Arc<PackageMetadata>>>,
}

impl MemoryRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packages: RwLock::new(Vec::new()),
        }
    }

    pub fn with_packages(name: impl Into<String>, packages: Vec<Arc<PackageMetadata>>) -> Self {
        Self {
            name: name.into(),
            packages: RwLock::new(packages),
        }
    }

    /// Add without the `MutableRepository` result plumbing; insertion into
    /// a memory catalog cannot fail.
    pub fn add(&self, package: Arc<PackageMetadata>) {
        let mut packages = self.packages.write().unwrap();
        let identity = package.identity();
        packages.retain(|existing| existing.identity() != identity);
        packages.push(package);
    }

    pub fn remove(&self, identity: &PackageIdentity) {
        self.packages
            .write()
            .unwrap()
            .retain(|existing| existing.identity() != *identity);
    }

    pub fn is_empty(&self) -> bool {
        self.packages.read().unwrap().is_empty()
    }
}

impl Repository for MemoryRepository {
    fn source(&self) -> String {
        self.name.clone()
    }

    fn get_packages(&self) -> Vec<Arc<PackageMetadata>> {
        self.packages.read().unwrap().clone()
    }
}

impl MutableRepository for MemoryRepository {
    fn add_package(&self, package: Arc<PackageMetadata>) -> Result<()> {
        self.add(package);
        Ok(())
    }

    fn remove_package(&self, identity: &PackageIdentity) -> Result<()> {
        self.remove(identity);
        Ok(())
    }
}
