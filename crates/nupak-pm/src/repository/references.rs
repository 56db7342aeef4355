use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use nupak_semver::{SemanticVersion, VersionSpec};
use serde::{Deserialize, Serialize};

use crate::error::{PlanningError, Result};
use crate::package::{PackageIdentity, PackageMetadata, TargetPlatform};

use super::{MutableRepository, Repository};

/// Default file name of the per-project reference manifest.
pub const REFERENCE_FILE_NAME: &str = "packages.config.json";

/// One package a project declares: the exact version it uses, the platform
/// it was installed against and an optional allowed-versions pin consulted
/// during update planning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceEntry {
    pub id: String,
    pub version: SemanticVersion,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub target_platform: Option<TargetPlatform>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub allowed_versions: Option<VersionSpec>,
}

/// A durable list of the packages one project references. Entries are
/// unique by id, insertion-ordered, rewritten in full on every mutation.
#[derive(Debug)]
pub struct PackageReferenceFile {
    path: PathBuf,
    entries: IndexMap<String, ReferenceEntry>,
}

impl PackageReferenceFile {
    /// Load the manifest at `path`; a missing file is an empty manifest.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let list: Vec<ReferenceEntry> =
                serde_json::from_str(&content).map_err(|source| PlanningError::StoreParse {
                    path: path.display().to_string(),
                    source,
                })?;
            list.into_iter()
                .map(|entry| (entry.id.to_ascii_lowercase(), entry))
                .collect()
        } else {
            IndexMap::new()
        };
        Ok(Self { path, entries })
    }

    /// Like [`load`] but a corrupt manifest counts as empty. Used when
    /// another project's manifest is consulted for reference counting,
    /// where failing the whole operation over someone else's file helps
    /// nobody.
    ///
    /// [`load`]: PackageReferenceFile::load
    pub fn load_tolerant(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(&path) {
            Ok(file) => file,
            Err(error) => {
                log::warn!(
                    "treating unreadable reference manifest '{}' as empty: {}",
                    path.display(),
                    error
                );
                Self {
                    path,
                    entries: IndexMap::new(),
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        let list: Vec<&ReferenceEntry> = self.entries.values().collect();
        let mut content = serde_json::to_string_pretty(&list)?;
        content.push('\n');
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, content)?;
        Ok(())
    }

    pub fn add_entry(&mut self, entry: ReferenceEntry) -> Result<()> {
        self.entries.insert(entry.id.to_ascii_lowercase(), entry);
        self.save()
    }

    pub fn delete_entry(&mut self, id: &str, version: &SemanticVersion) -> Result<()> {
        let key = id.to_ascii_lowercase();
        if self
            .entries
            .get(&key)
            .is_some_and(|entry| &entry.version == version)
        {
            self.entries.shift_remove(&key);
            self.save()?;
        }
        Ok(())
    }

    pub fn entry_exists(&self, id: &str, version: &SemanticVersion) -> bool {
        self.entries
            .get(&id.to_ascii_lowercase())
            .is_some_and(|entry| &entry.version == version)
    }

    pub fn get_entry(&self, id: &str) -> Option<&ReferenceEntry> {
        self.entries.get(&id.to_ascii_lowercase())
    }

    pub fn get_package_target_platform(&self, id: &str) -> Option<&TargetPlatform> {
        self.get_entry(id)?.target_platform.as_ref()
    }

    pub fn get_allowed_versions(&self, id: &str) -> Option<&VersionSpec> {
        self.get_entry(id)?.allowed_versions.as_ref()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ReferenceEntry> {
        self.entries.values()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The subset of the shared pool one project declares, viewed as a
/// repository. Metadata comes from the pool; the manifest only records
/// which identities the project uses.
pub struct ProjectReferenceRepository {
    pool: Arc<dyn Repository>,
    file: Mutex<PackageReferenceFile>,
}

impl ProjectReferenceRepository {
    pub fn new(pool: Arc<dyn Repository>, file: PackageReferenceFile) -> Self {
        Self {
            pool,
            file: Mutex::new(file),
        }
    }

    /// Open the manifest in `project_root`, creating an empty one lazily
    /// on first mutation.
    pub fn open(pool: Arc<dyn Repository>, project_root: &Path) -> Result<Self> {
        let file = PackageReferenceFile::load(project_root.join(REFERENCE_FILE_NAME))?;
        Ok(Self::new(pool, file))
    }

    pub fn reference_file_path(&self) -> PathBuf {
        self.file.lock().unwrap().path().to_path_buf()
    }

    pub fn add_reference(
        &self,
        package: &PackageMetadata,
        target_platform: Option<TargetPlatform>,
    ) -> Result<()> {
        self.file.lock().unwrap().add_entry(ReferenceEntry {
            id: package.id().to_string(),
            version: package.version().clone(),
            target_platform,
            allowed_versions: None,
        })
    }

    pub fn reference_exists(&self, id: &str, version: &SemanticVersion) -> bool {
        self.file.lock().unwrap().entry_exists(id, version)
    }

    pub fn referenced_version(&self, id: &str) -> Option<SemanticVersion> {
        self.file
            .lock()
            .unwrap()
            .get_entry(id)
            .map(|entry| entry.version.clone())
    }

    pub fn get_package_target_platform(&self, id: &str) -> Option<TargetPlatform> {
        self.file
            .lock()
            .unwrap()
            .get_package_target_platform(id)
            .cloned()
    }

    pub fn get_allowed_versions(&self, id: &str) -> Option<VersionSpec> {
        self.file.lock().unwrap().get_allowed_versions(id).cloned()
    }
}

impl Repository for ProjectReferenceRepository {
    fn source(&self) -> String {
        self.file.lock().unwrap().path().display().to_string()
    }

    fn get_packages(&self) -> Vec<Arc<PackageMetadata>> {
        let file = self.file.lock().unwrap();
        file.entries()
            .filter_map(|entry| {
                let found = self.pool.find_package(&entry.id, Some(&entry.version));
                if found.is_none() {
                    log::warn!(
                        "'{} {}' is referenced but missing from the pool",
                        entry.id,
                        entry.version
                    );
                }
                found
            })
            .collect()
    }
}

impl MutableRepository for ProjectReferenceRepository {
    fn add_package(&self, package: Arc<PackageMetadata>) -> Result<()> {
        self.add_reference(&package, None)
    }

    fn remove_package(&self, identity: &PackageIdentity) -> Result<()> {
        self.file
            .lock()
            .unwrap()
            .delete_entry(identity.id(), identity.version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use tempfile::TempDir;

    fn v(s: &str) -> SemanticVersion {
        s.parse().unwrap()
    }

    fn entry(id: &str, version: &str) -> ReferenceEntry {
        ReferenceEntry {
            id: id.to_string(),
            version: v(version),
            target_platform: None,
            allowed_versions: None,
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let file = PackageReferenceFile::load(dir.path().join(REFERENCE_FILE_NAME)).unwrap();
        assert!(file.is_empty());
    }

    #[test]
    fn test_entries_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(REFERENCE_FILE_NAME);
        {
            let mut file = PackageReferenceFile::load(&path).unwrap();
            file.add_entry(ReferenceEntry {
                target_platform: Some(TargetPlatform::parse("net45").unwrap()),
                allowed_versions: Some("[1.0, 2.0)".parse().unwrap()),
                ..entry("A", "1.0")
            })
            .unwrap();
            file.add_entry(entry("B", "2.0")).unwrap();
        }

        let file = PackageReferenceFile::load(&path).unwrap();
        assert!(file.entry_exists("a", &v("1.0")));
        assert_eq!(
            file.get_package_target_platform("A").unwrap().to_string(),
            "net45"
        );
        assert_eq!(
            file.get_allowed_versions("A").unwrap(),
            &"[1.0, 2.0)".parse().unwrap()
        );
        let ids: Vec<&str> = file.entries().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
    }

    #[test]
    fn test_delete_entry_requires_matching_version() {
        let dir = TempDir::new().unwrap();
        let mut file = PackageReferenceFile::load(dir.path().join(REFERENCE_FILE_NAME)).unwrap();
        file.add_entry(entry("A", "1.0")).unwrap();

        file.delete_entry("A", &v("2.0")).unwrap();
        assert!(file.entry_exists("A", &v("1.0")));

        file.delete_entry("a", &v("1.0")).unwrap();
        assert!(file.is_empty());
    }

    #[test]
    fn test_load_tolerant_treats_corrupt_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(REFERENCE_FILE_NAME);
        fs::write(&path, "nonsense").unwrap();
        assert!(PackageReferenceFile::load(&path).is_err());
        assert!(PackageReferenceFile::load_tolerant(&path).is_empty());
    }

    #[test]
    fn test_repository_view_joins_pool_metadata() {
        let dir = TempDir::new().unwrap();
        let pool = Arc::new(MemoryRepository::new("pool"));
        pool.add(Arc::new(
            PackageMetadata::new("A", v("1.0")).with_dependency("B", None),
        ));

        let repo = ProjectReferenceRepository::open(pool.clone(), dir.path()).unwrap();
        let package = Arc::new(PackageMetadata::new("A", v("1.0")));
        repo.add_package(package.clone()).unwrap();
        // The entry for B has no pool metadata and is skipped.
        repo.add_package(Arc::new(PackageMetadata::new("Gone", v("9.9"))))
            .unwrap();

        let packages = repo.get_packages();
        assert_eq!(packages.len(), 1);
        // Metadata, dependencies included, comes from the pool.
        assert_eq!(packages[0].dependencies_for(None).len(), 1);
    }
}
