//! The project seam: what the planner asks of a project when applying
//! operations, plus a filesystem-backed implementation.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use indexmap::IndexSet;

use crate::error::Result;
use crate::package::TargetPlatform;

/// Everything a project must expose so package operations can be applied
/// to it: content file placement, assembly references and build imports.
pub trait ProjectSystem: Send + Sync {
    fn project_name(&self) -> String;

    fn root(&self) -> PathBuf;

    fn target_platform(&self) -> Option<TargetPlatform>;

    /// Place a file at `relative` under the project root, sourced from
    /// `source` in the pool.
    fn add_file(&self, relative: &str, source: &Path) -> Result<()>;

    fn delete_file(&self, relative: &str) -> Result<()>;

    fn file_exists(&self, relative: &str) -> bool;

    /// Record an assembly reference pointing into the pool.
    fn add_reference(&self, reference_path: &Path) -> Result<()>;

    /// Remove a reference by file name.
    fn remove_reference(&self, name: &str) -> Result<()>;

    fn reference_exists(&self, name: &str) -> bool;

    fn add_import(&self, target_path: &Path) -> Result<()>;

    fn remove_import(&self, target_path: &Path) -> Result<()>;
}

/// A project living in a directory. References and imports are kept in
/// memory as pool paths and can be inspected by callers (and tests).
pub struct FileSystemProject {
    name: String,
    root: PathBuf,
    target_platform: Option<TargetPlatform>,
    references: RwLock<IndexSet<String>>,
    imports: RwLock<IndexSet<String>>,
}

impl FileSystemProject {
    pub fn new(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        target_platform: Option<TargetPlatform>,
    ) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            name: name.into(),
            root,
            target_platform,
            references: RwLock::new(IndexSet::new()),
            imports: RwLock::new(IndexSet::new()),
        })
    }

    /// The recorded reference paths, in insertion order.
    pub fn references(&self) -> Vec<String> {
        self.references.read().unwrap().iter().cloned().collect()
    }

    pub fn imports(&self) -> Vec<String> {
        self.imports.read().unwrap().iter().cloned().collect()
    }

    fn file_name_of(path: &str) -> &str {
        Path::new(path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(path)
    }
}

impl ProjectSystem for FileSystemProject {
    fn project_name(&self) -> String {
        self.name.clone()
    }

    fn root(&self) -> PathBuf {
        self.root.clone()
    }

    fn target_platform(&self) -> Option<TargetPlatform> {
        self.target_platform.clone()
    }

    fn add_file(&self, relative: &str, source: &Path) -> Result<()> {
        let target = self.root.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        if source.is_file() {
            fs::copy(source, &target)?;
        } else {
            // Package content is materialized externally; keep the slot so
            // the project layout is still observable.
            fs::write(&target, [])?;
        }
        log::debug!("added file '{}' to '{}'", relative, self.name);
        Ok(())
    }

    fn delete_file(&self, relative: &str) -> Result<()> {
        let target = self.root.join(relative);
        if target.is_file() {
            fs::remove_file(&target)?;
            log::debug!("removed file '{}' from '{}'", relative, self.name);
        }
        Ok(())
    }

    fn file_exists(&self, relative: &str) -> bool {
        self.root.join(relative).is_file()
    }

    fn add_reference(&self, reference_path: &Path) -> Result<()> {
        let path = reference_path.to_string_lossy().into_owned();
        self.references.write().unwrap().insert(path);
        Ok(())
    }

    fn remove_reference(&self, name: &str) -> Result<()> {
        self.references
            .write()
            .unwrap()
            .retain(|existing| !Self::file_name_of(existing).eq_ignore_ascii_case(name));
        Ok(())
    }

    fn reference_exists(&self, name: &str) -> bool {
        self.references
            .read()
            .unwrap()
            .iter()
            .any(|existing| Self::file_name_of(existing).eq_ignore_ascii_case(name))
    }

    fn add_import(&self, target_path: &Path) -> Result<()> {
        self.imports
            .write()
            .unwrap()
            .insert(target_path.to_string_lossy().into_owned());
        Ok(())
    }

    fn remove_import(&self, target_path: &Path) -> Result<()> {
        let path = target_path.to_string_lossy();
        self.imports
            .write()
            .unwrap()
            .retain(|existing| existing != path.as_ref());
        Ok(())
    }
}
