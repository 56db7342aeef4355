//! Planned operations and the reduction pass that runs before execution.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::package::{PackageIdentity, PackageMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageAction {
    Install,
    Uninstall,
}

impl fmt::Display for PackageAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageAction::Install => write!(f, "install"),
            PackageAction::Uninstall => write!(f, "uninstall"),
        }
    }
}

/// One step of a plan: install or uninstall a concrete package.
#[derive(Debug, Clone)]
pub struct PackageOperation {
    pub package: Arc<PackageMetadata>,
    pub action: PackageAction,
}

impl PackageOperation {
    pub fn install(package: Arc<PackageMetadata>) -> Self {
        Self {
            package,
            action: PackageAction::Install,
        }
    }

    pub fn uninstall(package: Arc<PackageMetadata>) -> Self {
        Self {
            package,
            action: PackageAction::Uninstall,
        }
    }

    pub fn identity(&self) -> PackageIdentity {
        self.package.identity()
    }
}

impl PartialEq for PackageOperation {
    fn eq(&self, other: &Self) -> bool {
        self.action == other.action && self.identity() == other.identity()
    }
}

impl Eq for PackageOperation {}

impl fmt::Display for PackageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.package.identity())
    }
}

/// Normalize a plan before execution.
///
/// An install and an uninstall of the same identity cancel each other;
/// duplicate operations collapse to one. Satellite operations are reordered
/// relative to their core package: satellite uninstalls run before the core
/// uninstall, the core install runs before its satellite installs. For
/// unrelated identities first-seen order is preserved, and reducing an
/// already reduced plan changes nothing.
pub fn reduce(operations: Vec<PackageOperation>) -> Vec<PackageOperation> {
    // Identities with both an install and an uninstall net out to nothing.
    let mut cancelled: HashSet<PackageIdentity> = HashSet::new();
    for operation in &operations {
        let inverse_present = operations
            .iter()
            .any(|other| other.identity() == operation.identity() && other.action != operation.action);
        if inverse_present {
            cancelled.insert(operation.identity());
        }
    }

    let mut surviving: Vec<PackageOperation> = Vec::new();
    for operation in operations {
        if cancelled.contains(&operation.identity()) {
            log::debug!("reducing '{}': cancelled by its inverse", operation);
            continue;
        }
        if surviving.contains(&operation) {
            continue;
        }
        surviving.push(operation);
    }

    // Rebuild with satellite ordering. `emitted` tracks indexes already
    // moved forward by the rules below.
    let mut emitted = vec![false; surviving.len()];
    let mut ordered: Vec<PackageOperation> = Vec::with_capacity(surviving.len());

    for index in 0..surviving.len() {
        if emitted[index] {
            continue;
        }
        let operation = &surviving[index];

        match operation.action {
            PackageAction::Uninstall if !operation.package.is_satellite() => {
                // Satellites leave before their core package.
                for (other_index, other) in surviving.iter().enumerate() {
                    if !emitted[other_index]
                        && other.action == PackageAction::Uninstall
                        && other.package.is_satellite_of(operation.package.id())
                        && other.package.version() == operation.package.version()
                    {
                        emitted[other_index] = true;
                        ordered.push(other.clone());
                    }
                }
            }
            PackageAction::Install if operation.package.is_satellite() => {
                // The core package arrives before its satellites.
                let core_id = operation.package.satellite_core_id().unwrap_or_default();
                for (other_index, other) in surviving.iter().enumerate() {
                    if !emitted[other_index]
                        && other.action == PackageAction::Install
                        && other.package.id().eq_ignore_ascii_case(core_id)
                        && other.package.version() == operation.package.version()
                    {
                        emitted[other_index] = true;
                        ordered.push(other.clone());
                    }
                }
            }
            _ => {}
        }

        emitted[index] = true;
        ordered.push(operation.clone());
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(id: &str, version: &str) -> Arc<PackageMetadata> {
        Arc::new(PackageMetadata::new(id, version.parse().unwrap()))
    }

    fn satellite(core: &str, language: &str, version: &str) -> Arc<PackageMetadata> {
        Arc::new(
            PackageMetadata::new(format!("{core}.{language}"), version.parse().unwrap())
                .with_language(language)
                .with_dependency(core, None),
        )
    }

    fn ids(operations: &[PackageOperation]) -> Vec<String> {
        operations.iter().map(|op| op.to_string()).collect()
    }

    #[test]
    fn test_install_uninstall_pair_cancels() {
        let a = pkg("A", "1.0");
        let reduced = reduce(vec![
            PackageOperation::install(a.clone()),
            PackageOperation::uninstall(a),
        ]);
        assert!(reduced.is_empty());
    }

    #[test]
    fn test_different_versions_do_not_cancel() {
        let reduced = reduce(vec![
            PackageOperation::uninstall(pkg("A", "1.0")),
            PackageOperation::install(pkg("A", "2.0")),
        ]);
        assert_eq!(ids(&reduced), vec!["uninstall A 1.0", "install A 2.0"]);
    }

    #[test]
    fn test_duplicates_collapse() {
        let a = pkg("A", "1.0");
        let reduced = reduce(vec![
            PackageOperation::install(a.clone()),
            PackageOperation::install(a),
            PackageOperation::install(pkg("B", "1.0")),
        ]);
        assert_eq!(ids(&reduced), vec!["install A 1.0", "install B 1.0"]);
    }

    #[test]
    fn test_satellite_uninstall_precedes_core_uninstall() {
        let reduced = reduce(vec![
            PackageOperation::uninstall(pkg("A", "1.0")),
            PackageOperation::uninstall(satellite("A", "fr-FR", "1.0")),
        ]);
        assert_eq!(
            ids(&reduced),
            vec!["uninstall A.fr-FR 1.0", "uninstall A 1.0"]
        );
    }

    #[test]
    fn test_core_install_precedes_satellite_install() {
        let reduced = reduce(vec![
            PackageOperation::install(satellite("A", "fr-FR", "2.0")),
            PackageOperation::install(pkg("A", "2.0")),
        ]);
        assert_eq!(ids(&reduced), vec!["install A 2.0", "install A.fr-FR 2.0"]);
    }

    #[test]
    fn test_reduce_is_idempotent() {
        let operations = vec![
            PackageOperation::uninstall(satellite("A", "fr-FR", "1.0")),
            PackageOperation::uninstall(pkg("A", "1.0")),
            PackageOperation::install(pkg("A", "2.0")),
            PackageOperation::install(satellite("A", "fr-FR", "2.0")),
            PackageOperation::install(pkg("B", "1.0")),
        ];
        let once = reduce(operations);
        let twice = reduce(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unrelated_order_is_preserved() {
        let reduced = reduce(vec![
            PackageOperation::install(pkg("C", "1.0")),
            PackageOperation::install(pkg("A", "1.0")),
            PackageOperation::install(pkg("B", "1.0")),
        ]);
        assert_eq!(
            ids(&reduced),
            vec!["install C 1.0", "install A 1.0", "install B 1.0"]
        );
    }
}
