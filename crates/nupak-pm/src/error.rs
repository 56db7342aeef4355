use nupak_semver::VersionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlanningError {
    // Resolution errors
    #[error("Unable to resolve dependency '{dependency}'.")]
    DependencyResolution { dependency: String },

    #[error("Unable to resolve dependency '{dependency}'.'{id}' has an additional constraint ({constraint}) defined in {manifest}.")]
    ConstraintViolation {
        dependency: String,
        id: String,
        constraint: String,
        manifest: String,
    },

    #[error("Unable to find a version of '{id}' that is compatible with '{dependent}'.")]
    Conflict { id: String, dependent: String },

    #[error("Already referencing a newer version of '{id}'.")]
    VersionDowngrade { id: String },

    // Removal errors
    #[error("Unable to uninstall '{package}' because '{dependents}' depend(s) on it.")]
    PackageInUse { package: String, dependents: String },

    // Lookup errors
    #[error("Unable to find package '{id}'.")]
    PackageNotFound { id: String },

    #[error("Unable to find version '{version}' of package '{id}'.")]
    VersionNotFound { id: String, version: String },

    #[error("Found multiple versions of '{id}' installed. Specify a project or version to disambiguate.")]
    AmbiguousMatch { id: String },

    // Engine gate
    #[error("The '{package}' package requires client version '{required}' or above, but the current client version is '{current}'.")]
    MinClientVersion {
        package: String,
        required: String,
        current: String,
    },

    // Manifest/store errors
    #[error("Invalid package data: {0}")]
    Validation(#[from] VersionError),

    #[error("'{0}' is not a valid target platform moniker")]
    InvalidPlatform(String),

    #[error("Failed to parse {path}: {source}")]
    StoreParse {
        path: String,
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Listener callbacks surface whatever the host raised
    #[error(transparent)]
    Listener(#[from] anyhow::Error),

    // Batch actions aggregate per-project failures; raised only when every
    // project in the batch failed
    #[error("All projects failed:{}", failures.iter().map(|(p, e)| format!("\n  {}: {}", p, e)).collect::<String>())]
    Batch { failures: Vec<(String, String)> },
}

pub type Result<T> = std::result::Result<T, PlanningError>;
