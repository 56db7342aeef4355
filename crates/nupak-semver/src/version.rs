//! Version parsing and comparison module

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

/// Error type for version and version-spec parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("'{0}' is not a valid version string")]
    InvalidVersion(String),
    #[error("'{0}' is not a valid version spec")]
    InvalidVersionSpec(String),
    #[error("version spec minimum '{min}' must not exceed its maximum '{max}'")]
    MinExceedsMax { min: String, max: String },
    #[error("version spec with equal bounds must be inclusive on both ends")]
    EmptyRange,
}

lazy_static! {
    // One to four numeric components, an optional hyphenated special
    // (pre-release) tag and optional build metadata. Tags may lead with a
    // digit and contain dots (`1.0-2beta`, `1.0.0-beta.1`). Build metadata
    // is accepted on parse and never participates in ordering.
    static ref VERSION_RE: Regex = Regex::new(
        r"^(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.(\d+))?(?:-([0-9A-Za-z][0-9A-Za-z.-]*))?(?:\+[0-9A-Za-z.-]+)?$"
    ).unwrap();
}

/// A NuGet-style semantic version.
///
/// Ordering compares the four numeric components first; a version carrying a
/// special (pre-release) tag sorts strictly before the same numeric version
/// without one. Special tags compare ordinally, ASCII case-insensitive, so
/// `1.0-alpha2` sorts *after* `1.0-alpha10` — that quirk is ecosystem
/// behavior and is kept intact.
#[derive(Debug, Clone)]
pub struct SemanticVersion {
    major: u64,
    minor: u64,
    patch: u64,
    revision: u64,
    special_version: Option<String>,
    // Numeric components supplied in the original string, so Display can
    // round-trip "1.0" as "1.0" rather than "1.0.0.0".
    precision: u8,
}

impl SemanticVersion {
    /// Create a stable version from explicit numeric components.
    ///
    /// Display prints only as many components as needed, at least two:
    /// `SemanticVersion::new(1, 1, 0, 0)` prints `1.1`.
    pub fn new(major: u64, minor: u64, patch: u64, revision: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            revision,
            special_version: None,
            precision: 2,
        }
    }

    /// Parse a version string such as `1.0`, `2.1.3.5` or `1.0.0-alpha`.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        let invalid = || VersionError::InvalidVersion(input.to_string());
        let caps = VERSION_RE.captures(trimmed).ok_or_else(invalid)?;

        let mut precision = 1u8;
        let mut component = |index: usize| -> Result<u64, VersionError> {
            match caps.get(index) {
                Some(m) => {
                    precision += 1;
                    m.as_str().parse().map_err(|_| invalid())
                }
                None => Ok(0),
            }
        };

        let major = caps
            .get(1)
            .ok_or_else(invalid)?
            .as_str()
            .parse()
            .map_err(|_| invalid())?;
        let minor = component(2)?;
        let patch = component(3)?;
        let revision = component(4)?;
        let special_version = caps.get(5).map(|m| m.as_str().to_string());

        Ok(Self {
            major,
            minor,
            patch,
            revision,
            special_version,
            precision,
        })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The special (pre-release) tag, without the leading hyphen.
    pub fn special_version(&self) -> Option<&str> {
        self.special_version.as_deref()
    }

    pub fn is_prerelease(&self) -> bool {
        self.special_version.is_some()
    }

    /// The same numeric version with the special tag stripped.
    pub fn release(&self) -> Self {
        Self {
            special_version: None,
            ..self.clone()
        }
    }

    fn numeric(&self) -> (u64, u64, u64, u64) {
        (self.major, self.minor, self.patch, self.revision)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let needed = if self.revision > 0 {
            4
        } else if self.patch > 0 {
            3
        } else if self.minor > 0 {
            2
        } else {
            1
        };
        let count = needed.max(self.precision);

        write!(f, "{}", self.major)?;
        for (index, value) in [self.minor, self.patch, self.revision].iter().enumerate() {
            if index as u8 + 2 > count {
                break;
            }
            write!(f, ".{}", value)?;
        }
        if let Some(special) = &self.special_version {
            write!(f, "-{}", special)?;
        }
        Ok(())
    }
}

impl FromStr for SemanticVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.numeric().cmp(&other.numeric()).then_with(|| {
            match (&self.special_version, &other.special_version) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => cmp_ignore_ascii_case(a, b),
            }
        })
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for SemanticVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.numeric().hash(state);
        self.special_version.is_some().hash(state);
        if let Some(special) = &self.special_version {
            for byte in special.bytes() {
                byte.to_ascii_lowercase().hash(state);
            }
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for SemanticVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for SemanticVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn cmp_ignore_ascii_case(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
}
