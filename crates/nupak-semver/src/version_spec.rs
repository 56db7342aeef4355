//! Version spec (interval) parsing and matching

use std::fmt;
use std::str::FromStr;

use crate::version::{SemanticVersion, VersionError};

/// Upper-bound policy for [`VersionSpec::safe_range`].
///
/// `NextMinor` keeps updates within the same major.minor line; `NextMajor`
/// allows minor-level movement but never crosses a major boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SafeBound {
    #[default]
    NextMinor,
    NextMajor,
}

/// A version interval with optional, independently inclusive bounds.
///
/// The textual forms follow the NuGet bracket notation:
///
/// - `1.0`        — minimum 1.0, inclusive, unbounded above
/// - `[1.0]`      — exactly 1.0
/// - `(, 1.0]`    — at most 1.0
/// - `[1.0, 2.0)` — at least 1.0, below 2.0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSpec {
    min_version: Option<SemanticVersion>,
    is_min_inclusive: bool,
    max_version: Option<SemanticVersion>,
    is_max_inclusive: bool,
}

impl VersionSpec {
    /// Build a spec from explicit bounds, rejecting unsatisfiable shapes:
    /// a minimum above the maximum, or equal bounds that are not both
    /// inclusive.
    pub fn new(
        min_version: Option<SemanticVersion>,
        is_min_inclusive: bool,
        max_version: Option<SemanticVersion>,
        is_max_inclusive: bool,
    ) -> Result<Self, VersionError> {
        if let (Some(min), Some(max)) = (&min_version, &max_version) {
            if min > max {
                return Err(VersionError::MinExceedsMax {
                    min: min.to_string(),
                    max: max.to_string(),
                });
            }
            if min == max && !(is_min_inclusive && is_max_inclusive) {
                return Err(VersionError::EmptyRange);
            }
        }
        Ok(Self {
            min_version,
            is_min_inclusive,
            max_version,
            is_max_inclusive,
        })
    }

    /// The spec matching exactly one version: `[v]`.
    pub fn exact(version: SemanticVersion) -> Self {
        Self {
            min_version: Some(version.clone()),
            is_min_inclusive: true,
            max_version: Some(version),
            is_max_inclusive: true,
        }
    }

    /// The spec matching `version` and everything above it.
    pub fn at_least(version: SemanticVersion) -> Self {
        Self {
            min_version: Some(version),
            is_min_inclusive: true,
            max_version: None,
            is_max_inclusive: false,
        }
    }

    /// The unbounded spec: every version satisfies it.
    pub fn any() -> Self {
        Self {
            min_version: None,
            is_min_inclusive: false,
            max_version: None,
            is_max_inclusive: false,
        }
    }

    /// The empty spec: no version satisfies it. Produced by [`intersect`]
    /// when two specs are disjoint.
    ///
    /// [`intersect`]: VersionSpec::intersect
    pub fn match_none() -> Self {
        let zero = SemanticVersion::new(0, 0, 0, 0);
        Self {
            min_version: Some(zero.clone()),
            is_min_inclusive: false,
            max_version: Some(zero),
            is_max_inclusive: false,
        }
    }

    /// Parse the bracket notation. A bare version is shorthand for
    /// "that version or higher".
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        let invalid = || VersionError::InvalidVersionSpec(input.to_string());

        if trimmed.is_empty() {
            return Err(invalid());
        }

        let starts_bracketed = trimmed.starts_with('[') || trimmed.starts_with('(');
        let ends_bracketed = trimmed.ends_with(']') || trimmed.ends_with(')');
        if !starts_bracketed && !ends_bracketed {
            let version = SemanticVersion::parse(trimmed)
                .map_err(|_| invalid())?;
            return Ok(Self::at_least(version));
        }
        if !(starts_bracketed && ends_bracketed) {
            return Err(invalid());
        }

        let is_min_inclusive = trimmed.starts_with('[');
        let is_max_inclusive = trimmed.ends_with(']');
        let inner = &trimmed[1..trimmed.len() - 1];

        let parse_part = |part: &str| -> Result<Option<SemanticVersion>, VersionError> {
            let part = part.trim();
            if part.is_empty() {
                Ok(None)
            } else {
                SemanticVersion::parse(part).map(Some).map_err(|_| invalid())
            }
        };

        let (min_version, max_version) = match inner.split_once(',') {
            None => {
                // Single version: only the fully inclusive form is valid.
                let version = parse_part(inner)?.ok_or_else(invalid)?;
                if !(is_min_inclusive && is_max_inclusive) {
                    return Err(invalid());
                }
                (Some(version.clone()), Some(version))
            }
            Some((min_part, max_part)) => {
                if max_part.contains(',') {
                    return Err(invalid());
                }
                let min = parse_part(min_part)?;
                let max = parse_part(max_part)?;
                if min.is_none() && max.is_none() {
                    return Err(invalid());
                }
                (min, max)
            }
        };

        Self::new(min_version, is_min_inclusive, max_version, is_max_inclusive)
    }

    pub fn min_version(&self) -> Option<&SemanticVersion> {
        self.min_version.as_ref()
    }

    pub fn max_version(&self) -> Option<&SemanticVersion> {
        self.max_version.as_ref()
    }

    pub fn is_min_inclusive(&self) -> bool {
        self.is_min_inclusive
    }

    pub fn is_max_inclusive(&self) -> bool {
        self.is_max_inclusive
    }

    /// True when the spec pins exactly one version.
    pub fn is_exact(&self) -> bool {
        self.is_min_inclusive
            && self.is_max_inclusive
            && self.min_version.is_some()
            && self.min_version == self.max_version
    }

    /// Bounds check.
    pub fn satisfies(&self, version: &SemanticVersion) -> bool {
        if let Some(min) = &self.min_version {
            let above = if self.is_min_inclusive {
                version >= min
            } else {
                version > min
            };
            if !above {
                return false;
            }
        }
        if let Some(max) = &self.max_version {
            let below = if self.is_max_inclusive {
                version <= max
            } else {
                version < max
            };
            if !below {
                return false;
            }
        }
        true
    }

    /// The spec satisfied by exactly the versions both inputs accept.
    /// Disjoint inputs produce [`VersionSpec::match_none`].
    pub fn intersect(&self, other: &Self) -> Self {
        let (min_version, is_min_inclusive) = tighter_bound(
            self.min_version.as_ref(),
            self.is_min_inclusive,
            other.min_version.as_ref(),
            other.is_min_inclusive,
            true,
        );
        let (max_version, is_max_inclusive) = tighter_bound(
            self.max_version.as_ref(),
            self.is_max_inclusive,
            other.max_version.as_ref(),
            other.is_max_inclusive,
            false,
        );

        match Self::new(
            min_version.cloned(),
            is_min_inclusive,
            max_version.cloned(),
            is_max_inclusive,
        ) {
            Ok(spec) => spec,
            Err(_) => Self::match_none(),
        }
    }

    /// The range an update may move within without risking a breaking
    /// change: `[current, boundary)` where the boundary is the next minor
    /// or next major version per `bound`.
    pub fn safe_range(current: &SemanticVersion, bound: SafeBound) -> Self {
        let max = match bound {
            SafeBound::NextMinor => SemanticVersion::new(current.major(), current.minor() + 1, 0, 0),
            SafeBound::NextMajor => SemanticVersion::new(current.major() + 1, 0, 0, 0),
        };
        Self {
            min_version: Some(current.clone()),
            is_min_inclusive: true,
            max_version: Some(max),
            is_max_inclusive: false,
        }
    }

    /// Operator-style rendering for messages: `(= 1.0)`, `(>= 1.0)`,
    /// `(> 1.0 && <= 2.0)`. The unbounded spec renders as an empty string.
    pub fn pretty_print(&self) -> String {
        match (&self.min_version, &self.max_version) {
            (Some(min), Some(max)) if min == max && self.is_min_inclusive && self.is_max_inclusive => {
                format!("(= {})", min)
            }
            (Some(min), Some(max)) => format!(
                "({} {} && {} {})",
                min_operator(self.is_min_inclusive),
                min,
                max_operator(self.is_max_inclusive),
                max
            ),
            (Some(min), None) => format!("({} {})", min_operator(self.is_min_inclusive), min),
            (None, Some(max)) => format!("({} {})", max_operator(self.is_max_inclusive), max),
            (None, None) => String::new(),
        }
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.min_version, &self.max_version) {
            (Some(min), None) if self.is_min_inclusive => write!(f, "{}", min),
            (Some(min), Some(max)) if min == max && self.is_min_inclusive && self.is_max_inclusive => {
                write!(f, "[{}]", min)
            }
            (min, max) => {
                write!(f, "{}", if self.is_min_inclusive { '[' } else { '(' })?;
                if let Some(min) = min {
                    write!(f, "{}", min)?;
                }
                write!(f, ", ")?;
                if let Some(max) = max {
                    write!(f, "{}", max)?;
                }
                write!(f, "{}", if self.is_max_inclusive { ']' } else { ')' })
            }
        }
    }
}

impl FromStr for VersionSpec {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for VersionSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for VersionSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn min_operator(inclusive: bool) -> &'static str {
    if inclusive {
        ">="
    } else {
        ">"
    }
}

fn max_operator(inclusive: bool) -> &'static str {
    if inclusive {
        "<="
    } else {
        "<"
    }
}

// Pick the tighter of two optional bounds: the greater minimum when
// `lower` is true, the lesser maximum otherwise. On a tie the bound is
// inclusive only if both inputs are.
fn tighter_bound<'a>(
    a: Option<&'a SemanticVersion>,
    a_inclusive: bool,
    b: Option<&'a SemanticVersion>,
    b_inclusive: bool,
    lower: bool,
) -> (Option<&'a SemanticVersion>, bool) {
    match (a, b) {
        (None, None) => (None, false),
        (Some(_), None) => (a, a_inclusive),
        (None, Some(_)) => (b, b_inclusive),
        (Some(av), Some(bv)) => {
            if av == bv {
                (a, a_inclusive && b_inclusive)
            } else if (av > bv) == lower {
                (a, a_inclusive)
            } else {
                (b, b_inclusive)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemanticVersion {
        SemanticVersion::parse(s).unwrap()
    }

    fn spec(s: &str) -> VersionSpec {
        VersionSpec::parse(s).unwrap()
    }

    #[test]
    fn test_parse_bare_version_is_min_inclusive() {
        let parsed = spec("1.0");
        assert_eq!(parsed.min_version(), Some(&v("1.0")));
        assert!(parsed.is_min_inclusive());
        assert_eq!(parsed.max_version(), None);
        assert!(parsed.satisfies(&v("99.0")));
        assert!(!parsed.satisfies(&v("0.9")));
    }

    #[test]
    fn test_parse_exact() {
        let parsed = spec("[1.0]");
        assert!(parsed.is_exact());
        assert!(parsed.satisfies(&v("1.0")));
        assert!(parsed.satisfies(&v("1.0.0.0")));
        assert!(!parsed.satisfies(&v("1.0.1")));
    }

    #[test]
    fn test_parse_closed_open() {
        let parsed = spec("[1.0, 2.0)");
        assert!(parsed.satisfies(&v("1.0")));
        assert!(parsed.satisfies(&v("1.9.9")));
        assert!(!parsed.satisfies(&v("2.0")));
        assert!(!parsed.satisfies(&v("0.9")));
    }

    #[test]
    fn test_parse_open_bounds() {
        let parsed = spec("(1.0, 2.0]");
        assert!(!parsed.satisfies(&v("1.0")));
        assert!(parsed.satisfies(&v("1.0.1")));
        assert!(parsed.satisfies(&v("2.0")));
    }

    #[test]
    fn test_parse_half_unbounded() {
        let below = spec("(, 1.0]");
        assert!(below.satisfies(&v("0.1")));
        assert!(below.satisfies(&v("1.0")));
        assert!(!below.satisfies(&v("1.0.1")));

        let above = spec("(2.0, )");
        assert!(!above.satisfies(&v("2.0")));
        assert!(above.satisfies(&v("2.0.1")));
    }

    #[test]
    fn test_parse_without_spaces() {
        assert_eq!(spec("[1.0,2.0)"), spec("[1.0, 2.0)"));
    }

    #[test]
    fn test_parse_invalid() {
        for input in [
            "",
            "(1.0)",
            "[1.0)",
            "(1.0]",
            "[1.0",
            "1.0]",
            "(,)",
            "[,]",
            "[2.0, 1.0]",
            "(1.0, 1.0)",
            "[1.0, 1.0)",
            "[1.0, 2.0, 3.0]",
            "[abc]",
        ] {
            assert!(
                VersionSpec::parse(input).is_err(),
                "expected '{}' to be rejected",
                input
            );
        }
    }

    #[test]
    fn test_prerelease_within_bounds() {
        let parsed = spec("[1.0, 2.0)");
        assert!(parsed.satisfies(&v("1.5-beta")));
        // 2.0-beta sorts below 2.0, so the open upper bound admits it.
        assert!(parsed.satisfies(&v("2.0-beta")));
        assert!(!parsed.satisfies(&v("1.0-beta")));
    }

    #[test]
    fn test_any_matches_everything() {
        let all = VersionSpec::any();
        assert!(all.satisfies(&v("0.0.1")));
        assert!(all.satisfies(&v("100.0-alpha")));
    }

    #[test]
    fn test_match_none_matches_nothing() {
        let none = VersionSpec::match_none();
        assert!(!none.satisfies(&v("0.0")));
        assert!(!none.satisfies(&v("1.0")));
    }

    #[test]
    fn test_display_round_trip() {
        for input in ["1.0", "[1.0]", "[1.0, 2.0)", "(1.0, 2.0]", "(, 1.0]", "(1.0, )"] {
            assert_eq!(spec(input).to_string(), input);
        }
        // The closed lower half-range canonicalizes to the bare form.
        assert_eq!(spec("[1.0, )").to_string(), "1.0");
    }

    #[test]
    fn test_pretty_print() {
        assert_eq!(spec("[1.0]").pretty_print(), "(= 1.0)");
        assert_eq!(spec("1.0").pretty_print(), "(>= 1.0)");
        assert_eq!(spec("(, 2.0)").pretty_print(), "(< 2.0)");
        assert_eq!(spec("[1.0, 2.0)").pretty_print(), "(>= 1.0 && < 2.0)");
        assert_eq!(VersionSpec::any().pretty_print(), "");
    }

    #[test]
    fn test_intersect_overlapping() {
        let merged = spec("[1.0, 3.0]").intersect(&spec("[2.0, 4.0]"));
        assert!(!merged.satisfies(&v("1.5")));
        assert!(merged.satisfies(&v("2.0")));
        assert!(merged.satisfies(&v("3.0")));
        assert!(!merged.satisfies(&v("3.1")));
    }

    #[test]
    fn test_intersect_with_any_is_identity() {
        let range = spec("[1.0, 2.0)");
        assert_eq!(range.intersect(&VersionSpec::any()), range);
    }

    #[test]
    fn test_intersect_disjoint_matches_nothing() {
        let merged = spec("[1.0, 2.0)").intersect(&spec("[3.0, 4.0)"));
        assert!(!merged.satisfies(&v("1.5")));
        assert!(!merged.satisfies(&v("3.5")));
    }

    #[test]
    fn test_intersect_tie_requires_both_inclusive() {
        let merged = spec("[1.0, 2.0]").intersect(&spec("[1.0, 2.0)"));
        assert!(!merged.satisfies(&v("2.0")));
        assert!(merged.satisfies(&v("1.0")));
    }

    #[test]
    fn test_safe_range_next_minor() {
        let range = VersionSpec::safe_range(&v("1.0.3"), SafeBound::NextMinor);
        assert_eq!(range.to_string(), "[1.0.3, 1.1)");
        assert!(range.satisfies(&v("1.0.3")));
        assert!(range.satisfies(&v("1.0.9.5")));
        assert!(!range.satisfies(&v("1.1")));
        assert!(!range.satisfies(&v("2.0")));
    }

    #[test]
    fn test_safe_range_next_major() {
        let range = VersionSpec::safe_range(&v("1.0.3"), SafeBound::NextMajor);
        assert_eq!(range.to_string(), "[1.0.3, 2.0)");
        assert!(range.satisfies(&v("1.9")));
        assert!(!range.satisfies(&v("2.0")));
    }

    #[test]
    fn test_new_rejects_inverted_bounds() {
        assert!(matches!(
            VersionSpec::new(Some(v("2.0")), true, Some(v("1.0")), true),
            Err(VersionError::MinExceedsMax { .. })
        ));
    }

    #[test]
    fn test_new_rejects_exclusive_point() {
        assert!(matches!(
            VersionSpec::new(Some(v("1.0")), true, Some(v("1.0")), false),
            Err(VersionError::EmptyRange)
        ));
    }
}
