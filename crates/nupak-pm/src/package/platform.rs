use std::fmt;
use std::str::FromStr;

use crate::error::PlanningError;

/// A target platform moniker such as `net45` or `netstandard2.0`.
///
/// The moniker is an identifier followed by an optional version. Versions
/// written without dots are one component per digit (`net45` is net 4.5);
/// dotted versions are taken as written (`netstandard2.0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetPlatform {
    identifier: String,
    version: Vec<u32>,
}

impl TargetPlatform {
    pub fn parse(input: &str) -> Result<Self, PlanningError> {
        let trimmed = input.trim();
        let invalid = || PlanningError::InvalidPlatform(input.to_string());

        let split = trimmed
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (identifier, version_part) = trimmed.split_at(split);
        if identifier.is_empty() || !identifier.chars().all(|c| c.is_ascii_alphabetic() || c == '-')
        {
            return Err(invalid());
        }

        let version = if version_part.is_empty() {
            Vec::new()
        } else if version_part.contains('.') {
            version_part
                .split('.')
                .map(|part| part.parse().map_err(|_| invalid()))
                .collect::<Result<_, _>>()?
        } else {
            version_part
                .chars()
                .map(|c| c.to_digit(10).ok_or_else(invalid))
                .collect::<Result<_, _>>()?
        };

        Ok(Self {
            identifier: identifier.to_string(),
            version,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// True when content targeting `other` can be used by a project
    /// targeting `self`: same platform family, at or below our version.
    pub fn supports(&self, other: &TargetPlatform) -> bool {
        self.identifier.eq_ignore_ascii_case(&other.identifier)
            && compare_versions(&other.version, &self.version) != std::cmp::Ordering::Greater
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier)?;
        if self.version.len() > 2 || self.version.iter().any(|&part| part > 9) {
            let dotted: Vec<String> = self.version.iter().map(|part| part.to_string()).collect();
            write!(f, "{}", dotted.join("."))
        } else {
            for part in &self.version {
                write!(f, "{}", part)?;
            }
            Ok(())
        }
    }
}

impl FromStr for TargetPlatform {
    type Err = PlanningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for TargetPlatform {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for TargetPlatform {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// Component-wise compare with implicit trailing zeros.
fn compare_versions(a: &[u32], b: &[u32]) -> std::cmp::Ordering {
    let len = a.len().max(b.len());
    for index in 0..len {
        let left = a.get(index).copied().unwrap_or(0);
        let right = b.get(index).copied().unwrap_or(0);
        match left.cmp(&right) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }
    std::cmp::Ordering::Equal
}

/// Pick the most specific platform a project supports out of `candidates`.
///
/// Returns the index of the winner, or `None` when no platform-specific
/// candidate is compatible (the caller falls back to platform-agnostic
/// content). A `None` project platform never matches specific candidates.
pub fn best_platform_match<'a, I>(project: Option<&TargetPlatform>, candidates: I) -> Option<usize>
where
    I: IntoIterator<Item = Option<&'a TargetPlatform>>,
{
    let project = project?;
    let mut best: Option<(usize, &TargetPlatform)> = None;
    for (index, candidate) in candidates.into_iter().enumerate() {
        let Some(candidate) = candidate else { continue };
        if !project.supports(candidate) {
            continue;
        }
        let better = match best {
            None => true,
            Some((_, current)) => {
                compare_versions(&current.version, &candidate.version)
                    == std::cmp::Ordering::Less
            }
        };
        if better {
            best = Some((index, candidate));
        }
    }
    best.map(|(index, _)| index)
}

/// Filter `items` down to the ones usable by a project on `platform`:
/// the best platform-specific group when one is compatible, otherwise the
/// platform-agnostic items. An unknown project platform keeps everything.
pub fn get_compatible_items<'a, T>(
    platform: Option<&TargetPlatform>,
    items: &'a [T],
    item_platform: impl Fn(&T) -> Option<&TargetPlatform>,
) -> Vec<&'a T> {
    if platform.is_none() {
        return items.iter().collect();
    }

    let best = best_platform_match(platform, items.iter().map(&item_platform));
    match best {
        Some(index) => {
            let winner = item_platform(&items[index])
                .cloned()
                .unwrap_or_else(|| unreachable!("best match is always platform-specific"));
            items
                .iter()
                .filter(|item| item_platform(item) == Some(&winner))
                .collect()
        }
        None => items
            .iter()
            .filter(|item| item_platform(item).is_none())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tp(s: &str) -> TargetPlatform {
        TargetPlatform::parse(s).unwrap()
    }

    #[test]
    fn test_parse_compact_version() {
        let platform = tp("net45");
        assert_eq!(platform.identifier(), "net");
        assert_eq!(platform.version, vec![4, 5]);
    }

    #[test]
    fn test_parse_dotted_version() {
        let platform = tp("netstandard2.0");
        assert_eq!(platform.identifier(), "netstandard");
        assert_eq!(platform.version, vec![2, 0]);
    }

    #[test]
    fn test_parse_bare_identifier() {
        assert_eq!(tp("native").version, Vec::<u32>::new());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(TargetPlatform::parse("").is_err());
        assert!(TargetPlatform::parse("45").is_err());
        assert!(TargetPlatform::parse("net4x5").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for moniker in ["net45", "net40", "netstandard2.0", "native"] {
            assert_eq!(tp(moniker).to_string(), moniker);
        }
    }

    #[test]
    fn test_supports_same_family_lower_version() {
        assert!(tp("net45").supports(&tp("net40")));
        assert!(tp("net45").supports(&tp("net45")));
        assert!(!tp("net40").supports(&tp("net45")));
        assert!(!tp("net45").supports(&tp("netstandard1.0")));
        assert!(tp("NET45").supports(&tp("net40")));
    }

    #[test]
    fn test_best_platform_match_prefers_highest_compatible() {
        let candidates = [Some(tp("net20")), Some(tp("net40")), Some(tp("net45")), None];
        let best = best_platform_match(
            Some(&tp("net40")),
            candidates.iter().map(|c| c.as_ref()),
        );
        assert_eq!(best, Some(1));
    }

    #[test]
    fn test_best_platform_match_none_without_project_platform() {
        let candidates = [Some(tp("net40"))];
        assert_eq!(
            best_platform_match(None, candidates.iter().map(|c| c.as_ref())),
            None
        );
    }

    #[test]
    fn test_get_compatible_items_falls_back_to_agnostic() {
        let items = vec![
            ("a", Some(tp("net45"))),
            ("b", None),
            ("c", None),
        ];
        let selected = get_compatible_items(Some(&tp("net40")), &items, |item| item.1.as_ref());
        let names: Vec<&str> = selected.iter().map(|item| item.0).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_get_compatible_items_picks_best_group() {
        let items = vec![
            ("a", Some(tp("net20"))),
            ("b", Some(tp("net40"))),
            ("c", Some(tp("net40"))),
            ("d", None),
        ];
        let selected = get_compatible_items(Some(&tp("net45")), &items, |item| item.1.as_ref());
        let names: Vec<&str> = selected.iter().map(|item| item.0).collect();
        assert_eq!(names, vec!["b", "c"]);
    }
}
