//! Semantic version parsing, comparison, and bumping (C3) — single source of
//! truth; nothing else in this crate parses a version string itself.

use crate::types::ChangeType;

pub const INITIAL_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

/// Parses `MAJOR.MINOR.PATCH[-prerelease][+build]`, stripping prerelease and
/// build metadata before parsing the three numeric components.
pub fn parse_semver(version: &str) -> Result<SemVer, String> {
    let base = version.split('-').next().unwrap_or(version);
    let base = base.split('+').next().unwrap_or(base);
    let parts: Vec<&str> = base.split('.').collect();
    if parts.len() != 3 {
        return Err(format!(
            "Invalid semver format: expected 3 parts, got {}",
            parts.len()
        ));
    }
    let mut nums = [0u64; 3];
    for (i, part) in parts.iter().enumerate() {
        nums[i] = part
            .parse::<i64>()
            .map_err(|_| format!("Cannot parse version '{version}': invalid integer '{part}'"))
            .and_then(|n| {
                if n < 0 {
                    Err("Version numbers cannot be negative".to_string())
                } else {
                    Ok(n as u64)
                }
            })?;
    }
    Ok(SemVer {
        major: nums[0],
        minor: nums[1],
        patch: nums[2],
    })
}

/// Best-effort parse that never fails, returning `1.0.0` for legacy or
/// malformed rows rather than propagating an error.
pub fn parse_semver_lenient(version: &str) -> SemVer {
    parse_semver(version).unwrap_or(SemVer {
        major: 1,
        minor: 0,
        patch: 0,
    })
}

/// True iff `version` contains a `-` before any `+` (build metadata alone
/// does not make a version a pre-release).
pub fn is_prerelease(version: &str) -> bool {
    let without_build = version.split('+').next().unwrap_or(version);
    without_build.contains('-')
}

pub fn base_version(version: &str) -> &str {
    let without_build = version.split('+').next().unwrap_or(version);
    without_build.split('-').next().unwrap_or(without_build)
}

/// A graduation is `X.Y.Z-pre -> X.Y.Z`: current is a pre-release, new is
/// not, and their base versions match.
pub fn is_graduation(current: &str, new: &str) -> bool {
    if !is_prerelease(current) || is_prerelease(new) {
        return false;
    }
    base_version(current) == base_version(new)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpKind {
    Major,
    Minor,
    Patch,
}

pub fn bump_version(current: &str, kind: BumpKind) -> Result<String, String> {
    let v = parse_semver(current)?;
    Ok(match kind {
        BumpKind::Major => format!("{}.0.0", v.major + 1),
        BumpKind::Minor => format!("{}.{}.0", v.major, v.minor + 1),
        BumpKind::Patch => format!("{}.{}.{}", v.major, v.minor, v.patch + 1),
    })
}

/// Picks the next version for a publish: no current version means the very
/// first contract for the asset, which is always `1.0.0`; an incompatible
/// change always forces a major bump; a major/minor change that is still
/// compatible under the chosen mode bumps minor; anything else bumps patch.
pub fn compute_next_version(
    current: Option<&str>,
    is_compatible: bool,
    change_type: ChangeType,
) -> Result<String, String> {
    let Some(current) = current else {
        return Ok(INITIAL_VERSION.to_string());
    };
    if !is_compatible {
        return bump_version(current, BumpKind::Major);
    }
    match change_type {
        ChangeType::Major | ChangeType::Minor => bump_version(current, BumpKind::Minor),
        ChangeType::Patch => bump_version(current, BumpKind::Patch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_version() {
        assert_eq!(
            parse_semver("1.2.3").unwrap(),
            SemVer {
                major: 1,
                minor: 2,
                patch: 3
            }
        );
    }

    #[test]
    fn strips_prerelease_and_build() {
        assert_eq!(
            parse_semver("1.2.3-rc.1+build.5").unwrap(),
            SemVer {
                major: 1,
                minor: 2,
                patch: 3
            }
        );
    }

    #[test]
    fn rejects_wrong_part_count() {
        assert!(parse_semver("1.2").is_err());
        assert!(parse_semver("1.2.3.4").is_err());
    }

    #[test]
    fn rejects_negative_components() {
        assert!(parse_semver("-1.2.3").is_err());
    }

    #[test]
    fn lenient_parse_never_fails() {
        assert_eq!(
            parse_semver_lenient("not-a-version"),
            SemVer {
                major: 1,
                minor: 0,
                patch: 0
            }
        );
    }

    #[test]
    fn prerelease_detection() {
        assert!(!is_prerelease("1.0.0"));
        assert!(is_prerelease("1.0.0-alpha"));
        assert!(!is_prerelease("1.0.0+build.123"));
        assert!(is_prerelease("1.0.0-alpha+build.123"));
    }

    #[test]
    fn graduation_requires_matching_base() {
        assert!(is_graduation("1.0.0-alpha", "1.0.0"));
        assert!(!is_graduation("1.0.0-alpha", "1.1.0"));
        assert!(!is_graduation("1.0.0", "1.0.1"));
    }

    #[test]
    fn bump_variants() {
        assert_eq!(bump_version("1.2.3", BumpKind::Major).unwrap(), "2.0.0");
        assert_eq!(bump_version("1.2.3", BumpKind::Minor).unwrap(), "1.3.0");
        assert_eq!(bump_version("1.2.3", BumpKind::Patch).unwrap(), "1.2.4");
    }

    #[test]
    fn compute_next_version_rules() {
        assert_eq!(
            compute_next_version(None, true, ChangeType::Minor).unwrap(),
            INITIAL_VERSION
        );
        assert_eq!(
            compute_next_version(Some("1.0.0"), false, ChangeType::Minor).unwrap(),
            "2.0.0"
        );
        assert_eq!(
            compute_next_version(Some("1.0.0"), true, ChangeType::Major).unwrap(),
            "1.1.0"
        );
        assert_eq!(
            compute_next_version(Some("1.0.0"), true, ChangeType::Patch).unwrap(),
            "1.0.1"
        );
    }
}
