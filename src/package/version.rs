//! Version ordering for release tags and manifest versions.
//!
//! Rule, applied to both sides of a comparison:
//!
//! 1. Trim, and drop a leading `v`/`V` when a digit follows (`v1.2.0` -> `1.2.0`).
//! 2. Parse as semantic version.
//! 3. Otherwise coerce one to three dotted numeric components, padding the
//!    missing ones with zero and keeping any `-pre`/`+build` suffix
//!    (`1.2` -> `1.2.0`, `2-beta` -> `2.0.0-beta`).
//! 4. Anything else is an opaque tag.
//!
//! Semantic versions compare by precedence (major, minor, patch, then
//! pre-release, a release ranking above its pre-releases); build metadata is
//! ignored. Every semantic version ranks above every opaque tag, and opaque
//! tags compare lexicographically.

use semver::Version;
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone)]
pub enum PackageVersion {
    Semver { version: Version, raw: String },
    Tag(String),
}

impl PackageVersion {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let stripped = strip_v_prefix(trimmed);

        let parsed = Version::parse(stripped)
            .ok()
            .or_else(|| coerce(stripped));

        match parsed {
            Some(version) => PackageVersion::Semver {
                version,
                raw: trimmed.to_string(),
            },
            None => PackageVersion::Tag(trimmed.to_string()),
        }
    }

    pub fn is_semver(&self) -> bool {
        matches!(self, PackageVersion::Semver { .. })
    }
}

fn strip_v_prefix(s: &str) -> &str {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some('v' | 'V'), Some(d)) if d.is_ascii_digit() => &s[1..],
        _ => s,
    }
}

fn coerce(s: &str) -> Option<Version> {
    let split_at = s.find(['-', '+']).unwrap_or(s.len());
    let (core, suffix) = s.split_at(split_at);

    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty()
        || parts.len() > 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    let mut numbers = [0u64; 3];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        *slot = part.parse().ok()?;
    }
    Version::parse(&format!(
        "{}.{}.{}{}",
        numbers[0], numbers[1], numbers[2], suffix
    ))
    .ok()
}

fn cmp_semver(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch)
        .cmp(&(b.major, b.minor, b.patch))
        .then_with(|| match (a.pre.is_empty(), b.pre.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => a.pre.cmp(&b.pre),
        })
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        use PackageVersion::*;
        match (self, other) {
            (Semver { version: a, .. }, Semver { version: b, .. }) => cmp_semver(a, b),
            (Semver { .. }, Tag(_)) => Ordering::Greater,
            (Tag(_), Semver { .. }) => Ordering::Less,
            (Tag(a), Tag(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageVersion::Semver { raw, .. } => f.write_str(raw),
            PackageVersion::Tag(raw) => f.write_str(raw),
        }
    }
}

/// True when `remote` ranks strictly above `local`.
pub fn is_newer(remote: &str, local: &str) -> bool {
    PackageVersion::parse(remote) > PackageVersion::parse(local)
}
