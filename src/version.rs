//! Version triples and version-range algebra
//!
//! Versions are `major.minor.patch` triples with a total lexicographic
//! order. Ranges are single intervals with independently
//! inclusive/exclusive/unbounded ends plus an explicit empty marker, so
//! `[v,v]` (exact) and `[v,v)` (empty) stay distinguishable.
//!
//! # Examples
//!
//! ```
//! use elmpm::version::{Version, VersionRange};
//!
//! let v = Version::parse("1.0.5").unwrap();
//! let range = VersionRange::until_next_major(v);
//! assert!(range.contains(Version::new(1, 9, 0)));
//! assert!(!range.contains(Version::new(2, 0, 0)));
//! assert_eq!(range.to_string(), "1.0.5 <= v < 2.0.0");
//! ```

use std::fmt::{self, Display};
use std::str::FromStr;

/// A semantic version triple with total lexicographic order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl Version {
    pub fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse from a strict `"X.Y.Z"` string.
    ///
    /// Components must be plain decimal `u16` values without leading
    /// zeros, signs, or surrounding whitespace, so `format(parse(s)) == s`
    /// for every accepted `s`.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split('.');
        let major = parse_component(parts.next()?)?;
        let minor = parse_component(parts.next()?)?;
        let patch = parse_component(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(major, minor, patch))
    }

    /// The smallest version of the next major release series.
    pub fn next_major(&self) -> Version {
        Version::new(self.major + 1, 0, 0)
    }

    /// The smallest version of the next minor release series.
    pub fn next_minor(&self) -> Version {
        Version::new(self.major, self.minor + 1, 0)
    }
}

fn parse_component(s: &str) -> Option<u16> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

impl Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = InvalidVersion;

    fn from_str(s: &str) -> std::result::Result<Self, InvalidVersion> {
        Version::parse(s).ok_or_else(|| InvalidVersion(s.to_string()))
    }
}

/// Error for a version string that is not a strict `X.Y.Z` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidVersion(pub String);

impl Display for InvalidVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid version '{}', expected X.Y.Z", self.0)
    }
}

impl std::error::Error for InvalidVersion {}

/// One end of a version range.
///
/// When `unbounded` is set the other fields are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionBound {
    pub version: Version,
    pub inclusive: bool,
    pub unbounded: bool,
}

impl VersionBound {
    pub fn inclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: true,
            unbounded: false,
        }
    }

    pub fn exclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: false,
            unbounded: false,
        }
    }

    pub fn unbounded() -> Self {
        Self {
            version: Version::new(0, 0, 0),
            inclusive: false,
            unbounded: true,
        }
    }
}

/// A single interval of versions.
///
/// Invariant: when non-empty and both ends bounded,
/// `lower.version <= upper.version`. The empty range is canonical (all
/// empty ranges compare equal) and matches no version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRange {
    pub lower: VersionBound,
    pub upper: VersionBound,
    pub is_empty: bool,
}

impl VersionRange {
    /// `[v, v]`, the unique canonical exact range for a version.
    pub fn exact(version: Version) -> Self {
        Self {
            lower: VersionBound::inclusive(version),
            upper: VersionBound::inclusive(version),
            is_empty: false,
        }
    }

    /// `[v, (major+1).0.0)`
    pub fn until_next_major(version: Version) -> Self {
        Self {
            lower: VersionBound::inclusive(version),
            upper: VersionBound::exclusive(version.next_major()),
            is_empty: false,
        }
    }

    /// `[v, major.(minor+1).0)`
    pub fn until_next_minor(version: Version) -> Self {
        Self {
            lower: VersionBound::inclusive(version),
            upper: VersionBound::exclusive(version.next_minor()),
            is_empty: false,
        }
    }

    /// The range matching every version.
    pub fn any() -> Self {
        Self {
            lower: VersionBound::unbounded(),
            upper: VersionBound::unbounded(),
            is_empty: false,
        }
    }

    /// `(v, unbounded)`: strictly newer than `v`, any major.
    pub fn above(version: Version) -> Self {
        Self {
            lower: VersionBound::exclusive(version),
            upper: VersionBound::unbounded(),
            is_empty: false,
        }
    }

    /// The canonical empty range.
    pub fn empty() -> Self {
        Self {
            lower: VersionBound::inclusive(Version::new(0, 0, 0)),
            upper: VersionBound::inclusive(Version::new(0, 0, 0)),
            is_empty: true,
        }
    }

    /// Caret range for programmatic callers; never parsed from a
    /// manifest.
    ///
    /// `^1.2.3` spans `[1.2.3, 2.0.0)`; with a zero major the span
    /// narrows to the next minor, and with a zero minor too, to the
    /// next patch.
    pub fn caret(version: Version) -> Self {
        let upper = if version.major > 0 {
            version.next_major()
        } else if version.minor > 0 {
            version.next_minor()
        } else {
            Version::new(0, 0, version.patch + 1)
        };
        Self {
            lower: VersionBound::inclusive(version),
            upper: VersionBound::exclusive(upper),
            is_empty: false,
        }
    }

    /// Parse constraint text from a manifest.
    ///
    /// Accepted forms are exactly `"X.Y.Z"` (an exact range) and
    /// `"X.Y.Z <= v < A.B.C"` with single spaces. Anything else,
    /// including trailing content or extra whitespace, is rejected.
    pub fn parse_constraint(s: &str) -> Option<Self> {
        if let Some(version) = Version::parse(s) {
            return Some(Self::exact(version));
        }
        let tokens: Vec<&str> = s.split(' ').collect();
        if tokens.len() != 5 || tokens[1] != "<=" || tokens[2] != "v" || tokens[3] != "<" {
            return None;
        }
        let lower = Version::parse(tokens[0])?;
        let upper = Version::parse(tokens[4])?;
        if upper < lower {
            return None;
        }
        Some(Self {
            lower: VersionBound::inclusive(lower),
            upper: VersionBound::exclusive(upper),
            is_empty: lower == upper,
        })
    }

    /// The version of an exact `[v, v]` range, if this is one.
    pub fn as_exact(&self) -> Option<Version> {
        if !self.is_empty
            && !self.lower.unbounded
            && !self.upper.unbounded
            && self.lower.inclusive
            && self.upper.inclusive
            && self.lower.version == self.upper.version
        {
            Some(self.lower.version)
        } else {
            None
        }
    }

    /// Membership test. Always false for the empty range.
    pub fn contains(&self, version: Version) -> bool {
        if self.is_empty {
            return false;
        }
        let above_lower = self.lower.unbounded
            || if self.lower.inclusive {
                version >= self.lower.version
            } else {
                version > self.lower.version
            };
        let below_upper = self.upper.unbounded
            || if self.upper.inclusive {
                version <= self.upper.version
            } else {
                version < self.upper.version
            };
        above_lower && below_upper
    }

    /// Intersection of two ranges.
    ///
    /// Commutative and associative; returns the canonical empty range
    /// when the tighter lower bound meets or crosses the tighter upper
    /// bound without an inclusive overlap (`[v,v)` and `(v,v]` are
    /// empty, `[v,v]` is not).
    pub fn intersect(&self, other: &VersionRange) -> VersionRange {
        if self.is_empty || other.is_empty {
            return VersionRange::empty();
        }
        let lower = tighter_lower(self.lower, other.lower);
        let upper = tighter_upper(self.upper, other.upper);
        if bounds_empty(lower, upper) {
            return VersionRange::empty();
        }
        VersionRange {
            lower,
            upper,
            is_empty: false,
        }
    }
}

fn tighter_lower(a: VersionBound, b: VersionBound) -> VersionBound {
    match (a.unbounded, b.unbounded) {
        (true, _) => b,
        (_, true) => a,
        _ => {
            if a.version > b.version {
                a
            } else if b.version > a.version {
                b
            } else if a.inclusive {
                // Same version: exclusive is the tighter lower bound.
                b
            } else {
                a
            }
        }
    }
}

fn tighter_upper(a: VersionBound, b: VersionBound) -> VersionBound {
    match (a.unbounded, b.unbounded) {
        (true, _) => b,
        (_, true) => a,
        _ => {
            if a.version < b.version {
                a
            } else if b.version < a.version {
                b
            } else if a.inclusive {
                b
            } else {
                a
            }
        }
    }
}

fn bounds_empty(lower: VersionBound, upper: VersionBound) -> bool {
    if lower.unbounded || upper.unbounded {
        return false;
    }
    if lower.version > upper.version {
        return true;
    }
    if lower.version == upper.version {
        return !(lower.inclusive && upper.inclusive);
    }
    false
}

impl Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty {
            return write!(f, "<empty>");
        }
        if let Some(version) = self.as_exact() {
            return write!(f, "{}", version);
        }
        match (self.lower.unbounded, self.upper.unbounded) {
            (true, true) => write!(f, "any"),
            (false, true) => {
                let op = if self.lower.inclusive { "<=" } else { "<" };
                write!(f, "{} {} v", self.lower.version, op)
            }
            (true, false) => {
                let op = if self.upper.inclusive { "<=" } else { "<" };
                write!(f, "v {} {}", op, self.upper.version)
            }
            (false, false) => {
                let lop = if self.lower.inclusive { "<=" } else { "<" };
                let uop = if self.upper.inclusive { "<=" } else { "<" };
                write!(
                    f,
                    "{} {} v {} {}",
                    self.lower.version, lop, uop, self.upper.version
                )
            }
        }
    }
}
