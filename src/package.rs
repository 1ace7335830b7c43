//! Package identity
//!
//! Packages are identified by an `author/name` pair, e.g. `elm/core`.
//! Both components must be non-empty printable ASCII, joined by exactly
//! one slash.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// An `author/name` package identity.
///
/// Ordering is author-then-name by byte comparison, matching the order
/// dependency maps are rendered in on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageName {
    pub author: String,
    pub name: String,
}

impl PackageName {
    pub fn new(author: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            name: name.into(),
        }
    }

    /// Parse an `author/name` spec.
    pub fn parse(s: &str) -> Option<Self> {
        let (author, name) = s.split_once('/')?;
        if author.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        let printable = |part: &str| part.bytes().all(|b| (0x21..=0x7e).contains(&b));
        if !printable(author) || !printable(name) {
            return None;
        }
        Some(Self::new(author, name))
    }
}

impl Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.author, self.name)
    }
}

impl FromStr for PackageName {
    type Err = InvalidPackageName;

    fn from_str(s: &str) -> std::result::Result<Self, InvalidPackageName> {
        PackageName::parse(s).ok_or_else(|| InvalidPackageName(s.to_string()))
    }
}

/// Error for a spec that is not a printable `author/name` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidPackageName(pub String);

impl Display for InvalidPackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid package name '{}', expected author/name", self.0)
    }
}

impl std::error::Error for InvalidPackageName {}

impl Serialize for PackageName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PackageName::parse(&s)
            .ok_or_else(|| de::Error::custom(format!("invalid package name '{}'", s)))
    }
}

/// Rank registry package names by edit distance to a misspelled spec,
/// for "did you mean" hints.
pub fn nearest_names<'a, I>(spec: &str, known: I, limit: usize) -> Vec<String>
where
    I: Iterator<Item = &'a PackageName>,
{
    let mut scored: Vec<(usize, String)> = known
        .map(|pkg| {
            let display = pkg.to_string();
            (edit_distance(spec, &display), display)
        })
        .filter(|(distance, _)| *distance <= 4)
        .collect();
    scored.sort();
    scored.truncate(limit);
    scored.into_iter().map(|(_, name)| name).collect()
}

fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<u8> = a.bytes().collect();
    let b: Vec<u8> = b.bytes().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}
