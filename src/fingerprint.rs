//! Artifact fingerprint files (`artifacts.dat`)
//!
//! A fingerprint describes the dependency versions a package was last
//! built against: a set of maps from package identity to version. A
//! stored artifact is fresh iff at least one stored map equals the
//! expected fingerprint as a set of entries, order never mattering.
//!
//! Binary layout, big-endian throughout:
//!
//! ```text
//! set_size               : u64
//! for each fingerprint:
//!   map_size             : u64
//!   for each entry:
//!     author_len         : u8, author bytes
//!     project_len        : u8, project bytes
//!     version            : 0xFF marker + 3 x u16, or 3 x u8 compact
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::package::PackageName;
use crate::version::Version;

/// One dependency-version map. `BTreeMap` equality is exactly the
/// set-of-entries equality freshness needs.
pub type Fingerprint = BTreeMap<PackageName, Version>;

const MAX_FINGERPRINTS: u64 = 1000;
const MAX_ENTRIES: u64 = 1000;
const EXTENDED_MARKER: u8 = 0xFF;

/// Freshness of a package's stored build artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    Present,
    Stale,
    Missing,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Present => "present",
            ArtifactStatus::Stale => "stale",
            ArtifactStatus::Missing => "missing",
        }
    }
}

/// The decoded contents of an `artifacts.dat` file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArtifactFingerprint {
    pub fingerprints: Vec<Fingerprint>,
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        if self.offset + count > self.bytes.len() {
            return Err(Error::parse("artifacts.dat", "unexpected end of file"));
        }
        let slice = &self.bytes[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        let mut array = [0u8; 8];
        array.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(array))
    }
}

impl ArtifactFingerprint {
    /// Decode a fingerprint file. Bound violations, malformed names,
    /// early EOF, and trailing bytes are all parse errors.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader { bytes, offset: 0 };

        let set_size = reader.u64()?;
        if set_size > MAX_FINGERPRINTS {
            return Err(Error::parse(
                "artifacts.dat",
                format!("fingerprint set of {} exceeds the {} cap", set_size, MAX_FINGERPRINTS),
            ));
        }

        let mut fingerprints = Vec::with_capacity(set_size as usize);
        for _ in 0..set_size {
            let map_size = reader.u64()?;
            if map_size > MAX_ENTRIES {
                return Err(Error::parse(
                    "artifacts.dat",
                    format!("fingerprint map of {} exceeds the {} cap", map_size, MAX_ENTRIES),
                ));
            }
            let mut map = Fingerprint::new();
            for _ in 0..map_size {
                let author_len = reader.u8()? as usize;
                let author = reader.take(author_len)?;
                let project_len = reader.u8()? as usize;
                let project = reader.take(project_len)?;
                let spec = format!(
                    "{}/{}",
                    String::from_utf8_lossy(author),
                    String::from_utf8_lossy(project)
                );
                let pkg = PackageName::parse(&spec).ok_or_else(|| {
                    Error::parse("artifacts.dat", format!("invalid package name \"{}\"", spec))
                })?;

                let version = if reader.bytes.get(reader.offset) == Some(&EXTENDED_MARKER) {
                    reader.u8()?;
                    Version::new(reader.u16()?, reader.u16()?, reader.u16()?)
                } else {
                    Version::new(
                        reader.u8()? as u16,
                        reader.u8()? as u16,
                        reader.u8()? as u16,
                    )
                };
                map.insert(pkg, version);
            }
            fingerprints.push(map);
        }

        if reader.offset != bytes.len() {
            return Err(Error::parse("artifacts.dat", "trailing bytes after fingerprint set"));
        }
        Ok(Self { fingerprints })
    }

    /// Encode to the on-disk layout. Versions use the compact three
    /// byte form whenever the major component stays clear of the
    /// extended marker and everything fits in a byte.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.fingerprints.len() as u64).to_be_bytes());
        for map in &self.fingerprints {
            out.extend_from_slice(&(map.len() as u64).to_be_bytes());
            for (pkg, version) in map {
                out.push(pkg.author.len() as u8);
                out.extend_from_slice(pkg.author.as_bytes());
                out.push(pkg.name.len() as u8);
                out.extend_from_slice(pkg.name.as_bytes());
                let compact = version.major < EXTENDED_MARKER as u16
                    && version.minor <= u8::MAX as u16
                    && version.patch <= u8::MAX as u16;
                if compact {
                    out.push(version.major as u8);
                    out.push(version.minor as u8);
                    out.push(version.patch as u8);
                } else {
                    out.push(EXTENDED_MARKER);
                    out.extend_from_slice(&version.major.to_be_bytes());
                    out.extend_from_slice(&version.minor.to_be_bytes());
                    out.extend_from_slice(&version.patch.to_be_bytes());
                }
            }
        }
        out
    }

    /// Whether any stored map equals `expected` as a set of entries.
    pub fn matches(&self, expected: &Fingerprint) -> bool {
        self.fingerprints.iter().any(|map| map == expected)
    }
}

/// Freshness of the artifact at `path` against the expected
/// fingerprint. A missing file is `Missing`; an unreadable or
/// unparseable file is soft-degraded to `Stale`.
pub fn artifact_status(path: &Path, expected: &Fingerprint) -> ArtifactStatus {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return ArtifactStatus::Missing,
        Err(_) => return ArtifactStatus::Stale,
    };
    match ArtifactFingerprint::parse(&bytes) {
        Ok(stored) if stored.matches(expected) => ArtifactStatus::Present,
        _ => ArtifactStatus::Stale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(s: &str) -> PackageName {
        PackageName::parse(s).unwrap()
    }

    fn v(major: u16, minor: u16, patch: u16) -> Version {
        Version::new(major, minor, patch)
    }

    fn fingerprint(entries: &[(&str, Version)]) -> Fingerprint {
        entries
            .iter()
            .map(|(name, version)| (pkg(name), *version))
            .collect()
    }

    #[test]
    fn test_round_trip_compact_and_extended() {
        let set = ArtifactFingerprint {
            fingerprints: vec![
                fingerprint(&[("elm/core", v(1, 0, 5)), ("elm/json", v(1, 1, 3))]),
                fingerprint(&[("author/big", v(300, 2, 65535))]),
                fingerprint(&[("edge/case", v(255, 0, 0)), ("edge/other", v(254, 255, 255))]),
                Fingerprint::new(),
            ],
        };
        let decoded = ArtifactFingerprint::parse(&set.encode()).unwrap();
        assert_eq!(decoded, set);
    }

    #[test]
    fn test_empty_set_round_trips() {
        let set = ArtifactFingerprint::default();
        assert_eq!(set.encode(), 0u64.to_be_bytes().to_vec());
        assert_eq!(ArtifactFingerprint::parse(&set.encode()).unwrap(), set);
    }

    #[test]
    fn test_early_eof_is_parse_error() {
        let set = ArtifactFingerprint {
            fingerprints: vec![fingerprint(&[("elm/core", v(1, 0, 5))])],
        };
        let bytes = set.encode();
        assert!(ArtifactFingerprint::parse(&bytes[..bytes.len() - 1]).is_err());
        assert!(ArtifactFingerprint::parse(&bytes[..4]).is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = ArtifactFingerprint::default().encode();
        bytes.push(0);
        assert!(ArtifactFingerprint::parse(&bytes).is_err());
    }

    #[test]
    fn test_set_size_cap() {
        let bytes = 1001u64.to_be_bytes().to_vec();
        assert!(ArtifactFingerprint::parse(&bytes).is_err());
    }

    #[test]
    fn test_map_size_cap() {
        let mut bytes = 1u64.to_be_bytes().to_vec();
        bytes.extend_from_slice(&1001u64.to_be_bytes());
        assert!(ArtifactFingerprint::parse(&bytes).is_err());
    }

    #[test]
    fn test_matching_ignores_entry_order() {
        let stored = ArtifactFingerprint {
            fingerprints: vec![fingerprint(&[
                ("elm/core", v(1, 0, 5)),
                ("elm/json", v(1, 1, 3)),
            ])],
        };
        let expected = fingerprint(&[("elm/json", v(1, 1, 3)), ("elm/core", v(1, 0, 5))]);
        assert!(stored.matches(&expected));
    }

    #[test]
    fn test_freshness_statuses() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("artifacts.dat");
        let expected = fingerprint(&[("a/b", v(1, 0, 0))]);

        // Missing file.
        assert_eq!(artifact_status(&path, &expected), ArtifactStatus::Missing);

        // Parseable but mismatching content.
        let stored = ArtifactFingerprint {
            fingerprints: vec![fingerprint(&[("a/b", v(2, 0, 0))])],
        };
        std::fs::write(&path, stored.encode()).unwrap();
        assert_eq!(artifact_status(&path, &expected), ArtifactStatus::Stale);

        // Matching content.
        let stored = ArtifactFingerprint {
            fingerprints: vec![
                fingerprint(&[("a/b", v(2, 0, 0))]),
                fingerprint(&[("a/b", v(1, 0, 0))]),
            ],
        };
        std::fs::write(&path, stored.encode()).unwrap();
        assert_eq!(artifact_status(&path, &expected), ArtifactStatus::Present);

        // Garbage degrades softly.
        std::fs::write(&path, b"not a fingerprint").unwrap();
        assert_eq!(artifact_status(&path, &expected), ArtifactStatus::Stale);
    }
}
