//! Package registry abstraction
//!
//! Two protocol variants sit behind one trait: the v2 in-memory index
//! (a `registry.json` file at the cache root carrying per-version
//! valid/invalid status and dependency lists) and the v1 network-backed
//! protocol (release lists fetched per package, dependencies read from
//! the cached elm.json of each version). The solver only ever sees
//! valid versions, newest first.
//!
//! # Examples
//!
//! ```
//! use elmpm::registry::{IndexedRegistry, Registry, VersionStatus};
//! use elmpm::package::PackageName;
//! use elmpm::version::Version;
//!
//! let mut registry = IndexedRegistry::new();
//! let pkg = PackageName::parse("elm/core").unwrap();
//! registry.add(&pkg, Version::new(1, 0, 5), VersionStatus::Valid, &[]);
//! registry.add(&pkg, Version::new(1, 0, 0), VersionStatus::Invalid, &[]);
//! assert_eq!(registry.versions(&pkg).unwrap(), vec![Version::new(1, 0, 5)]);
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::cache::PackageCache;
use crate::error::{Error, Result};
use crate::flags;
use crate::package::PackageName;
use crate::registry_http::HttpClient;
use crate::version::{Version, VersionRange};

/// Per-version registry status. Invalid versions are filtered out
/// before the solver sees them, as if they did not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStatus {
    Valid,
    Invalid,
}

/// The registry operations the solver driver depends on.
pub trait Registry {
    /// Whether the package exists at all.
    fn find(&self, pkg: &PackageName) -> Result<bool>;

    /// Valid versions, newest first.
    fn versions(&self, pkg: &PackageName) -> Result<Vec<Version>>;

    /// Declared dependencies of one version.
    fn dependencies_of(
        &self,
        pkg: &PackageName,
        version: Version,
    ) -> Result<Vec<(PackageName, VersionRange)>>;

    /// Every known package name, for nearest-name suggestions. May be
    /// empty for protocols that cannot enumerate cheaply.
    fn known_packages(&self) -> Vec<PackageName>;
}

// ---------------------------------------------------------------------------
// v2: in-memory indexed registry

#[derive(Debug, Clone)]
struct IndexedVersion {
    version: Version,
    status: VersionStatus,
    dependencies: Vec<(PackageName, VersionRange)>,
}

/// The v2 protocol: a fully in-memory index loaded from
/// `registry.json`, versions newest first per package.
#[derive(Debug, Clone, Default)]
pub struct IndexedRegistry {
    entries: BTreeMap<PackageName, Vec<IndexedVersion>>,
}

#[derive(Deserialize)]
struct RawIndexedVersion {
    version: String,
    #[serde(default = "default_status")]
    status: String,
    #[serde(default)]
    dependencies: BTreeMap<String, String>,
}

fn default_status() -> String {
    "valid".to_string()
}

impl IndexedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `registry.json` from the cache root.
    pub fn load(path: &Path) -> Result<Self> {
        let file = path.display().to_string();
        let content = fs::read_to_string(path)?;
        let raw: BTreeMap<String, Vec<RawIndexedVersion>> = serde_json::from_str(&content)
            .map_err(|e| Error::parse(&file, format!("invalid registry index: {}", e)))?;

        let mut entries = BTreeMap::new();
        for (name, versions) in raw {
            let pkg = PackageName::parse(&name)
                .ok_or_else(|| Error::parse(&file, format!("invalid package name \"{}\"", name)))?;
            let mut indexed = Vec::with_capacity(versions.len());
            for raw_version in versions {
                let version = Version::parse(&raw_version.version).ok_or_else(|| {
                    Error::parse(
                        &file,
                        format!("invalid version \"{}\" for {}", raw_version.version, pkg),
                    )
                })?;
                let status = match raw_version.status.as_str() {
                    "valid" => VersionStatus::Valid,
                    "invalid" => VersionStatus::Invalid,
                    other => {
                        return Err(Error::parse(
                            &file,
                            format!("unknown status \"{}\" for {} {}", other, pkg, version),
                        ))
                    }
                };
                let mut dependencies = Vec::new();
                for (dep_name, constraint) in &raw_version.dependencies {
                    let dep = PackageName::parse(dep_name).ok_or_else(|| {
                        Error::parse(&file, format!("invalid package name \"{}\"", dep_name))
                    })?;
                    let range = VersionRange::parse_constraint(constraint).ok_or_else(|| {
                        Error::parse(
                            &file,
                            format!("invalid constraint \"{}\" for {}", constraint, dep),
                        )
                    })?;
                    dependencies.push((dep, range));
                }
                indexed.push(IndexedVersion {
                    version,
                    status,
                    dependencies,
                });
            }
            // Newest first regardless of file order.
            indexed.sort_by(|a, b| b.version.cmp(&a.version));
            entries.insert(pkg, indexed);
        }
        Ok(Self { entries })
    }

    /// Insert one version record, keeping the list newest first.
    pub fn add(
        &mut self,
        pkg: &PackageName,
        version: Version,
        status: VersionStatus,
        dependencies: &[(PackageName, VersionRange)],
    ) {
        let versions = self.entries.entry(pkg.clone()).or_default();
        versions.push(IndexedVersion {
            version,
            status,
            dependencies: dependencies.to_vec(),
        });
        versions.sort_by(|a, b| b.version.cmp(&a.version));
    }
}

impl Registry for IndexedRegistry {
    fn find(&self, pkg: &PackageName) -> Result<bool> {
        Ok(self.entries.contains_key(pkg))
    }

    fn versions(&self, pkg: &PackageName) -> Result<Vec<Version>> {
        Ok(self
            .entries
            .get(pkg)
            .map(|versions| {
                versions
                    .iter()
                    .filter(|v| v.status == VersionStatus::Valid)
                    .map(|v| v.version)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn dependencies_of(
        &self,
        pkg: &PackageName,
        version: Version,
    ) -> Result<Vec<(PackageName, VersionRange)>> {
        self.entries
            .get(pkg)
            .and_then(|versions| versions.iter().find(|v| v.version == version))
            .map(|v| v.dependencies.clone())
            .ok_or_else(|| Error::InvalidPackage(format!("{} {}", pkg, version)))
    }

    fn known_packages(&self) -> Vec<PackageName> {
        self.entries.keys().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// v1: network-backed registry

/// The v1 protocol: release lists fetched from the package site,
/// dependencies read from each version's cached elm.json (fetching it
/// on first use).
pub struct OnlineRegistry {
    http: HttpClient,
    cache: PackageCache,
    releases: RefCell<HashMap<PackageName, Vec<Version>>>,
}

impl OnlineRegistry {
    pub fn new(http: HttpClient, cache: PackageCache) -> Self {
        Self {
            http,
            cache,
            releases: RefCell::new(HashMap::new()),
        }
    }

    fn releases_of(&self, pkg: &PackageName) -> Result<Vec<Version>> {
        if let Some(releases) = self.releases.borrow().get(pkg) {
            return Ok(releases.clone());
        }
        let releases = self.http.releases(pkg)?;
        self.releases
            .borrow_mut()
            .insert(pkg.clone(), releases.clone());
        Ok(releases)
    }
}

impl Registry for OnlineRegistry {
    fn find(&self, pkg: &PackageName) -> Result<bool> {
        Ok(!self.releases_of(pkg)?.is_empty())
    }

    fn versions(&self, pkg: &PackageName) -> Result<Vec<Version>> {
        self.releases_of(pkg)
    }

    fn dependencies_of(
        &self,
        pkg: &PackageName,
        version: Version,
    ) -> Result<Vec<(PackageName, VersionRange)>> {
        if !self.cache.is_cached(pkg, version) {
            self.http.fetch_manifest(pkg, version, &self.cache)?;
        }
        self.cache.dependencies_of(pkg, version)
    }

    fn known_packages(&self) -> Vec<PackageName> {
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// Protocol selection

pub enum RegistryClient {
    Indexed(IndexedRegistry),
    Online(OnlineRegistry),
}

impl RegistryClient {
    /// Pick a protocol from the environment: the v2 index when
    /// `registry.json` is present (or v1 is not forced), otherwise the
    /// network-backed v1 client. Offline mode with no usable index is
    /// a hard `NO_OFFLINE_SOLUTION`.
    pub fn from_env(cache: &PackageCache) -> Result<Self> {
        let index_path = cache.root().join("registry.json");
        if !flags::registry_v1() && index_path.exists() {
            return Ok(RegistryClient::Indexed(IndexedRegistry::load(&index_path)?));
        }
        if flags::offline() {
            return Err(Error::NoOfflineSolution);
        }
        let http = HttpClient::new(crate::registry_http::DEFAULT_REGISTRY_URL)?;
        Ok(RegistryClient::Online(OnlineRegistry::new(
            http,
            cache.clone(),
        )))
    }
}

impl Registry for RegistryClient {
    fn find(&self, pkg: &PackageName) -> Result<bool> {
        match self {
            RegistryClient::Indexed(registry) => registry.find(pkg),
            RegistryClient::Online(registry) => registry.find(pkg),
        }
    }

    fn versions(&self, pkg: &PackageName) -> Result<Vec<Version>> {
        match self {
            RegistryClient::Indexed(registry) => registry.versions(pkg),
            RegistryClient::Online(registry) => registry.versions(pkg),
        }
    }

    fn dependencies_of(
        &self,
        pkg: &PackageName,
        version: Version,
    ) -> Result<Vec<(PackageName, VersionRange)>> {
        match self {
            RegistryClient::Indexed(registry) => registry.dependencies_of(pkg, version),
            RegistryClient::Online(registry) => registry.dependencies_of(pkg, version),
        }
    }

    fn known_packages(&self) -> Vec<PackageName> {
        match self {
            RegistryClient::Indexed(registry) => registry.known_packages(),
            RegistryClient::Online(registry) => registry.known_packages(),
        }
    }
}
