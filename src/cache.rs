//! The on-disk package cache
//!
//! `ELM_HOME` locates the cache root (falling back to `~/.elm`), with
//! one directory per installed package version:
//! `packages/<author>/<name>/<version>/`. Each version directory holds
//! the package's own `elm.json` and, after a build, its
//! `artifacts.dat`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::manifest::{Manifest, PackageManifest};
use crate::package::PackageName;
use crate::version::{Version, VersionRange};

#[derive(Debug, Clone)]
pub struct PackageCache {
    root: PathBuf,
}

impl PackageCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Cache root from `ELM_HOME`, or `~/.elm` when unset.
    pub fn from_env() -> Result<Self> {
        if let Ok(home) = std::env::var("ELM_HOME") {
            return Ok(Self::new(home));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Fs("could not determine the home directory".to_string()))?;
        Ok(Self::new(home.join(".elm")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `packages/<author>/<name>/<version>/`
    pub fn package_dir(&self, pkg: &PackageName, version: Version) -> PathBuf {
        self.root
            .join("packages")
            .join(&pkg.author)
            .join(&pkg.name)
            .join(version.to_string())
    }

    pub fn manifest_path(&self, pkg: &PackageName, version: Version) -> PathBuf {
        self.package_dir(pkg, version).join("elm.json")
    }

    pub fn artifacts_path(&self, pkg: &PackageName, version: Version) -> PathBuf {
        self.package_dir(pkg, version).join("artifacts.dat")
    }

    /// A package version counts as cached once its elm.json is present.
    pub fn is_cached(&self, pkg: &PackageName, version: Version) -> bool {
        self.manifest_path(pkg, version).exists()
    }

    /// Load the cached elm.json of a package version.
    pub fn load_manifest(&self, pkg: &PackageName, version: Version) -> Result<PackageManifest> {
        let path = self.manifest_path(pkg, version);
        match Manifest::load(&path)? {
            Manifest::Package(manifest) => Ok(manifest),
            Manifest::Application(_) => Err(Error::parse(
                path.display().to_string(),
                format!("{} {} is not a package manifest", pkg, version),
            )),
        }
    }

    /// Declared dependencies of a cached package version.
    pub fn dependencies_of(
        &self,
        pkg: &PackageName,
        version: Version,
    ) -> Result<Vec<(PackageName, VersionRange)>> {
        let manifest = self.load_manifest(pkg, version)?;
        Ok(manifest
            .deps
            .iter()
            .map(|(dep, range)| (dep.clone(), range.range))
            .collect())
    }

    /// Modules a cached package version exposes.
    pub fn exposed_modules_of(&self, pkg: &PackageName, version: Version) -> Result<Vec<String>> {
        let manifest = self.load_manifest(pkg, version)?;
        Ok(manifest
            .exposed_modules
            .names()
            .into_iter()
            .map(str::to_string)
            .collect())
    }

    /// Versions of a package already present in the cache, newest first.
    pub fn cached_versions(&self, pkg: &PackageName) -> Vec<Version> {
        let dir = self.root.join("packages").join(&pkg.author).join(&pkg.name);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        let mut versions: Vec<Version> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().to_str().and_then(Version::parse))
            .filter(|version| self.is_cached(pkg, *version))
            .collect();
        versions.sort_by(|a, b| b.cmp(a));
        versions
    }

    /// Pinned dependencies whose elm.json is not yet in the cache,
    /// sorted by package name.
    pub fn missing(&self, pinned: &BTreeMap<PackageName, Version>) -> Vec<(PackageName, Version)> {
        pinned
            .iter()
            .filter(|(pkg, version)| !self.is_cached(pkg, **version))
            .map(|(pkg, version)| (pkg.clone(), *version))
            .collect()
    }
}
