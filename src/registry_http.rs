//! HTTP collaborator for the v1 registry protocol
//!
//! All network traffic lives here: release lists, per-version elm.json
//! fetches, and package archive downloads. Transport failures map to
//! `Error::Network` so callers can surface them without partially
//! mutating any project state.

use std::collections::BTreeMap;
use std::fs;
use std::time::Duration;

use flate2::read::GzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use tar::Archive;

use crate::cache::PackageCache;
use crate::error::{Error, Result};
use crate::manifest::atomic_write;
use crate::package::PackageName;
use crate::version::Version;

pub const DEFAULT_REGISTRY_URL: &str = "https://package.elm-lang.org";

pub struct HttpClient {
    base: String,
    client: reqwest::blocking::Client,
}

fn net(e: reqwest::Error) -> Error {
    Error::Network(e.to_string())
}

impl HttpClient {
    pub fn new(base: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("elmpm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(net)?;
        let base = base.into().trim_end_matches('/').to_string();
        Ok(Self { base, client })
    }

    /// Release list for a package, newest first. An unknown package
    /// yields an empty list rather than an error.
    ///
    /// The endpoint returns `{"1.0.0": <published-at>, ...}`; only the
    /// version keys matter here.
    pub fn releases(&self, pkg: &PackageName) -> Result<Vec<Version>> {
        let url = format!(
            "{}/packages/{}/{}/releases.json",
            self.base, pkg.author, pkg.name
        );
        let response = self.client.get(&url).send().map_err(net)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(Error::Network(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }
        let releases: BTreeMap<String, u64> = response.json().map_err(net)?;
        let mut versions: Vec<Version> = releases
            .keys()
            .filter_map(|key| Version::parse(key))
            .collect();
        versions.sort_by(|a, b| b.cmp(a));
        Ok(versions)
    }

    /// Fetch one version's elm.json into the cache.
    pub fn fetch_manifest(
        &self,
        pkg: &PackageName,
        version: Version,
        cache: &PackageCache,
    ) -> Result<()> {
        let url = format!(
            "{}/packages/{}/{}/{}/elm.json",
            self.base, pkg.author, pkg.name, version
        );
        let response = self.client.get(&url).send().map_err(net)?;
        if !response.status().is_success() {
            return Err(Error::Network(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }
        let body = response.text().map_err(net)?;
        // Reject garbage before it lands in the cache.
        serde_json::from_str::<serde_json::Value>(&body)
            .map_err(|e| Error::parse(&url, format!("invalid elm.json: {}", e)))?;

        let path = cache.manifest_path(pkg, version);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        atomic_write(&path, body.as_bytes())
    }

    /// Download and unpack one version's archive into the cache.
    pub fn download_package(
        &self,
        pkg: &PackageName,
        version: Version,
        cache: &PackageCache,
    ) -> Result<()> {
        let url = format!(
            "{}/packages/{}/{}/{}/package.tar.gz",
            self.base, pkg.author, pkg.name, version
        );
        let response = self.client.get(&url).send().map_err(net)?;
        if !response.status().is_success() {
            return Err(Error::Network(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }

        let bar = match response.content_length() {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::default_bar()
                        .template("{spinner:.green} {msg} {bytes}/{total_bytes}")
                        .unwrap(),
                );
                bar
            }
            None => ProgressBar::new_spinner(),
        };
        bar.set_message(format!("{} {}", pkg, version));

        let target = cache.package_dir(pkg, version);
        let staging = target.with_extension("staging");
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let unpack_result = (|| -> Result<()> {
            let reader = bar.wrap_read(response);
            let mut archive = Archive::new(GzDecoder::new(reader));
            archive.unpack(&staging)?;
            Ok(())
        })();
        if let Err(e) = unpack_result {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }
        bar.finish_and_clear();

        // Archives carry a single top-level directory; find the level
        // holding elm.json and move it into place.
        let root = if staging.join("elm.json").exists() {
            staging.clone()
        } else {
            let mut found = None;
            for entry in fs::read_dir(&staging)? {
                let path = entry?.path();
                if path.is_dir() && path.join("elm.json").exists() {
                    found = Some(path);
                    break;
                }
            }
            match found {
                Some(path) => path,
                None => {
                    let _ = fs::remove_dir_all(&staging);
                    return Err(Error::parse(
                        &url,
                        "archive does not contain an elm.json".to_string(),
                    ));
                }
            }
        };

        if target.exists() {
            fs::remove_dir_all(&target)?;
        }
        fs::rename(&root, &target)
            .map_err(|e| Error::Fs(format!("failed to move {} into place: {}", pkg, e)))?;
        if root != staging && staging.exists() {
            let _ = fs::remove_dir_all(&staging);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_releases_sorted_newest_first() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/packages/elm/core/releases.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"1.0.0": 1, "1.0.5": 3, "1.0.2": 2}"#)
            .create();

        let client = HttpClient::new(server.url()).unwrap();
        let pkg = PackageName::parse("elm/core").unwrap();
        let versions = client.releases(&pkg).unwrap();
        assert_eq!(
            versions,
            vec![
                Version::new(1, 0, 5),
                Version::new(1, 0, 2),
                Version::new(1, 0, 0)
            ]
        );
        mock.assert();
    }

    #[test]
    fn test_releases_unknown_package_is_empty() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/packages/no/where/releases.json")
            .with_status(404)
            .create();

        let client = HttpClient::new(server.url()).unwrap();
        let pkg = PackageName::parse("no/where").unwrap();
        assert_eq!(client.releases(&pkg).unwrap(), vec![]);
    }

    #[test]
    fn test_fetch_manifest_writes_into_cache() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/packages/elm/core/1.0.5/elm.json")
            .with_status(200)
            .with_body(
                r#"{
                    "type": "package",
                    "name": "elm/core",
                    "summary": "core",
                    "license": "BSD-3-Clause",
                    "version": "1.0.5",
                    "exposed-modules": ["Basics"],
                    "elm-version": "0.19.0 <= v < 0.20.0",
                    "dependencies": {},
                    "test-dependencies": {}
                }"#,
            )
            .create();

        let tmp = tempfile::tempdir().unwrap();
        let cache = PackageCache::new(tmp.path());
        let client = HttpClient::new(server.url()).unwrap();
        let pkg = PackageName::parse("elm/core").unwrap();
        client
            .fetch_manifest(&pkg, Version::new(1, 0, 5), &cache)
            .unwrap();
        assert!(cache.is_cached(&pkg, Version::new(1, 0, 5)));
        assert_eq!(
            cache
                .exposed_modules_of(&pkg, Version::new(1, 0, 5))
                .unwrap(),
            vec!["Basics"]
        );
    }
}
