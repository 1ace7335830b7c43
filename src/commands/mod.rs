use std::io::Write;

use anyhow::Result;
use elmpm::registry_http::{HttpClient, DEFAULT_REGISTRY_URL};
use elmpm::{flags, Error, PackageCache, PackageName, Version};

pub mod build;
pub mod cache;
pub mod extract;
pub mod install;
pub mod remove;
pub mod upgrade;

/// Ask for confirmation; empty input means yes, `--yes` skips the
/// prompt entirely.
pub(crate) fn confirm(question: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    print!("{} [Y/n]: ", question);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    let answer = answer.trim();
    Ok(answer.is_empty() || answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

/// Parse a CLI package spec: `author/name` or `author/name@X.Y.Z`.
pub(crate) fn parse_spec(spec: &str) -> Result<(PackageName, Option<Version>)> {
    let (name_part, version) = match spec.split_once('@') {
        Some((name, version_text)) => {
            let version = Version::parse(version_text).ok_or_else(|| {
                Error::InvalidPackage(format!(
                    "\"{}\" has a malformed version \"{}\"",
                    spec, version_text
                ))
            })?;
            (name, Some(version))
        }
        None => (spec, None),
    };
    let pkg = PackageName::parse(name_part)
        .ok_or_else(|| Error::InvalidPackage(format!("\"{}\"", spec)))?;
    Ok((pkg, version))
}

/// Download every listed package version into the cache. Refuses in
/// offline mode; fails before anything else has been mutated.
pub(crate) fn download_packages(
    cache: &PackageCache,
    packages: &[(PackageName, Version)],
) -> Result<()> {
    if packages.is_empty() {
        return Ok(());
    }
    if flags::offline() {
        return Err(Error::NoOfflineSolution.into());
    }
    let http = HttpClient::new(DEFAULT_REGISTRY_URL)?;
    for (pkg, version) in packages {
        println!("  Downloading {} {}...", pkg, version);
        http.download_package(pkg, *version, cache)?;
    }
    Ok(())
}
