use std::path::Path;

use anyhow::Result;
use elmpm::{Manifest, PackageCache, RegistryClient, SolverDriver};

use super::install::{missing_after_plan, print_plan};
use super::{confirm, download_packages, parse_spec};

pub fn run(
    package: Option<String>,
    major: bool,
    major_ignore_test: bool,
    yes: bool,
) -> Result<()> {
    let manifest_path = Path::new("elm.json");
    let manifest = Manifest::load(manifest_path)?;
    let cache = PackageCache::from_env()?;
    let registry = RegistryClient::from_env(&cache)?;

    let target = match &package {
        Some(spec) => Some(parse_spec(spec)?.0),
        None => None,
    };

    let driver = SolverDriver::new(&registry);
    let plan = driver.upgrade(&manifest, target.as_ref(), major, major_ignore_test)?;

    if plan.is_noop() {
        println!("✓ All packages are up to date!");
        return Ok(());
    }

    print_plan(&plan);
    if !confirm("Would you like me to update your elm.json accordingly?", yes)? {
        println!("Aborted.");
        return Ok(());
    }

    let missing = missing_after_plan(&cache, &plan);
    download_packages(&cache, &missing)?;

    plan.manifest.save(manifest_path)?;
    println!();
    println!("✓ elm.json updated ({} changes)", plan.changes.len());
    Ok(())
}
