use std::path::Path;

use anyhow::Result;
use elmpm::manifest::DepLocation;
use elmpm::{
    Candidate, ChangePlan, Error, IndexedRegistry, Manifest, PackageCache, PackageChange,
    Registry, RegistryClient, SolverDriver, Strategy,
};

use super::{confirm, download_packages, parse_spec};

pub fn run(
    packages: Vec<String>,
    test: bool,
    upgrade_all: bool,
    major: Option<String>,
    yes: bool,
) -> Result<()> {
    let manifest_path = Path::new("elm.json");
    let manifest = Manifest::load(manifest_path)?;
    let cache = PackageCache::from_env()?;

    let mut requests: Vec<Candidate> = Vec::new();
    for spec in &packages {
        let (pkg, version) = parse_spec(spec)?;
        requests.push(Candidate { pkg, version });
    }
    let cross_major = major.is_some();
    if let Some(spec) = &major {
        let (pkg, version) = parse_spec(spec)?;
        if !requests.iter().any(|c| c.pkg == pkg) {
            requests.push(Candidate { pkg, version });
        }
    }
    if requests.is_empty() {
        println!("Nothing to install.");
        return Ok(());
    }

    // Promotions never need the registry, so a missing offline
    // registry only matters when something actually has to be solved.
    let needs_solver = requests
        .iter()
        .any(|request| manifest.find(&request.pkg) == DepLocation::None);
    let fallback;
    let registry: &dyn Registry = match RegistryClient::from_env(&cache) {
        Ok(client) => {
            fallback = RegistryHolder::Client(client);
            fallback.as_registry()
        }
        Err(Error::NoOfflineSolution) if !needs_solver => {
            fallback = RegistryHolder::Empty(IndexedRegistry::new());
            fallback.as_registry()
        }
        Err(e) => return Err(e.into()),
    };

    let driver = SolverDriver::new(registry);
    let plan = if upgrade_all {
        driver.plan_with_strategy(
            &manifest,
            &Strategy::UpgradableWithinMajor,
            &requests,
            test,
        )?
    } else {
        driver.install(&manifest, &requests, test, cross_major)?
    };

    if plan.is_noop() {
        println!("All requested packages are already installed.");
        return Ok(());
    }

    print_plan(&plan);
    if !confirm("Would you like me to update your elm.json accordingly?", yes)? {
        println!("Aborted.");
        return Ok(());
    }

    // Fetch before writing so a network failure leaves the manifest
    // untouched.
    let missing = missing_after_plan(&cache, &plan);
    download_packages(&cache, &missing)?;

    plan.manifest.save(manifest_path)?;
    println!();
    println!("✓ elm.json updated ({} changes)", plan.changes.len());
    Ok(())
}

enum RegistryHolder {
    Client(RegistryClient),
    Empty(IndexedRegistry),
}

impl RegistryHolder {
    fn as_registry(&self) -> &dyn Registry {
        match self {
            RegistryHolder::Client(client) => client,
            RegistryHolder::Empty(registry) => registry,
        }
    }
}

pub(crate) fn print_plan(plan: &ChangePlan) {
    println!("Here is my plan:");
    for change in &plan.changes {
        println!("  {}", change);
    }
    println!();
}

/// Packages the plan introduces or moves that are not yet cached.
pub(crate) fn missing_after_plan(
    cache: &PackageCache,
    plan: &ChangePlan,
) -> Vec<(elmpm::PackageName, elmpm::Version)> {
    plan.changes
        .iter()
        .filter_map(|change| match change {
            PackageChange::Add { pkg, version } => Some((pkg.clone(), *version)),
            PackageChange::Change { pkg, new, .. } => Some((pkg.clone(), *new)),
            _ => None,
        })
        .filter(|(pkg, version)| !cache.is_cached(pkg, *version))
        .collect()
}
