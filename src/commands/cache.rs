use std::path::Path;

use anyhow::Result;
use elmpm::{Manifest, PackageCache};

use super::{confirm, download_packages};

pub fn run_missing(yes: bool) -> Result<()> {
    let manifest = Manifest::load(Path::new("elm.json"))?;
    let cache = PackageCache::from_env()?;

    let pinned = match &manifest {
        Manifest::Application(_) => manifest.all_pinned(),
        Manifest::Package(package) => {
            // Package manifests declare ranges; check the lower bound
            // of each declared dependency.
            package
                .deps
                .iter()
                .chain(&package.test_deps)
                .map(|(pkg, range)| (pkg.clone(), range.range.lower.version))
                .collect()
        }
    };

    let missing = cache.missing(&pinned);
    if missing.is_empty() {
        println!("✓ All dependencies are in the cache.");
        return Ok(());
    }

    println!("Missing from the cache:");
    for (pkg, version) in &missing {
        println!("  - {} {}", pkg, version);
    }
    println!();
    if !confirm("Download them now?", yes)? {
        println!("Aborted.");
        return Ok(());
    }

    download_packages(&cache, &missing)?;
    println!();
    println!("✓ Downloaded {} packages", missing.len());
    Ok(())
}
