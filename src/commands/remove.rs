use std::path::Path;

use anyhow::Result;
use elmpm::manifest::DepLocation;
use elmpm::{Manifest, PackageCache};

use super::{confirm, parse_spec};

pub fn run(package: String, yes: bool) -> Result<()> {
    let manifest_path = Path::new("elm.json");
    let mut manifest = Manifest::load(manifest_path)?;
    let (pkg, _) = parse_spec(&package)?;

    if manifest.find(&pkg) == DepLocation::None {
        println!("⚠ {} is not a dependency of this project", pkg);
        return Ok(());
    }

    println!("Here is my plan:");
    println!("  Remove {}", pkg);
    println!();
    if !confirm("Would you like me to update your elm.json accordingly?", yes)? {
        println!("Aborted.");
        return Ok(());
    }

    manifest.remove(&pkg);
    manifest.save(manifest_path)?;
    println!();
    println!("✓ Removed {} from elm.json", pkg);

    // Orphaned indirect dependencies are reported, never auto-pruned.
    if let Ok(cache) = PackageCache::from_env() {
        let orphans = manifest.find_orphaned_packages(&cache);
        if !orphans.is_empty() {
            println!();
            println!("Note: {} indirect dependencies are now unreachable:", orphans.len());
            for orphan in orphans {
                println!("  - {}", orphan);
            }
        }
    }
    Ok(())
}
