use std::path::Path;

use anyhow::{bail, Result};
use elmpm::{build_plan, Manifest, PackageCache};

use super::confirm;

pub fn run(_json: bool, entries: Vec<String>) -> Result<()> {
    if entries.is_empty() {
        bail!("no entry files given; try: elmpm build src/Main.elm");
    }
    let manifest = Manifest::load(Path::new("elm.json"))?;
    let cache = PackageCache::from_env()?;
    let plan = build_plan::plan(Path::new("."), &manifest, &cache, &entries)?;

    // JSON is the plan's one output shape; --json is accepted for
    // explicitness. Human rendering lives under `build check`.
    print!("{}", plan.to_json());
    Ok(())
}

pub fn run_check(yes: bool, no: bool, entries: Vec<String>) -> Result<()> {
    if entries.is_empty() {
        bail!("no entry files given; try: elmpm build check src/Main.elm");
    }
    let manifest = Manifest::load(Path::new("elm.json"))?;
    let cache = PackageCache::from_env()?;
    let plan = build_plan::plan(Path::new("."), &manifest, &cache, &entries)?;

    print!("{}", plan.render_human());
    println!();

    if no {
        println!("Aborted.");
        return Ok(());
    }
    if !confirm("Proceed with this plan?", yes)? {
        println!("Aborted.");
        return Ok(());
    }
    println!("✓ Plan confirmed.");
    Ok(())
}
