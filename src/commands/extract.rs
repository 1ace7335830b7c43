use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Result};
use elmpm::elm_module::{parse_skeleton, ModuleSkeleton};
use elmpm::manifest::{
    ExposedModules, Manifest, PackageManifest, RangeText,
};
use elmpm::module_graph::ModulePackageIndex;
use elmpm::{PackageCache, PackageName, Version};

/// Extract a selection of modules into a new local package.
///
/// The selection must be closed over project-local imports: a selected
/// module importing a project module outside the selection is an error
/// and nothing is written.
pub fn run(package: String, target: String, paths: Vec<String>) -> Result<()> {
    if paths.is_empty() {
        bail!("no source files given; try: elmpm extract me/widgets ../widgets src/Widgets.elm");
    }
    let pkg = PackageName::parse(&package)
        .ok_or_else(|| anyhow!("invalid package name \"{}\"", package))?;

    let manifest_path = Path::new("elm.json");
    let manifest = Manifest::load(manifest_path)?;
    let app = match &manifest {
        Manifest::Application(app) => app,
        Manifest::Package(_) => bail!("extract only works inside an application project"),
    };
    let project_root = Path::new(".");
    let source_dirs = manifest.source_directories();

    // Parse the selection.
    let mut selection: BTreeMap<String, (String, ModuleSkeleton)> = BTreeMap::new();
    for path in &paths {
        let source = fs::read_to_string(project_root.join(path))
            .map_err(|e| anyhow!("cannot read {}: {}", path, e))?;
        let skeleton = parse_skeleton(&source, path)?;
        selection.insert(skeleton.name.clone(), (path.clone(), skeleton));
    }

    // A selected module must not import a project module that stays
    // behind.
    let mut leaks: Vec<String> = Vec::new();
    for (name, (_, skeleton)) in &selection {
        for import in &skeleton.imports {
            if selection.contains_key(import) {
                continue;
            }
            if is_local_module(project_root, &source_dirs, import) {
                leaks.push(format!(
                    "{} imports {}, which is outside the selection",
                    name, import
                ));
            }
        }
    }
    if !leaks.is_empty() {
        bail!(
            "cannot extract, the selection is not self-contained:\n  {}",
            leaks.join("\n  ")
        );
    }

    // Dependencies of the new package: the owners of every external
    // import, constrained from the versions the application pins.
    let cache = PackageCache::from_env()?;
    let pinned = manifest.all_pinned();
    let index = ModulePackageIndex::build(&cache, &pinned);
    let mut deps: BTreeMap<PackageName, RangeText> = BTreeMap::new();
    let core = PackageName::new("elm", "core");
    if let Some(core_version) = pinned.get(&core) {
        deps.insert(core.clone(), RangeText::pinned(*core_version));
    }
    for (_, (path, skeleton)) in &selection {
        for import in &skeleton.imports {
            if selection.contains_key(import) {
                continue;
            }
            match index.lookup(import) {
                Some(owner) => {
                    if let Some(version) = pinned.get(owner) {
                        deps.entry(owner.clone())
                            .or_insert_with(|| RangeText::pinned(*version));
                    }
                }
                None => bail!(
                    "{} (in {}) imports {}, which no project package exposes",
                    skeleton.name,
                    path,
                    import
                ),
            }
        }
    }

    // Materialize the new package.
    let target_dir = Path::new(&target);
    let new_version = Version::new(1, 0, 0);
    let exposed: Vec<String> = selection.keys().cloned().collect();
    let new_manifest = Manifest::Package(PackageManifest {
        name: pkg.clone(),
        summary: Some("Modules extracted from this application".to_string()),
        license: app
            .extra
            .iter()
            .find(|(key, _)| key == "license")
            .and_then(|(_, value)| value.as_str().map(str::to_string))
            .or_else(|| Some("BSD-3-Clause".to_string())),
        version: new_version,
        exposed_modules: ExposedModules::List(exposed),
        elm_version: "0.19.0 <= v < 0.20.0".to_string(),
        deps,
        test_deps: BTreeMap::new(),
        extra: Vec::new(),
    });

    fs::create_dir_all(target_dir.join("src"))
        .map_err(|e| anyhow!("cannot create {}: {}", target_dir.display(), e))?;
    for (name, (path, _)) in &selection {
        let destination = target_dir
            .join("src")
            .join(format!("{}.elm", name.replace('.', "/")));
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(project_root.join(path), &destination)
            .map_err(|e| anyhow!("cannot copy {}: {}", path, e))?;
    }
    new_manifest.save(&target_dir.join("elm.json"))?;

    // Register the extraction as a local-dev dependency of the
    // application.
    let mut updated = manifest.clone();
    updated.add_or_update(&pkg, new_version, false, true, true);
    if let Manifest::Application(app) = &mut updated {
        let entry = app
            .extra
            .iter_mut()
            .find(|(key, _)| key == "local-dependencies");
        match entry {
            Some((_, value)) => {
                if let Some(map) = value.as_object_mut() {
                    map.insert(pkg.to_string(), serde_json::Value::String(target.clone()));
                }
            }
            None => {
                let mut map = serde_json::Map::new();
                map.insert(pkg.to_string(), serde_json::Value::String(target.clone()));
                app.extra.push((
                    "local-dependencies".to_string(),
                    serde_json::Value::Object(map),
                ));
            }
        }
    }
    updated.save(manifest_path)?;

    println!("✓ Extracted {} modules into {}", selection.len(), target);
    println!("✓ {} registered as a local dependency", pkg);
    Ok(())
}

fn is_local_module(project_root: &Path, source_dirs: &[String], module: &str) -> bool {
    let relative = format!("{}.elm", module.replace('.', "/"));
    source_dirs.iter().any(|dir| {
        let candidate = if dir == "." {
            relative.clone()
        } else {
            format!("{}/{}", dir.trim_end_matches('/'), relative)
        };
        project_root.join(candidate).exists()
    })
}
