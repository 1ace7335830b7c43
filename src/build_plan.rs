//! Build plan construction and serialization
//!
//! Composes the manifest, the package cache, and the module graph into
//! a compile-time plan: package topological order with per-package
//! artifact freshness, local module build order, and parallel batches.
//! The plan is pure: nothing on disk changes while it is computed.

use std::collections::{BTreeMap, BinaryHeap};
use std::cmp::Reverse;
use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;

use crate::cache::PackageCache;
use crate::error::{Error, Result};
use crate::fingerprint::{artifact_status, ArtifactStatus, Fingerprint};
use crate::manifest::Manifest;
use crate::module_graph::{
    assign_levels, batches, discover, topo_order, ModulePackageIndex,
};
use crate::package::PackageName;
use crate::version::Version;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignModule {
    pub name: String,
    pub package: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPackage {
    pub name: String,
    pub version: String,
    pub path: String,
    pub deps: Vec<String>,
    pub artifact_status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanModule {
    pub name: String,
    pub path: String,
    pub deps: Vec<String>,
    pub has_main: bool,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanBatch {
    pub level: i32,
    pub count: usize,
    pub modules: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanProblem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub packages_total: usize,
    pub packages_stale: usize,
    pub packages_missing: usize,
    pub modules_total: usize,
    pub batch_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildPlan {
    pub root: String,
    pub src_dirs: Vec<String>,
    pub use_cached: bool,
    pub roots: Vec<String>,
    pub foreign_modules: Vec<ForeignModule>,
    pub package_build_order: Vec<PlanPackage>,
    pub build_order: Vec<PlanModule>,
    pub parallel_batches: Vec<PlanBatch>,
    pub problems: Vec<PlanProblem>,
    pub summary: PlanSummary,
}

impl BuildPlan {
    pub fn to_json(&self) -> String {
        let mut out = serde_json::to_string_pretty(self).expect("plan serialization cannot fail");
        out.push('\n');
        out
    }

    /// Human-readable rendering for `build check`.
    pub fn render_human(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Build plan for {}", self.root);
        let _ = writeln!(out);
        let _ = writeln!(out, "Packages ({}):", self.package_build_order.len());
        for pkg in &self.package_build_order {
            let glyph = match pkg.artifact_status.as_str() {
                "present" => "✓",
                "stale" => "⚠",
                _ => "✗",
            };
            let _ = writeln!(
                out,
                "  {} {} {} [{}]",
                glyph, pkg.name, pkg.version, pkg.artifact_status
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Modules ({}):", self.build_order.len());
        for batch in &self.parallel_batches {
            let _ = writeln!(
                out,
                "  level {} ({}): {}",
                batch.level,
                batch.count,
                batch.modules.join(", ")
            );
        }
        if !self.problems.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Problems:");
            for problem in &self.problems {
                match &problem.module {
                    Some(module) => {
                        let _ = writeln!(out, "  ✗ {}: {}", module, problem.message);
                    }
                    None => {
                        let _ = writeln!(out, "  ✗ {}", problem.message);
                    }
                }
            }
        }
        out
    }
}

/// Compute the build plan for a project.
pub fn plan(
    project_root: &Path,
    manifest: &Manifest,
    cache: &PackageCache,
    entries: &[String],
) -> Result<BuildPlan> {
    let pinned = pinned_versions(manifest, cache);

    // Package topological order.
    let deps_in_project = project_dependency_edges(&pinned, cache);
    let package_order = kahn_order(&pinned, &deps_in_project)?;

    let mut packages_stale = 0;
    let mut packages_missing = 0;
    let mut package_build_order = Vec::with_capacity(package_order.len());
    for pkg in &package_order {
        let version = pinned[pkg];
        let status = if cache.is_cached(pkg, version) {
            let expected: Fingerprint = deps_in_project
                .get(pkg)
                .map(|deps| {
                    deps.iter()
                        .filter_map(|dep| pinned.get(dep).map(|v| (dep.clone(), *v)))
                        .collect()
                })
                .unwrap_or_default();
            artifact_status(&cache.artifacts_path(pkg, version), &expected)
        } else {
            ArtifactStatus::Missing
        };
        match status {
            ArtifactStatus::Stale => packages_stale += 1,
            ArtifactStatus::Missing => packages_missing += 1,
            ArtifactStatus::Present => {}
        }
        package_build_order.push(PlanPackage {
            name: pkg.to_string(),
            version: version.to_string(),
            path: cache.package_dir(pkg, version).display().to_string(),
            deps: deps_in_project
                .get(pkg)
                .map(|deps| deps.iter().map(PackageName::to_string).collect())
                .unwrap_or_default(),
            artifact_status: status.as_str().to_string(),
        });
    }

    // Module graph.
    let source_dirs = manifest.source_directories();
    let index = ModulePackageIndex::build(cache, &pinned);
    let mut graph = discover(project_root, &source_dirs, entries, &index)?;
    topo_order(&mut graph)?;
    assign_levels(&mut graph.modules);
    let module_batches = batches(&graph.modules);

    let use_cached = packages_stale == 0 && packages_missing == 0;
    let summary = PlanSummary {
        packages_total: package_build_order.len(),
        packages_stale,
        packages_missing,
        modules_total: graph.modules.len(),
        batch_count: module_batches.len(),
    };

    Ok(BuildPlan {
        root: project_root.display().to_string(),
        src_dirs: source_dirs,
        use_cached,
        roots: entries.to_vec(),
        foreign_modules: graph
            .foreign
            .iter()
            .map(|(name, pkg)| ForeignModule {
                name: name.clone(),
                package: pkg.to_string(),
            })
            .collect(),
        package_build_order,
        build_order: graph
            .modules
            .iter()
            .map(|module| PlanModule {
                name: module.name.clone(),
                path: module.path.clone(),
                deps: module.deps.clone(),
                has_main: module.has_main,
                cached: false,
            })
            .collect(),
        parallel_batches: module_batches
            .into_iter()
            .map(|batch| PlanBatch {
                level: batch.level,
                count: batch.modules.len(),
                modules: batch.modules,
            })
            .collect(),
        problems: graph
            .problems
            .into_iter()
            .map(|problem| PlanProblem {
                module: problem.module,
                message: problem.message,
            })
            .collect(),
        summary,
    })
}

/// Exact versions for every project package. Applications carry them
/// in the manifest; package projects pin each declared range to the
/// newest cached version inside it.
fn pinned_versions(
    manifest: &Manifest,
    cache: &PackageCache,
) -> BTreeMap<PackageName, Version> {
    match manifest {
        Manifest::Application(_) => manifest.all_pinned(),
        Manifest::Package(package) => package
            .deps
            .iter()
            .map(|(pkg, range)| {
                let version = cache
                    .cached_versions(pkg)
                    .into_iter()
                    .find(|v| range.range.contains(*v))
                    .unwrap_or(range.range.lower.version);
                (pkg.clone(), version)
            })
            .collect(),
    }
}

/// For each project package, its declared dependencies restricted to
/// packages also present in the project set.
fn project_dependency_edges(
    pinned: &BTreeMap<PackageName, Version>,
    cache: &PackageCache,
) -> BTreeMap<PackageName, Vec<PackageName>> {
    let mut edges = BTreeMap::new();
    for (pkg, version) in pinned {
        let deps = cache
            .dependencies_of(pkg, *version)
            .map(|deps| {
                let mut filtered: Vec<PackageName> = deps
                    .into_iter()
                    .map(|(dep, _)| dep)
                    .filter(|dep| pinned.contains_key(dep))
                    .collect();
                filtered.sort();
                filtered
            })
            .unwrap_or_default();
        edges.insert(pkg.clone(), deps);
    }
    edges
}

/// Kahn's algorithm with "alphabetically first ready node" tie
/// breaking. Dependency cycles are fatal.
fn kahn_order(
    pinned: &BTreeMap<PackageName, Version>,
    edges: &BTreeMap<PackageName, Vec<PackageName>>,
) -> Result<Vec<PackageName>> {
    let mut indegree: BTreeMap<&PackageName, usize> =
        pinned.keys().map(|pkg| (pkg, 0)).collect();
    let mut dependents: BTreeMap<&PackageName, Vec<&PackageName>> = BTreeMap::new();
    for (pkg, deps) in edges {
        for dep in deps {
            *indegree.get_mut(pkg).expect("edge endpoints are project packages") += 1;
            dependents.entry(dep).or_default().push(pkg);
        }
    }

    let mut ready: BinaryHeap<Reverse<&PackageName>> = indegree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(pkg, _)| Reverse(*pkg))
        .collect();
    let mut order = Vec::with_capacity(pinned.len());
    while let Some(Reverse(pkg)) = ready.pop() {
        order.push(pkg.clone());
        let users = dependents.get(pkg).cloned().unwrap_or_default();
        for user in users {
            let degree = indegree.get_mut(user).expect("known package");
            *degree -= 1;
            if *degree == 0 {
                ready.push(Reverse(user));
            }
        }
    }

    if order.len() != pinned.len() {
        let stuck: Vec<String> = indegree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(pkg, _)| pkg.to_string())
            .collect();
        return Err(Error::parse(
            "package graph",
            format!("dependency cycle among {}", stuck.join(", ")),
        ));
    }
    Ok(order)
}
