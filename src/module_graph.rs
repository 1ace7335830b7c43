//! Local module discovery and ordering
//!
//! Starting from the entry files, a breadth-first crawl resolves every
//! import either to a file under one of the project's source
//! directories (a local module, crawled in turn) or to a package that
//! exposes it (a foreign module). Local modules then get a
//! deterministic build order (DFS post-order with alphabetical
//! traversal) and parallel levels (a module's level is one more than
//! the deepest of its dependencies).

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs;
use std::path::Path;

use crate::cache::PackageCache;
use crate::elm_module::parse_skeleton;
use crate::error::{Error, Result};
use crate::package::PackageName;
use crate::version::Version;

/// Standard-library modules attributed to elm/core even when the
/// cached manifest is unavailable.
pub const CORE_FALLBACK_MODULES: &[&str] = &[
    "Basics",
    "Char",
    "Debug",
    "Maybe",
    "Platform",
    "Platform.Cmd",
    "Platform.Sub",
    "Tuple",
];

/// Modules every Elm file imports implicitly; always part of the
/// foreign list whether or not a source file names them.
pub const IMPLICIT_IMPORTS: &[&str] = &[
    "Basics",
    "Char",
    "Debug",
    "List",
    "Maybe",
    "Platform",
    "Platform.Cmd",
    "Platform.Sub",
    "Result",
    "String",
    "Tuple",
];

/// Value-owned module-to-package map, rebuilt per command invocation
/// from the exposed-modules of every project package.
#[derive(Debug, Clone, Default)]
pub struct ModulePackageIndex {
    map: BTreeMap<String, PackageName>,
}

impl ModulePackageIndex {
    pub fn build(cache: &PackageCache, pinned: &BTreeMap<PackageName, Version>) -> Self {
        let mut map = BTreeMap::new();
        for (pkg, version) in pinned {
            if let Ok(exposed) = cache.exposed_modules_of(pkg, *version) {
                for module in exposed {
                    map.entry(module).or_insert_with(|| pkg.clone());
                }
            }
        }
        let core = PackageName::new("elm", "core");
        if pinned.contains_key(&core) {
            for module in CORE_FALLBACK_MODULES {
                map.entry((*module).to_string()).or_insert_with(|| core.clone());
            }
        }
        Self { map }
    }

    pub fn lookup(&self, module: &str) -> Option<&PackageName> {
        self.map.get(module)
    }
}

/// One local module in the build plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildModule {
    pub name: String,
    /// Project-relative path with forward slashes.
    pub path: String,
    /// Local dependencies, alphabetical.
    pub deps: Vec<String>,
    pub has_main: bool,
    /// Parallel level; -1 until computed.
    pub level: i32,
}

/// Modules safe to compile concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildBatch {
    pub level: i32,
    pub modules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub module: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    /// Local modules in build order once [`topo_order`] has run.
    pub modules: Vec<BuildModule>,
    /// Foreign module name to owning package.
    pub foreign: BTreeMap<String, PackageName>,
    pub problems: Vec<Problem>,
}

/// Crawl reachable modules from the entry files.
pub fn discover(
    project_root: &Path,
    source_dirs: &[String],
    entries: &[String],
    index: &ModulePackageIndex,
) -> Result<ModuleGraph> {
    let mut graph = ModuleGraph::default();
    let mut local: BTreeMap<String, (String, Vec<String>, bool)> = BTreeMap::new();
    let mut queue: VecDeque<(String, String)> = VecDeque::new();

    // Entry files are read directly; a broken entry is fatal.
    for entry in entries {
        let absolute = project_root.join(entry);
        let source = fs::read_to_string(&absolute).map_err(|e| {
            Error::Fs(format!("cannot read entry file {}: {}", absolute.display(), e))
        })?;
        let skeleton = parse_skeleton(&source, entry)?;
        if !local.contains_key(&skeleton.name) {
            queue.push_back((skeleton.name.clone(), entry.clone()));
            local.insert(
                skeleton.name.clone(),
                (entry.clone(), skeleton.imports.clone(), skeleton.has_main),
            );
        }
    }

    // BFS over imports.
    let mut pending: VecDeque<String> = queue.iter().map(|(name, _)| name.clone()).collect();
    while let Some(current) = pending.pop_front() {
        let imports = local
            .get(&current)
            .map(|(_, imports, _)| imports.clone())
            .unwrap_or_default();
        for import in imports {
            if local.contains_key(&import) || graph.foreign.contains_key(&import) {
                continue;
            }
            match resolve_module_path(project_root, source_dirs, &import) {
                Some(relative) => {
                    let absolute = project_root.join(&relative);
                    let source = match fs::read_to_string(&absolute) {
                        Ok(source) => source,
                        Err(e) => {
                            graph.problems.push(Problem {
                                module: Some(import.clone()),
                                message: format!("cannot read {}: {}", relative, e),
                            });
                            continue;
                        }
                    };
                    match parse_skeleton(&source, &relative) {
                        Ok(skeleton) => {
                            if skeleton.name != import {
                                graph.problems.push(Problem {
                                    module: Some(import.clone()),
                                    message: format!(
                                        "{} declares module {} but its path implies {}",
                                        relative, skeleton.name, import
                                    ),
                                });
                            }
                            local.insert(
                                import.clone(),
                                (relative, skeleton.imports.clone(), skeleton.has_main),
                            );
                            pending.push_back(import);
                        }
                        Err(e) => {
                            graph.problems.push(Problem {
                                module: Some(import.clone()),
                                message: e.to_string(),
                            });
                        }
                    }
                }
                None => match index.lookup(&import) {
                    Some(pkg) => {
                        graph.foreign.insert(import, pkg.clone());
                    }
                    None => {
                        graph.problems.push(Problem {
                            module: Some(import.clone()),
                            message: format!(
                                "module {} was not found locally or in any project package",
                                import
                            ),
                        });
                    }
                },
            }
        }
    }

    // Implicit imports join the foreign list even when unreferenced.
    for module in IMPLICIT_IMPORTS {
        if local.contains_key(*module) || graph.foreign.contains_key(*module) {
            continue;
        }
        if let Some(pkg) = index.lookup(module) {
            graph.foreign.insert((*module).to_string(), pkg.clone());
        }
    }

    for (name, (path, imports, has_main)) in &local {
        let mut deps: Vec<String> = imports
            .iter()
            .filter(|import| local.contains_key(*import) && *import != name)
            .cloned()
            .collect();
        deps.sort();
        deps.dedup();
        graph.modules.push(BuildModule {
            name: name.clone(),
            path: path.clone(),
            deps,
            has_main: *has_main,
            level: -1,
        });
    }
    Ok(graph)
}

/// `Page.Home` to `<dir>/Page/Home.elm`, first source directory wins.
fn resolve_module_path(
    project_root: &Path,
    source_dirs: &[String],
    module: &str,
) -> Option<String> {
    let relative_file = format!("{}.elm", module.replace('.', "/"));
    for dir in source_dirs {
        let candidate = if dir == "." {
            relative_file.clone()
        } else {
            format!("{}/{}", dir.trim_end_matches('/'), relative_file)
        };
        if project_root.join(&candidate).exists() {
            return Some(candidate);
        }
    }
    None
}

/// Reorder modules into build order: modules sorted by name, DFS
/// post-order with each dependency list traversed alphabetically.
/// Import cycles are fatal.
pub fn topo_order(graph: &mut ModuleGraph) -> Result<()> {
    let adjacency: BTreeMap<String, Vec<String>> = graph
        .modules
        .iter()
        .map(|module| (module.name.clone(), module.deps.clone()))
        .collect();

    let mut state: HashMap<String, u8> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut trail: Vec<String> = Vec::new();
    for name in adjacency.keys() {
        visit(name, &adjacency, &mut state, &mut order, &mut trail)?;
    }

    let position: HashMap<&String, usize> =
        order.iter().enumerate().map(|(i, name)| (name, i)).collect();
    graph.modules.sort_by_key(|module| position[&module.name]);
    Ok(())
}

fn visit(
    name: &String,
    adjacency: &BTreeMap<String, Vec<String>>,
    state: &mut HashMap<String, u8>,
    order: &mut Vec<String>,
    trail: &mut Vec<String>,
) -> Result<()> {
    match state.get(name) {
        Some(2) => return Ok(()),
        Some(1) => {
            let start = trail.iter().position(|n| n == name).unwrap_or(0);
            let mut cycle: Vec<String> = trail[start..].to_vec();
            cycle.push(name.clone());
            return Err(Error::parse(
                "module graph",
                format!("import cycle: {}", cycle.join(" -> ")),
            ));
        }
        _ => {}
    }
    state.insert(name.clone(), 1);
    trail.push(name.clone());
    if let Some(deps) = adjacency.get(name) {
        for dep in deps {
            visit(dep, adjacency, state, order, trail)?;
        }
    }
    trail.pop();
    state.insert(name.clone(), 2);
    order.push(name.clone());
    Ok(())
}

/// Fixed-point parallel level assignment: no deps means level 0,
/// otherwise one past the deepest dependency. Requires an acyclic
/// graph, which [`topo_order`] has already guaranteed.
pub fn assign_levels(modules: &mut [BuildModule]) {
    loop {
        let levels: HashMap<String, i32> = modules
            .iter()
            .map(|module| (module.name.clone(), module.level))
            .collect();
        let mut changed = false;
        for module in modules.iter_mut() {
            if module.level >= 0 {
                continue;
            }
            if module.deps.is_empty() {
                module.level = 0;
                changed = true;
                continue;
            }
            let dep_levels: Vec<i32> = module
                .deps
                .iter()
                .filter_map(|dep| levels.get(dep).copied())
                .collect();
            if dep_levels.len() == module.deps.len() && dep_levels.iter().all(|l| *l >= 0) {
                module.level = dep_levels.iter().max().copied().unwrap_or(-1) + 1;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

/// Group modules into per-level batches, level ascending.
pub fn batches(modules: &[BuildModule]) -> Vec<BuildBatch> {
    let mut by_level: BTreeMap<i32, Vec<String>> = BTreeMap::new();
    for module in modules {
        by_level
            .entry(module.level)
            .or_default()
            .push(module.name.clone());
    }
    by_level
        .into_iter()
        .map(|(level, modules)| BuildBatch { level, modules })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &str, deps: &[&str]) -> BuildModule {
        BuildModule {
            name: name.to_string(),
            path: format!("src/{}.elm", name.replace('.', "/")),
            deps: deps.iter().map(|d| d.to_string()).collect(),
            has_main: false,
            level: -1,
        }
    }

    fn graph_of(modules: Vec<BuildModule>) -> ModuleGraph {
        ModuleGraph {
            modules,
            foreign: BTreeMap::new(),
            problems: Vec::new(),
        }
    }

    #[test]
    fn test_topo_order_deps_first() {
        let mut graph = graph_of(vec![
            module("Main", &["A", "B"]),
            module("A", &["B"]),
            module("B", &[]),
        ]);
        topo_order(&mut graph).unwrap();
        let names: Vec<&str> = graph.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "Main"]);
    }

    #[test]
    fn test_topo_order_is_deterministic_for_siblings() {
        let mut graph = graph_of(vec![
            module("Zeta", &[]),
            module("Alpha", &[]),
            module("Main", &["Zeta", "Alpha"]),
        ]);
        topo_order(&mut graph).unwrap();
        let names: Vec<&str> = graph.modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zeta", "Main"]);
    }

    #[test]
    fn test_cycle_is_fatal() {
        let mut graph = graph_of(vec![module("A", &["B"]), module("B", &["A"])]);
        let err = topo_order(&mut graph).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_levels_and_batches() {
        let mut modules = vec![
            module("B", &[]),
            module("A", &["B"]),
            module("Main", &["A", "B"]),
        ];
        assign_levels(&mut modules);
        let by_name: BTreeMap<&str, i32> = modules
            .iter()
            .map(|m| (m.name.as_str(), m.level))
            .collect();
        assert_eq!(by_name["B"], 0);
        assert_eq!(by_name["A"], 1);
        assert_eq!(by_name["Main"], 2);

        let batches = batches(&modules);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].level, 0);
        assert_eq!(batches[0].modules, vec!["B"]);
        assert_eq!(batches[2].modules, vec!["Main"]);
    }

    #[test]
    fn test_level_zero_iff_no_deps() {
        let mut modules = vec![module("Solo", &[]), module("Wrapper", &["Solo"])];
        assign_levels(&mut modules);
        for m in &modules {
            if m.deps.is_empty() {
                assert_eq!(m.level, 0);
            } else {
                assert!(m.level > 0);
            }
        }
    }

    #[test]
    fn test_discover_and_classify() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(
            src.join("Main.elm"),
            "module Main exposing (main)\n\nimport A\nimport B\nimport Html\n\nmain : Int\nmain = 0\n",
        )
        .unwrap();
        fs::write(src.join("A.elm"), "module A exposing (..)\nimport B\n").unwrap();
        fs::write(src.join("B.elm"), "module B exposing (..)\n").unwrap();

        let mut index = ModulePackageIndex::default();
        index.map.insert(
            "Html".to_string(),
            PackageName::parse("elm/html").unwrap(),
        );

        let graph = discover(
            tmp.path(),
            &["src".to_string()],
            &["src/Main.elm".to_string()],
            &index,
        )
        .unwrap();

        assert_eq!(graph.modules.len(), 3);
        assert_eq!(
            graph.foreign.get("Html"),
            Some(&PackageName::parse("elm/html").unwrap())
        );
        assert!(graph.problems.is_empty());

        let main = graph
            .modules
            .iter()
            .find(|m| m.name == "Main")
            .unwrap();
        assert!(main.has_main);
        assert_eq!(main.deps, vec!["A", "B"]);
    }

    #[test]
    fn test_discover_flags_unknown_import() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(
            src.join("Main.elm"),
            "module Main exposing (..)\nimport Nowhere\n",
        )
        .unwrap();

        let graph = discover(
            tmp.path(),
            &["src".to_string()],
            &["src/Main.elm".to_string()],
            &ModulePackageIndex::default(),
        )
        .unwrap();
        assert_eq!(graph.problems.len(), 1);
        assert_eq!(graph.problems[0].module.as_deref(), Some("Nowhere"));
    }
}
