//! Solver driver and strategy ladder
//!
//! The resolution core (see [`pubgrub`]) answers "which versions
//! satisfy these root constraints". This module decides what the root
//! constraints *are*: each strategy translates the current manifest
//! into a set of root ranges controlling how much existing dependency
//! versions may move, and the ladder tries strategies in order until
//! one succeeds.
//!
//! Install requests are partitioned first (already-direct packages
//! are skipped, indirect ones become promotions, absent ones go to the
//! solver) and every resulting plan is all-or-nothing: the manifest
//! copy inside a [`ChangePlan`] is only written after the caller
//! confirms.

pub mod provider;
pub mod pubgrub;

use std::collections::BTreeMap;
use std::fmt::{self, Display};

pub use provider::{DependencyProvider, RegistryProvider};
pub use pubgrub::{ConflictReport, SolveError};

use crate::error::{Error, Result};
use crate::manifest::{DepLocation, Manifest};
use crate::package::{nearest_names, PackageName};
use crate::registry::Registry;
use crate::version::{Version, VersionRange};

/// How far existing versions are allowed to move during a solve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Every pinned package becomes an exact root. Minimal churn.
    ExactAll,
    /// Direct maps pinned, indirect maps free within their major,
    /// test roots exact.
    ExactDirectUpgradableIndirect,
    /// Every package free within its major.
    UpgradableWithinMajor,
    /// The targets are fully free (added first, so they are decided
    /// before transitive constraints accrue), remaining direct
    /// production packages are unpinned, indirect packages re-enter
    /// through dependencies only, test packages stay exact.
    CrossMajorForTargets(Vec<PackageName>),
}

/// One requested package, optionally pinned to a version.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub pkg: PackageName,
    pub version: Option<Version>,
}

/// One entry of a change plan, ordered by (author, name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageChange {
    Add { pkg: PackageName, version: Version },
    Change { pkg: PackageName, old: Version, new: Version },
    Remove { pkg: PackageName, old: Version },
    Promote { pkg: PackageName },
}

impl PackageChange {
    pub fn package(&self) -> &PackageName {
        match self {
            PackageChange::Add { pkg, .. }
            | PackageChange::Change { pkg, .. }
            | PackageChange::Remove { pkg, .. }
            | PackageChange::Promote { pkg } => pkg,
        }
    }
}

impl Display for PackageChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageChange::Add { pkg, version } => write!(f, "Add {} {}", pkg, version),
            PackageChange::Change { pkg, old, new } => {
                write!(f, "Change {} {} -> {}", pkg, old, new)
            }
            PackageChange::Remove { pkg, old } => write!(f, "Remove {} {}", pkg, old),
            PackageChange::Promote { pkg } => write!(f, "Promote {}", pkg),
        }
    }
}

/// A successful solve: the sorted changes plus the mutated (unsaved)
/// manifest. Nothing touches disk until the caller writes it.
#[derive(Debug, Clone)]
pub struct ChangePlan {
    pub changes: Vec<PackageChange>,
    pub manifest: Manifest,
}

impl ChangePlan {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

pub struct SolverDriver<'a> {
    registry: &'a dyn Registry,
}

impl<'a> SolverDriver<'a> {
    pub fn new(registry: &'a dyn Registry) -> Self {
        Self { registry }
    }

    /// Multi-package install. All-or-nothing: any failure yields an
    /// error and no plan.
    pub fn install(
        &self,
        manifest: &Manifest,
        requests: &[Candidate],
        for_test: bool,
        cross_major: bool,
    ) -> Result<ChangePlan> {
        // Partition: already direct / promotion candidate / solver
        // candidate. A cross-major request always solves, wherever the
        // target currently sits.
        let mut promotions: Vec<PackageName> = Vec::new();
        let mut to_solve: Vec<Candidate> = Vec::new();
        for request in requests {
            if cross_major {
                to_solve.push(request.clone());
                continue;
            }
            match manifest.find(&request.pkg) {
                DepLocation::Direct | DepLocation::PkgDep => {}
                DepLocation::TestDirect | DepLocation::PkgTestDep if for_test => {}
                DepLocation::None => to_solve.push(request.clone()),
                _ => promotions.push(request.pkg.clone()),
            }
        }
        // Promotions and already-present packages never touch the
        // registry; only genuine solver candidates are validated.
        self.check_requests(&to_solve)?;

        let mut plan = if to_solve.is_empty() {
            ChangePlan {
                changes: Vec::new(),
                manifest: manifest.clone(),
            }
        } else {
            let ladder = if cross_major {
                vec![Strategy::CrossMajorForTargets(
                    to_solve.iter().map(|c| c.pkg.clone()).collect(),
                )]
            } else if to_solve.iter().any(|c| c.version.is_some()) {
                vec![
                    Strategy::UpgradableWithinMajor,
                    Strategy::ExactDirectUpgradableIndirect,
                    Strategy::ExactAll,
                ]
            } else {
                vec![
                    Strategy::ExactAll,
                    Strategy::ExactDirectUpgradableIndirect,
                    Strategy::UpgradableWithinMajor,
                ]
            };
            self.run_ladder(manifest, &ladder, &to_solve, for_test, false)?
        };

        // Promotions never need the solver; apply them on top.
        for pkg in promotions {
            let target = if for_test {
                DepLocation::TestDirect
            } else {
                DepLocation::Direct
            };
            while plan.manifest.find(&pkg) != target && plan.manifest.promote(&pkg) {}
            plan.changes.push(PackageChange::Promote { pkg });
        }

        sort_changes(&mut plan.changes);
        Ok(plan)
    }

    /// Upgrade one package or all of them.
    pub fn upgrade(
        &self,
        manifest: &Manifest,
        target: Option<&PackageName>,
        major: bool,
        ignore_test: bool,
    ) -> Result<ChangePlan> {
        if let Some(pkg) = target {
            if manifest.find(pkg) == DepLocation::None {
                return Err(Error::InvalidPackage(format!(
                    "{} is not a dependency of this project",
                    pkg
                )));
            }
        }

        let strategy = if major {
            let targets = match target {
                Some(pkg) => vec![pkg.clone()],
                None => direct_production_packages(manifest),
            };
            Strategy::CrossMajorForTargets(targets)
        } else {
            Strategy::UpgradableWithinMajor
        };
        let mut plan = self.run_ladder(manifest, &[strategy], &[], false, ignore_test)?;
        sort_changes(&mut plan.changes);
        Ok(plan)
    }

    /// Run one strategy directly. Mostly useful to observe ladder
    /// monotonicity from tests.
    pub fn plan_with_strategy(
        &self,
        manifest: &Manifest,
        strategy: &Strategy,
        candidates: &[Candidate],
        for_test: bool,
    ) -> Result<ChangePlan> {
        let mut plan = self.run_ladder(
            manifest,
            std::slice::from_ref(strategy),
            candidates,
            for_test,
            false,
        )?;
        sort_changes(&mut plan.changes);
        Ok(plan)
    }

    fn check_requests(&self, requests: &[Candidate]) -> Result<()> {
        for request in requests {
            if !self.registry.find(&request.pkg)? {
                let known = self.registry.known_packages();
                let hints = nearest_names(&request.pkg.to_string(), known.iter(), 4);
                let mut message = format!("{} is not in the registry", request.pkg);
                if !hints.is_empty() {
                    message.push_str(&format!("; did you mean {}?", hints.join(", ")));
                }
                return Err(Error::InvalidPackage(message));
            }
            if let Some(version) = request.version {
                let available = self.registry.versions(&request.pkg)?;
                if !available.contains(&version) {
                    let listed: Vec<String> =
                        available.iter().map(Version::to_string).collect();
                    return Err(Error::InvalidPackage(format!(
                        "{} has no version {}; available: {}",
                        request.pkg,
                        version,
                        listed.join(", ")
                    )));
                }
            }
        }
        Ok(())
    }

    fn run_ladder(
        &self,
        manifest: &Manifest,
        ladder: &[Strategy],
        candidates: &[Candidate],
        for_test: bool,
        ignore_test: bool,
    ) -> Result<ChangePlan> {
        let provider = RegistryProvider::new(self.registry);
        let mut last_report: Option<ConflictReport> = None;

        for strategy in ladder {
            let roots = root_constraints(manifest, strategy, candidates, ignore_test);
            match pubgrub::solve(&provider, root_version(manifest), &roots) {
                Ok(solution) => {
                    return Ok(build_plan(manifest, &solution, candidates, for_test));
                }
                Err(SolveError::NoSolution(report)) => last_report = Some(report),
                Err(SolveError::Fatal(e)) => return Err(e),
            }
        }

        let report = last_report.expect("ladder is never empty");
        let mut message = report.to_string();
        let blockers: Vec<String> = report
            .dependency_facts
            .iter()
            .filter(|(_, _, dep, _)| candidates.iter().any(|c| &c.pkg == dep))
            .map(|(pkg, version, _, _)| format!("{} {}", pkg, version))
            .collect();
        if !blockers.is_empty() {
            message.push_str(&format!("; blocked by {}", blockers.join(", ")));
        }
        Err(Error::NoSolution(message))
    }
}

fn root_version(manifest: &Manifest) -> Version {
    match manifest {
        Manifest::Application(_) => Version::new(0, 0, 0),
        Manifest::Package(package) => package.version,
    }
}

fn direct_production_packages(manifest: &Manifest) -> Vec<PackageName> {
    match manifest {
        Manifest::Application(app) => app.direct.keys().cloned().collect(),
        Manifest::Package(package) => package.deps.keys().cloned().collect(),
    }
}

/// The version a package is currently held at, if any: the pin for
/// applications, the declared lower bound for package projects.
fn current_pin(manifest: &Manifest, pkg: &PackageName) -> Option<Version> {
    match manifest {
        Manifest::Application(app) => app
            .direct
            .get(pkg)
            .or_else(|| app.indirect.get(pkg))
            .or_else(|| app.test_direct.get(pkg))
            .or_else(|| app.test_indirect.get(pkg))
            .copied(),
        Manifest::Package(package) => package
            .deps
            .get(pkg)
            .or_else(|| package.test_deps.get(pkg))
            .and_then(|range| {
                if range.range.lower.unbounded {
                    None
                } else {
                    Some(range.range.lower.version)
                }
            }),
    }
}

/// Translate the manifest plus install candidates into ordered root
/// constraints for one strategy.
fn root_constraints(
    manifest: &Manifest,
    strategy: &Strategy,
    candidates: &[Candidate],
    ignore_test: bool,
) -> Vec<(PackageName, VersionRange)> {
    let mut roots: Vec<(PackageName, VersionRange)> = Vec::new();
    let push = |roots: &mut Vec<(PackageName, VersionRange)>,
                pkg: &PackageName,
                range: VersionRange| {
        if !roots.iter().any(|(existing, _)| existing == pkg) {
            roots.push((pkg.clone(), range));
        }
    };

    // Targets and candidates go first so their versions are decided
    // before transitive constraints accrue.
    if let Strategy::CrossMajorForTargets(targets) = strategy {
        // A single target must actually move; an explicit version or a
        // multi-target sweep is free instead.
        let single = targets.len() == 1;
        for target in targets {
            let explicit = candidates
                .iter()
                .find(|c| &c.pkg == target)
                .and_then(|c| c.version);
            let range = match explicit {
                Some(version) => VersionRange::exact(version),
                None if single => current_pin(manifest, target)
                    .map(VersionRange::above)
                    .unwrap_or_else(VersionRange::any),
                None => VersionRange::any(),
            };
            push(&mut roots, target, range);
        }
    }
    for candidate in candidates {
        let range = match candidate.version {
            Some(version) => VersionRange::exact(version),
            None => VersionRange::any(),
        };
        push(&mut roots, &candidate.pkg, range);
    }

    match manifest {
        Manifest::Application(app) => {
            let exact = |v: &Version| VersionRange::exact(*v);
            let within_major = |v: &Version| VersionRange::until_next_major(*v);
            match strategy {
                Strategy::ExactAll => {
                    for (pkg, v) in app
                        .direct
                        .iter()
                        .chain(&app.indirect)
                        .chain(&app.test_direct)
                        .chain(&app.test_indirect)
                    {
                        push(&mut roots, pkg, exact(v));
                    }
                }
                Strategy::ExactDirectUpgradableIndirect => {
                    for (pkg, v) in &app.direct {
                        push(&mut roots, pkg, exact(v));
                    }
                    for (pkg, v) in &app.indirect {
                        push(&mut roots, pkg, within_major(v));
                    }
                    for (pkg, v) in app.test_direct.iter().chain(&app.test_indirect) {
                        push(&mut roots, pkg, exact(v));
                    }
                }
                Strategy::UpgradableWithinMajor => {
                    for (pkg, v) in app
                        .direct
                        .iter()
                        .chain(&app.indirect)
                        .chain(&app.test_direct)
                        .chain(&app.test_indirect)
                    {
                        push(&mut roots, pkg, within_major(v));
                    }
                }
                Strategy::CrossMajorForTargets(_) => {
                    for pkg in app.direct.keys() {
                        push(&mut roots, pkg, VersionRange::any());
                    }
                    // Indirect packages re-enter through dependency
                    // edges only.
                    if !ignore_test {
                        for (pkg, v) in app.test_direct.iter().chain(&app.test_indirect) {
                            push(&mut roots, pkg, exact(v));
                        }
                    }
                }
            }
        }
        Manifest::Package(package) => match strategy {
            Strategy::ExactAll | Strategy::ExactDirectUpgradableIndirect => {
                for (pkg, range) in package.deps.iter().chain(&package.test_deps) {
                    push(&mut roots, pkg, range.range);
                }
            }
            Strategy::UpgradableWithinMajor => {
                for (pkg, range) in package.deps.iter().chain(&package.test_deps) {
                    let widened = if range.range.lower.unbounded {
                        range.range
                    } else {
                        VersionRange::until_next_major(range.range.lower.version)
                    };
                    push(&mut roots, pkg, widened);
                }
            }
            Strategy::CrossMajorForTargets(_) => {
                for (pkg, range) in &package.deps {
                    push(&mut roots, pkg, range.range);
                }
                if !ignore_test {
                    for (pkg, range) in &package.test_deps {
                        push(&mut roots, pkg, range.range);
                    }
                }
            }
        },
    }
    roots
}

/// Diff a solution against the manifest and produce the mutated copy.
fn build_plan(
    manifest: &Manifest,
    solution: &BTreeMap<PackageName, Version>,
    candidates: &[Candidate],
    for_test: bool,
) -> ChangePlan {
    let mut changes = Vec::new();
    let mut updated = manifest.clone();

    match manifest {
        Manifest::Application(_) => {
            let old = manifest.all_pinned();
            let is_candidate =
                |pkg: &PackageName| candidates.iter().any(|c| &c.pkg == pkg);

            for (pkg, new_version) in solution {
                match old.get(pkg) {
                    Some(old_version) if old_version == new_version => {}
                    Some(old_version) => {
                        changes.push(PackageChange::Change {
                            pkg: pkg.clone(),
                            old: *old_version,
                            new: *new_version,
                        });
                        updated.apply_change_preserving_location(
                            pkg,
                            *new_version,
                            DepLocation::Indirect,
                        );
                    }
                    None => {
                        changes.push(PackageChange::Add {
                            pkg: pkg.clone(),
                            version: *new_version,
                        });
                        let direct = is_candidate(pkg);
                        updated.add_or_update(pkg, *new_version, for_test, direct, direct);
                    }
                }
            }
            for (pkg, old_version) in &old {
                if !solution.contains_key(pkg) {
                    changes.push(PackageChange::Remove {
                        pkg: pkg.clone(),
                        old: *old_version,
                    });
                    updated.remove(pkg);
                }
            }
        }
        Manifest::Package(package) => {
            // Package manifests only record their own declared
            // dependencies; transitive picks stay out of the file.
            for candidate in candidates {
                if let Some(version) = solution.get(&candidate.pkg) {
                    changes.push(PackageChange::Add {
                        pkg: candidate.pkg.clone(),
                        version: *version,
                    });
                    updated.add_or_update(&candidate.pkg, *version, for_test, true, false);
                }
            }
            for (pkg, range) in &package.deps {
                if let Some(version) = solution.get(pkg) {
                    if !range.range.contains(*version) {
                        changes.push(PackageChange::Change {
                            pkg: pkg.clone(),
                            old: range.range.lower.version,
                            new: *version,
                        });
                        updated.apply_change_preserving_location(
                            pkg,
                            *version,
                            DepLocation::PkgDep,
                        );
                    }
                }
            }
        }
    }

    ChangePlan {
        changes,
        manifest: updated,
    }
}

fn sort_changes(changes: &mut [PackageChange]) {
    changes.sort_by(|a, b| a.package().cmp(b.package()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{IndexedRegistry, VersionStatus};

    fn pkg(s: &str) -> PackageName {
        PackageName::parse(s).unwrap()
    }

    fn v(major: u16, minor: u16, patch: u16) -> Version {
        Version::new(major, minor, patch)
    }

    fn app_manifest(json: &str) -> Manifest {
        Manifest::from_str_named(json, "elm.json").unwrap()
    }

    const BASE_APP: &str = r#"{
        "type": "application",
        "source-directories": ["src"],
        "elm-version": "0.19.1",
        "dependencies": {
            "direct": { "elm/core": "1.0.5" },
            "indirect": {}
        },
        "test-dependencies": { "direct": {}, "indirect": {} }
    }"#;

    fn base_registry() -> IndexedRegistry {
        let mut registry = IndexedRegistry::new();
        registry.add(&pkg("elm/core"), v(1, 0, 5), VersionStatus::Valid, &[]);
        registry
    }

    #[test]
    fn test_install_new_direct_dep() {
        let mut registry = base_registry();
        let html_deps = vec![(
            pkg("elm/core"),
            VersionRange::until_next_major(v(1, 0, 0)),
        )];
        registry.add(&pkg("elm/html"), v(2, 0, 0), VersionStatus::Valid, &html_deps);
        registry.add(&pkg("elm/html"), v(1, 0, 0), VersionStatus::Valid, &html_deps);

        let manifest = app_manifest(BASE_APP);
        let driver = SolverDriver::new(&registry);
        let plan = driver
            .install(
                &manifest,
                &[Candidate {
                    pkg: pkg("elm/html"),
                    version: Some(v(2, 0, 0)),
                }],
                false,
                false,
            )
            .unwrap();

        assert!(plan.changes.contains(&PackageChange::Add {
            pkg: pkg("elm/html"),
            version: v(2, 0, 0)
        }));
        assert_eq!(plan.manifest.find(&pkg("elm/html")), DepLocation::Direct);
        assert_eq!(plan.manifest.find(&pkg("elm/core")), DepLocation::Direct);
    }

    #[test]
    fn test_install_promotes_indirect_without_solving() {
        // The registry is empty: if the driver tried to solve, it
        // would fail, so a pure promotion must not consult it.
        let registry = IndexedRegistry::new();
        let manifest = app_manifest(
            r#"{
            "type": "application",
            "elm-version": "0.19.1",
            "dependencies": {
                "direct": {},
                "indirect": { "elm/json": "1.1.3" }
            }
        }"#,
        );
        let driver = SolverDriver::new(&registry);
        let plan = driver
            .install(
                &manifest,
                &[Candidate {
                    pkg: pkg("elm/json"),
                    version: None,
                }],
                false,
                false,
            )
            .unwrap();

        assert_eq!(
            plan.changes,
            vec![PackageChange::Promote {
                pkg: pkg("elm/json")
            }]
        );
        assert_eq!(plan.manifest.find(&pkg("elm/json")), DepLocation::Direct);
    }

    #[test]
    fn test_install_already_direct_is_noop() {
        let registry = base_registry();
        let manifest = app_manifest(BASE_APP);
        let driver = SolverDriver::new(&registry);
        let plan = driver
            .install(
                &manifest,
                &[Candidate {
                    pkg: pkg("elm/core"),
                    version: None,
                }],
                false,
                false,
            )
            .unwrap();
        assert!(plan.is_noop());
    }

    #[test]
    fn test_cross_major_blocked_by_production_dep() {
        let mut registry = IndexedRegistry::new();
        let a_deps = vec![(
            pkg("target/x"),
            VersionRange::until_next_major(v(1, 0, 0)),
        )];
        registry.add(&pkg("pkg/a"), v(1, 0, 0), VersionStatus::Valid, &a_deps);
        registry.add(&pkg("target/x"), v(2, 0, 0), VersionStatus::Valid, &[]);
        registry.add(&pkg("target/x"), v(1, 0, 0), VersionStatus::Valid, &[]);

        let manifest = app_manifest(
            r#"{
            "type": "application",
            "elm-version": "0.19.1",
            "dependencies": {
                "direct": { "pkg/a": "1.0.0" },
                "indirect": { "target/x": "1.0.0" }
            }
        }"#,
        );
        let driver = SolverDriver::new(&registry);
        let result = driver.upgrade(&manifest, Some(&pkg("target/x")), true, false);
        match result {
            Err(Error::NoSolution(message)) => {
                assert!(message.contains("pkg/a 1.0.0"), "got: {}", message);
            }
            other => panic!("expected NoSolution, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_cross_major_moves_target() {
        let mut registry = IndexedRegistry::new();
        registry.add(
            &pkg("pkg/a"),
            v(2, 0, 0),
            VersionStatus::Valid,
            &[(pkg("target/x"), VersionRange::until_next_major(v(2, 0, 0)))],
        );
        registry.add(
            &pkg("pkg/a"),
            v(1, 0, 0),
            VersionStatus::Valid,
            &[(pkg("target/x"), VersionRange::until_next_major(v(1, 0, 0)))],
        );
        registry.add(&pkg("target/x"), v(2, 0, 0), VersionStatus::Valid, &[]);
        registry.add(&pkg("target/x"), v(1, 0, 0), VersionStatus::Valid, &[]);

        let manifest = app_manifest(
            r#"{
            "type": "application",
            "elm-version": "0.19.1",
            "dependencies": {
                "direct": { "pkg/a": "1.0.0" },
                "indirect": { "target/x": "1.0.0" }
            }
        }"#,
        );
        let driver = SolverDriver::new(&registry);
        let plan = driver
            .upgrade(&manifest, Some(&pkg("target/x")), true, false)
            .unwrap();
        assert!(plan.changes.contains(&PackageChange::Change {
            pkg: pkg("target/x"),
            old: v(1, 0, 0),
            new: v(2, 0, 0)
        }));
        assert!(plan.changes.contains(&PackageChange::Change {
            pkg: pkg("pkg/a"),
            old: v(1, 0, 0),
            new: v(2, 0, 0)
        }));
    }

    #[test]
    fn test_upgrade_minor_stays_within_major() {
        let mut registry = IndexedRegistry::new();
        registry.add(&pkg("elm/core"), v(2, 0, 0), VersionStatus::Valid, &[]);
        registry.add(&pkg("elm/core"), v(1, 1, 0), VersionStatus::Valid, &[]);
        registry.add(&pkg("elm/core"), v(1, 0, 5), VersionStatus::Valid, &[]);

        let manifest = app_manifest(BASE_APP);
        let driver = SolverDriver::new(&registry);
        let plan = driver.upgrade(&manifest, None, false, false).unwrap();
        assert_eq!(
            plan.changes,
            vec![PackageChange::Change {
                pkg: pkg("elm/core"),
                old: v(1, 0, 5),
                new: v(1, 1, 0)
            }]
        );
    }

    #[test]
    fn test_upgrade_unchanged_packages_omitted() {
        let registry = base_registry();
        let manifest = app_manifest(BASE_APP);
        let driver = SolverDriver::new(&registry);
        let plan = driver.upgrade(&manifest, None, false, false).unwrap();
        assert!(plan.is_noop());
    }

    #[test]
    fn test_invalid_package_reports_suggestions() {
        let mut registry = IndexedRegistry::new();
        registry.add(&pkg("elm/http"), v(1, 0, 0), VersionStatus::Valid, &[]);
        let manifest = app_manifest(BASE_APP);
        let driver = SolverDriver::new(&registry);
        let result = driver.install(
            &manifest,
            &[Candidate {
                pkg: pkg("elm/htp"),
                version: None,
            }],
            false,
            false,
        );
        match result {
            Err(Error::InvalidPackage(message)) => {
                assert!(message.contains("elm/http"), "got: {}", message);
            }
            other => panic!("expected InvalidPackage, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_invalid_version_lists_available() {
        let registry = base_registry();
        let manifest = app_manifest(BASE_APP);
        let driver = SolverDriver::new(&registry);
        let result = driver.install(
            &manifest,
            &[Candidate {
                pkg: pkg("elm/core"),
                version: Some(v(9, 9, 9)),
            }],
            false,
            false,
        );
        match result {
            Err(Error::InvalidPackage(message)) => {
                assert!(message.contains("1.0.5"), "got: {}", message);
            }
            other => panic!("expected InvalidPackage, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_solver_determinism() {
        let mut registry = IndexedRegistry::new();
        let html_deps = vec![(
            pkg("elm/core"),
            VersionRange::until_next_major(v(1, 0, 0)),
        )];
        registry.add(&pkg("elm/html"), v(1, 0, 0), VersionStatus::Valid, &html_deps);
        registry.add(&pkg("elm/core"), v(1, 0, 5), VersionStatus::Valid, &[]);

        let manifest = app_manifest(BASE_APP);
        let driver = SolverDriver::new(&registry);
        let request = [Candidate {
            pkg: pkg("elm/html"),
            version: None,
        }];
        let first = driver.install(&manifest, &request, false, false).unwrap();
        let second = driver.install(&manifest, &request, false, false).unwrap();
        assert_eq!(first.changes, second.changes);
        assert_eq!(first.manifest.render(), second.manifest.render());
    }

    #[test]
    fn test_ladder_monotonicity() {
        // Both rungs succeed; the stricter rung's direct changes must
        // be a subset of the looser rung's.
        let mut registry = IndexedRegistry::new();
        registry.add(&pkg("elm/core"), v(1, 1, 0), VersionStatus::Valid, &[]);
        registry.add(&pkg("elm/core"), v(1, 0, 5), VersionStatus::Valid, &[]);
        registry.add(&pkg("elm/html"), v(1, 0, 0), VersionStatus::Valid, &[]);

        let manifest = app_manifest(BASE_APP);
        let driver = SolverDriver::new(&registry);
        let request = [Candidate {
            pkg: pkg("elm/html"),
            version: None,
        }];

        let strict = driver
            .plan_with_strategy(&manifest, &Strategy::ExactAll, &request, false)
            .unwrap();
        let loose = driver
            .plan_with_strategy(&manifest, &Strategy::UpgradableWithinMajor, &request, false)
            .unwrap();
        for change in &strict.changes {
            if let PackageChange::Add { pkg, .. } = change {
                assert!(loose
                    .changes
                    .iter()
                    .any(|other| other.package() == pkg));
            }
        }
    }
}
