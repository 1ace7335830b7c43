//! PubGrub-style resolution core
//!
//! Conflict-driven clause learning over incompatibilities. Packages are
//! interned to dense ids and every package's candidate universe is its
//! registry version list (valid versions only, newest first), so term
//! sets are finite bitsets over that list and set complement is exact.
//! Incompatibilities live in an index-based arena; assignments
//! (decisions and derivations) share one store with decision levels,
//! and backtracking truncates it. No pointer graphs anywhere.
//!
//! The solve loop alternates unit propagation with decision making.
//! A fully satisfied incompatibility triggers conflict resolution:
//! prior-cause merging walks derivations back to a learned clause, the
//! store is rewound to the previous satisfier level, and propagation
//! resumes from the learned clause's unit term.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::{self, Display};

use crate::error::Error;
use crate::package::PackageName;
use crate::version::{Version, VersionRange};

use super::provider::DependencyProvider;

/// Packages as the core sees them: the synthetic root plus real names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SolverPackage {
    Root,
    Named(PackageName),
}

impl Display for SolverPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverPackage::Root => write!(f, "your project"),
            SolverPackage::Named(pkg) => write!(f, "{}", pkg),
        }
    }
}

type PackageId = usize;
type IncompatId = usize;

const ROOT: PackageId = 0;
const ROOT_VERSION_INDEX: usize = 0;

// ---------------------------------------------------------------------------
// Version sets

/// A set of candidate indices into one package's version universe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSet {
    bits: Vec<u64>,
    len: usize,
}

impl VersionSet {
    fn words(len: usize) -> usize {
        len.div_ceil(64)
    }

    pub fn empty(len: usize) -> Self {
        Self {
            bits: vec![0; Self::words(len)],
            len,
        }
    }

    pub fn full(len: usize) -> Self {
        let mut set = Self::empty(len);
        for index in 0..len {
            set.insert(index);
        }
        set
    }

    pub fn singleton(len: usize, index: usize) -> Self {
        let mut set = Self::empty(len);
        set.insert(index);
        set
    }

    /// Indices of universe versions falling inside `range`.
    pub fn from_range(range: &VersionRange, universe: &[Version]) -> Self {
        let mut set = Self::empty(universe.len());
        for (index, version) in universe.iter().enumerate() {
            if range.contains(*version) {
                set.insert(index);
            }
        }
        set
    }

    fn insert(&mut self, index: usize) {
        self.bits[index / 64] |= 1 << (index % 64);
    }

    pub fn contains(&self, index: usize) -> bool {
        self.bits[index / 64] & (1 << (index % 64)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|word| *word == 0)
    }

    pub fn intersection(&self, other: &VersionSet) -> VersionSet {
        let bits = self
            .bits
            .iter()
            .zip(&other.bits)
            .map(|(a, b)| a & b)
            .collect();
        VersionSet {
            bits,
            len: self.len,
        }
    }

    pub fn union(&self, other: &VersionSet) -> VersionSet {
        let bits = self
            .bits
            .iter()
            .zip(&other.bits)
            .map(|(a, b)| a | b)
            .collect();
        VersionSet {
            bits,
            len: self.len,
        }
    }

    pub fn complement(&self) -> VersionSet {
        let mut bits: Vec<u64> = self.bits.iter().map(|word| !word).collect();
        // Mask the tail beyond `len`.
        if self.len % 64 != 0 {
            if let Some(last) = bits.last_mut() {
                *last &= (1u64 << (self.len % 64)) - 1;
            }
        }
        VersionSet {
            bits,
            len: self.len,
        }
    }

    /// Lowest set index; indices order newest-first, so this is the
    /// newest matching version.
    pub fn first(&self) -> Option<usize> {
        for (word_index, word) in self.bits.iter().enumerate() {
            if *word != 0 {
                return Some(word_index * 64 + word.trailing_zeros() as usize);
            }
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Terms and incompatibilities

/// A literal about one package: "the selected version is in `set`"
/// (positive) or its negation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub package: PackageId,
    pub positive: bool,
    pub set: VersionSet,
}

impl Term {
    fn negate(&self) -> Term {
        Term {
            package: self.package,
            positive: !self.positive,
            set: self.set.clone(),
        }
    }

    /// Conjunction of two literals about the same package.
    fn intersect(&self, other: &Term) -> Term {
        debug_assert_eq!(self.package, other.package);
        let (positive, set) = match (self.positive, other.positive) {
            (true, true) => (true, self.set.intersection(&other.set)),
            (true, false) => (true, self.set.intersection(&other.set.complement())),
            (false, true) => (true, self.set.complement().intersection(&other.set)),
            (false, false) => (false, self.set.union(&other.set)),
        };
        Term {
            package: self.package,
            positive,
            set,
        }
    }

    /// Whether every selection allowed by `other` is allowed by `self`.
    fn subsumes(&self, other: &Term) -> bool {
        &self.intersect(other) == other
    }

    fn relation_with(&self, assigned: &Term) -> TermRelation {
        let full = self.intersect(assigned);
        if &full == assigned {
            TermRelation::Satisfied
        } else if full.positive && full.set.is_empty() {
            TermRelation::Contradicted
        } else {
            TermRelation::Inconclusive
        }
    }
}

enum TermRelation {
    Satisfied,
    Contradicted,
    Inconclusive,
}

/// Why an incompatibility holds.
#[derive(Debug, Clone)]
pub enum IncompatCause {
    /// The root must be selected.
    Root,
    /// No candidate of a package matches the accumulated constraint.
    NoVersions,
    /// A version's dependencies could not be obtained.
    Unavailable { reason: String },
    /// `package version` depends on `dep` within `range`.
    Dependency {
        package: PackageId,
        version: Version,
        dep: PackageId,
        range: VersionRange,
    },
    /// Learned by merging two prior incompatibilities.
    Conflict { left: IncompatId, right: IncompatId },
}

/// A set of literals that cannot all hold. At most one term per package.
#[derive(Debug, Clone)]
pub struct Incompatibility {
    pub terms: Vec<Term>,
    pub cause: IncompatCause,
}

impl Incompatibility {
    fn term_for(&self, package: PackageId) -> Option<&Term> {
        self.terms.iter().find(|term| term.package == package)
    }
}

// ---------------------------------------------------------------------------
// Assignments

#[derive(Debug, Clone)]
enum AssignmentKind {
    Decision(usize),
    Derivation { term: Term, cause: IncompatId },
}

#[derive(Debug, Clone)]
struct Assignment {
    package: PackageId,
    kind: AssignmentKind,
    decision_level: usize,
}

impl Assignment {
    fn as_term(&self, universe_len: usize) -> Term {
        match &self.kind {
            AssignmentKind::Decision(index) => Term {
                package: self.package,
                positive: true,
                set: VersionSet::singleton(universe_len, *index),
            },
            AssignmentKind::Derivation { term, .. } => term.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure reporting

/// The external facts a failed resolution derives from, in first-use
/// order with duplicates removed.
#[derive(Debug, Clone)]
pub struct ConflictReport {
    pub lines: Vec<String>,
    /// `(package, version, dep, range)` for every dependency edge that
    /// participated in the conflict.
    pub dependency_facts: Vec<(PackageName, Version, PackageName, VersionRange)>,
}

impl Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lines.is_empty() {
            return write!(f, "the declared constraints are unsatisfiable");
        }
        write!(f, "{}", self.lines.join("; "))
    }
}

/// Resolution failure: either no solution exists, or a collaborator
/// (registry, cache, network) failed and the solve was aborted.
#[derive(Debug)]
pub enum SolveError {
    NoSolution(ConflictReport),
    Fatal(Error),
}

impl From<Error> for SolveError {
    fn from(e: Error) -> Self {
        SolveError::Fatal(e)
    }
}

// ---------------------------------------------------------------------------
// Core state

enum Relation {
    Satisfied,
    AlmostSatisfied(Term),
    Contradicted,
    Inconclusive,
}

struct State<'a, P: DependencyProvider + ?Sized> {
    provider: &'a P,
    root_deps: Vec<(PackageName, VersionRange)>,

    packages: Vec<SolverPackage>,
    package_ids: HashMap<SolverPackage, PackageId>,
    universes: Vec<Vec<Version>>,

    incompats: Vec<Incompatibility>,
    indexed: Vec<bool>,
    index: HashMap<PackageId, Vec<IncompatId>>,

    assignments: Vec<Assignment>,
    decision_level: usize,
    deps_added: HashSet<(PackageId, usize)>,
}

/// Resolve the root's constraints to one version per referenced
/// package. `root_deps` order is significant: earlier entries are
/// constrained first and therefore decided first.
pub fn solve<P: DependencyProvider + ?Sized>(
    provider: &P,
    root_version: Version,
    root_deps: &[(PackageName, VersionRange)],
) -> Result<BTreeMap<PackageName, Version>, SolveError> {
    let mut state = State::new(provider, root_version, root_deps.to_vec());

    // The root must be selected: {¬(root = its version)} is the seed.
    let seed = Incompatibility {
        terms: vec![Term {
            package: ROOT,
            positive: false,
            set: VersionSet::singleton(1, ROOT_VERSION_INDEX),
        }],
        cause: IncompatCause::Root,
    };
    state.store(seed, true);

    let mut next = ROOT;
    loop {
        state.unit_propagation(next)?;
        match state.decide()? {
            Some(package) => next = package,
            None => return Ok(state.solution()),
        }
    }
}

impl<'a, P: DependencyProvider + ?Sized> State<'a, P> {
    fn new(provider: &'a P, root_version: Version, root_deps: Vec<(PackageName, VersionRange)>) -> Self {
        let mut state = Self {
            provider,
            root_deps,
            packages: Vec::new(),
            package_ids: HashMap::new(),
            universes: Vec::new(),
            incompats: Vec::new(),
            indexed: Vec::new(),
            index: HashMap::new(),
            assignments: Vec::new(),
            decision_level: 0,
            deps_added: HashSet::new(),
        };
        state.packages.push(SolverPackage::Root);
        state.package_ids.insert(SolverPackage::Root, ROOT);
        state.universes.push(vec![root_version]);
        state
    }

    fn intern(&mut self, pkg: &PackageName) -> Result<PackageId, SolveError> {
        let key = SolverPackage::Named(pkg.clone());
        if let Some(&id) = self.package_ids.get(&key) {
            return Ok(id);
        }
        let universe = self.provider.versions(pkg)?;
        let id = self.packages.len();
        self.packages.push(key.clone());
        self.package_ids.insert(key, id);
        self.universes.push(universe);
        Ok(id)
    }

    fn universe_len(&self, package: PackageId) -> usize {
        self.universes[package].len()
    }

    fn store(&mut self, incompat: Incompatibility, index_now: bool) -> IncompatId {
        let id = self.incompats.len();
        self.incompats.push(incompat);
        self.indexed.push(false);
        if index_now {
            self.ensure_indexed(id);
        }
        id
    }

    fn ensure_indexed(&mut self, id: IncompatId) {
        if self.indexed[id] {
            return;
        }
        self.indexed[id] = true;
        for term in &self.incompats[id].terms {
            self.index.entry(term.package).or_default().push(id);
        }
    }

    // -- partial solution ---------------------------------------------------

    fn assignment_intersection(&self, package: PackageId) -> Option<Term> {
        let mut acc: Option<Term> = None;
        for assignment in &self.assignments {
            if assignment.package != package {
                continue;
            }
            let term = assignment.as_term(self.universe_len(package));
            acc = Some(match acc {
                None => term,
                Some(prev) => prev.intersect(&term),
            });
        }
        acc
    }

    fn decision_for(&self, package: PackageId) -> Option<usize> {
        self.assignments.iter().find_map(|assignment| {
            if assignment.package == package {
                if let AssignmentKind::Decision(index) = assignment.kind {
                    return Some(index);
                }
            }
            None
        })
    }

    fn derive(&mut self, term: Term, cause: IncompatId) {
        self.assignments.push(Assignment {
            package: term.package,
            kind: AssignmentKind::Derivation { term, cause },
            decision_level: self.decision_level,
        });
    }

    fn backtrack(&mut self, level: usize) {
        self.assignments
            .retain(|assignment| assignment.decision_level <= level);
        self.decision_level = level;
    }

    fn solution(&self) -> BTreeMap<PackageName, Version> {
        let mut solution = BTreeMap::new();
        for assignment in &self.assignments {
            if let AssignmentKind::Decision(index) = assignment.kind {
                if let SolverPackage::Named(pkg) = &self.packages[assignment.package] {
                    solution.insert(pkg.clone(), self.universes[assignment.package][index]);
                }
            }
        }
        solution
    }

    // -- unit propagation ---------------------------------------------------

    fn relation(&self, id: IncompatId) -> Relation {
        let incompat = &self.incompats[id];
        let mut unsatisfied: Option<&Term> = None;
        for term in &incompat.terms {
            match self.assignment_intersection(term.package) {
                Some(assigned) => match term.relation_with(&assigned) {
                    TermRelation::Satisfied => {}
                    TermRelation::Contradicted => return Relation::Contradicted,
                    TermRelation::Inconclusive => {
                        if unsatisfied.is_some() {
                            return Relation::Inconclusive;
                        }
                        unsatisfied = Some(term);
                    }
                },
                None => {
                    if unsatisfied.is_some() {
                        return Relation::Inconclusive;
                    }
                    unsatisfied = Some(term);
                }
            }
        }
        match unsatisfied {
            None => Relation::Satisfied,
            Some(term) => Relation::AlmostSatisfied(term.clone()),
        }
    }

    fn unit_propagation(&mut self, start: PackageId) -> Result<(), SolveError> {
        let mut changed = vec![start];
        while let Some(current) = changed.pop() {
            let ids: Vec<IncompatId> = self.index.get(&current).cloned().unwrap_or_default();
            let mut conflict = None;
            for id in ids {
                match self.relation(id) {
                    Relation::Satisfied => {
                        conflict = Some(id);
                        break;
                    }
                    Relation::AlmostSatisfied(term) => {
                        let negated = term.negate();
                        let package = negated.package;
                        self.derive(negated, id);
                        if !changed.contains(&package) {
                            changed.push(package);
                        }
                    }
                    _ => {}
                }
            }
            if let Some(id) = conflict {
                let learned = self.resolve_conflict(id)?;
                match self.relation(learned) {
                    Relation::AlmostSatisfied(term) => {
                        let negated = term.negate();
                        let package = negated.package;
                        self.derive(negated, learned);
                        changed.clear();
                        changed.push(package);
                    }
                    // Backtracking leaves the learned clause with
                    // exactly one unsatisfied term.
                    _ => unreachable!("learned clause is not a unit clause"),
                }
            }
        }
        Ok(())
    }

    // -- conflict resolution ------------------------------------------------

    fn is_terminal(&self, incompat: &Incompatibility) -> bool {
        incompat.terms.is_empty()
            || (incompat.terms.len() == 1
                && incompat.terms[0].package == ROOT
                && incompat.terms[0].positive)
    }

    fn resolve_conflict(&mut self, conflict: IncompatId) -> Result<IncompatId, SolveError> {
        let mut current = conflict;
        loop {
            if self.is_terminal(&self.incompats[current]) {
                return Err(SolveError::NoSolution(self.build_report(current)));
            }

            let satisfier_index = self.find_satisfier(current);
            let satisfier = self.assignments[satisfier_index].clone();
            let satisfier_term =
                satisfier.as_term(self.universe_len(satisfier.package));
            let incompat_term = self.incompats[current]
                .term_for(satisfier.package)
                .cloned()
                .expect("satisfier package must appear in the incompatibility");
            let previous_level = self.find_previous_satisfier_level(current, satisfier_index);

            let is_decision = matches!(satisfier.kind, AssignmentKind::Decision(_));
            if is_decision || previous_level != satisfier.decision_level {
                self.backtrack(previous_level);
                self.ensure_indexed(current);
                return Ok(current);
            }

            // Merge with the satisfier's cause into a prior cause.
            let cause = match &satisfier.kind {
                AssignmentKind::Derivation { cause, .. } => *cause,
                AssignmentKind::Decision(_) => unreachable!(),
            };
            let mut merged: Vec<Term> = Vec::new();
            for term in self.incompats[current]
                .terms
                .iter()
                .chain(self.incompats[cause].terms.iter())
            {
                if term.package == satisfier.package {
                    continue;
                }
                match merged.iter_mut().find(|t| t.package == term.package) {
                    Some(existing) => *existing = existing.intersect(term),
                    None => merged.push(term.clone()),
                }
            }
            // Partial satisfaction: keep the part of the satisfier that
            // fell outside the incompatibility's term.
            if !satisfier_term.subsumes(&incompat_term) {
                let leftover = satisfier_term.intersect(&incompat_term.negate());
                merged.push(leftover.negate());
            }
            merged.sort_by_key(|term| term.package);

            current = self.store(
                Incompatibility {
                    terms: merged,
                    cause: IncompatCause::Conflict {
                        left: current,
                        right: cause,
                    },
                },
                false,
            );
        }
    }

    /// Earliest assignment index at which the incompatibility becomes
    /// fully satisfied by the partial solution up to and including it.
    fn find_satisfier(&self, incompat: IncompatId) -> usize {
        let mut acc: HashMap<PackageId, Term> = HashMap::new();
        for (index, assignment) in self.assignments.iter().enumerate() {
            if self.incompats[incompat]
                .term_for(assignment.package)
                .is_none()
            {
                continue;
            }
            let term = assignment.as_term(self.universe_len(assignment.package));
            acc.entry(assignment.package)
                .and_modify(|existing| *existing = existing.intersect(&term))
                .or_insert(term);
            if self.satisfied_by(incompat, &acc) {
                return index;
            }
        }
        unreachable!("conflict without a satisfier")
    }

    /// Decision level of the earliest assignment that, together with
    /// the satisfier, still satisfies the incompatibility. Level 1
    /// (just after the root decision) when the satisfier suffices alone.
    fn find_previous_satisfier_level(
        &self,
        incompat: IncompatId,
        satisfier_index: usize,
    ) -> usize {
        let satisfier = &self.assignments[satisfier_index];
        let mut acc: HashMap<PackageId, Term> = HashMap::new();
        acc.insert(
            satisfier.package,
            satisfier.as_term(self.universe_len(satisfier.package)),
        );
        if self.satisfied_by(incompat, &acc) {
            return 1;
        }
        for (index, assignment) in self.assignments.iter().enumerate() {
            if index == satisfier_index {
                continue;
            }
            if self.incompats[incompat]
                .term_for(assignment.package)
                .is_none()
            {
                continue;
            }
            let term = assignment.as_term(self.universe_len(assignment.package));
            acc.entry(assignment.package)
                .and_modify(|existing| *existing = existing.intersect(&term))
                .or_insert(term);
            if self.satisfied_by(incompat, &acc) {
                return assignment.decision_level.max(1);
            }
        }
        1
    }

    fn satisfied_by(&self, incompat: IncompatId, acc: &HashMap<PackageId, Term>) -> bool {
        self.incompats[incompat].terms.iter().all(|term| {
            acc.get(&term.package)
                .map(|assigned| term.subsumes(assigned))
                .unwrap_or(false)
        })
    }

    // -- decision making ----------------------------------------------------

    /// Pick the earliest-constrained undecided package and try to
    /// decide its newest candidate, adding that version's dependency
    /// incompatibilities first.
    fn decide(&mut self) -> Result<Option<PackageId>, SolveError> {
        let chosen = self.next_undecided();
        let (package, candidates) = match chosen {
            Some(found) => found,
            None => return Ok(None),
        };

        let version_index = match candidates.first() {
            Some(index) => index,
            None => {
                // Nothing in the universe matches the accumulated
                // constraint.
                let no_versions = Incompatibility {
                    terms: vec![Term {
                        package,
                        positive: true,
                        set: candidates,
                    }],
                    cause: IncompatCause::NoVersions,
                };
                self.store(no_versions, true);
                return Ok(Some(package));
            }
        };
        let version = self.universes[package][version_index];

        let mut conflict = false;
        if !self.deps_added.contains(&(package, version_index)) {
            let new_ids = self.add_dependency_incompats(package, version, version_index)?;
            self.deps_added.insert((package, version_index));
            for id in new_ids {
                conflict = conflict || self.satisfied_but_for(id, package);
            }
        } else {
            // Revisiting a version after backtracking: its dependency
            // incompatibilities are already in the arena.
            let ids: Vec<IncompatId> = self.index.get(&package).cloned().unwrap_or_default();
            for id in ids {
                let relevant = matches!(
                    &self.incompats[id].cause,
                    IncompatCause::Dependency { package: p, version: v, .. }
                        if *p == package && *v == version
                );
                if relevant {
                    conflict = conflict || self.satisfied_but_for(id, package);
                }
            }
        }

        if !conflict {
            self.decision_level += 1;
            self.assignments.push(Assignment {
                package,
                kind: AssignmentKind::Decision(version_index),
                decision_level: self.decision_level,
            });
        }
        Ok(Some(package))
    }

    /// The undecided package with a positive constraint whose first
    /// assignment appeared earliest, together with its candidate set.
    fn next_undecided(&self) -> Option<(PackageId, VersionSet)> {
        let mut seen: HashSet<PackageId> = HashSet::new();
        for assignment in &self.assignments {
            let package = assignment.package;
            if !seen.insert(package) {
                continue;
            }
            if self.decision_for(package).is_some() {
                continue;
            }
            let acc = match self.assignment_intersection(package) {
                Some(acc) => acc,
                None => continue,
            };
            if !acc.positive {
                continue;
            }
            return Some((package, acc.set));
        }
        None
    }

    /// All terms besides `package`'s already satisfied: deciding would
    /// immediately violate the incompatibility.
    fn satisfied_but_for(&self, id: IncompatId, package: PackageId) -> bool {
        self.incompats[id].terms.iter().all(|term| {
            if term.package == package {
                return true;
            }
            match self.assignment_intersection(term.package) {
                Some(assigned) => {
                    matches!(term.relation_with(&assigned), TermRelation::Satisfied)
                }
                None => false,
            }
        })
    }

    fn add_dependency_incompats(
        &mut self,
        package: PackageId,
        version: Version,
        version_index: usize,
    ) -> Result<Vec<IncompatId>, SolveError> {
        let deps = match &self.packages[package] {
            SolverPackage::Root => Ok(self.root_deps.clone()),
            SolverPackage::Named(pkg) => self.provider.dependencies_of(pkg, version),
        };
        let deps = match deps {
            Ok(deps) => deps,
            Err(e @ (Error::Network(_) | Error::Http(_) | Error::Io(_) | Error::NoOfflineSolution)) => {
                return Err(SolveError::Fatal(e));
            }
            Err(e) => {
                // The version itself is unusable; rule it out and let
                // propagation move on.
                let unusable = Incompatibility {
                    terms: vec![Term {
                        package,
                        positive: true,
                        set: VersionSet::singleton(self.universe_len(package), version_index),
                    }],
                    cause: IncompatCause::Unavailable {
                        reason: e.to_string(),
                    },
                };
                return Ok(vec![self.store(unusable, true)]);
            }
        };

        let mut ids = Vec::with_capacity(deps.len());
        for (dep, range) in deps {
            if SolverPackage::Named(dep.clone()) == self.packages[package] {
                continue;
            }
            let dep_id = self.intern(&dep)?;
            let dep_set = VersionSet::from_range(&range, &self.universes[dep_id]);
            let incompat = Incompatibility {
                terms: vec![
                    Term {
                        package,
                        positive: true,
                        set: VersionSet::singleton(self.universe_len(package), version_index),
                    },
                    Term {
                        package: dep_id,
                        positive: false,
                        set: dep_set,
                    },
                ],
                cause: IncompatCause::Dependency {
                    package,
                    version,
                    dep: dep_id,
                    range,
                },
            };
            ids.push(self.store(incompat, true));
        }
        Ok(ids)
    }

    // -- reporting ----------------------------------------------------------

    fn build_report(&self, terminal: IncompatId) -> ConflictReport {
        let mut externals = Vec::new();
        let mut seen = HashSet::new();
        self.collect_externals(terminal, &mut externals, &mut seen);

        let mut lines = Vec::new();
        let mut dependency_facts = Vec::new();
        for id in externals {
            match &self.incompats[id].cause {
                IncompatCause::Root => {}
                IncompatCause::NoVersions => {
                    if let Some(term) = self.incompats[id].terms.first() {
                        lines.push(format!(
                            "no acceptable version of {} exists in the registry",
                            self.packages[term.package]
                        ));
                    }
                }
                IncompatCause::Unavailable { reason } => {
                    if let Some(term) = self.incompats[id].terms.first() {
                        lines.push(format!(
                            "{} is unusable: {}",
                            self.packages[term.package], reason
                        ));
                    }
                }
                IncompatCause::Dependency {
                    package,
                    version,
                    dep,
                    range,
                } => {
                    lines.push(format!(
                        "{} {} depends on {} {}",
                        self.packages[*package], version, self.packages[*dep], range
                    ));
                    if let (SolverPackage::Named(pkg), SolverPackage::Named(dep_pkg)) =
                        (&self.packages[*package], &self.packages[*dep])
                    {
                        dependency_facts.push((pkg.clone(), *version, dep_pkg.clone(), *range));
                    }
                }
                IncompatCause::Conflict { .. } => {}
            }
        }
        lines.dedup();
        ConflictReport {
            lines,
            dependency_facts,
        }
    }

    fn collect_externals(
        &self,
        id: IncompatId,
        out: &mut Vec<IncompatId>,
        seen: &mut HashSet<IncompatId>,
    ) {
        if !seen.insert(id) {
            return;
        }
        match &self.incompats[id].cause {
            IncompatCause::Conflict { left, right } => {
                self.collect_externals(*left, out, seen);
                self.collect_externals(*right, out, seen);
            }
            _ => out.push(id),
        }
    }
}
