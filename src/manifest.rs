//! elm.json reading, mutation, and canonical writing
//!
//! The manifest comes in two kinds selected by the top-level `"type"`
//! key: applications pin every dependency to an exact version across
//! four maps (direct, indirect, test-direct, test-indirect), packages
//! declare ranges across two. All non-dependency keys from the original
//! file survive a rewrite; only the dependency sections are replaced.
//!
//! # Examples
//!
//! ```no_run
//! use elmpm::manifest::Manifest;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut manifest = Manifest::load("elm.json".as_ref())?;
//! if let Some(pkg) = elmpm::package::PackageName::parse("elm/json") {
//!     manifest.promote(&pkg);
//! }
//! manifest.save("elm.json".as_ref())?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::Path;

use serde_json::Value;

use crate::cache::PackageCache;
use crate::error::{Error, Result};
use crate::flags;
use crate::package::PackageName;
use crate::version::{Version, VersionRange};

/// Where a package lives inside a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepLocation {
    None,
    Direct,
    Indirect,
    TestDirect,
    TestIndirect,
    PkgDep,
    PkgTestDep,
}

/// A dependency constraint as found in a package manifest.
///
/// The original text is kept verbatim so an untouched entry round-trips
/// byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeText {
    pub text: String,
    pub range: VersionRange,
}

impl RangeText {
    /// Parse manifest constraint text, keeping it verbatim.
    pub fn from_text(text: &str) -> Option<Self> {
        let range = VersionRange::parse_constraint(text)?;
        Some(Self {
            text: text.to_string(),
            range,
        })
    }

    /// Constraint for an exact version input: package manifests widen a
    /// pin to the next major on write.
    pub fn pinned(version: Version) -> Self {
        let range = VersionRange::until_next_major(version);
        Self {
            text: range.to_string(),
            range,
        }
    }

    /// Constraint with canonical text for an arbitrary range.
    pub fn from_range(range: VersionRange) -> Self {
        Self {
            text: range.to_string(),
            range,
        }
    }
}

/// `exposed-modules`: a flat list or an ordered set of categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExposedModules {
    List(Vec<String>),
    Categorized(Vec<(String, Vec<String>)>),
}

impl ExposedModules {
    /// All exposed module names, category structure flattened away.
    pub fn names(&self) -> Vec<&str> {
        match self {
            ExposedModules::List(names) => names.iter().map(String::as_str).collect(),
            ExposedModules::Categorized(categories) => categories
                .iter()
                .flat_map(|(_, names)| names.iter().map(String::as_str))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationManifest {
    pub elm_version: String,
    pub source_directories: Vec<String>,
    pub direct: BTreeMap<PackageName, Version>,
    pub indirect: BTreeMap<PackageName, Version>,
    pub test_direct: BTreeMap<PackageName, Version>,
    pub test_indirect: BTreeMap<PackageName, Version>,
    /// Unrecognized top-level keys, preserved across rewrites.
    pub extra: Vec<(String, Value)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageManifest {
    pub name: PackageName,
    pub summary: Option<String>,
    pub license: Option<String>,
    pub version: Version,
    pub exposed_modules: ExposedModules,
    pub elm_version: String,
    pub deps: BTreeMap<PackageName, RangeText>,
    pub test_deps: BTreeMap<PackageName, RangeText>,
    pub extra: Vec<(String, Value)>,
}

/// A parsed elm.json, tagged by project kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Manifest {
    Application(ApplicationManifest),
    Package(PackageManifest),
}

impl Manifest {
    /// Load and validate an elm.json file.
    pub fn load(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)
            .map_err(|_| Error::parse(path.display().to_string(), "elm.json not found"))?;
        if metadata.len() > flags::max_elm_json_bytes() {
            return Err(Error::parse(
                path.display().to_string(),
                format!(
                    "file is {} bytes, larger than the {} byte limit",
                    metadata.len(),
                    flags::max_elm_json_bytes()
                ),
            ));
        }
        let content = fs::read_to_string(path)?;
        Self::from_str_named(&content, &path.display().to_string())
    }

    /// Parse manifest text. `file` names the source in errors.
    pub fn from_str_named(content: &str, file: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| Error::parse(file, format!("invalid JSON: {}", e)))?;
        let object = value
            .as_object()
            .ok_or_else(|| Error::parse(file, "expected a JSON object"))?;
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::parse(file, "missing \"type\" field"))?;
        match kind {
            "application" => parse_application(object, file).map(Manifest::Application),
            "package" => parse_package(object, file).map(Manifest::Package),
            other => Err(Error::parse(
                file,
                format!(
                    "unknown project type \"{}\", expected \"application\" or \"package\"",
                    other
                ),
            )),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Manifest::Application(_) => "application",
            Manifest::Package(_) => "package",
        }
    }

    pub fn source_directories(&self) -> Vec<String> {
        match self {
            Manifest::Application(app) => app.source_directories.clone(),
            Manifest::Package(_) => vec!["src".to_string()],
        }
    }

    /// Locate a package among the dependency maps.
    pub fn find(&self, pkg: &PackageName) -> DepLocation {
        match self {
            Manifest::Application(app) => {
                if app.direct.contains_key(pkg) {
                    DepLocation::Direct
                } else if app.indirect.contains_key(pkg) {
                    DepLocation::Indirect
                } else if app.test_direct.contains_key(pkg) {
                    DepLocation::TestDirect
                } else if app.test_indirect.contains_key(pkg) {
                    DepLocation::TestIndirect
                } else {
                    DepLocation::None
                }
            }
            Manifest::Package(package) => {
                if package.deps.contains_key(pkg) {
                    DepLocation::PkgDep
                } else if package.test_deps.contains_key(pkg) {
                    DepLocation::PkgTestDep
                } else {
                    DepLocation::None
                }
            }
        }
    }

    /// Move a package one rung toward the direct production map without
    /// changing its version: indirect to direct, test-indirect to
    /// test-direct, test-direct to direct (test-dep to dep for package
    /// projects). Returns whether a move happened.
    pub fn promote(&mut self, pkg: &PackageName) -> bool {
        match self {
            Manifest::Application(app) => {
                if let Some(version) = app.indirect.remove(pkg) {
                    app.direct.insert(pkg.clone(), version);
                    true
                } else if let Some(version) = app.test_indirect.remove(pkg) {
                    app.test_direct.insert(pkg.clone(), version);
                    true
                } else if let Some(version) = app.test_direct.remove(pkg) {
                    app.direct.insert(pkg.clone(), version);
                    true
                } else {
                    false
                }
            }
            Manifest::Package(package) => {
                if let Some(range) = package.test_deps.remove(pkg) {
                    package.deps.insert(pkg.clone(), range);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Insert a package at an explicit location.
    ///
    /// For applications `remove_first` clears the package from all four
    /// maps before the insert, so the target map is unambiguous. Package
    /// projects always write into deps or test-deps with the pin widened
    /// to a next-major constraint.
    pub fn add_or_update(
        &mut self,
        pkg: &PackageName,
        version: Version,
        is_test: bool,
        is_direct: bool,
        remove_first: bool,
    ) {
        match self {
            Manifest::Application(app) => {
                if remove_first {
                    app.direct.remove(pkg);
                    app.indirect.remove(pkg);
                    app.test_direct.remove(pkg);
                    app.test_indirect.remove(pkg);
                }
                let target = match (is_test, is_direct) {
                    (false, true) => &mut app.direct,
                    (false, false) => &mut app.indirect,
                    (true, true) => &mut app.test_direct,
                    (true, false) => &mut app.test_indirect,
                };
                target.insert(pkg.clone(), version);
            }
            Manifest::Package(package) => {
                let target = if is_test {
                    &mut package.test_deps
                } else {
                    &mut package.deps
                };
                target.insert(pkg.clone(), RangeText::pinned(version));
            }
        }
    }

    /// Update a package's version wherever it currently lives.
    ///
    /// A package present in exactly one map stays there. A package
    /// duplicated across maps (malformed input) is updated in every
    /// occurrence so the manifest at least becomes internally
    /// consistent. An absent package is added at `default`.
    pub fn apply_change_preserving_location(
        &mut self,
        pkg: &PackageName,
        version: Version,
        default: DepLocation,
    ) {
        match self {
            Manifest::Application(app) => {
                let mut found = false;
                for map in [
                    &mut app.direct,
                    &mut app.indirect,
                    &mut app.test_direct,
                    &mut app.test_indirect,
                ] {
                    if let Some(slot) = map.get_mut(pkg) {
                        *slot = version;
                        found = true;
                    }
                }
                if !found {
                    let (is_test, is_direct) = match default {
                        DepLocation::Direct => (false, true),
                        DepLocation::TestDirect => (true, true),
                        DepLocation::TestIndirect => (true, false),
                        _ => (false, false),
                    };
                    self.add_or_update(pkg, version, is_test, is_direct, false);
                }
            }
            Manifest::Package(package) => {
                let mut found = false;
                for map in [&mut package.deps, &mut package.test_deps] {
                    if let Some(slot) = map.get_mut(pkg) {
                        *slot = RangeText::pinned(version);
                        found = true;
                    }
                }
                if !found {
                    let is_test = default == DepLocation::PkgTestDep;
                    self.add_or_update(pkg, version, is_test, true, false);
                }
            }
        }
    }

    /// Remove a package from every map it appears in. Orphaned indirect
    /// dependencies are left alone; see [`Manifest::find_orphaned_packages`].
    pub fn remove(&mut self, pkg: &PackageName) -> bool {
        match self {
            Manifest::Application(app) => {
                let mut removed = false;
                removed |= app.direct.remove(pkg).is_some();
                removed |= app.indirect.remove(pkg).is_some();
                removed |= app.test_direct.remove(pkg).is_some();
                removed |= app.test_indirect.remove(pkg).is_some();
                removed
            }
            Manifest::Package(package) => {
                let mut removed = false;
                removed |= package.deps.remove(pkg).is_some();
                removed |= package.test_deps.remove(pkg).is_some();
                removed
            }
        }
    }

    /// Indirect entries no longer reachable from any direct dependency.
    ///
    /// Reachability walks declared dependencies of cached package
    /// manifests; packages whose manifest is missing from the cache
    /// contribute no edges.
    pub fn find_orphaned_packages(&self, cache: &PackageCache) -> Vec<PackageName> {
        let app = match self {
            Manifest::Application(app) => app,
            Manifest::Package(_) => return Vec::new(),
        };

        let mut reachable: Vec<PackageName> = Vec::new();
        let mut queue: Vec<(PackageName, Version)> = app
            .direct
            .iter()
            .chain(app.test_direct.iter())
            .map(|(pkg, version)| (pkg.clone(), *version))
            .collect();
        while let Some((pkg, version)) = queue.pop() {
            if reachable.contains(&pkg) {
                continue;
            }
            reachable.push(pkg.clone());
            let deps = match cache.dependencies_of(&pkg, version) {
                Ok(deps) => deps,
                Err(_) => continue,
            };
            for (dep, _) in deps {
                let pinned = app
                    .indirect
                    .get(&dep)
                    .or_else(|| app.test_indirect.get(&dep))
                    .or_else(|| app.direct.get(&dep))
                    .or_else(|| app.test_direct.get(&dep));
                if let Some(v) = pinned {
                    queue.push((dep, *v));
                }
            }
        }

        let mut orphans: Vec<PackageName> = app
            .indirect
            .keys()
            .chain(app.test_indirect.keys())
            .filter(|pkg| !reachable.contains(pkg))
            .cloned()
            .collect();
        orphans.sort();
        orphans.dedup();
        orphans
    }

    /// Every pinned dependency of an application, across all four maps.
    pub fn all_pinned(&self) -> BTreeMap<PackageName, Version> {
        match self {
            Manifest::Application(app) => app
                .direct
                .iter()
                .chain(app.indirect.iter())
                .chain(app.test_direct.iter())
                .chain(app.test_indirect.iter())
                .map(|(pkg, version)| (pkg.clone(), *version))
                .collect(),
            Manifest::Package(_) => BTreeMap::new(),
        }
    }

    /// Render the canonical on-disk form: fixed key order, 4-space
    /// indent, maps sorted by author then name, `{}` for empty maps,
    /// trailing newline.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("{\n");
        match self {
            Manifest::Application(app) => {
                push_string_field(&mut out, "type", "application");
                push_string_array(&mut out, "source-directories", &app.source_directories);
                push_string_field(&mut out, "elm-version", &app.elm_version);
                push_key(&mut out, "dependencies");
                out.push_str("{\n");
                push_version_map(&mut out, "direct", &app.direct, 2, true);
                push_version_map(&mut out, "indirect", &app.indirect, 2, false);
                out.push_str("    },\n");
                push_key(&mut out, "test-dependencies");
                out.push_str("{\n");
                push_version_map(&mut out, "direct", &app.test_direct, 2, true);
                push_version_map(&mut out, "indirect", &app.test_indirect, 2, false);
                if app.extra.is_empty() {
                    out.push_str("    }\n");
                } else {
                    out.push_str("    },\n");
                    push_extra(&mut out, &app.extra);
                }
            }
            Manifest::Package(package) => {
                push_string_field(&mut out, "type", "package");
                push_string_field(&mut out, "name", &package.name.to_string());
                if let Some(summary) = &package.summary {
                    push_string_field(&mut out, "summary", summary);
                }
                if let Some(license) = &package.license {
                    push_string_field(&mut out, "license", license);
                }
                push_string_field(&mut out, "version", &package.version.to_string());
                push_exposed_modules(&mut out, &package.exposed_modules);
                push_string_field(&mut out, "elm-version", &package.elm_version);
                push_range_map(&mut out, "dependencies", &package.deps, true);
                let has_extra = !package.extra.is_empty();
                push_range_map(&mut out, "test-dependencies", &package.test_deps, has_extra);
                if has_extra {
                    push_extra(&mut out, &package.extra);
                }
            }
        }
        out.push_str("}\n");
        out
    }

    /// Write the canonical form atomically: `<path>.tmp`, fsync, rename.
    /// The temp file is unlinked if anything fails before the rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        atomic_write(path, self.render().as_bytes())
    }
}

/// Write `contents` to `path` through a fsynced tempfile rename, never
/// exposing a partially-written file.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = std::path::PathBuf::from(tmp_name);
    let write_result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        Ok(())
    })();
    if let Err(e) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(Error::Fs(format!(
            "failed to write {}: {}",
            tmp_path.display(),
            e
        )));
    }
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(Error::Fs(format!(
            "failed to rename {} into place: {}",
            tmp_path.display(),
            e
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Parsing

const RECOGNIZED_APP_KEYS: &[&str] = &[
    "type",
    "source-directories",
    "elm-version",
    "dependencies",
    "test-dependencies",
];

const RECOGNIZED_PKG_KEYS: &[&str] = &[
    "type",
    "name",
    "summary",
    "license",
    "version",
    "exposed-modules",
    "elm-version",
    "dependencies",
    "test-dependencies",
];

fn parse_application(
    object: &serde_json::Map<String, Value>,
    file: &str,
) -> Result<ApplicationManifest> {
    let elm_version = require_string(object, "elm-version", file)?;
    let source_directories = match object.get("source-directories") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::parse(file, "\"source-directories\" must hold strings"))
            })
            .collect::<Result<Vec<_>>>()?,
        Some(_) => return Err(Error::parse(file, "\"source-directories\" must be an array")),
        None => vec!["src".to_string()],
    };

    let deps = object.get("dependencies");
    let test_deps = object.get("test-dependencies");
    let manifest = ApplicationManifest {
        elm_version,
        source_directories,
        direct: parse_pinned_map(nested(deps, "direct"), file, "dependencies.direct")?,
        indirect: parse_pinned_map(nested(deps, "indirect"), file, "dependencies.indirect")?,
        test_direct: parse_pinned_map(
            nested(test_deps, "direct"),
            file,
            "test-dependencies.direct",
        )?,
        test_indirect: parse_pinned_map(
            nested(test_deps, "indirect"),
            file,
            "test-dependencies.indirect",
        )?,
        extra: collect_extra(object, RECOGNIZED_APP_KEYS),
    };

    let mut seen: Vec<&PackageName> = Vec::new();
    for map in [
        &manifest.direct,
        &manifest.indirect,
        &manifest.test_direct,
        &manifest.test_indirect,
    ] {
        for pkg in map.keys() {
            if seen.contains(&pkg) {
                return Err(Error::parse(
                    file,
                    format!("package {} appears in more than one dependency map", pkg),
                ));
            }
            seen.push(pkg);
        }
    }
    Ok(manifest)
}

fn parse_package(object: &serde_json::Map<String, Value>, file: &str) -> Result<PackageManifest> {
    let name_text = require_string(object, "name", file)?;
    let name = PackageName::parse(&name_text)
        .ok_or_else(|| Error::parse(file, format!("invalid package name \"{}\"", name_text)))?;
    let version_text = require_string(object, "version", file)?;
    let version = Version::parse(&version_text)
        .ok_or_else(|| Error::parse(file, format!("invalid version \"{}\"", version_text)))?;
    let exposed_modules = parse_exposed_modules(object.get("exposed-modules"), file)?;

    Ok(PackageManifest {
        name,
        summary: object
            .get("summary")
            .and_then(Value::as_str)
            .map(str::to_string),
        license: object
            .get("license")
            .and_then(Value::as_str)
            .map(str::to_string),
        version,
        exposed_modules,
        elm_version: require_string(object, "elm-version", file)?,
        deps: parse_constraint_map(object.get("dependencies"), file, "dependencies")?,
        test_deps: parse_constraint_map(object.get("test-dependencies"), file, "test-dependencies")?,
        extra: collect_extra(object, RECOGNIZED_PKG_KEYS),
    })
}

fn nested<'a>(value: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    value.and_then(|v| v.get(key))
}

fn require_string(
    object: &serde_json::Map<String, Value>,
    key: &str,
    file: &str,
) -> Result<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::parse(file, format!("missing \"{}\" field", key)))
}

const MAX_VERSION_TEXT_BYTES: usize = 64;

fn parse_pinned_map(
    value: Option<&Value>,
    file: &str,
    what: &str,
) -> Result<BTreeMap<PackageName, Version>> {
    let mut map = BTreeMap::new();
    let object = match value {
        Some(Value::Object(object)) => object,
        Some(_) => return Err(Error::parse(file, format!("\"{}\" must be an object", what))),
        None => return Ok(map),
    };
    if object.len() > flags::max_dependency_entries() {
        return Err(Error::parse(
            file,
            format!(
                "\"{}\" holds {} entries, more than the {} entry limit",
                what,
                object.len(),
                flags::max_dependency_entries()
            ),
        ));
    }
    for (key, value) in object {
        let pkg = PackageName::parse(key)
            .ok_or_else(|| Error::parse(file, format!("invalid package name \"{}\"", key)))?;
        let text = value.as_str().ok_or_else(|| {
            Error::parse(file, format!("version of {} must be a string", key))
        })?;
        if text.len() >= MAX_VERSION_TEXT_BYTES {
            return Err(Error::parse(file, format!("version of {} is too long", key)));
        }
        let version = Version::parse(text).ok_or_else(|| {
            Error::parse(
                file,
                format!("version of {} must be exact X.Y.Z, got \"{}\"", key, text),
            )
        })?;
        map.insert(pkg, version);
    }
    Ok(map)
}

fn parse_constraint_map(
    value: Option<&Value>,
    file: &str,
    what: &str,
) -> Result<BTreeMap<PackageName, RangeText>> {
    let mut map = BTreeMap::new();
    let object = match value {
        Some(Value::Object(object)) => object,
        Some(_) => return Err(Error::parse(file, format!("\"{}\" must be an object", what))),
        None => return Ok(map),
    };
    if object.len() > flags::max_dependency_entries() {
        return Err(Error::parse(
            file,
            format!(
                "\"{}\" holds {} entries, more than the {} entry limit",
                what,
                object.len(),
                flags::max_dependency_entries()
            ),
        ));
    }
    for (key, value) in object {
        let pkg = PackageName::parse(key)
            .ok_or_else(|| Error::parse(file, format!("invalid package name \"{}\"", key)))?;
        let text = value.as_str().ok_or_else(|| {
            Error::parse(file, format!("constraint of {} must be a string", key))
        })?;
        if text.len() >= MAX_VERSION_TEXT_BYTES {
            return Err(Error::parse(file, format!("constraint of {} is too long", key)));
        }
        let range = RangeText::from_text(text).ok_or_else(|| {
            Error::parse(
                file,
                format!(
                    "constraint of {} must look like \"1.0.0 <= v < 2.0.0\", got \"{}\"",
                    key, text
                ),
            )
        })?;
        map.insert(pkg, range);
    }
    Ok(map)
}

fn parse_exposed_modules(value: Option<&Value>, file: &str) -> Result<ExposedModules> {
    match value {
        Some(Value::Array(items)) => {
            let names = items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| Error::parse(file, "\"exposed-modules\" must hold strings"))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(ExposedModules::List(names))
        }
        Some(Value::Object(object)) => {
            let mut categories = Vec::new();
            for (category, value) in object {
                let items = value.as_array().ok_or_else(|| {
                    Error::parse(file, "\"exposed-modules\" categories must hold arrays")
                })?;
                let names = items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_string).ok_or_else(|| {
                            Error::parse(file, "\"exposed-modules\" must hold strings")
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                categories.push((category.clone(), names));
            }
            Ok(ExposedModules::Categorized(categories))
        }
        Some(_) => Err(Error::parse(
            file,
            "\"exposed-modules\" must be an array or an object of arrays",
        )),
        None => Ok(ExposedModules::List(Vec::new())),
    }
}

fn collect_extra(
    object: &serde_json::Map<String, Value>,
    recognized: &[&str],
) -> Vec<(String, Value)> {
    object
        .iter()
        .filter(|(key, _)| !recognized.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// Canonical rendering

fn json_string(s: &str) -> String {
    serde_json::to_string(s).expect("string serialization cannot fail")
}

fn push_key(out: &mut String, key: &str) {
    let _ = write!(out, "    {}: ", json_string(key));
}

fn push_string_field(out: &mut String, key: &str, value: &str) {
    let _ = writeln!(out, "    {}: {},", json_string(key), json_string(value));
}

fn push_string_array(out: &mut String, key: &str, values: &[String]) {
    if values.is_empty() {
        let _ = writeln!(out, "    {}: [],", json_string(key));
        return;
    }
    let _ = writeln!(out, "    {}: [", json_string(key));
    for (i, value) in values.iter().enumerate() {
        let comma = if i + 1 < values.len() { "," } else { "" };
        let _ = writeln!(out, "        {}{}", json_string(value), comma);
    }
    out.push_str("    ],\n");
}

fn push_version_map(
    out: &mut String,
    key: &str,
    map: &BTreeMap<PackageName, Version>,
    depth: usize,
    trailing_comma: bool,
) {
    let indent = "    ".repeat(depth);
    let comma = if trailing_comma { "," } else { "" };
    if map.is_empty() {
        let _ = writeln!(out, "{}{}: {{}}{}", indent, json_string(key), comma);
        return;
    }
    let _ = writeln!(out, "{}{}: {{", indent, json_string(key));
    for (i, (pkg, version)) in map.iter().enumerate() {
        let entry_comma = if i + 1 < map.len() { "," } else { "" };
        let _ = writeln!(
            out,
            "{}    {}: {}{}",
            indent,
            json_string(&pkg.to_string()),
            json_string(&version.to_string()),
            entry_comma
        );
    }
    let _ = writeln!(out, "{}}}{}", indent, comma);
}

fn push_range_map(
    out: &mut String,
    key: &str,
    map: &BTreeMap<PackageName, RangeText>,
    trailing_comma: bool,
) {
    let comma = if trailing_comma { "," } else { "" };
    if map.is_empty() {
        let _ = writeln!(out, "    {}: {{}}{}", json_string(key), comma);
        return;
    }
    let _ = writeln!(out, "    {}: {{", json_string(key));
    for (i, (pkg, range)) in map.iter().enumerate() {
        let entry_comma = if i + 1 < map.len() { "," } else { "" };
        let _ = writeln!(
            out,
            "        {}: {}{}",
            json_string(&pkg.to_string()),
            json_string(&range.text),
            entry_comma
        );
    }
    let _ = writeln!(out, "    }}{}", comma);
}

fn push_exposed_modules(out: &mut String, exposed: &ExposedModules) {
    match exposed {
        ExposedModules::List(names) => {
            push_string_array(out, "exposed-modules", names);
        }
        ExposedModules::Categorized(categories) => {
            let _ = writeln!(out, "    {}: {{", json_string("exposed-modules"));
            for (i, (category, names)) in categories.iter().enumerate() {
                let comma = if i + 1 < categories.len() { "," } else { "" };
                if names.is_empty() {
                    let _ = writeln!(out, "        {}: []{}", json_string(category), comma);
                    continue;
                }
                let _ = writeln!(out, "        {}: [", json_string(category));
                for (j, name) in names.iter().enumerate() {
                    let entry_comma = if j + 1 < names.len() { "," } else { "" };
                    let _ = writeln!(out, "            {}{}", json_string(name), entry_comma);
                }
                let _ = writeln!(out, "        ]{}", comma);
            }
            out.push_str("    },\n");
        }
    }
}

fn push_extra(out: &mut String, extra: &[(String, Value)]) {
    for (i, (key, value)) in extra.iter().enumerate() {
        let rendered = pretty_value(value);
        let comma = if i + 1 < extra.len() { "," } else { "" };
        let _ = writeln!(
            out,
            "    {}: {}{}",
            json_string(key),
            indent_continuation(&rendered),
            comma
        );
    }
}

/// Render a preserved foreign value with 4-space indentation.
fn pretty_value(value: &Value) -> String {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    serde::Serialize::serialize(value, &mut serializer)
        .expect("JSON value serialization cannot fail");
    String::from_utf8(buffer).expect("serde_json output is UTF-8")
}

fn indent_continuation(rendered: &str) -> String {
    rendered.replace('\n', "\n    ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP_JSON: &str = r#"{
    "type": "application",
    "source-directories": ["src"],
    "elm-version": "0.19.1",
    "dependencies": {
        "direct": { "elm/core": "1.0.5" },
        "indirect": { "elm/json": "1.1.3" }
    },
    "test-dependencies": {
        "direct": {},
        "indirect": {}
    }
}"#;

    const PKG_JSON: &str = r#"{
    "type": "package",
    "name": "author/widgets",
    "summary": "Widgets for everyone",
    "license": "BSD-3-Clause",
    "version": "2.1.0",
    "exposed-modules": ["Widgets"],
    "elm-version": "0.19.0 <= v < 0.20.0",
    "dependencies": {
        "elm/core": "1.0.0 <= v < 2.0.0"
    },
    "test-dependencies": {}
}"#;

    fn pkg(s: &str) -> PackageName {
        PackageName::parse(s).unwrap()
    }

    #[test]
    fn test_parse_application() {
        let manifest = Manifest::from_str_named(APP_JSON, "elm.json").unwrap();
        let app = match &manifest {
            Manifest::Application(app) => app,
            Manifest::Package(_) => panic!("expected application"),
        };
        assert_eq!(app.elm_version, "0.19.1");
        assert_eq!(app.direct.len(), 1);
        assert_eq!(
            app.direct.get(&pkg("elm/core")),
            Some(&Version::new(1, 0, 5))
        );
        assert_eq!(manifest.find(&pkg("elm/json")), DepLocation::Indirect);
        assert_eq!(manifest.find(&pkg("elm/html")), DepLocation::None);
    }

    #[test]
    fn test_parse_package() {
        let manifest = Manifest::from_str_named(PKG_JSON, "elm.json").unwrap();
        let package = match &manifest {
            Manifest::Package(package) => package,
            Manifest::Application(_) => panic!("expected package"),
        };
        assert_eq!(package.name, pkg("author/widgets"));
        assert_eq!(package.version, Version::new(2, 1, 0));
        assert_eq!(package.exposed_modules.names(), vec!["Widgets"]);
        assert_eq!(manifest.find(&pkg("elm/core")), DepLocation::PkgDep);
    }

    #[test]
    fn test_duplicate_across_maps_rejected() {
        let json = r#"{
            "type": "application",
            "elm-version": "0.19.1",
            "dependencies": {
                "direct": { "elm/core": "1.0.5" },
                "indirect": { "elm/core": "1.0.5" }
            }
        }"#;
        assert!(Manifest::from_str_named(json, "elm.json").is_err());
    }

    #[test]
    fn test_rejects_bad_pinned_version() {
        let json = r#"{
            "type": "application",
            "elm-version": "0.19.1",
            "dependencies": {
                "direct": { "elm/core": "1.0.0 <= v < 2.0.0" },
                "indirect": {}
            }
        }"#;
        assert!(Manifest::from_str_named(json, "elm.json").is_err());
    }

    #[test]
    fn test_promote_one_rung_at_a_time() {
        let mut manifest = Manifest::from_str_named(APP_JSON, "elm.json").unwrap();
        assert!(manifest.promote(&pkg("elm/json")));
        assert_eq!(manifest.find(&pkg("elm/json")), DepLocation::Direct);
        assert!(!manifest.promote(&pkg("elm/json")));

        let with_test = r#"{
            "type": "application",
            "elm-version": "0.19.1",
            "test-dependencies": {
                "direct": {},
                "indirect": { "elm-explorations/test": "2.0.0" }
            }
        }"#;
        let mut manifest = Manifest::from_str_named(with_test, "elm.json").unwrap();
        let test_pkg = pkg("elm-explorations/test");
        assert!(manifest.promote(&test_pkg));
        assert_eq!(manifest.find(&test_pkg), DepLocation::TestDirect);
        assert!(manifest.promote(&test_pkg));
        assert_eq!(manifest.find(&test_pkg), DepLocation::Direct);
    }

    #[test]
    fn test_add_or_update_remove_first() {
        let mut manifest = Manifest::from_str_named(APP_JSON, "elm.json").unwrap();
        manifest.add_or_update(&pkg("elm/json"), Version::new(1, 1, 4), false, true, true);
        assert_eq!(manifest.find(&pkg("elm/json")), DepLocation::Direct);
        match &manifest {
            Manifest::Application(app) => {
                assert_eq!(
                    app.direct.get(&pkg("elm/json")),
                    Some(&Version::new(1, 1, 4))
                );
                assert!(!app.indirect.contains_key(&pkg("elm/json")));
            }
            Manifest::Package(_) => unreachable!(),
        }
    }

    #[test]
    fn test_package_add_widens_pin_to_next_major() {
        let mut manifest = Manifest::from_str_named(PKG_JSON, "elm.json").unwrap();
        manifest.add_or_update(&pkg("elm/html"), Version::new(1, 0, 0), false, true, false);
        match &manifest {
            Manifest::Package(package) => {
                assert_eq!(
                    package.deps.get(&pkg("elm/html")).unwrap().text,
                    "1.0.0 <= v < 2.0.0"
                );
            }
            Manifest::Application(_) => unreachable!(),
        }
    }

    #[test]
    fn test_remove_clears_all_maps() {
        let mut manifest = Manifest::from_str_named(APP_JSON, "elm.json").unwrap();
        assert!(manifest.remove(&pkg("elm/json")));
        assert_eq!(manifest.find(&pkg("elm/json")), DepLocation::None);
        assert!(!manifest.remove(&pkg("elm/json")));
    }

    #[test]
    fn test_render_is_canonical_and_sorted() {
        let manifest = Manifest::from_str_named(APP_JSON, "elm.json").unwrap();
        let rendered = manifest.render();
        assert!(rendered.ends_with("}\n"));
        assert!(rendered.contains("\"elm/core\": \"1.0.5\""));
        // Empty maps stay on a single line.
        assert!(rendered.contains("\"direct\": {}"));

        // Inserting in a different order produces byte-identical output.
        let mut a = manifest.clone();
        let mut b = manifest.clone();
        a.add_or_update(&pkg("elm/time"), Version::new(1, 0, 0), false, true, false);
        a.add_or_update(&pkg("elm/html"), Version::new(1, 0, 0), false, true, false);
        b.add_or_update(&pkg("elm/html"), Version::new(1, 0, 0), false, true, false);
        b.add_or_update(&pkg("elm/time"), Version::new(1, 0, 0), false, true, false);
        assert_eq!(a.render(), b.render());
    }

    #[test]
    fn test_render_round_trips() {
        let manifest = Manifest::from_str_named(APP_JSON, "elm.json").unwrap();
        let rendered = manifest.render();
        let reparsed = Manifest::from_str_named(&rendered, "elm.json").unwrap();
        assert_eq!(manifest, reparsed);

        let manifest = Manifest::from_str_named(PKG_JSON, "elm.json").unwrap();
        let reparsed = Manifest::from_str_named(&manifest.render(), "elm.json").unwrap();
        assert_eq!(manifest, reparsed);
    }

    #[test]
    fn test_extra_keys_survive_rewrite() {
        let json = r#"{
            "type": "application",
            "elm-version": "0.19.1",
            "local-dependencies": { "me/extracted": "../extracted" },
            "dependencies": { "direct": {}, "indirect": {} }
        }"#;
        let manifest = Manifest::from_str_named(json, "elm.json").unwrap();
        let rendered = manifest.render();
        assert!(rendered.contains("\"local-dependencies\""));
        assert!(rendered.contains("\"me/extracted\": \"../extracted\""));
        let reparsed = Manifest::from_str_named(&rendered, "elm.json").unwrap();
        assert_eq!(manifest, reparsed);
    }

    #[test]
    fn test_constraint_text_round_trips_verbatim() {
        let manifest = Manifest::from_str_named(PKG_JSON, "elm.json").unwrap();
        let rendered = manifest.render();
        assert!(rendered.contains("\"elm/core\": \"1.0.0 <= v < 2.0.0\""));
    }

    #[test]
    fn test_apply_change_preserving_location() {
        let mut manifest = Manifest::from_str_named(APP_JSON, "elm.json").unwrap();
        manifest.apply_change_preserving_location(
            &pkg("elm/json"),
            Version::new(1, 1, 4),
            DepLocation::Indirect,
        );
        assert_eq!(manifest.find(&pkg("elm/json")), DepLocation::Indirect);
        manifest.apply_change_preserving_location(
            &pkg("elm/bytes"),
            Version::new(1, 0, 8),
            DepLocation::Indirect,
        );
        assert_eq!(manifest.find(&pkg("elm/bytes")), DepLocation::Indirect);
    }
}
