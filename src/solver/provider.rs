//! Dependency providers for the solver core
//!
//! The core only ever asks two questions: which versions a package has
//! (valid ones, newest first) and what one version depends on. The
//! registry-backed provider memoizes both answers per invocation so
//! repeated lookups during backtracking stay cheap.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::Result;
use crate::package::PackageName;
use crate::registry::Registry;
use crate::version::{Version, VersionRange};

pub trait DependencyProvider {
    /// Candidate versions, invalid ones already filtered, newest first.
    fn versions(&self, pkg: &PackageName) -> Result<Vec<Version>>;

    /// Declared dependencies of one version.
    fn dependencies_of(
        &self,
        pkg: &PackageName,
        version: Version,
    ) -> Result<Vec<(PackageName, VersionRange)>>;
}

/// Provider over a [`Registry`], with per-invocation memoization.
pub struct RegistryProvider<'a> {
    registry: &'a dyn Registry,
    versions: RefCell<HashMap<PackageName, Vec<Version>>>,
    dependencies: RefCell<HashMap<(PackageName, Version), Vec<(PackageName, VersionRange)>>>,
}

impl<'a> RegistryProvider<'a> {
    pub fn new(registry: &'a dyn Registry) -> Self {
        Self {
            registry,
            versions: RefCell::new(HashMap::new()),
            dependencies: RefCell::new(HashMap::new()),
        }
    }
}

impl DependencyProvider for RegistryProvider<'_> {
    fn versions(&self, pkg: &PackageName) -> Result<Vec<Version>> {
        if let Some(versions) = self.versions.borrow().get(pkg) {
            return Ok(versions.clone());
        }
        let versions = self.registry.versions(pkg)?;
        self.versions
            .borrow_mut()
            .insert(pkg.clone(), versions.clone());
        Ok(versions)
    }

    fn dependencies_of(
        &self,
        pkg: &PackageName,
        version: Version,
    ) -> Result<Vec<(PackageName, VersionRange)>> {
        let key = (pkg.clone(), version);
        if let Some(deps) = self.dependencies.borrow().get(&key) {
            return Ok(deps.clone());
        }
        let deps = self.registry.dependencies_of(pkg, version)?;
        self.dependencies.borrow_mut().insert(key, deps.clone());
        Ok(deps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{IndexedRegistry, VersionStatus};

    #[test]
    fn test_provider_delegates_and_memoizes() {
        let mut registry = IndexedRegistry::new();
        let core = PackageName::parse("elm/core").unwrap();
        registry.add(&core, Version::new(1, 0, 5), VersionStatus::Valid, &[]);

        let provider = RegistryProvider::new(&registry);
        assert_eq!(
            provider.versions(&core).unwrap(),
            vec![Version::new(1, 0, 5)]
        );
        // Second call served from the memo.
        assert_eq!(
            provider.versions(&core).unwrap(),
            vec![Version::new(1, 0, 5)]
        );
        assert_eq!(
            provider
                .dependencies_of(&core, Version::new(1, 0, 5))
                .unwrap(),
            vec![]
        );
    }
}
