//! elmpm - a project-aware package manager and build planner for Elm
//!
//! elmpm reads a project's `elm.json`, decides which package versions
//! satisfy all declared constraints, downloads what is missing, updates
//! the manifest, and emits a compile-time build plan: package
//! topological order, local-module batches, and per-package artifact
//! freshness.
//!
//! # Examples
//!
//! ```no_run
//! use elmpm::{Manifest, PackageCache, RegistryClient, SolverDriver, Candidate, PackageName};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manifest = Manifest::load("elm.json".as_ref())?;
//! let cache = PackageCache::from_env()?;
//! let registry = RegistryClient::from_env(&cache)?;
//!
//! let driver = SolverDriver::new(&registry);
//! let plan = driver.install(
//!     &manifest,
//!     &[Candidate { pkg: PackageName::parse("elm/html").unwrap(), version: None }],
//!     false,
//!     false,
//! )?;
//! for change in &plan.changes {
//!     println!("{}", change);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`version`] - version triples and range algebra
//! - [`package`] - `author/name` package identity
//! - [`manifest`] - elm.json reading, mutation, and canonical writing
//! - [`cache`] - the `ELM_HOME` package cache
//! - [`registry`] - the v1/v2 registry protocols behind one trait
//! - [`registry_http`] - the HTTP collaborator (fetches and downloads)
//! - [`solver`] - PubGrub-style resolution with the strategy ladder
//! - [`fingerprint`] - `artifacts.dat` parsing and freshness
//! - [`elm_module`] - skeleton Elm module headers
//! - [`module_graph`] - module discovery, ordering, parallel levels
//! - [`build_plan`] - the serialized build plan
//! - [`flags`] - environment feature gates
//! - [`error`] - error types and result handling

pub mod build_plan;
pub mod cache;
pub mod elm_module;
pub mod error;
pub mod fingerprint;
pub mod flags;
pub mod manifest;
pub mod module_graph;
pub mod package;
pub mod registry;
pub mod registry_http;
pub mod solver;
pub mod version;

pub use cache::PackageCache;
pub use error::{Error, Result};
pub use fingerprint::{ArtifactFingerprint, ArtifactStatus, Fingerprint};
pub use manifest::{DepLocation, Manifest};
pub use package::PackageName;
pub use registry::{IndexedRegistry, OnlineRegistry, Registry, RegistryClient, VersionStatus};
pub use registry_http::HttpClient;
pub use solver::{Candidate, ChangePlan, PackageChange, SolverDriver, Strategy};
pub use version::{Version, VersionBound, VersionRange};
