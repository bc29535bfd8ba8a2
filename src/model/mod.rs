//! Core data types for package evidence, artifacts, and run reports.
//!
//! This module contains the fundamental types used throughout bundlescan:
//!
//! - [`EvidenceStore`] - Package evidence accumulated from every scanner
//! - [`VersionLocation`] - One origin's claim about a package version
//! - [`Observation`] - A single piece of evidence produced by a scanner
//! - [`DependencyArtifact`] - A resolved project dependency
//! - [`ScanReport`] - Diagnostics and counters for a complete run
//!
//! # Example
//!
//! ```
//! use bundlescan::EvidenceStore;
//!
//! let mut store = EvidenceStore::new();
//! store.record("com.acme.util", "lib/acme.jar", Some("1.0.0"), None);
//! store.record("com.acme.util", "lib/acme.jar", Some("9.9.9"), None);
//!
//! let location = store.locations("com.acme.util").next().unwrap();
//! assert_eq!(location.version.as_deref(), Some("1.0.0"));
//! assert_eq!(location.occurrence_count, 2);
//! ```

mod artifact;
mod evidence;
mod report;

pub use artifact::*;
pub use evidence::*;
pub use report::*;
