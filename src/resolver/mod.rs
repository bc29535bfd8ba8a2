//! Split-package resolution and version normalization.
//!
//! Once every scanner has run, [`SplitPackageResolver`] turns the evidence
//! store into the versions to export per package, and [`normalize`] turns
//! each of those versions into a canonical framework version.

mod split;
mod version;

pub use split::{Resolution, ResolutionMode, ResolvedExport, SplitPackageResolver};
pub use version::{is_canonical, normalize};
