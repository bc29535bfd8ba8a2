//! Output artifacts of an aggregation run.
//!
//! - [`write_package_list`] merges the generated export list into a
//!   framework properties file.
//! - [`write_report`] stores the run's [`ScanReport`] as JSON.

pub mod properties;

pub use properties::Properties;

use crate::error::{Result, ScanError};
use crate::model::ScanReport;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Property holding the extra system packages exported by the framework.
pub const SYSTEM_PACKAGES_EXTRA: &str = "org.osgi.framework.system.packages.extra";

/// Writes `packages` as the multi-valued `key` of `output`.
///
/// Properties from `input`, when it exists, are carried over; `key` is
/// replaced. Parent directories of `output` are created as needed.
///
/// # Errors
///
/// Returns [`ScanError::OutputIo`] if the output file cannot be written.
pub fn write_package_list(
    input: Option<&Path>,
    output: &Path,
    key: &str,
    packages: &[String],
) -> Result<()> {
    let mut properties = match input {
        Some(path) if path.exists() => match fs::read_to_string(path) {
            Ok(content) => Properties::parse(&content),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read input properties, starting empty");
                Properties::new()
            }
        },
        _ => Properties::new(),
    };
    properties.set(key, packages.to_vec());

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| ScanError::output(output, e))?;
        }
    }
    fs::write(output, properties.render()).map_err(|e| ScanError::output(output, e))?;

    let shown = output.canonicalize().unwrap_or_else(|_| output.to_path_buf());
    info!(path = %shown.display(), entries = packages.len(), "generated property file saved");
    Ok(())
}

/// Writes the report as pretty-printed JSON.
pub fn write_report(path: &Path, report: &ScanReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| ScanError::output(path, std::io::Error::other(e)))?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| ScanError::output(path, e))?;
        }
    }
    fs::write(path, json).map_err(|e| ScanError::output(path, e))
}
