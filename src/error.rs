//! Error types for scanning and aggregation.
//!
//! [`ScanError`] covers everything that can go wrong while collecting package
//! evidence or writing the generated package list. Only
//! [`ScanError::OutputIo`] fails a run; every other variant is recovered
//! locally, logged, and kept as a [`Diagnostic`](crate::model::Diagnostic).

use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// A JAR or WAR cannot be opened, or its manifest cannot be parsed.
    #[error("malformed archive {path}: {reason}")]
    MalformedArchive { path: PathBuf, reason: String },

    /// More than one dependency artifact matches a JAR file name.
    #[error("ambiguous resolution for {file_name}: {candidates:?}")]
    AmbiguousResolution {
        file_name: String,
        candidates: Vec<String>,
    },

    /// Transitive resolution of a war artifact failed.
    #[error("unresolvable transitive dependencies of {coordinates}: {reason}")]
    UnresolvableTransitive { coordinates: String, reason: String },

    /// The generated property file cannot be created or written.
    #[error("cannot write {path}: {source}")]
    OutputIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A manifest or manifest header does not follow the expected syntax.
    #[error("manifest parse error at line {line}: {reason}")]
    ManifestParse { line: usize, reason: String },

    /// The resolved dependency set cannot be loaded.
    #[error("dependency set {path}: {reason}")]
    DependencySet { path: PathBuf, reason: String },

    /// The run was cancelled before this scan finished.
    #[error("scan cancelled")]
    Cancelled,
}

impl ScanError {
    pub fn malformed(path: &Path, reason: impl ToString) -> Self {
        Self::MalformedArchive {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub fn output(path: &Path, source: std::io::Error) -> Self {
        Self::OutputIo {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Returns true if this error must abort the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutputIo { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
