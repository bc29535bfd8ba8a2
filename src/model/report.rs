use super::VersionLocation;
use crate::error::ScanError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    MalformedArchive,
    AmbiguousResolution,
    UnresolvedArtifact,
    UnresolvableTransitive,
    InvalidInput,
    Cancelled,
}

impl DiagnosticKind {
    /// Same spelling as the serialized report.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::MalformedArchive => "malformed_archive",
            DiagnosticKind::AmbiguousResolution => "ambiguous_resolution",
            DiagnosticKind::UnresolvedArtifact => "unresolved_artifact",
            DiagnosticKind::UnresolvableTransitive => "unresolvable_transitive",
            DiagnosticKind::InvalidInput => "invalid_input",
            DiagnosticKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recovered problem surfaced at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// File path or artifact coordinate the problem relates to.
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Classifies a recovered scan error.
    pub fn from_error(subject: impl Into<String>, error: &ScanError) -> Self {
        let kind = match error {
            ScanError::MalformedArchive { .. } | ScanError::ManifestParse { .. } => {
                DiagnosticKind::MalformedArchive
            }
            ScanError::AmbiguousResolution { .. } => DiagnosticKind::AmbiguousResolution,
            ScanError::UnresolvableTransitive { .. } => DiagnosticKind::UnresolvableTransitive,
            ScanError::Cancelled => DiagnosticKind::Cancelled,
            ScanError::DependencySet { .. } | ScanError::OutputIo { .. } => {
                DiagnosticKind::InvalidInput
            }
        };
        Self::new(kind, subject, error.to_string())
    }
}

/// A package declared with more than one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPackage {
    pub package: String,
    pub locations: Vec<VersionLocation>,
    /// Versions that were kept for export.
    pub exported: Vec<String>,
}

/// Counters and diagnostics for a complete aggregation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub generated_at: DateTime<Utc>,
    pub packages_scanned: usize,
    pub exported_entries: usize,
    pub split_packages: Vec<SplitPackage>,
    pub diagnostics: Vec<Diagnostic>,
    /// Set when cancellation or a timeout stopped scanning early.
    pub incomplete: bool,
}

impl ScanReport {
    pub fn new() -> Self {
        Self {
            generated_at: Utc::now(),
            packages_scanned: 0,
            exported_entries: 0,
            split_packages: Vec::new(),
            diagnostics: Vec::new(),
            incomplete: false,
        }
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    /// Artifacts whose version could not be determined.
    pub fn unresolved_artifacts(&self) -> usize {
        self.count(DiagnosticKind::AmbiguousResolution)
            + self.count(DiagnosticKind::UnresolvedArtifact)
            + self.count(DiagnosticKind::UnresolvableTransitive)
    }

    pub fn malformed_archives(&self) -> usize {
        self.count(DiagnosticKind::MalformedArchive)
    }
}

impl Default for ScanReport {
    fn default() -> Self {
        Self::new()
    }
}
