use super::{ScanContext, Scanner};
use crate::error::{Result, ScanError};
use crate::manifest::{parse_header, Manifest, BUNDLE_VERSION, EXPORT_PACKAGE};
use crate::model::{Diagnostic, EvidenceStore, Observation};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, warn};

/// Default namespace whose exports may carry the bundle's own version.
pub const DEFAULT_RESERVED_NAMESPACE: &str = "org.jahia";

/// Reads the exports of a previously generated manifest.
///
/// A container bundle usually stamps its own `Bundle-Version` on every
/// package it re-exports, so an export whose version equals the bundle
/// version is only believed for packages of the reserved namespace.
pub struct ExistingManifestScanner {
    path: PathBuf,
    reserved_namespace: String,
}

impl ExistingManifestScanner {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reserved_namespace: DEFAULT_RESERVED_NAMESPACE.to_string(),
        }
    }

    pub fn with_reserved_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.reserved_namespace = namespace.into();
        self
    }

    fn observations(&self, manifest: &Manifest) -> Result<Vec<Observation>> {
        let origin = self.path.to_string_lossy().to_string();
        let bundle_version = manifest.main_attribute(BUNDLE_VERSION);
        let Some(header) = manifest.main_attribute(EXPORT_PACKAGE) else {
            return Ok(Vec::new());
        };

        let mut observations = Vec::new();
        for clause in parse_header(header).map_err(|e| ScanError::malformed(&self.path, e))? {
            let declared = clause.attribute("version");
            for package in &clause.packages {
                let version = match declared {
                    Some(version) if Some(version) == bundle_version => {
                        if package.starts_with(self.reserved_namespace.as_str()) {
                            Some(version)
                        } else {
                            None
                        }
                    }
                    other => other,
                };
                observations.push(Observation::new(
                    package.as_str(),
                    origin.as_str(),
                    version,
                    bundle_version,
                ));
            }
        }
        Ok(observations)
    }
}

#[async_trait]
impl Scanner for ExistingManifestScanner {
    fn name(&self) -> &'static str {
        "Existing Manifest"
    }

    async fn scan(&self, store: &mut EvidenceStore, ctx: &ScanContext) -> Result<()> {
        if !self.path.is_file() {
            return Ok(());
        }
        ctx.check_cancelled()?;

        let parsed = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ScanError::malformed(&self.path, e))
            .and_then(|content| {
                Manifest::parse(&content).map_err(|e| ScanError::malformed(&self.path, e))
            })
            .and_then(|manifest| self.observations(&manifest));

        let observations = match parsed {
            Ok(observations) => observations,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "skipping existing manifest");
                ctx.report(Diagnostic::from_error(self.path.display().to_string(), &e));
                return Ok(());
            }
        };

        let exports = observations.len();
        store.extend(
            observations
                .into_iter()
                .filter(|o| !ctx.exclusions().is_excluded(&o.package)),
        );
        info!(path = %self.path.display(), exports, "found package exports in existing manifest");
        Ok(())
    }
}
