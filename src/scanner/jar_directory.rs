use super::dependency::ArtifactLookup;
use super::jar::scan_jar_blocking;
use super::{merge_in_order, ScanContext, Scanner};
use crate::error::Result;
use crate::model::{Diagnostic, DiagnosticKind, EvidenceStore};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Scans every `*.jar` directly inside a list of directories.
///
/// When an [`ArtifactLookup`] is configured, the version of the matching
/// project dependency overrides the manifest version of each JAR.
pub struct JarDirectoryScanner {
    directories: Vec<PathBuf>,
    lookup: Option<ArtifactLookup>,
}

impl JarDirectoryScanner {
    pub fn new(directories: Vec<PathBuf>) -> Self {
        Self {
            directories,
            lookup: None,
        }
    }

    pub fn with_lookup(mut self, lookup: ArtifactLookup) -> Self {
        self.lookup = Some(lookup);
        self
    }

    async fn default_version(&self, path: &Path, ctx: &ScanContext) -> Option<String> {
        let lookup = self.lookup.as_ref()?;
        let file_name = path.file_name()?.to_string_lossy();
        lookup.version_for(&file_name, ctx).await
    }
}

/// JAR files directly inside `directory`, sorted by file name.
fn jar_files(directory: &Path) -> Vec<PathBuf> {
    WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "jar"))
        .map(|e| e.into_path())
        .collect()
}

#[async_trait]
impl Scanner for JarDirectoryScanner {
    fn name(&self) -> &'static str {
        "JAR Directories"
    }

    async fn scan(&self, store: &mut EvidenceStore, ctx: &ScanContext) -> Result<()> {
        let mut jars = Vec::new();
        for directory in &self.directories {
            if !directory.is_dir() {
                warn!(directory = %directory.display(), "not a valid jar directory, skipping");
                ctx.report(Diagnostic::new(
                    DiagnosticKind::InvalidInput,
                    directory.display().to_string(),
                    "not a directory",
                ));
                continue;
            }
            info!(directory = %directory.display(), "scanning jar directory");
            jars.extend(jar_files(directory));
        }

        let exclusions = ctx.shared_exclusions();
        let batches = stream::iter(jars)
            .map(|path| {
                let exclusions = Arc::clone(&exclusions);
                async move {
                    let version = self.default_version(&path, ctx).await;
                    let subject = path.display().to_string();
                    (subject, scan_jar_blocking(path, version, exclusions).await)
                }
            })
            .buffered(ctx.concurrency());

        let merged = merge_in_order(store, ctx, batches).await?;
        info!(jars = merged, "scanned jar directories");
        Ok(())
    }
}
