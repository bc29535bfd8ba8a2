use super::{ScanContext, Scanner};
use crate::error::Result;
use crate::model::{EvidenceStore, Observation};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Scans the project's compiled-output directory.
///
/// Every file below the root contributes its parent directory as a package,
/// recorded under the project's final name with the project version.
pub struct BuildOutputScanner {
    directory: PathBuf,
    final_name: String,
    version: String,
}

impl BuildOutputScanner {
    pub fn new(
        directory: impl Into<PathBuf>,
        final_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            directory: directory.into(),
            final_name: final_name.into(),
            version: version.into(),
        }
    }
}

fn relative_package(root: &Path, file: &Path) -> Option<String> {
    let parent = file.strip_prefix(root).ok()?.parent()?;
    let segments: Vec<_> = parent
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("."))
}

#[async_trait]
impl Scanner for BuildOutputScanner {
    fn name(&self) -> &'static str {
        "Build Output"
    }

    async fn scan(&self, store: &mut EvidenceStore, ctx: &ScanContext) -> Result<()> {
        if !self.directory.is_dir() {
            warn!(directory = %self.directory.display(), "build output directory not found, skipping");
            return Ok(());
        }
        let shown = self
            .directory
            .canonicalize()
            .unwrap_or_else(|_| self.directory.clone());
        info!(directory = %shown.display(), "scanning project build directory");

        let mut files = 0usize;
        for entry in WalkDir::new(&self.directory)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            ctx.check_cancelled()?;
            let Some(package) = relative_package(&self.directory, entry.path()) else {
                continue;
            };
            if ctx.exclusions().is_excluded(&package) {
                continue;
            }
            store.observe(Observation::new(
                package,
                self.final_name.as_str(),
                Some(self.version.as_str()),
                None,
            ));
            files += 1;
        }

        debug!(files, packages = store.len(), "scanned build output");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"\xCA\xFE\xBA\xBE").unwrap();
    }

    #[test]
    fn test_relative_package() {
        let root = Path::new("/build/classes");
        assert_eq!(
            relative_package(root, Path::new("/build/classes/com/acme/Foo.class")).as_deref(),
            Some("com.acme")
        );
        assert_eq!(relative_package(root, Path::new("/build/classes/Root.class")), None);
    }

    #[tokio::test]
    async fn test_records_packages_under_final_name() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "com/acme/portal/App.class");
        touch(dir.path(), "com/acme/portal/Helper.class");
        touch(dir.path(), "com/acme/portal/messages.properties");
        touch(dir.path(), "log4j.xml");
        touch(dir.path(), "META-INF/MANIFEST.MF");
        touch(dir.path(), "org/osgi/service/Legacy.class");

        let scanner = BuildOutputScanner::new(dir.path(), "portal-8.0.0", "8.0.0");
        let ctx = ScanContext::default();
        let mut store = EvidenceStore::new();
        scanner.scan(&mut store, &ctx).await.unwrap();

        assert_eq!(store.package_names().collect::<Vec<_>>(), vec!["com.acme.portal"]);
        let location = store.location("com.acme.portal", "portal-8.0.0").unwrap();
        assert_eq!(location.version.as_deref(), Some("8.0.0"));
        assert_eq!(location.specification_version, None);
        assert_eq!(location.occurrence_count, 3);
    }

    #[tokio::test]
    async fn test_missing_directory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = BuildOutputScanner::new(dir.path().join("classes"), "portal", "1.0");
        let ctx = ScanContext::default();
        let mut store = EvidenceStore::new();

        scanner.scan(&mut store, &ctx).await.unwrap();
        assert!(store.is_empty());
    }
}
