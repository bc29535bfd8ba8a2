use super::jar::scan_jar_blocking;
use super::{merge_in_order, ScanContext, Scanner};
use crate::cache::ResolutionCache;
use crate::error::{Result, ScanError};
use crate::model::{DependencyArtifact, Diagnostic, DiagnosticKind, EvidenceStore};
use crate::resolution::DependencyResolver;
use async_trait::async_trait;
use futures::{stream, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Scans the project's provided-scope JAR dependencies.
pub struct DependencyGraphScanner {
    artifacts: Arc<Vec<DependencyArtifact>>,
}

impl DependencyGraphScanner {
    pub fn new(artifacts: Arc<Vec<DependencyArtifact>>) -> Self {
        Self { artifacts }
    }
}

#[async_trait]
impl Scanner for DependencyGraphScanner {
    fn name(&self) -> &'static str {
        "Dependency Graph"
    }

    async fn scan(&self, store: &mut EvidenceStore, ctx: &ScanContext) -> Result<()> {
        let mut jobs = Vec::new();
        for artifact in self.artifacts.iter().filter(|a| a.is_provided()) {
            if !artifact.is_jar() {
                warn!(artifact = %artifact, kind = %artifact.kind, "ignoring provided dependency that is not a jar");
                continue;
            }
            match &artifact.file {
                Some(path) if path.is_file() => {
                    jobs.push((path.clone(), artifact.base_version().to_string()))
                }
                _ => {
                    warn!(artifact = %artifact, "provided dependency has no file, skipping");
                    ctx.report(Diagnostic::new(
                        DiagnosticKind::InvalidInput,
                        artifact.coordinates(),
                        "dependency file not found",
                    ));
                }
            }
        }

        let exclusions = ctx.shared_exclusions();
        let batches = stream::iter(jobs)
            .map(|(path, version)| {
                let exclusions = Arc::clone(&exclusions);
                async move {
                    let subject = path.display().to_string();
                    (subject, scan_jar_blocking(path, Some(version), exclusions).await)
                }
            })
            .buffered(ctx.concurrency());

        let merged = merge_in_order(store, ctx, batches).await?;
        info!(jars = merged, "scanned provided dependencies");
        Ok(())
    }
}

/// Finds the version of a JAR file among the project's dependencies.
///
/// Non-war artifacts match on their own file name. War artifacts are
/// resolved through `resolver`, once per coordinate for the lifetime of
/// `cache`, and every node of their tree is a candidate.
#[derive(Clone)]
pub struct ArtifactLookup {
    artifacts: Arc<Vec<DependencyArtifact>>,
    resolver: Arc<dyn DependencyResolver>,
    cache: Arc<ResolutionCache>,
}

impl ArtifactLookup {
    pub fn new(
        artifacts: Arc<Vec<DependencyArtifact>>,
        resolver: Arc<dyn DependencyResolver>,
        cache: Arc<ResolutionCache>,
    ) -> Self {
        Self {
            artifacts,
            resolver,
            cache,
        }
    }

    /// Base version of the single artifact whose file is named `file_name`.
    ///
    /// Ambiguous and missing matches are reported to `ctx` and yield `None`.
    pub async fn version_for(&self, file_name: &str, ctx: &ScanContext) -> Option<String> {
        let mut matches: Vec<DependencyArtifact> = Vec::new();

        for artifact in self.artifacts.iter() {
            if artifact.is_war() {
                if let Some(tree) = self.resolve_war(artifact, ctx).await {
                    matches.extend(tree.find_by_file_name(file_name).into_iter().cloned());
                }
            } else if artifact.file_name().as_deref() == Some(file_name) {
                matches.push(artifact.clone());
            }
        }

        let mut seen = HashSet::new();
        matches.retain(|artifact| seen.insert(artifact.coordinates()));

        match matches.as_slice() {
            [single] => {
                debug!(jar = file_name, artifact = %single, "resolved jar version");
                Some(single.base_version().to_string())
            }
            [] => {
                warn!(jar = file_name, "couldn't resolve dependency for jar");
                ctx.report(Diagnostic::new(
                    DiagnosticKind::UnresolvedArtifact,
                    file_name,
                    "no project dependency matches this file name",
                ));
                None
            }
            candidates => {
                let error = ScanError::AmbiguousResolution {
                    file_name: file_name.to_string(),
                    candidates: candidates.iter().map(DependencyArtifact::coordinates).collect(),
                };
                warn!(jar = file_name, error = %error, "several dependencies match jar");
                ctx.report(Diagnostic::from_error(file_name, &error));
                None
            }
        }
    }

    async fn resolve_war(
        &self,
        war: &DependencyArtifact,
        ctx: &ScanContext,
    ) -> Option<Arc<crate::model::DependencyNode>> {
        let coordinates = war.coordinates();
        self.cache
            .get_or_resolve(&coordinates, || async {
                match self.resolver.resolve(war).await {
                    Ok(tree) => Some(tree),
                    Err(e) => {
                        warn!(war = %war, error = %e, "cannot resolve war dependencies");
                        ctx.report(Diagnostic::from_error(coordinates.as_str(), &e));
                        None
                    }
                }
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DependencyNode;
    use crate::resolution::tests::StaticResolver;
    use crate::scanner::jar::tests::write_jar;
    use std::collections::HashMap;

    fn resolver(trees: Vec<DependencyNode>) -> Arc<dyn DependencyResolver> {
        Arc::new(StaticResolver {
            trees: trees
                .into_iter()
                .map(|tree| (tree.artifact.coordinates(), tree))
                .collect::<HashMap<_, _>>(),
        })
    }

    fn lookup(artifacts: Vec<DependencyArtifact>, trees: Vec<DependencyNode>) -> ArtifactLookup {
        ArtifactLookup::new(
            Arc::new(artifacts),
            resolver(trees),
            Arc::new(ResolutionCache::new()),
        )
    }

    fn portal_war() -> DependencyArtifact {
        DependencyArtifact::new("org.acme", "portal", "8.0.0")
            .with_kind("war")
            .with_scope("provided")
    }

    fn portal_tree() -> DependencyNode {
        DependencyNode::new(portal_war()).with_children(vec![DependencyNode::new(
            DependencyArtifact::new("commons-io", "commons-io", "2.11.0")
                .with_file("commons-io-2.11.0.jar"),
        )])
    }

    #[tokio::test]
    async fn test_scans_provided_jars_with_base_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acme-util-1.0-20240101.000000-1.jar");
        write_jar(&path, None, &["com/acme/util/Strings.class"]);

        let mut snapshot = DependencyArtifact::new("org.acme", "acme-util", "1.0-20240101.000000-1")
            .with_scope("provided")
            .with_file(&path);
        snapshot.base_version = Some("1.0-SNAPSHOT".to_string());
        let compile = DependencyArtifact::new("org.acme", "other", "1.0").with_file(&path);

        let scanner = DependencyGraphScanner::new(Arc::new(vec![snapshot, compile]));
        let ctx = ScanContext::default();
        let mut store = EvidenceStore::new();
        scanner.scan(&mut store, &ctx).await.unwrap();

        let locations: Vec<_> = store.locations("com.acme.util").collect();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].version.as_deref(), Some("1.0-SNAPSHOT"));
        assert!(ctx.diagnostics().is_empty());
    }

    #[tokio::test]
    async fn test_skips_non_jar_and_missing_files() {
        let missing = DependencyArtifact::new("org.acme", "gone", "1.0")
            .with_scope("provided")
            .with_file("/nonexistent/gone-1.0.jar");
        let scanner = DependencyGraphScanner::new(Arc::new(vec![portal_war(), missing]));
        let ctx = ScanContext::default();
        let mut store = EvidenceStore::new();

        scanner.scan(&mut store, &ctx).await.unwrap();

        assert!(store.is_empty());
        let diagnostics = ctx.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::InvalidInput);
        assert_eq!(diagnostics[0].subject, "org.acme:gone:jar:1.0");
    }

    #[tokio::test]
    async fn test_lookup_matches_direct_artifact() {
        let lookup = lookup(
            vec![DependencyArtifact::new("org.acme", "acme-util", "1.4.2")
                .with_file("/repo/acme-util-1.4.2.jar")],
            vec![],
        );
        let ctx = ScanContext::default();

        let version = lookup.version_for("acme-util-1.4.2.jar", &ctx).await;
        assert_eq!(version.as_deref(), Some("1.4.2"));
    }

    #[tokio::test]
    async fn test_lookup_matches_inside_war_tree() {
        let lookup = lookup(vec![portal_war()], vec![portal_tree()]);
        let ctx = ScanContext::default();

        let version = lookup.version_for("commons-io-2.11.0.jar", &ctx).await;
        assert_eq!(version.as_deref(), Some("2.11.0"));
        assert_eq!(lookup.cache.len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_deduplicates_by_coordinates() {
        let direct = DependencyArtifact::new("commons-io", "commons-io", "2.11.0")
            .with_file("/repo/commons-io-2.11.0.jar");
        let lookup = lookup(vec![direct, portal_war()], vec![portal_tree()]);
        let ctx = ScanContext::default();

        let version = lookup.version_for("commons-io-2.11.0.jar", &ctx).await;
        assert_eq!(version.as_deref(), Some("2.11.0"));
        assert!(ctx.diagnostics().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_reports_ambiguity() {
        let first = DependencyArtifact::new("org.acme", "dup", "1.0").with_file("/a/dup.jar");
        let second = DependencyArtifact::new("org.other", "dup", "2.0").with_file("/b/dup.jar");
        let lookup = lookup(vec![first, second], vec![]);
        let ctx = ScanContext::default();

        assert!(lookup.version_for("dup.jar", &ctx).await.is_none());
        let diagnostics = ctx.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::AmbiguousResolution);
    }

    #[tokio::test]
    async fn test_lookup_reports_missing_artifact() {
        let lookup = lookup(vec![], vec![]);
        let ctx = ScanContext::default();

        assert!(lookup.version_for("unknown.jar", &ctx).await.is_none());
        assert_eq!(ctx.diagnostics()[0].kind, DiagnosticKind::UnresolvedArtifact);
    }

    #[tokio::test]
    async fn test_unresolvable_war_is_reported_once() {
        let lookup = lookup(vec![portal_war()], vec![]);
        let ctx = ScanContext::default();

        lookup.version_for("a.jar", &ctx).await;
        lookup.version_for("b.jar", &ctx).await;

        let unresolvable = ctx
            .diagnostics()
            .iter()
            .filter(|d| d.kind == DiagnosticKind::UnresolvableTransitive)
            .count();
        assert_eq!(unresolvable, 1);
    }
}
