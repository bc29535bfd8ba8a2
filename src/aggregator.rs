//! Orchestration of one aggregation run.
//!
//! The [`Aggregator`] runs the scanners in a fixed order over a fresh
//! [`EvidenceStore`], resolves split packages, appends the manual packages
//! and writes the framework property file.
//!
//! # Example
//!
//! ```no_run
//! use bundlescan::aggregator::{Aggregator, AggregatorOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let options = AggregatorOptions {
//!         jar_directories: vec!["target/portal/WEB-INF/lib".into()],
//!         property_output: Some("target/felix-framework.properties".into()),
//!         ..AggregatorOptions::default()
//!     };
//!
//!     let outcome = Aggregator::new(options).run().await?;
//!     println!("{}", outcome.generated);
//!     Ok(())
//! }
//! ```

use crate::cache::ResolutionCache;
use crate::error::{Result, ScanError};
use crate::model::{DependencyArtifact, Diagnostic, DiagnosticKind, EvidenceStore, ScanReport};
use crate::output::{write_package_list, write_report, SYSTEM_PACKAGES_EXTRA};
use crate::resolution::{DependencyResolver, RepositoryResolver, ResolverChain, WarInspector};
use crate::resolver::{normalize, ResolutionMode, ResolvedExport, SplitPackageResolver};
use crate::scanner::{
    ArtifactLookup, BuildOutputScanner, DependencyGraphScanner, Exclusions,
    ExistingManifestScanner, JarDirectoryScanner, ScanContext, Scanner, DEFAULT_CONCURRENCY,
    DEFAULT_RESERVED_NAMESPACE,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default name under which the generated list is exposed.
pub const GENERATED_PROPERTY: &str = "jahiaGeneratedFrameworkPackageList";

/// Default manual package list.
pub const DEFAULT_MANUAL_PACKAGES: &[&str] = &["javax.servlet;version=3.0"];

/// The project's compiled classes and the identity they are recorded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    pub directory: PathBuf,
    pub final_name: String,
    pub version: String,
}

/// Everything one run reads and writes.
#[derive(Debug, Clone)]
pub struct AggregatorOptions {
    pub manifest: Option<PathBuf>,
    pub jar_directories: Vec<PathBuf>,
    /// JSON file holding the resolved dependency set.
    pub dependency_set: Option<PathBuf>,
    pub build_output: Option<BuildOutput>,
    pub manual_packages: Vec<String>,
    pub scan_dependencies: bool,
    pub mode: ResolutionMode,
    pub reserved_namespace: String,
    /// Package prefixes excluded on top of the built-in ones.
    pub extra_exclusions: Vec<String>,
    pub property_input: Option<PathBuf>,
    pub property_output: Option<PathBuf>,
    pub property_key: String,
    pub generated_property: String,
    pub report: Option<PathBuf>,
    /// Maven-layout repositories used to download wars that are not local.
    pub repositories: Vec<String>,
    pub concurrency: usize,
    pub timeout: Option<Duration>,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            manifest: None,
            jar_directories: Vec::new(),
            dependency_set: None,
            build_output: None,
            manual_packages: DEFAULT_MANUAL_PACKAGES.iter().map(|p| p.to_string()).collect(),
            scan_dependencies: true,
            mode: ResolutionMode::default(),
            reserved_namespace: DEFAULT_RESERVED_NAMESPACE.to_string(),
            extra_exclusions: Vec::new(),
            property_input: None,
            property_output: None,
            property_key: SYSTEM_PACKAGES_EXTRA.to_string(),
            generated_property: GENERATED_PROPERTY.to_string(),
            report: None,
            repositories: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            timeout: None,
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct AggregationOutcome {
    /// Entries written to the property file.
    pub package_list: Vec<String>,
    /// The entries joined with commas.
    pub generated: String,
    /// Name the generated value is exposed under.
    pub generated_property: String,
    pub report: ScanReport,
}

impl AggregationOutcome {
    pub fn is_complete(&self) -> bool {
        !self.report.incomplete
    }
}

/// Runs scanners, resolution and output for one set of options.
pub struct Aggregator {
    options: AggregatorOptions,
    resolver: Arc<dyn DependencyResolver>,
    cancellation: CancellationToken,
}

impl Aggregator {
    /// Creates an aggregator resolving wars from disk, then from the
    /// configured repositories.
    pub fn new(options: AggregatorOptions) -> Self {
        let mut chain = ResolverChain::new().with(Box::new(WarInspector));
        if !options.repositories.is_empty() {
            chain.push(Box::new(RepositoryResolver::new(options.repositories.clone())));
        }
        Self {
            options,
            resolver: Arc::new(chain),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn DependencyResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Token that stops the remaining scans when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Runs the aggregation.
    ///
    /// Evidence collected before a cancellation or timeout is kept and the
    /// outputs are still written; the report is then marked incomplete.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::OutputIo`] if the property file or the report
    /// cannot be written. Every other problem ends up in the report.
    pub async fn run(&self) -> Result<AggregationOutcome> {
        let options = &self.options;
        let ctx = ScanContext::new(Exclusions::with_extra(options.extra_exclusions.iter().cloned()))
            .with_cancellation(self.cancellation.clone())
            .with_concurrency(options.concurrency);

        let timer = options.timeout.map(|timeout| {
            let token = self.cancellation.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                warn!(timeout_secs = timeout.as_secs(), "aggregation timed out, cancelling remaining scans");
                token.cancel();
            })
        });

        let artifacts = Arc::new(self.load_dependencies(&ctx));
        let cache = Arc::new(ResolutionCache::new());
        let scanners = self.scanners(&artifacts, &cache);

        let mut store = EvidenceStore::new();
        let mut incomplete = false;
        for scanner in &scanners {
            if ctx.is_cancelled() {
                incomplete = true;
                break;
            }
            info!(scanner = scanner.name(), "running scanner");
            match scanner.scan(&mut store, &ctx).await {
                Ok(()) => {}
                Err(ScanError::Cancelled) => {
                    incomplete = true;
                    break;
                }
                Err(e) => {
                    warn!(scanner = scanner.name(), error = %e, "scanner failed");
                    ctx.report(Diagnostic::from_error(scanner.name(), &e));
                }
            }
        }
        if let Some(timer) = timer {
            timer.abort();
        }
        if incomplete {
            warn!(packages = store.len(), "run cancelled, producing outputs from partial evidence");
            ctx.report(Diagnostic::new(
                DiagnosticKind::Cancelled,
                "aggregation",
                "scanning stopped before every source was read",
            ));
        }

        let resolution = SplitPackageResolver::new(options.mode).resolve(&store);
        let package_list = assemble(&resolution.exports, &options.manual_packages);
        let generated = package_list.join(",");
        info!(packages = store.len(), exports = package_list.len(), "found packages in dependencies");

        let mut report = ScanReport::new();
        report.packages_scanned = store.len();
        report.exported_entries = package_list.len();
        report.split_packages = resolution.split_packages;
        report.diagnostics = ctx.diagnostics();
        report.incomplete = incomplete;

        if let Some(output) = &options.property_output {
            write_package_list(
                options.property_input.as_deref(),
                output,
                &options.property_key,
                &package_list,
            )?;
        }
        if let Some(path) = &options.report {
            write_report(path, &report)?;
        }

        Ok(AggregationOutcome {
            package_list,
            generated,
            generated_property: options.generated_property.clone(),
            report,
        })
    }

    fn load_dependencies(&self, ctx: &ScanContext) -> Vec<DependencyArtifact> {
        let Some(path) = &self.options.dependency_set else {
            return Vec::new();
        };
        match DependencyArtifact::load_all(path) {
            Ok(artifacts) => artifacts,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot load dependency set");
                ctx.report(Diagnostic::from_error(path.display().to_string(), &e));
                Vec::new()
            }
        }
    }

    fn scanners(
        &self,
        artifacts: &Arc<Vec<DependencyArtifact>>,
        cache: &Arc<ResolutionCache>,
    ) -> Vec<Box<dyn Scanner>> {
        let options = &self.options;
        let mut scanners: Vec<Box<dyn Scanner>> = Vec::new();

        if options.scan_dependencies {
            scanners.push(Box::new(DependencyGraphScanner::new(Arc::clone(artifacts))));
        }
        if let Some(build) = &options.build_output {
            scanners.push(Box::new(BuildOutputScanner::new(
                build.directory.clone(),
                build.final_name.clone(),
                build.version.clone(),
            )));
        }
        let lookup = ArtifactLookup::new(
            Arc::clone(artifacts),
            Arc::clone(&self.resolver),
            Arc::clone(cache),
        );
        scanners.push(Box::new(
            JarDirectoryScanner::new(options.jar_directories.clone()).with_lookup(lookup),
        ));
        if let Some(manifest) = &options.manifest {
            scanners.push(Box::new(
                ExistingManifestScanner::new(manifest.clone())
                    .with_reserved_namespace(options.reserved_namespace.clone()),
            ));
        }
        scanners
    }
}

/// Builds the final export entries.
///
/// Resolved packages come first, in package order, one entry per version.
/// Manual packages follow in their given order unless an identical entry is
/// already present.
pub fn assemble(exports: &ResolvedExport, manual_packages: &[String]) -> Vec<String> {
    let mut entries: Vec<String> = exports
        .iter()
        .flat_map(|(package, versions)| {
            versions
                .iter()
                .map(move |version| format!("{};version=\"{}\"", package, normalize(version)))
        })
        .collect();

    for manual in manual_packages {
        if !entries.contains(manual) {
            entries.push(manual.clone());
        }
    }
    entries
}
