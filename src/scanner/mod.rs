//! Package evidence scanners.
//!
//! This module provides the [`Scanner`] trait and the four evidence sources
//! that feed an [`EvidenceStore`].
//!
//! # Available Scanners
//!
//! | Scanner | Source |
//! |---------|--------|
//! | [`DependencyGraphScanner`] | Provided-scope JAR dependencies |
//! | [`BuildOutputScanner`] | Compiled classes directory |
//! | [`JarDirectoryScanner`] | Flat directories of JAR files |
//! | [`ExistingManifestScanner`] | A previously generated manifest |
//!
//! Scanners are stateless. Everything that belongs to one run (exclusions,
//! diagnostics, cancellation, worker count) travels in a [`ScanContext`].
//!
//! # Example
//!
//! ```no_run
//! use bundlescan::scanner::{BuildOutputScanner, ScanContext, Scanner};
//! use bundlescan::EvidenceStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let scanner = BuildOutputScanner::new("target/classes", "portal", "8.1.0");
//!     let ctx = ScanContext::default();
//!     let mut store = EvidenceStore::new();
//!
//!     scanner.scan(&mut store, &ctx).await?;
//!     println!("Found {} packages", store.len());
//!     Ok(())
//! }
//! ```

mod build_output;
mod dependency;
mod existing_manifest;
pub(crate) mod jar;
mod jar_directory;

pub use build_output::BuildOutputScanner;
pub use dependency::{ArtifactLookup, DependencyGraphScanner};
pub use existing_manifest::{ExistingManifestScanner, DEFAULT_RESERVED_NAMESPACE};
pub use jar::scan_jar;
pub use jar_directory::JarDirectoryScanner;

use crate::error::{Result, ScanError};
use crate::model::{Diagnostic, EvidenceStore, Observation};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Package prefixes that are never recorded.
pub const DEFAULT_EXCLUDED_PREFIXES: &[&str] =
    &["META-INF", "OSGI-INF", "OSGI-OPT", "WEB-INF", "org.osgi"];

/// Default number of archives read concurrently.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Trait for collecting package evidence from one kind of source.
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Returns the human-readable name of this scanner.
    fn name(&self) -> &'static str;

    /// Records everything this source knows into `store`.
    ///
    /// # Errors
    ///
    /// Returns an error when the source as a whole is unusable, or
    /// [`ScanError::Cancelled`] when the run was cancelled. Problems with a
    /// single archive are reported through the context instead.
    async fn scan(&self, store: &mut EvidenceStore, ctx: &ScanContext) -> Result<()>;
}

/// Namespaces that must never appear as packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exclusions {
    prefixes: Vec<String>,
}

impl Exclusions {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Default prefixes plus `extra`.
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut exclusions = Self::default();
        exclusions
            .prefixes
            .extend(extra.into_iter().map(Into::into));
        exclusions
    }

    /// Returns true if `package` is empty or inside an excluded namespace.
    pub fn is_excluded(&self, package: &str) -> bool {
        package.is_empty()
            || self
                .prefixes
                .iter()
                .any(|prefix| package.starts_with(prefix.as_str()))
    }
}

impl Default for Exclusions {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_PREFIXES.iter().copied())
    }
}

/// Per-run state shared by all scanners.
pub struct ScanContext {
    exclusions: Arc<Exclusions>,
    diagnostics: Mutex<Vec<Diagnostic>>,
    cancellation: CancellationToken,
    concurrency: usize,
}

impl ScanContext {
    pub fn new(exclusions: Exclusions) -> Self {
        Self {
            exclusions: Arc::new(exclusions),
            diagnostics: Mutex::new(Vec::new()),
            cancellation: CancellationToken::new(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn exclusions(&self) -> &Exclusions {
        &self.exclusions
    }

    pub(crate) fn shared_exclusions(&self) -> Arc<Exclusions> {
        Arc::clone(&self.exclusions)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fails with [`ScanError::Cancelled`] once the run is cancelled.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ScanError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        self.lock_diagnostics().push(diagnostic);
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.lock_diagnostics().clone()
    }

    fn lock_diagnostics(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        match self.diagnostics.lock() {
            Ok(diagnostics) => diagnostics,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for ScanContext {
    fn default() -> Self {
        Self::new(Exclusions::default())
    }
}

/// Merges archive scan results into the store in stream order.
///
/// The store has a single writer: batches produced concurrently are applied
/// one at a time, in input order. A failed batch is reported and skipped.
/// Returns the number of batches merged.
pub(crate) async fn merge_in_order<S>(
    store: &mut EvidenceStore,
    ctx: &ScanContext,
    batches: S,
) -> Result<usize>
where
    S: Stream<Item = (String, Result<Vec<Observation>>)>,
{
    let mut batches = std::pin::pin!(batches);
    let mut merged = 0;

    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => return Err(ScanError::Cancelled),
            next = batches.next() => next,
        };

        let Some((subject, batch)) = next else {
            break;
        };

        match batch {
            Ok(observations) => {
                store.extend(observations);
                merged += 1;
            }
            Err(ScanError::Cancelled) => return Err(ScanError::Cancelled),
            Err(e) => {
                warn!(subject = %subject, error = %e, "skipping archive");
                ctx.report(Diagnostic::from_error(subject, &e));
            }
        }
    }

    Ok(merged)
}
