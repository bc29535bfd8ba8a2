//! Run-scoped cache of war dependency trees.
//!
//! Resolving the transitive dependencies of a war may download the archive
//! from a remote repository, so each coordinate is resolved at most once per
//! aggregation run. The cache is owned by the run and handed to the lookup
//! explicitly; independent runs never share entries.
//!
//! # Example
//!
//! ```
//! use bundlescan::cache::ResolutionCache;
//! use bundlescan::model::{DependencyArtifact, DependencyNode};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cache = ResolutionCache::new();
//! let war = DependencyArtifact::new("org.acme", "portal", "8.0.0").with_kind("war");
//!
//! let node = cache
//!     .get_or_resolve(&war.coordinates(), || async {
//!         Some(DependencyNode::new(war.clone()))
//!     })
//!     .await;
//! assert!(node.is_some());
//! assert_eq!(cache.len(), 1);
//! # }
//! ```

use crate::model::DependencyNode;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

type Slot = Arc<OnceCell<Option<Arc<DependencyNode>>>>;

/// Resolved dependency trees keyed by `group:artifact:type:version`.
///
/// A failed resolution is cached as `None` so a broken coordinate is not
/// retried for every JAR that is looked up.
#[derive(Default)]
pub struct ResolutionCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, coordinates: &str) -> Slot {
        let mut slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(slots.entry(coordinates.to_string()).or_default())
    }

    /// Returns the cached tree for `coordinates`, resolving it on first use.
    ///
    /// Concurrent callers for the same coordinate wait for a single
    /// resolution.
    pub async fn get_or_resolve<F, Fut>(
        &self,
        coordinates: &str,
        resolve: F,
    ) -> Option<Arc<DependencyNode>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<DependencyNode>>,
    {
        let slot = self.slot(coordinates);
        slot.get_or_init(|| async move { resolve().await.map(Arc::new) })
            .await
            .clone()
    }

    /// Returns the cached outcome without resolving.
    pub fn get(&self, coordinates: &str) -> Option<Option<Arc<DependencyNode>>> {
        let slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.get(coordinates)?.get().cloned()
    }

    /// Number of coordinates with a settled outcome.
    pub fn len(&self) -> usize {
        let slots = match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DependencyArtifact;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn node(version: &str) -> DependencyNode {
        DependencyNode::new(DependencyArtifact::new("org.acme", "portal", version).with_kind("war"))
    }

    #[tokio::test]
    async fn test_resolves_once_per_coordinate() {
        let cache = ResolutionCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let resolved = cache
                .get_or_resolve("org.acme:portal:war:1", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Some(node("1"))
                })
                .await;
            assert_eq!(resolved.unwrap().artifact.version, "1");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_cached() {
        let cache = ResolutionCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let resolved = cache
                .get_or_resolve("org.acme:portal:war:2", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    None
                })
                .await;
            assert!(resolved.is_none());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get("org.acme:portal:war:2"), Some(None));
    }

    #[tokio::test]
    async fn test_independent_caches_do_not_share_entries() {
        let first = ResolutionCache::new();
        let second = ResolutionCache::new();

        first
            .get_or_resolve("org.acme:portal:war:1", || async { Some(node("1")) })
            .await;

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert!(second.get("org.acme:portal:war:1").is_none());
    }
}
