//! Secondary resolution of war dependencies.
//!
//! JARs bundled inside a war are not on the project's own dependency list,
//! so their versions are only reachable through the war's transitive
//! dependency tree. A [`DependencyResolver`] produces that tree for one war
//! artifact.
//!
//! | Resolver | Source |
//! |----------|--------|
//! | [`WarInspector`] | The war file already present on disk |
//! | [`RepositoryResolver`] | A Maven-layout repository over HTTP |

mod remote;
mod war;

pub use remote::RepositoryResolver;
pub use war::{inspect_war, WarInspector};

use crate::error::{Result, ScanError};
use crate::model::{DependencyArtifact, DependencyNode};
use async_trait::async_trait;
use tracing::debug;

/// Produces the transitive dependency tree of a war artifact.
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    /// Returns the human-readable name of this resolver.
    fn name(&self) -> &'static str;

    /// Resolves the dependency tree rooted at `war`.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::UnresolvableTransitive`] when this resolver
    /// cannot produce the tree.
    async fn resolve(&self, war: &DependencyArtifact) -> Result<DependencyNode>;
}

/// Tries resolvers in order; the first success wins.
#[derive(Default)]
pub struct ResolverChain {
    resolvers: Vec<Box<dyn DependencyResolver>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: Box<dyn DependencyResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    pub fn push(&mut self, resolver: Box<dyn DependencyResolver>) {
        self.resolvers.push(resolver);
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

#[async_trait]
impl DependencyResolver for ResolverChain {
    fn name(&self) -> &'static str {
        "Resolver Chain"
    }

    async fn resolve(&self, war: &DependencyArtifact) -> Result<DependencyNode> {
        let mut reasons = Vec::new();
        for resolver in &self.resolvers {
            match resolver.resolve(war).await {
                Ok(node) => {
                    debug!(war = %war, resolver = resolver.name(), "resolved war dependencies");
                    return Ok(node);
                }
                Err(e) => reasons.push(format!("{}: {}", resolver.name(), e)),
            }
        }

        if reasons.is_empty() {
            reasons.push("no resolver configured".to_string());
        }
        Err(ScanError::UnresolvableTransitive {
            coordinates: war.coordinates(),
            reason: reasons.join("; "),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Resolver returning fixed trees, for tests.
    pub(crate) struct StaticResolver {
        pub(crate) trees: HashMap<String, DependencyNode>,
    }

    #[async_trait]
    impl DependencyResolver for StaticResolver {
        fn name(&self) -> &'static str {
            "Static"
        }

        async fn resolve(&self, war: &DependencyArtifact) -> Result<DependencyNode> {
            self.trees
                .get(&war.coordinates())
                .cloned()
                .ok_or_else(|| ScanError::UnresolvableTransitive {
                    coordinates: war.coordinates(),
                    reason: "unknown".to_string(),
                })
        }
    }

    fn war() -> DependencyArtifact {
        DependencyArtifact::new("org.acme", "portal", "8.0.0").with_kind("war")
    }

    #[tokio::test]
    async fn test_chain_falls_through_to_next_resolver() {
        let empty = StaticResolver {
            trees: HashMap::new(),
        };
        let known = StaticResolver {
            trees: HashMap::from([(war().coordinates(), DependencyNode::new(war()))]),
        };
        let chain = ResolverChain::new().with(Box::new(empty)).with(Box::new(known));

        let node = chain.resolve(&war()).await.unwrap();
        assert_eq!(node.artifact, war());
    }

    #[tokio::test]
    async fn test_chain_reports_every_failure() {
        let chain = ResolverChain::new().with(Box::new(StaticResolver {
            trees: HashMap::new(),
        }));

        let err = chain.resolve(&war()).await.unwrap_err();
        match err {
            ScanError::UnresolvableTransitive { coordinates, reason } => {
                assert_eq!(coordinates, "org.acme:portal:war:8.0.0");
                assert!(reason.contains("Static"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_chain_is_unresolvable() {
        let err = ResolverChain::new().resolve(&war()).await.unwrap_err();
        assert!(matches!(err, ScanError::UnresolvableTransitive { .. }));
    }
}
