use super::{inspect_war, DependencyResolver};
use crate::error::{Result, ScanError};
use crate::model::{DependencyArtifact, DependencyNode};
use async_trait::async_trait;
use std::io::Cursor;
use std::path::PathBuf;
use tracing::debug;
use zip::ZipArchive;

/// Downloads a war from Maven-layout repositories and inspects it in memory.
pub struct RepositoryResolver {
    client: reqwest::Client,
    repositories: Vec<String>,
}

impl RepositoryResolver {
    pub fn new<I, S>(repositories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            client: reqwest::Client::new(),
            repositories: repositories
                .into_iter()
                .map(|url| url.into().trim_end_matches('/').to_string())
                .collect(),
        }
    }

    pub fn repositories(&self) -> &[String] {
        &self.repositories
    }

    /// Location of `artifact` under the repository rooted at `base`.
    pub fn artifact_url(base: &str, artifact: &DependencyArtifact) -> String {
        let mut file = format!("{}-{}", artifact.artifact_id, artifact.version);
        if let Some(classifier) = artifact.classifier.as_deref().filter(|c| !c.is_empty()) {
            file.push('-');
            file.push_str(classifier);
        }
        format!(
            "{}/{}/{}/{}/{}.{}",
            base.trim_end_matches('/'),
            artifact.group_id.replace('.', "/"),
            artifact.artifact_id,
            artifact.base_version(),
            file,
            artifact.kind
        )
    }

    async fn download(&self, url: &str) -> std::result::Result<Vec<u8>, reqwest::Error> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl DependencyResolver for RepositoryResolver {
    fn name(&self) -> &'static str {
        "Maven Repository"
    }

    async fn resolve(&self, war: &DependencyArtifact) -> Result<DependencyNode> {
        let mut reasons = Vec::new();

        for base in &self.repositories {
            let url = Self::artifact_url(base, war);
            let bytes = match self.download(&url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(url = %url, error = %e, "war download failed");
                    reasons.push(format!("{}: {}", url, e));
                    continue;
                }
            };

            let label = PathBuf::from(&url);
            let artifact = war.clone();
            let inspected = tokio::task::spawn_blocking(move || {
                let archive =
                    ZipArchive::new(Cursor::new(bytes)).map_err(|e| ScanError::malformed(&label, e))?;
                inspect_war(&artifact, archive, &label)
            })
            .await;

            match inspected {
                Ok(Ok(node)) => return Ok(node),
                Ok(Err(e)) => reasons.push(e.to_string()),
                Err(e) => reasons.push(e.to_string()),
            }
        }

        if reasons.is_empty() {
            reasons.push("no repository configured".to_string());
        }
        Err(ScanError::UnresolvableTransitive {
            coordinates: war.coordinates(),
            reason: reasons.join("; "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_url_release() {
        let war = DependencyArtifact::new("org.jahia.server", "jahia-war", "8.1.0.0").with_kind("war");
        assert_eq!(
            RepositoryResolver::artifact_url("https://repo.example.org/maven2/", &war),
            "https://repo.example.org/maven2/org/jahia/server/jahia-war/8.1.0.0/jahia-war-8.1.0.0.war"
        );
    }

    #[test]
    fn test_artifact_url_timestamped_snapshot_with_classifier() {
        let mut war = DependencyArtifact::new("org.acme", "portal", "2.0-20240105.101010-3").with_kind("war");
        war.base_version = Some("2.0-SNAPSHOT".to_string());
        war.classifier = Some("light".to_string());

        assert_eq!(
            RepositoryResolver::artifact_url("https://repo.example.org", &war),
            "https://repo.example.org/org/acme/portal/2.0-SNAPSHOT/portal-2.0-20240105.101010-3-light.war"
        );
    }

    #[test]
    fn test_trailing_slashes_are_trimmed() {
        let resolver = RepositoryResolver::new(["https://a.example.org/", "https://b.example.org"]);
        assert_eq!(
            resolver.repositories(),
            &["https://a.example.org".to_string(), "https://b.example.org".to_string()]
        );
    }

    #[tokio::test]
    async fn test_no_repository_is_unresolvable() {
        let resolver = RepositoryResolver::new(Vec::<String>::new());
        let war = DependencyArtifact::new("org.acme", "portal", "1.0").with_kind("war");

        let err = resolver.resolve(&war).await.unwrap_err();
        match err {
            ScanError::UnresolvableTransitive { reason, .. } => {
                assert_eq!(reason, "no repository configured")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
