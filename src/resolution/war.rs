use super::DependencyResolver;
use crate::error::{Result, ScanError};
use crate::manifest::{BUNDLE_VERSION, IMPLEMENTATION_VERSION};
use crate::model::{DependencyArtifact, DependencyNode};
use crate::output::Properties;
use crate::scanner::jar::read_manifest;
use async_trait::async_trait;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

const LIB_PREFIX: &str = "WEB-INF/lib/";

/// Resolves a war from its local file by reading the JARs it bundles.
///
/// Each `WEB-INF/lib/*.jar` becomes a child node. Coordinates come from the
/// nested JAR's `META-INF/maven/**/pom.properties`, or from its manifest
/// when the JAR was not built by Maven.
pub struct WarInspector;

#[async_trait]
impl DependencyResolver for WarInspector {
    fn name(&self) -> &'static str {
        "Local War"
    }

    async fn resolve(&self, war: &DependencyArtifact) -> Result<DependencyNode> {
        let path = match &war.file {
            Some(path) if path.is_file() => path.clone(),
            _ => {
                return Err(ScanError::UnresolvableTransitive {
                    coordinates: war.coordinates(),
                    reason: "war file is not available locally".to_string(),
                })
            }
        };

        let artifact = war.clone();
        tokio::task::spawn_blocking(move || {
            let file = File::open(&path).map_err(|e| ScanError::malformed(&path, e))?;
            let archive = ZipArchive::new(BufReader::new(file))
                .map_err(|e| ScanError::malformed(&path, e))?;
            inspect_war(&artifact, archive, &path)
        })
        .await
        .map_err(|e| ScanError::UnresolvableTransitive {
            coordinates: war.coordinates(),
            reason: e.to_string(),
        })?
        .map_err(|e| ScanError::UnresolvableTransitive {
            coordinates: war.coordinates(),
            reason: e.to_string(),
        })
    }
}

/// Builds the dependency tree of `war` from its archive contents.
pub fn inspect_war<R: Read + Seek>(
    war: &DependencyArtifact,
    mut archive: ZipArchive<R>,
    path: &Path,
) -> Result<DependencyNode> {
    let libraries: Vec<String> = archive
        .file_names()
        .filter(|name| is_bundled_jar(name))
        .map(str::to_string)
        .collect();

    let mut children = Vec::new();
    for name in libraries {
        let mut bytes = Vec::new();
        archive
            .by_name(&name)
            .and_then(|mut entry| entry.read_to_end(&mut bytes).map_err(Into::into))
            .map_err(|e| ScanError::malformed(path, e))?;

        let file_name = name.trim_start_matches(LIB_PREFIX);
        match describe_jar(file_name, bytes) {
            Some(artifact) => children.push(DependencyNode::new(artifact)),
            None => debug!(war = %war, jar = file_name, "no coordinates for bundled jar"),
        }
    }

    Ok(DependencyNode::new(war.clone()).with_children(children))
}

fn is_bundled_jar(name: &str) -> bool {
    name.strip_prefix(LIB_PREFIX)
        .is_some_and(|rest| !rest.contains('/') && rest.ends_with(".jar"))
}

/// Coordinates of a bundled JAR, keyed by its file name inside the war.
fn describe_jar(file_name: &str, bytes: Vec<u8>) -> Option<DependencyArtifact> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).ok()?;

    if let Some(artifact) = from_pom_properties(&mut archive, file_name) {
        return Some(artifact.with_file(file_name));
    }

    let manifest = read_manifest(&mut archive, Path::new(file_name)).ok()??;
    let version = manifest
        .main_attribute(BUNDLE_VERSION)
        .or_else(|| manifest.main_attribute(IMPLEMENTATION_VERSION))?;
    let artifact_id = file_name.trim_end_matches(".jar");
    Some(DependencyArtifact::new("", artifact_id, version).with_file(file_name))
}

fn from_pom_properties<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    file_name: &str,
) -> Option<DependencyArtifact> {
    let candidates: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with("META-INF/maven/") && name.ends_with("/pom.properties"))
        .map(str::to_string)
        .collect();

    let mut described = Vec::new();
    for name in candidates {
        let mut content = String::new();
        let readable = match archive.by_name(&name) {
            Ok(mut entry) => entry.read_to_string(&mut content).is_ok(),
            Err(_) => false,
        };
        if !readable {
            continue;
        }
        let properties = Properties::parse(&content);
        if let (Some(group), Some(artifact), Some(version)) = (
            properties.get("groupId"),
            properties.get("artifactId"),
            properties.get("version"),
        ) {
            described.push(DependencyArtifact::new(group, artifact, version));
        }
    }

    // Shaded JARs carry several pom.properties; prefer the one named like the file.
    let position = described
        .iter()
        .position(|a| file_name.starts_with(&format!("{}-", a.artifact_id)))
        .unwrap_or(0);
    if described.is_empty() {
        None
    } else {
        Some(described.swap_remove(position))
    }
}
