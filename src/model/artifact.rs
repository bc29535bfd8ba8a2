use crate::error::{Result, ScanError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const SCOPE_PROVIDED: &str = "provided";
pub const TYPE_JAR: &str = "jar";
pub const TYPE_WAR: &str = "war";

/// A resolved project dependency.
///
/// This mirrors what a build tool reports after dependency resolution:
/// coordinates, scope, packaging type and the local file, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyArtifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    /// Version without snapshot timestamps. Falls back to `version`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_version: Option<String>,
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_type() -> String {
    TYPE_JAR.to_string()
}

fn default_scope() -> String {
    "compile".to_string()
}

impl DependencyArtifact {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            base_version: None,
            kind: default_type(),
            scope: default_scope(),
            classifier: None,
            file: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn base_version(&self) -> &str {
        self.base_version.as_deref().unwrap_or(&self.version)
    }

    /// `group:artifact:type:baseVersion`, the key used for war resolution.
    pub fn coordinates(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.group_id,
            self.artifact_id,
            self.kind,
            self.base_version()
        )
    }

    pub fn file_name(&self) -> Option<String> {
        self.file
            .as_ref()?
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
    }

    pub fn is_provided(&self) -> bool {
        self.scope.contains(SCOPE_PROVIDED)
    }

    pub fn is_jar(&self) -> bool {
        self.kind == TYPE_JAR
    }

    pub fn is_war(&self) -> bool {
        self.kind == TYPE_WAR
    }

    /// Loads a resolved dependency set from a JSON array.
    pub fn load_all(path: &Path) -> Result<Vec<Self>> {
        let content = fs::read_to_string(path).map_err(|e| ScanError::DependencySet {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| ScanError::DependencySet {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl std::fmt::Display for DependencyArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.coordinates())
    }
}

/// A node of a transitive dependency tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyNode {
    pub artifact: DependencyArtifact,
    #[serde(default)]
    pub children: Vec<DependencyNode>,
}

impl DependencyNode {
    pub fn new(artifact: DependencyArtifact) -> Self {
        Self {
            artifact,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<DependencyNode>) -> Self {
        self.children = children;
        self
    }

    /// Visits the tree depth-first, parents before children.
    pub fn visit<'a, F>(&'a self, visitor: &mut F)
    where
        F: FnMut(&'a DependencyNode),
    {
        visitor(self);
        for child in &self.children {
            child.visit(visitor);
        }
    }

    /// Returns every artifact in the tree whose file name equals `file_name`.
    pub fn find_by_file_name(&self, file_name: &str) -> Vec<&DependencyArtifact> {
        let mut matches = Vec::new();
        self.visit(&mut |node| {
            if node.artifact.file_name().as_deref() == Some(file_name) {
                matches.push(&node.artifact);
            }
        });
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn war_tree() -> DependencyNode {
        let root = DependencyArtifact::new("org.acme", "portal", "8.0.0").with_kind(TYPE_WAR);
        let util = DependencyArtifact::new("org.acme", "acme-util", "1.4.2")
            .with_file("acme-util-1.4.2.jar");
        let inner = DependencyArtifact::new("commons-io", "commons-io", "2.11.0")
            .with_file("commons-io-2.11.0.jar");

        DependencyNode::new(root).with_children(vec![
            DependencyNode::new(util).with_children(vec![DependencyNode::new(inner)])
        ])
    }

    #[test]
    fn test_coordinates_use_base_version() {
        let mut artifact = DependencyArtifact::new("org.acme", "portal", "8.0.0-20240101.1")
            .with_kind(TYPE_WAR);
        artifact.base_version = Some("8.0.0-SNAPSHOT".to_string());

        assert_eq!(artifact.coordinates(), "org.acme:portal:war:8.0.0-SNAPSHOT");
        assert_eq!(artifact.base_version(), "8.0.0-SNAPSHOT");
    }

    #[test]
    fn test_scope_and_type_checks() {
        let artifact = DependencyArtifact::new("javax.servlet", "servlet-api", "3.0")
            .with_scope("provided");
        assert!(artifact.is_provided());
        assert!(artifact.is_jar());
        assert!(!artifact.is_war());
    }

    #[test]
    fn test_file_name_from_path() {
        let artifact = DependencyArtifact::new("org.acme", "acme-util", "1.0")
            .with_file("/repo/org/acme/acme-util-1.0.jar");
        assert_eq!(artifact.file_name().as_deref(), Some("acme-util-1.0.jar"));
        assert_eq!(DependencyArtifact::new("a", "b", "1").file_name(), None);
    }

    #[test]
    fn test_find_by_file_name_searches_nested_nodes() {
        let tree = war_tree();

        let found = tree.find_by_file_name("commons-io-2.11.0.jar");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].version, "2.11.0");
        assert!(tree.find_by_file_name("missing.jar").is_empty());
    }

    #[test]
    fn test_load_dependency_set_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dependencies.json");
        fs::write(
            &path,
            r#"[
                {"group_id": "javax.servlet", "artifact_id": "servlet-api", "version": "3.0",
                 "scope": "provided", "file": "/repo/servlet-api-3.0.jar"},
                {"group_id": "org.acme", "artifact_id": "portal", "version": "8.0.0", "type": "war"}
            ]"#,
        )
        .unwrap();

        let artifacts = DependencyArtifact::load_all(&path).unwrap();
        assert_eq!(artifacts.len(), 2);
        assert!(artifacts[0].is_provided());
        assert_eq!(artifacts[0].kind, "jar");
        assert!(artifacts[1].is_war());
        assert_eq!(artifacts[1].scope, "compile");
    }

    #[test]
    fn test_load_dependency_set_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dependencies.json");
        fs::write(&path, "{not json").unwrap();

        let err = DependencyArtifact::load_all(&path).unwrap_err();
        assert!(matches!(err, ScanError::DependencySet { .. }));
    }
}
