use crate::model::{EvidenceStore, SplitPackage, VersionLocation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// How packages exported at several versions are collapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionMode {
    /// Export every distinct version, in first-seen order.
    #[default]
    AllVersions,
    /// Export only the version with the most occurrences.
    SingleVersion,
}

/// Versions to export per package, packages in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedExport {
    packages: BTreeMap<String, Vec<String>>,
}

impl ResolvedExport {
    pub fn versions(&self, package: &str) -> Option<&[String]> {
        self.packages.get(package).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.packages
            .iter()
            .map(|(name, versions)| (name.as_str(), versions.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Outcome of resolving an evidence store.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub exports: ResolvedExport,
    pub split_packages: Vec<SplitPackage>,
}

/// Decides which versions of each package are exported.
#[derive(Debug, Clone, Copy, Default)]
pub struct SplitPackageResolver {
    mode: ResolutionMode,
}

impl SplitPackageResolver {
    pub fn new(mode: ResolutionMode) -> Self {
        Self { mode }
    }

    pub fn resolve(&self, store: &EvidenceStore) -> Resolution {
        let mut resolution = Resolution::default();

        for (package, locations) in store.iter() {
            let versions = distinct_versions(locations);
            let is_split = versions.len() > 1;

            let exported: Vec<String> = match self.mode {
                ResolutionMode::AllVersions => versions.iter().map(|v| v.to_string()).collect(),
                ResolutionMode::SingleVersion => most_frequent(locations)
                    .map(|version| vec![version.to_string()])
                    .unwrap_or_default(),
            };

            if is_split {
                report_split(package, locations, &exported);
                resolution.split_packages.push(SplitPackage {
                    package: package.to_string(),
                    locations: locations.to_vec(),
                    exported: exported.clone(),
                });
            }

            if !exported.is_empty() {
                resolution
                    .exports
                    .packages
                    .insert(package.to_string(), exported);
            }
        }

        resolution
    }
}

/// Distinct non-null versions in first-seen order.
fn distinct_versions(locations: &[VersionLocation]) -> Vec<&str> {
    let mut versions: Vec<&str> = Vec::new();
    for version in locations.iter().filter_map(|l| l.version.as_deref()) {
        if !versions.contains(&version) {
            versions.push(version);
        }
    }
    versions
}

/// Version of the single location with the highest count. The earliest
/// location keeps a tie.
fn most_frequent(locations: &[VersionLocation]) -> Option<&str> {
    let mut winner: Option<(&str, u64)> = None;
    for location in locations {
        let Some(version) = location.version.as_deref() else {
            continue;
        };
        match winner {
            Some((_, best)) if location.occurrence_count <= best => {}
            _ => winner = Some((version, location.occurrence_count)),
        }
    }
    winner.map(|(version, _)| version)
}

fn report_split(package: &str, locations: &[VersionLocation], exported: &[String]) {
    warn!(package, "split package with different versions detected");
    for location in locations {
        warn!(
            package,
            origin = %location.origin,
            version = location.version.as_deref().unwrap_or("-"),
            count = location.occurrence_count,
            specification_version = location.specification_version.as_deref().unwrap_or("-"),
            "split package location"
        );
    }
    warn!(package, exported = ?exported, "split package resolved");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_times(store: &mut EvidenceStore, package: &str, origin: &str, version: &str, n: u64) {
        for _ in 0..n {
            store.record(package, origin, Some(version), None);
        }
    }

    #[test]
    fn test_consistent_package_is_not_split() {
        let mut store = EvidenceStore::new();
        store.record("com.acme.util", "a.jar", Some("1.0"), None);
        store.record("com.acme.util", "b.jar", Some("1.0"), None);

        let resolution = SplitPackageResolver::default().resolve(&store);
        assert!(resolution.split_packages.is_empty());
        assert_eq!(
            resolution.exports.versions("com.acme.util"),
            Some(&["1.0".to_string()][..])
        );
    }

    #[test]
    fn test_different_versions_are_split() {
        let mut store = EvidenceStore::new();
        store.record("com.acme.util", "a.jar", Some("1.0"), None);
        store.record("com.acme.util", "b.jar", Some("2.0"), None);

        let resolution = SplitPackageResolver::default().resolve(&store);
        assert_eq!(resolution.split_packages.len(), 1);
        assert_eq!(resolution.split_packages[0].package, "com.acme.util");
        assert_eq!(resolution.split_packages[0].locations.len(), 2);
    }

    #[test]
    fn test_all_versions_mode_keeps_first_seen_order() {
        let mut store = EvidenceStore::new();
        store.record("com.acme.util", "z.jar", Some("2.0"), None);
        store.record("com.acme.util", "a.jar", Some("1.0"), None);
        store.record("com.acme.util", "m.jar", Some("2.0"), None);

        let resolution = SplitPackageResolver::new(ResolutionMode::AllVersions).resolve(&store);
        assert_eq!(
            resolution.exports.versions("com.acme.util").unwrap(),
            &["2.0".to_string(), "1.0".to_string()]
        );
    }

    #[test]
    fn test_single_version_mode_picks_highest_count() {
        let mut store = EvidenceStore::new();
        record_times(&mut store, "com.acme.util", "a.jar", "A", 3);
        record_times(&mut store, "com.acme.util", "b.jar", "B", 5);

        let resolution = SplitPackageResolver::new(ResolutionMode::SingleVersion).resolve(&store);
        assert_eq!(
            resolution.exports.versions("com.acme.util").unwrap(),
            &["B".to_string()]
        );
        assert_eq!(resolution.split_packages[0].exported, vec!["B".to_string()]);
    }

    #[test]
    fn test_single_version_tie_keeps_first_seen() {
        let mut store = EvidenceStore::new();
        record_times(&mut store, "com.acme.util", "a.jar", "A", 4);
        record_times(&mut store, "com.acme.util", "b.jar", "B", 4);

        let resolution = SplitPackageResolver::new(ResolutionMode::SingleVersion).resolve(&store);
        assert_eq!(
            resolution.exports.versions("com.acme.util").unwrap(),
            &["A".to_string()]
        );
    }

    #[test]
    fn test_single_version_compares_counts_per_location() {
        let mut store = EvidenceStore::new();
        record_times(&mut store, "com.acme.util", "a.jar", "A", 4);
        record_times(&mut store, "com.acme.util", "b.jar", "B", 3);
        record_times(&mut store, "com.acme.util", "c.jar", "B", 3);

        let resolution = SplitPackageResolver::new(ResolutionMode::SingleVersion).resolve(&store);
        assert_eq!(
            resolution.exports.versions("com.acme.util").unwrap(),
            &["A".to_string()]
        );
    }

    #[test]
    fn test_null_versions_never_win() {
        let mut store = EvidenceStore::new();
        for _ in 0..10 {
            store.record("com.acme.util", "a.jar", None, None);
        }
        store.record("com.acme.util", "b.jar", Some("1.0"), None);

        let resolution = SplitPackageResolver::new(ResolutionMode::SingleVersion).resolve(&store);
        assert_eq!(
            resolution.exports.versions("com.acme.util").unwrap(),
            &["1.0".to_string()]
        );
        assert!(resolution.split_packages.is_empty());
    }

    #[test]
    fn test_package_without_versions_is_omitted() {
        let mut store = EvidenceStore::new();
        store.record("com.acme.internal", "a.jar", None, None);

        for mode in [ResolutionMode::AllVersions, ResolutionMode::SingleVersion] {
            let resolution = SplitPackageResolver::new(mode).resolve(&store);
            assert!(resolution.exports.versions("com.acme.internal").is_none());
            assert!(resolution.exports.is_empty());
        }
    }
}
