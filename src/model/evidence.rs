use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One origin's claim about the version of a package.
///
/// The version fields are fixed by the first observation of a
/// (package, origin) pair. Every later observation only bumps
/// `occurrence_count`, which acts as a confidence vote when split
/// packages are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionLocation {
    pub origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specification_version: Option<String>,
    pub occurrence_count: u64,
}

impl VersionLocation {
    fn first_seen(observation: Observation) -> Self {
        Self {
            origin: observation.origin,
            version: observation.version,
            specification_version: observation.specification_version,
            occurrence_count: 1,
        }
    }
}

/// A single piece of package evidence produced by a scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub package: String,
    pub origin: String,
    pub version: Option<String>,
    pub specification_version: Option<String>,
}

impl Observation {
    pub fn new(
        package: impl Into<String>,
        origin: impl Into<String>,
        version: Option<&str>,
        specification_version: Option<&str>,
    ) -> Self {
        Self {
            package: package.into(),
            origin: origin.into(),
            version: version.map(str::to_string),
            specification_version: specification_version.map(str::to_string),
        }
    }
}

/// Locations for a single package, kept in first-seen order.
#[derive(Debug, Clone, Default)]
struct PackageEvidence {
    locations: Vec<VersionLocation>,
    by_origin: HashMap<String, usize>,
}

/// Package evidence accumulated over one aggregation run.
///
/// Packages iterate in sorted order; the locations of a package iterate in
/// the order their origins were first observed.
#[derive(Debug, Clone, Default)]
pub struct EvidenceStore {
    packages: BTreeMap<String, PackageEvidence>,
}

impl EvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `origin` declared `package`.
    pub fn record(
        &mut self,
        package: &str,
        origin: &str,
        version: Option<&str>,
        specification_version: Option<&str>,
    ) {
        self.observe(Observation::new(package, origin, version, specification_version));
    }

    /// Records a single observation.
    pub fn observe(&mut self, observation: Observation) {
        let evidence = self
            .packages
            .entry(observation.package.clone())
            .or_default();

        if let Some(&index) = evidence.by_origin.get(&observation.origin) {
            evidence.locations[index].occurrence_count += 1;
            return;
        }

        evidence
            .by_origin
            .insert(observation.origin.clone(), evidence.locations.len());
        evidence
            .locations
            .push(VersionLocation::first_seen(observation));
    }

    /// Records a batch of observations in order.
    pub fn extend<I>(&mut self, observations: I)
    where
        I: IntoIterator<Item = Observation>,
    {
        for observation in observations {
            self.observe(observation);
        }
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn contains(&self, package: &str) -> bool {
        self.packages.contains_key(package)
    }

    /// Returns the location recorded for a (package, origin) pair.
    pub fn location(&self, package: &str, origin: &str) -> Option<&VersionLocation> {
        let evidence = self.packages.get(package)?;
        let index = *evidence.by_origin.get(origin)?;
        evidence.locations.get(index)
    }

    /// Iterates the locations of one package in first-seen order.
    pub fn locations<'a>(&'a self, package: &str) -> impl Iterator<Item = &'a VersionLocation> {
        self.packages
            .get(package)
            .map(|evidence| evidence.locations.as_slice())
            .unwrap_or_default()
            .iter()
    }

    /// Iterates packages in sorted order with their locations.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[VersionLocation])> {
        self.packages
            .iter()
            .map(|(name, evidence)| (name.as_str(), evidence.locations.as_slice()))
    }

    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_creates_location() {
        let mut store = EvidenceStore::new();
        store.record("com.acme.util", "a.jar", Some("1.0"), Some("1"));

        let location = store.location("com.acme.util", "a.jar").unwrap();
        assert_eq!(location.origin, "a.jar");
        assert_eq!(location.version.as_deref(), Some("1.0"));
        assert_eq!(location.specification_version.as_deref(), Some("1"));
        assert_eq!(location.occurrence_count, 1);
    }

    #[test]
    fn test_repeated_observation_counts_without_overwriting() {
        let mut store = EvidenceStore::new();
        store.record("com.acme.util", "a.jar", Some("1.0"), None);
        for _ in 0..4 {
            store.record("com.acme.util", "a.jar", Some("2.0"), Some("2"));
        }
        store.record("com.acme.util", "a.jar", None, None);

        let location = store.location("com.acme.util", "a.jar").unwrap();
        assert_eq!(location.occurrence_count, 6);
        assert_eq!(location.version.as_deref(), Some("1.0"));
        assert_eq!(location.specification_version, None);
    }

    #[test]
    fn test_absent_first_version_is_kept() {
        let mut store = EvidenceStore::new();
        store.record("com.acme.util", "a.jar", None, None);
        store.record("com.acme.util", "a.jar", Some("1.0"), None);

        let location = store.location("com.acme.util", "a.jar").unwrap();
        assert_eq!(location.version, None);
        assert_eq!(location.occurrence_count, 2);
    }

    #[test]
    fn test_origin_key_matches_location_origin() {
        let mut store = EvidenceStore::new();
        store.record("com.acme.util", "b.jar", Some("1"), None);
        store.record("com.acme.util", "a.jar", Some("2"), None);
        store.record("com.acme.api", "a.jar", Some("2"), None);

        for (package, locations) in store.iter() {
            for location in locations {
                let found = store.location(package, &location.origin).unwrap();
                assert_eq!(found, location);
            }
        }
    }

    #[test]
    fn test_locations_keep_first_seen_order() {
        let mut store = EvidenceStore::new();
        store.record("com.acme.util", "z.jar", Some("1"), None);
        store.record("com.acme.util", "a.jar", Some("2"), None);
        store.record("com.acme.util", "m.jar", Some("3"), None);

        let origins: Vec<_> = store
            .locations("com.acme.util")
            .map(|l| l.origin.as_str())
            .collect();
        assert_eq!(origins, vec!["z.jar", "a.jar", "m.jar"]);
    }

    #[test]
    fn test_packages_iterate_sorted() {
        let mut store = EvidenceStore::new();
        store.record("org.b", "x.jar", None, None);
        store.record("com.a", "x.jar", None, None);
        store.record("net.c", "x.jar", None, None);

        let names: Vec<_> = store.package_names().collect();
        assert_eq!(names, vec!["com.a", "net.c", "org.b"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_unknown_package_has_no_locations() {
        let store = EvidenceStore::new();
        assert_eq!(store.locations("com.missing").count(), 0);
        assert!(store.location("com.missing", "a.jar").is_none());
        assert!(store.is_empty());
    }
}
