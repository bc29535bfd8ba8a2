use super::Exclusions;
use crate::error::{Result, ScanError};
use crate::manifest::{
    parse_header, Attributes, Manifest, EXPORT_PACKAGE, IMPLEMENTATION_VERSION,
    SPECIFICATION_VERSION,
};
use crate::model::Observation;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zip::ZipArchive;

const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Reads every package a JAR file declares or contains.
///
/// Observations are recorded under the canonical path of the JAR. The
/// default version for path-derived packages is `override_version`, else
/// the manifest's `Specification-Version`, else its
/// `Implementation-Version`.
///
/// # Errors
///
/// Returns [`ScanError::MalformedArchive`] if the file is not a readable
/// archive or its manifest cannot be parsed.
pub fn scan_jar(
    path: &Path,
    override_version: Option<&str>,
    exclusions: &Exclusions,
) -> Result<Vec<Observation>> {
    let file = File::open(path).map_err(|e| ScanError::malformed(path, e))?;
    let archive = ZipArchive::new(BufReader::new(file)).map_err(|e| ScanError::malformed(path, e))?;
    let origin = path
        .canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .to_string();

    scan_archive(archive, path, &origin, override_version, exclusions)
}

/// Runs [`scan_jar`] on the blocking pool.
pub(crate) async fn scan_jar_blocking(
    path: PathBuf,
    override_version: Option<String>,
    exclusions: Arc<Exclusions>,
) -> Result<Vec<Observation>> {
    let task_path = path.clone();
    tokio::task::spawn_blocking(move || {
        scan_jar(&task_path, override_version.as_deref(), &exclusions)
    })
    .await
    .map_err(|e| ScanError::malformed(&path, e))?
}

pub(crate) fn read_manifest<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &Path,
) -> Result<Option<Manifest>> {
    let mut entry = match archive.by_name(MANIFEST_PATH) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ScanError::malformed(path, e)),
    };

    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| ScanError::malformed(path, e))?;
    let manifest = Manifest::parse(&String::from_utf8_lossy(&bytes))
        .map_err(|e| ScanError::malformed(path, e))?;
    Ok(Some(manifest))
}

fn scan_archive<R: Read + Seek>(
    mut archive: ZipArchive<R>,
    path: &Path,
    origin: &str,
    override_version: Option<&str>,
    exclusions: &Exclusions,
) -> Result<Vec<Observation>> {
    let mut observations = Vec::new();
    let manifest = read_manifest(&mut archive, path)?;

    let specification_version = manifest
        .as_ref()
        .and_then(|m| m.main_attribute(SPECIFICATION_VERSION))
        .map(str::to_string);
    let default_version = override_version.map(str::to_string).or_else(|| {
        let manifest = manifest.as_ref()?;
        manifest
            .main_attribute(SPECIFICATION_VERSION)
            .or_else(|| manifest.main_attribute(IMPLEMENTATION_VERSION))
            .map(str::to_string)
    });
    let specification = specification_version.as_deref();

    match &manifest {
        None => warn!(jar = %path.display(), "no MANIFEST.MF found"),
        Some(manifest) => {
            if let Some(header) = manifest.main_attribute(EXPORT_PACKAGE) {
                for clause in parse_header(header).map_err(|e| ScanError::malformed(path, e))? {
                    let version = clause.version().or(default_version.as_deref());
                    for package in &clause.packages {
                        if exclusions.is_excluded(package) {
                            continue;
                        }
                        observations.push(Observation::new(package.as_str(), origin, version, specification));
                    }
                }
            }

            for (name, attributes) in &manifest.entries {
                let Some(package) = section_package(name, exclusions) else {
                    continue;
                };
                if let Some(version) = section_version(attributes) {
                    info!(jar = %path.display(), package = %package, version, "found package version in manifest");
                    observations.push(Observation::new(package, origin, Some(version), specification));
                }
            }
        }
    }

    for index in 0..archive.len() {
        let entry = archive
            .by_index_raw(index)
            .map_err(|e| ScanError::malformed(path, e))?;
        if entry.is_dir() {
            continue;
        }
        let Some(package) = entry_package(entry.name()) else {
            continue;
        };
        if exclusions.is_excluded(&package) {
            continue;
        }
        observations.push(Observation::new(
            package,
            origin,
            default_version.as_deref(),
            specification,
        ));
    }

    debug!(jar = %path.display(), observations = observations.len(), "scanned jar");
    Ok(observations)
}

/// Package of an archive entry, taken from its parent directory.
pub(crate) fn entry_package(entry_name: &str) -> Option<String> {
    let (directory, _) = entry_name.rsplit_once('/')?;
    if directory.is_empty() {
        return None;
    }
    Some(directory.replace('/', "."))
}

/// Package named by a per-entry manifest section, if it names one.
fn section_package(name: &str, exclusions: &Exclusions) -> Option<String> {
    let dotted = name.replace('/', ".");
    if dotted.ends_with(".class") {
        return None;
    }
    let package = dotted.strip_suffix(".*").unwrap_or(&dotted);
    let package = package.strip_suffix('.').unwrap_or(package);

    let last_segment = package.rsplit('.').next().unwrap_or(package);
    if last_segment.chars().next().is_some_and(char::is_uppercase) {
        return None;
    }
    if exclusions.is_excluded(package) {
        return None;
    }
    Some(package.to_string())
}

fn section_version(attributes: &Attributes) -> Option<&str> {
    attributes
        .get(SPECIFICATION_VERSION)
        .or_else(|| attributes.get(IMPLEMENTATION_VERSION))
}
