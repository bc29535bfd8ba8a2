//! Configuration file handling.
//!
//! This module provides loading and saving of bundlescan configuration
//! from a TOML file.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/bundlescan/config.toml`
//! - macOS: `~/Library/Application Support/bundlescan/config.toml`
//! - Windows: `%APPDATA%\bundlescan\config.toml`
//!
//! A file can also be given explicitly with `--config`.
//!
//! # Example Configuration
//!
//! ```toml
//! [inputs]
//! jar_directories = ["target/portal/WEB-INF/lib"]
//! dependency_set = "target/dependencies.json"
//! scan_dependencies = true
//! excluded_prefixes = ["com.acme.internal"]
//!
//! [project]
//! build_directory = "target"
//! final_name = "portal"
//! version = "8.1.0"
//! manual_packages = ["javax.servlet;version=3.0"]
//!
//! [output]
//! property_key = "org.osgi.framework.system.packages.extra"
//!
//! [resolution]
//! export_each_package_once = false
//! repositories = ["https://repo1.maven.org/maven2"]
//! concurrency = 8
//! ```
//!
//! Paths left unset are derived from `project.build_directory` and
//! `project.final_name` the way a packaged web application lays them out.

use crate::aggregator::{AggregatorOptions, BuildOutput, DEFAULT_MANUAL_PACKAGES, GENERATED_PROPERTY};
use crate::output::SYSTEM_PACKAGES_EXTRA;
use crate::resolver::ResolutionMode;
use crate::scanner::{DEFAULT_CONCURRENCY, DEFAULT_RESERVED_NAMESPACE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration.
///
/// # Example
///
/// ```no_run
/// use bundlescan::Config;
///
/// // Load from the default file (or use defaults if it doesn't exist)
/// let config = Config::load(None).unwrap();
///
/// println!("Final name: {}", config.project.final_name);
/// println!("Scan dependencies: {}", config.inputs.scan_dependencies);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub inputs: InputsConfig,
    pub project: ProjectConfig,
    pub output: OutputConfig,
    pub resolution: ResolutionConfig,
}

/// Where package evidence is read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputsConfig {
    /// Previously generated manifest.
    ///
    /// Default: `<build>/classes/META-INF/MANIFEST.MF`
    pub manifest: Option<PathBuf>,

    /// Directories whose `*.jar` files are scanned.
    ///
    /// Default: `<build>/<final name>/WEB-INF/lib`
    pub jar_directories: Option<Vec<PathBuf>>,

    /// JSON list of resolved project dependencies.
    pub dependency_set: Option<PathBuf>,

    /// Whether provided-scope dependencies are scanned.
    ///
    /// Default: true
    pub scan_dependencies: bool,

    /// Package prefixes excluded on top of the built-in ones.
    pub excluded_prefixes: Vec<String>,
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            manifest: None,
            jar_directories: None,
            dependency_set: None,
            scan_dependencies: true,
            excluded_prefixes: Vec::new(),
        }
    }
}

/// The project being packaged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Default: `target`
    pub build_directory: PathBuf,

    /// Compiled classes. Default: `<build>/classes`
    pub output_directory: Option<PathBuf>,

    /// Name the build output is recorded under.
    pub final_name: String,

    pub version: String,

    /// Exports whose version equals the bundle version are only trusted in
    /// this namespace.
    ///
    /// Default: `org.jahia`
    pub reserved_namespace: String,

    /// Entries appended verbatim after the resolved packages.
    ///
    /// Default: `["javax.servlet;version=3.0"]`
    pub manual_packages: Vec<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            build_directory: PathBuf::from("target"),
            output_directory: None,
            final_name: String::new(),
            version: String::new(),
            reserved_namespace: DEFAULT_RESERVED_NAMESPACE.to_string(),
            manual_packages: DEFAULT_MANUAL_PACKAGES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Where results are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Properties merged into the output.
    ///
    /// Default: `<build>/<final name>/WEB-INF/etc/config/felix-framework.properties`
    pub property_input: Option<PathBuf>,

    /// Default: `<build>/generated-resources/WEB-INF/etc/config/felix-framework.properties`
    pub property_file: Option<PathBuf>,

    /// Default: `org.osgi.framework.system.packages.extra`
    pub property_key: String,

    /// Default: `jahiaGeneratedFrameworkPackageList`
    pub generated_property: String,

    /// JSON report of the run. Not written unless set.
    pub report: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            property_input: None,
            property_file: None,
            property_key: SYSTEM_PACKAGES_EXTRA.to_string(),
            generated_property: GENERATED_PROPERTY.to_string(),
            report: None,
        }
    }
}

/// How evidence is resolved into exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Export only the most observed version of each package.
    ///
    /// Default: false
    pub export_each_package_once: bool,

    /// Maven-layout repositories for wars that are not available locally.
    pub repositories: Vec<String>,

    /// Archives read concurrently.
    ///
    /// Default: 8
    pub concurrency: usize,

    /// Stop scanning after this many seconds and produce partial outputs.
    pub timeout_secs: Option<u64>,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            export_each_package_once: false,
            repositories: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: None,
        }
    }
}

impl Config {
    /// Loads configuration from `explicit`, or from the default config file.
    ///
    /// A missing default file yields the default configuration; a missing
    /// explicit file is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::config_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Loads configuration from an explicit file, which must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Saves the configuration, creating the parent directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Returns the path to the configuration file.
    ///
    /// # Example
    ///
    /// ```
    /// use bundlescan::Config;
    ///
    /// let path = Config::config_path();
    /// assert!(path.ends_with("bundlescan/config.toml"));
    /// ```
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bundlescan")
            .join("config.toml")
    }

    fn web_app_directory(&self) -> PathBuf {
        self.project.build_directory.join(&self.project.final_name)
    }

    /// Resolves unset paths and builds the options of one run.
    pub fn aggregator_options(&self) -> AggregatorOptions {
        let build = &self.project.build_directory;
        let classes = self
            .project
            .output_directory
            .clone()
            .unwrap_or_else(|| build.join("classes"));

        let manifest = self
            .inputs
            .manifest
            .clone()
            .unwrap_or_else(|| classes.join("META-INF").join("MANIFEST.MF"));
        let jar_directories = self
            .inputs
            .jar_directories
            .clone()
            .unwrap_or_else(|| vec![self.web_app_directory().join("WEB-INF").join("lib")]);
        let property_input = self.output.property_input.clone().unwrap_or_else(|| {
            self.web_app_directory()
                .join("WEB-INF/etc/config/felix-framework.properties")
        });
        let property_file = self.output.property_file.clone().unwrap_or_else(|| {
            build.join("generated-resources/WEB-INF/etc/config/felix-framework.properties")
        });

        let mode = if self.resolution.export_each_package_once {
            ResolutionMode::SingleVersion
        } else {
            ResolutionMode::AllVersions
        };

        AggregatorOptions {
            manifest: Some(manifest),
            jar_directories,
            dependency_set: self.inputs.dependency_set.clone(),
            build_output: Some(BuildOutput {
                directory: classes,
                final_name: self.project.final_name.clone(),
                version: self.project.version.clone(),
            }),
            manual_packages: self.project.manual_packages.clone(),
            scan_dependencies: self.inputs.scan_dependencies,
            mode,
            reserved_namespace: self.project.reserved_namespace.clone(),
            extra_exclusions: self.inputs.excluded_prefixes.clone(),
            property_input: Some(property_input),
            property_output: Some(property_file),
            property_key: self.output.property_key.clone(),
            generated_property: self.output.generated_property.clone(),
            report: self.output.report.clone(),
            repositories: self.resolution.repositories.clone(),
            concurrency: self.resolution.concurrency,
            timeout: self.resolution.timeout_secs.map(Duration::from_secs),
        }
    }
}
