use anyhow::{Context, Result};
use bundlescan::{config::Config, normalize, AggregationOutcome, Aggregator};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Exit codes for build integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const INCOMPLETE: u8 = 2;
}

#[derive(Parser)]
#[command(name = "bundlescan")]
#[command(
    author,
    version,
    about = "Aggregate OSGi package exports across JAR artifacts into a framework package list"
)]
struct Cli {
    /// Log filter (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan all sources and write the framework package list
    Build(BuildArgs),

    /// Print the canonical form of version strings
    Normalize {
        #[arg(required = true)]
        versions: Vec<String>,
    },

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

/// Overrides for values of the config file.
#[derive(Args, Default)]
struct BuildArgs {
    /// Previously generated manifest to read exports from
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Directory of JAR files to scan (repeatable)
    #[arg(long = "jar-dir")]
    jar_directories: Vec<PathBuf>,

    /// JSON file holding the resolved dependency set
    #[arg(long)]
    dependencies: Option<PathBuf>,

    /// Compiled classes directory of the project
    #[arg(long)]
    classes: Option<PathBuf>,

    /// Build directory that default paths are derived from
    #[arg(long)]
    build_dir: Option<PathBuf>,

    /// Name the build output is recorded under
    #[arg(long)]
    final_name: Option<String>,

    /// Version of the project's own packages
    #[arg(long)]
    project_version: Option<String>,

    /// Package entry appended verbatim (repeatable, replaces the configured list)
    #[arg(long = "manual-package")]
    manual_packages: Vec<String>,

    /// Extra package prefix to exclude (repeatable)
    #[arg(long = "exclude")]
    excluded_prefixes: Vec<String>,

    /// Do not scan provided-scope dependencies
    #[arg(long)]
    no_scan_dependencies: bool,

    /// Export only the most observed version of each package
    #[arg(long)]
    export_each_package_once: bool,

    /// Property file merged into the output
    #[arg(long)]
    property_input: Option<PathBuf>,

    /// Property file to write
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write a JSON report of the run
    #[arg(long)]
    report: Option<PathBuf>,

    /// Maven repository to download wars from (repeatable)
    #[arg(long = "repository")]
    repositories: Vec<String>,

    /// Archives read concurrently
    #[arg(long)]
    concurrency: Option<usize>,

    /// Stop scanning after this many seconds
    #[arg(long)]
    timeout: Option<u64>,
}

impl BuildArgs {
    fn apply(self, config: &mut Config) {
        if self.manifest.is_some() {
            config.inputs.manifest = self.manifest;
        }
        if !self.jar_directories.is_empty() {
            config.inputs.jar_directories = Some(self.jar_directories);
        }
        if self.dependencies.is_some() {
            config.inputs.dependency_set = self.dependencies;
        }
        if self.no_scan_dependencies {
            config.inputs.scan_dependencies = false;
        }
        config.inputs.excluded_prefixes.extend(self.excluded_prefixes);

        if let Some(build_dir) = self.build_dir {
            config.project.build_directory = build_dir;
        }
        if self.classes.is_some() {
            config.project.output_directory = self.classes;
        }
        if let Some(final_name) = self.final_name {
            config.project.final_name = final_name;
        }
        if let Some(version) = self.project_version {
            config.project.version = version;
        }
        if !self.manual_packages.is_empty() {
            config.project.manual_packages = self.manual_packages;
        }

        if self.property_input.is_some() {
            config.output.property_input = self.property_input;
        }
        if self.output.is_some() {
            config.output.property_file = self.output;
        }
        if self.report.is_some() {
            config.output.report = self.report;
        }

        if self.export_each_package_once {
            config.resolution.export_each_package_once = true;
        }
        config.resolution.repositories.extend(self.repositories);
        if let Some(concurrency) = self.concurrency {
            config.resolution.concurrency = concurrency;
        }
        if self.timeout.is_some() {
            config.resolution.timeout_secs = self.timeout;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<u8> {
    match cli.command {
        Commands::Build(args) => {
            let mut config = Config::load(cli.config.as_deref())?;
            args.apply(&mut config);
            run_build(config).await
        }
        Commands::Normalize { versions } => {
            for version in versions {
                println!("{}", normalize(&version));
            }
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(cli.config.as_deref(), init, path)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

async fn run_build(config: Config) -> Result<u8> {
    let aggregator = Aggregator::new(config.aggregator_options());

    let token = aggregator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing with the evidence collected so far");
            token.cancel();
        }
    });

    let outcome = aggregator
        .run()
        .await
        .context("failed to write the framework package list")?;
    log_summary(&outcome);
    println!("{}={}", outcome.generated_property, outcome.generated);

    if outcome.is_complete() {
        Ok(exit_codes::SUCCESS)
    } else {
        Ok(exit_codes::INCOMPLETE)
    }
}

fn log_summary(outcome: &AggregationOutcome) {
    let report = &outcome.report;
    for diagnostic in &report.diagnostics {
        warn!(
            kind = %diagnostic.kind,
            subject = %diagnostic.subject,
            "{}",
            diagnostic.message
        );
    }
    info!(
        packages = report.packages_scanned,
        exports = report.exported_entries,
        split_packages = report.split_packages.len(),
        unresolved_artifacts = report.unresolved_artifacts(),
        malformed_archives = report.malformed_archives(),
        incomplete = report.incomplete,
        "aggregation finished"
    );
}

/// Prints the config file path, creates it, or shows the effective
/// configuration together with the paths derived from it.
fn handle_config(explicit: Option<&Path>, init: bool, show_path: bool) -> Result<()> {
    let path = explicit.map(Path::to_path_buf).unwrap_or_else(Config::config_path);

    if show_path {
        println!("{}", path.display());
        return Ok(());
    }

    if init {
        if path.exists() {
            anyhow::bail!("config file already exists at {}", path.display());
        }
        Config::default().save_to(&path)?;
        info!(path = %path.display(), "created config file");
        return Ok(());
    }

    let config = Config::load(explicit)?;
    let origin = if path.exists() { "" } else { " (not found, defaults)" };
    println!("# {}{}", path.display(), origin);
    print!("{}", config.to_toml()?);

    let options = config.aggregator_options();
    println!();
    println!("# derived paths");
    if let Some(manifest) = &options.manifest {
        println!("# manifest = {}", manifest.display());
    }
    for directory in &options.jar_directories {
        println!("# jar directory = {}", directory.display());
    }
    if let Some(output) = &options.property_output {
        println!("# property output = {}", output.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_build_overrides() {
        let cli = Cli::try_parse_from([
            "bundlescan",
            "build",
            "--jar-dir",
            "a/lib",
            "--jar-dir",
            "b/lib",
            "--final-name",
            "portal",
            "--export-each-package-once",
            "--manual-package",
            "javax.servlet;version=3.0",
        ])
        .unwrap();

        let Commands::Build(args) = cli.command else {
            panic!("expected build command");
        };
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(
            config.inputs.jar_directories,
            Some(vec![PathBuf::from("a/lib"), PathBuf::from("b/lib")])
        );
        assert_eq!(config.project.final_name, "portal");
        assert!(config.resolution.export_each_package_once);
        assert!(config.inputs.scan_dependencies);
    }

    #[test]
    fn test_empty_overrides_keep_config() {
        let mut config = Config::default();
        config.project.manual_packages = vec!["javax.annotation;version=1.2".to_string()];
        let before = config.clone();

        BuildArgs::default().apply(&mut config);
        assert_eq!(config, before);
    }

    #[test]
    fn test_config_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundlescan/config.toml");

        handle_config(Some(&path), true, false).unwrap();
        assert_eq!(Config::load(Some(&path)).unwrap(), Config::default());
        assert!(handle_config(Some(&path), true, false).is_err());
        handle_config(Some(&path), false, false).unwrap();
    }

    #[test]
    fn test_normalize_requires_versions() {
        assert!(Cli::try_parse_from(["bundlescan", "normalize"]).is_err());
        assert!(Cli::try_parse_from(["bundlescan", "normalize", "1.2.3-beta"]).is_ok());
    }
}
