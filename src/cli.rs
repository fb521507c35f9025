//! Command line entry point.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::clients::ClientManager;
use crate::config::{Config, OutputFormat, Overrides, DEFAULT_CONFIG_FILE};
use crate::executor::ScanExecutor;
use crate::model::ScanResult;
use crate::organization::OrganizationDirectory;
use crate::provider::{HttpDocumentFetcher, SnapshotProvider};
use crate::report::{
    export_deprecated_csv, format_summary, generate_timestamped_filename, write_functions_csv,
    write_json_report,
};
use crate::runtime::{RuntimeClassifier, RuntimeTable, RUNTIMES_DOC_URL};

const DEPRECATED_CSV_NAME: &str = "deprecated_runtimes.csv";

/// Lambda function inventory and runtime support assessment.
#[derive(Debug, Parser)]
#[command(name = "lambda-harvester", version, about)]
pub struct Cli {
    /// Configuration file path [default: config.yaml]
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Profile to use
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Region to scan (replaces the configured region list)
    #[arg(short, long)]
    pub region: Option<String>,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Scan all accounts in the organization (requires management account access)
    #[arg(long)]
    pub org: bool,

    /// Export deprecated runtimes to a timestamped CSV file
    #[arg(long)]
    pub csv: bool,

    /// Add description and tags columns to the deprecated-runtime CSV
    #[arg(long, requires = "csv")]
    pub csv_details: bool,

    /// Inventory snapshot backing the session provider
    #[arg(long, env = "LAMBDA_HARVESTER_INVENTORY")]
    pub inventory: PathBuf,

    /// Refresh the runtime table from the documentation page
    #[arg(long)]
    pub refresh_runtimes: bool,

    /// JSON runtime table replacing the built-in one
    #[arg(long)]
    pub runtime_table: Option<PathBuf>,

    /// Save the refreshed runtime table to this path
    #[arg(long)]
    pub save_runtime_table: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            profile: self.profile.clone(),
            region: self.region.clone(),
            output: self.output.clone(),
            format: self.format,
            refresh_runtimes: self.refresh_runtimes,
            runtime_table: self.runtime_table.clone(),
            save_runtime_table: self.save_runtime_table.clone(),
        }
    }
}

/// Files and results of one run.
#[derive(Debug)]
pub struct RunOutcome {
    pub result: ScanResult,
    pub report_path: PathBuf,
    pub deprecated_csv: Option<PathBuf>,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Parses arguments, runs the scan and prints the summary.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    info!("Starting lambda-harvester v{}", env!("CARGO_PKG_VERSION"));

    let outcome = execute(cli).await?;
    println!("{}", format_summary(&outcome.result));
    Ok(())
}

/// Runs one scan for already parsed arguments.
///
/// # Errors
///
/// Configuration problems, a rejected profile and organization
/// precondition failures are fatal; so are report write failures.
pub async fn execute(cli: Cli) -> Result<RunOutcome> {
    let (config_path, explicit) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    let mut config = Config::load(&config_path, explicit)?;
    config.apply_overrides(&cli.overrides());
    config.validate()?;

    let classifier = build_classifier(&config).await?;
    let executor = ScanExecutor::new(classifier);

    let provider = SnapshotProvider::load(&cli.inventory)
        .with_context(|| format!("failed to load inventory {}", cli.inventory.display()))?;
    let clients =
        ClientManager::connect(&provider, &config.aws.profile, &config.aws.default_region)
            .await
            .context("failed to initialize session")?;
    let account_id = clients.account_id().await.ok();

    let regions = &config.aws.regions;
    let result = if cli.org {
        info!("Organization scanning mode enabled");
        let directory = OrganizationDirectory::new(&clients);
        if !directory.validate_access().await? {
            bail!("Organization access validation failed; ensure you are using the management account");
        }
        executor
            .scan_organization(
                &directory,
                &provider,
                regions,
                config.aws.cross_account_role.as_deref(),
            )
            .await?
    } else {
        executor.scan_account(&clients, regions).await?
    };

    let report_path = PathBuf::from(generate_timestamped_filename(
        &config.output.file,
        account_id.as_deref(),
    ));
    match config.output.format {
        OutputFormat::Json => write_json_report(&result, &report_path)?,
        OutputFormat::Csv => {
            write_functions_csv(&result.functions, &report_path)?;
        }
    }

    let deprecated_csv = if cli.csv {
        let base = sibling(&config.output.file, DEPRECATED_CSV_NAME);
        let path = PathBuf::from(generate_timestamped_filename(&base, account_id.as_deref()));
        let rows = export_deprecated_csv(&result.functions, &path, cli.csv_details)?;
        (rows > 0).then_some(path)
    } else {
        None
    };

    Ok(RunOutcome {
        result,
        report_path,
        deprecated_csv,
    })
}

async fn build_classifier(config: &Config) -> Result<RuntimeClassifier> {
    let table = match &config.runtime.table_file {
        Some(path) => RuntimeTable::load_json(path)?,
        None => RuntimeTable::builtin(),
    };
    let mut classifier = RuntimeClassifier::new(table);

    if config.runtime.refresh {
        let refreshed = match HttpDocumentFetcher::new() {
            Ok(fetcher) => classifier.refresh(&fetcher, RUNTIMES_DOC_URL).await,
            Err(e) => Err(e.into()),
        };
        match refreshed {
            Ok(_) => {
                if let Some(path) = &config.runtime.save_refreshed {
                    if let Err(e) = classifier.table().save_json(path) {
                        warn!(path = %path.display(), error = %e, "Could not save refreshed runtime table");
                    }
                }
            }
            Err(e) => warn!(error = %e, "Runtime table refresh failed; keeping current table"),
        }
    }

    Ok(classifier)
}

/// `name` in the directory of `path`.
fn sibling(path: &str, name: &str) -> String {
    match Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(name).to_string_lossy().into_owned(),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "lambda-harvester",
            "-p",
            "audit",
            "-r",
            "eu-west-1",
            "-f",
            "csv",
            "--org",
            "--csv",
            "--csv-details",
            "--inventory",
            "inventory.json",
        ])
        .unwrap();

        assert!(cli.org && cli.csv && cli.csv_details);
        let overrides = cli.overrides();
        assert_eq!(overrides.profile.as_deref(), Some("audit"));
        assert_eq!(overrides.region.as_deref(), Some("eu-west-1"));
        assert_eq!(overrides.format, Some(OutputFormat::Csv));
    }

    #[test]
    fn test_csv_details_requires_csv() {
        assert!(Cli::try_parse_from([
            "lambda-harvester",
            "--csv-details",
            "--inventory",
            "inventory.json",
        ])
        .is_err());
    }

    #[test]
    fn test_sibling() {
        assert_eq!(sibling("out/report.json", "x.csv"), "out/x.csv");
        assert_eq!(sibling("report.json", "x.csv"), "x.csv");
    }
}
