//! YAML configuration and command-line overrides.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read configuration file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("No regions configured")]
    NoRegions,
}

/// Report file format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub aws: AwsConfig,
    pub output: OutputConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub profile: String,
    pub default_region: String,
    pub regions: Vec<String>,
    /// Role assumed in member accounts; unset tries a profile per account first
    pub cross_account_role: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            profile: "default".to_string(),
            default_region: "us-east-1".to_string(),
            regions: vec!["us-east-1".to_string()],
            cross_account_role: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub file: String,
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: "lambda_assessment_report.json".to_string(),
            format: OutputFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// JSON runtime table replacing the built-in seed
    pub table_file: Option<PathBuf>,
    /// Best-effort refresh from the documentation page
    pub refresh: bool,
    /// Where to persist a refreshed table
    pub save_refreshed: Option<PathBuf>,
}

/// Values given on the command line, applied over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub profile: Option<String>,
    pub region: Option<String>,
    pub output: Option<String>,
    pub format: Option<OutputFormat>,
    pub refresh_runtimes: bool,
    pub runtime_table: Option<PathBuf>,
    pub save_runtime_table: Option<PathBuf>,
}

impl Config {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Loads `path`.
    ///
    /// # Errors
    ///
    /// A missing file is an error only when `explicit`; otherwise defaults
    /// are used.
    pub fn load(path: &Path, explicit: bool) -> Result<Self, ConfigError> {
        if !path.exists() {
            if explicit {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            warn!(path = %path.display(), "Configuration file not found; using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Applies command-line values; a region replaces the region list.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(profile) = &overrides.profile {
            self.aws.profile = profile.clone();
        }
        if let Some(region) = &overrides.region {
            self.aws.regions = vec![region.clone()];
        }
        if let Some(output) = &overrides.output {
            self.output.file = output.clone();
        }
        if let Some(format) = overrides.format {
            self.output.format = format;
        }
        if overrides.refresh_runtimes {
            self.runtime.refresh = true;
        }
        if let Some(table) = &overrides.runtime_table {
            self.runtime.table_file = Some(table.clone());
        }
        if let Some(save) = &overrides.save_runtime_table {
            self.runtime.save_refreshed = Some(save.clone());
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.aws.regions.iter().all(|r| r.trim().is_empty()) {
            return Err(ConfigError::NoRegions);
        }
        Ok(())
    }
}
