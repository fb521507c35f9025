//! Per-function inspection.
//!
//! Turns one listing entry into a [`FunctionRecord`]. Only the listing fields
//! are mandatory; each follow-up call (extended configuration, tags, code
//! metadata) degrades to its own default and a warning when it fails.

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::complexity::{self, ComplexityEstimate};
use crate::model::{FunctionRecord, SupportStatus, ARN_PARTITION};
use crate::runtime::patterns::UNKNOWN;
use crate::traits::{FunctionConfiguration, LambdaApi};

/// Errors that make a single function uninspectable.
#[derive(Error, Debug)]
pub enum InspectError {
    /// A field the listing must carry was absent
    #[error("Function '{function}' is missing required field '{field}'")]
    MissingField {
        function: String,
        field: &'static str,
    },
}

/// Extended configuration counts, fetched separately from the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedConfiguration {
    pub environment_variables: usize,
    pub layers: usize,
    pub dead_letter_config: bool,
    pub vpc_config: bool,
}

impl From<&FunctionConfiguration> for ExtendedConfiguration {
    fn from(config: &FunctionConfiguration) -> Self {
        Self {
            environment_variables: config
                .environment
                .as_ref()
                .map_or(0, |env| env.variables.len()),
            layers: config.layers.len(),
            dead_letter_config: config
                .dead_letter_config
                .as_ref()
                .is_some_and(|dlq| dlq.is_configured()),
            vpc_config: config.vpc_config.as_ref().is_some_and(|vpc| vpc.is_attached()),
        }
    }
}

fn required<T: Clone>(
    value: &Option<T>,
    function: &str,
    field: &'static str,
) -> Result<T, InspectError> {
    value.clone().ok_or_else(|| InspectError::MissingField {
        function: function.to_string(),
        field,
    })
}

/// Inspects functions of one region through one client.
pub struct FunctionInspector {
    lambda: Arc<dyn LambdaApi>,
    region: String,
}

impl FunctionInspector {
    pub fn new(lambda: Arc<dyn LambdaApi>, region: impl Into<String>) -> Self {
        Self {
            lambda,
            region: region.into(),
        }
    }

    /// Builds the record for one listing entry, without classification.
    ///
    /// # Errors
    ///
    /// Returns [`InspectError::MissingField`] when a required listing field
    /// is absent. Follow-up call failures never error.
    pub async fn inspect(
        &self,
        listing: &FunctionConfiguration,
    ) -> Result<FunctionRecord, InspectError> {
        let name = listing.function_name.as_str();

        let runtime = required(&listing.runtime, name, "Runtime")?;
        let version = required(&listing.version, name, "Version")?;
        let code_size = required(&listing.code_size, name, "CodeSize")?;
        let memory_size = required(&listing.memory_size, name, "MemorySize")?;
        let timeout = required(&listing.timeout, name, "Timeout")?;
        let last_modified = required(&listing.last_modified, name, "LastModified")?;
        let handler = required(&listing.handler, name, "Handler")?;

        let extended = self.extended_configuration(name).await;
        let tags = self.tags(name, listing.function_arn.as_deref()).await;
        let complexity = self.complexity(name).await;

        Ok(FunctionRecord {
            region: self.region.clone(),
            account_id: None,
            account_name: None,
            function_name: name.to_string(),
            function_arn: listing.function_arn.clone(),
            runtime,
            version,
            code_size,
            memory_size,
            timeout,
            last_modified,
            handler,
            description: listing.description.clone().unwrap_or_default(),
            environment_variables: extended.map(|e| e.environment_variables),
            layers: extended.map(|e| e.layers),
            dead_letter_config: extended.map(|e| e.dead_letter_config),
            vpc_config: extended.map(|e| e.vpc_config),
            tags,
            lines_of_code: complexity.lines_of_code,
            complexity_score: complexity.complexity,
            code_location: complexity.code_location,
            language_name: UNKNOWN.to_string(),
            language_version: UNKNOWN.to_string(),
            aws_supported: false,
            support_status: SupportStatus::Unknown,
            deprecation_date: None,
            end_of_support: None,
        })
    }

    async fn extended_configuration(&self, name: &str) -> Option<ExtendedConfiguration> {
        match self.lambda.get_function_configuration(name).await {
            Ok(config) => Some(ExtendedConfiguration::from(&config)),
            Err(e) => {
                warn!(region = %self.region, function = name, error = %e, "Could not get configuration");
                None
            }
        }
    }

    async fn tags(&self, name: &str, arn: Option<&str>) -> BTreeMap<String, String> {
        let arn = match arn {
            Some(arn) if !arn.is_empty() => arn.to_string(),
            _ => format!(
                "arn:{}:lambda:{}:*:function:{}",
                ARN_PARTITION, self.region, name
            ),
        };

        match self.lambda.list_tags(&arn).await {
            Ok(tags) => tags,
            Err(e) => {
                warn!(region = %self.region, function = name, error = %e, "Could not get tags");
                BTreeMap::new()
            }
        }
    }

    async fn complexity(&self, name: &str) -> ComplexityEstimate {
        let code = match self.lambda.get_function(name).await {
            Ok(code) => code,
            Err(e) => {
                warn!(region = %self.region, function = name, error = %e, "Could not get function code");
                return ComplexityEstimate::unknown();
            }
        };

        match (code.configuration.code_size, code.configuration.runtime.as_deref()) {
            (Some(code_size), Some(runtime)) => {
                let mut estimate = complexity::estimate(code_size, runtime);
                estimate.code_location = code.location;
                debug!(
                    function = name,
                    lines_of_code = estimate.lines_of_code,
                    complexity = %estimate.complexity,
                    "Estimated complexity"
                );
                estimate
            }
            _ => {
                warn!(region = %self.region, function = name, "Code metadata lacks size or runtime");
                ComplexityEstimate::unknown()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
