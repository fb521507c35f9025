//! Region scan pipeline.
//!
//! [`RegionHarvester`] runs the sequential per-region stages:
//! 1. **Listing**: page through every function in the region
//! 2. **Inspection**: build a [`FunctionRecord`] per function
//! 3. **Classification**: merge the runtime classification into each record
//!
//! A listing failure aborts the region; a failing function is logged and
//! skipped.

use chrono::{NaiveDate, Utc};
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, instrument};

use super::inspector::{FunctionInspector, InspectError};
use crate::clients::ClientManager;
use crate::model::FunctionRecord;
use crate::runtime::RuntimeClassifier;
use crate::traits::ProviderError;

/// Errors from a single-function lookup.
#[derive(Error, Debug)]
pub enum HarvestError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Inspect(#[from] InspectError),
}

/// Counters for one region scan.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegionStats {
    pub pages: usize,
    pub listed: usize,
    pub inspected: usize,
    pub skipped: usize,
}

/// Scans regions through one [`ClientManager`].
pub struct RegionHarvester<'a> {
    clients: &'a ClientManager,
    classifier: &'a RuntimeClassifier,
    /// Date support statuses are evaluated against
    as_of: NaiveDate,
}

impl<'a> RegionHarvester<'a> {
    pub fn new(clients: &'a ClientManager, classifier: &'a RuntimeClassifier) -> Self {
        Self {
            clients,
            classifier,
            as_of: Utc::now().date_naive(),
        }
    }

    /// Evaluates support status as of `date` instead of today.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.as_of = date;
        self
    }

    /// Lists, inspects and classifies every function in `region`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] when the client cannot be built or any
    /// listing page fails. Per-function failures are logged and skipped.
    #[instrument(skip(self), fields(scope = %self.clients.scope()))]
    pub async fn scan_region(&self, region: &str) -> Result<Vec<FunctionRecord>, ProviderError> {
        let start = Instant::now();
        let lambda = self.clients.lambda(region).await?;
        let inspector = FunctionInspector::new(lambda.clone(), region);

        let mut stats = RegionStats::default();
        let mut functions = Vec::new();
        let mut marker = None;

        loop {
            let page = lambda.list_functions(marker).await.map_err(|e| {
                error!(region, error = %e, "Error listing functions");
                e
            })?;
            stats.pages += 1;

            for listing in &page.functions {
                stats.listed += 1;
                match inspector.inspect(listing).await {
                    Ok(record) => functions.push(self.classify(record)),
                    Err(e) => {
                        stats.skipped += 1;
                        error!(
                            region,
                            function = %listing.function_name,
                            error = %e,
                            "Error analyzing function"
                        );
                    }
                }
            }

            marker = page.next_marker;
            if marker.is_none() {
                break;
            }
        }

        stats.inspected = functions.len();
        info!(
            region,
            pages = stats.pages,
            listed = stats.listed,
            inspected = stats.inspected,
            skipped = stats.skipped,
            duration_ms = start.elapsed().as_millis() as u64,
            "Region scan completed"
        );
        Ok(functions)
    }

    /// Inspects and classifies one named function.
    ///
    /// # Errors
    ///
    /// Unlike [`Self::scan_region`], a failed lookup or inspection is
    /// returned to the caller.
    pub async fn describe_function(
        &self,
        function_name: &str,
        region: &str,
    ) -> Result<FunctionRecord, HarvestError> {
        let lambda = self.clients.lambda(region).await?;
        let code = lambda.get_function(function_name).await.map_err(|e| {
            error!(region, function = function_name, error = %e, "Error getting function details");
            e
        })?;

        let record = FunctionInspector::new(lambda, region)
            .inspect(&code.configuration)
            .await?;
        Ok(self.classify(record))
    }

    fn classify(&self, mut record: FunctionRecord) -> FunctionRecord {
        let classification = self.classifier.classify_on(&record.runtime, self.as_of);
        record.enrich(&classification);
        record
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SupportStatus;
    use crate::provider::SnapshotProvider;

    const INVENTORY: &str = r#"{
        "profiles": {"default": "111111111111"},
        "accounts": [{
            "id": "111111111111",
            "name": "main",
            "regions": {
                "us-east-1": {"functions": [
                    {"FunctionName": "api", "Runtime": "python3.12", "Version": "$LATEST",
                     "CodeSize": 5000, "MemorySize": 256, "Timeout": 10,
                     "LastModified": "2024-01-01T00:00:00.000+0000", "Handler": "app.handler",
                     "Tags": {"team": "core"}},
                    {"FunctionName": "image-fn", "Version": "$LATEST", "CodeSize": 0,
                     "MemorySize": 1024, "Timeout": 60,
                     "LastModified": "2024-01-01T00:00:00.000+0000"},
                    {"FunctionName": "legacy", "Runtime": "python3.7", "Version": "$LATEST",
                     "CodeSize": 500, "MemorySize": 128, "Timeout": 3,
                     "LastModified": "2020-01-01T00:00:00.000+0000", "Handler": "main.run",
                     "FailOn": ["Tags", "Code"]}
                ]},
                "eu-west-1": {"unavailable": true}
            }
        }]
    }"#;

    async fn clients() -> ClientManager {
        let provider = SnapshotProvider::from_json_str(INVENTORY).unwrap();
        ClientManager::connect(&provider, "default", "us-east-1")
            .await
            .unwrap()
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn test_scan_region_skips_broken_functions() {
        let clients = clients().await;
        let classifier = RuntimeClassifier::default();
        let harvester = RegionHarvester::new(&clients, &classifier).with_date(as_of());

        let functions = harvester.scan_region("us-east-1").await.unwrap();
        let names: Vec<_> = functions.iter().map(|f| f.function_name.as_str()).collect();
        assert_eq!(names, vec!["api", "legacy"]);

        let api = &functions[0];
        assert_eq!(api.language_name, "Python");
        assert_eq!(api.support_status, SupportStatus::DeprecationScheduled);
        assert_eq!(api.lines_of_code, 100);
        assert_eq!(api.tags_string(), "team=core");

        let legacy = &functions[1];
        assert!(legacy.is_deprecated());
        assert!(!legacy.aws_supported);
        assert!(legacy.tags.is_empty());
        assert_eq!(legacy.lines_of_code, 0);
    }

    #[tokio::test]
    async fn test_listing_failure_propagates() {
        let clients = clients().await;
        let classifier = RuntimeClassifier::default();
        let harvester = RegionHarvester::new(&clients, &classifier);

        assert!(harvester.scan_region("eu-west-1").await.is_err());
        assert!(harvester.scan_region("ap-southeast-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_describe_function() {
        let clients = clients().await;
        let classifier = RuntimeClassifier::default();
        let harvester = RegionHarvester::new(&clients, &classifier).with_date(as_of());

        let record = harvester.describe_function("api", "us-east-1").await.unwrap();
        assert_eq!(record.function_name, "api");
        assert_eq!(record.language_version, "3.12");

        let err = harvester
            .describe_function("missing", "us-east-1")
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Provider(ProviderError::NotFound(_))));

        let err = harvester
            .describe_function("image-fn", "us-east-1")
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Inspect(_)));
    }
}
