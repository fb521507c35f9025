//! Scan orchestration across regions and organization accounts.
//!
//! Everything runs sequentially in input order, so result order follows
//! account order, then region order, then listing order.

use chrono::{NaiveDate, Utc};
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::clients::ClientManager;
use crate::harvest::RegionHarvester;
use crate::model::{AccountScan, AccountScanState, FunctionRecord, ScanResult};
use crate::organization::{OrganizationDirectory, OrganizationError, SessionError};
use crate::runtime::RuntimeClassifier;
use crate::traits::SessionProvider;

/// Errors that abort a whole scan.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("No regions to scan")]
    NoRegions,

    #[error(transparent)]
    Organization(#[from] OrganizationError),
}

pub struct ScanExecutor {
    classifier: RuntimeClassifier,
    as_of: Option<NaiveDate>,
}

impl ScanExecutor {
    pub fn new(classifier: RuntimeClassifier) -> Self {
        Self {
            classifier,
            as_of: None,
        }
    }

    /// Pins the date support statuses are evaluated against.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }

    pub fn classifier(&self) -> &RuntimeClassifier {
        &self.classifier
    }

    fn harvester<'a>(&'a self, clients: &'a ClientManager) -> RegionHarvester<'a> {
        let harvester = RegionHarvester::new(clients, &self.classifier);
        match self.as_of {
            Some(date) => harvester.with_date(date),
            None => harvester,
        }
    }

    /// Scans every region with one set of clients; a failing region is
    /// logged and skipped.
    #[instrument(skip(self, clients), fields(scope = %clients.scope()))]
    pub async fn scan_regions(&self, clients: &ClientManager, regions: &[String]) -> Vec<FunctionRecord> {
        let harvester = self.harvester(clients);
        let mut functions = Vec::new();

        info!(count = regions.len(), regions = %regions.join(", "), "Scanning regions");
        for region in regions {
            match harvester.scan_region(region).await {
                Ok(found) => {
                    info!(region = %region, functions = found.len(), "Found functions in region");
                    functions.extend(found);
                }
                Err(e) => {
                    error!(region = %region, error = %e, "Error scanning region");
                }
            }
        }
        functions
    }

    /// Single-scope scan tagged with the caller's account id.
    ///
    /// # Errors
    ///
    /// Only [`ScanError::NoRegions`]; region failures are skipped.
    pub async fn scan_account(
        &self,
        clients: &ClientManager,
        regions: &[String],
    ) -> Result<ScanResult, ScanError> {
        if regions.is_empty() {
            return Err(ScanError::NoRegions);
        }
        let start = Instant::now();

        let account_id = match clients.account_id().await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "Could not resolve account id");
                None
            }
        };

        let mut functions = self.scan_regions(clients, regions).await;
        if let Some(id) = &account_id {
            for function in &mut functions {
                function.account_id = Some(id.clone());
            }
        }

        info!(
            account = account_id.as_deref().unwrap_or("unknown"),
            functions = functions.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Account scan completed"
        );
        Ok(ScanResult {
            functions,
            regions_scanned: regions.to_vec(),
            scan_timestamp: Utc::now(),
            account_id,
            accounts: Vec::new(),
        })
    }

    /// Scans every active member account of the organization.
    ///
    /// # Errors
    ///
    /// Fails when the account directory cannot be read (see
    /// [`OrganizationError`]). Unreachable member accounts are skipped.
    #[instrument(skip_all)]
    pub async fn scan_organization(
        &self,
        directory: &OrganizationDirectory<'_>,
        provider: &dyn SessionProvider,
        regions: &[String],
        role_name: Option<&str>,
    ) -> Result<ScanResult, ScanError> {
        if regions.is_empty() {
            return Err(ScanError::NoRegions);
        }
        let start = Instant::now();

        let members = directory.active_accounts().await.map_err(|e| {
            error!(error = %e, "Failed to get organization accounts");
            e
        })?;

        let mut functions = Vec::new();
        let mut accounts = Vec::with_capacity(members.len());

        for member in members {
            let mut scan = AccountScan {
                account_id: member.id.clone(),
                account_name: member.name.clone(),
                state: AccountScanState::Pending,
                functions_found: 0,
            };
            info!(account = %member.id, name = %member.name, "Scanning account");

            match directory
                .establish_session(provider, &member.id, role_name)
                .await
            {
                Ok(manager) => {
                    advance(&mut scan, AccountScanState::SessionEstablished);
                    let mut found = self.scan_regions(&manager, regions).await;
                    for function in &mut found {
                        function.account_id = Some(member.id.clone());
                        function.account_name = Some(member.name.clone());
                    }
                    scan.functions_found = found.len();
                    advance(&mut scan, AccountScanState::Scanned);
                    info!(account = %member.name, functions = found.len(), "Found functions in account");
                    functions.extend(found);
                }
                Err(e) => {
                    let next = match e {
                        SessionError::AccessDenied { .. } => AccountScanState::AccessDenied,
                        SessionError::Failed { .. } => AccountScanState::SessionFailed,
                    };
                    advance(&mut scan, next);
                    warn!(account = %member.id, error = %e, "Skipping account due to access issues");
                }
            }
            accounts.push(scan);
        }

        let scanned = accounts
            .iter()
            .filter(|a| a.state == AccountScanState::Scanned)
            .count();
        info!(
            accounts = accounts.len(),
            scanned,
            functions = functions.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Organization scan completed"
        );

        Ok(ScanResult {
            functions,
            regions_scanned: regions.to_vec(),
            scan_timestamp: Utc::now(),
            account_id: directory.clients().account_id().await.ok(),
            accounts,
        })
    }
}

fn advance(scan: &mut AccountScan, next: AccountScanState) {
    match scan.state.advance(next) {
        Some(state) => scan.state = state,
        None => warn!(
            account = %scan.account_id,
            from = ?scan.state,
            to = ?next,
            "Ignoring illegal account state transition"
        ),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::SnapshotProvider;

    const INVENTORY: &str = r#"{
        "profiles": {"management": "111111111111", "111111111111": "111111111111"},
        "organization": {"id": "o-test", "management_account_id": "111111111111"},
        "accounts": [
            {"id": "111111111111", "name": "management",
             "regions": {
                 "us-east-1": {"functions": [
                     {"FunctionName": "billing", "Runtime": "python3.9", "Version": "$LATEST",
                      "CodeSize": 1000, "MemorySize": 128, "Timeout": 3,
                      "LastModified": "2024-01-01T00:00:00.000+0000", "Handler": "app.handler"}
                 ]},
                 "eu-west-1": {"unavailable": true}
             }},
            {"id": "222222222222", "name": "locked"},
            {"id": "333333333333", "name": "workloads",
             "assumable_roles": ["OrganizationAccountAccessRole"],
             "regions": {
                 "eu-west-1": {"functions": [
                     {"FunctionName": "orders", "Runtime": "nodejs18.x", "Version": "$LATEST",
                      "CodeSize": 2000, "MemorySize": 256, "Timeout": 10,
                      "LastModified": "2024-01-01T00:00:00.000+0000", "Handler": "index.handler"},
                     {"FunctionName": "reports", "Runtime": "python3.7", "Version": "$LATEST",
                      "CodeSize": 500, "MemorySize": 128, "Timeout": 30,
                      "LastModified": "2021-01-01T00:00:00.000+0000", "Handler": "main.run"}
                 ]}
             }}
        ]
    }"#;

    fn regions() -> Vec<String> {
        vec!["us-east-1".to_string(), "eu-west-1".to_string()]
    }

    fn executor() -> ScanExecutor {
        ScanExecutor::new(RuntimeClassifier::default())
            .with_date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
    }

    async fn setup() -> (SnapshotProvider, ClientManager) {
        let provider = SnapshotProvider::from_json_str(INVENTORY).unwrap();
        let clients = ClientManager::connect(&provider, "management", "us-east-1")
            .await
            .unwrap();
        (provider, clients)
    }

    #[tokio::test]
    async fn test_region_failure_does_not_abort_account_scan() {
        let (_provider, clients) = setup().await;
        let result = executor().scan_account(&clients, &regions()).await.unwrap();

        assert_eq!(result.functions.len(), 1);
        assert_eq!(result.account_id.as_deref(), Some("111111111111"));
        assert_eq!(result.functions[0].account_id.as_deref(), Some("111111111111"));
        assert_eq!(result.regions_scanned, regions());
        assert!(!result.is_organization_scan());
        assert_eq!(result.accounts_scanned(), None);
    }

    #[tokio::test]
    async fn test_organization_scan_skips_unreachable_account() {
        let (provider, clients) = setup().await;
        let directory = OrganizationDirectory::new(&clients);
        let result = executor()
            .scan_organization(&directory, &provider, &regions(), None)
            .await
            .unwrap();

        let names: Vec<_> = result
            .functions
            .iter()
            .map(|f| (f.account_name.as_deref().unwrap(), f.function_name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("management", "billing"),
                ("workloads", "orders"),
                ("workloads", "reports"),
            ]
        );

        let states: Vec<_> = result.accounts.iter().map(|a| a.state).collect();
        assert_eq!(
            states,
            vec![
                AccountScanState::Scanned,
                AccountScanState::AccessDenied,
                AccountScanState::Scanned,
            ]
        );
        assert_eq!(result.accounts_scanned(), Some(2));
        assert_eq!(result.skipped_accounts().count(), 1);
        assert_eq!(result.accounts[2].functions_found, 2);
        assert!(result.functions[2].is_deprecated());
    }

    #[tokio::test]
    async fn test_empty_region_list_is_rejected() {
        let (_provider, clients) = setup().await;
        assert!(matches!(
            executor().scan_account(&clients, &[]).await,
            Err(ScanError::NoRegions)
        ));
    }

    #[test]
    fn test_illegal_transition_is_ignored() {
        let mut scan = AccountScan {
            account_id: "111111111111".to_string(),
            account_name: "management".to_string(),
            state: AccountScanState::Pending,
            functions_found: 0,
        };
        advance(&mut scan, AccountScanState::Scanned);
        assert_eq!(scan.state, AccountScanState::Pending);
        advance(&mut scan, AccountScanState::SessionFailed);
        assert_eq!(scan.state, AccountScanState::SessionFailed);
    }
}
