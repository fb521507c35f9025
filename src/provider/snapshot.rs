//! Offline session provider backed by a JSON inventory snapshot.
//!
//! The snapshot describes profiles, the organization, member accounts and
//! the functions deployed per account and region. Function entries use the
//! provider's own listing JSON, so an exported listing can be pasted in.
//!
//! ```json
//! {
//!   "profiles": { "default": "111111111111" },
//!   "organization": { "id": "o-example", "management_account_id": "111111111111" },
//!   "accounts": [
//!     {
//!       "id": "111111111111", "name": "management", "status": "ACTIVE",
//!       "assumable_roles": ["OrganizationAccountAccessRole"],
//!       "regions": {
//!         "us-east-1": { "functions": [ { "FunctionName": "api", "Runtime": "python3.12" } ] },
//!         "eu-west-1": { "unavailable": true }
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! `FailOn` on a function entry (`"Configuration"`, `"Tags"`, `"Code"`)
//! makes the matching call fail, for exercising degraded paths.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::traits::{
    AccountPage, CallerIdentity, CloudSession, FunctionCode, FunctionConfiguration, FunctionPage,
    IdentityApi, LambdaApi, MemberAccount, OrganizationInfo, OrganizationsApi, ProviderError,
    SessionProvider, TemporaryCredentials,
};

const FUNCTIONS_PAGE_SIZE: usize = 50;
const ACCOUNTS_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InventorySnapshot {
    /// Profile name to account id
    #[serde(default)]
    pub profiles: BTreeMap<String, String>,
    #[serde(default)]
    pub organization: Option<OrganizationSnapshot>,
    #[serde(default)]
    pub accounts: Vec<AccountSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationSnapshot {
    pub id: String,
    pub management_account_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountSnapshot {
    #[serde(flatten)]
    pub account: MemberAccount,
    /// Role names other accounts may assume into this one
    #[serde(default)]
    pub assumable_roles: Vec<String>,
    #[serde(default)]
    pub regions: BTreeMap<String, RegionSnapshot>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegionSnapshot {
    #[serde(default)]
    pub functions: Vec<FunctionSnapshot>,
    /// Listing calls in this region fail
    #[serde(default)]
    pub unavailable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum SnapshotCall {
    Configuration,
    Tags,
    Code,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionSnapshot {
    #[serde(flatten)]
    pub configuration: FunctionConfiguration,
    #[serde(default, rename = "Tags")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, rename = "CodeLocation")]
    pub code_location: Option<String>,
    #[serde(default, rename = "FailOn")]
    pub fail_on: Vec<SnapshotCall>,
}

impl FunctionSnapshot {
    fn check(&self, call: SnapshotCall) -> Result<(), ProviderError> {
        if self.fail_on.contains(&call) {
            return Err(ProviderError::Service(format!(
                "{:?} call failed for {}",
                call, self.configuration.function_name
            )));
        }
        Ok(())
    }
}

struct SnapshotState {
    snapshot: InventorySnapshot,
    /// Access key id to account id for credentials handed out by `assume_role`
    issued: Mutex<HashMap<String, String>>,
    next_key: AtomicU64,
}

impl SnapshotState {
    fn account(&self, account_id: &str) -> Option<&AccountSnapshot> {
        self.snapshot
            .accounts
            .iter()
            .find(|a| a.account.id == account_id)
    }
}

/// [`SessionProvider`] over an [`InventorySnapshot`].
#[derive(Clone)]
pub struct SnapshotProvider {
    state: Arc<SnapshotState>,
}

impl SnapshotProvider {
    pub fn new(snapshot: InventorySnapshot) -> Self {
        Self {
            state: Arc::new(SnapshotState {
                snapshot,
                issued: Mutex::new(HashMap::new()),
                next_key: AtomicU64::new(1),
            }),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ProviderError> {
        let snapshot: InventorySnapshot = serde_json::from_str(json)
            .map_err(|e| ProviderError::Service(format!("invalid inventory snapshot: {}", e)))?;
        Ok(Self::new(snapshot))
    }

    pub fn load(path: &Path) -> Result<Self, ProviderError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    fn session(&self, account_id: String, arn: String) -> Arc<dyn CloudSession> {
        Arc::new(SnapshotSession {
            state: self.state.clone(),
            account_id,
            arn,
        })
    }
}

#[async_trait]
impl SessionProvider for SnapshotProvider {
    async fn profile_session(
        &self,
        profile: &str,
    ) -> Result<Arc<dyn CloudSession>, ProviderError> {
        let account_id = self
            .state
            .snapshot
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| ProviderError::ProfileNotFound(profile.to_string()))?;
        let arn = format!("arn:aws:iam::{}:user/{}", account_id, profile);
        Ok(self.session(account_id, arn))
    }

    async fn credentials_session(
        &self,
        credentials: &TemporaryCredentials,
    ) -> Result<Arc<dyn CloudSession>, ProviderError> {
        let account_id = self
            .state
            .issued
            .lock()
            .await
            .get(&credentials.access_key_id)
            .cloned()
            .ok_or_else(|| {
                ProviderError::NoCredentials(format!(
                    "unrecognized access key {}",
                    credentials.access_key_id
                ))
            })?;
        let arn = format!("arn:aws:sts::{}:assumed-role/{}", account_id, credentials.session_token);
        Ok(self.session(account_id, arn))
    }
}

struct SnapshotSession {
    state: Arc<SnapshotState>,
    account_id: String,
    arn: String,
}

impl CloudSession for SnapshotSession {
    fn lambda(&self, region: &str) -> Result<Arc<dyn LambdaApi>, ProviderError> {
        Ok(Arc::new(SnapshotLambda {
            state: self.state.clone(),
            account_id: self.account_id.clone(),
            region: region.to_string(),
        }))
    }

    fn identity(&self, _region: &str) -> Result<Arc<dyn IdentityApi>, ProviderError> {
        Ok(Arc::new(SnapshotIdentity {
            state: self.state.clone(),
            account_id: self.account_id.clone(),
            arn: self.arn.clone(),
        }))
    }

    fn organizations(&self, _region: &str) -> Result<Arc<dyn OrganizationsApi>, ProviderError> {
        Ok(Arc::new(SnapshotOrganizations {
            state: self.state.clone(),
            account_id: self.account_id.clone(),
        }))
    }
}

// ============================================================================
// Functions
// ============================================================================

struct SnapshotLambda {
    state: Arc<SnapshotState>,
    account_id: String,
    region: String,
}

impl SnapshotLambda {
    fn functions(&self) -> Result<&[FunctionSnapshot], ProviderError> {
        let region = self
            .state
            .account(&self.account_id)
            .and_then(|a| a.regions.get(&self.region));
        match region {
            Some(region) if region.unavailable => Err(ProviderError::Service(format!(
                "region {} is unavailable",
                self.region
            ))),
            Some(region) => Ok(&region.functions),
            None => Ok(&[]),
        }
    }

    fn find(&self, function_name: &str) -> Result<&FunctionSnapshot, ProviderError> {
        self.functions()?
            .iter()
            .find(|f| f.configuration.function_name == function_name)
            .ok_or_else(|| ProviderError::NotFound(function_name.to_string()))
    }
}

#[async_trait]
impl LambdaApi for SnapshotLambda {
    async fn list_functions(&self, marker: Option<String>) -> Result<FunctionPage, ProviderError> {
        let functions = self.functions()?;
        let start = match marker {
            Some(marker) => marker
                .parse::<usize>()
                .map_err(|_| ProviderError::Service(format!("invalid marker {}", marker)))?,
            None => 0,
        };
        let end = (start + FUNCTIONS_PAGE_SIZE).min(functions.len());
        let page = functions.get(start..end).unwrap_or(&[]);
        debug!(region = %self.region, start, count = page.len(), "Listing functions page");

        Ok(FunctionPage {
            functions: page.iter().map(|f| f.configuration.clone()).collect(),
            next_marker: (end < functions.len()).then(|| end.to_string()),
        })
    }

    async fn get_function_configuration(
        &self,
        function_name: &str,
    ) -> Result<FunctionConfiguration, ProviderError> {
        let function = self.find(function_name)?;
        function.check(SnapshotCall::Configuration)?;
        Ok(function.configuration.clone())
    }

    async fn list_tags(
        &self,
        resource_arn: &str,
    ) -> Result<BTreeMap<String, String>, ProviderError> {
        let name = resource_arn
            .split_once(":function:")
            .map(|(_, rest)| rest.split(':').next().unwrap_or(rest))
            .unwrap_or(resource_arn);
        let function = self.find(name)?;
        function.check(SnapshotCall::Tags)?;
        Ok(function.tags.clone())
    }

    async fn get_function(&self, function_name: &str) -> Result<FunctionCode, ProviderError> {
        let function = self.find(function_name)?;
        function.check(SnapshotCall::Code)?;
        Ok(FunctionCode {
            configuration: function.configuration.clone(),
            location: function.code_location.clone(),
        })
    }
}

// ============================================================================
// Identity
// ============================================================================

struct SnapshotIdentity {
    state: Arc<SnapshotState>,
    account_id: String,
    arn: String,
}

#[async_trait]
impl IdentityApi for SnapshotIdentity {
    async fn caller_identity(&self) -> Result<CallerIdentity, ProviderError> {
        Ok(CallerIdentity {
            account: self.account_id.clone(),
            arn: self.arn.clone(),
        })
    }

    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        duration_secs: u32,
    ) -> Result<TemporaryCredentials, ProviderError> {
        let (target, role) = role_arn
            .strip_prefix("arn:aws:iam::")
            .and_then(|rest| rest.split_once(":role/"))
            .ok_or_else(|| ProviderError::Service(format!("malformed role ARN {}", role_arn)))?;

        let allowed = self
            .state
            .account(target)
            .is_some_and(|a| a.assumable_roles.iter().any(|r| r == role));
        if !allowed {
            return Err(ProviderError::AccessDenied(format!(
                "{} is not authorized to assume {}",
                self.arn, role_arn
            )));
        }

        let serial = self.state.next_key.fetch_add(1, Ordering::SeqCst);
        let access_key_id = format!("ASIASNAPSHOT{:08}", serial);
        self.state
            .issued
            .lock()
            .await
            .insert(access_key_id.clone(), target.to_string());

        Ok(TemporaryCredentials {
            access_key_id,
            secret_access_key: format!("snapshot-secret-{}", serial),
            session_token: format!("{}/{}", role, session_name),
            expiration: Some(Utc::now() + Duration::seconds(i64::from(duration_secs))),
        })
    }
}

// ============================================================================
// Organizations
// ============================================================================

struct SnapshotOrganizations {
    state: Arc<SnapshotState>,
    account_id: String,
}

#[async_trait]
impl OrganizationsApi for SnapshotOrganizations {
    async fn describe_organization(&self) -> Result<OrganizationInfo, ProviderError> {
        let org = self
            .state
            .snapshot
            .organization
            .as_ref()
            .ok_or(ProviderError::OrganizationsNotInUse)?;
        Ok(OrganizationInfo {
            id: org.id.clone(),
            management_account_id: org.management_account_id.clone(),
        })
    }

    async fn list_accounts(&self, next_token: Option<String>) -> Result<AccountPage, ProviderError> {
        let org = self
            .state
            .snapshot
            .organization
            .as_ref()
            .ok_or(ProviderError::OrganizationsNotInUse)?;
        if org.management_account_id != self.account_id {
            return Err(ProviderError::AccessDenied(format!(
                "account {} cannot list organization accounts",
                self.account_id
            )));
        }

        let accounts = &self.state.snapshot.accounts;
        let start = match next_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| ProviderError::Service(format!("invalid token {}", token)))?,
            None => 0,
        };
        let end = (start + ACCOUNTS_PAGE_SIZE).min(accounts.len());

        Ok(AccountPage {
            accounts: accounts
                .get(start..end)
                .unwrap_or(&[])
                .iter()
                .map(|a| a.account.clone())
                .collect(),
            next_token: (end < accounts.len()).then(|| end.to_string()),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
