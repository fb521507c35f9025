//! Collaborator seams for the scanner.
//!
//! Everything the scanner needs from the outside world goes through the
//! async traits in this module:
//! - [`LambdaApi`] for listing and describing functions in one region
//! - [`IdentityApi`] for caller introspection and role assumption
//! - [`OrganizationsApi`] for the multi-account directory
//! - [`CloudSession`] / [`SessionProvider`] for building scoped clients
//! - [`DocumentFetcher`] for the optional runtime table refresh
//!
//! The DTOs mirror the provider's PascalCase JSON so that listing exports
//! deserialize without a translation layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Errors surfaced by provider clients.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Named credential profile does not exist
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// No usable credentials for the requested scope
    #[error("No credentials available: {0}")]
    NoCredentials(String),

    /// Caller lacks permission for the operation
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The account is not part of an organization
    #[error("Organizations is not in use for this account")]
    OrganizationsNotInUse,

    /// Requested resource does not exist
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Any other service-side failure
    #[error("Service call failed: {0}")]
    Service(String),

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Returns `true` for permission failures.
    pub fn is_access_denied(&self) -> bool {
        matches!(self, ProviderError::AccessDenied(_))
    }
}

// ============================================================================
// Function DTOs
// ============================================================================

/// Function configuration as returned by listing and describe calls.
///
/// Listing and `get_function_configuration` share this shape. Fields are
/// optional because container-image functions omit several of them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionConfiguration {
    pub function_name: String,
    #[serde(default)]
    pub function_arn: Option<String>,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub code_size: Option<u64>,
    #[serde(default)]
    pub memory_size: Option<u32>,
    #[serde(default)]
    pub timeout: Option<u32>,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub handler: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub environment: Option<EnvironmentResponse>,
    #[serde(default)]
    pub layers: Vec<LayerReference>,
    #[serde(default)]
    pub dead_letter_config: Option<DeadLetterConfig>,
    #[serde(default)]
    pub vpc_config: Option<VpcConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnvironmentResponse {
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LayerReference {
    pub arn: String,
    #[serde(default)]
    pub code_size: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeadLetterConfig {
    #[serde(default)]
    pub target_arn: Option<String>,
}

impl DeadLetterConfig {
    pub fn is_configured(&self) -> bool {
        self.target_arn.as_deref().is_some_and(|arn| !arn.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VpcConfig {
    #[serde(default)]
    pub vpc_id: Option<String>,
    #[serde(default)]
    pub subnet_ids: Vec<String>,
}

impl VpcConfig {
    pub fn is_attached(&self) -> bool {
        self.vpc_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// One page of a function listing.
#[derive(Debug, Clone, Default)]
pub struct FunctionPage {
    pub functions: Vec<FunctionConfiguration>,
    /// Marker for the next page, `None` on the last page
    pub next_marker: Option<String>,
}

/// Full function description including the code package location.
#[derive(Debug, Clone)]
pub struct FunctionCode {
    pub configuration: FunctionConfiguration,
    pub location: Option<String>,
}

// ============================================================================
// Identity & Organization DTOs
// ============================================================================

/// Result of identity introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: String,
}

/// Short-lived credentials from a role assumption.
#[derive(Debug, Clone)]
pub struct TemporaryCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationInfo {
    pub id: String,
    pub management_account_id: String,
}

/// Lifecycle status of an organization member account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    #[default]
    Active,
    Suspended,
    PendingClosure,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberAccount {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub status: AccountStatus,
    #[serde(default)]
    pub joined_method: Option<String>,
    #[serde(default)]
    pub joined_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct AccountPage {
    pub accounts: Vec<MemberAccount>,
    pub next_token: Option<String>,
}

// ============================================================================
// Client Traits
// ============================================================================

/// Function service client bound to one region.
#[async_trait]
pub trait LambdaApi: Send + Sync {
    /// Lists one page of functions starting at `marker`.
    async fn list_functions(&self, marker: Option<String>) -> Result<FunctionPage, ProviderError>;

    /// Fetches the current configuration of one function.
    async fn get_function_configuration(
        &self,
        function_name: &str,
    ) -> Result<FunctionConfiguration, ProviderError>;

    /// Lists the tags attached to a function ARN.
    async fn list_tags(&self, resource_arn: &str)
        -> Result<BTreeMap<String, String>, ProviderError>;

    /// Fetches configuration and code location of one function.
    async fn get_function(&self, function_name: &str) -> Result<FunctionCode, ProviderError>;
}

/// Identity service client.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    async fn caller_identity(&self) -> Result<CallerIdentity, ProviderError>;

    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        duration_secs: u32,
    ) -> Result<TemporaryCredentials, ProviderError>;
}

/// Organization directory client.
#[async_trait]
pub trait OrganizationsApi: Send + Sync {
    async fn describe_organization(&self) -> Result<OrganizationInfo, ProviderError>;

    async fn list_accounts(&self, next_token: Option<String>)
        -> Result<AccountPage, ProviderError>;
}

/// An authenticated session able to construct regional clients.
///
/// Construction is expected to be cheap but not free; callers cache the
/// returned handles through [`crate::clients::ClientManager`].
pub trait CloudSession: Send + Sync {
    fn lambda(&self, region: &str) -> Result<Arc<dyn LambdaApi>, ProviderError>;

    fn identity(&self, region: &str) -> Result<Arc<dyn IdentityApi>, ProviderError>;

    fn organizations(&self, region: &str) -> Result<Arc<dyn OrganizationsApi>, ProviderError>;
}

/// Builds sessions from named profiles or temporary credentials.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn profile_session(&self, profile: &str)
        -> Result<Arc<dyn CloudSession>, ProviderError>;

    async fn credentials_session(
        &self,
        credentials: &TemporaryCredentials,
    ) -> Result<Arc<dyn CloudSession>, ProviderError>;
}

/// Retrieves raw markup for a URL.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ProviderError>;
}

// ============================================================================
// Tests
// ============================================================================
