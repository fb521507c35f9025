//! Organization account directory and per-account sessions.
//!
//! Organization mode needs the management identity. The directory checks
//! that precondition, lists active member accounts, and opens a scoped
//! [`ClientManager`] per member account.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clients::ClientManager;
use crate::traits::{AccountStatus, MemberAccount, ProviderError, SessionProvider};

/// Role assumed in member accounts when no profile matches the account id.
pub const DEFAULT_CROSS_ACCOUNT_ROLE: &str = "OrganizationAccountAccessRole";

/// Lifetime of assumed-role credentials.
pub const SESSION_DURATION_SECS: u32 = 3600;

/// Fatal organization-mode precondition failures.
#[derive(Error, Debug)]
pub enum OrganizationError {
    /// Caller is a member account
    #[error(
        "Current account ({current}) is not the organization management account ({management}); \
         organization scanning requires management account access"
    )]
    NotManagementAccount { current: String, management: String },

    #[error("Organizations is not enabled for this account; use single-account scanning")]
    NotInUse,

    /// Missing DescribeOrganization or ListAccounts permissions
    #[error("Access denied to Organizations: {0}")]
    AccessDenied(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl OrganizationError {
    fn from_provider(err: ProviderError) -> Self {
        match err {
            ProviderError::OrganizationsNotInUse => OrganizationError::NotInUse,
            ProviderError::AccessDenied(msg) => OrganizationError::AccessDenied(msg),
            other => OrganizationError::Provider(other),
        }
    }
}

/// Why no session could be opened for a member account.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Access denied assuming role for account {account_id}: {reason}")]
    AccessDenied { account_id: String, reason: String },

    #[error("Could not establish session for account {account_id}: {reason}")]
    Failed { account_id: String, reason: String },
}

/// Organization queries through the base identity's clients.
pub struct OrganizationDirectory<'a> {
    clients: &'a ClientManager,
}

impl<'a> OrganizationDirectory<'a> {
    pub fn new(clients: &'a ClientManager) -> Self {
        Self { clients }
    }

    pub fn clients(&self) -> &ClientManager {
        self.clients
    }

    /// Whether the organization can be described with the current identity.
    ///
    /// # Errors
    ///
    /// "Not in use" and "access denied" yield `Ok(false)`; other provider
    /// failures are returned.
    pub async fn validate_access(&self) -> Result<bool, ProviderError> {
        let org = self.clients.organizations(self.clients.default_region()).await?;
        match org.describe_organization().await {
            Ok(_) => Ok(true),
            Err(ProviderError::OrganizationsNotInUse) => Ok(false),
            Err(e) if e.is_access_denied() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// All member accounts with status `ACTIVE`, in listing order.
    ///
    /// # Errors
    ///
    /// Every error here is fatal to an organization scan.
    pub async fn active_accounts(&self) -> Result<Vec<MemberAccount>, OrganizationError> {
        let org = self.clients.organizations(self.clients.default_region()).await?;
        let info = org
            .describe_organization()
            .await
            .map_err(OrganizationError::from_provider)?;

        let current = self.clients.account_id().await?;
        if current != info.management_account_id {
            return Err(OrganizationError::NotManagementAccount {
                current,
                management: info.management_account_id,
            });
        }
        info!(organization = %info.id, "Verified management account access");

        let mut accounts = Vec::new();
        let mut next_token = None;
        loop {
            let page = org
                .list_accounts(next_token)
                .await
                .map_err(OrganizationError::from_provider)?;

            for account in page.accounts {
                if account.status == AccountStatus::Active {
                    debug!(account = %account.id, name = %account.name, "Found active account");
                    accounts.push(account);
                }
            }

            next_token = page.next_token;
            if next_token.is_none() {
                break;
            }
        }

        info!(accounts = accounts.len(), "Found active accounts in organization");
        Ok(accounts)
    }

    /// Opens a [`ClientManager`] scoped to `account_id`.
    ///
    /// Without an explicit `role_name`, a profile named after the account
    /// is tried first; then [`DEFAULT_CROSS_ACCOUNT_ROLE`] is assumed.
    pub async fn establish_session(
        &self,
        provider: &dyn SessionProvider,
        account_id: &str,
        role_name: Option<&str>,
    ) -> Result<ClientManager, SessionError> {
        let default_region = self.clients.default_region();

        if role_name.is_none() {
            if let Some(manager) = self.profile_session(provider, account_id).await {
                debug!(account = account_id, "Using profile for account");
                return Ok(manager);
            }
        }

        let role = role_name.unwrap_or(DEFAULT_CROSS_ACCOUNT_ROLE);
        let role_arn = format!("arn:aws:iam::{}:role/{}", account_id, role);
        debug!(account = account_id, role_arn = %role_arn, "Assuming role");

        let failed = |e: ProviderError| {
            if e.is_access_denied() {
                SessionError::AccessDenied {
                    account_id: account_id.to_string(),
                    reason: e.to_string(),
                }
            } else {
                SessionError::Failed {
                    account_id: account_id.to_string(),
                    reason: e.to_string(),
                }
            }
        };

        let identity = self.clients.identity(default_region).await.map_err(failed)?;
        let credentials = identity
            .assume_role(
                &role_arn,
                &format!("LambdaHarvester-{}", account_id),
                SESSION_DURATION_SECS,
            )
            .await
            .map_err(failed)?;

        let session = provider
            .credentials_session(&credentials)
            .await
            .map_err(failed)?;
        let manager = ClientManager::new(session, default_region, account_id);
        let caller = manager.caller_identity().await.map_err(failed)?;
        info!(account = account_id, arn = %caller.arn, "Assumed role for account");
        Ok(manager)
    }

    async fn profile_session(
        &self,
        provider: &dyn SessionProvider,
        account_id: &str,
    ) -> Option<ClientManager> {
        let session = provider.profile_session(account_id).await.ok()?;
        let manager = ClientManager::new(session, self.clients.default_region(), account_id);
        match manager.account_id().await {
            Ok(id) if id == account_id => Some(manager),
            Ok(id) => {
                warn!(profile = account_id, resolved = %id, "Profile resolves to a different account");
                None
            }
            Err(_) => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
