//! Scoped client access for one session.
//!
//! A [`ClientManager`] owns a session handle and memoizes the clients it
//! builds per `(region, service)`. Entries are written once and never
//! invalidated; the manager lives exactly as long as the scope it serves
//! (the base identity, or one organization member account).

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::traits::{
    CallerIdentity, CloudSession, IdentityApi, LambdaApi, OrganizationsApi, ProviderError,
    SessionProvider,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Service {
    Lambda,
    Identity,
    Organizations,
}

#[derive(Clone)]
enum ServiceClient {
    Lambda(Arc<dyn LambdaApi>),
    Identity(Arc<dyn IdentityApi>),
    Organizations(Arc<dyn OrganizationsApi>),
}

/// Session handle plus a write-once client cache.
pub struct ClientManager {
    session: Arc<dyn CloudSession>,
    default_region: String,
    /// Profile name or account id, used in log lines
    scope: String,
    clients: Mutex<HashMap<(String, Service), ServiceClient>>,
}

impl ClientManager {
    /// Wraps an already established session.
    pub fn new(
        session: Arc<dyn CloudSession>,
        default_region: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            session,
            default_region: default_region.into(),
            scope: scope.into(),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Opens a session for `profile` and verifies it with an identity call.
    ///
    /// # Errors
    ///
    /// Fails when the profile is unknown or its credentials are rejected;
    /// both are fatal at startup.
    pub async fn connect(
        provider: &dyn SessionProvider,
        profile: &str,
        default_region: &str,
    ) -> Result<Self, ProviderError> {
        let session = provider.profile_session(profile).await.map_err(|e| {
            error!(profile, error = %e, "Failed to open session");
            e
        })?;
        info!(profile, "Initialized session");

        let manager = Self::new(session, default_region, profile);
        let identity = manager.caller_identity().await.map_err(|e| {
            error!(profile, error = %e, "Credentials check failed");
            e
        })?;
        info!(arn = %identity.arn, "Caller identity");
        Ok(manager)
    }

    pub fn default_region(&self) -> &str {
        &self.default_region
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    async fn client(&self, service: Service, region: &str) -> Result<ServiceClient, ProviderError> {
        let mut clients = self.clients.lock().await;
        let key = (region.to_string(), service);
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let client = match service {
            Service::Lambda => ServiceClient::Lambda(self.session.lambda(region)?),
            Service::Identity => ServiceClient::Identity(self.session.identity(region)?),
            Service::Organizations => {
                ServiceClient::Organizations(self.session.organizations(region)?)
            }
        };
        debug!(scope = %self.scope, region, service = ?service, "Created client");
        clients.insert(key, client.clone());
        Ok(client)
    }

    pub async fn lambda(&self, region: &str) -> Result<Arc<dyn LambdaApi>, ProviderError> {
        match self.client(Service::Lambda, region).await? {
            ServiceClient::Lambda(client) => Ok(client),
            _ => Err(ProviderError::Service("client cache mismatch".to_string())),
        }
    }

    pub async fn identity(&self, region: &str) -> Result<Arc<dyn IdentityApi>, ProviderError> {
        match self.client(Service::Identity, region).await? {
            ServiceClient::Identity(client) => Ok(client),
            _ => Err(ProviderError::Service("client cache mismatch".to_string())),
        }
    }

    pub async fn organizations(
        &self,
        region: &str,
    ) -> Result<Arc<dyn OrganizationsApi>, ProviderError> {
        match self.client(Service::Organizations, region).await? {
            ServiceClient::Organizations(client) => Ok(client),
            _ => Err(ProviderError::Service("client cache mismatch".to_string())),
        }
    }

    /// Identity of this session, queried in the default region.
    pub async fn caller_identity(&self) -> Result<CallerIdentity, ProviderError> {
        self.identity(&self.default_region)
            .await?
            .caller_identity()
            .await
    }

    /// Account id of this session.
    pub async fn account_id(&self) -> Result<String, ProviderError> {
        Ok(self.caller_identity().await?.account)
    }

    #[cfg(test)]
    pub(crate) async fn cached_clients(&self) -> usize {
        self.clients.lock().await.len()
    }
}
