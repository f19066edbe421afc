//! Azure identity credentials.
//!
//! Token acquisition is delegated to the Azure SDK. [`AzureCredential`] holds
//! one or more SDK credentials and tries them in order until one produces a
//! token; the source that worked is remembered and used directly afterwards.
//!
//! The default chain, in order:
//!
//! 1. `EnvironmentCredential`: service principal from `AZURE_TENANT_ID`,
//!    `AZURE_CLIENT_ID` and `AZURE_CLIENT_SECRET`.
//! 2. `WorkloadIdentityCredential`: Kubernetes workload identity
//!    (`AZURE_FEDERATED_TOKEN_FILE`).
//! 3. `ManagedIdentityCredential`: App Service, Functions, VMs via IMDS.
//! 4. `DeveloperToolsCredential`: `az login` / `azd auth login`, for local runs.

use async_trait::async_trait;
use azure_core::credentials::{Secret, TokenCredential as AzureTokenCredential};
use azure_identity::UserAssignedId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use super::{AccessToken, CredentialError, TokenCredential};

type Source = (&'static str, Arc<dyn AzureTokenCredential>);

/// No source has produced a token yet.
const NO_ACTIVE_SOURCE: usize = usize::MAX;

const IMDS_ADDR: &str = "169.254.169.254:80";

/// Off Azure, the SDK retries an unreachable IMDS for well over a minute.
/// A short TCP connect decides whether managed identity joins the chain.
const IMDS_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

pub struct AzureCredential {
    sources: Vec<Source>,
    active: AtomicUsize,
}

impl std::fmt::Debug for AzureCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureCredential")
            .field("sources", &self.source_names())
            .finish()
    }
}

impl AzureCredential {
    fn from_sources(sources: Vec<Source>, errors: &[String]) -> Result<Self, CredentialError> {
        if sources.is_empty() {
            return Err(CredentialError::Unavailable(errors.join("\n")));
        }
        if !errors.is_empty() {
            tracing::debug!(
                skipped = %errors.join("; "),
                "some credential sources are unavailable"
            );
        }
        Ok(Self {
            sources,
            active: AtomicUsize::new(NO_ACTIVE_SOURCE),
        })
    }

    /// Managed identity only. `client_id` selects a user-assigned identity.
    pub fn managed_identity(client_id: Option<String>) -> Result<Self, CredentialError> {
        let credential = managed_identity_source(client_id)?;
        Self::from_sources(vec![("ManagedIdentityCredential", credential)], &[])
    }

    /// The full chain described in the module docs. `client_id` selects a
    /// user-assigned managed identity, falling back to `AZURE_CLIENT_ID`.
    pub async fn default_chain(client_id: Option<String>) -> Result<Self, CredentialError> {
        let mut sources: Vec<Source> = Vec::new();
        let mut errors: Vec<String> = Vec::new();

        if let (Ok(tenant_id), Ok(env_client_id), Ok(client_secret)) = (
            std::env::var("AZURE_TENANT_ID"),
            std::env::var("AZURE_CLIENT_ID"),
            std::env::var("AZURE_CLIENT_SECRET"),
        ) {
            match azure_identity::ClientSecretCredential::new(
                &tenant_id,
                env_client_id,
                Secret::new(client_secret),
                None,
            ) {
                Ok(cred) => sources.push(("EnvironmentCredential", cred)),
                Err(e) => errors.push(format!("EnvironmentCredential: {e}")),
            }
        }

        match azure_identity::WorkloadIdentityCredential::new(None) {
            Ok(cred) => sources.push(("WorkloadIdentityCredential", cred)),
            Err(e) => errors.push(format!("WorkloadIdentityCredential: {e}")),
        }

        if has_managed_identity_env_vars() || imds_is_reachable().await {
            let client_id = client_id.or_else(|| std::env::var("AZURE_CLIENT_ID").ok());
            match managed_identity_source(client_id) {
                Ok(cred) => sources.push(("ManagedIdentityCredential", cred)),
                Err(e) => errors.push(format!("ManagedIdentityCredential: {e}")),
            }
        } else {
            errors.push("ManagedIdentityCredential: IMDS not reachable".to_string());
        }

        match azure_identity::DeveloperToolsCredential::new(None) {
            Ok(cred) => sources.push(("DeveloperToolsCredential", cred)),
            Err(e) => errors.push(format!("DeveloperToolsCredential: {e}")),
        }

        Self::from_sources(sources, &errors)
    }

    /// Names of the configured sources, in the order they are tried.
    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|(name, _)| *name).collect()
    }

    async fn first_token(
        &self,
        scopes: &[&str],
    ) -> Result<azure_core::credentials::AccessToken, CredentialError> {
        let active = self.active.load(Ordering::Relaxed);
        if let Some((name, source)) = self.sources.get(active) {
            tracing::trace!(source = *name, "using remembered credential source");
            return Ok(source.get_token(scopes, None).await?);
        }

        let mut errors = Vec::new();
        for (index, (name, source)) in self.sources.iter().enumerate() {
            match source.get_token(scopes, None).await {
                Ok(token) => {
                    tracing::debug!(source = *name, "authenticated with credential source");
                    self.active.store(index, Ordering::Relaxed);
                    return Ok(token);
                }
                Err(e) => {
                    tracing::trace!(source = *name, error = %e, "credential source failed");
                    errors.push(format!("{name}: {e}"));
                }
            }
        }

        Err(CredentialError::Exhausted(errors.join("\n")))
    }
}

#[async_trait]
impl TokenCredential for AzureCredential {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, CredentialError> {
        let token = self.first_token(scopes).await?;
        Ok(AccessToken::new(
            token.token.secret(),
            SystemTime::from(token.expires_on),
        ))
    }
}

fn managed_identity_source(
    client_id: Option<String>,
) -> Result<Arc<dyn AzureTokenCredential>, CredentialError> {
    let options = azure_identity::ManagedIdentityCredentialOptions {
        user_assigned_id: client_id.map(UserAssignedId::ClientId),
        client_options: Default::default(),
    };
    Ok(azure_identity::ManagedIdentityCredential::new(Some(options))?)
}

/// App Service, Service Fabric, Cloud Shell and Arc publish their identity
/// endpoint through the environment; IMDS is only the fallback.
fn has_managed_identity_env_vars() -> bool {
    std::env::var_os("IDENTITY_ENDPOINT").is_some() || std::env::var_os("MSI_ENDPOINT").is_some()
}

async fn imds_is_reachable() -> bool {
    tokio::time::timeout(IMDS_CONNECT_TIMEOUT, tokio::net::TcpStream::connect(IMDS_ADDR))
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false)
}
