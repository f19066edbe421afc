//! Access token acquisition.
//!
//! The endpoint only ever talks to a [`TokenCredential`]; the concrete
//! provider is picked at startup. Tests substitute a stub.

pub mod azure;

use async_trait::async_trait;
use std::fmt;
use std::time::{Duration, SystemTime};
use thiserror::Error;

pub use azure::AzureCredential;

/// A bearer token plus the instant it stops being valid.
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: SystemTime,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: SystemTime) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }

    /// Time left until expiry, zero if already expired.
    pub fn expires_in(&self) -> Duration {
        self.expires_on
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("azure identity error: {0}")]
    Azure(#[from] azure_core::Error),
    #[error("no credential source could be constructed:\n{0}")]
    Unavailable(String),
    #[error("all credential sources failed:\n{0}")]
    Exhausted(String),
}

/// Something that can hand out access tokens for a list of scopes.
///
/// Implementations are shared across concurrent requests, so any caching they
/// do is their own business and must be thread-safe.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, scopes: &[&str]) -> Result<AccessToken, CredentialError>;
}
