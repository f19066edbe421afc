use std::sync::Arc;

use crate::credential::TokenCredential;
use crate::origin::OriginPolicy;

/// Read-only state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub credential: Arc<dyn TokenCredential>,
    pub scopes: Arc<[String]>,
    pub origins: Arc<OriginPolicy>,
}

impl AppState {
    pub fn new(
        credential: Arc<dyn TokenCredential>,
        scopes: Vec<String>,
        origins: OriginPolicy,
    ) -> Self {
        Self {
            credential,
            scopes: scopes.into(),
            origins: Arc::new(origins),
        }
    }
}
