//! Caller authorization.
//!
//! Callers present `Authorization: Bearer <key>`. Only SHA-256 digests of the
//! accepted keys are kept in configuration, so the config file never holds a
//! usable credential.

use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;

/// Lowercase hex SHA-256 of `key`.
pub fn digest_key(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

/// Accepted caller keys, stored as digests.
#[derive(Debug, Clone, Default)]
pub struct CallerKeys {
    digests: HashSet<String>,
}

impl CallerKeys {
    pub fn from_digests<I, S>(digests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            digests: digests
                .into_iter()
                .map(|d| d.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn verify(&self, key: &str) -> bool {
        !key.is_empty() && self.digests.contains(&digest_key(key))
    }
}

/// The credentials of a `Bearer` authorization header. The scheme name is
/// case-insensitive.
fn bearer_key(request: &Request) -> Option<&str> {
    let value = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, key) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("Bearer")
        .then(|| key.trim())
        .filter(|key| !key.is_empty())
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, [(WWW_AUTHENTICATE, "Bearer")]).into_response()
}

/// Middleware rejecting requests that don't carry an accepted caller key.
pub async fn require_caller(
    State(keys): State<Arc<CallerKeys>>,
    request: Request,
    next: Next,
) -> Response {
    let rejection = match bearer_key(&request) {
        Some(key) if keys.verify(key) => None,
        Some(_) => Some("unknown caller key"),
        None => Some("missing bearer credentials"),
    };

    match rejection {
        None => next.run(request).await,
        Some(reason) => {
            tracing::warn!(path = %request.uri().path(), reason, "caller rejected");
            unauthorized()
        }
    }
}
