use axum::extract::State;
use axum::http::header::REFERER;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::credential::CredentialError;
use crate::origin::OriginRejection;
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("origin check failed: {0}")]
    Origin(#[from] OriginRejection),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        // Bodies stay empty; details only go to the log.
        match self {
            TokenError::Origin(_) => StatusCode::UNAUTHORIZED.into_response(),
            TokenError::Credential(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

/// GET /api/token: issue a maps access token as plain text
pub async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<String, TokenError> {
    if let Err(rejection) = state.origins.check(&headers) {
        tracing::warn!(
            reason = %rejection,
            referer = ?headers.get(REFERER),
            "token request rejected"
        );
        return Err(rejection.into());
    }

    let scopes: Vec<&str> = state.scopes.iter().map(String::as_str).collect();
    let access_token = state.credential.get_token(&scopes).await.map_err(|e| {
        tracing::error!(error = %e, "failed to acquire access token");
        TokenError::from(e)
    })?;

    tracing::debug!(
        expires_in_secs = access_token.expires_in().as_secs(),
        "access token issued"
    );

    Ok(access_token.token)
}
