pub mod token;

use axum::routing::get;
use axum::{middleware, Router};
use std::sync::Arc;

use crate::auth::{self, CallerKeys};
use crate::state::AppState;

/// Build the application router. With `callers` set, every route requires an
/// accepted caller key; `None` serves anonymously.
pub fn router(state: AppState, callers: Option<Arc<CallerKeys>>) -> Router {
    let app = Router::new()
        // Token endpoint
        .route("/api/token", get(token::token))
        .with_state(state);

    match callers {
        Some(keys) => app.route_layer(middleware::from_fn_with_state(keys, auth::require_caller)),
        None => app,
    }
}
