mod auth;
mod config;
mod credential;
mod origin;
mod routes;
mod state;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::CallerKeys;
use crate::config::CredentialKind;
use crate::credential::AzureCredential;
use crate::origin::OriginPolicy;
use crate::state::AppState;

/// Maps token service: hands out Azure Maps access tokens obtained through
/// the host's Azure identity.
#[derive(Parser, Debug)]
#[command(name = "maps-token-service", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut cfg = match config::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    // CLI --port overrides config
    if let Some(port) = cli.port {
        cfg.server.port = port;
    }

    let client_id = cfg.credential.client_id.clone();
    let credential = match cfg.credential.kind {
        CredentialKind::Default => AzureCredential::default_chain(client_id).await,
        CredentialKind::ManagedIdentity => AzureCredential::managed_identity(client_id),
    }
    .unwrap_or_else(|e| {
        tracing::error!("Credential setup failed: {e}");
        std::process::exit(1);
    });

    let origins = if cfg.origin.require_origin_check {
        OriginPolicy::allow_list(cfg.origin.allowed_origins.iter().cloned())
    } else {
        OriginPolicy::disabled()
    };

    tracing::info!(
        scopes = ?cfg.token.scopes,
        credential_sources = ?credential.source_names(),
        user_assigned = cfg.credential.client_id.is_some(),
        "Configuration loaded successfully"
    );
    if origins.is_enabled() {
        for prefix in &cfg.origin.allowed_origins {
            tracing::info!(prefix = %prefix, "  Allowed referer prefix");
        }
    }

    let callers = if cfg.auth.allow_anonymous {
        tracing::warn!("auth.allow_anonymous is set, tokens are served to any caller");
        None
    } else {
        tracing::info!(
            keys = cfg.auth.api_key_sha256.len(),
            "Caller authorization enabled"
        );
        Some(Arc::new(CallerKeys::from_digests(&cfg.auth.api_key_sha256)))
    };

    let state = AppState::new(Arc::new(credential), cfg.token.scopes.clone(), origins);
    let app = routes::router(state, callers);

    let bind_addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    tracing::info!("Listening on {bind_addr}");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind to {bind_addr}: {e}");
            std::process::exit(1);
        });

    axum::serve(listener, app).await.unwrap_or_else(|e| {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    });
}
