use serde::Deserialize;
use std::path::Path;

/// Top-level configuration parsed from TOML.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub origin: OriginConfig,
    #[serde(default)]
    pub credential: CredentialConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server-level configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Which resource the issued tokens are for.
#[derive(Debug, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            scopes: default_scopes(),
        }
    }
}

fn default_scopes() -> Vec<String> {
    vec!["https://atlas.microsoft.com/.default".to_string()]
}

/// Referer allow-list. Off unless `require_origin_check` is set.
#[derive(Debug, Deserialize)]
pub struct OriginConfig {
    #[serde(default)]
    pub require_origin_check: bool,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            require_origin_check: false,
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "https://navatron-maps.azurewebsites.net/".to_string(),
        "https://localhost".to_string(),
    ]
}

/// Which Azure credential sources are tried.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Environment service principal, workload identity, managed identity,
    /// then developer tools.
    #[default]
    Default,
    ManagedIdentity,
}

/// Azure identity settings.
#[derive(Debug, Deserialize, Default)]
pub struct CredentialConfig {
    #[serde(default)]
    pub kind: CredentialKind,
    /// Client ID of a user-assigned managed identity. System-assigned when unset.
    #[serde(default)]
    pub client_id: Option<String>,
}

/// Caller authorization.
#[derive(Debug, Deserialize, Default)]
pub struct AuthConfig {
    /// Serve tokens without checking callers. Only sensible behind another
    /// authenticating proxy.
    #[serde(default)]
    pub allow_anonymous: bool,
    /// Hex SHA-256 digests of accepted caller keys.
    #[serde(default)]
    pub api_key_sha256: Vec<String>,
}

/// Load and validate config from a TOML file, applying environment variable overrides.
pub fn load_config(path: &Path) -> Result<Config, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

    let mut config: Config =
        toml::from_str(&content).map_err(|e| format!("Failed to parse TOML config: {e}"))?;

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate(&config)?;

    Ok(config)
}

/// Apply environment variable overrides, reading variables through `lookup`.
fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    // MAPS_TOKEN_CLIENT_ID overrides credential.client_id
    if let Some(val) = lookup("MAPS_TOKEN_CLIENT_ID") {
        config.credential.client_id = Some(val);
    }

    // MAPS_TOKEN_API_KEY_SHA256 (comma separated) replaces auth.api_key_sha256
    if let Some(val) = lookup("MAPS_TOKEN_API_KEY_SHA256") {
        config.auth.api_key_sha256 = val
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect();
    }
}

/// Validate the entire configuration. Returns an error string on failure.
fn validate(config: &Config) -> Result<(), String> {
    validate_token(&config.token)?;
    validate_origin(&config.origin)?;
    validate_credential(&config.credential)?;
    validate_auth(&config.auth)?;
    Ok(())
}

fn validate_token(token: &TokenConfig) -> Result<(), String> {
    // Managed identity issues tokens for a single resource
    if token.scopes.len() != 1 {
        return Err(format!(
            "token.scopes must contain exactly one scope (got {})",
            token.scopes.len()
        ));
    }
    if token.scopes.iter().any(|s| s.trim().is_empty()) {
        return Err("token.scopes must not contain empty entries".to_string());
    }
    Ok(())
}

fn validate_origin(origin: &OriginConfig) -> Result<(), String> {
    if !origin.require_origin_check {
        return Ok(());
    }

    if origin.allowed_origins.is_empty() {
        return Err(
            "origin.allowed_origins must not be empty when origin.require_origin_check is enabled"
                .to_string(),
        );
    }

    for entry in &origin.allowed_origins {
        if !entry.starts_with("http://") && !entry.starts_with("https://") {
            return Err(format!(
                "origin.allowed_origins entry '{entry}' must start with http:// or https://"
            ));
        }
    }

    Ok(())
}

fn validate_credential(credential: &CredentialConfig) -> Result<(), String> {
    if let Some(client_id) = &credential.client_id {
        if client_id.trim().is_empty() {
            return Err("credential.client_id must not be empty when set".to_string());
        }
    }

    Ok(())
}

fn validate_auth(auth: &AuthConfig) -> Result<(), String> {
    if auth.allow_anonymous {
        return Ok(());
    }

    if auth.api_key_sha256.is_empty() {
        return Err(
            "auth.api_key_sha256 needs at least one entry (or set auth.allow_anonymous = true). Generate with: printf %s \"$KEY\" | sha256sum"
                .to_string(),
        );
    }

    for digest in &auth.api_key_sha256 {
        if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(format!(
                "auth.api_key_sha256 entry '{digest}' is not a hex SHA-256 digest (64 hex characters)"
            ));
        }
    }

    Ok(())
}
