//! Agent configuration.
//!
//! Identifies the server endpoint and this agent's identity fields. Defaults
//! suit a locally deployed server; override via environment variables or
//! explicit construction.

use url::Url;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default bound on concurrent in-flight requests through one transport.
const DEFAULT_POOL_SIZE: usize = 10;

/// Configuration for a stowage client context.
///
/// Custom `Debug` implementation redacts the `nonce` field: the nonce is
/// capability material that ends up in signed request paths and must not
/// leak into log output.
#[derive(Clone)]
pub struct AgentConfig {
    /// Base URL of the object-storage server.
    pub base_url: Url,
    /// This agent's client id, substituted into path templates.
    pub client_id: String,
    /// This agent's enrollment nonce, substituted into path templates.
    pub nonce: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum concurrent in-flight requests; further callers block.
    pub pool_size: usize,
}

impl std::fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("nonce", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

impl AgentConfig {
    /// Create a configuration with default timeout and pool size.
    pub fn new(
        base_url: Url,
        client_id: impl Into<String>,
        nonce: impl Into<String>,
    ) -> Self {
        Self {
            base_url,
            client_id: client_id.into(),
            nonce: nonce.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `STOWAGE_BASE_URL` (required)
    /// - `STOWAGE_CLIENT_ID` (required)
    /// - `STOWAGE_NONCE` (required)
    /// - `STOWAGE_TIMEOUT_SECS` (default: 30)
    /// - `STOWAGE_POOL_SIZE` (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_base = std::env::var("STOWAGE_BASE_URL")
            .map_err(|_| ConfigError::MissingVar("STOWAGE_BASE_URL"))?;
        let base_url = Url::parse(&raw_base)
            .map_err(|e| ConfigError::InvalidUrl("STOWAGE_BASE_URL".into(), e.to_string()))?;

        Ok(Self {
            base_url,
            client_id: std::env::var("STOWAGE_CLIENT_ID")
                .map_err(|_| ConfigError::MissingVar("STOWAGE_CLIENT_ID"))?,
            nonce: std::env::var("STOWAGE_NONCE")
                .map_err(|_| ConfigError::MissingVar("STOWAGE_NONCE"))?,
            timeout_secs: env_parse("STOWAGE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
            pool_size: env_parse("STOWAGE_POOL_SIZE", DEFAULT_POOL_SIZE),
        })
    }

    /// The identity fields merged into every path-template expansion.
    pub(crate) fn identity(&self) -> AgentIdentity {
        AgentIdentity {
            client_id: self.client_id.clone(),
            nonce: self.nonce.clone(),
        }
    }
}

/// The agent identity fields carried by each `Location`.
#[derive(Clone)]
pub(crate) struct AgentIdentity {
    pub(crate) client_id: String,
    pub(crate) nonce: String,
}

impl std::fmt::Debug for AgentIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentIdentity")
            .field("client_id", &self.client_id)
            .field("nonce", &"[REDACTED]")
            .finish()
    }
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is unset.
    #[error("{0} environment variable is required")]
    MissingVar(&'static str),
    /// A URL-valued setting failed to parse.
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    /// A setting failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
