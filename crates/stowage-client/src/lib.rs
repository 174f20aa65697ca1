//! # stowage-client — Capability-Scoped Versioned Object Storage
//!
//! A client-side handle that treats a remote HTTP endpoint as a versioned
//! object-storage location. It mints time-limited, scope-restricted access
//! grants ("capability policies"), performs conditional reads and writes
//! against a server speaking ETag generation tokens, keeps a local disk
//! cache keyed by URL + generation, and layers an optimistic-concurrency
//! read-modify-write protocol on top of conditional HTTP semantics.
//!
//! ## Architecture
//!
//! [`StowageClient`] is the explicit context: it owns the configuration,
//! the pooled blocking transport, the generation cache, and the signing
//! key, and hands out immutable [`Location`] values wired to those shared
//! collaborators. Nothing is looked up from ambient process state.
//!
//! The protocol is synchronous — each call blocks its thread for the
//! duration of the request, and the transport's bounded pool blocks
//! additional callers instead of failing them, so concurrency comes from
//! the caller's own threads.

pub mod config;
pub mod error;
pub mod location;
pub mod policy;
pub mod rmw;
pub mod transport;

pub use config::{AgentConfig, ConfigError};
pub use error::ClientError;
pub use location::{Location, LocationStat, RequestParts};
pub use policy::{CapabilityPolicy, IssueRequest, Method, DEFAULT_EXPIRY_SECS};
pub use rmw::BackoffPolicy;
pub use stowage_core::Status;
pub use transport::PooledTransport;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use stowage_cache::GenerationCache;
use stowage_crypto::Signer;

/// Top-level client context.
///
/// Owns the transport, cache, and signer; every [`Location`] it produces
/// shares them. Construct one per server endpoint and reuse it across
/// threads.
pub struct StowageClient {
    config: AgentConfig,
    transport: Arc<PooledTransport>,
    cache: Arc<dyn GenerationCache>,
    signer: Arc<dyn Signer>,
}

impl StowageClient {
    /// Build a client context from configuration and its collaborators.
    pub fn new(
        config: AgentConfig,
        signer: Arc<dyn Signer>,
        cache: Arc<dyn GenerationCache>,
    ) -> Result<Self, ClientError> {
        let transport = Arc::new(PooledTransport::new(
            Duration::from_secs(config.timeout_secs),
            config.pool_size,
        )?);
        Ok(Self {
            config,
            transport,
            cache,
            signer,
        })
    }

    /// The configuration this context was built from.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Mint a signed capability policy and the [`Location`] carrying it.
    ///
    /// The path prefix is forced absolute; unset fields take the issuance
    /// defaults (methods {GET, PUT}, expiry now + seven days, template `/`,
    /// private). Issuance has no partial-success state: a signing failure
    /// produces no `Location`.
    pub fn issue(&self, request: IssueRequest) -> Result<Location, ClientError> {
        let mut path_prefix = request.path_prefix;
        if !path_prefix.starts_with('/') {
            path_prefix.insert(0, '/');
        }

        let methods: BTreeSet<Method> = match request.methods {
            None => [Method::Get, Method::Put].into_iter().collect(),
            Some(listed) => {
                if listed.is_empty() {
                    return Err(ClientError::Configuration(ConfigError::Invalid(
                        "a capability policy needs at least one method".into(),
                    )));
                }
                listed.into_iter().collect()
            }
        };

        let expires = request
            .expires
            .unwrap_or_else(|| Utc::now().timestamp() + DEFAULT_EXPIRY_SECS);

        let policy = CapabilityPolicy {
            path_prefix: path_prefix.clone(),
            path_template: request.path_template.clone(),
            expires,
            methods,
            public: request.public,
        };

        let canonical = policy.to_canonical()?;
        let signature = self.signer.sign(&canonical)?;

        tracing::debug!(path_prefix = %path_prefix, expires, "issued capability policy");
        Ok(Location::new(
            self.config.base_url.clone(),
            path_prefix,
            request.path_template,
            canonical.into_bytes(),
            signature,
            self.config.identity(),
            Arc::clone(&self.transport),
            Arc::clone(&self.cache),
        ))
    }

    /// Re-hydrate a [`Location`] from a grant minted elsewhere.
    ///
    /// Agents usually receive their locations pre-signed from the server;
    /// the policy blob and signature arrive as opaque bytes and are carried
    /// verbatim on every request.
    pub fn location(
        &self,
        path_prefix: impl Into<String>,
        path_template: impl Into<String>,
        policy: Vec<u8>,
        signature: Vec<u8>,
    ) -> Location {
        Location::new(
            self.config.base_url.clone(),
            path_prefix.into(),
            path_template.into(),
            policy,
            signature,
            self.config.identity(),
            Arc::clone(&self.transport),
            Arc::clone(&self.cache),
        )
    }
}

impl std::fmt::Debug for StowageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StowageClient")
            .field("config", &self.config)
            .finish()
    }
}
