//! Client error types.
//!
//! One taxonomy for every operation: configuration and signing failures are
//! fatal and never retried; conditional-request races are retried inside the
//! read-modify-write controller and surface as [`ClientError::Conflict`]
//! only after the attempt budget is exhausted; transport errors propagate
//! unmodified; other non-2xx responses surface the body text verbatim.

use stowage_cache::CacheError;
use stowage_core::CanonicalizationError;
use stowage_crypto::CryptoError;

use crate::config::ConfigError;

/// Errors from stowage client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Configuration was invalid or incomplete.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Policy signing failed during issuance.
    #[error("policy signing failed: {0}")]
    Signing(#[from] CryptoError),

    /// Policy serialization failed during issuance.
    #[error("policy canonicalization failed: {0}")]
    Canonical(#[from] CanonicalizationError),

    /// The remote object does not exist.
    #[error("object not found: {url}")]
    NotFound {
        /// The canonical URL that was requested.
        url: String,
    },

    /// A read-modify-write cycle lost every race within its attempt budget.
    #[error("conflicting writes to {url}: gave up after {attempts} attempts")]
    Conflict {
        /// The canonical URL under contention.
        url: String,
        /// How many full attempts were made.
        attempts: u32,
    },

    /// HTTP transport failure, propagated unmodified.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server returned a non-2xx status outside the conditional-request
    /// vocabulary. The body text is surfaced verbatim.
    #[error("server returned {status}: {body}")]
    Server {
        /// Numeric HTTP status.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// Response deserialization failed.
    #[error("failed to deserialize response from {url}: {source}")]
    Deserialization {
        /// The canonical URL that was requested.
        url: String,
        /// The underlying decode failure.
        source: reqwest::Error,
    },

    /// A path template referenced a parameter that was never bound.
    #[error("unbound template parameter `{key}` in `{template}`")]
    Template {
        /// The unbound parameter name.
        key: String,
        /// The template being expanded.
        template: String,
    },

    /// A success response carried no usable generation token.
    #[error("response for {url} carried no usable ETag generation")]
    MissingGeneration {
        /// The canonical URL that was requested.
        url: String,
    },

    /// A computed header value was not valid HTTP header text.
    #[error("invalid header value for {name}")]
    Header {
        /// The header that could not be constructed.
        name: &'static str,
    },

    /// Local cache operation failed.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Local filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
