//! Capability policies.
//!
//! A policy is a scoped, time-limited grant: a path prefix the holder may
//! touch, the methods it may use, an expiry, and a visibility flag. The
//! server receives the serialized policy and its signature with every
//! request and enforces the grant; the client's job is to mint the blob
//! deterministically so the server-side verifier can recompute the exact
//! signed bytes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use stowage_core::{CanonicalBytes, CanonicalizationError};

/// Grant lifetime applied when issuance does not specify an expiry.
pub const DEFAULT_EXPIRY_SECS: i64 = 60 * 60 * 24 * 7;

/// An HTTP method a capability policy may allow.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Read access.
    Get,
    /// Submit access.
    Post,
    /// Write access.
    Put,
}

/// A scoped, time-limited access grant.
///
/// Immutable once constructed. The `methods` field is an ordered set so that
/// serialization is deterministic regardless of the order issuance listed
/// them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityPolicy {
    /// The path prefix this grant is confined to. Always absolute.
    pub path_prefix: String,
    /// The path template expanded under the prefix.
    pub path_template: String,
    /// Expiry as epoch seconds.
    pub expires: i64,
    /// The methods this grant allows. Never empty.
    pub methods: BTreeSet<Method>,
    /// Whether uploaded objects are publicly readable.
    pub public: bool,
}

impl CapabilityPolicy {
    /// Serialize the policy into the bytes that get signed.
    pub fn to_canonical(&self) -> Result<CanonicalBytes, CanonicalizationError> {
        CanonicalBytes::new(self)
    }
}

/// Parameters for minting a new capability policy.
///
/// Unset fields fall back to issuance defaults: read/write methods, a
/// seven-day expiry, the root template, private visibility.
#[derive(Debug, Clone)]
pub struct IssueRequest {
    /// The path prefix to confine the grant to.
    pub path_prefix: String,
    /// The path template expanded under the prefix.
    pub path_template: String,
    /// Allowed methods; `None` means the {GET, PUT} default.
    pub methods: Option<Vec<Method>>,
    /// Expiry as epoch seconds; `None` means now + seven days.
    pub expires: Option<i64>,
    /// Whether uploaded objects are publicly readable.
    pub public: bool,
}

impl IssueRequest {
    /// A request for the given prefix with every other field defaulted.
    pub fn new(path_prefix: impl Into<String>) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            path_template: "/".to_string(),
            methods: None,
            expires: None,
            public: false,
        }
    }

    /// Override the path template.
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.path_template = template.into();
        self
    }

    /// Override the allowed methods.
    pub fn methods(mut self, methods: impl Into<Vec<Method>>) -> Self {
        self.methods = Some(methods.into());
        self
    }

    /// Override the expiry.
    pub fn expires_at(mut self, epoch_secs: i64) -> Self {
        self.expires = Some(epoch_secs);
        self
    }

    /// Mark uploaded objects publicly readable.
    pub fn public(mut self) -> Self {
        self.public = true;
        self
    }
}
