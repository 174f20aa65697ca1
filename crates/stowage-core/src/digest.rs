//! # Content Digests
//!
//! SHA-256 digests used for cache addressing: canonical URLs and generation
//! tokens are arbitrary strings, and their digests give fixed-width,
//! filesystem-safe names.

use sha2::{Digest, Sha256};

/// A raw 32-byte SHA-256 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Return the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}

/// Compute the SHA-256 digest of a byte slice.
pub fn sha256_digest(data: &[u8]) -> ContentDigest {
    ContentDigest(Sha256::digest(data).into())
}

/// Compute the SHA-256 digest of a byte slice as a lowercase hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    sha256_digest(data).to_hex()
}
