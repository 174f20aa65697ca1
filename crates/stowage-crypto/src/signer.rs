//! # Ed25519 Signing and Verification
//!
//! Signs serialized capability policies so the server can verify that a
//! grant was minted by a key it trusts. Verification of incoming requests
//! happens server-side; the client-side [`Ed25519Verifier`] exists for key
//! management tooling and tests.

use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use rand_core::OsRng;
use stowage_core::CanonicalBytes;

use crate::error::CryptoError;

/// Signs canonical payloads on behalf of policy issuance.
///
/// Implementations must be safe to share across threads; a single signer is
/// held by the client context and used from every issuing call site.
pub trait Signer: Send + Sync {
    /// Sign the canonical payload, returning raw signature bytes.
    fn sign(&self, payload: &CanonicalBytes) -> Result<Vec<u8>, CryptoError>;
}

/// An Ed25519 signing (private) key.
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    /// Generate a fresh signing key from the operating system RNG.
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Construct a signer from raw secret key bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(bytes),
        }
    }

    /// The verifier matching this signing key.
    pub fn verifier(&self) -> Ed25519Verifier {
        Ed25519Verifier {
            key: self.key.verifying_key(),
        }
    }
}

impl Signer for Ed25519Signer {
    fn sign(&self, payload: &CanonicalBytes) -> Result<Vec<u8>, CryptoError> {
        let signature = self.key.sign(payload.as_bytes());
        Ok(signature.to_bytes().to_vec())
    }
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The secret key never reaches log output.
        f.debug_struct("Ed25519Signer")
            .field("public_key", &self.key.verifying_key())
            .finish()
    }
}

/// An Ed25519 verifying (public) key.
#[derive(Debug, Clone)]
pub struct Ed25519Verifier {
    key: VerifyingKey,
}

impl Ed25519Verifier {
    /// Construct a verifier from raw public key bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let key = VerifyingKey::from_bytes(bytes)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Self { key })
    }

    /// Raw public key bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.key.to_bytes()
    }

    /// Verify a signature over a canonical payload.
    pub fn verify(&self, payload: &CanonicalBytes, signature: &[u8]) -> Result<(), CryptoError> {
        let signature = Signature::from_slice(signature)
            .map_err(|_| CryptoError::InvalidSignatureLength(signature.len()))?;
        self.key
            .verify_strict(payload.as_bytes(), &signature)
            .map_err(|e| CryptoError::VerificationFailed(e.to_string()))
    }
}
