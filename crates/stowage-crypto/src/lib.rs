//! # stowage-crypto — Capability Signing
//!
//! The signing collaborator consumed by policy issuance: a [`Signer`] trait
//! plus an Ed25519 implementation.
//!
//! ## Security Invariant
//!
//! [`Signer::sign`] takes [`CanonicalBytes`](stowage_core::CanonicalBytes),
//! not raw slices. A payload that did not flow through canonical
//! serialization cannot be signed, so a verifier re-serializing the same
//! policy always recomputes the exact signed bytes.

pub mod error;
pub mod signer;

pub use error::CryptoError;
pub use signer::{Ed25519Signer, Ed25519Verifier, Signer};
