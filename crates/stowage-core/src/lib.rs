#![deny(missing_docs)]

//! # stowage-core — Foundational Types for the Stowage Client
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies — only `serde`, `serde_json`,
//! `thiserror`, `sha2`, and `hex` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **[`CanonicalBytes`] is the sole path to signed payloads.** Every blob
//!    that gets signed flows through `CanonicalBytes::new()`, which serializes
//!    with sorted keys and compact separators so a verifier can recompute the
//!    exact same bytes.
//!
//! 2. **[`ContentDigest`] for cache addressing.** URLs and generation tokens
//!    become fixed-width filesystem names through one digest function.
//!
//! 3. **Structured errors with `thiserror`.** No `Box<dyn Error>`, no
//!    `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod status;

// Re-export primary types at crate root for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, sha256_hex, ContentDigest};
pub use error::CanonicalizationError;
pub use status::Status;
