//! # Canonical Serialization
//!
//! This module defines [`CanonicalBytes`], the sole construction path for
//! bytes that get signed anywhere in the workspace.
//!
//! ## Invariant
//!
//! The inner `Vec<u8>` is private. The only way to construct `CanonicalBytes`
//! is through [`CanonicalBytes::new()`], which serializes with sorted object
//! keys and compact separators. A capability verifier re-serializing the same
//! policy must reproduce byte-identical output, or the signature check fails.
//!
//! ## Rules
//!
//! 1. Reject floats — a float formatted two different ways would split the
//!    byte stream; epoch timestamps and sizes are integers.
//! 2. Sort object keys lexicographically.
//! 3. Use compact separators (no whitespace).

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by deterministic JSON serialization.
///
/// The inner `Vec<u8>` is private — downstream code cannot construct
/// `CanonicalBytes` except through [`CanonicalBytes::new()`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// This is the ONLY way to construct `CanonicalBytes`. Every payload that
    /// gets signed must flow through this constructor.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        reject_floats(&value)?;
        // serde_json::Map is backed by a BTreeMap (the `preserve_order`
        // feature is not enabled anywhere in this workspace), so object keys
        // serialize in sorted order, and `to_vec` is compact by default.
        Ok(Self(serde_json::to_vec(&value)?))
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume and return the inner byte vector.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Recursively reject float values anywhere in the JSON tree.
fn reject_floats(value: &Value) -> Result<(), CanonicalizationError> {
    match value {
        Value::Number(n) => {
            if n.is_f64() && !n.is_i64() && !n.is_u64() {
                // as_f64 always succeeds for an f64-only number.
                return Err(CanonicalizationError::FloatRejected(
                    n.as_f64().unwrap_or(f64::NAN),
                ));
            }
            Ok(())
        }
        Value::Object(map) => map.values().try_for_each(reject_floats),
        Value::Array(arr) => arr.iter().try_for_each(reject_floats),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Grant {
        zebra: u32,
        alpha: String,
    }

    #[test]
    fn keys_serialize_sorted() {
        let bytes = CanonicalBytes::new(&Grant {
            zebra: 1,
            alpha: "a".into(),
        })
        .unwrap();
        assert_eq!(bytes.as_bytes(), br#"{"alpha":"a","zebra":1}"#);
    }

    #[test]
    fn reserialization_is_byte_identical() {
        let grant = Grant {
            zebra: 7,
            alpha: "hello".into(),
        };
        let first = CanonicalBytes::new(&grant).unwrap();
        let second = CanonicalBytes::new(&grant).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn floats_are_rejected() {
        let value = serde_json::json!({"expires": 1.5});
        let err = CanonicalBytes::new(&value).unwrap_err();
        assert!(matches!(err, CanonicalizationError::FloatRejected(_)));
    }

    #[test]
    fn nested_floats_are_rejected() {
        let value = serde_json::json!({"outer": {"inner": [1, 2.5]}});
        assert!(CanonicalBytes::new(&value).is_err());
    }

    #[test]
    fn integers_pass_through() {
        let value = serde_json::json!({"expires": 1754265600i64, "size": 0});
        assert!(CanonicalBytes::new(&value).is_ok());
    }
}
