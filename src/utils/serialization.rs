// src/utils/serialization.rs
//! Canonical serialization for signing.
//!
//! Produces the byte sequence that signers and verifiers both hash. The output
//! is compact JSON with object keys sorted by raw key string at every nesting
//! level, arrays in their original order, integral numbers in plain decimal and
//! other numbers in shortest round-trip form. Exponents are written with an
//! explicit sign (`1e+21`, `1e-7`), the form JavaScript `JSON.stringify` uses.
//! Identical logical content always yields identical bytes, whatever order keys
//! were inserted in.

use serde::Serialize;
use std::fmt::Write;

use crate::error::{VcError, VcResult};
use crate::models::credential::ClaimValue;

/// Largest magnitude at which an integral float is still written as an integer.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Canonicalizes any serializable value.
///
/// # Errors
/// Returns [`VcError::Encoding`] if the value cannot be represented as JSON,
/// including non-finite numbers and maps with non-string keys.
pub fn canonicalize<T: Serialize + ?Sized>(value: &T) -> VcResult<Vec<u8>> {
    let json = serde_json::to_value(value).map_err(|e| VcError::Encoding(e.to_string()))?;
    canonicalize_claim(&ClaimValue::from(json))
}

/// Canonicalizes a claim value tree.
pub fn canonicalize_claim(value: &ClaimValue) -> VcResult<Vec<u8>> {
    let mut out = String::new();
    write_value(value, &mut out)?;
    Ok(out.into_bytes())
}

fn write_value(value: &ClaimValue, out: &mut String) -> VcResult<()> {
    match value {
        ClaimValue::Null => out.push_str("null"),
        ClaimValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        ClaimValue::Integer(i) => {
            let _ = write!(out, "{}", i);
        }
        ClaimValue::Float(f) => write_float(*f, out)?,
        ClaimValue::String(s) => write_string(s, out)?,
        ClaimValue::List(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_value(item, out)?;
            }
            out.push(']');
        }
        ClaimValue::Map(entries) => {
            // BTreeMap iterates in byte-wise key order.
            out.push('{');
            for (index, (key, item)) in entries.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_string(key, out)?;
                out.push(':');
                write_value(item, out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn write_float(f: f64, out: &mut String) -> VcResult<()> {
    if !f.is_finite() {
        return Err(VcError::Encoding(format!(
            "non-finite number {} is not representable",
            f
        )));
    }
    if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
        let _ = write!(out, "{}", f as i64);
    } else {
        let text = serde_json::to_string(&f).map_err(|e| VcError::Encoding(e.to_string()))?;
        match text.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with(['-', '+']) => {
                let _ = write!(out, "{}e+{}", mantissa, exponent);
            }
            _ => out.push_str(&text),
        }
    }
    Ok(())
}

fn write_string(s: &str, out: &mut String) -> VcResult<()> {
    let text = serde_json::to_string(s).map_err(|e| VcError::Encoding(e.to_string()))?;
    out.push_str(&text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credential::ClaimMap;
    use serde_json::json;
    use std::collections::HashMap;

    fn canonical_str(value: serde_json::Value) -> String {
        String::from_utf8(canonicalize(&value).unwrap()).unwrap()
    }

    #[test]
    fn test_sorted_keys_compact() {
        assert_eq!(
            canonical_str(json!({"b": 2, "a": 1, "c": "hello"})),
            r#"{"a":1,"b":2,"c":"hello"}"#
        );
    }

    #[test]
    fn test_nested_objects_sorted_arrays_kept() {
        assert_eq!(
            canonical_str(json!({"outer": {"z": [3, 2, 1], "a": {"y": 1, "x": 2}}, "list": []})),
            r#"{"list":[],"outer":{"a":{"x":2,"y":1},"z":[3,2,1]}}"#
        );
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut first = HashMap::new();
        first.insert("name", "Alice");
        first.insert("email", "alice@example.com");
        first.insert("age", "30");

        let mut second = HashMap::new();
        second.insert("age", "30");
        second.insert("name", "Alice");
        second.insert("email", "alice@example.com");

        assert_eq!(canonicalize(&first).unwrap(), canonicalize(&second).unwrap());
    }

    #[test]
    fn test_number_forms() {
        assert_eq!(
            canonical_str(json!([1.0, -0.0, 2.5, 1e21, -7, 1.5e-7])),
            "[1,0,2.5,1e+21,-7,1.5e-7]"
        );
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(canonical_str(json!({"q": "a\"b\n"})), r#"{"q":"a\"b\n"}"#);
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut map = ClaimMap::new();
        map.insert("score".into(), ClaimValue::Float(f64::NAN));
        let err = canonicalize_claim(&ClaimValue::Map(map.clone())).unwrap_err();
        assert!(matches!(err, VcError::Encoding(_)));

        // Through the generic path, the claim's own serializer rejects it.
        let err = canonicalize(&map).unwrap_err();
        assert!(matches!(err, VcError::Encoding(_)));
    }

    #[test]
    fn test_non_string_keys_rejected() {
        let mut map = HashMap::new();
        map.insert(vec![1u8], 1);
        assert!(matches!(canonicalize(&map), Err(VcError::Encoding(_))));
    }
}
