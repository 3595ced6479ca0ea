//! # JSON Canonicalization Scheme (RFC 8785)
//!
//! Implements JCS: object keys are sorted lexicographically by UTF-16 code
//! unit at every level, numbers serialize per ECMA-262 `ToString`, strings
//! escape per the JSON spec, and no insignificant whitespace is emitted.
//! `@context` arrays are **not** sorted — JCS only orders object keys, never
//! array elements, so issuer-declared context ordering survives unchanged.

use serde_json::Value;

use crate::error::{Error, Result};

/// Canonicalize a JSON value per RFC 8785, returning the canonical byte
/// sequence used as a signing input.
///
/// # Errors
///
/// Returns [`Error::Canonicalization`] if the value contains a non-finite
/// number (`NaN`/`Infinity`, unrepresentable in JSON) or any other value
/// `serde_json` cannot itself have produced from valid JSON (in practice
/// this only triggers on hand-built `Value::Number` instances).
pub fn canonicalize(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

/// Convenience wrapper returning a `String` rather than raw bytes, for
/// diagnostics and tests. The underlying bytes are always valid UTF-8.
pub fn canonicalize_to_string(value: &Value) -> Result<String> {
    let bytes = canonicalize(value)?;
    String::from_utf8(bytes)
        .map_err(|e| Error::Canonicalization { message: format!("non-utf8 output: {e}") })
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Null => {
            out.extend_from_slice(b"null");
            Ok(())
        }
        Value::Bool(b) => {
            out.extend_from_slice(if *b { b"true" } else { b"false" });
            Ok(())
        }
        Value::Number(n) => write_number(n, out),
        Value::String(s) => {
            write_json_string(s, out);
            Ok(())
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
            Ok(())
        }
        Value::Object(map) => {
            out.push(b'{');
            let mut keys: Vec<&String> = map.keys().collect();
            // Lexicographic by UTF-16 code unit: for the BMP (the overwhelming
            // common case) this coincides with ordering by `char`, which in
            // turn coincides with byte-wise ordering of UTF-8. We fall back to
            // an explicit UTF-16 comparison so surrogate-pair (non-BMP) keys
            // sort per spec rather than per UTF-8 byte order.
            keys.sort_by(|a, b| utf16_cmp(a, b));
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_json_string(key, out);
                out.push(b':');
                write_canonical(&map[*key], out)?;
            }
            out.push(b'}');
            Ok(())
        }
    }
}

fn utf16_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

fn write_number(n: &serde_json::Number, out: &mut Vec<u8>) -> Result<()> {
    if let Some(i) = n.as_i64() {
        out.extend_from_slice(i.to_string().as_bytes());
        return Ok(());
    }
    if let Some(u) = n.as_u64() {
        out.extend_from_slice(u.to_string().as_bytes());
        return Ok(());
    }
    let f = n.as_f64().ok_or_else(|| Error::Canonicalization {
        message: "number is not representable as f64".into(),
    })?;
    if !f.is_finite() {
        return Err(Error::Canonicalization {
            message: "non-finite number cannot be canonicalized".into(),
        });
    }
    out.extend_from_slice(ecma262_to_string(f).as_bytes());
    Ok(())
}

/// Renders an `f64` the way `ECMA-262 ToString` (and therefore every
/// JCS-conformant JSON serializer) would: the shortest decimal string that
/// round-trips, without a trailing `.0` for integral values, using
/// exponential notation outside `1e-6..1e21`.
fn ecma262_to_string(f: f64) -> String {
    if f == 0.0 {
        return if f.is_sign_negative() { "-0".to_string() } else { "0".to_string() };
    }
    // `{:?}` on f64 in Rust already produces the shortest round-tripping
    // decimal (Grisu/Ryu-based), matching ECMA-262's intent; we just need to
    // reshape integral values (`"3.0"` -> `"3"`) and exponent formatting
    // (`"1e30"` vs Rust's `"1e30"` — Rust's Debug never emits exponents for
    // f64, so we detect the ECMA-262 exponential range ourselves).
    let abs = f.abs();
    if abs >= 1e21 || (abs < 1e-6 && abs > 0.0) {
        return format_exponential(f);
    }
    let s = format!("{f:?}");
    if let Some(stripped) = s.strip_suffix(".0") {
        stripped.to_string()
    } else {
        s
    }
}

fn format_exponential(f: f64) -> String {
    let s = format!("{f:e}");
    // Rust renders `1.5e2`; ECMA-262 wants `1.5e+2` for positive exponents.
    if let Some(idx) = s.find('e') {
        let (mantissa, exp) = s.split_at(idx);
        let exp_digits = &exp[1..];
        if let Some(stripped) = exp_digits.strip_prefix('-') {
            format!("{mantissa}e-{stripped}")
        } else {
            format!("{mantissa}e+{exp_digits}")
        }
    } else {
        s
    }
}

fn write_json_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\u{0008}' => out.extend_from_slice(b"\\b"),
            '\u{000C}' => out.extend_from_slice(b"\\f"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn sorts_object_keys() {
        let v = json!({"b": 1, "a": 2});
        assert_eq!(canonicalize_to_string(&v).unwrap(), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn nested_objects_sort_at_every_level() {
        let v = json!({"z": {"y": 1, "x": 2}, "a": 1});
        assert_eq!(canonicalize_to_string(&v).unwrap(), r#"{"a":1,"z":{"x":2,"y":1}}"#);
    }

    #[test]
    fn preserves_array_order() {
        let v = json!({"@context": ["https://b", "https://a"]});
        assert_eq!(
            canonicalize_to_string(&v).unwrap(),
            r#"{"@context":["https://b","https://a"]}"#
        );
    }

    #[test]
    fn no_insignificant_whitespace() {
        let v = json!({"a": [1, 2, 3], "b": "x"});
        let s = canonicalize_to_string(&v).unwrap();
        assert!(!s.contains(' '));
        assert!(!s.contains('\n'));
    }

    #[test]
    fn escapes_control_characters() {
        let v = json!({"a": "line1\nline2\ttab"});
        assert_eq!(canonicalize_to_string(&v).unwrap(), r#"{"a":"line1\nline2\ttab"}"#);
    }

    #[test]
    fn large_numbers_use_exponential_notation() {
        let v = json!({"n": 1e30});
        assert_eq!(canonicalize_to_string(&v).unwrap(), r#"{"n":1e+30}"#);
    }

    #[test]
    fn determinism_round_trip() {
        let v = json!({"d": 4, "c": [3, {"b": 2, "a": 1}], "@context": ["x", "y"]});
        let once = canonicalize_to_string(&v).unwrap();
        let reparsed: Value = serde_json::from_str(&once).unwrap();
        let twice = canonicalize_to_string(&reparsed).unwrap();
        assert_eq!(once, twice);
    }

    proptest::proptest! {
        #[test]
        fn prop_canonicalize_is_idempotent_through_serde_round_trip(
            keys in proptest::collection::vec("[a-z]{1,6}", 1..6),
            values in proptest::collection::vec(-1000i64..1000, 1..6),
        ) {
            let pairs: serde_json::Map<String, Value> =
                keys.into_iter().zip(values).map(|(k, v)| (k, json!(v))).collect();
            let v = Value::Object(pairs);
            let once = canonicalize_to_string(&v).unwrap();
            let reparsed: Value = serde_json::from_str(&once).unwrap();
            let twice = canonicalize_to_string(&reparsed).unwrap();
            proptest::prop_assert_eq!(once, twice);
        }
    }
}
