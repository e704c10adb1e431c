use serde_json::Value;

use crate::error::CanonError;

/// Which canonicalization scheme to apply before hashing.
///
/// `V1` is the legacy, sorted-key form retained to read and re-sign existing
/// lockfiles; `V2` is strict RFC 8785 JCS and is the only form new signatures
/// should use (see the crate-level docs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonVersion {
    V1,
    V2,
}

/// `null`, or an object with no entries, hashes to the empty string by
/// convention rather than to the digest of the literal `"null"`/`"{}"` bytes.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Legacy canonicalization (v1): object keys sorted lexicographically by code
/// point, arrays left in source order, scalars rendered by the ambient
/// encoder. `serde_json::Map` is BTreeMap-backed without the `preserve_order`
/// feature, so a plain `serde_json::to_vec` already produces sorted keys —
/// this function exists to give v1 a named, stable entry point independent of
/// that implementation detail.
pub fn canonicalize_v1(value: &Value) -> Result<Vec<u8>, CanonError> {
    serde_json::to_vec(value).map_err(|e| CanonError::InvalidType(e.to_string()))
}

/// Strict canonicalization (v2): RFC 8785 JSON Canonicalization Scheme, via
/// `serde_json_canonicalizer` — UTF-16 code-unit key ordering, minimal string
/// escaping, shortest round-trip number formatting, no insignificant
/// whitespace.
pub fn canonicalize_v2(value: &Value) -> Result<Vec<u8>, CanonError> {
    serde_json_canonicalizer::to_vec(value).map_err(|e| CanonError::InvalidNumber(e.to_string()))
}

/// Rejects any floating-point leaf anywhere in `value`, recursively. The v3
/// lockfile domain is strings/bools/arrays/objects only — no numbers at all,
/// so this also rejects integral JSON numbers. Use this guard before handing
/// a v3 value to `canonicalize_v2`.
pub fn reject_floats(value: &Value) -> Result<(), CanonError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) => {
            if n.is_f64() {
                Err(CanonError::InvalidType(format!(
                    "floating-point number {n} not permitted in the v3 hashing domain"
                )))
            } else {
                Err(CanonError::InvalidType(format!(
                    "number {n} not permitted in the v3 hashing domain (strings/bools/arrays/objects only)"
                )))
            }
        }
        Value::Array(items) => items.iter().try_for_each(reject_floats),
        Value::Object(map) => map.values().try_for_each(reject_floats),
    }
}

/// v3 lockfile hashing: guard against floats, then canonicalize with JCS.
pub fn canonicalize_v3(value: &Value) -> Result<Vec<u8>, CanonError> {
    reject_floats(value)?;
    canonicalize_v2(value)
}

/// Normalizes text fields (descriptions, prompt/resource names) so editor
/// whitespace churn doesn't produce spurious drift: `\r\n`/`\r` collapse to
/// `\n`, then each line's trailing spaces and tabs are trimmed.
pub fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    unified
        .split('\n')
        .map(|line| line.trim_end_matches([' ', '\t']))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn v1_sorts_object_keys() {
        let value = json!({"b": 1, "a": 2});
        let bytes = canonicalize_v1(&value).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.find("\"a\"").unwrap() < text.find("\"b\"").unwrap());
    }

    #[test]
    fn v1_preserves_array_order() {
        let value = json!([3, 1, 2]);
        let bytes = canonicalize_v1(&value).unwrap();
        assert_eq!(bytes, b"[3,1,2]");
    }

    #[test]
    fn v2_reorders_keys_independent_of_source_order() {
        let a = json!({"z": 1, "a": 2, "m": 3});
        let b = json!({"m": 3, "a": 2, "z": 1});
        assert_eq!(
            canonicalize_v2(&a).unwrap(),
            canonicalize_v2(&b).unwrap(),
            "JCS output must not depend on source field order"
        );
    }

    #[test]
    fn v2_has_no_insignificant_whitespace() {
        let value = json!({"a": [1, 2, 3]});
        let bytes = canonicalize_v2(&value).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "{\"a\":[1,2,3]}");
    }

    #[test]
    fn reject_floats_allows_v3_domain_values() {
        let value = json!({"name": "x", "items": ["a", "b"], "ok": true, "nested": {}});
        assert!(reject_floats(&value).is_ok());
    }

    #[test]
    fn reject_floats_rejects_float_leaf_anywhere() {
        let shallow = json!(1.5);
        assert!(reject_floats(&shallow).is_err());

        let nested = json!({"a": [{"b": 2.0}]});
        assert!(reject_floats(&nested).is_err());
    }

    #[test]
    fn reject_floats_rejects_integral_numbers_too() {
        // v3 domain is strings/bools/arrays/objects only; any number leaf is
        // out of domain even if it happens to be integral.
        let value = json!({"count": 3});
        assert!(reject_floats(&value).is_err());
    }

    #[test]
    fn empty_value_detection() {
        assert!(is_empty_value(&Value::Null));
        assert!(is_empty_value(&json!({})));
        assert!(!is_empty_value(&json!([])));
        assert!(!is_empty_value(&json!("")));
    }

    #[test]
    fn normalize_text_collapses_line_endings_and_trims_trailing_whitespace() {
        let input = "first line  \r\nsecond\t\r\nthird\n";
        assert_eq!(normalize_text(input), "first line\nsecond\nthird\n");
    }

    #[test]
    fn normalize_text_is_idempotent() {
        let input = "a\r\nb \r\rc\t\n";
        let once = normalize_text(input);
        let twice = normalize_text(&once);
        assert_eq!(once, twice);
    }
}
