use num_bigint::BigInt;
use rand::Rng;
use serde_json::Value;

use crate::error::ProxyError;

/// Oversize IDs are rejected (and, per §4.9's canonicalization rule, skip
/// numeric parsing at the literal level — see [`id_key`]).
pub const MAX_ID_LITERAL_BYTES: usize = 256;

/// Validates a host-supplied JSON-RPC `id` before it is registered
/// (SEC-01, §4.9): must be `null`, a string, or a number, each within
/// [`MAX_ID_LITERAL_BYTES`].
pub fn validate_host_id(id: &Value) -> Result<(), ProxyError> {
    match id {
        Value::Null => Ok(()),
        Value::String(s) => {
            if s.len() > MAX_ID_LITERAL_BYTES {
                Err(ProxyError::HostIdTooLarge)
            } else {
                Ok(())
            }
        }
        Value::Number(n) => {
            if n.to_string().len() > MAX_ID_LITERAL_BYTES {
                Err(ProxyError::HostIdTooLarge)
            } else {
                Ok(())
            }
        }
        Value::Bool(_) => Err(ProxyError::HostIdInvalidType("boolean")),
        Value::Array(_) => Err(ProxyError::HostIdInvalidType("array")),
        Value::Object(_) => Err(ProxyError::HostIdInvalidType("object")),
    }
}

/// Generates a fresh opaque `proxyID = "mcp_" + 32 hex` from a
/// cryptographic RNG (§4.9).
pub fn generate_proxy_id() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    let mut out = String::with_capacity(4 + 32);
    out.push_str("mcp_");
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Whether `s` is a *strict* valid JSON number literal: no leading `+`, no
/// leading zeros except a lone `0`, no trailing `.`, no bare `.N`, no empty
/// exponent (§4.9).
fn is_strict_json_number(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.is_empty() {
        return false;
    }
    let mut i = 0;
    if bytes[i] == b'-' {
        i += 1;
    }
    let int_start = i;
    match bytes.get(i) {
        Some(b'0') => i += 1,
        Some(b'1'..=b'9') => {
            i += 1;
            while matches!(bytes.get(i), Some(b'0'..=b'9')) {
                i += 1;
            }
        }
        _ => return false,
    }
    if i == int_start {
        return false;
    }
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        let frac_start = i;
        while matches!(bytes.get(i), Some(b'0'..=b'9')) {
            i += 1;
        }
        if i == frac_start {
            return false;
        }
    }
    if matches!(bytes.get(i), Some(b'e') | Some(b'E')) {
        i += 1;
        if matches!(bytes.get(i), Some(b'+') | Some(b'-')) {
            i += 1;
        }
        let exp_start = i;
        while matches!(bytes.get(i), Some(b'0'..=b'9')) {
            i += 1;
        }
        if i == exp_start {
            return false;
        }
    }
    i == bytes.len()
}

/// Parses a strict JSON number literal into an exact `numerator/denominator`
/// pair (reduced to lowest terms, denominator always positive). No float
/// ever enters this path (§9 — "do not take shortcuts via float
/// conversion").
fn parse_exact_rational(s: &str) -> (BigInt, BigInt) {
    let negative = s.starts_with('-');
    let unsigned = s.strip_prefix('-').unwrap_or(s);

    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(idx) => {
            let exp: i64 = unsigned[idx + 1..].parse().unwrap_or(0);
            (&unsigned[..idx], exp)
        }
        None => (unsigned, 0),
    };
    let (int_part, frac_part) = match mantissa.find('.') {
        Some(idx) => (&mantissa[..idx], &mantissa[idx + 1..]),
        None => (mantissa, ""),
    };

    let digits: BigInt = format!("{int_part}{frac_part}").parse().unwrap_or_else(|_| BigInt::from(0));
    let digits = if negative { -digits } else { digits };
    let net_exp = exponent - frac_part.len() as i64;

    if net_exp >= 0 {
        (digits * big_pow10(net_exp as u64), BigInt::from(1))
    } else {
        reduce(digits, big_pow10((-net_exp) as u64))
    }
}

fn big_pow10(exp: u64) -> BigInt {
    let mut value = BigInt::from(1);
    let ten = BigInt::from(10);
    for _ in 0..exp {
        value *= &ten;
    }
    value
}

fn reduce(numerator: BigInt, denominator: BigInt) -> (BigInt, BigInt) {
    if numerator == BigInt::from(0) {
        return (BigInt::from(0), BigInt::from(1));
    }
    let g = gcd(numerator.clone(), denominator.clone());
    (numerator / &g, denominator / &g)
}

fn gcd(a: BigInt, b: BigInt) -> BigInt {
    let mut a: BigInt = a.magnitude().clone().into();
    let mut b: BigInt = b.magnitude().clone().into();
    while b != BigInt::from(0) {
        let r = &a % &b;
        a = b;
        b = r;
    }
    a
}

fn big_pow(base: u64, exp: u64) -> BigInt {
    let mut value = BigInt::from(1);
    let base = BigInt::from(base);
    for _ in 0..exp {
        value *= &base;
    }
    value
}

/// Renders a reduced `numerator/denominator` as a canonical key: plain
/// decimal when the denominator is `1`, a terminating decimal when the
/// (already-reduced) denominator's only prime factors are 2 and 5 — which
/// is always true for a fraction parsed out of base-10 scientific
/// notation — and the `num/denom` form otherwise, kept for robustness.
fn render_rational(numerator: BigInt, denominator: BigInt) -> String {
    if denominator == BigInt::from(1) {
        return format!("n:{numerator}");
    }

    let (mut remaining, mut count2, mut count5) = (denominator.clone(), 0u64, 0u64);
    let two = BigInt::from(2);
    let five = BigInt::from(5);
    while (&remaining % &two) == BigInt::from(0) {
        remaining /= &two;
        count2 += 1;
    }
    while (&remaining % &five) == BigInt::from(0) {
        remaining /= &five;
        count5 += 1;
    }

    if remaining != BigInt::from(1) {
        return format!("n:{numerator}/{denominator}");
    }

    let k = count2.max(count5);
    let scaled_numerator = numerator * big_pow(2, k - count2) * big_pow(5, k - count5);
    let negative = scaled_numerator < BigInt::from(0);
    let digits = scaled_numerator.magnitude().to_string();
    let padded = format!("{digits:0>width$}", width = k as usize + 1);
    let split_at = padded.len() - k as usize;
    let (int_part, frac_part) = padded.split_at(split_at);
    format!("n:{}{int_part}.{frac_part}", if negative { "-" } else { "" })
}

/// The canonical lookup key for a JSON-RPC `id` value (§4.9, invariant #9):
/// numeric values and strings that are strict JSON numbers key identically
/// (`1`, `1.0`, `1e0`, `"1"`, `"1.0"` all key to `n:1`); everything else
/// keys as its literal string form; `null` keys as `<nil>`.
pub fn id_key(id: &Value) -> String {
    match id {
        Value::Null => "<nil>".to_string(),
        Value::Number(n) => {
            let text = n.to_string();
            let (num, denom) = parse_exact_rational(&text);
            render_rational(num, denom)
        }
        Value::String(s) => {
            if s.len() <= MAX_ID_LITERAL_BYTES && is_strict_json_number(s) {
                let (num, denom) = parse_exact_rational(s);
                render_rational(num, denom)
            } else {
                format!("s:{s}")
            }
        }
        other => format!("s:{other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equivalent_number_representations_share_a_key() {
        let expected = id_key(&json!(1));
        assert_eq!(expected, "n:1");
        assert_eq!(id_key(&json!(1.0)), expected);
        assert_eq!(id_key(&json!("1")), expected);
        assert_eq!(id_key(&json!("1.0")), expected);
        assert_eq!(id_key(&json!("1e0")), expected);
    }

    #[test]
    fn negative_zero_normalizes_to_n_zero() {
        assert_eq!(id_key(&json!(-0.0)), "n:0");
        assert_eq!(id_key(&json!("-0")), "n:0");
    }

    #[test]
    fn scientific_notation_normalizes_to_plain_decimal() {
        assert_eq!(id_key(&json!("1e3")), "n:1000");
    }

    #[test]
    fn leading_zero_string_is_not_a_number() {
        assert_eq!(id_key(&json!("01")), "s:01");
        assert_ne!(id_key(&json!("01")), id_key(&json!(1)));
    }

    #[test]
    fn null_and_plain_strings_key_distinctly() {
        assert_eq!(id_key(&Value::Null), "<nil>");
        assert_eq!(id_key(&json!("hello")), "s:hello");
    }

    #[test]
    fn fractional_value_renders_as_terminating_decimal() {
        assert_eq!(id_key(&json!("0.5")), "n:0.5");
        assert_eq!(id_key(&json!("1.25")), "n:1.25");
    }

    #[test]
    fn oversize_numeric_string_skips_numeric_parsing() {
        let huge = "1".repeat(MAX_ID_LITERAL_BYTES + 1);
        assert_eq!(id_key(&Value::String(huge.clone())), format!("s:{huge}"));
    }

    #[test]
    fn validate_host_id_rejects_objects_and_arrays() {
        assert!(validate_host_id(&json!({"a": 1})).is_err());
        assert!(validate_host_id(&json!([1, 2])).is_err());
    }

    #[test]
    fn validate_host_id_rejects_oversize_literals() {
        let huge = Value::String("x".repeat(MAX_ID_LITERAL_BYTES + 1));
        assert!(matches!(validate_host_id(&huge), Err(ProxyError::HostIdTooLarge)));
    }

    #[test]
    fn validate_host_id_accepts_null_string_and_number() {
        assert!(validate_host_id(&Value::Null).is_ok());
        assert!(validate_host_id(&json!("req-1")).is_ok());
        assert!(validate_host_id(&json!(42)).is_ok());
    }

    #[test]
    fn generated_proxy_ids_have_the_expected_shape() {
        let id = generate_proxy_id();
        assert!(id.starts_with("mcp_"));
        assert_eq!(id.len(), 4 + 32);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
