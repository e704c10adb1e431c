use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::canonical::{canonicalize_v1, canonicalize_v2, is_empty_value, normalize_text, CanonVersion};
use crate::error::CanonError;

/// Lowercase hex SHA-256 digest of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Wraps a hex digest in the `sha256:<64-hex>` integrity-hash form used
/// throughout the lockfile.
pub fn format_digest(hex: &str) -> String {
    format!("sha256:{hex}")
}

/// Canonicalizes `value` under `version` and returns its integrity hash, or
/// the empty string for `null`/an empty object (§3's empty-value convention).
pub fn hash_value(value: &Value, version: CanonVersion) -> Result<String, CanonError> {
    if is_empty_value(value) {
        return Ok(String::new());
    }
    let bytes = match version {
        CanonVersion::V1 => canonicalize_v1(value)?,
        CanonVersion::V2 => canonicalize_v2(value)?,
    };
    Ok(format_digest(&sha256_hex(&bytes)))
}

/// A single prompt argument, as seen by the hasher. Borrowed — callers own
/// the real `PromptArgument` type in `mcptrust-model`.
pub struct PromptArgumentRef<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub required: bool,
}

/// Hashes a prompt's arguments: sorted by name, each serialized as
/// `{name, description?, required?}` (omitting `required` unless `true`),
/// then JCS-hashed.
pub fn prompt_arguments_hash(arguments: &[PromptArgumentRef<'_>]) -> Result<String, CanonError> {
    let mut ordered: Vec<&PromptArgumentRef<'_>> = arguments.iter().collect();
    ordered.sort_by(|a, b| a.name.cmp(b.name));

    let items: Vec<Value> = ordered
        .into_iter()
        .map(|arg| {
            let mut obj = serde_json::Map::new();
            obj.insert("name".to_string(), Value::String(arg.name.to_string()));
            if let Some(description) = arg.description {
                obj.insert(
                    "description".to_string(),
                    Value::String(normalize_text(description)),
                );
            }
            if arg.required {
                obj.insert("required".to_string(), Value::Bool(true));
            }
            Value::Object(obj)
        })
        .collect();

    hash_value(&Value::Array(items), CanonVersion::V2)
}

/// Hashes a resource template as `{uriTemplate, mimeType?}`.
pub fn template_hash(uri_template: &str, mime_type: Option<&str>) -> Result<String, CanonError> {
    let mut obj = serde_json::Map::new();
    obj.insert(
        "uriTemplate".to_string(),
        Value::String(uri_template.to_string()),
    );
    if let Some(mime_type) = mime_type {
        obj.insert("mimeType".to_string(), Value::String(mime_type.to_string()));
    }
    hash_value(&Value::Object(obj), CanonVersion::V2)
}
