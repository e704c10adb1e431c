use base64::Engine;

use crate::error::IntegrityError;

/// Validates an OCI content digest: `"sha256:" + 64 lowercase hex` (§4.6).
pub fn validate_oci_digest(digest: &str) -> Result<(), IntegrityError> {
    let hex = digest
        .strip_prefix("sha256:")
        .ok_or_else(|| IntegrityError::InvalidOciDigest(format!("missing \"sha256:\" prefix in \"{digest}\"")))?;

    if hex.len() != 64 {
        return Err(IntegrityError::InvalidOciDigest(format!(
            "expected 64 hex characters after \"sha256:\", got {}",
            hex.len()
        )));
    }
    if !hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
        return Err(IntegrityError::InvalidOciDigest(
            "digest must be lowercase hex".to_string(),
        ));
    }
    Ok(())
}

/// A parsed Subresource Integrity string, `alg-<base64>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpmIntegrity {
    pub algorithm: String,
    pub base64_hash: String,
}

/// Parses and validates `value` as the npm integrity form this core
/// supports: a single `sha512-<base64>` entry. `alg` is matched
/// case-insensitively; the hash portion is case-sensitive and must be valid
/// base64. Multi-hash SRI (space-separated entries) is rejected outright —
/// the core supports exactly one algorithm (§4.6).
pub fn parse_npm_integrity(value: &str) -> Result<NpmIntegrity, IntegrityError> {
    if value.trim() != value || value.contains(' ') {
        return Err(IntegrityError::InvalidSri(
            "multi-hash SRI (space-separated) is not supported".to_string(),
        ));
    }

    let (algorithm, base64_hash) = value
        .split_once('-')
        .ok_or_else(|| IntegrityError::InvalidSri(format!("missing \"alg-\" prefix in \"{value}\"")))?;

    if !algorithm.eq_ignore_ascii_case("sha512") {
        return Err(IntegrityError::InvalidSri(format!(
            "unsupported integrity algorithm \"{algorithm}\", only sha512 is supported"
        )));
    }
    if base64_hash.is_empty() {
        return Err(IntegrityError::InvalidSri("empty hash portion".to_string()));
    }
    base64::engine::general_purpose::STANDARD
        .decode(base64_hash)
        .map_err(|e| IntegrityError::InvalidSri(format!("hash portion is not valid base64: {e}")))?;

    Ok(NpmIntegrity {
        algorithm: algorithm.to_ascii_lowercase(),
        base64_hash: base64_hash.to_string(),
    })
}
