//! Canonical JSON serialization and SHA-256 hashing (component C1).
//!
//! Two canonicalization schemes coexist: a legacy sorted-key form (`v1`,
//! retained to read and re-sign existing lockfiles) and strict RFC 8785 JCS
//! (`v2`, the form new signatures should use). A third helper,
//! [`canonical::canonicalize_v3`], layers a float-rejection guardrail on top
//! of `v2` for the v3 lockfile domain, which is strings/bools/arrays/objects
//! only.
//!
//! `v1`'s number formatting leans on the ambient JSON encoder and is not
//! guaranteed identical across runtimes for exotic edge cases (e.g. `1e100`);
//! treat it as best-effort for legacy signatures only.

mod canonical;
mod error;
mod hash;

pub use canonical::{
    canonicalize_v1, canonicalize_v2, canonicalize_v3, is_empty_value, normalize_text,
    reject_floats, CanonVersion,
};
pub use error::CanonError;
pub use hash::{format_digest, hash_value, prompt_arguments_hash, sha256_hex, template_hash, PromptArgumentRef};
