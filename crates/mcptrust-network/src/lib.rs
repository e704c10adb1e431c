//! SSRF-resistant HTTP client for tarball and registry fetches (component
//! C10): scheme gate, DNS-time host/IP gate, per-hop redirect revalidation,
//! and a hard size cap.

mod cidr;
mod client;
mod error;
mod validate;

pub use client::{fetch, FetchedBody, NetworkConfig, MAX_DOWNLOAD_BYTES, MAX_REDIRECTS};
pub use error::NetworkError;
pub use validate::SecurityConfig;
