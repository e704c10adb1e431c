use thiserror::Error;

/// Every failure this crate can surface maps to the `network-blocked` error
/// kind at the command boundary (§7), with the reason carried in the variant.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("invalid URL \"{0}\"")]
    InvalidUrl(String),

    #[error("scheme \"{scheme}\" is not allowed, only https is permitted")]
    SchemeNotAllowed { scheme: String },

    #[error("host \"{host}\" is blocked ({reason})")]
    BlockedHost { host: String, reason: String },

    #[error("DNS resolution failed for \"{host}\": {source}")]
    DnsResolution {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("redirect from https to a non-https URL is not allowed")]
    RedirectDowngrade,

    #[error("too many redirects (limit {limit})")]
    TooManyRedirects { limit: u32 },

    #[error("response exceeds the {limit_bytes}-byte size limit")]
    ResponseTooLarge { limit_bytes: u64 },

    #[error("redirect response is missing a Location header")]
    MissingLocation,

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
