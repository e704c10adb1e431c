use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("artifact has no pin to run from")]
    NoPin,

    #[error("network error while fetching the artifact: {0}")]
    Network(#[from] mcptrust_network::NetworkError),

    #[error("registry metadata for {name}@{version} is malformed: {reason}")]
    MalformedRegistryMetadata {
        name: String,
        version: String,
        reason: String,
    },

    #[error("integrity mismatch: expected {expected}, computed {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("integrity parsing failed: {0}")]
    Integrity(#[from] mcptrust_integrity::IntegrityError),

    #[error("provenance required: pin method is {actual:?}, only cosign_slsa satisfies require-provenance")]
    ProvenanceRequired { actual: String },

    #[error("installed package lockfile is missing an integrity record for \"{package}\" and --allow-missing-installed-integrity was not set")]
    MissingInstalledIntegrity { package: String },

    #[error("installed package name/version does not match the pin: expected {expected_name}@{expected_version}, installed {actual_name}@{actual_version}")]
    InstalledPackageMismatch {
        expected_name: String,
        expected_version: String,
        actual_name: String,
        actual_version: String,
    },

    #[error("installed package resolved to a non-local reference \"{resolved}\", expected a local file reference")]
    NonLocalResolution { resolved: String },

    #[error("no executable could be resolved from the package's \"bin\" field")]
    NoBinaryResolved,

    #[error("--bin \"{requested}\" is not one of the package's bin entries: {available:?}")]
    UnknownBinary {
        requested: String,
        available: Vec<String>,
    },

    #[error("OCI artifact pin has no digest")]
    MissingDigest,

    #[error("child process {program} exited with status {status}")]
    ChildFailed { program: String, status: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
}
