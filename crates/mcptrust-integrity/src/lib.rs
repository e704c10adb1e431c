//! Shell-free command parsing and artifact integrity validation (component
//! C6): the `npx`/`docker run` tokenizer, the docker-run flag table, and OCI
//! digest / npm SRI validation.

mod command;
mod digest;
mod error;
mod tokenizer;

pub use command::{parse, parse_docker_run, DockerRunCommand, ParsedCommand};
pub use digest::{parse_npm_integrity, validate_oci_digest, NpmIntegrity};
pub use error::IntegrityError;
pub use tokenizer::tokenize;
