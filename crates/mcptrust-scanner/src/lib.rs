//! Spawns an MCP server child process, speaks the JSON-RPC handshake, and
//! enumerates its capability surface (component C3).

mod error;
mod jsonrpc;
mod paginate;
mod scanner;

pub use error::ScanError;
pub use jsonrpc::JsonRpcClient;
pub use scanner::{Scanner, DEFAULT_SCAN_TIMEOUT};
