//! Stdio JSON-RPC bridge between a host and an MCP server child process: ID
//! translation, response filtering, and spoof/replay resistance (component
//! C9).

mod bridge;
mod error;
mod filter;
mod framing;
mod ids;
mod mode;
mod orchestrator;
mod preflight;

pub use bridge::{bridge, BridgeConfig, BridgeExit, Cancellation};
pub use error::ProxyError;
pub use filter::{PendingEntry, ResolveOutcome, ResponseFilter, MAX_PENDING, MAX_RECENT_USED};
pub use framing::{write_frame, FrameReader, MAX_LINE_BYTES};
pub use ids::{generate_proxy_id, id_key, validate_host_id, MAX_ID_LITERAL_BYTES};
pub use mode::EnforceMode;
pub use orchestrator::{run_proxy, ProxyOptions};
pub use preflight::{run_preflight, PreflightConfig, PreflightOutcome};
