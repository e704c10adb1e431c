//! `mcptrust` CLI: supply-chain trust and runtime enforcement for stdio MCP
//! servers. All logic lives here; `main.rs` only maps the exit code.

pub mod cli;
mod logging;
mod pin;
