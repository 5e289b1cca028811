//! Model Context Protocol client over stdio
//!
//! Each configured server is launched as a child process and spoken to with
//! line-delimited JSON-RPC 2.0 (`initialize`, `tools/list`, `tools/call`).

mod provider;
mod transport;
mod types;

pub use provider::McpProvider;
