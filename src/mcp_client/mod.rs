//! MCP Client: JSON-RPC over stdio transport to the tool-hosting server.
//!
//! This module handles:
//! - Spawning the server process and draining its startup banner
//! - JSON-RPC 2.0 communication over process stdio, one request in flight
//! - Response validation and id correlation
//! - Lifecycle: handshake, fault detection, respawn, shutdown
//!
//! The pipeline executor uses it to list and call tools such as `extract_text`.

pub mod client;
pub mod errors;
pub mod lifecycle;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use client::{McpClient, TransportState};
pub use errors::McpError;
pub use lifecycle::{CommandLauncher, ProcessLauncher};
pub use types::{ServerConfig, ToolDescriptor, ToolInvocationResult};
