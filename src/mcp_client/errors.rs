//! MCP Client error types.

use thiserror::Error;

/// Errors that can occur during MCP client operations.
///
/// The public client API folds these into [`ToolInvocationResult`] values;
/// the enum is what the transport and lifecycle layers propagate internally.
///
/// [`ToolInvocationResult`]: super::types::ToolInvocationResult
#[derive(Debug, Error)]
pub enum McpError {
    /// The server process failed to start.
    #[error("failed to spawn server '{name}': {reason}")]
    SpawnFailed {
        name: String,
        reason: String,
    },

    /// The initialization handshake failed.
    #[error("server '{name}' initialization failed: {reason}")]
    InitFailed {
        name: String,
        reason: String,
    },

    /// I/O error on the process pipes, EOF, or an unparsable response line.
    #[error("transport error for server '{server}': {reason}")]
    TransportError {
        server: String,
        reason: String,
    },

    /// The response carried a protocol version other than `2.0`.
    #[error("protocol error for server '{server}': {reason}")]
    ProtocolError {
        server: String,
        reason: String,
    },

    /// Server returned a JSON-RPC error response.
    #[error("server error [{code}]: {message}")]
    ServerError {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// The response id did not match the outstanding request id.
    #[error("response id mismatch for server '{server}': expected {expected}, got {actual}")]
    CorrelationMismatch {
        server: String,
        expected: u64,
        actual: String,
    },

    /// A request timed out.
    #[error("request '{method}' timed out after {timeout_ms}ms")]
    Timeout {
        method: String,
        timeout_ms: u64,
    },

    /// The client was closed and will not start another process.
    #[error("client for server '{name}' is closed")]
    Closed {
        name: String,
    },
}

impl McpError {
    /// Whether this error leaves the transport unusable.
    ///
    /// Transport faults force a respawn on the next call; protocol and server
    /// errors leave the process running.
    pub fn is_transport_fault(&self) -> bool {
        matches!(
            self,
            McpError::SpawnFailed { .. }
                | McpError::TransportError { .. }
                | McpError::CorrelationMismatch { .. }
                | McpError::Timeout { .. }
        )
    }
}
