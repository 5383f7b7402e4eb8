//! JSON-RPC over stdio transport.
//!
//! Handles low-level communication with the server process:
//! - Writing one JSON-RPC request per line to stdin
//! - Reading exactly one response line from stdout
//! - Validating the response against the request that produced it
//!
//! Callers must hold exclusive access to the [`ServerProcess`] for the whole
//! write-then-read exchange; the client enforces that with its session lock.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

use super::errors::McpError;
use super::lifecycle::ServerProcess;
use super::types::{JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};

// ─── Request ID Generator ────────────────────────────────────────────────────

/// Monotonic request id source, one per client instance.
#[derive(Debug)]
pub struct RequestIds(AtomicU64);

impl RequestIds {
    pub fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    /// Next unique id. Never returns the same value twice.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Exchange ────────────────────────────────────────────────────────────────

/// Write `request` as a single line and read back one response line.
///
/// Blank lines are skipped; anything else is returned verbatim for
/// [`validate_response`]. EOF means the process went away.
pub async fn exchange(
    process: &mut ServerProcess,
    server_name: &str,
    request: &JsonRpcRequest,
) -> Result<String, McpError> {
    let mut json = serde_json::to_string(request).map_err(|e| McpError::TransportError {
        server: server_name.to_string(),
        reason: format!("failed to serialize request: {e}"),
    })?;
    json.push('\n');

    process
        .stdin
        .write_all(json.as_bytes())
        .await
        .map_err(|e| McpError::TransportError {
            server: server_name.to_string(),
            reason: format!("failed to write to stdin: {e}"),
        })?;
    process
        .stdin
        .flush()
        .await
        .map_err(|e| McpError::TransportError {
            server: server_name.to_string(),
            reason: format!("failed to flush stdin: {e}"),
        })?;

    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = process
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| McpError::TransportError {
                server: server_name.to_string(),
                reason: format!("failed to read from stdout: {e}"),
            })?;

        if bytes_read == 0 {
            return Err(McpError::TransportError {
                server: server_name.to_string(),
                reason: "server stdout closed (process may have exited)".into(),
            });
        }

        if !line.trim().is_empty() {
            return Ok(line.trim().to_string());
        }
    }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Validate a response line against the id of the request just sent.
///
/// Order matters: parse, protocol version, error object, then correlation.
/// Returns the `result` value (`{}` when the server omitted it).
pub fn validate_response(
    line: &str,
    expected_id: u64,
    server_name: &str,
) -> Result<serde_json::Value, McpError> {
    let response: JsonRpcResponse =
        serde_json::from_str(line).map_err(|e| McpError::TransportError {
            server: server_name.to_string(),
            reason: format!("unparsable response: {e}"),
        })?;

    if response.jsonrpc.as_deref() != Some(JSONRPC_VERSION) {
        return Err(McpError::ProtocolError {
            server: server_name.to_string(),
            reason: format!(
                "invalid JSON-RPC version: {}",
                response.jsonrpc.as_deref().unwrap_or("<missing>")
            ),
        });
    }

    if let Some(err) = response.error {
        return Err(McpError::ServerError {
            code: err.code,
            message: err.message,
            data: err.data,
        });
    }

    match response.id {
        Some(id) if id.as_u64() == Some(expected_id) => {}
        Some(serde_json::Value::Null) | None => {
            return Err(McpError::TransportError {
                server: server_name.to_string(),
                reason: "response is missing an id".into(),
            });
        }
        Some(other) => {
            return Err(McpError::CorrelationMismatch {
                server: server_name.to_string(),
                expected: expected_id,
                actual: other.to_string(),
            });
        }
    }

    Ok(response
        .result
        .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())))
}

/// Render a server error the way tool results report it.
pub fn describe_error(err: &McpError) -> String {
    match err {
        McpError::ServerError { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
