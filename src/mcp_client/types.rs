//! Shared types for the MCP client.
//!
//! JSON-RPC 2.0 message types and MCP protocol structures.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Protocol version tag every response must carry.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision sent in `initialize`.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

// ─── JSON-RPC 2.0 ───────────────────────────────────────────────────────────

/// JSON-RPC 2.0 request message.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request.
    pub fn new(id: u64, method: &str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response message (success or error).
///
/// Fields are lenient on purpose: the transport validates version and id
/// itself so it can tell a protocol failure from a correlation fault.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

// ─── MCP Protocol Types ──────────────────────────────────────────────────────

/// A tool in the agent's catalog or in a `tools/list` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Normalized outcome of a `tools/call`, whatever shape the server replied in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInvocationResult {
    pub success: bool,
    pub payload: serde_json::Value,
    pub error: Option<String>,
}

impl ToolInvocationResult {
    /// A failed invocation carrying only an error message.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            payload: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }

    /// The extracted text of a successful invocation.
    ///
    /// Prefers a `text` field, then `result`; non-string values are rendered
    /// as compact JSON.
    pub fn text(&self) -> Option<String> {
        if !self.success {
            return None;
        }
        let value = self
            .payload
            .get("text")
            .or_else(|| self.payload.get("result"))?;
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// How to start the tool-hosting server (the `mcp_server` config section).
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Working directory for the server process.
    #[serde(default)]
    pub cwd: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout: u64,
    /// How long to wait for a startup banner on stderr.
    #[serde(default = "default_startup_grace_ms")]
    pub startup_grace_ms: u64,
    /// Tool catalog: ordered `name → {description}` mapping.
    #[serde(default, deserialize_with = "deserialize_tool_catalog")]
    pub tools: Vec<ToolDescriptor>,
}

fn default_command() -> String {
    "node".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_startup_grace_ms() -> u64 {
    2_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
            env: HashMap::new(),
            cwd: None,
            timeout: default_timeout_secs(),
            startup_grace_ms: default_startup_grace_ms(),
            tools: Vec::new(),
        }
    }
}

/// Accept either a `name → {description}` mapping (order preserved) or a
/// list of `{name, description}` entries.
fn deserialize_tool_catalog<'de, D>(deserializer: D) -> Result<Vec<ToolDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Catalog {
        List(Vec<ToolDescriptor>),
        Map(serde_yaml::Mapping),
    }

    let catalog = Option::<Catalog>::deserialize(deserializer)?;
    let tools = match catalog {
        None => Vec::new(),
        Some(Catalog::List(list)) => list,
        Some(Catalog::Map(map)) => map
            .iter()
            .filter_map(|(key, value)| {
                let name = key.as_str()?.to_string();
                let description = value
                    .get("description")
                    .and_then(|d| d.as_str())
                    .unwrap_or_default()
                    .to_string();
                Some(ToolDescriptor { name, description })
            })
            .collect(),
    };
    Ok(tools)
}

/// MCP `tools/list` response payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
}

/// MCP initialize response payload.
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeResult {
    #[serde(default, alias = "protocolVersion")]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub capabilities: serde_json::Value,
    #[serde(default, alias = "serverInfo")]
    pub server_info: Option<ServerInfo>,
}

/// Server info returned in the initialize response.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: Option<String>,
    pub version: Option<String>,
}

// ─── Standard MCP Error Codes ────────────────────────────────────────────────

/// Well-known JSON-RPC error codes.
pub mod error_codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
}

// ─── Tests ───────────────────────────────────────────────────────────────────
