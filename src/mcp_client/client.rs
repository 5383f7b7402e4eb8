//! MCP Client: high-level interface for tool execution.
//!
//! Owns one server process at a time and drives it through
//! `Unstarted → Starting → Ready → (Faulted | Closed)`. Every request holds
//! the session lock from write until its response line is read, so there is
//! never more than one request in flight on the pipe.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use super::errors::McpError;
use super::lifecycle::{drain_startup_banner, CommandLauncher, ProcessLauncher, ServerProcess};
use super::transport::{describe_error, exchange, validate_response, RequestIds};
use super::types::{
    InitializeResult, JsonRpcRequest, ListToolsResult, ServerConfig, ToolDescriptor,
    ToolInvocationResult, MCP_PROTOCOL_VERSION,
};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Name reported in `clientInfo` during the handshake.
const CLIENT_NAME: &str = "Vygil Activity Agent";

// ─── State ───────────────────────────────────────────────────────────────────

/// Lifecycle state of the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// No process has been started yet (or it was shut down).
    Unstarted,
    /// A process is running but the handshake has not completed.
    Starting,
    /// Handshake done; requests flow normally.
    Ready,
    /// The last exchange failed at the transport level; the next call respawns.
    Faulted,
    /// Explicitly closed. Terminal.
    Closed,
}

struct Session {
    state: TransportState,
    process: Option<ServerProcess>,
    /// Set while an exchange is on the wire. Still set on entry means the
    /// previous caller was cancelled mid-exchange.
    in_flight: bool,
}

// ─── McpClient ───────────────────────────────────────────────────────────────

/// Client for a single tool-hosting server process.
pub struct McpClient {
    server_name: String,
    config: ServerConfig,
    launcher: Arc<dyn ProcessLauncher>,
    ids: RequestIds,
    session: Mutex<Session>,
    call_timeout: Duration,
    startup_grace: Duration,
}

impl McpClient {
    /// Create a client that launches `config.command` as a child process.
    pub fn new(server_name: &str, config: ServerConfig) -> Self {
        Self::with_launcher(server_name, config, Arc::new(CommandLauncher))
    }

    /// Create a client with a custom process launcher.
    pub fn with_launcher(
        server_name: &str,
        config: ServerConfig,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        let call_timeout = Duration::from_secs(config.timeout);
        let startup_grace = Duration::from_millis(config.startup_grace_ms);
        Self {
            server_name: server_name.to_string(),
            config,
            launcher,
            ids: RequestIds::new(),
            session: Mutex::new(Session {
                state: TransportState::Unstarted,
                process: None,
                in_flight: false,
            }),
            call_timeout,
            startup_grace,
        }
    }

    /// Set the per-request timeout.
    pub fn set_call_timeout(&mut self, timeout: Duration) {
        self.call_timeout = timeout;
    }

    /// The server name used in logs and errors.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> TransportState {
        self.session.lock().await.state
    }

    // ─── Public Contract ─────────────────────────────────────────────────

    /// Perform the MCP handshake. Returns `true` once the server is ready.
    ///
    /// A no-op returning `true` when already initialized.
    pub async fn initialize(&self) -> bool {
        let mut session = self.session.lock().await;
        match self.initialize_locked(&mut session).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(server = %self.server_name, error = %e, "MCP initialization failed");
                false
            }
        }
    }

    /// List the tools the server exposes. Empty on any failure.
    pub async fn list_tools(&self) -> Vec<ToolDescriptor> {
        let mut session = self.session.lock().await;
        if let Err(e) = self.initialize_locked(&mut session).await {
            tracing::error!(server = %self.server_name, error = %e, "cannot list tools: not initialized");
            return Vec::new();
        }

        let result = match self.request_locked(&mut session, "tools/list", None).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(server = %self.server_name, error = %e, "failed to list tools");
                return Vec::new();
            }
        };

        match serde_json::from_value::<ListToolsResult>(result) {
            Ok(list) => {
                tracing::info!(server = %self.server_name, count = list.tools.len(), "listed tools");
                list.tools
            }
            Err(e) => {
                tracing::warn!(server = %self.server_name, error = %e, "malformed tools/list result");
                Vec::new()
            }
        }
    }

    /// Call a tool and normalize whatever the server returned.
    pub async fn call_tool(&self, tool_name: &str, arguments: serde_json::Value) -> ToolInvocationResult {
        let start = Instant::now();
        let mut session = self.session.lock().await;

        if let Err(e) = self.initialize_locked(&mut session).await {
            tracing::error!(server = %self.server_name, error = %e, "cannot call tool: not initialized");
            return ToolInvocationResult::failure("failed to initialize MCP connection");
        }

        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments,
        });

        let outcome = match self.request_locked(&mut session, "tools/call", Some(params)).await {
            Ok(result) => normalize_tool_result(result),
            Err(e) => ToolInvocationResult::failure(describe_error(&e)),
        };

        tracing::debug!(
            server = %self.server_name,
            tool = tool_name,
            success = outcome.success,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "tool call finished"
        );
        outcome
    }

    /// Stop the server process and reset readiness.
    ///
    /// A later call starts a fresh process. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        let mut session = self.session.lock().await;
        self.stop_locked(&mut session).await;
        if session.state != TransportState::Closed {
            session.state = TransportState::Unstarted;
        }
    }

    /// Stop the server process and refuse all further calls.
    pub async fn close(&self) {
        let mut session = self.session.lock().await;
        self.stop_locked(&mut session).await;
        session.state = TransportState::Closed;
    }

    // ─── Internals ───────────────────────────────────────────────────────

    /// Make sure a healthy process is attached and has completed the handshake.
    ///
    /// A dead or desynchronized process is replaced here, before the `Ready`
    /// shortcut, so a fresh process always sees `initialize` first.
    async fn initialize_locked(&self, session: &mut Session) -> Result<(), McpError> {
        self.ensure_process_locked(session).await?;
        if session.state == TransportState::Ready {
            return Ok(());
        }

        let params = serde_json::json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": CLIENT_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
        });

        let result = self.request_locked(session, "initialize", Some(params)).await?;

        match serde_json::from_value::<InitializeResult>(result) {
            Ok(init) => {
                let info = init.server_info.as_ref();
                tracing::info!(
                    server = %self.server_name,
                    protocol = init.protocol_version.as_deref().unwrap_or("unknown"),
                    server_name = info.and_then(|i| i.name.as_deref()).unwrap_or("unknown"),
                    server_version = info.and_then(|i| i.version.as_deref()).unwrap_or("unknown"),
                    "MCP connection initialized"
                );
            }
            Err(e) => {
                return Err(McpError::InitFailed {
                    name: self.server_name.clone(),
                    reason: format!("failed to parse initialize response: {e}"),
                });
            }
        }

        session.state = TransportState::Ready;
        Ok(())
    }

    /// Send one request and read its response while holding the session.
    async fn request_locked(
        &self,
        session: &mut Session,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, McpError> {
        if session.state == TransportState::Closed {
            return Err(McpError::Closed {
                name: self.server_name.clone(),
            });
        }

        if method != "initialize" && session.state != TransportState::Ready {
            return Err(McpError::InitFailed {
                name: self.server_name.clone(),
                reason: format!("'{method}' sent before the handshake completed"),
            });
        }

        let Some(process) = session.process.as_mut() else {
            return Err(McpError::TransportError {
                server: self.server_name.clone(),
                reason: "no server process".into(),
            });
        };

        let id = self.ids.next();
        let request = JsonRpcRequest::new(id, method, params);
        tracing::debug!(server = %self.server_name, id, method, "sending request");

        session.in_flight = true;
        let outcome = match tokio::time::timeout(
            self.call_timeout,
            exchange(process, &self.server_name, &request),
        )
        .await
        {
            Ok(Ok(line)) => validate_response(&line, id, &self.server_name),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(McpError::Timeout {
                method: method.to_string(),
                timeout_ms: self.call_timeout.as_millis() as u64,
            }),
        };
        session.in_flight = false;

        if let Err(e) = &outcome {
            match e {
                McpError::CorrelationMismatch { .. } => {
                    tracing::error!(
                        server = %self.server_name,
                        method,
                        error = %e,
                        "response correlation fault; transport desynchronized"
                    );
                }
                _ if e.is_transport_fault() => {
                    tracing::warn!(server = %self.server_name, method, error = %e, "transport fault");
                }
                _ => {
                    tracing::warn!(server = %self.server_name, method, error = %e, "request failed");
                }
            }
            if e.is_transport_fault() {
                self.fault_locked(session).await;
            }
        }

        outcome
    }

    /// Replace an abandoned or exited process and launch one if none is attached.
    async fn ensure_process_locked(&self, session: &mut Session) -> Result<(), McpError> {
        if session.state == TransportState::Closed {
            return Err(McpError::Closed {
                name: self.server_name.clone(),
            });
        }

        if session.in_flight {
            tracing::warn!(
                server = %self.server_name,
                "previous request was abandoned mid-exchange; restarting server"
            );
            self.fault_locked(session).await;
        }

        if let Some(process) = session.process.as_mut() {
            if !process.is_alive() {
                tracing::warn!(server = %self.server_name, "server process exited; restarting");
                self.fault_locked(session).await;
            }
        }

        if session.process.is_none() {
            let mut process = match self.launcher.launch(&self.server_name, &self.config) {
                Ok(process) => process,
                Err(e) => {
                    session.state = TransportState::Faulted;
                    return Err(e);
                }
            };
            drain_startup_banner(&mut process, &self.server_name, self.startup_grace).await;
            session.process = Some(process);
            session.state = TransportState::Starting;
            tracing::info!(server = %self.server_name, "server process started");
        }

        Ok(())
    }

    async fn fault_locked(&self, session: &mut Session) {
        if let Some(process) = session.process.take() {
            process.kill(&self.server_name).await;
        }
        session.in_flight = false;
        session.state = TransportState::Faulted;
    }

    async fn stop_locked(&self, session: &mut Session) {
        if let Some(process) = session.process.take() {
            process.shutdown(&self.server_name).await;
            tracing::debug!(server = %self.server_name, "server process stopped");
        }
        session.in_flight = false;
    }
}

// ─── Result Normalization ────────────────────────────────────────────────────

/// Fold a `tools/call` result into a [`ToolInvocationResult`].
///
/// Servers wrap their payload as `content[0].text` holding a JSON document;
/// unparsable text is kept as an opaque `result` string. Results without
/// content are passed through as the payload.
pub fn normalize_tool_result(data: serde_json::Value) -> ToolInvocationResult {
    let is_error = data
        .get("isError")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let first_text = data
        .get("content")
        .and_then(|c| c.as_array())
        .and_then(|items| items.first())
        .map(|item| {
            item.get("text")
                .and_then(|t| t.as_str())
                .unwrap_or("{}")
                .to_string()
        });

    let Some(text) = first_text else {
        return ToolInvocationResult {
            success: !is_error,
            error: is_error.then(|| "tool reported an error".to_string()),
            payload: data,
        };
    };

    let mut result = match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(serde_json::Value::Object(obj)) => {
            let success = obj.get("success").and_then(|v| v.as_bool()).unwrap_or(true);
            let error = if success {
                None
            } else {
                Some(
                    obj.get("error")
                        .map(|e| e.as_str().map(String::from).unwrap_or_else(|| e.to_string()))
                        .unwrap_or_else(|| "tool reported failure".to_string()),
                )
            };
            ToolInvocationResult {
                success,
                payload: serde_json::Value::Object(obj),
                error,
            }
        }
        Ok(other) => ToolInvocationResult {
            success: true,
            payload: serde_json::json!({ "result": other }),
            error: None,
        },
        Err(_) => ToolInvocationResult {
            success: true,
            payload: serde_json::json!({ "result": text }),
            error: None,
        },
    };

    if is_error && result.success {
        result.success = false;
        result.error = Some(text);
    }
    result
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp_client::testing::{ok_reply, standard_server, Reply, ScriptedLauncher};
    use serde_json::json;

    fn client_with(launcher: Arc<ScriptedLauncher>) -> McpClient {
        McpClient::with_launcher("vygil", ServerConfig::default(), launcher)
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let launcher = Arc::new(ScriptedLauncher::new(standard_server));
        let client = client_with(launcher.clone());

        assert_eq!(client.state().await, TransportState::Unstarted);
        assert!(client.initialize().await);
        assert_eq!(client.state().await, TransportState::Ready);
        assert!(client.initialize().await);

        let requests = launcher.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["method"], "initialize");
        assert_eq!(requests[0]["params"]["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(requests[0]["params"]["clientInfo"]["name"], CLIENT_NAME);
    }

    #[tokio::test]
    async fn test_ids_increase_and_match_in_order() {
        let launcher = Arc::new(ScriptedLauncher::new(standard_server));
        let client = client_with(launcher.clone());

        for _ in 0..5 {
            let result = client.call_tool("extract_text", json!({})).await;
            assert!(result.success);
        }

        let ids: Vec<u64> = launcher
            .requests()
            .iter()
            .map(|r| r["id"].as_u64().unwrap())
            .collect();
        // initialize + 5 calls
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_call_tool_parses_embedded_json() {
        let launcher = Arc::new(ScriptedLauncher::new(standard_server));
        let client = client_with(launcher);

        let result = client
            .call_tool("extract_text", json!({"imageData": "data:image/png;base64,AAAA"}))
            .await;
        assert!(result.success);
        assert_eq!(result.payload["text"], "meeting notes");
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_list_tools() {
        let launcher = Arc::new(ScriptedLauncher::new(standard_server));
        let client = client_with(launcher);

        let tools = client.list_tools().await;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "extract_text");
    }

    #[tokio::test]
    async fn test_id_mismatch_is_reported_and_faults() {
        let launcher = Arc::new(ScriptedLauncher::new(|_, req: &serde_json::Value| {
            match req["method"].as_str() {
                Some("initialize") => ok_reply(req, json!({})),
                _ => {
                    let wrong = req["id"].as_u64().unwrap() + 100;
                    Reply::Json(json!({"jsonrpc": "2.0", "id": wrong, "result": {"content": []}}))
                }
            }
        }));
        let client = client_with(launcher);

        let result = client.call_tool("extract_text", json!({})).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("mismatch"));
        assert_eq!(client.state().await, TransportState::Faulted);
    }

    #[tokio::test]
    async fn test_respawn_after_crash() {
        let launcher = Arc::new(ScriptedLauncher::new(
            |launch: usize, req: &serde_json::Value| match req["method"].as_str() {
                Some("tools/call") if launch == 0 => Reply::Crash,
                _ => standard_server(launch, req),
            },
        ));
        let client = client_with(launcher.clone());

        let first = client.call_tool("extract_text", json!({})).await;
        assert!(!first.success);
        assert_eq!(client.state().await, TransportState::Faulted);

        let second = client.call_tool("extract_text", json!({})).await;
        assert!(second.success, "respawned call failed: {:?}", second.error);
        assert_eq!(client.state().await, TransportState::Ready);
        assert_eq!(launcher.launch_count(), 2);

        // The new process was re-initialized and no id was reused.
        let requests = launcher.requests();
        let methods: Vec<&str> = requests.iter().map(|r| r["method"].as_str().unwrap()).collect();
        assert_eq!(methods, vec!["initialize", "tools/call", "initialize", "tools/call"]);
        let ids: Vec<u64> = requests.iter().map(|r| r["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_cancelled_call_reinitializes_new_process() {
        let launcher = Arc::new(ScriptedLauncher::new(
            |launch: usize, req: &serde_json::Value| match req["method"].as_str() {
                Some("tools/call") if launch == 0 => Reply::Silent,
                _ => standard_server(launch, req),
            },
        ));
        let client = client_with(launcher.clone());
        assert!(client.initialize().await);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(100),
            client.call_tool("extract_text", json!({})),
        )
        .await;
        assert!(abandoned.is_err());

        let second = client.call_tool("extract_text", json!({})).await;
        assert!(second.success, "call after cancellation failed: {:?}", second.error);
        assert_eq!(client.state().await, TransportState::Ready);
        assert_eq!(launcher.launch_count(), 2);

        let requests = launcher.requests();
        let methods: Vec<&str> = requests.iter().map(|r| r["method"].as_str().unwrap()).collect();
        assert_eq!(methods, vec!["initialize", "tools/call", "initialize", "tools/call"]);

        // Ready again: the next call goes straight to the tool.
        assert!(client.call_tool("extract_text", json!({})).await.success);
        assert_eq!(launcher.requests().len(), 5);
    }

    /// Answers `initialize`, serves one `tools/call`, then exits.
    const ONE_SHOT_SERVER: &str = r##"
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed 's/.*"id":\([0-9]*\).*/\1/')
  method=$(printf '%s' "$line" | sed 's/.*"method":"\([^"]*\)".*/\1/')
  echo "$method" >> "$CALL_LOG"
  case "$method" in
    initialize)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05"}}\n' "$id" ;;
    tools/call)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"{\\"success\\":true,\\"text\\":\\"ok\\"}"}]}}\n' "$id"
      exit 0 ;;
  esac
done
"##;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exited_child_is_respawned_and_reinitialized() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");

        let mut config = ServerConfig {
            command: "sh".into(),
            args: vec!["-c".into(), ONE_SHOT_SERVER.into()],
            startup_grace_ms: 50,
            ..ServerConfig::default()
        };
        config
            .env
            .insert("CALL_LOG".into(), log.display().to_string());
        let client = McpClient::new("one-shot", config);

        let first = client.call_tool("extract_text", json!({})).await;
        assert!(first.success, "first call failed: {:?}", first.error);
        assert_eq!(first.payload["text"], "ok");

        // Let the child exit before the next call.
        tokio::time::sleep(Duration::from_millis(300)).await;

        let second = client.call_tool("extract_text", json!({})).await;
        assert!(second.success, "call after exit failed: {:?}", second.error);
        assert_eq!(client.state().await, TransportState::Ready);

        let calls = std::fs::read_to_string(&log).unwrap();
        let methods: Vec<&str> = calls.lines().collect();
        assert_eq!(methods, vec!["initialize", "tools/call", "initialize", "tools/call"]);

        client.close().await;
    }

    #[tokio::test]
    async fn test_timeout_faults_and_recovers() {
        let launcher = Arc::new(ScriptedLauncher::new(
            |launch: usize, req: &serde_json::Value| match req["method"].as_str() {
                Some("tools/call") if launch == 0 => Reply::Silent,
                _ => standard_server(launch, req),
            },
        ));
        let mut client = client_with(launcher.clone());
        client.set_call_timeout(Duration::from_millis(100));

        let first = client.call_tool("extract_text", json!({})).await;
        assert!(!first.success);
        assert!(first.error.unwrap().contains("timed out"));
        assert_eq!(client.state().await, TransportState::Faulted);

        let second = client.call_tool("extract_text", json!({})).await;
        assert!(second.success);
        assert_eq!(launcher.launch_count(), 2);
    }

    #[tokio::test]
    async fn test_server_error_keeps_process() {
        let launcher = Arc::new(ScriptedLauncher::new(|_, req: &serde_json::Value| {
            match req["method"].as_str() {
                Some("initialize") => ok_reply(req, json!({})),
                _ => Reply::Json(json!({
                    "jsonrpc": "2.0",
                    "id": req["id"],
                    "error": {"code": -32602, "message": "Invalid params"}
                })),
            }
        }));
        let client = client_with(launcher.clone());

        let result = client.call_tool("extract_text", json!({})).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Invalid params"));
        assert_eq!(client.state().await, TransportState::Ready);
        assert_eq!(launcher.launch_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_calls_never_interleave() {
        let launcher = Arc::new(ScriptedLauncher::new(|_, req: &serde_json::Value| {
            match req["method"].as_str() {
                Some("initialize") => ok_reply(req, json!({})),
                _ => {
                    let n = req["params"]["arguments"]["n"].clone();
                    let text = json!({"success": true, "text": n.to_string()}).to_string();
                    ok_reply(req, json!({"content": [{"type": "text", "text": text}]}))
                }
            }
        }));
        let client = Arc::new(client_with(launcher.clone()));

        let calls = (0..16).map(|n| {
            let client = client.clone();
            async move {
                let result = client.call_tool("echo", json!({ "n": n })).await;
                (n, result)
            }
        });
        for (n, result) in futures::future::join_all(calls).await {
            assert!(result.success);
            assert_eq!(result.payload["text"], n.to_string());
        }

        let mut ids: Vec<u64> = launcher
            .requests()
            .iter()
            .map(|r| r["id"].as_u64().unwrap())
            .collect();
        let total = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), total);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_shutdown_then_restart() {
        let launcher = Arc::new(ScriptedLauncher::new(standard_server));
        let client = client_with(launcher.clone());

        assert!(client.initialize().await);
        client.shutdown().await;
        client.shutdown().await;
        assert_eq!(client.state().await, TransportState::Unstarted);

        let result = client.call_tool("extract_text", json!({})).await;
        assert!(result.success);
        assert_eq!(launcher.launch_count(), 2);
    }

    #[tokio::test]
    async fn test_close_is_terminal() {
        let launcher = Arc::new(ScriptedLauncher::new(standard_server));
        let client = client_with(launcher.clone());

        client.close().await;
        assert_eq!(client.state().await, TransportState::Closed);
        assert!(!client.initialize().await);

        let result = client.call_tool("extract_text", json!({})).await;
        assert!(!result.success);
        client.shutdown().await;
        assert_eq!(client.state().await, TransportState::Closed);
        assert_eq!(launcher.launch_count(), 0);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_faulted_not_fatal() {
        let config = ServerConfig {
            command: "/nonexistent/vygil-mcp-server".into(),
            ..ServerConfig::default()
        };
        let client = McpClient::new("vygil", config);

        assert!(!client.initialize().await);
        assert_eq!(client.state().await, TransportState::Faulted);
        let result = client.call_tool("extract_text", json!({})).await;
        assert!(!result.success);
        assert!(client.list_tools().await.is_empty());
    }

    #[test]
    fn test_normalize_embedded_failure() {
        let data = json!({"content": [{"type": "text", "text": "{\"success\": false, \"error\": \"no image\"}"}]});
        let result = normalize_tool_result(data);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("no image"));
    }

    #[test]
    fn test_normalize_opaque_text() {
        let data = json!({"content": [{"type": "text", "text": "plain words"}]});
        let result = normalize_tool_result(data);
        assert!(result.success);
        assert_eq!(result.payload["result"], "plain words");
    }

    #[test]
    fn test_normalize_structured_without_content() {
        let data = json!({"text": "direct"});
        let result = normalize_tool_result(data);
        assert!(result.success);
        assert_eq!(result.payload["text"], "direct");
    }

    #[test]
    fn test_normalize_is_error_flag() {
        let data = json!({"isError": true, "content": [{"type": "text", "text": "OCR engine crashed"}]});
        let result = normalize_tool_result(data);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("OCR engine crashed"));
    }
}
