//! In-memory server doubles for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

use super::errors::McpError;
use super::lifecycle::{ProcessLauncher, ServerProcess};
use super::types::ServerConfig;

/// What the scripted server does with one request.
pub(crate) enum Reply {
    /// Write this value as the response line.
    Json(Value),
    /// Write this raw line.
    Line(String),
    /// Close both pipes without answering.
    Crash,
    /// Never answer this request.
    Silent,
}

type Responder = Arc<dyn Fn(usize, &Value) -> Reply + Send + Sync>;

/// Launches a scripted server task over duplex pipes.
///
/// The responder receives the launch index (0 for the first process) and the
/// parsed request.
pub(crate) struct ScriptedLauncher {
    responder: Responder,
    launches: AtomicUsize,
    requests: Arc<Mutex<Vec<Value>>>,
}

impl ScriptedLauncher {
    pub(crate) fn new<F>(responder: F) -> Self
    where
        F: Fn(usize, &Value) -> Reply + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            launches: AtomicUsize::new(0),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Every request received so far, across all launches.
    pub(crate) fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

impl ProcessLauncher for ScriptedLauncher {
    fn launch(&self, _server_name: &str, _config: &ServerConfig) -> Result<ServerProcess, McpError> {
        let index = self.launches.fetch_add(1, Ordering::SeqCst);
        let (client_in, server_in) = tokio::io::duplex(64 * 1024);
        let (server_out, client_out) = tokio::io::duplex(64 * 1024);

        tokio::spawn(serve(
            index,
            server_in,
            server_out,
            self.responder.clone(),
            self.requests.clone(),
        ));

        Ok(ServerProcess::from_streams(
            Box::new(client_in),
            Box::new(client_out),
        ))
    }
}

async fn serve(
    index: usize,
    input: DuplexStream,
    mut output: DuplexStream,
    responder: Responder,
    requests: Arc<Mutex<Vec<Value>>>,
) {
    let mut reader = BufReader::new(input);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let Ok(request) = serde_json::from_str::<Value>(line.trim()) else {
            continue;
        };
        requests.lock().unwrap().push(request.clone());

        let reply = match responder(index, &request) {
            Reply::Json(value) => value.to_string(),
            Reply::Line(raw) => raw,
            Reply::Crash => return,
            Reply::Silent => continue,
        };
        if output.write_all(format!("{reply}\n").as_bytes()).await.is_err() {
            break;
        }
    }
}

/// A success response echoing the request id.
pub(crate) fn ok_reply(request: &Value, result: Value) -> Reply {
    Reply::Json(json!({
        "jsonrpc": "2.0",
        "id": request["id"],
        "result": result,
    }))
}

/// A well-behaved OCR server exposing `extract_text`.
pub(crate) fn standard_server(_launch: usize, request: &Value) -> Reply {
    match request["method"].as_str() {
        Some("initialize") => ok_reply(
            request,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "vygil-mcp-server", "version": "1.0.0"}
            }),
        ),
        Some("tools/list") => ok_reply(
            request,
            json!({"tools": [{"name": "extract_text", "description": "OCR an image"}]}),
        ),
        Some("tools/call") => {
            let text = json!({"success": true, "text": "meeting notes"}).to_string();
            ok_reply(request, json!({"content": [{"type": "text", "text": text}]}))
        }
        _ => Reply::Json(json!({
            "jsonrpc": "2.0",
            "id": request["id"],
            "error": {"code": -32601, "message": "Method not found"}
        })),
    }
}
