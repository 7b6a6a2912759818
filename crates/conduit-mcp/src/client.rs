// SPDX-License-Identifier: Apache-2.0
//! The MCP client (`spec.md` §4.14 "Client"): spawns an MCP server as a
//! child process and speaks JSON-RPC 2.0 over its stdin/stdout, one JSON
//! object per line. Writes are mutex-serialized because the channel is a
//! single pipe; a background reader task correlates responses by id and
//! silently discards anything it doesn't recognize (notifications, or
//! responses to ids nobody is waiting on).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use crate::error::{McpError, McpResult};
use crate::protocol::{parse_line, RpcRequest, ToolCallResult, ToolDescriptor, ToolsListResult};

const PROTOCOL_VERSION: &str = "2024-11-05";
const CALL_TIMEOUT: Duration = Duration::from_secs(60);

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<crate::protocol::RpcResponse>>>>;

/// Configuration for one `tools.servers.<name>` entry (`spec.md` §6.4).
#[derive(Debug, Clone)]
pub struct McpServerSpec {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

pub struct McpClient {
    name: String,
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    next_id: AtomicU64,
    pending: PendingMap,
    reader: tokio::task::JoinHandle<()>,
}

impl McpClient {
    pub async fn spawn(spec: McpServerSpec) -> McpResult<Self> {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true);
        let mut child = cmd.spawn()?;

        let stdin = child.stdin.take().ok_or(McpError::Closed)?;
        let stdout = child.stdout.take().ok_or(McpError::Closed)?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let reader_pending = pending.clone();
        let server_name = spec.name.clone();
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match parse_line(&line) {
                            Some(resp) => {
                                if let Some(id) = resp.id {
                                    let mut map = reader_pending.lock().await;
                                    if let Some(tx) = map.remove(&id) {
                                        let _ = tx.send(resp);
                                    }
                                    // Unknown id: discard, per §4.14.
                                } // no id: notification, discard
                            }
                            None => {
                                warn!(server = %server_name, line, "MCP: malformed JSON-RPC line, discarding");
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(server = %server_name, error = %e, "MCP: stdout read error");
                        break;
                    }
                }
            }
        });

        let client = McpClient {
            name: spec.name,
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            next_id: AtomicU64::new(1),
            pending,
            reader,
        };
        client.initialize().await?;
        Ok(client)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self) -> McpResult<()> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": { "name": "conduit", "version": env!("CARGO_PKG_VERSION") },
        });
        self.call("initialize", params).await?;
        self.notify("notifications/initialized", json!({})).await?;
        debug!(server = %self.name, "MCP: initialized");
        Ok(())
    }

    async fn write_line(&self, req: &RpcRequest) -> McpResult<()> {
        let mut line = serde_json::to_string(req)
            .map_err(|e| McpError::Protocol(format!("failed to serialize request: {e}")))?;
        line.push('\n');
        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(McpError::Spawn)?;
        stdin.flush().await.map_err(McpError::Spawn)
    }

    async fn notify(&self, method: &str, params: Value) -> McpResult<()> {
        self.write_line(&RpcRequest::notification(method, params)).await
    }

    async fn call(&self, method: &str, params: Value) -> McpResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if let Err(e) = self.write_line(&RpcRequest::call(id, method, params)).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let resp = tokio::time::timeout(CALL_TIMEOUT, rx)
            .await
            .map_err(|_| McpError::Timeout(self.name.clone()))?
            .map_err(|_| McpError::Closed)?;

        if let Some(err) = resp.error {
            return Err(McpError::Remote {
                code: err.code,
                message: err.message,
            });
        }
        resp.result.ok_or_else(|| McpError::Protocol("response had neither result nor error".into()))
    }

    pub async fn list_tools(&self) -> McpResult<Vec<ToolDescriptor>> {
        let result = self.call("tools/list", json!({})).await?;
        let parsed: ToolsListResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("bad tools/list result: {e}")))?;
        Ok(parsed.tools)
    }

    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> McpResult<ToolCallResult> {
        let result = self
            .call("tools/call", json!({ "name": tool_name, "arguments": arguments }))
            .await?;
        serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("bad tools/call result: {e}")))
    }

    /// Send SIGINT and wait for exit, per the proxy's shutdown sequence
    /// (`spec.md` §5 "Resource lifetimes").
    pub async fn shutdown(&self) {
        self.reader.abort();
        let mut child = self.child.lock().await;
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                unsafe {
                    libc::kill(pid as libc::pid_t, libc::SIGINT);
                }
            }
        }
        let _ = child.wait().await;
    }
}
