//! Stdio transport for MCP server communication.
//!
//! Spawns a child process and manages async communication over stdin/stdout
//! using newline-delimited JSON-RPC messages. The child's stderr is forwarded
//! to the log.

use crate::config::LaunchSpec;
use crate::error::McpError;
use crate::jsonrpc::{Incoming, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use chorus_types::preview;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

/// How long a server gets to exit after its stdin closes before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// Async stdio transport for communicating with an MCP server process.
pub struct StdioTransport {
    server: String,
    next_id: AtomicU64,
    /// `None` once shutdown has started.
    write_tx: Mutex<Option<mpsc::Sender<String>>>,
    pending: PendingMap,
    /// Set by the reader task when the server's stdout reaches EOF.
    closed: Arc<AtomicBool>,
    /// Held for the duration of one request: one in-flight call per server.
    in_flight: Mutex<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    child: Mutex<Option<Child>>,
    timeout_ms: u64,
}

impl StdioTransport {
    /// Spawn a child process and start background reader/writer tasks.
    pub fn spawn(server: &str, spec: &LaunchSpec) -> Result<Self, McpError> {
        spec.validate(server)?;

        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
            name: server.to_string(),
            source: e,
        })?;

        let (Some(stdin), Some(stdout), stderr) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(McpError::Protocol(format!(
                "stdio pipes of MCP server '{server}' were not captured"
            )));
        };

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        // Writer task: drains channel and writes to child stdin
        let (write_tx, mut write_rx) = mpsc::channel::<String>(64);
        let writer_handle = tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(msg) = write_rx.recv().await {
                if stdin.write_all(msg.as_bytes()).await.is_err()
                    || stdin.write_all(b"\n").await.is_err()
                    || stdin.flush().await.is_err()
                {
                    break;
                }
            }
        });

        // Reader task: reads lines from stdout, classifies, dispatches.
        // Holds only a weak sender so dropping `write_tx` still closes stdin.
        let reply_tx = write_tx.downgrade();
        let pending_for_reader = Arc::clone(&pending);
        let closed_for_reader = Arc::clone(&closed);
        let name = server.to_string();
        let reader_handle = tokio::spawn(async move {
            let mut stdout = BufReader::new(stdout);
            let mut buf = Vec::new();
            while let Some(line) = next_line(&mut stdout, &mut buf).await {
                if line.trim().is_empty() {
                    continue;
                }
                match Incoming::parse(&line) {
                    Ok(Incoming::Response(resp)) => {
                        let mut pending = pending_for_reader.lock().await;
                        match pending.remove(&resp.id) {
                            Some(tx) => {
                                let _ = tx.send(resp);
                            }
                            None => tracing::debug!(
                                "MCP server '{name}' answered unknown request id {}",
                                resp.id
                            ),
                        }
                    }
                    Ok(Incoming::Request { id, method }) => {
                        tracing::debug!("MCP server '{name}' sent unsupported request '{method}'");
                        if let Some(tx) = reply_tx.upgrade() {
                            let _ = tx.send(crate::jsonrpc::method_not_found(&id, &method)).await;
                        }
                    }
                    Ok(Incoming::Notification { method }) => {
                        tracing::debug!("MCP server '{name}' notification: {method}");
                    }
                    Ok(Incoming::UnattributedError(error)) => {
                        // Requests are serialized, so it belongs to the one in flight
                        let mut pending = pending_for_reader.lock().await;
                        let only = match pending.len() {
                            1 => pending.keys().next().copied(),
                            _ => None,
                        };
                        match only.and_then(|id| pending.remove_entry(&id)) {
                            Some((id, tx)) => {
                                let _ = tx.send(JsonRpcResponse {
                                    id,
                                    result: None,
                                    error: Some(error),
                                });
                            }
                            None => tracing::warn!(
                                "MCP server '{name}' sent an error without id: {}",
                                error.message
                            ),
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Failed to parse line from MCP server '{name}': {e}: {}",
                            preview(&line, 200)
                        );
                    }
                }
            }
            closed_for_reader.store(true, Ordering::SeqCst);
            // Dropping the senders wakes every waiter with an error
            pending_for_reader.lock().await.clear();
            tracing::debug!("MCP server '{name}' closed its stdout");
        });

        let mut tasks = vec![writer_handle, reader_handle];
        if let Some(stderr) = stderr {
            let name = server.to_string();
            tasks.push(tokio::spawn(async move {
                let mut stderr = BufReader::new(stderr);
                let mut buf = Vec::new();
                while let Some(line) = next_line(&mut stderr, &mut buf).await {
                    tracing::debug!(target: "chorus_mcp::stderr", "[{name}] {line}");
                }
            }));
        }

        Ok(Self {
            server: server.to_string(),
            next_id: AtomicU64::new(1),
            write_tx: Mutex::new(Some(write_tx)),
            pending,
            closed,
            in_flight: Mutex::new(()),
            tasks: Mutex::new(tasks),
            child: Mutex::new(Some(child)),
            timeout_ms: spec.timeout_ms,
        })
    }

    fn closed_error(&self) -> McpError {
        McpError::TransportClosed {
            server: self.server.clone(),
        }
    }

    async fn write(&self, line: String) -> Result<(), McpError> {
        let tx = self
            .write_tx
            .lock()
            .await
            .clone()
            .ok_or_else(|| self.closed_error())?;
        tx.send(line).await.map_err(|_| self.closed_error())
    }

    /// Send a JSON-RPC request and wait for the response.
    ///
    /// Requests on one transport are serialized: a second caller waits until
    /// the first has its response.
    pub async fn send_request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse, McpError> {
        let _gate = self.in_flight.lock().await;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        let serialized = serde_json::to_string(&request)?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if self.closed.load(Ordering::SeqCst) {
                return Err(self.closed_error());
            }
            pending.insert(id, tx);
        }

        if let Err(e) = self.write(serialized).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(Duration::from_millis(self.timeout_ms), rx).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(_)) => Err(self.closed_error()),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(McpError::Timeout {
                    server: self.server.clone(),
                    method: method.to_string(),
                    timeout_ms: self.timeout_ms,
                })
            }
        }
    }

    /// Send a JSON-RPC notification (fire-and-forget, no response expected).
    pub async fn send_notification(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        let notification = JsonRpcNotification::new(method, params);
        self.write(serde_json::to_string(&notification)?).await
    }

    /// Whether the server's output stream has ended.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Shut down the transport: close stdin, wait briefly, then kill.
    ///
    /// Safe to call more than once; later calls do nothing.
    pub async fn shutdown(&self) -> Result<(), McpError> {
        // Dropping the last strong sender ends the writer task, which closes
        // the child's stdin
        if self.write_tx.lock().await.take().is_none() {
            return Ok(());
        }

        let result = match self.child.lock().await.take() {
            Some(mut child) => {
                let waited = tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await;
                match waited {
                    Ok(Ok(status)) => {
                        tracing::debug!("MCP server '{}' exited with {status}", self.server);
                        Ok(())
                    }
                    Ok(Err(e)) => Err(McpError::Io(e)),
                    Err(_) => {
                        tracing::debug!(
                            "MCP server '{}' did not exit within {SHUTDOWN_GRACE:?}, killing",
                            self.server
                        );
                        child.kill().await.map_err(McpError::Io)
                    }
                }
            }
            None => Ok(()),
        };

        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        self.closed.store(true, Ordering::SeqCst);
        self.pending.lock().await.clear();

        result
    }
}

/// Read one newline-terminated line. Invalid UTF-8 is replaced rather than
/// ending the stream; `None` means EOF or a read error.
async fn next_line<R: AsyncBufRead + Unpin>(reader: &mut R, buf: &mut Vec<u8>) -> Option<String> {
    buf.clear();
    match reader.read_until(b'\n', buf).await {
        Ok(0) | Err(_) => None,
        Ok(_) => {
            let line = String::from_utf8_lossy(buf.as_slice());
            Some(line.trim_end_matches(['\r', '\n']).to_string())
        }
    }
}
