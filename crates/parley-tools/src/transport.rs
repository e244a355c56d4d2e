//! Stdio JSON-RPC transport to a tool-provider child process.
//!
//! One reader task routes responses to waiting requests by id; one stderr
//! task forwards provider diagnostics to `tracing`. Requests are written as
//! single lines under the stdin lock and each waits with a timeout.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use parley_ai::Arguments;
use parley_common::ToolError;
use parley_config::ProviderConfig;

use crate::endpoint::EndpointDescriptor;
use crate::protocol::{
    CallToolResult, ClientInfo, Inbound, InitializeParams, InitializeResult, ListToolsResult,
    RpcError, RpcNotification, RpcRequest, METHOD_INITIALIZE, METHOD_INITIALIZED,
    METHOD_TOOLS_CALL, METHOD_TOOLS_LIST, PROTOCOL_VERSION,
};
use crate::{ServerInfo, ToolDescriptor, ToolProvider};

/// Variables every provider inherits so interpreters can start at all.
const INHERITED_ENV: &[&str] = &[
    "HOME", "LANG", "LOGNAME", "PATH", "SHELL", "TEMP", "TERM", "TMP", "TMPDIR", "USER",
];

/// Guards against a provider that keeps handing out cursors.
const MAX_LIST_PAGES: usize = 100;

type RpcReply = Result<serde_json::Value, RpcError>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<RpcReply>>>>;

#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub request_timeout: Duration,
    pub shutdown_grace: Duration,
    /// Extra environment for the child, on top of [`INHERITED_ENV`].
    pub env: Vec<(String, String)>,
    pub client_name: String,
    pub client_version: String,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::from_config(&ProviderConfig::default(), |_| None)
    }
}

impl TransportOptions {
    /// Build from the provider section; `lookup` resolves passthrough variables.
    pub fn from_config(config: &ProviderConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            shutdown_grace: Duration::from_millis(config.shutdown_grace_ms),
            env: config.child_env(lookup),
            client_name: "parley".into(),
            client_version: env!("CARGO_PKG_VERSION").into(),
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }
}

pub struct ToolTransport {
    endpoint: EndpointDescriptor,
    options: TransportOptions,
    stdin: Mutex<Option<ChildStdin>>,
    child: Mutex<Option<Child>>,
    pending: PendingMap,
    next_id: AtomicU64,
    closed: AtomicBool,
    output_closed: Arc<AtomicBool>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl ToolTransport {
    /// Spawn the provider and start routing its output.
    pub async fn connect(
        endpoint: &EndpointDescriptor,
        options: TransportOptions,
    ) -> Result<Self, ToolError> {
        let mut cmd = Command::new(&endpoint.program);
        cmd.args(&endpoint.args)
            .env_clear()
            .envs(
                INHERITED_ENV
                    .iter()
                    .filter_map(|key| std::env::var(key).ok().map(|value| (*key, value))),
            )
            .envs(options.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            ToolError::Transport(format!("failed to start provider `{endpoint}`: {e}"))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ToolError::Transport("provider stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolError::Transport("provider stdout unavailable".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ToolError::Transport("provider stderr unavailable".into()))?;

        info!(provider = %endpoint, pid = child.id(), "tool provider started");

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let output_closed = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(route_responses(
            stdout,
            pending.clone(),
            output_closed.clone(),
        ));

        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                debug!(target: "parley::provider", "{line}");
            }
        });

        Ok(Self {
            endpoint: endpoint.clone(),
            options,
            stdin: Mutex::new(Some(stdin)),
            child: Mutex::new(Some(child)),
            pending,
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            output_closed,
            tasks: std::sync::Mutex::new(vec![reader, stderr_task]),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn write_line(&self, line: String) -> Result<(), ToolError> {
        let mut guard = self.stdin.lock().await;
        let stdin = guard
            .as_mut()
            .ok_or_else(|| ToolError::Transport("transport closed".into()))?;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ToolError::Transport(format!("failed to write request: {e}")))?;
        stdin
            .write_all(b"\n")
            .await
            .map_err(|e| ToolError::Transport(format!("failed to write request: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| ToolError::Transport(format!("failed to flush request: {e}")))
    }

    /// One request/response round-trip. The outer error is the transport's;
    /// the inner one is the provider's JSON-RPC error object.
    async fn round_trip(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<RpcReply, ToolError> {
        if self.is_closed() {
            return Err(ToolError::Transport("transport closed".into()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let payload = serde_json::to_string(&RpcRequest::new(id, method, params))
            .map_err(|e| ToolError::Protocol(format!("failed to encode {method}: {e}")))?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            // The reader raises this flag before it drains the map.
            if self.output_closed.load(Ordering::SeqCst) {
                return Err(ToolError::Transport("provider exited".into()));
            }
            pending.insert(id, tx);
        }

        debug!(id, method, "provider request");
        // The write counts against the timeout: a provider that stops
        // reading fills the pipe and blocks it.
        let exchange = async {
            self.write_line(payload).await?;
            rx.await
                .map_err(|_| ToolError::Transport("transport closed".into()))
        };

        match timeout(self.options.request_timeout, exchange).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => {
                self.pending.lock().await.remove(&id);
                Err(e)
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(ToolError::Timeout(format!(
                    "{method} after {:?}",
                    self.options.request_timeout
                )))
            }
        }
    }

    /// Round-trip where a JSON-RPC error is a protocol failure.
    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: impl Serialize,
    ) -> Result<T, ToolError> {
        let params = serde_json::to_value(params)
            .map_err(|e| ToolError::Protocol(format!("failed to encode {method}: {e}")))?;
        let result = self
            .round_trip(method, params)
            .await?
            .map_err(|e| ToolError::Protocol(format!("{method} failed: {e}")))?;
        serde_json::from_value(result)
            .map_err(|e| ToolError::Protocol(format!("malformed {method} response: {e}")))
    }

    async fn notify(&self, method: &str) -> Result<(), ToolError> {
        let payload = serde_json::to_string(&RpcNotification::new(method))
            .map_err(|e| ToolError::Protocol(format!("failed to encode {method}: {e}")))?;
        self.write_line(payload).await
    }
}

#[async_trait]
impl ToolProvider for ToolTransport {
    async fn initialize(&self) -> Result<ServerInfo, ToolError> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION,
            capabilities: serde_json::json!({}),
            client_info: ClientInfo {
                name: self.options.client_name.clone(),
                version: self.options.client_version.clone(),
            },
        };
        let result: InitializeResult = self.request(METHOD_INITIALIZE, params).await?;
        if let Some(version) = result.protocol_version.as_deref() {
            if version != PROTOCOL_VERSION {
                debug!(server = version, client = PROTOCOL_VERSION, "protocol version differs");
            }
        }
        self.notify(METHOD_INITIALIZED).await?;

        info!(
            server = %result.server_info.name,
            version = %result.server_info.version,
            "tool provider initialized"
        );
        Ok(result.server_info)
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = match &cursor {
                Some(cursor) => serde_json::json!({ "cursor": cursor }),
                None => serde_json::json!({}),
            };
            let page: ListToolsResult = self.request(METHOD_TOOLS_LIST, params).await?;
            tools.extend(page.tools.into_iter().map(ToolDescriptor::from));

            match page.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => return Ok(tools),
            }
        }

        Err(ToolError::Protocol(format!(
            "tools/list did not finish after {MAX_LIST_PAGES} pages"
        )))
    }

    async fn call_tool(&self, name: &str, arguments: Arguments) -> Result<String, ToolError> {
        let params = serde_json::json!({ "name": name, "arguments": arguments });
        let result = self
            .round_trip(METHOD_TOOLS_CALL, params)
            .await?
            .map_err(|e| ToolError::Execution(e.message))?;

        let result: CallToolResult = serde_json::from_value(result)
            .map_err(|e| ToolError::Protocol(format!("malformed tools/call response: {e}")))?;

        let text = result.text();
        if result.is_error {
            return Err(ToolError::Execution(text));
        }
        Ok(text)
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // EOF on stdin is the polite way to ask a stdio server to exit.
        self.stdin.lock().await.take();
        // Dropping the senders fails every waiting request.
        self.pending.lock().await.clear();

        if let Some(mut child) = self.child.lock().await.take() {
            match timeout(self.options.shutdown_grace, child.wait()).await {
                Ok(Ok(status)) => debug!(%status, "tool provider exited"),
                Ok(Err(e)) => warn!(error = %e, "failed to wait for tool provider"),
                Err(_) => {
                    debug!("tool provider still running after grace period, killing");
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "failed to kill tool provider");
                    }
                }
            }
        }

        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }

        info!(provider = %self.endpoint, "tool provider closed");
    }
}

impl Drop for ToolTransport {
    fn drop(&mut self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

/// Read provider stdout until EOF, completing pending requests by id.
async fn route_responses(
    stdout: ChildStdout,
    pending: PendingMap,
    output_closed: Arc<AtomicBool>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "failed to read provider output");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let (id, reply) = match serde_json::from_str::<Inbound>(&line) {
            Ok(Inbound::Success { id, result }) => (id, Ok(result)),
            Ok(Inbound::Error { id, error }) => (id, Err(error)),
            Ok(Inbound::Message { method, id }) => {
                debug!(%method, ?id, "ignoring provider-initiated message");
                continue;
            }
            Err(e) => {
                warn!(error = %e, line = %line, "unparseable provider output");
                continue;
            }
        };

        match pending.lock().await.remove(&id) {
            Some(tx) => {
                let _ = tx.send(reply);
            }
            None => debug!(id, "response for unknown or expired request"),
        }
    }

    debug!("provider output closed");
    output_closed.store(true, Ordering::SeqCst);
    pending.lock().await.clear();
}
