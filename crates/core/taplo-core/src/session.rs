//! Client side of a language server session over stdio.
//!
//! Messages use the LSP base protocol (`Content-Length` header, JSON body).
//! One reader task owns the server's output: it routes responses to the
//! waiting request, answers server-initiated requests and logs notifications.

use crate::error::{AppError, AppResult};
use crate::protocol::{IncomingMessage, JsonRpcRequest, JsonRpcResponse};
use async_trait::async_trait;
use lsp_types::{ClientCapabilities, ClientInfo, InitializeParams, Url};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Request/notification channel to a running language server.
#[async_trait]
pub trait Session: Send + Sync {
    /// Sends a request and waits for its result.
    async fn request(&self, method: &str, params: Value) -> AppResult<Value>;

    /// Sends a notification; nothing is awaited from the server.
    async fn notify(&self, method: &str, params: Value) -> AppResult<()>;
}

type Writer = Arc<tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<AppResult<Value>>>>>;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct LspSession {
    writer: Writer,
    pending: Pending,
    closed: Arc<AtomicBool>,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
    child: tokio::sync::Mutex<Option<Child>>,
}

impl LspSession {
    /// Starts `program` with `args` and connects to its stdio.
    pub fn spawn(program: &str, args: &[String], env: &BTreeMap<String, String>) -> AppResult<Self> {
        let mut child = Command::new(program)
            .args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::Internal(format!("Failed to start {}: {}", program, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::Internal("Server stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Internal("Server stdout not captured".into()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log::debug!("taplo stderr: {}", line);
                }
            });
        }

        log::info!("Started language server {} {}", program, args.join(" "));
        let mut session = Self::from_streams(stdout, stdin);
        session.child = tokio::sync::Mutex::new(Some(child));
        Ok(session)
    }

    /// Connects to a server reachable through the given byte streams.
    pub fn from_streams<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let writer: Writer = Arc::new(tokio::sync::Mutex::new(Box::new(writer)));
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let reader = tokio::spawn(dispatch_loop(
            BufReader::new(reader),
            writer.clone(),
            pending.clone(),
            closed.clone(),
        ));

        Self {
            writer,
            pending,
            closed,
            next_id: AtomicU64::new(1),
            reader,
            child: tokio::sync::Mutex::new(None),
        }
    }

    /// Performs the `initialize` / `initialized` handshake.
    pub async fn initialize(
        &self,
        root_uri: Option<Url>,
        initialization_options: Value,
    ) -> AppResult<Value> {
        let params = InitializeParams {
            process_id: Some(std::process::id()),
            root_uri,
            initialization_options: Some(initialization_options),
            capabilities: ClientCapabilities::default(),
            client_info: Some(ClientInfo {
                name: "taplo-ext".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            ..Default::default()
        };

        let result = self
            .request("initialize", serde_json::to_value(params)?)
            .await?;
        self.notify("initialized", json!({})).await?;
        Ok(result)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Asks the server to exit and reaps the process.
    pub async fn shutdown(&self) -> AppResult<()> {
        if !self.is_closed() {
            if let Err(e) = self.request("shutdown", Value::Null).await {
                log::warn!("Language server rejected shutdown: {}", e);
            }
            let _ = self.notify("exit", Value::Null).await;
        }

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, child.wait()).await {
                Ok(status) => log::info!("Language server exited: {:?}", status),
                Err(_) => {
                    log::warn!("Language server did not exit in time, killing it");
                    child.kill().await.map_err(AppError::IoGeneric)?;
                }
            }
        }
        Ok(())
    }

    async fn send(&self, message: &JsonRpcRequest) -> AppResult<()> {
        let body = serde_json::to_vec(message)?;
        let mut writer = self.writer.lock().await;
        write_message(&mut *writer, &body)
            .await
            .map_err(|e| AppError::Protocol(format!("Send to server: {}", e)))
    }
}

#[async_trait]
impl Session for LspSession {
    async fn request(&self, method: &str, params: Value) -> AppResult<Value> {
        if self.is_closed() {
            return Err(AppError::SessionClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);
        if self.is_closed() {
            self.pending.lock().remove(&id);
            return Err(AppError::SessionClosed);
        }

        if let Err(e) = self.send(&JsonRpcRequest::new(id, method, params)).await {
            self.pending.lock().remove(&id);
            return Err(e);
        }

        rx.await.map_err(|_| AppError::SessionClosed)?
    }

    async fn notify(&self, method: &str, params: Value) -> AppResult<()> {
        if self.is_closed() {
            return Err(AppError::SessionClosed);
        }
        self.send(&JsonRpcRequest::notification(method, params)).await
    }
}

impl Drop for LspSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn dispatch_loop<R>(mut reader: R, writer: Writer, pending: Pending, closed: Arc<AtomicBool>)
where
    R: AsyncBufRead + Unpin,
{
    loop {
        match read_message(&mut reader).await {
            Ok(Some(body)) => handle_incoming(&body, &writer, &pending).await,
            Ok(None) => {
                log::info!("Language server closed its output");
                break;
            }
            Err(e) => {
                log::warn!("Dropping language server connection: {}", e);
                break;
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    for (_, tx) in pending.lock().drain() {
        let _ = tx.send(Err(AppError::SessionClosed));
    }
}

async fn handle_incoming(body: &[u8], writer: &Writer, pending: &Pending) {
    let message: IncomingMessage = match serde_json::from_slice(body) {
        Ok(message) => message,
        Err(e) => {
            log::warn!("Ignoring malformed server message: {}", e);
            return;
        }
    };

    match (message.method, message.id) {
        (Some(method), Some(id)) => {
            log::debug!("Server request {}", method);
            let result = server_request_result(&method, &message.params);
            let reply = JsonRpcResponse::success(id, result);
            let sent = match serde_json::to_vec(&reply) {
                Ok(body) => {
                    let mut writer = writer.lock().await;
                    write_message(&mut *writer, &body).await.map_err(AppError::from)
                }
                Err(e) => Err(AppError::from(e)),
            };
            if let Err(e) = sent {
                log::warn!("Failed to answer server request {}: {}", method, e);
            }
        }
        (Some(method), None) => match method.as_str() {
            "window/logMessage" | "window/showMessage" => {
                let text = message.params.get("message").and_then(Value::as_str).unwrap_or_default();
                log::debug!("taplo: {}", text);
            }
            _ => log::debug!("Server notification {}", method),
        },
        (None, Some(id)) => {
            let Some(id) = id.as_u64() else {
                log::warn!("Response with unexpected id {}", id);
                return;
            };
            let Some(tx) = pending.lock().remove(&id) else {
                log::warn!("Response to unknown request {}", id);
                return;
            };
            let outcome = match message.error {
                Some(err) => Err(AppError::Rpc {
                    code: err.code,
                    message: err.message,
                }),
                None => Ok(message.result.unwrap_or(Value::Null)),
            };
            let _ = tx.send(outcome);
        }
        (None, None) => log::warn!("Ignoring server message without method or id"),
    }
}

/// Result sent back for requests the server initiates. Configuration
/// lookups get one `null` per requested item, everything else a `null`.
fn server_request_result(method: &str, params: &Value) -> Value {
    if method == "workspace/configuration" {
        let count = params
            .get("items")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        return Value::Array(vec![Value::Null; count]);
    }
    Value::Null
}

/// Writes one framed message.
pub async fn write_message<W>(writer: &mut W, body: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await
}

/// Reads one framed message body. `Ok(None)` on a clean end of stream.
pub async fn read_message<R>(reader: &mut R) -> AppResult<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            if saw_header {
                return Err(AppError::Protocol("Stream ended inside message header".into()));
            }
            return Ok(None);
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            if saw_header {
                break;
            }
            continue;
        }
        saw_header = true;

        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                let length = value.trim().parse().map_err(|_| {
                    AppError::Protocol(format!("Invalid Content-Length: {}", value.trim()))
                })?;
                content_length = Some(length);
            }
        }
    }

    let length =
        content_length.ok_or_else(|| AppError::Protocol("Missing Content-Length header".into()))?;
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn framing_reads_back_written_messages() {
        let (mut a, b) = duplex(1024);
        write_message(&mut a, br#"{"a":1}"#).await.unwrap();
        a.write_all(b"Content-Length: 2\r\nContent-Type: application/vscode-jsonrpc\r\n\r\n{}")
            .await
            .unwrap();
        drop(a);

        let mut reader = BufReader::new(b);
        assert_eq!(read_message(&mut reader).await.unwrap().unwrap(), br#"{"a":1}"#);
        assert_eq!(read_message(&mut reader).await.unwrap().unwrap(), b"{}");
        assert!(read_message(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_length_is_a_protocol_error() {
        let (mut a, b) = duplex(1024);
        a.write_all(b"Content-Type: x\r\n\r\n{}").await.unwrap();
        drop(a);

        let mut reader = BufReader::new(b);
        assert!(matches!(
            read_message(&mut reader).await,
            Err(AppError::Protocol(_))
        ));
    }

    #[test]
    fn configuration_requests_get_one_entry_per_item() {
        let params = json!({"items": [{"section": "evenBetterToml"}, {"section": "taplo"}]});
        assert_eq!(
            server_request_result("workspace/configuration", &params),
            json!([null, null])
        );
        assert_eq!(
            server_request_result("client/registerCapability", &Value::Null),
            Value::Null
        );
    }
}
