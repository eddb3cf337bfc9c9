//! Fixtures shared by the integration tests: an in-memory release feed, a
//! scripted server session and a recording editor host.

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use taplo_core::installer::{ReleaseFeed, VersionResolution};
use taplo_core::relay::{EditorHost, PickerItem};
use taplo_core::{AppError, AppResult, Session};

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// Release feed serving one gzip payload and a fixed "latest" answer.
pub struct FakeFeed {
    pub latest: VersionResolution,
    pub payload: Vec<u8>,
    pub latest_calls: Arc<AtomicUsize>,
    pub downloads: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeFeed {
    pub fn new(latest: VersionResolution, binary: &[u8]) -> Self {
        Self {
            latest,
            payload: gzip(binary),
            latest_calls: Arc::new(AtomicUsize::new(0)),
            downloads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn resolving(version: &str) -> Self {
        Self::new(VersionResolution::Resolved(version.to_string()), b"#!taplo")
    }

    pub fn offline() -> Self {
        Self::new(
            VersionResolution::Unresolved("network unreachable".to_string()),
            b"#!taplo",
        )
    }

    pub fn network_calls(&self) -> usize {
        self.latest_calls.load(Ordering::SeqCst) + self.downloads.lock().len()
    }
}

impl ReleaseFeed for FakeFeed {
    fn latest_version(&self) -> VersionResolution {
        self.latest_calls.fetch_add(1, Ordering::SeqCst);
        self.latest.clone()
    }

    fn download(&self, version: &str, asset: &str) -> AppResult<Box<dyn Read + Send>> {
        self.downloads
            .lock()
            .push((version.to_string(), asset.to_string()));
        Ok(Box::new(Cursor::new(self.payload.clone())))
    }
}

/// Session answering each method with a scripted reply and recording what was sent.
#[derive(Default)]
pub struct ScriptedSession {
    replies: Mutex<HashMap<String, Result<Value, String>>>,
    pub requests: Mutex<Vec<(String, Value)>>,
    pub notifications: Mutex<Vec<(String, Value)>>,
}

impl ScriptedSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(self: &Arc<Self>, method: &str, result: Value) -> Arc<Self> {
        self.replies.lock().insert(method.to_string(), Ok(result));
        self.clone()
    }

    pub fn fail(self: &Arc<Self>, method: &str, message: &str) -> Arc<Self> {
        self.replies
            .lock()
            .insert(method.to_string(), Err(message.to_string()));
        self.clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn request(&self, method: &str, params: Value) -> AppResult<Value> {
        self.requests.lock().push((method.to_string(), params));
        match self.replies.lock().get(method) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(message)) => Err(AppError::Rpc {
                code: -32603,
                message: message.clone(),
            }),
            None => Err(AppError::Rpc {
                code: -32601,
                message: format!("method not found: {}", method),
            }),
        }
    }

    async fn notify(&self, method: &str, params: Value) -> AppResult<()> {
        self.notifications.lock().push((method.to_string(), params));
        Ok(())
    }
}

/// Editor host with canned input that records every effect.
pub struct RecordingHost {
    pub session: Option<Arc<dyn Session>>,
    pub uri: String,
    pub selections: Vec<String>,
    pub document: String,
    pub clipboard_in: String,
    pub pick: i64,
    pub clipboard_out: Mutex<Option<String>>,
    pub inserted: Mutex<Vec<String>>,
    pub statuses: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
    pub shown_items: Mutex<Vec<PickerItem>>,
}

impl RecordingHost {
    pub fn new(session: Option<Arc<dyn Session>>) -> Self {
        Self {
            session,
            uri: "file:///project/Cargo.toml".to_string(),
            selections: Vec::new(),
            document: String::new(),
            clipboard_in: String::new(),
            pick: -1,
            clipboard_out: Mutex::new(None),
            inserted: Mutex::new(Vec::new()),
            statuses: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            shown_items: Mutex::new(Vec::new()),
        }
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

#[async_trait]
impl EditorHost for RecordingHost {
    fn session(&self, name: &str) -> Option<Arc<dyn Session>> {
        assert_eq!(name, taplo_core::relay::SESSION_NAME);
        self.session.clone()
    }

    fn document_uri(&self) -> String {
        self.uri.clone()
    }

    fn selections(&self) -> Vec<String> {
        self.selections.clone()
    }

    fn document_text(&self) -> String {
        self.document.clone()
    }

    async fn read_clipboard(&self) -> String {
        self.clipboard_in.clone()
    }

    fn set_clipboard(&self, text: &str) {
        *self.clipboard_out.lock() = Some(text.to_string());
    }

    fn insert(&self, text: &str) {
        self.inserted.lock().push(text.to_string());
    }

    fn status_message(&self, message: &str) {
        self.statuses.lock().push(message.to_string());
    }

    fn error_message(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }

    async fn select(&self, items: Vec<PickerItem>) -> i64 {
        *self.shown_items.lock() = items;
        self.pick
    }
}
