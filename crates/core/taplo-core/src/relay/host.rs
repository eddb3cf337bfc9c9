use crate::session::Session;
use async_trait::async_trait;
use std::sync::Arc;

/// One row of the host's selection list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerItem {
    pub trigger: String,
    pub annotation: String,
    pub details: String,
}

/// The editor side of a relay action: the active document, clipboard and UI.
#[async_trait]
pub trait EditorHost: Send + Sync {
    /// Live session of the configuration called `name`, if one is running.
    fn session(&self, name: &str) -> Option<Arc<dyn Session>>;

    fn document_uri(&self) -> String;

    /// Text of every selection region, empty regions included.
    fn selections(&self) -> Vec<String>;

    fn document_text(&self) -> String;

    async fn read_clipboard(&self) -> String;

    fn set_clipboard(&self, text: &str);

    /// Inserts `text` at every caret, replacing selected text.
    fn insert(&self, text: &str);

    /// Non-blocking notice, e.g. in a status bar.
    fn status_message(&self, message: &str);

    /// Blocking error dialog.
    fn error_message(&self, message: &str);

    /// Shows `items` and resolves to the chosen index, or a negative value when dismissed.
    async fn select(&self, items: Vec<PickerItem>) -> i64;
}
