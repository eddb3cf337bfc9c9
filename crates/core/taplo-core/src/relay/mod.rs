//! Editor commands forwarded to the taplo server.
//!
//! Each action is independent: gather input, find the session, send one
//! request, then apply the result or report why nothing happened.

pub mod host;

use crate::protocol::{
    methods, AssociateSchemaParams, ConversionRequest, ConversionResponse, ListSchemasParams,
    ListSchemasResponse,
};
use crate::session::Session;
use std::sync::Arc;

pub use host::{EditorHost, PickerItem};

/// Configuration name under which the taplo session is registered.
pub const SESSION_NAME: &str = "taplo";

pub const NO_TEXT_TO_COPY: &str = "No text to copy!";
pub const NO_TEXT_TO_PASTE: &str = "No text to paste!";
pub const NO_SESSION: &str = "No language server session!";
pub const NO_SCHEMAS: &str = "No schemas available!";
pub const EMPTY_CONVERSION: &str = "Converted content is empty, but it shouldn't!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Applied,
    Cancelled,
    NoInput,
    NoSession,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
}

impl Format {
    fn method(self) -> &'static str {
        match self {
            Self::Json => methods::CONVERT_TO_JSON,
            Self::Toml => methods::CONVERT_TO_TOML,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Toml => "TOML",
        }
    }
}

fn session_or_notify(host: &dyn EditorHost) -> Option<Arc<dyn Session>> {
    let session = host.session(SESSION_NAME);
    if session.is_none() {
        host.status_message(NO_SESSION);
    }
    session
}

/// Lists the schemas known to the server and associates the chosen one with the document.
pub async fn assign_schema(host: &dyn EditorHost) -> RelayOutcome {
    let Some(session) = session_or_notify(host) else {
        return RelayOutcome::NoSession;
    };

    let document_uri = host.document_uri();
    let params = ListSchemasParams {
        document_uri: document_uri.clone(),
    };
    let response = match serde_json::to_value(params) {
        Ok(params) => session.request(methods::LIST_SCHEMAS, params).await,
        Err(e) => Err(e.into()),
    };
    let schemas = match response.and_then(|value| {
        serde_json::from_value::<ListSchemasResponse>(value).map_err(Into::into)
    }) {
        Ok(listing) => listing.schemas,
        Err(e) => {
            let message = format!("Failed to list schemas:\n\n{}", e);
            host.error_message(&message);
            return RelayOutcome::Failed(message);
        }
    };

    if schemas.is_empty() {
        host.status_message(NO_SCHEMAS);
        return RelayOutcome::NoInput;
    }

    let items = schemas
        .iter()
        .map(|schema| PickerItem {
            trigger: schema.meta_str("name").to_string(),
            annotation: schema.meta_str("source").to_string(),
            details: schema.meta_str("description").to_string(),
        })
        .collect();

    let index = host.select(items).await;
    let Some(schema) = usize::try_from(index).ok().and_then(|i| schemas.get(i)) else {
        return RelayOutcome::Cancelled;
    };

    let params = AssociateSchemaParams::for_document(&document_uri, schema);
    let sent = match serde_json::to_value(params) {
        Ok(params) => session.notify(methods::ASSOCIATE_SCHEMA, params).await,
        Err(e) => Err(e.into()),
    };
    match sent {
        Ok(()) => {
            log::info!("Associated {} with {}", schema.url, document_uri);
            RelayOutcome::Applied
        }
        Err(e) => {
            let message = format!("Failed to associate schema:\n\n{}", e);
            host.error_message(&message);
            RelayOutcome::Failed(message)
        }
    }
}

/// Copies the selection (or the whole document) to the clipboard as JSON.
pub async fn copy_as_json(host: &dyn EditorHost) -> RelayOutcome {
    let mut text: String = host
        .selections()
        .into_iter()
        .filter(|selection| !selection.trim().is_empty())
        .collect();
    if text.is_empty() {
        text = host.document_text();
    }
    if text.trim().is_empty() {
        host.status_message(NO_TEXT_TO_COPY);
        return RelayOutcome::NoInput;
    }

    let Some(session) = session_or_notify(host) else {
        return RelayOutcome::NoSession;
    };

    match convert(host, session.as_ref(), Format::Json, text).await {
        Ok(converted) => {
            host.set_clipboard(&converted);
            RelayOutcome::Applied
        }
        Err(message) => RelayOutcome::Failed(message),
    }
}

/// Inserts the TOML clipboard content as JSON.
pub async fn paste_as_json(host: &dyn EditorHost) -> RelayOutcome {
    paste_as(host, Format::Json).await
}

/// Inserts the JSON clipboard content as TOML.
pub async fn paste_as_toml(host: &dyn EditorHost) -> RelayOutcome {
    paste_as(host, Format::Toml).await
}

async fn paste_as(host: &dyn EditorHost, format: Format) -> RelayOutcome {
    let clipboard = host.read_clipboard().await;
    let text = clipboard.trim();
    if text.is_empty() {
        host.status_message(NO_TEXT_TO_PASTE);
        return RelayOutcome::NoInput;
    }

    let Some(session) = session_or_notify(host) else {
        return RelayOutcome::NoSession;
    };

    match convert(host, session.as_ref(), format, text.to_string()).await {
        Ok(converted) => {
            host.insert(&converted);
            RelayOutcome::Applied
        }
        Err(message) => RelayOutcome::Failed(message),
    }
}

/// Sends `text` for conversion. On failure the error dialog has already been shown.
async fn convert(
    host: &dyn EditorHost,
    session: &dyn Session,
    format: Format,
    text: String,
) -> Result<String, String> {
    let outcome = match serde_json::to_value(ConversionRequest { text }) {
        Ok(params) => session.request(format.method(), params).await,
        Err(e) => Err(e.into()),
    }
    .and_then(|value| serde_json::from_value::<ConversionResponse>(value).map_err(Into::into));

    let message = match outcome {
        Ok(ConversionResponse {
            error: Some(error), ..
        }) if !error.is_empty() => format!("Failed to convert to {}:\n\n{}", format.label(), error),
        Ok(ConversionResponse {
            text: Some(text), ..
        }) if !text.is_empty() => return Ok(text),
        Ok(_) => EMPTY_CONVERSION.to_string(),
        Err(e) => format!("Failed to convert to {}:\n\n{}", format.label(), e),
    };

    host.error_message(&message);
    Err(message)
}
