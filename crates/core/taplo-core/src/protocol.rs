use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Custom methods of the taplo language server.
pub mod methods {
    pub const LIST_SCHEMAS: &str = "taplo/listSchemas";
    pub const ASSOCIATE_SCHEMA: &str = "taplo/associateSchema";
    pub const CONVERT_TO_JSON: &str = "taplo/convertToJson";
    pub const CONVERT_TO_TOML: &str = "taplo/convertToToml";
}

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: Some(id),
            method: method.into(),
            params,
        }
    }

    /// Notification (no id, no response expected).
    pub fn notification(method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: None,
            method: method.into(),
            params,
        }
    }
}

impl JsonRpcResponse {
    /// Reply to a request initiated by the server.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }
}

/// Any message read from the server: a response to one of our requests,
/// a request the server wants answered, or a notification.
#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

// ---------------------------------------------------------------------------
// taplo payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResponse {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSchemasParams {
    pub document_uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListSchemasResponse {
    #[serde(default)]
    pub schemas: Vec<SchemaEntry>,
}

/// One catalog entry. `meta` is kept as sent so it can be echoed back on association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaEntry {
    pub url: String,
    #[serde(default)]
    pub meta: Value,
}

impl SchemaEntry {
    /// String field of `meta` for display; missing or non-string values read as empty.
    pub fn meta_str(&self, key: &str) -> &str {
        self.meta.get(key).and_then(Value::as_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationRule {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociateSchemaParams {
    pub document_uri: String,
    pub schema_uri: String,
    pub rule: AssociationRule,
    pub meta: Value,
}

impl AssociateSchemaParams {
    /// Association of `schema` with exactly the document at `document_uri`.
    pub fn for_document(document_uri: &str, schema: &SchemaEntry) -> Self {
        Self {
            document_uri: document_uri.to_string(),
            schema_uri: schema.url.clone(),
            rule: AssociationRule {
                url: document_uri.to_string(),
            },
            meta: schema.meta.clone(),
        }
    }
}
