//! JSON-RPC 2.0 framing for MCP communication.
//!
//! Outgoing traffic is requests and notifications; incoming lines are
//! classified into responses (matched to a pending request by id), requests
//! initiated by the server, and server notifications.

use serde::{Deserialize, Serialize};

/// Error code for a method the receiver does not implement.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 notification (no id, no response expected).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
        }
    }
}

/// A response to one of our requests.
#[derive(Debug, Clone)]
pub struct JsonRpcResponse {
    pub id: u64,
    pub result: Option<serde_json::Value>,
    pub error: Option<JsonRpcError>,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// One line read from a server, classified.
#[derive(Debug, Clone)]
pub enum Incoming {
    Response(JsonRpcResponse),
    /// The server asks us something; we answer with an error since the client
    /// advertises no capabilities.
    Request {
        id: serde_json::Value,
        method: String,
    },
    Notification {
        method: String,
    },
    /// An error reply with a null or missing id, as sent when the server
    /// could not parse our request.
    UnattributedError(JsonRpcError),
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

impl Incoming {
    /// Parse and classify a single line of server output.
    pub fn parse(line: &str) -> Result<Self, String> {
        let raw: RawMessage = serde_json::from_str(line).map_err(|e| e.to_string())?;
        match (raw.method, raw.id) {
            (Some(method), Some(id)) => Ok(Incoming::Request { id, method }),
            (Some(method), None) => Ok(Incoming::Notification { method }),
            (None, Some(id)) => {
                let id = id
                    .as_u64()
                    .ok_or_else(|| format!("response id {id} is not one we issued"))?;
                Ok(Incoming::Response(JsonRpcResponse {
                    id,
                    result: raw.result,
                    error: raw.error,
                }))
            }
            (None, None) => match raw.error {
                Some(error) => Ok(Incoming::UnattributedError(error)),
                None => Err("message has neither method nor id".to_string()),
            },
        }
    }
}

/// Serialize an error reply to a server-initiated request.
pub fn method_not_found(id: &serde_json::Value, method: &str) -> String {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": METHOD_NOT_FOUND,
            "message": format!("Method not supported by client: {method}"),
        }
    })
    .to_string()
}
