//! Error types for MCP operations.

use chorus_types::ChorusError;
use thiserror::Error;

/// Wire-level errors from MCP server communication.
///
/// These are mapped into the [`ChorusError`] taxonomy by the session, because
/// the same failure means different things during the handshake and during a
/// tool call.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Failed to spawn MCP server '{name}': {source}")]
    SpawnFailed {
        name: String,
        source: std::io::Error,
    },

    #[error("Invalid launch spec for MCP server '{name}': {message}")]
    InvalidLaunchSpec { name: String, message: String },

    #[error("MCP server '{server}' closed its connection")]
    TransportClosed { server: String },

    #[error("JSON-RPC error from '{server}' (code {code}): {message}")]
    JsonRpc {
        server: String,
        code: i64,
        message: String,
    },

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("MCP server '{server}' timed out on '{method}' after {timeout_ms}ms")]
    Timeout {
        server: String,
        method: String,
        timeout_ms: u64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// Map a failure during spawn or handshake.
    pub fn into_connection_error(self, server: &str) -> ChorusError {
        ChorusError::Connection {
            server: server.to_string(),
            message: self.to_string(),
        }
    }

    /// Map a failure during `tools/call`.
    ///
    /// A JSON-RPC error object is the provider refusing the call, so it
    /// becomes a tool invocation error. Everything else means the stream is
    /// no longer usable.
    pub fn into_call_error(self, server: &str, tool: &str) -> ChorusError {
        match self {
            McpError::JsonRpc { code, message, .. } => ChorusError::ToolInvocation {
                tool: tool.to_string(),
                message: format!("{message} (code {code})"),
            },
            other => ChorusError::Transport {
                server: server.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Map any other failure on an established session.
    pub fn into_transport_error(self, server: &str) -> ChorusError {
        ChorusError::Transport {
            server: server.to_string(),
            message: self.to_string(),
        }
    }
}
