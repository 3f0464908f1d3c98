//! MCP session: one connected tool-provider process.
//!
//! Handles the MCP protocol handshake (initialize + initialized notification),
//! tool discovery (tools/list), and tool invocation (tools/call).

use crate::config::LaunchSpec;
use crate::error::McpError;
use crate::jsonrpc::JsonRpcResponse;
use crate::session::ToolSession;
use crate::transport::StdioTransport;
use chorus_types::{
    ChorusError, ImageSource, ImageSourceType, InputSchema, ToolDescriptor, ToolOutput,
    ToolResultContent,
};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;

/// MCP protocol version we support.
const PROTOCOL_VERSION: &str = "2024-11-05";

/// A content item in a tool result, as MCP servers send it.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum McpToolContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Audio, embedded resources and anything newer; not forwarded to the model.
    #[serde(other)]
    Unsupported,
}

#[derive(Deserialize)]
struct ToolsListResult {
    tools: Vec<ToolEntry>,
}

#[derive(Deserialize)]
struct ToolEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    input_schema: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ToolCallResult {
    #[serde(default)]
    content: Vec<McpToolContent>,
    #[serde(default, rename = "isError")]
    is_error: bool,
}

/// Client session for a single MCP server.
pub struct McpSession {
    name: String,
    transport: StdioTransport,
    tools: Vec<ToolDescriptor>,
}

impl McpSession {
    /// Connect to an MCP server: spawn, handshake, discover tools.
    ///
    /// Any failure on the way is a `ChorusError::Connection`; the process is
    /// shut down before the error is returned.
    pub async fn connect(name: impl Into<String>, spec: &LaunchSpec) -> Result<Self, ChorusError> {
        let name = name.into();
        let transport =
            StdioTransport::spawn(&name, spec).map_err(|e| e.into_connection_error(&name))?;

        let mut session = Self {
            name,
            transport,
            tools: Vec::new(),
        };

        match session.handshake().await {
            Ok(tools) => {
                tracing::info!(
                    "MCP server '{}' connected with tools: {:?}",
                    session.name,
                    tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>()
                );
                session.tools = tools;
                Ok(session)
            }
            Err(e) => {
                if let Err(close_err) = session.transport.shutdown().await {
                    tracing::debug!(
                        "Shutting down half-connected MCP server '{}' failed: {close_err}",
                        session.name
                    );
                }
                Err(e.into_connection_error(&session.name))
            }
        }
    }

    async fn handshake(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        let init_params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "chorus",
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let resp = self
            .transport
            .send_request("initialize", Some(init_params))
            .await?;
        self.split_response(resp)?;

        self.transport
            .send_notification("notifications/initialized", None)
            .await?;

        self.fetch_tools().await
    }

    /// Split a response into its result, turning an error object into
    /// `McpError::JsonRpc`.
    fn split_response(&self, resp: JsonRpcResponse) -> Result<Option<serde_json::Value>, McpError> {
        match resp.error {
            Some(err) => Err(McpError::JsonRpc {
                server: self.name.clone(),
                code: err.code,
                message: err.message,
            }),
            None => Ok(resp.result),
        }
    }

    async fn fetch_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        let resp = self.transport.send_request("tools/list", None).await?;
        let Some(result) = self.split_response(resp)? else {
            return Ok(Vec::new());
        };

        let list: ToolsListResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Failed to parse tools/list response: {e}")))?;

        let mut tools = Vec::with_capacity(list.tools.len());
        for entry in list.tools {
            let input_schema = match entry.input_schema {
                None => InputSchema::default(),
                Some(value) => match InputSchema::new(value) {
                    Ok(schema) => schema,
                    Err(e) => {
                        tracing::warn!(
                            "MCP server '{}' tool '{}' skipped: {e}",
                            self.name,
                            entry.name
                        );
                        continue;
                    }
                },
            };
            tools.push(ToolDescriptor {
                name: entry.name,
                description: entry.description.unwrap_or_default(),
                input_schema,
            });
        }
        Ok(tools)
    }

    /// Ask the server for its current tool list.
    ///
    /// The registry routes on the list captured at connect time; this
    /// re-queries the server.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ChorusError> {
        self.fetch_tools()
            .await
            .map_err(|e| e.into_transport_error(&self.name))
    }

    /// Call a tool on this server.
    pub async fn call_tool(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutput, ChorusError> {
        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments,
        });

        let resp = self
            .transport
            .send_request("tools/call", Some(params))
            .await
            .map_err(|e| e.into_call_error(&self.name, tool_name))?;

        let result = self
            .split_response(resp)
            .map_err(|e| e.into_call_error(&self.name, tool_name))?
            .ok_or_else(|| {
                McpError::Protocol("tools/call response has neither result nor error".to_string())
                    .into_transport_error(&self.name)
            })?;

        let call_result: ToolCallResult = serde_json::from_value(result).map_err(|e| {
            McpError::Protocol(format!("Failed to parse tools/call result: {e}"))
                .into_transport_error(&self.name)
        })?;

        Ok(to_tool_output(call_result))
    }

    /// Get the tools discovered at connect time.
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn server_name(&self) -> &str {
        &self.name
    }

    /// Shut down the server connection. Idempotent.
    pub async fn close(&self) -> Result<(), ChorusError> {
        self.transport
            .shutdown()
            .await
            .map_err(|e| e.into_transport_error(&self.name))
    }
}

fn to_tool_output(result: ToolCallResult) -> ToolOutput {
    let content = result
        .content
        .into_iter()
        .filter_map(|c| match c {
            McpToolContent::Text { text } => Some(ToolResultContent::Text { text }),
            McpToolContent::Image { data, mime_type } => Some(ToolResultContent::Image {
                source: ImageSource {
                    source_type: ImageSourceType::Base64,
                    media_type: mime_type,
                    data,
                },
            }),
            McpToolContent::Unsupported => None,
        })
        .collect();

    ToolOutput {
        content,
        is_error: result.is_error,
    }
}

impl ToolSession for McpSession {
    fn server_name(&self) -> &str {
        &self.name
    }

    fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, ChorusError>> + Send + 'a>> {
        Box::pin(McpSession::call_tool(self, name, arguments))
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = Result<(), ChorusError>> + Send + '_>> {
        Box::pin(McpSession::close(self))
    }
}
