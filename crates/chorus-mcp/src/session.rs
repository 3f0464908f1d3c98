//! The `ToolSession` trait: one connected tool provider.

use chorus_types::{ChorusError, ToolDescriptor, ToolOutput};
use std::future::Future;
use std::pin::Pin;

/// A connected tool provider, as seen by the registry.
///
/// [`McpSession`](crate::McpSession) is the stdio implementation. Dyn-compatible
/// so the registry can hold `Arc<dyn ToolSession>`.
pub trait ToolSession: Send + Sync {
    /// Name the provider was registered under.
    fn server_name(&self) -> &str;

    /// Tools advertised when the session was established.
    fn tools(&self) -> &[ToolDescriptor];

    /// Invoke one tool and wait for its result.
    ///
    /// A provider-reported failure is either `Ok` with `is_error` set or
    /// `Err(ChorusError::ToolInvocation)`; a broken stream is
    /// `Err(ChorusError::Transport)`.
    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<ToolOutput, ChorusError>> + Send + 'a>>;

    /// Release the session and its process.
    fn close(&self) -> Pin<Box<dyn Future<Output = Result<(), ChorusError>> + Send + '_>>;

    /// Whether this session advertises a tool with the given name.
    fn advertises(&self, name: &str) -> bool {
        self.tools().iter().any(|t| t.name == name)
    }
}
