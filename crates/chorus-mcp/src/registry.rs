//! Session registry: the aggregated tool namespace across providers.

use crate::session::ToolSession;
use chorus_types::{ChorusError, ToolDefinition, ToolDescriptor, ToolOutput};
use std::sync::Arc;

/// A tool name advertised by more than one provider.
///
/// The earliest registration keeps the name; later ones are shadowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCollision {
    pub tool: String,
    pub kept_server: String,
    pub shadowed_server: String,
}

/// Holds the connected sessions and the union of their tools.
///
/// Filled during startup, then read-only: share it behind an `Arc` between
/// concurrent conversations.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Vec<Arc<dyn ToolSession>>,
    catalog: Vec<ToolDescriptor>,
    collisions: Vec<ToolCollision>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session and merge its tools into the catalog.
    ///
    /// A tool whose name is already in the catalog stays routed to the
    /// earlier session; the collision is logged and recorded. This includes
    /// a session advertising the same name twice.
    pub fn register(&mut self, session: Arc<dyn ToolSession>) {
        for tool in session.tools() {
            if !self.catalog.iter().any(|t| t.name == tool.name) {
                self.catalog.push(tool.clone());
                continue;
            }
            let kept_server = self
                .sessions
                .iter()
                .find(|s| s.advertises(&tool.name))
                .map_or_else(|| session.server_name(), |s| s.server_name())
                .to_string();
            tracing::warn!(
                "Tool '{}' from MCP server '{}' is shadowed by MCP server '{}'",
                tool.name,
                session.server_name(),
                kept_server
            );
            self.collisions.push(ToolCollision {
                tool: tool.name.clone(),
                kept_server,
                shadowed_server: session.server_name().to_string(),
            });
        }
        self.sessions.push(session);
    }

    /// The aggregated tool catalog, in registration order.
    pub fn catalog(&self) -> &[ToolDescriptor] {
        &self.catalog
    }

    /// The catalog in the form sent to the model endpoint.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.catalog.iter().map(ToolDescriptor::definition).collect()
    }

    /// Find the first session, in registration order, advertising `name`.
    pub fn resolve(&self, name: &str) -> Option<&Arc<dyn ToolSession>> {
        self.sessions.iter().find(|s| s.advertises(name))
    }

    /// Route a tool call to the session that owns the tool.
    pub async fn resolve_and_call(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolOutput, ChorusError> {
        let session = self.resolve(name).ok_or_else(|| ChorusError::ToolNotFound {
            name: name.to_string(),
        })?;
        tracing::debug!(
            "Routing tool '{name}' to MCP server '{}'",
            session.server_name()
        );
        session.call_tool(name, arguments).await
    }

    /// Name collisions seen during registration.
    pub fn collisions(&self) -> &[ToolCollision] {
        &self.collisions
    }

    pub fn sessions(&self) -> &[Arc<dyn ToolSession>] {
        &self.sessions
    }

    /// Connected servers with the number of tools each advertises.
    pub fn server_summary(&self) -> Vec<(&str, usize)> {
        self.sessions
            .iter()
            .map(|s| (s.server_name(), s.tools().len()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
