//! Lifecycle manager: starts the configured providers and tears them down.

use crate::client::McpSession;
use crate::config::ServerSources;
use crate::registry::SessionRegistry;
use chorus_types::ChorusError;
use std::sync::Arc;

/// Outcome of [`LifecycleManager::stop`].
#[derive(Debug, Default)]
pub struct TeardownReport {
    /// Servers that closed cleanly, in teardown order.
    pub closed: Vec<String>,
    /// Servers whose close failed, with the error.
    pub failures: Vec<(String, ChorusError)>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Owns the session registry for the life of the process.
pub struct LifecycleManager {
    registry: Arc<SessionRegistry>,
}

impl LifecycleManager {
    /// Connect every server in order and build the registry.
    ///
    /// The first server that fails to connect aborts startup: the sessions
    /// already connected are closed and the connection error is returned.
    pub async fn start(sources: &ServerSources) -> Result<Self, ChorusError> {
        let mut registry = SessionRegistry::new();

        for (name, spec) in sources.resolve() {
            let connected = match spec {
                Ok(spec) => McpSession::connect(name.clone(), &spec).await,
                Err(e) => Err(e.into_connection_error(&name)),
            };

            match connected {
                Ok(session) => {
                    tracing::info!(
                        "MCP server '{}' started ({} tools)",
                        name,
                        session.tools().len()
                    );
                    registry.register(Arc::new(session));
                }
                Err(e) => {
                    tracing::warn!("Failed to start MCP server '{name}': {e}");
                    let partial = Self::from_registry(registry);
                    let report = partial.stop().await;
                    if !report.closed.is_empty() {
                        tracing::debug!(
                            "Closed {} MCP server(s) after startup failure",
                            report.closed.len()
                        );
                    }
                    return Err(e);
                }
            }
        }

        tracing::info!(
            "{} MCP server(s) connected, {} tools in catalog",
            registry.len(),
            registry.catalog().len()
        );
        Ok(Self::from_registry(registry))
    }

    /// Wrap an already-populated registry.
    pub fn from_registry(registry: SessionRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// A handle to the registry for conversations running concurrently.
    pub fn shared_registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Close every session in registration order.
    ///
    /// Each close is awaited even if an earlier one failed. Failures are
    /// logged and collected, never propagated.
    pub async fn stop(&self) -> TeardownReport {
        let mut report = TeardownReport::default();
        for session in self.registry.sessions() {
            let name = session.server_name().to_string();
            match session.close().await {
                Ok(()) => report.closed.push(name),
                Err(e) => {
                    tracing::warn!("Failed to close MCP server '{name}': {e}");
                    report.failures.push((name, e));
                }
            }
        }
        report
    }
}
