//! Chat facade: one front-door request in, one user-visible reply out.

use crate::conversation::{ConversationLoop, LoopConfig};
use chorus_mcp::SessionRegistry;
use chorus_types::{ChatRequest, ChatResponse, HealthResponse, ModelGateway};
use std::sync::Arc;

/// Answers chat requests. Cheap to share between concurrent requests.
pub struct Chat {
    conversation: ConversationLoop,
}

impl Chat {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        registry: Arc<SessionRegistry>,
        config: LoopConfig,
    ) -> Self {
        Self {
            conversation: ConversationLoop::new(gateway, registry, config),
        }
    }

    pub fn conversation(&self) -> &ConversationLoop {
        &self.conversation
    }

    /// Run a conversation for the request.
    ///
    /// Never fails: a failed conversation becomes a single `Error: ...`
    /// message, never a partial answer.
    pub async fn respond(&self, request: ChatRequest) -> ChatResponse {
        let history = request.into_history();
        if history.is_empty() {
            return ChatResponse {
                response: "Error: the request contains no messages".to_string(),
            };
        }

        match self.conversation.run(history).await {
            Ok(outcome) => {
                tracing::info!(
                    "Chat answered after {} model call(s) and {} tool call(s)",
                    outcome.model_calls,
                    outcome.tool_calls
                );
                ChatResponse {
                    response: outcome.answer,
                }
            }
            Err(e) => {
                tracing::error!("Chat failed: {e}");
                ChatResponse {
                    response: format!("Error: {e}"),
                }
            }
        }
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse::default()
    }
}
