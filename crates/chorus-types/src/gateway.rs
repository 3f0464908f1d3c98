//! Model gateway trait for language-model endpoints.

use crate::{ApiError, ContentBlock, Message, StopReason, ToolDefinition, Usage};
use std::future::Future;
use std::pin::Pin;

/// The structured reply of one model call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<StopReason>,
    pub usage: Usage,
}

impl ModelResponse {
    pub fn new(content: Vec<ContentBlock>) -> Self {
        let stop_reason = if content
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolUse { .. }))
        {
            StopReason::ToolUse
        } else {
            StopReason::EndTurn
        };
        Self {
            content,
            stop_reason: Some(stop_reason),
            usage: Usage::default(),
        }
    }

    /// A reply made of a single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![ContentBlock::text(text)])
    }
}

/// A stateless call to a language-model endpoint.
///
/// Implementations hold no conversation state: the full history and tool
/// catalog are supplied on every call. Dyn-compatible so the conversation loop
/// works with `Arc<dyn ModelGateway>`.
pub trait ModelGateway: Send + Sync {
    /// Send the history and tool catalog, returning the model's content items.
    fn complete<'a>(
        &'a self,
        history: &'a [Message],
        tools: &'a [ToolDefinition],
    ) -> Pin<Box<dyn Future<Output = Result<ModelResponse, ApiError>> + Send + 'a>>;

    /// Gateway name for logging (e.g., "anthropic").
    fn name(&self) -> &str;
}
