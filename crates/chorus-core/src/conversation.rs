//! The conversation loop: alternate model calls and tool calls until the
//! model answers without requesting a tool.

use crate::retry::{RetryConfig, calculate_delay, is_retryable};
use chorus_mcp::SessionRegistry;
use chorus_types::{
    ApiError, ChorusError, ContentBlock, Message, ModelGateway, ModelResponse, Role,
    ToolDefinition, ToolResultContent, Usage,
};
use std::sync::Arc;
use std::time::Duration;

/// Tool calls acted on per model response. Further `tool_use` items in the
/// same response are dropped.
pub const MAX_TOOL_CALLS_PER_TURN: usize = 1;

/// Default bound on model calls per conversation.
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Settings for one [`ConversationLoop`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    /// Model calls allowed per conversation. A response that requests a tool
    /// once the limit is reached fails with `LoopLimitExceeded`; a final text
    /// answer is always accepted.
    pub max_turns: usize,
    /// Retry policy for transient model errors. Retries are not turns.
    pub retry: RetryConfig,
    /// Add a `[Calling tool ...]` line to the answer for every tool call.
    pub annotate_tool_calls: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            retry: RetryConfig::default(),
            annotate_tool_calls: true,
        }
    }
}

/// States of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingModel,
    ExecutingTool,
    Done,
    Failed,
}

/// Events emitted while the loop runs.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    /// The loop entered a new state.
    State(LoopState),
    /// A text item from the model.
    Text(String),
    /// A tool is about to be called.
    ToolStart {
        name: String,
        input: serde_json::Value,
    },
    /// A tool call finished.
    ToolEnd {
        name: String,
        output: String,
        is_error: bool,
    },
    /// A model call failed transiently and will be retried.
    Retry {
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
}

/// The result of a successful conversation.
#[derive(Debug, Clone)]
pub struct ConversationOutcome {
    /// Text items joined with newlines, plus tool-call annotations if enabled.
    pub answer: String,
    /// The input history plus every assistant partial, tool result and the
    /// final assistant reply.
    pub history: Vec<Message>,
    pub tool_calls: usize,
    pub model_calls: usize,
    pub usage: Usage,
}

/// A tool call requested by the model: `(id, name, input)`.
type ToolCall = (String, String, serde_json::Value);

/// The acted-upon part of one model response.
struct Turn {
    /// Text items up to the last acted-upon tool call.
    texts: Vec<String>,
    /// What goes into the assistant partial message.
    partial: Vec<ContentBlock>,
    /// At most `limit` tool calls, in response order.
    calls: Vec<ToolCall>,
    dropped_calls: usize,
}

/// Keep the content up to the `limit`-th tool call. Anything after it is
/// dropped, so every `tool_use` in the partial gets a matching result.
fn split_turn(content: Vec<ContentBlock>, limit: usize) -> Turn {
    let mut turn = Turn {
        texts: Vec::new(),
        partial: Vec::new(),
        calls: Vec::new(),
        dropped_calls: 0,
    };

    for block in content {
        if turn.calls.len() >= limit {
            if matches!(block, ContentBlock::ToolUse { .. }) {
                turn.dropped_calls += 1;
            }
            continue;
        }
        match block {
            ContentBlock::Text { text } => {
                turn.texts.push(text.clone());
                turn.partial.push(ContentBlock::Text { text });
            }
            ContentBlock::ToolUse { id, name, input } => {
                turn.partial.push(ContentBlock::ToolUse {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                });
                turn.calls.push((id, name, input));
            }
            ContentBlock::ToolResult { .. } => {}
        }
    }
    turn
}

/// Drives one conversation against a model gateway and a session registry.
pub struct ConversationLoop {
    gateway: Arc<dyn ModelGateway>,
    registry: Arc<SessionRegistry>,
    config: LoopConfig,
}

impl ConversationLoop {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        registry: Arc<SessionRegistry>,
        config: LoopConfig,
    ) -> Self {
        Self {
            gateway,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Run the loop from the given history until the model answers.
    pub async fn run(&self, history: Vec<Message>) -> Result<ConversationOutcome, ChorusError> {
        self.run_with_events(history, |_| {}).await
    }

    /// Like [`run`](Self::run), reporting progress through `on_event`.
    pub async fn run_with_events<F>(
        &self,
        mut history: Vec<Message>,
        mut on_event: F,
    ) -> Result<ConversationOutcome, ChorusError>
    where
        F: FnMut(LoopEvent),
    {
        let tools = self.registry.definitions();
        let mut answer: Vec<String> = Vec::new();
        let mut usage = Usage::default();
        let mut model_calls = 0;
        let mut tool_calls = 0;

        loop {
            on_event(LoopEvent::State(LoopState::AwaitingModel));
            model_calls += 1;
            tracing::debug!(
                "Model call {model_calls} via '{}' ({} messages, {} tools)",
                self.gateway.name(),
                history.len(),
                tools.len()
            );

            let response = match self
                .complete_with_retry(&history, &tools, &mut on_event)
                .await
            {
                Ok(response) => response,
                Err(e) => return Err(fail(e.into(), &mut on_event)),
            };
            usage.add(&response.usage);

            let turn = split_turn(response.content, MAX_TOOL_CALLS_PER_TURN);
            for text in turn.texts {
                on_event(LoopEvent::Text(text.clone()));
                answer.push(text);
            }

            if turn.calls.is_empty() {
                if !turn.partial.is_empty() {
                    history.push(Message {
                        role: Role::Assistant,
                        content: turn.partial,
                    });
                }
                on_event(LoopEvent::State(LoopState::Done));
                return Ok(ConversationOutcome {
                    answer: answer.join("\n"),
                    history,
                    tool_calls,
                    model_calls,
                    usage,
                });
            }

            if turn.dropped_calls > 0 {
                tracing::debug!(
                    "Ignoring {} tool call(s) beyond the first {MAX_TOOL_CALLS_PER_TURN}",
                    turn.dropped_calls
                );
            }
            if model_calls >= self.config.max_turns {
                tracing::warn!(
                    "Model requested tool '{}' after {model_calls} turns, stopping",
                    turn.calls[0].1
                );
                return Err(fail(
                    ChorusError::LoopLimitExceeded {
                        limit: self.config.max_turns,
                    },
                    &mut on_event,
                ));
            }

            on_event(LoopEvent::State(LoopState::ExecutingTool));
            history.push(Message {
                role: Role::Assistant,
                content: turn.partial,
            });

            let mut results = Vec::with_capacity(turn.calls.len());
            for (id, name, input) in turn.calls {
                if self.config.annotate_tool_calls {
                    answer.push(format!("[Calling tool {name} with args {input}]"));
                }
                on_event(LoopEvent::ToolStart {
                    name: name.clone(),
                    input: input.clone(),
                });
                tool_calls += 1;
                tracing::debug!("Calling tool '{name}' with {input}");

                let (content, is_error) = match self.registry.resolve_and_call(&name, input).await {
                    Ok(output) => (output.content, output.is_error),
                    Err(e) if e.is_tool_invocation() => {
                        tracing::debug!("Tool '{name}' reported an error: {e}");
                        (vec![ToolResultContent::Text { text: e.to_string() }], true)
                    }
                    Err(e) => return Err(fail(e, &mut on_event)),
                };

                on_event(LoopEvent::ToolEnd {
                    name,
                    output: text_of(&content),
                    is_error,
                });
                results.push(ContentBlock::ToolResult {
                    tool_use_id: id,
                    content,
                    is_error: is_error.then_some(true),
                });
            }
            history.push(Message {
                role: Role::User,
                content: results,
            });
        }
    }

    async fn complete_with_retry<F>(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
        on_event: &mut F,
    ) -> Result<ModelResponse, ApiError>
    where
        F: FnMut(LoopEvent),
    {
        let retry = &self.config.retry;
        let mut attempt = 0;
        loop {
            match self.gateway.complete(history, tools).await {
                Ok(response) => return Ok(response),
                Err(e) if is_retryable(&e) && attempt < retry.max_retries => {
                    let delay = calculate_delay(retry, attempt, e.retry_after_ms());
                    attempt += 1;
                    tracing::warn!(
                        "Retryable model error (attempt {attempt}/{}): {e}. Retrying in {delay}ms...",
                        retry.max_retries
                    );
                    on_event(LoopEvent::Retry {
                        attempt,
                        delay_ms: delay,
                        error: e.to_string(),
                    });
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn fail<F: FnMut(LoopEvent)>(error: ChorusError, on_event: &mut F) -> ChorusError {
    tracing::debug!("Conversation failed: {error}");
    on_event(LoopEvent::State(LoopState::Failed));
    error
}

fn text_of(content: &[ToolResultContent]) -> String {
    content
        .iter()
        .filter_map(|c| match c {
            ToolResultContent::Text { text } => Some(text.as_str()),
            ToolResultContent::Image { .. } => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
