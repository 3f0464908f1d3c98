//! Scripted gateway and in-process tool sessions for unit tests.

use chorus_mcp::{SessionRegistry, ToolSession};
use chorus_types::{
    ApiError, ChorusError, ContentBlock, Message, ModelGateway, ModelResponse, ToolDefinition,
    ToolDescriptor, ToolOutput,
};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Replays canned model replies in order and records what it was sent.
pub(crate) struct ScriptedGateway {
    replies: Mutex<VecDeque<Result<ModelResponse, ApiError>>>,
    /// History length and tool names of every call.
    seen: Mutex<Vec<(usize, Vec<String>)>>,
    last_history: Mutex<Vec<Message>>,
}

impl ScriptedGateway {
    pub(crate) fn new(replies: Vec<Result<ModelResponse, ApiError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen: Mutex::new(Vec::new()),
            last_history: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub(crate) fn seen(&self) -> Vec<(usize, Vec<String>)> {
        self.seen.lock().unwrap().clone()
    }

    pub(crate) fn last_history(&self) -> Vec<Message> {
        self.last_history.lock().unwrap().clone()
    }
}

impl ModelGateway for ScriptedGateway {
    fn complete<'a>(
        &'a self,
        history: &'a [Message],
        tools: &'a [ToolDefinition],
    ) -> Pin<Box<dyn Future<Output = Result<ModelResponse, ApiError>> + Send + 'a>> {
        self.seen.lock().unwrap().push((
            history.len(),
            tools.iter().map(|t| t.name.clone()).collect(),
        ));
        *self.last_history.lock().unwrap() = history.to_vec();
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Parse("script exhausted".into())));
        Box::pin(async move { reply })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

type Handler = Box<dyn Fn(&str, &serde_json::Value) -> Result<ToolOutput, ChorusError> + Send + Sync>;

/// A tool session whose calls are answered by a closure.
pub(crate) struct FnSession {
    name: String,
    tools: Vec<ToolDescriptor>,
    handler: Handler,
    calls: Mutex<Vec<(String, serde_json::Value)>>,
}

impl FnSession {
    pub(crate) fn new(
        name: &str,
        tools: &[&str],
        handler: impl Fn(&str, &serde_json::Value) -> Result<ToolOutput, ChorusError>
        + Send
        + Sync
        + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            tools: tools
                .iter()
                .map(|t| ToolDescriptor {
                    name: t.to_string(),
                    description: String::new(),
                    input_schema: Default::default(),
                })
                .collect(),
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ToolSession for FnSession {
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
        let result = (self.handler)(name, &arguments);
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));
        Box::pin(async move { result })
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = Result<(), ChorusError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}

/// A calculator session answering `evaluate_expression` with a fixed value.
pub(crate) fn calculator(answer: &'static str) -> Arc<FnSession> {
    FnSession::new("calc", &["evaluate_expression"], move |_, _| {
        Ok(ToolOutput::text(answer))
    })
}

pub(crate) fn registry_with(sessions: Vec<Arc<FnSession>>) -> Arc<SessionRegistry> {
    let mut registry = SessionRegistry::new();
    for s in sessions {
        registry.register(s);
    }
    Arc::new(registry)
}

pub(crate) fn tool_use(id: &str, name: &str, input: serde_json::Value) -> ContentBlock {
    ContentBlock::ToolUse {
        id: id.to_string(),
        name: name.to_string(),
        input,
    }
}
