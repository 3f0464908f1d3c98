//! Full conversations against the real calculator MCP server fixture.

use chorus_core::{Chat, ConversationLoop, LoopConfig};
use chorus_mcp::{LaunchSpec, LifecycleManager, McpServersConfig, ServerSources};
use chorus_types::{
    ApiError, ChatContent, ChatMessage, ChatRequest, ContentBlock, Message, ModelGateway,
    ModelResponse, Role, ToolDefinition, ToolResultContent,
};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

const CALC_SERVER: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../chorus-mcp/tests/fixtures/calc_server.sh"
);

/// Asks for `evaluate_expression` once, then reports whatever the tool said.
struct ArithmeticModel {
    expression: String,
    calls: Mutex<usize>,
}

impl ArithmeticModel {
    fn new(expression: &str) -> Arc<Self> {
        Arc::new(Self {
            expression: expression.to_string(),
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

fn last_tool_result(history: &[Message]) -> Option<String> {
    history.last()?.content.iter().find_map(|block| match block {
        ContentBlock::ToolResult { content, .. } => {
            content.iter().find_map(|c| match c {
                ToolResultContent::Text { text } => Some(text.clone()),
                _ => None,
            })
        }
        _ => None,
    })
}

impl ModelGateway for ArithmeticModel {
    fn complete<'a>(
        &'a self,
        history: &'a [Message],
        tools: &'a [ToolDefinition],
    ) -> Pin<Box<dyn Future<Output = Result<ModelResponse, ApiError>> + Send + 'a>> {
        *self.calls.lock().unwrap() += 1;
        let reply = match last_tool_result(history) {
            Some(result) => ModelResponse::text(format!("{} = {result}", self.expression)),
            None if tools.iter().any(|t| t.name == "evaluate_expression") => {
                ModelResponse::new(vec![ContentBlock::ToolUse {
                    id: "toolu_1".into(),
                    name: "evaluate_expression".into(),
                    input: json!({"expression": self.expression}),
                }])
            }
            None => ModelResponse::text("I have no calculator."),
        };
        Box::pin(async move { Ok(reply) })
    }

    fn name(&self) -> &str {
        "arithmetic"
    }
}

fn calc_sources() -> ServerSources {
    ServerSources::Config(McpServersConfig::default().with_server(
        "calc",
        LaunchSpec {
            timeout_ms: 5000,
            ..LaunchSpec::new("bash", vec![CALC_SERVER.to_string()])
        },
    ))
}

#[tokio::test]
async fn arithmetic_question_uses_the_calculator() {
    let manager = LifecycleManager::start(&calc_sources()).await.unwrap();
    let model = ArithmeticModel::new("2+2");
    let conversation =
        ConversationLoop::new(model.clone(), manager.shared_registry(), LoopConfig::default());

    let outcome = conversation
        .run(vec![Message::user_text("What is 2+2?")])
        .await
        .unwrap();

    assert!(outcome.answer.contains("[Calling tool evaluate_expression with args"));
    assert!(outcome.answer.ends_with("2+2 = 4"));
    assert_eq!(outcome.tool_calls, 1);
    assert_eq!(outcome.model_calls, 2);
    assert_eq!(model.calls(), 2);
    assert_eq!(outcome.history.len(), 4);

    assert!(manager.stop().await.is_clean());
}

#[tokio::test]
async fn tool_error_reaches_the_model_as_data() {
    let manager = LifecycleManager::start(&calc_sources()).await.unwrap();
    let model = ArithmeticModel::new("1/0");
    let conversation =
        ConversationLoop::new(model, manager.shared_registry(), LoopConfig::default());

    let outcome = conversation
        .run(vec![Message::user_text("What is 1/0?")])
        .await
        .unwrap();

    assert!(outcome.answer.contains("invalid expression"));
    match &outcome.history[2].content[0] {
        ContentBlock::ToolResult { is_error, .. } => assert_eq!(*is_error, Some(true)),
        other => panic!("expected a tool result, got {other:?}"),
    }
    manager.stop().await;
}

#[tokio::test]
async fn chat_without_servers_answers_directly() {
    let manager = LifecycleManager::start(&ServerSources::Config(McpServersConfig::default()))
        .await
        .unwrap();
    assert!(manager.registry().is_empty());

    let chat = Chat::new(
        ArithmeticModel::new("1+1"),
        manager.shared_registry(),
        LoopConfig::default(),
    );
    let reply = chat
        .respond(ChatRequest {
            messages: vec![ChatMessage {
                role: Role::User,
                content: ChatContent::Text("hello".into()),
            }],
        })
        .await;

    assert_eq!(reply.response, "I have no calculator.");
    assert!(manager.stop().await.is_clean());
}
