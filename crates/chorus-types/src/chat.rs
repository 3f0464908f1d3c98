//! Request and response bodies of the chat front door.
//!
//! The HTTP layer itself lives outside this workspace; these types pin down
//! the JSON it exchanges (`POST /chat`, `GET /health`).

use serde::{Deserialize, Serialize};

use crate::{ContentBlock, Message, Role};

/// Message content as accepted from a chat client: plain text or blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// One message of a chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: ChatContent,
}

impl From<ChatMessage> for Message {
    fn from(msg: ChatMessage) -> Self {
        let content = match msg.content {
            ChatContent::Text(text) => vec![ContentBlock::Text { text }],
            ChatContent::Blocks(blocks) => blocks,
        };
        Message {
            role: msg.role,
            content,
        }
    }
}

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Convert into the conversation history handed to the loop.
    pub fn into_history(self) -> Vec<Message> {
        self.messages.into_iter().map(Message::from).collect()
    }
}

/// Body returned from `POST /chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Body returned from `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            message: "OK".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_text_request() {
        let json = r#"{"messages": [{"role": "user", "content": "2+2?"}]}"#;
        let req: ChatRequest = serde_json::from_str(json).unwrap();
        let history = req.into_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, vec![ContentBlock::text("2+2?")]);
    }

    #[test]
    fn parse_block_content_request() {
        let json = r#"{"messages": [
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": [{"type": "text", "text": "hello"}]}
        ]}"#;
        let req: ChatRequest = serde_json::from_str(json).unwrap();
        let history = req.into_history();
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, vec![ContentBlock::text("hello")]);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let json = r#"{"messages": [{"role": "system", "content": "x"}]}"#;
        assert!(serde_json::from_str::<ChatRequest>(json).is_err());
    }

    #[test]
    fn health_says_ok() {
        let json = serde_json::to_value(HealthResponse::default()).unwrap();
        assert_eq!(json, serde_json::json!({"message": "OK"}));
    }
}
