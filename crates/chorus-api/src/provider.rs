//! Anthropic implementation of the model gateway.

use crate::client::ApiClient;
use chorus_types::{
    ApiError, CreateMessageRequest, Message, ModelGateway, ModelResponse, ToolDefinition,
};
use std::future::Future;
use std::pin::Pin;

/// Model gateway backed by the Anthropic Messages API.
///
/// Holds the model id and token limit; history and tools come with each call.
#[derive(Clone)]
pub struct AnthropicGateway {
    client: ApiClient,
    model: String,
    max_tokens: u32,
}

impl AnthropicGateway {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Result<Self, ApiError> {
        Ok(Self::from_client(
            ApiClient::new(api_key, base_url)?,
            model,
            max_tokens,
        ))
    }

    pub fn from_client(client: ApiClient, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            client,
            model: model.into(),
            max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

impl ModelGateway for AnthropicGateway {
    fn complete<'a>(
        &'a self,
        history: &'a [Message],
        tools: &'a [ToolDefinition],
    ) -> Pin<Box<dyn Future<Output = Result<ModelResponse, ApiError>> + Send + 'a>> {
        Box::pin(async move {
            let request = CreateMessageRequest {
                model: &self.model,
                max_tokens: self.max_tokens,
                messages: history,
                tools,
            };
            let response = self.client.create_message(&request).await?;
            Ok(ModelResponse {
                content: response.content,
                stop_reason: response.stop_reason,
                usage: response.usage,
            })
        })
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
