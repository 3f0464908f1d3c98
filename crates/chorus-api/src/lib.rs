//! Anthropic Messages API client and model gateway for Chorus.

mod client;
mod provider;

pub use client::ApiClient;
pub use provider::AnthropicGateway;
