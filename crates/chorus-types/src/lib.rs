//! Shared types and error hierarchy for Chorus.

pub mod chat;
pub mod error;
pub mod gateway;
pub mod message;
pub mod tool;
pub mod util;

pub use chat::{ChatContent, ChatMessage, ChatRequest, ChatResponse, HealthResponse};
pub use error::{ApiError, ChorusError, ConfigError};
pub use gateway::{ModelGateway, ModelResponse};
pub use message::*;
pub use tool::*;
pub use util::{preview, truncate_str};
