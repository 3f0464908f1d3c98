//! Conversation loop, retry policy and chat facade for Chorus.

pub mod chat;
pub mod conversation;
pub mod retry;

#[cfg(test)]
mod testing;

pub use chat::Chat;
pub use conversation::{
    ConversationLoop, ConversationOutcome, DEFAULT_MAX_TURNS, LoopConfig, LoopEvent, LoopState,
    MAX_TOOL_CALLS_PER_TURN,
};
pub use retry::{DEFAULT_MAX_RETRIES, RetryConfig};
