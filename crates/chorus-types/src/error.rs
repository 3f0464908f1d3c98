//! Error hierarchy for Chorus.

use thiserror::Error;

/// Top-level error type for all Chorus operations.
///
/// Each variant is one kind in the failure taxonomy: the conversation loop
/// decides from the variant whether an error ends the turn or is fed back to
/// the model as data.
#[derive(Debug, Error)]
pub enum ChorusError {
    /// A provider process could not be spawned or did not finish its handshake.
    #[error("Failed to connect to tool provider '{server}': {message}")]
    Connection { server: String, message: String },

    /// A provider died or its stream broke mid-session.
    #[error("Transport failure on tool provider '{server}': {message}")]
    Transport { server: String, message: String },

    /// A provider reported a logical failure executing a tool.
    #[error("Tool '{tool}' failed: {message}")]
    ToolInvocation { tool: String, message: String },

    #[error("Tool '{name}' is not advertised by any connected provider")]
    ToolNotFound { name: String },

    #[error("Model error: {0}")]
    Model(#[from] ApiError),

    #[error("Conversation exceeded the limit of {limit} model turns")]
    LoopLimitExceeded { limit: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChorusError {
    /// Whether the error is a provider-level tool failure that should be
    /// surfaced to the model instead of ending the conversation.
    pub fn is_tool_invocation(&self) -> bool {
        matches!(self, ChorusError::ToolInvocation { .. })
    }
}

/// Errors from the language-model endpoint.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Server overloaded")]
    Overloaded,

    #[error("Server error: {status} {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unparseable model response: {0}")]
    Parse(String),

    #[error("Request timeout")]
    Timeout,
}

impl ApiError {
    /// Server-supplied delay before the request may be retried, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ApiError::RateLimited { retry_after_ms } => *retry_after_ms,
            _ => None,
        }
    }
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file parse error at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("Missing required configuration: {key}")]
    MissingKey { key: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}
