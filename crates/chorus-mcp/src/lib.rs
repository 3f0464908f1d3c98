//! MCP (Model Context Protocol) client side of Chorus.
//!
//! Tool providers are stdio processes speaking newline-delimited JSON-RPC 2.0.
//! Each one is spawned, initialized with a handshake and asked for its tools;
//! the [`SessionRegistry`] merges the catalogs and routes calls, and the
//! [`LifecycleManager`] starts and stops the whole set.

pub mod client;
pub mod config;
pub mod error;
pub mod jsonrpc;
pub mod lifecycle;
pub mod registry;
pub mod session;
mod transport;

#[cfg(test)]
mod testing;

pub use client::{McpSession, McpToolContent};
pub use config::{LaunchSpec, McpServersConfig, NamedServer, ServerSources};
pub use error::McpError;
pub use lifecycle::{LifecycleManager, TeardownReport};
pub use registry::{SessionRegistry, ToolCollision};
pub use session::ToolSession;
