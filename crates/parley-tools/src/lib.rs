//! Out-of-process tools for Parley.
//!
//! A tool provider is a child process speaking newline-delimited JSON-RPC
//! 2.0 (MCP over stdio). This crate launches it, performs the handshake,
//! lists and calls its tools, and keeps the registry the model sees.

pub mod endpoint;
pub mod protocol;
pub mod registry;
pub mod transport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use parley_ai::{Arguments, ToolDefinition};
use parley_common::ToolError;

pub use endpoint::{EndpointDescriptor, EndpointKind};
pub use registry::ToolRegistry;
pub use transport::{ToolTransport, TransportOptions};

/// A tool as advertised by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

impl ToolDescriptor {
    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.input_schema.clone(),
        }
    }
}

/// Output of one tool call, tagged with the id of the request it answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallResult {
    pub tool_call_id: String,
    pub content: String,
}

/// Name and version the provider reported during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Anything that can serve tools. Implemented by [`ToolTransport`]; tests
/// substitute in-memory providers.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn initialize(&self) -> Result<ServerInfo, ToolError>;

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError>;

    /// Run `name` and return its text output.
    async fn call_tool(&self, name: &str, arguments: Arguments) -> Result<String, ToolError>;

    /// Release the provider. Safe to call more than once.
    async fn close(&self);
}
