use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),

    #[error("missing configuration: {0}")]
    Missing(String),
}

/// Failures talking to a tool provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    /// The provider could not be reached or started, or the channel is gone.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered with something that is not a valid response.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("tool not found: {0}")]
    NotFound(String),

    /// The tool ran and reported failure; carries the provider's text.
    #[error("tool execution failed: {0}")]
    Execution(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ParleyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("model error: {0}")]
    Model(String),
}
