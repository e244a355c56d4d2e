pub mod errors;
pub mod id;

pub use errors::{ConfigError, ParleyError, ToolError};
pub use id::SessionId;
