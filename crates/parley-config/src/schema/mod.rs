//! Configuration schema. Each section lives in its own submodule.

mod chat;
mod model;
mod provider;

pub use chat::ChatConfig;
pub use model::ModelConfig;
pub use provider::ProviderConfig;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    pub model: ModelConfig,
    pub provider: ProviderConfig,
    pub chat: ChatConfig,
}
