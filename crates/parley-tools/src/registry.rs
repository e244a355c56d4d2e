//! The set of tools offered to the model for a session.

use std::collections::HashSet;

use tracing::{debug, warn};

use parley_ai::ToolDefinition;
use parley_common::ToolError;

use crate::{ToolDescriptor, ToolProvider};

/// Tools in provider order, names unique. When a provider lists a name
/// twice the first entry is kept.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors(descriptors: Vec<ToolDescriptor>) -> Self {
        let mut seen = HashSet::new();
        let mut tools = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            if seen.contains(&descriptor.name) {
                warn!(tool = %descriptor.name, "duplicate tool name, keeping the first");
                continue;
            }
            seen.insert(descriptor.name.clone());
            tools.push(descriptor);
        }
        Self { tools }
    }

    /// Re-query the provider and replace the cached set.
    pub async fn refresh(
        &mut self,
        provider: &dyn ToolProvider,
    ) -> Result<&[ToolDescriptor], ToolError> {
        let listed = provider.list_tools().await?;
        *self = Self::from_descriptors(listed);
        debug!(tools = ?self.names(), "tool registry refreshed");
        Ok(&self.tools)
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// The tool list in the shape the model client sends upstream.
    pub fn to_model_schema(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(ToolDescriptor::to_definition).collect()
    }
}
