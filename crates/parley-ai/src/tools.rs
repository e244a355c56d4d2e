//! Projection of tool definitions into the chat-completions `tools` array.

use crate::ToolDefinition;

/// Convert a tool definition to the OpenAI function-tool format.
///
/// Providers sometimes report no input schema; the API insists on an object
/// schema, so an empty one is substituted.
pub fn to_openai_tool(tool: &ToolDefinition) -> serde_json::Value {
    let parameters = if tool.parameters.is_object() {
        tool.parameters.clone()
    } else {
        serde_json::json!({ "type": "object", "properties": {} })
    };

    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": parameters,
        }
    })
}
