//! Client struct, request building, and response parsing.

use serde::Deserialize;
use tracing::debug;

use crate::tools::to_openai_tool;
use crate::{
    AiError, Arguments, Completion, CompletionResult, Message, Role, TokenUsage, ToolCallRequest,
    ToolDefinition,
};

use super::config::OpenAiConfig;

pub struct OpenAiClient {
    pub(crate) config: OpenAiConfig,
    pub(crate) http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AiError::NetworkError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    pub(crate) fn api_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    /// Build the JSON request body. `tool_choice` is only sent alongside a
    /// non-empty tool list; some gateways reject it otherwise.
    pub(crate) fn build_request_body(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        stream: bool,
    ) -> serde_json::Value {
        let msgs: Vec<_> = messages.iter().map(message_to_wire).collect();

        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": msgs,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            let tool_defs: Vec<_> = tools.iter().map(to_openai_tool).collect();
            body["tools"] = serde_json::json!(tool_defs);
            body["tool_choice"] = serde_json::json!("auto");
        }

        if stream {
            body["stream"] = serde_json::json!(true);
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        body
    }

    /// Parse a non-streaming response body.
    pub(crate) fn parse_response(json: serde_json::Value) -> Result<Completion, AiError> {
        let response: ChatResponse = serde_json::from_value(json)
            .map_err(|e| AiError::ProtocolError(format!("unexpected response shape: {e}")))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AiError::ProtocolError("response contained no choices".into()))?;

        let raw_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|call| RawToolCall {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        let outcome = build_outcome(choice.message.content, raw_calls)?;
        let usage = response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(Completion { outcome, usage })
    }
}

/// A tool call as it arrives on the wire, arguments still JSON text.
#[derive(Debug, Default, Clone)]
pub(crate) struct RawToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// Turn the assistant's text and raw tool calls into a `CompletionResult`.
///
/// Any tool call makes this a `ToolInvocation`; the assistant message is
/// rebuilt from the parsed calls so history replays exactly what we act on.
pub(crate) fn build_outcome(
    content: Option<String>,
    raw_calls: Vec<RawToolCall>,
) -> Result<CompletionResult, AiError> {
    if raw_calls.is_empty() {
        let text = content.ok_or_else(|| {
            AiError::ProtocolError("response carried neither text nor tool calls".into())
        })?;
        return Ok(CompletionResult::Answer { text });
    }

    let mut requests = Vec::with_capacity(raw_calls.len());
    for (index, call) in raw_calls.into_iter().enumerate() {
        if call.name.is_empty() {
            return Err(AiError::ProtocolError(format!(
                "tool call #{index} has no function name"
            )));
        }
        let id = if call.id.is_empty() {
            debug!(index, tool = %call.name, "tool call without id, synthesizing one");
            format!("call_{index}")
        } else {
            call.id
        };
        let arguments = parse_arguments(&call.name, &call.arguments)?;
        requests.push(ToolCallRequest {
            id,
            tool_name: call.name,
            arguments,
        });
    }

    let content = content.filter(|text| !text.is_empty());
    let assistant_message = Message::assistant_tool_calls(content, requests.clone());
    Ok(CompletionResult::ToolInvocation {
        requests,
        assistant_message,
    })
}

/// Arguments arrive as JSON text; blank means no arguments.
fn parse_arguments(tool: &str, text: &str) -> Result<Arguments, AiError> {
    if text.trim().is_empty() {
        return Ok(Arguments::new());
    }
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(AiError::ProtocolError(format!(
            "arguments for {tool} are not a JSON object: {other}"
        ))),
        Err(e) => Err(AiError::ProtocolError(format!(
            "arguments for {tool} are not valid JSON: {e}"
        ))),
    }
}

fn message_to_wire(msg: &Message) -> serde_json::Value {
    match msg.role {
        Role::System | Role::User => serde_json::json!({
            "role": msg.role,
            "content": msg.text(),
        }),
        Role::Assistant => {
            let mut wire = serde_json::json!({
                "role": "assistant",
                "content": msg.content,
            });
            let calls = msg.requested_calls();
            if !calls.is_empty() {
                let calls: Vec<_> = calls
                    .iter()
                    .map(|call| {
                        serde_json::json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.tool_name,
                                "arguments": serde_json::Value::Object(call.arguments.clone()).to_string(),
                            }
                        })
                    })
                    .collect();
                wire["tool_calls"] = serde_json::json!(calls);
            }
            wire
        }
        Role::Tool => serde_json::json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id,
            "content": msg.text(),
        }),
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}
