//! In-memory model and tool provider for unit tests.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, ReadBuf};

use parley_ai::{
    AiError, Arguments, Completion, CompletionResult, Message, ModelClient, TokenUsage,
    ToolCallRequest, ToolDefinition,
};
use parley_common::ToolError;
use parley_tools::{ServerInfo, ToolDescriptor, ToolProvider};

pub fn tool(name: &str) -> ToolDescriptor {
    described_tool(name, &format!("{name} tool"))
}

pub fn described_tool(name: &str, description: &str) -> ToolDescriptor {
    ToolDescriptor {
        name: name.into(),
        description: description.into(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": { "city": { "type": "string" } }
        }),
    }
}

pub fn call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCallRequest {
    let arguments: Arguments = match arguments {
        serde_json::Value::Object(map) => map,
        _ => Arguments::new(),
    };
    ToolCallRequest {
        id: id.into(),
        tool_name: name.into(),
        arguments,
    }
}

pub fn answer(text: &str) -> Completion {
    Completion {
        outcome: CompletionResult::Answer { text: text.into() },
        usage: TokenUsage {
            input_tokens: 10,
            output_tokens: 5,
        },
    }
}

pub fn invocation(requests: Vec<ToolCallRequest>) -> Completion {
    invocation_with_text(None, requests)
}

pub fn invocation_with_text(text: Option<&str>, requests: Vec<ToolCallRequest>) -> Completion {
    let assistant_message = Message::assistant_tool_calls(text.map(str::to_string), requests.clone());
    Completion {
        outcome: CompletionResult::ToolInvocation {
            requests,
            assistant_message,
        },
        usage: TokenUsage {
            input_tokens: 20,
            output_tokens: 8,
        },
    }
}

/// What the model was shown on one call.
#[derive(Debug, Clone)]
pub struct SeenCall {
    pub history: Vec<Message>,
    pub tools: Option<Vec<ToolDefinition>>,
}

/// Plays back completions in order and records every call.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<Completion, AiError>>>,
    delay: Duration,
    pub seen: Mutex<Vec<SeenCall>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<Completion, AiError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Make every call take `delay` before replying.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        history: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<Completion, AiError> {
        self.seen.lock().unwrap().push(SeenCall {
            history: history.to_vec(),
            tools: tools.map(<[_]>::to_vec),
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AiError::ProtocolError("script exhausted".into())))
    }
}

/// Input whose every read fails.
pub struct BrokenInput;

impl AsyncRead for BrokenInput {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin gone")))
    }
}

/// Serves a fixed tool list and canned call results.
pub struct FakeProvider {
    tools: Vec<ToolDescriptor>,
    results: HashMap<String, Result<String, ToolError>>,
    fail_initialize: bool,
    fail_list: bool,
    pub calls: Arc<Mutex<Vec<(String, Arguments)>>>,
    pub closes: Arc<AtomicUsize>,
}

impl FakeProvider {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools,
            results: HashMap::new(),
            fail_initialize: false,
            fail_list: false,
            calls: Arc::default(),
            closes: Arc::default(),
        }
    }

    pub fn respond(mut self, name: &str, result: Result<String, ToolError>) -> Self {
        self.results.insert(name.into(), result);
        self
    }

    pub fn failing_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }
}

#[async_trait]
impl ToolProvider for FakeProvider {
    async fn initialize(&self) -> Result<ServerInfo, ToolError> {
        if self.fail_initialize {
            return Err(ToolError::Protocol("malformed initialize response".into()));
        }
        Ok(ServerInfo {
            name: "fake".into(),
            version: "0.0.0".into(),
        })
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        if self.fail_list {
            return Err(ToolError::Timeout("tools/list after 30s".into()));
        }
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Arguments) -> Result<String, ToolError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));
        self.results
            .get(name)
            .cloned()
            .unwrap_or_else(|| Ok(format!("{name} ok")))
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
