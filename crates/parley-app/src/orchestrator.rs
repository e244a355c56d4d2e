//! The conversation loop and the per-turn tool-call protocol.
//!
//! A turn is: user query, model call with the tool schema, then either a
//! direct answer or exactly one tool call followed by a second model call
//! without tools. An interrupt ends the loop only between turns.

use std::fmt;
use std::future::Future;

use tokio::io::AsyncBufRead;
use tracing::{debug, info, warn};

use parley_ai::{
    AiError, Completion, CompletionResult, Message, ModelClient, TokenTracker, ToolDefinition,
};
use parley_common::ParleyError;
use parley_config::{ChatConfig, ParleyConfig};

use crate::console::{Console, QueryReader};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    AwaitingQuery,
    ModelCallPending,
    ToolCallPending,
    ModelResumePending,
    TurnComplete,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnState::AwaitingQuery => "awaiting_query",
            TurnState::ModelCallPending => "model_call_pending",
            TurnState::ToolCallPending => "tool_call_pending",
            TurnState::ModelResumePending => "model_resume_pending",
            TurnState::TurnComplete => "turn_complete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConversationOptions {
    pub system_prompt: Option<String>,
    pub streaming: bool,
    pub chat: ChatConfig,
}

impl ConversationOptions {
    pub fn from_config(config: &ParleyConfig, allow_streaming: bool) -> Self {
        Self {
            system_prompt: config.model.system_prompt.clone(),
            streaming: config.chat.streaming && allow_streaming,
            chat: config.chat.clone(),
        }
    }
}

pub struct Conversation<'a> {
    model: &'a dyn ModelClient,
    session: &'a Session,
    tools: Vec<ToolDefinition>,
    history: Vec<Message>,
    tracker: TokenTracker,
    options: ConversationOptions,
    console: Console,
    state: TurnState,
}

impl<'a> Conversation<'a> {
    /// The tool schema is snapshotted from the session registry here.
    pub fn new(
        model: &'a dyn ModelClient,
        session: &'a Session,
        options: ConversationOptions,
        console: Console,
    ) -> Self {
        let history = options
            .system_prompt
            .iter()
            .map(Message::system)
            .collect();
        Self {
            model,
            session,
            tools: session.registry().to_model_schema(),
            history,
            tracker: TokenTracker::new(),
            options,
            console,
            state: TurnState::AwaitingQuery,
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn tracker(&self) -> &TokenTracker {
        &self.tracker
    }

    fn transition(&mut self, next: TurnState) {
        debug!(
            session = self.session.id().short(),
            from = %self.state,
            to = %next,
            "turn state"
        );
        self.state = next;
    }

    /// Read queries until an exit keyword, end of input or `interrupt`.
    /// Turn failures are reported and the loop continues; only input errors
    /// end it early. An interrupt that arrives mid-turn lets the turn finish.
    pub async fn run<R, I>(
        &mut self,
        input: &mut QueryReader<R>,
        interrupt: I,
    ) -> Result<(), ParleyError>
    where
        R: AsyncBufRead + Unpin,
        I: Future<Output = ()>,
    {
        tokio::pin!(interrupt);
        loop {
            let next = tokio::select! {
                biased;
                () = &mut interrupt => {
                    self.console.line("");
                    info!(session = self.session.id().short(), "interrupted");
                    return Ok(());
                }
                next = input.next_query(&self.console, &self.options.chat.prompt) => next?,
            };
            let Some(line) = next else {
                self.console.line("");
                info!(session = self.session.id().short(), "input closed");
                return Ok(());
            };

            let query = line.trim();
            if query.is_empty() {
                continue;
            }
            if self.options.chat.is_exit_keyword(query) {
                info!(session = self.session.id().short(), "exit requested");
                return Ok(());
            }

            let mut interrupted = false;
            let result = {
                let turn = self.run_turn(query);
                tokio::pin!(turn);
                tokio::select! {
                    result = &mut turn => result,
                    () = &mut interrupt => {
                        interrupted = true;
                        turn.await
                    }
                }
            };

            match result {
                Ok(text) => self.present(&text),
                Err(e) => {
                    warn!(session = self.session.id().short(), error = %e, "turn failed");
                    let message = if e.is_unavailable() {
                        format!("\nError: model unavailable: {e}\n")
                    } else {
                        format!("\nError: unexpected model response: {e}\n")
                    };
                    self.console.line(&message);
                }
            }

            if interrupted {
                info!(session = self.session.id().short(), "interrupted after turn");
                return Ok(());
            }
        }
    }

    fn present(&self, text: &str) {
        if self.options.streaming {
            // Text has already been written chunk by chunk.
            self.console.line("\n");
        } else {
            self.console.line(&format!("\n{text}\n"));
        }
    }

    /// Run one turn and return the final answer. A query the model never
    /// answered is taken back out of history; a completed tool call and its
    /// result stay.
    pub async fn run_turn(&mut self, query: &str) -> Result<String, AiError> {
        let checkpoint = self.history.len();
        let result = self.drive_turn(query).await;
        if result.is_err() && self.history.len() == checkpoint + 1 {
            self.history.pop();
        }
        self.transition(TurnState::AwaitingQuery);
        result
    }

    async fn drive_turn(&mut self, query: &str) -> Result<String, AiError> {
        self.history.push(Message::user(query));
        self.transition(TurnState::ModelCallPending);

        let (requests, mut assistant_message) = match self.call_model(true).await?.outcome {
            CompletionResult::Answer { text } => {
                self.history.push(Message::assistant(text.clone()));
                self.transition(TurnState::TurnComplete);
                return Ok(text);
            }
            CompletionResult::ToolInvocation {
                requests,
                assistant_message,
            } => (requests, assistant_message),
        };

        let mut requests = requests.into_iter();
        let request = requests.next().ok_or_else(|| {
            AiError::ProtocolError("tool invocation without any tool calls".into())
        })?;
        let dropped: Vec<String> = requests.map(|r| r.tool_name).collect();
        if !dropped.is_empty() {
            warn!(
                session = self.session.id().short(),
                tool = %request.tool_name,
                ?dropped,
                "model requested several tools, running only the first"
            );
        }

        // The tool message below must answer every call the assistant made.
        assistant_message.tool_calls = Some(vec![request.clone()]);
        self.history.push(assistant_message);
        self.transition(TurnState::ToolCallPending);

        let content = match self.session.call_tool(&request).await {
            Ok(result) => result.content,
            Err(e) => {
                warn!(
                    session = self.session.id().short(),
                    tool = %request.tool_name,
                    error = %e,
                    "tool call failed"
                );
                format!("Error: {e}")
            }
        };
        self.history
            .push(Message::tool_result(request.id.clone(), content));
        self.transition(TurnState::ModelResumePending);

        let text = match self.call_model(false).await?.outcome {
            CompletionResult::Answer { text } => text,
            CompletionResult::ToolInvocation {
                requests,
                assistant_message,
            } => {
                let names: Vec<_> = requests.iter().map(|r| r.tool_name.as_str()).collect();
                warn!(
                    session = self.session.id().short(),
                    dropped = ?names,
                    "model asked for more tools after a tool result, ignoring"
                );
                assistant_message.content.unwrap_or_default()
            }
        };

        self.history.push(Message::assistant(text.clone()));
        self.transition(TurnState::TurnComplete);
        Ok(text)
    }

    async fn call_model(&mut self, with_tools: bool) -> Result<Completion, AiError> {
        let tools = if with_tools && !self.tools.is_empty() {
            Some(self.tools.as_slice())
        } else {
            None
        };

        let completion = if self.options.streaming {
            let console = self.console.clone();
            self.model
                .complete_streaming(
                    &self.history,
                    tools,
                    Box::new(move |chunk: String| console.write(&chunk)),
                )
                .await?
        } else {
            self.model.complete(&self.history, tools).await?
        };

        self.tracker.record(&completion.usage);
        Ok(completion)
    }

    /// Log accumulated token usage.
    pub fn report_usage(&self) {
        let total = self.tracker.total();
        info!(
            session = self.session.id().short(),
            model = self.model.model(),
            calls = self.tracker.call_count(),
            input_tokens = total.input_tokens,
            output_tokens = total.output_tokens,
            total_tokens = self.tracker.total_tokens(),
            "token usage"
        );
    }
}
