//! Folds chat-completion stream chunks into a single `Completion`.

use crate::{AiError, Completion, TokenUsage};

use super::client::{build_outcome, RawToolCall, Usage};

/// Upper bound on tool calls in one streamed response.
const MAX_TOOL_CALLS: usize = 64;

/// Tool-call fragments arrive keyed by `index`; the id and name come once,
/// the arguments as a sequence of JSON text pieces.
#[derive(Debug, Default)]
pub(crate) struct StreamAccumulator {
    content: String,
    saw_content: bool,
    calls: Vec<RawToolCall>,
    usage: TokenUsage,
    done: bool,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one `data:` payload. Returns the text delta to display, if any.
    pub fn push(&mut self, data: &str) -> Result<Option<String>, AiError> {
        if data.trim() == "[DONE]" {
            self.done = true;
            return Ok(None);
        }

        let chunk: serde_json::Value = serde_json::from_str(data)
            .map_err(|e| AiError::ProtocolError(format!("invalid stream chunk: {e}")))?;

        if let Some(err) = chunk.get("error") {
            let message = err["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| err.to_string());
            return Err(AiError::ProtocolError(format!("stream error: {message}")));
        }

        if let Some(usage) = chunk.get("usage").filter(|u| !u.is_null()) {
            if let Ok(usage) = serde_json::from_value::<Usage>(usage.clone()) {
                self.usage = TokenUsage {
                    input_tokens: usage.prompt_tokens,
                    output_tokens: usage.completion_tokens,
                };
            }
        }

        let delta = &chunk["choices"][0]["delta"];
        if delta.is_null() {
            return Ok(None);
        }

        if let Some(fragments) = delta["tool_calls"].as_array() {
            for fragment in fragments {
                self.push_tool_fragment(fragment)?;
            }
        }

        match delta["content"].as_str() {
            Some(text) if !text.is_empty() => {
                self.saw_content = true;
                self.content.push_str(text);
                Ok(Some(text.to_string()))
            }
            Some(_) => {
                self.saw_content = true;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn push_tool_fragment(&mut self, fragment: &serde_json::Value) -> Result<(), AiError> {
        let index = match fragment["index"].as_u64() {
            Some(i) => usize::try_from(i).unwrap_or(usize::MAX),
            None => self.calls.len().saturating_sub(1),
        };
        if index >= MAX_TOOL_CALLS {
            return Err(AiError::ProtocolError(format!(
                "tool call index {index} exceeds the limit of {MAX_TOOL_CALLS}"
            )));
        }
        while self.calls.len() <= index {
            self.calls.push(RawToolCall::default());
        }
        let call = &mut self.calls[index];

        if let Some(id) = fragment["id"].as_str() {
            call.id = id.to_string();
        }
        if let Some(name) = fragment["function"]["name"].as_str() {
            call.name.push_str(name);
        }
        if let Some(args) = fragment["function"]["arguments"].as_str() {
            call.arguments.push_str(args);
        }
        Ok(())
    }

    /// Whether the `[DONE]` sentinel was seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn finish(self) -> Result<Completion, AiError> {
        let content = if self.saw_content || !self.content.is_empty() {
            Some(self.content)
        } else {
            None
        };
        let outcome = build_outcome(content, self.calls)?;
        Ok(Completion {
            outcome,
            usage: self.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CompletionResult;

    #[test]
    fn text_deltas_are_concatenated() {
        let mut acc = StreamAccumulator::new();
        assert_eq!(
            acc.push(r#"{"choices":[{"delta":{"role":"assistant","content":""}}]}"#)
                .unwrap(),
            None
        );
        assert_eq!(
            acc.push(r#"{"choices":[{"delta":{"content":"It is "}}]}"#)
                .unwrap()
                .as_deref(),
            Some("It is ")
        );
        acc.push(r#"{"choices":[{"delta":{"content":"sunny."}}]}"#)
            .unwrap();
        acc.push(r#"{"choices":[],"usage":{"prompt_tokens":40,"completion_tokens":3}}"#)
            .unwrap();
        acc.push("[DONE]").unwrap();
        assert!(acc.is_done());

        let completion = acc.finish().unwrap();
        assert_eq!(
            completion.outcome,
            CompletionResult::Answer {
                text: "It is sunny.".into()
            }
        );
        assert_eq!(completion.usage.input_tokens, 40);
        assert_eq!(completion.usage.output_tokens, 3);
    }

    #[test]
    fn tool_call_fragments_are_assembled() {
        let mut acc = StreamAccumulator::new();
        acc.push(r#"{"choices":[{"delta":{"role":"assistant","content":null,"tool_calls":[{"index":0,"id":"call_9","type":"function","function":{"name":"query_weather","arguments":""}}]}}]}"#).unwrap();
        acc.push(r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"city\":"}}]}}]}"#).unwrap();
        acc.push(r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"Taipei\"}"}}]}}]}"#).unwrap();
        acc.push("[DONE]").unwrap();

        match acc.finish().unwrap().outcome {
            CompletionResult::ToolInvocation { requests, .. } => {
                assert_eq!(requests.len(), 1);
                assert_eq!(requests[0].id, "call_9");
                assert_eq!(requests[0].tool_name, "query_weather");
                assert_eq!(requests[0].arguments["city"], "Taipei");
            }
            other => panic!("expected tool invocation, got {other:?}"),
        }
    }

    #[test]
    fn multiple_calls_by_index() {
        let mut acc = StreamAccumulator::new();
        acc.push(r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"id":"b","function":{"name":"second","arguments":"{}"}}]}}]}"#).unwrap();
        acc.push(r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"a","function":{"name":"first","arguments":"{}"}}]}}]}"#).unwrap();

        match acc.finish().unwrap().outcome {
            CompletionResult::ToolInvocation { requests, .. } => {
                let names: Vec<_> = requests.iter().map(|r| r.tool_name.as_str()).collect();
                assert_eq!(names, ["first", "second"]);
            }
            other => panic!("expected tool invocation, got {other:?}"),
        }
    }

    #[test]
    fn oversized_tool_index_is_rejected() {
        let mut acc = StreamAccumulator::new();
        let err = acc
            .push(r#"{"choices":[{"delta":{"tool_calls":[{"index":20000000,"id":"x","function":{"name":"query_weather","arguments":"{}"}}]}}]}"#)
            .unwrap_err();
        assert!(matches!(err, AiError::ProtocolError(_)));
        assert!(acc.calls.is_empty());
    }

    #[test]
    fn error_chunk_fails() {
        let mut acc = StreamAccumulator::new();
        let err = acc
            .push(r#"{"error":{"message":"context length exceeded"}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("context length exceeded"));
    }

    #[test]
    fn invalid_json_fails() {
        let mut acc = StreamAccumulator::new();
        assert!(matches!(
            acc.push("{not json"),
            Err(AiError::ProtocolError(_))
        ));
    }

    #[test]
    fn empty_stream_is_protocol_error() {
        let mut acc = StreamAccumulator::new();
        acc.push("[DONE]").unwrap();
        assert!(matches!(acc.finish(), Err(AiError::ProtocolError(_))));
    }

    #[test]
    fn empty_text_answer_is_allowed() {
        let mut acc = StreamAccumulator::new();
        acc.push(r#"{"choices":[{"delta":{"content":""}}]}"#).unwrap();
        assert_eq!(
            acc.finish().unwrap().outcome,
            CompletionResult::Answer {
                text: String::new()
            }
        );
    }
}
