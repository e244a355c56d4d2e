//! ModelClient trait implementation for OpenAiClient (complete + streaming).

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::streaming::{parse_sse_stream, SseEvent};
use crate::{AiError, Completion, Message, ModelClient, ToolDefinition};

use super::client::OpenAiClient;
use super::stream::StreamAccumulator;

impl OpenAiClient {
    /// POST the body and map non-success statuses to errors.
    async fn send(&self, body: &serde_json::Value) -> Result<reqwest::Response, AiError> {
        let response = self
            .http
            .post(self.api_url())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(AiError::from_reqwest)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AiError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let text = text.chars().take(200).collect::<String>();
            return Err(AiError::ApiError {
                status: status.as_u16(),
                message: text,
            });
        }

        Ok(response)
    }

    async fn complete_once(&self, body: &serde_json::Value) -> Result<Completion, AiError> {
        let response = self.send(body).await?;
        let json: serde_json::Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                AiError::Timeout
            } else {
                AiError::ProtocolError(format!("response body is not JSON: {e}"))
            }
        })?;
        Self::parse_response(json)
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(
        &self,
        history: &[Message],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<Completion, AiError> {
        let body = self.build_request_body(history, tools, false);

        debug!(
            model = %self.config.model,
            messages = history.len(),
            tools = tools.map_or(0, <[_]>::len),
            "chat completion request"
        );

        self.config
            .retry
            .run("chat completion", || self.complete_once(&body))
            .await
    }

    async fn complete_streaming(
        &self,
        history: &[Message],
        tools: Option<&[ToolDefinition]>,
        on_chunk: Box<dyn Fn(String) + Send + Sync>,
    ) -> Result<Completion, AiError> {
        let body = self.build_request_body(history, tools, true);

        debug!(
            model = %self.config.model,
            messages = history.len(),
            tools = tools.map_or(0, <[_]>::len),
            "chat completion streaming request"
        );

        // Once text has been shown there is no retrying, so only the send is retried.
        let response = self
            .config
            .retry
            .run("chat completion stream", || self.send(&body))
            .await?;

        let mut acc = StreamAccumulator::new();
        parse_sse_stream(response, |event: SseEvent| {
            if acc.is_done() {
                return Ok(());
            }
            if let Some(chunk) = acc.push(&event.data)? {
                on_chunk(chunk);
            }
            Ok(())
        })
        .await?;

        if !acc.is_done() {
            warn!(model = %self.config.model, "stream ended without [DONE]");
        }

        acc.finish()
    }
}
