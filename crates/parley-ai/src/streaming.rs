//! Server-Sent Events (SSE) parsing.
//!
//! `SseDecoder` turns lines into events and knows nothing about I/O, so it
//! can be tested directly. `parse_sse_stream` drives it over a reqwest body.

use futures_util::StreamExt;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use crate::AiError;

/// A single SSE event parsed from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field, when the server sends one.
    pub event: Option<String>,
    /// The `data:` payload; multiple data lines are joined with `\n`.
    pub data: String,
}

/// Incremental line-to-event decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    event: Option<String>,
    data: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line (without its newline). Returns an event when the line
    /// terminates one.
    pub fn push_line(&mut self, line: &str) -> Option<SseEvent> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            return self.flush();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => {
                if !self.data.is_empty() {
                    self.data.push('\n');
                }
                self.data.push_str(value);
            }
            // id:, retry:
            _ => {}
        }
        None
    }

    /// Flush an event left open when the stream ends without a blank line.
    pub fn finish(&mut self) -> Option<SseEvent> {
        self.flush()
    }

    fn flush(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        Some(SseEvent {
            event: self.event.take(),
            data: std::mem::take(&mut self.data),
        })
    }
}

/// Parse an SSE stream from a reqwest response, calling `on_event` for each
/// event. Stops at the first error `on_event` returns.
pub async fn parse_sse_stream(
    response: reqwest::Response,
    mut on_event: impl FnMut(SseEvent) -> Result<(), AiError>,
) -> Result<(), AiError> {
    let byte_stream = response
        .bytes_stream()
        .map(|result| result.map_err(std::io::Error::other));
    let reader = tokio::io::BufReader::new(StreamReader::new(byte_stream));
    let mut lines = reader.lines();
    let mut decoder = SseDecoder::new();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| AiError::NetworkError(e.to_string()))?
    {
        if let Some(event) = decoder.push_line(&line) {
            on_event(event)?;
        }
    }

    if let Some(event) = decoder.finish() {
        on_event(event)?;
    }

    Ok(())
}
