//! OpenAI-compatible chat-completions client.
//!
//! Implements `ModelClient` against `POST {base_url}/chat/completions`, which
//! OpenAI and most self-hosted gateways (vLLM, Ollama, LiteLLM) accept.

mod api;
mod client;
mod config;
mod stream;

pub use client::OpenAiClient;
pub use config::OpenAiConfig;
