//! Interactive chat surface settings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Print assistant text as it streams in.
    pub streaming: bool,
    /// Printed before each query is read.
    pub prompt: String,
    /// Case-insensitive words that end the session.
    pub exit_keywords: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            streaming: true,
            prompt: "Query: ".into(),
            exit_keywords: vec!["exit".into(), "quit".into()],
        }
    }
}

impl ChatConfig {
    pub fn is_exit_keyword(&self, input: &str) -> bool {
        let input = input.trim();
        self.exit_keywords
            .iter()
            .any(|keyword| keyword.eq_ignore_ascii_case(input))
    }
}
