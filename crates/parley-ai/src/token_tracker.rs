//! Token usage tracking across the calls of one run.

use crate::TokenUsage;

/// Tracks cumulative token usage over a conversation.
pub struct TokenTracker {
    total: TokenUsage,
    call_count: u64,
}

impl TokenTracker {
    pub fn new() -> Self {
        Self {
            total: TokenUsage::default(),
            call_count: 0,
        }
    }

    /// Record token usage from one completion.
    pub fn record(&mut self, usage: &TokenUsage) {
        self.total.input_tokens = self.total.input_tokens.saturating_add(usage.input_tokens);
        self.total.output_tokens = self.total.output_tokens.saturating_add(usage.output_tokens);
        self.call_count += 1;
    }

    pub fn total(&self) -> &TokenUsage {
        &self.total
    }

    pub fn total_tokens(&self) -> u64 {
        self.total.total_tokens()
    }

    /// Number of completions recorded.
    pub fn call_count(&self) -> u64 {
        self.call_count
    }
}

impl Default for TokenTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_totals() {
        let mut tracker = TokenTracker::new();
        tracker.record(&TokenUsage {
            input_tokens: 100,
            output_tokens: 20,
        });
        tracker.record(&TokenUsage {
            input_tokens: 150,
            output_tokens: 30,
        });

        assert_eq!(tracker.call_count(), 2);
        assert_eq!(tracker.total().input_tokens, 250);
        assert_eq!(tracker.total().output_tokens, 50);
        assert_eq!(tracker.total_tokens(), 300);
    }

    #[test]
    fn zero_usage_still_counts_call() {
        let mut tracker = TokenTracker::default();
        tracker.record(&TokenUsage::default());
        assert_eq!(tracker.call_count(), 1);
        assert_eq!(tracker.total_tokens(), 0);
    }
}
