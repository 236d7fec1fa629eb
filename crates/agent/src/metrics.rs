//! Per-turn session metrics for the front end's status line.
//!
//! Reset at the start of every user turn. Display only; nothing in the loop
//! depends on these values for correctness.

use grokcli_core::provider::Usage;
use serde::{Deserialize, Serialize};

/// Token counts for one or more model calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,

    /// Set when any contributing count came from the local estimator
    /// instead of the provider.
    #[serde(default)]
    pub approximate: bool,
}

impl TokenUsage {
    /// Usage as reported by the provider.
    pub fn exact(usage: Usage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            approximate: false,
        }
    }

    /// Usage computed by the local estimator.
    pub fn estimated(prompt_tokens: usize, completion_tokens: usize) -> Self {
        let prompt_tokens = u32::try_from(prompt_tokens).unwrap_or(u32::MAX);
        let completion_tokens = u32::try_from(completion_tokens).unwrap_or(u32::MAX);
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
            approximate: true,
        }
    }

    /// Fold another call's usage into this one.
    pub fn accumulate(&mut self, other: TokenUsage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(other.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
        self.approximate |= other.approximate;
    }
}

impl std::fmt::Display for TokenUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mark = if self.approximate { "~" } else { "" };
        write!(
            f,
            "{mark}{} prompt / {mark}{} completion / {mark}{} total",
            self.prompt_tokens, self.completion_tokens, self.total_tokens
        )
    }
}

/// Metrics for the most recent user turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionMetrics {
    /// Summed usage of every model call made during the turn
    pub last_token_usage: TokenUsage,

    /// Errors caught at the loop boundary during the turn
    pub last_error_count: u32,
}

impl SessionMetrics {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_usage(&mut self, usage: TokenUsage) {
        self.last_token_usage.accumulate(usage);
    }

    pub fn record_error(&mut self) {
        self.last_error_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_sums_and_taints_approximate() {
        let mut usage = TokenUsage::exact(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        });
        usage.accumulate(TokenUsage::estimated(3, 2));

        assert_eq!(usage.prompt_tokens, 13);
        assert_eq!(usage.completion_tokens, 7);
        assert_eq!(usage.total_tokens, 20);
        assert!(usage.approximate);
    }

    #[test]
    fn display_marks_approximate_counts() {
        let exact = TokenUsage::exact(Usage {
            prompt_tokens: 1,
            completion_tokens: 2,
            total_tokens: 3,
        });
        assert_eq!(exact.to_string(), "1 prompt / 2 completion / 3 total");
        assert!(TokenUsage::estimated(1, 2).to_string().starts_with("~1"));
    }

    #[test]
    fn reset_clears_counters() {
        let mut metrics = SessionMetrics::default();
        metrics.record_error();
        metrics.record_usage(TokenUsage::estimated(5, 5));
        assert_eq!(metrics.last_error_count, 1);

        metrics.reset();
        assert_eq!(metrics, SessionMetrics::default());
    }
}
