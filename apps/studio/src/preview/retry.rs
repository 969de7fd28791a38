//! Retry classification for settled compile failures.
//!
//! Busy and overloaded responses are load signals, not verdicts on the
//! document, and earn a single delayed retry each. Every other failure,
//! including timeouts, settles the request as failed immediately.

use std::time::Duration;

use crate::compiler::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule one more dispatch after this delay.
    After(Duration),
    /// Settle as failed.
    Fatal,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub busy_delay: Duration,
    pub overloaded_delay: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            busy_delay: Duration::from_secs(2),
            overloaded_delay: Duration::from_secs(5),
            max_retries: 1,
        }
    }
}

impl RetryPolicy {
    /// Decides the fate of a failed dispatch. `attempt` is the zero-based
    /// index of the dispatch that just failed; once it reaches
    /// `max_retries`, the budget is spent and even transient failures
    /// settle as fatal.
    pub fn decide(&self, error: &CompileError, attempt: u32) -> RetryDecision {
        if attempt >= self.max_retries {
            return RetryDecision::Fatal;
        }
        match error {
            CompileError::Busy => RetryDecision::After(self.busy_delay),
            CompileError::Overloaded => RetryDecision::After(self.overloaded_delay),
            _ => RetryDecision::Fatal,
        }
    }
}
