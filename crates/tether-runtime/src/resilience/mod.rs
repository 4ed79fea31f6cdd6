//! Resilience patterns for tether-runtime.
//!
//! This module provides:
//! - The per-pass retry state machine (retry, fallback extraction, degrade)
//! - Token budget management

mod budget;
mod retry;

pub use budget::{BudgetTracker, LlmUsage, TokenBudget};
pub use retry::{CallState, JudgmentCall, RetryPolicy};
