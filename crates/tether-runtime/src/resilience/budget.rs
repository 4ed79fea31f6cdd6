//! Token budget for LLM-backed oracle calls.
//!
//! One global budget per run. Each call reserves its estimate up front and
//! settles to the real usage afterwards, so concurrent calls cannot jointly
//! overspend. A call that cannot reserve fails with
//! `OracleError::BudgetExceeded` and goes down the normal retry path. A call
//! abandoned mid-flight keeps its estimate charged.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::providers::TokenUsage;

/// Token budget for a scope.
pub struct TokenBudget {
    /// Maximum tokens allowed
    pub max_tokens: u32,

    /// Currently used tokens
    used: AtomicU32,
}

impl TokenBudget {
    /// Create a new token budget.
    pub fn new(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            used: AtomicU32::new(0),
        }
    }

    /// Check if we can afford to use tokens.
    pub fn can_afford(&self, tokens: u32) -> bool {
        self.remaining() >= tokens
    }

    /// Atomically take `tokens` if they fit in what is left.
    pub fn try_reserve(&self, tokens: u32) -> bool {
        self.used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                used.checked_add(tokens).filter(|&total| total <= self.max_tokens)
            })
            .is_ok()
    }

    /// Give back tokens that were reserved but not spent.
    pub fn release(&self, tokens: u32) {
        let _ = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                Some(used.saturating_sub(tokens))
            });
    }

    /// Record token usage.
    pub fn record(&self, tokens: u32) {
        self.used.fetch_add(tokens, Ordering::SeqCst);
    }

    /// Get remaining tokens.
    pub fn remaining(&self) -> u32 {
        self.max_tokens.saturating_sub(self.used.load(Ordering::SeqCst))
    }

    /// Get used tokens.
    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    /// Reset the budget.
    pub fn reset(&self) {
        self.used.store(0, Ordering::SeqCst);
    }
}

/// Accumulated LLM usage for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmUsage {
    /// Total tokens used
    pub total_tokens: u32,

    /// Prompt/input tokens
    pub prompt_tokens: u32,

    /// Completion/output tokens
    pub completion_tokens: u32,

    /// Number of LLM calls made
    pub llm_calls: u32,

    /// Estimated cost in USD
    pub estimated_cost: f64,
}

impl LlmUsage {
    /// Add token usage from a provider response.
    pub fn add(&mut self, usage: &TokenUsage, model: &str) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total();
        self.llm_calls += 1;
        self.estimated_cost += Self::estimate_cost(usage, model);
    }

    /// Estimate cost for a usage entry.
    fn estimate_cost(usage: &TokenUsage, model: &str) -> f64 {
        // USD per million tokens
        let (input_rate, output_rate) = match model {
            m if m.contains("opus") => (5.0, 25.0),
            m if m.contains("haiku") => (1.0, 5.0),
            _ => (3.0, 15.0),
        };

        let input_cost = (usage.prompt_tokens as f64 / 1_000_000.0) * input_rate;
        let output_cost = (usage.completion_tokens as f64 / 1_000_000.0) * output_rate;
        input_cost + output_cost
    }
}

/// Budget tracker shared by every call in a run.
pub struct BudgetTracker {
    budget: TokenBudget,
    usage: RwLock<LlmUsage>,
}

impl BudgetTracker {
    pub fn new(max_tokens: u32) -> Self {
        Self {
            budget: TokenBudget::new(max_tokens),
            usage: RwLock::new(LlmUsage::default()),
        }
    }

    pub fn can_afford(&self, estimated_tokens: u32) -> bool {
        self.budget.can_afford(estimated_tokens)
    }

    /// Reserve an estimate before a call.
    pub fn try_reserve(&self, estimated_tokens: u32) -> bool {
        self.budget.try_reserve(estimated_tokens)
    }

    /// Return a reservation whose call failed before using tokens.
    pub fn release(&self, estimated_tokens: u32) {
        self.budget.release(estimated_tokens);
    }

    /// Replace a reservation with the usage the provider reported.
    pub fn settle(&self, estimated_tokens: u32, usage: &TokenUsage, model: &str) {
        let actual = usage.total();
        if actual >= estimated_tokens {
            self.budget.record(actual - estimated_tokens);
        } else {
            self.budget.release(estimated_tokens - actual);
        }
        self.usage.write().add(usage, model);
    }

    /// Record usage after a call.
    pub fn record_usage(&self, usage: &TokenUsage, model: &str) {
        self.budget.record(usage.total());
        self.usage.write().add(usage, model);
    }

    /// Get current usage.
    pub fn get_usage(&self) -> LlmUsage {
        self.usage.read().clone()
    }

    pub fn remaining(&self) -> u32 {
        self.budget.remaining()
    }

    /// Reset for a new run.
    pub fn reset(&self) {
        self.budget.reset();
        *self.usage.write() = LlmUsage::default();
    }
}

impl Default for BudgetTracker {
    fn default() -> Self {
        Self::new(200_000)
    }
}
