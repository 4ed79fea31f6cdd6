//! Oracle backed by a chat-completion provider.

use async_trait::async_trait;
use std::sync::Arc;

use super::{JudgmentOracle, JudgmentRequest, OracleError};
use crate::prompts::build_messages;
use crate::providers::{CompletionConfig, LlmProvider};
use crate::resilience::BudgetTracker;

/// Asks an LLM for judgments and charges every call to a shared budget.
pub struct LlmOracle {
    provider: Arc<dyn LlmProvider>,
    completion: CompletionConfig,
    budget: Arc<BudgetTracker>,
}

impl LlmOracle {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        completion: CompletionConfig,
        budget: Arc<BudgetTracker>,
    ) -> Self {
        Self {
            provider,
            completion,
            budget,
        }
    }

    pub fn budget(&self) -> &Arc<BudgetTracker> {
        &self.budget
    }
}

#[async_trait]
impl JudgmentOracle for LlmOracle {
    async fn judge(&self, request: &JudgmentRequest) -> Result<String, OracleError> {
        let messages = build_messages(request);

        let prompt_len: u32 = messages
            .iter()
            .map(|m| self.provider.estimate_tokens(&m.content))
            .sum();
        let estimated = prompt_len + self.completion.max_tokens;
        if !self.budget.try_reserve(estimated) {
            tracing::warn!(
                claim = %request.claim.text,
                pass = %request.pass,
                estimated,
                remaining = self.budget.remaining(),
                "Token budget exhausted"
            );
            return Err(OracleError::BudgetExceeded);
        }

        let response = match self.provider.complete(messages, &self.completion).await {
            Ok(response) => response,
            Err(e) => {
                self.budget.release(estimated);
                return Err(e.into());
            }
        };
        self.budget.settle(estimated, &response.usage, &response.model);

        tracing::debug!(
            provider = self.provider.name(),
            pass = %request.pass,
            attempt = request.attempt,
            tokens = response.usage.total(),
            "Oracle replied"
        );

        Ok(response.content)
    }

    fn name(&self) -> &str {
        self.provider.name()
    }
}
