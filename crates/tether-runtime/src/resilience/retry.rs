//! Per-pass retry state machine.
//!
//! ```text
//! PENDING ──ok──────────────────────────────▶ SUCCESS
//!    │ malformed / timeout / error
//!    ▼
//! RETRY (simplified prompt, backoff) ──ok──▶ SUCCESS
//!    │ retries exhausted
//!    ▼
//! FALLBACK_EXTRACT ──salvaged───────────────▶ SUCCESS (fallback)
//!    │ nothing usable
//!    ▼
//! FAILED ───────────────────────────────────▶ UNSURE @ 0.0 (degraded)
//! ```
//!
//! A timeout is handled exactly like a malformed reply. A call never
//! errors out of the machine: the worst case is a degraded PassResult.

use backon::{BackoffBuilder, ExponentialBuilder};
use std::time::Duration;
use tokio::sync::Semaphore;

use tether_core::PassResult;

use crate::config::RuntimeConfig;
use crate::judgment::{extract_fallback, parse_judgment};
use crate::oracle::{JudgmentOracle, JudgmentRequest, OracleError, PromptStyle};

/// Retry limits for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// First retry delay
    pub backoff: Duration,

    /// Per-attempt timeout
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: config.retry_backoff,
            timeout: config.oracle_timeout,
        }
    }

    /// Delays before each retry; one item per allowed retry.
    fn delays(&self) -> impl Iterator<Item = Duration> {
        ExponentialBuilder::default()
            .with_min_delay(self.backoff)
            .with_max_times(self.max_retries as usize)
            .build()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RuntimeConfig::default())
    }
}

/// States of one pass.
#[derive(Debug, Clone, PartialEq)]
pub enum CallState {
    Pending,
    Retry { attempt: u32 },
    FallbackExtract,
    Success(PassResult),
    Failed(String),
}

/// Drives one oracle pass through the state machine.
pub struct JudgmentCall<'a> {
    oracle: &'a dyn JudgmentOracle,
    policy: RetryPolicy,
    limiter: &'a Semaphore,
}

impl<'a> JudgmentCall<'a> {
    pub fn new(oracle: &'a dyn JudgmentOracle, policy: RetryPolicy, limiter: &'a Semaphore) -> Self {
        Self {
            oracle,
            policy,
            limiter,
        }
    }

    /// Run the pass to a terminal state.
    pub async fn run(&self, mut request: JudgmentRequest) -> PassResult {
        let mut delays = self.policy.delays();
        let mut replies: Vec<String> = Vec::new();
        let mut attempts = 0u32;
        let mut last_error = String::from("no attempt made");
        let mut state = CallState::Pending;

        loop {
            state = match state {
                CallState::Pending | CallState::Retry { .. } => {
                    attempts += 1;
                    request.attempt = attempts;

                    let outcome = match self.attempt(&request).await {
                        Ok(raw) => {
                            let parsed = parse_judgment(&raw);
                            replies.push(raw);
                            parsed
                        }
                        Err(e) => Err(e),
                    };

                    match outcome {
                        Ok(result) => CallState::Success(result.with_attempts(attempts)),
                        Err(e) => {
                            tracing::warn!(
                                claim = %request.claim.text,
                                pass = %request.pass,
                                attempt = attempts,
                                error = %e,
                                "Oracle attempt failed"
                            );
                            last_error = e.to_string();

                            match delays.next() {
                                Some(delay) => {
                                    tokio::time::sleep(delay).await;
                                    request.style = PromptStyle::Simplified;
                                    CallState::Retry {
                                        attempt: attempts + 1,
                                    }
                                }
                                None => CallState::FallbackExtract,
                            }
                        }
                    }
                }

                CallState::FallbackExtract => {
                    match replies.iter().rev().find_map(|raw| extract_fallback(raw)) {
                        Some(result) => {
                            tracing::warn!(
                                claim = %request.claim.text,
                                pass = %request.pass,
                                attempts,
                                "Judgment salvaged by extraction fallback"
                            );
                            CallState::Success(result.with_attempts(attempts))
                        }
                        None => CallState::Failed(last_error.clone()),
                    }
                }

                CallState::Success(result) => return result,

                CallState::Failed(reason) => {
                    tracing::warn!(
                        claim = %request.claim.text,
                        pass = %request.pass,
                        attempts,
                        error = %reason,
                        "Oracle pass degraded to UNSURE"
                    );
                    return PassResult::degraded(reason, attempts);
                }
            };
        }
    }

    /// One bounded, timed oracle call.
    async fn attempt(&self, request: &JudgmentRequest) -> Result<String, OracleError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| OracleError::Unavailable(e.to_string()))?;

        match tokio::time::timeout(self.policy.timeout, self.oracle.judge(request)).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(self.policy.timeout)),
        }
    }
}
