//! # tether-runtime
//!
//! Async side of two-pass claim verification.
//!
//! `tether-core` scrubs evidence and classifies pass results; this crate
//! asks a judgment oracle for those results. It provides:
//! - The [`JudgmentOracle`] contract and an LLM-backed implementation
//! - Reply validation against a JSON schema, with a regex fallback
//! - A per-pass retry state machine with timeouts and backoff
//! - The [`TwoPassOrchestrator`] that runs a whole request
//!
//! ## Important
//!
//! Oracle failures never fail a run. A pass that cannot be judged degrades
//! to UNSURE at confidence 0.0 and is annotated in the report.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tether_runtime::{RuntimeConfig, ScriptedOracle, TwoPassOrchestratorBuilder};
//!
//! let orchestrator = TwoPassOrchestratorBuilder::new()
//!     .oracle(Arc::new(ScriptedOracle::new()))
//!     .config(RuntimeConfig::default())
//!     .build()?;
//!
//! let report = orchestrator.verify(&request).await?;
//! println!("{}", report.recommendation);
//! ```

pub mod config;
pub mod judgment;
pub mod oracle;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod resilience;

pub use config::{ConfigError, ProviderSettings, RuntimeConfig};
pub use judgment::{extract_fallback, parse_judgment};
pub use oracle::{
    judgment_json, render_evidence, JudgmentOracle, JudgmentRequest, LlmOracle, OracleError,
    PromptStyle, ScriptStep, ScriptedOracle,
};
pub use orchestrator::{RuntimeError, TwoPassOrchestrator, TwoPassOrchestratorBuilder};
pub use providers::{CompletionConfig, LlmProvider, ProviderError};
pub use resilience::{BudgetTracker, JudgmentCall, RetryPolicy};

#[cfg(feature = "anthropic")]
pub use providers::{AnthropicProvider, ANTHROPIC_API_KEY_ENV};
