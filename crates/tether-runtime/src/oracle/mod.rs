//! Judgment oracle contract.
//!
//! An oracle answers one question: given this claim and this evidence
//! rendering, is the claim entailed, contradicted, or undecidable, and how
//! sure are you? Replies are raw text and untrusted; the runtime validates
//! every one of them (see [`crate::judgment`]).

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use tether_core::{Claim, PassKind};

use crate::providers::ProviderError;

mod llm;
mod scripted;

pub use llm::LlmOracle;
pub use scripted::{judgment_json, ScriptStep, ScriptedOracle};

/// Errors from a single oracle call. All of them go through the retry path.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Malformed oracle reply: {0}")]
    Malformed(String),

    #[error("Oracle timed out after {0:?}")]
    Timeout(Duration),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Token budget exceeded")]
    BudgetExceeded,

    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
}

/// Prompt variant. Retries switch to the simplified form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    Standard,
    Simplified,
}

/// One question put to the oracle.
#[derive(Debug, Clone)]
pub struct JudgmentRequest {
    pub claim: Claim,

    /// Which rendering `evidence` is
    pub pass: PassKind,

    /// Rendered evidence text, one `[E<n>]`-tagged span per line
    pub evidence: String,

    pub style: PromptStyle,

    /// 1-based attempt number
    pub attempt: u32,
}

impl JudgmentRequest {
    pub fn new(claim: Claim, pass: PassKind, evidence: impl Into<String>) -> Self {
        Self {
            claim,
            pass,
            evidence: evidence.into(),
            style: PromptStyle::Standard,
            attempt: 1,
        }
    }
}

/// The external judgment capability.
///
/// Implementations must not retain state between calls that would make
/// one judgment depend on another.
#[async_trait]
pub trait JudgmentOracle: Send + Sync {
    /// Ask for a judgment. Returns the raw reply text.
    async fn judge(&self, request: &JudgmentRequest) -> Result<String, OracleError>;

    /// Oracle name for logging.
    fn name(&self) -> &str;
}

/// Render evidence texts as tagged lines: `[E1] ...`, `[E2] ...`.
///
/// Both passes use the same layout so only the tokens differ.
pub fn render_evidence<'a>(texts: impl IntoIterator<Item = &'a str>) -> String {
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| format!("[E{}] {}", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n")
}
