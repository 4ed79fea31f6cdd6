//! Deterministic stand-in oracle driven by per-claim scripts.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

use tether_core::{PassKind, Verdict};

use super::{JudgmentOracle, JudgmentRequest, OracleError, PromptStyle};
use crate::providers::ProviderError;

/// One scripted reaction to a judge call.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Return this raw reply text
    Reply(String),
    /// Fail with a provider error carrying this message
    Error(String),
    /// Never answer
    Hang,
}

/// A well-formed judgment reply.
pub fn judgment_json(verdict: Verdict, confidence: f64, reasoning: &str) -> String {
    serde_json::json!({
        "verdict": verdict,
        "confidence": confidence,
        "reasoning": reasoning,
    })
    .to_string()
}

/// Replays scripted replies keyed by claim text and pass.
///
/// Steps are consumed in order; the last step of a script repeats once the
/// rest are used up. Calls with no script get the default reply, or an
/// error if there is none.
#[derive(Default)]
pub struct ScriptedOracle {
    scripts: Mutex<HashMap<(String, PassKind), VecDeque<ScriptStep>>>,
    default_reply: Option<String>,
    calls: Mutex<Vec<(String, PassKind, PromptStyle)>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply used for calls without a script.
    pub fn with_default(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = Some(reply.into());
        self
    }

    /// Script the replies for one claim and pass.
    pub fn script(
        self,
        claim: impl Into<String>,
        pass: PassKind,
        steps: impl IntoIterator<Item = ScriptStep>,
    ) -> Self {
        self.scripts
            .lock()
            .insert((claim.into(), pass), steps.into_iter().collect());
        self
    }

    /// Script a single well-formed verdict for one claim and pass.
    pub fn answer(self, claim: impl Into<String>, pass: PassKind, verdict: Verdict, confidence: f64) -> Self {
        let reply = judgment_json(verdict, confidence, "scripted");
        self.script(claim, pass, [ScriptStep::Reply(reply)])
    }

    /// Calls received so far, in arrival order.
    pub fn calls(&self) -> Vec<(String, PassKind, PromptStyle)> {
        self.calls.lock().clone()
    }

    fn next_step(&self, claim: &str, pass: PassKind) -> Option<ScriptStep> {
        let mut scripts = self.scripts.lock();
        let queue = scripts.get_mut(&(claim.to_string(), pass))?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl JudgmentOracle for ScriptedOracle {
    async fn judge(&self, request: &JudgmentRequest) -> Result<String, OracleError> {
        self.calls
            .lock()
            .push((request.claim.text.clone(), request.pass, request.style));

        let step = self
            .next_step(&request.claim.text, request.pass)
            .or_else(|| self.default_reply.clone().map(ScriptStep::Reply));

        match step {
            Some(ScriptStep::Reply(reply)) => Ok(reply),
            Some(ScriptStep::Error(message)) => {
                Err(OracleError::Provider(ProviderError::HttpError(message)))
            }
            Some(ScriptStep::Hang) => futures::future::pending().await,
            None => Err(OracleError::Unavailable(format!(
                "no script for '{}' ({} pass)",
                request.claim.text, request.pass
            ))),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::Claim;

    #[tokio::test]
    async fn test_steps_consumed_then_last_repeats() {
        let oracle = ScriptedOracle::new().script(
            "c",
            PassKind::Full,
            [
                ScriptStep::Reply("first".to_string()),
                ScriptStep::Reply("second".to_string()),
            ],
        );
        let request = JudgmentRequest::new(Claim::new("c"), PassKind::Full, "[E1] e");

        assert_eq!(oracle.judge(&request).await.unwrap(), "first");
        assert_eq!(oracle.judge(&request).await.unwrap(), "second");
        assert_eq!(oracle.judge(&request).await.unwrap(), "second");
        assert_eq!(oracle.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_unscripted_without_default_errors() {
        let oracle = ScriptedOracle::new();
        let request = JudgmentRequest::new(Claim::new("c"), PassKind::Scrubbed, "[E1] e");
        assert!(matches!(
            oracle.judge(&request).await,
            Err(OracleError::Unavailable(_))
        ));
    }

    #[test]
    fn test_judgment_json_shape() {
        let reply = judgment_json(Verdict::Unsure, 0.25, "no signal");
        let value: serde_json::Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(value["verdict"], "UNSURE");
        assert_eq!(value["confidence"], 0.25);
    }
}
