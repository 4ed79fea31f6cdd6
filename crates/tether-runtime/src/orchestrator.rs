//! Two-pass verification orchestrator.
//!
//! For every claim the oracle is asked twice, once over scrubbed evidence
//! and once over the full evidence. It implements:
//! - Request validation and profile resolution before any oracle call
//! - One scrubbing run per request, on the blocking pool; the placeholder
//!   map is read-only after
//! - Parallel fan-out of both passes via tokio::join!
//! - Bounded claim concurrency with results kept in request order
//! - A global cap on oracle calls in flight
//! - Deterministic fan-in through the classifier and aggregator

use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

use tether_core::{
    Aggregator, Claim, DeltaClassifier, PassKind, ProfileRegistry, Report, Scrubber,
    TriggerContext, VerificationResult, VerifyError, VerifyRequest,
};

use crate::config::{ConfigError, RuntimeConfig};
use crate::oracle::{render_evidence, JudgmentOracle, JudgmentRequest};
use crate::resilience::{JudgmentCall, RetryPolicy};

/// Errors that abort a whole run.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Request rejected: {0}")]
    Request(#[from] VerifyError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Oracle not configured: {0}")]
    NotConfigured(String),

    #[error("Verification run cancelled")]
    Cancelled,

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Runs two-pass verification for a batch of claims.
pub struct TwoPassOrchestrator {
    oracle: Arc<dyn JudgmentOracle>,
    registry: ProfileRegistry,
    config: RuntimeConfig,
    limiter: Semaphore,
}

impl TwoPassOrchestrator {
    /// Create an orchestrator over the built-in profiles.
    pub fn new(oracle: Arc<dyn JudgmentOracle>, config: RuntimeConfig) -> Self {
        Self::with_registry(oracle, config, ProfileRegistry::builtin().clone())
    }

    pub fn with_registry(
        oracle: Arc<dyn JudgmentOracle>,
        config: RuntimeConfig,
        registry: ProfileRegistry,
    ) -> Self {
        let limiter = Semaphore::new(config.max_concurrent_calls.max(1));
        Self {
            oracle,
            registry,
            config,
            limiter,
        }
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Whether a claim warrants verification under a profile's trigger policy.
    ///
    /// Claims whose kind marks them critical count as critical.
    pub fn should_verify(
        &self,
        profile: &str,
        claim: &Claim,
        mut ctx: TriggerContext,
    ) -> Result<bool, VerifyError> {
        let profile = self.registry.resolve(profile)?;
        ctx.critical |= claim.is_critical();
        Ok(profile.trigger.should_verify(&ctx))
    }

    /// Verify every claim in a request.
    ///
    /// Fails only on request-level problems (unknown profile, no claims, no
    /// evidence). Per-claim oracle failures degrade that claim instead.
    pub async fn verify(&self, request: &VerifyRequest) -> Result<Report, RuntimeError> {
        request.validate()?;
        let profile = self.registry.resolve(&request.profile)?;

        tracing::info!(
            profile = %profile.name,
            claims = request.claims.len(),
            evidence = request.evidence.len(),
            oracle = self.oracle.name(),
            "Starting verification run"
        );

        let scrubber = Scrubber::new(profile);
        let evidence = request.evidence.clone();
        let outcome = tokio::task::spawn_blocking(move || scrubber.scrub(&evidence)).await?;
        let scrubbed_rendering = render_evidence(outcome.spans.iter().map(|s| s.text.as_str()));
        let full_rendering = render_evidence(request.evidence.iter().map(|e| e.text.as_str()));

        let classifier = DeltaClassifier::new(profile.thresholds);
        let policy = RetryPolicy::from_config(&self.config);

        let results: Vec<VerificationResult> = stream::iter(request.claims.iter().cloned())
            .map(|claim| {
                self.verify_claim(claim, &scrubbed_rendering, &full_rendering, &classifier, policy)
            })
            .buffered(self.config.max_concurrent_claims.max(1))
            .collect()
            .await;

        let report = Aggregator::new().aggregate(&profile.name, results, outcome.map.len());

        tracing::info!(
            profile = %report.profile,
            recommendation = %report.recommendation,
            verified = report.counts.verified,
            plausible = report.counts.plausible,
            suspicious = report.counts.suspicious,
            unsupported = report.counts.unsupported,
            "Verification run finished"
        );

        Ok(report)
    }

    /// Verify, abandoning the run as soon as `cancel` resolves.
    ///
    /// In-flight oracle calls are dropped and no partial report is returned.
    pub async fn verify_with_cancel<F>(
        &self,
        request: &VerifyRequest,
        cancel: F,
    ) -> Result<Report, RuntimeError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            biased;
            _ = cancel => {
                tracing::info!(profile = %request.profile, "Verification run cancelled");
                Err(RuntimeError::Cancelled)
            }
            result = self.verify(request) => result,
        }
    }

    async fn verify_claim(
        &self,
        claim: Claim,
        scrubbed_rendering: &str,
        full_rendering: &str,
        classifier: &DeltaClassifier,
        policy: RetryPolicy,
    ) -> VerificationResult {
        let call = JudgmentCall::new(self.oracle.as_ref(), policy, &self.limiter);

        let scrubbed_request = JudgmentRequest::new(claim.clone(), PassKind::Scrubbed, scrubbed_rendering);
        let full_request = JudgmentRequest::new(claim.clone(), PassKind::Full, full_rendering);

        // Fan-out: both passes concurrently
        let (scrubbed, full) = tokio::join!(call.run(scrubbed_request), call.run(full_request));

        classifier.classify(claim, scrubbed, full)
    }
}

/// Builder for TwoPassOrchestrator.
pub struct TwoPassOrchestratorBuilder {
    oracle: Option<Arc<dyn JudgmentOracle>>,
    config: RuntimeConfig,
    registry: Option<ProfileRegistry>,
}

impl TwoPassOrchestratorBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            oracle: None,
            config: RuntimeConfig::default(),
            registry: None,
        }
    }

    /// Set the judgment oracle.
    pub fn oracle(mut self, oracle: Arc<dyn JudgmentOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Set the configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom profile registry instead of the built-ins.
    pub fn registry(mut self, registry: ProfileRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the orchestrator.
    pub fn build(self) -> Result<TwoPassOrchestrator, RuntimeError> {
        let oracle = self
            .oracle
            .ok_or_else(|| RuntimeError::NotConfigured("No oracle set".to_string()))?;
        self.config.validate()?;

        let registry = self
            .registry
            .unwrap_or_else(|| ProfileRegistry::builtin().clone());

        Ok(TwoPassOrchestrator::with_registry(oracle, self.config, registry))
    }
}

impl Default for TwoPassOrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
