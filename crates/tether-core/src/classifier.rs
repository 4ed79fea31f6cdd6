//! Delta classifier: turns a pair of pass results into a status.
//!
//! Branches are evaluated top to bottom, first match wins:
//! 1. Any CONTRADICTED pass → UNSUPPORTED
//! 2. UNSURE scrubbed, ENTAILED full, full confidence at the verified
//!    cutoff → VERIFIED (the evidence flipped the verdict)
//! 3. Numeric ladder on full confidence and delta
//!
//! UNSURE on both passes caps the result at PLAUSIBLE, whatever the ladder
//! says.
//!
//! A degraded pass is UNSURE at 0.0, so a scrubbed pass that failed outright
//! still satisfies branch 2 when the full pass is confidently ENTAILED. That
//! VERIFIED is kept, logged at warn level and carries the pass annotation.

use crate::profile::ThresholdSet;
use crate::types::{
    Claim, PassResult, StatusReason, VerificationResult, VerificationStatus, Verdict,
};

/// Tolerance for threshold comparisons on values produced by subtraction.
const EPSILON: f64 = 1e-9;

fn at_least(value: f64, cutoff: f64) -> bool {
    value + EPSILON >= cutoff
}

/// Resolves verification status against one profile's thresholds.
#[derive(Debug, Clone, Copy)]
pub struct DeltaClassifier {
    thresholds: ThresholdSet,
}

impl DeltaClassifier {
    pub fn new(thresholds: ThresholdSet) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ThresholdSet {
        &self.thresholds
    }

    /// Classify one claim from its two pass results.
    pub fn classify(&self, claim: Claim, scrubbed: PassResult, full: PassResult) -> VerificationResult {
        let delta = full.confidence - scrubbed.confidence;
        let (status, reason) = self.resolve(&scrubbed, &full);

        tracing::debug!(
            claim = %claim.text,
            scrubbed = scrubbed.confidence,
            full = full.confidence,
            delta,
            status = %status,
            "Classified claim"
        );

        let result = VerificationResult {
            claim,
            scrubbed,
            full,
            delta,
            status,
            reason,
        };
        if result.verified_on_degraded_pass() {
            tracing::warn!(
                claim = %result.claim.text,
                reason = ?result.reason,
                "VERIFIED rests on a degraded pass"
            );
        }
        result
    }

    /// Status and the branch that produced it.
    pub fn resolve(
        &self,
        scrubbed: &PassResult,
        full: &PassResult,
    ) -> (VerificationStatus, StatusReason) {
        let t = &self.thresholds;

        // Rule 1: contradiction is decisive
        if scrubbed.verdict == Verdict::Contradicted || full.verdict == Verdict::Contradicted {
            return (VerificationStatus::Unsupported, StatusReason::Contradicted);
        }

        // Rule 2: evidence turned UNSURE into ENTAILED
        if scrubbed.verdict == Verdict::Unsure
            && full.verdict == Verdict::Entailed
            && at_least(full.confidence, t.verified_confidence)
        {
            return (VerificationStatus::Verified, StatusReason::EvidenceFlip);
        }

        // Rule 3: numeric ladder
        let delta = full.confidence - scrubbed.confidence;
        let (status, reason) = if at_least(full.confidence, t.verified_confidence)
            && at_least(delta, t.verified_delta)
        {
            (VerificationStatus::Verified, StatusReason::VerifiedThresholds)
        } else if at_least(full.confidence, t.plausible_confidence)
            && at_least(delta, t.plausible_delta)
        {
            (VerificationStatus::Plausible, StatusReason::PlausibleThresholds)
        } else if at_least(full.confidence, t.plausible_confidence) {
            (VerificationStatus::Suspicious, StatusReason::LowDelta)
        } else {
            (VerificationStatus::Unsupported, StatusReason::LowConfidence)
        };

        let both_unsure = scrubbed.verdict == Verdict::Unsure && full.verdict == Verdict::Unsure;
        if both_unsure && status > VerificationStatus::Plausible {
            return (VerificationStatus::Plausible, StatusReason::BothUnsureCapped);
        }

        (status, reason)
    }
}
