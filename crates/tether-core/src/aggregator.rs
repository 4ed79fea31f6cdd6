//! Report aggregator: folds per-claim results into a recommendation.
//!
//! Policy, first match wins:
//! 1. Most claims UNSUPPORTED for lack of evidence → GATHER_MORE_EVIDENCE
//! 2. Any UNSUPPORTED → STOP
//! 3. Any SUSPICIOUS or PLAUSIBLE → PROCEED_WITH_WARNINGS
//! 4. Otherwise (all VERIFIED) → PROCEED

use chrono::Utc;

use crate::types::{Recommendation, Report, StatusCounts, VerificationResult, VerificationStatus};

/// Builds the terminal report for a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct Aggregator;

impl Aggregator {
    pub fn new() -> Self {
        Self
    }

    /// Assemble a report. Results keep the order they were given in.
    pub fn aggregate(
        &self,
        profile: &str,
        results: Vec<VerificationResult>,
        placeholders_used: usize,
    ) -> Report {
        let mut counts = StatusCounts::default();
        for result in &results {
            counts.record(result.status);
        }
        let recommendation = self.recommend(&results);

        Report {
            profile: profile.to_string(),
            results,
            recommendation,
            counts,
            placeholders_used,
            evaluated_at: Utc::now(),
        }
    }

    /// Overall recommendation for a set of results.
    pub fn recommend(&self, results: &[VerificationResult]) -> Recommendation {
        let insufficient = results
            .iter()
            .filter(|r| r.status == VerificationStatus::Unsupported && r.insufficient_evidence())
            .count();

        // Rule 1: strict majority starved of evidence
        if insufficient * 2 > results.len() {
            return Recommendation::GatherMoreEvidence;
        }

        // Rule 2
        if results.iter().any(|r| r.status == VerificationStatus::Unsupported) {
            return Recommendation::Stop;
        }

        // Rule 3
        if results.iter().any(|r| r.status != VerificationStatus::Verified) {
            return Recommendation::ProceedWithWarnings;
        }

        Recommendation::Proceed
    }
}
