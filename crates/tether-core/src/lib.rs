//! # tether-core
//!
//! Deterministic core of two-pass claim verification.
//!
//! A claim is judged twice: once against evidence with identifying tokens
//! scrubbed out, once against the full evidence. If confidence only holds
//! up when the real tokens are visible, the evidence did the work. If it is
//! just as high without them, the answer was probably recalled rather than
//! read, and the claim is flagged.
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: same profile and evidence always scrub the same way
//! 2. **No oracle calls**: judgment happens in `tether-runtime`
//! 3. **Idempotent scrubbing**: scrubbed text scrubs to itself
//! 4. **Contradiction is decisive**: any CONTRADICTED pass is UNSUPPORTED
//!
//! ## Example
//!
//! ```rust,ignore
//! use tether_core::{ProfileRegistry, Scrubber, DeltaClassifier};
//!
//! let profile = ProfileRegistry::builtin().resolve("schema")?;
//! let outcome = Scrubber::new(profile).scrub(&request.evidence);
//! // ... run both passes through an oracle ...
//! let result = DeltaClassifier::new(profile.thresholds).classify(claim, scrubbed, full);
//! ```

pub mod aggregator;
pub mod classifier;
pub mod profile;
pub mod scrub;
pub mod trigger;
pub mod types;

// Re-export main types at crate root
pub use aggregator::Aggregator;
pub use classifier::DeltaClassifier;
pub use profile::{Profile, ProfileRegistry, ThresholdSet};
pub use scrub::{
    PlaceholderEntry, PlaceholderMap, ScrubCategory, ScrubOutcome, ScrubbedEvidenceSpan, Scrubber,
};
pub use trigger::{TriggerContext, TriggerPolicy};
pub use types::{
    Claim, EvidenceSpan, JudgmentSource, PassKind, PassResult, Recommendation, Report,
    StatusCounts, StatusReason, VerificationResult, VerificationStatus, Verdict, VerifyReport,
    VerifyRequest, WireResult,
};

use thiserror::Error;

/// Errors raised by the deterministic core.
///
/// All of these are request-level: they reject a run before any oracle
/// call is made.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("Request has no claims")]
    EmptyClaims,

    #[error("Request has no evidence")]
    EmptyEvidence,

    #[error("Invalid thresholds: {0}")]
    InvalidThresholds(String),

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid pass result: {0}")]
    InvalidPassResult(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Scrub a request's evidence with the named built-in profile.
pub fn scrub(profile: &str, evidence: &[EvidenceSpan]) -> Result<ScrubOutcome, VerifyError> {
    let profile = ProfileRegistry::builtin().resolve(profile)?;
    Ok(Scrubber::new(profile).scrub(evidence))
}

/// Classify one claim's pass results under the named built-in profile.
pub fn classify(
    profile: &str,
    claim: Claim,
    scrubbed: PassResult,
    full: PassResult,
) -> Result<VerificationResult, VerifyError> {
    let profile = ProfileRegistry::builtin().resolve(profile)?;
    Ok(DeltaClassifier::new(profile.thresholds).classify(claim, scrubbed, full))
}
