//! Shared data model for a verification run.
//!
//! Every value here is created fresh per run and never mutated once built.
//! Wire shapes (`VerifyRequest`, `VerifyReport`) live alongside the internal
//! types so callers can round-trip requests through YAML or JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::VerifyError;

/// An atomic factual assertion under test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claim {
    /// The assertion text
    pub text: String,

    /// Optional claim-kind tag (e.g. "schema", "security", "critical")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Claim {
    /// Create an untagged claim.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: None,
        }
    }

    /// Attach a claim-kind tag.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Whether the kind tag marks this claim as critical.
    pub fn is_critical(&self) -> bool {
        matches!(
            self.kind.as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("critical") | Some("security")
        )
    }
}

/// A unit of supporting text with a source label.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvidenceSpan {
    /// Caller-assigned identifier
    pub id: String,

    /// The evidence text
    pub text: String,

    /// Origin label (document id, file name, URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl EvidenceSpan {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Which evidence rendering a pass was run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    Scrubbed,
    Full,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassKind::Scrubbed => write!(f, "scrubbed"),
            PassKind::Full => write!(f, "full"),
        }
    }
}

/// Oracle verdict on whether the evidence entails the claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Entailed,
    Contradicted,
    Unsure,
}

impl Verdict {
    /// Parse a verdict word, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ENTAILED" => Some(Verdict::Entailed),
            "CONTRADICTED" => Some(Verdict::Contradicted),
            "UNSURE" => Some(Verdict::Unsure),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Entailed => write!(f, "ENTAILED"),
            Verdict::Contradicted => write!(f, "CONTRADICTED"),
            Verdict::Unsure => write!(f, "UNSURE"),
        }
    }
}

/// How a PassResult was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgmentSource {
    /// A validated, structured oracle reply
    Oracle,
    /// Salvaged from an unstructured reply by pattern extraction
    FallbackExtraction,
    /// Nothing usable came back; verdict forced to UNSURE at 0.0
    Degraded,
}

/// Output of one oracle call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassResult {
    pub verdict: Verdict,

    /// Confidence in [0, 1]
    pub confidence: f64,

    pub reasoning: String,

    pub source: JudgmentSource,

    /// Oracle calls spent producing this result
    pub attempts: u32,

    /// Audit note for salvaged or degraded results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl PassResult {
    /// Build an oracle-derived result, rejecting out-of-range confidence.
    pub fn new(
        verdict: Verdict,
        confidence: f64,
        reasoning: impl Into<String>,
    ) -> Result<Self, VerifyError> {
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(VerifyError::InvalidPassResult(format!(
                "confidence {} outside [0, 1]",
                confidence
            )));
        }

        Ok(Self {
            verdict,
            confidence,
            reasoning: reasoning.into(),
            source: JudgmentSource::Oracle,
            attempts: 1,
            note: None,
        })
    }

    /// The terminal FAILED outcome: UNSURE at zero confidence.
    pub fn degraded(reason: impl Into<String>, attempts: u32) -> Self {
        let reason = reason.into();
        Self {
            verdict: Verdict::Unsure,
            confidence: 0.0,
            reasoning: String::new(),
            source: JudgmentSource::Degraded,
            attempts,
            note: Some(format!("oracle judgment unavailable: {}", reason)),
        }
    }

    pub fn with_source(mut self, source: JudgmentSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn is_degraded(&self) -> bool {
        self.source == JudgmentSource::Degraded
    }
}

/// Resolved per-claim status. Ordering follows rank, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Unsupported,
    Suspicious,
    Plausible,
    Verified,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationStatus::Unsupported => write!(f, "UNSUPPORTED"),
            VerificationStatus::Suspicious => write!(f, "SUSPICIOUS"),
            VerificationStatus::Plausible => write!(f, "PLAUSIBLE"),
            VerificationStatus::Verified => write!(f, "VERIFIED"),
        }
    }
}

/// Which classifier branch produced a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusReason {
    /// A pass returned CONTRADICTED
    Contradicted,
    /// Full confidence and delta met the verified cutoffs
    VerifiedThresholds,
    /// UNSURE without evidence, ENTAILED with it
    EvidenceFlip,
    /// Full confidence and delta met the plausible cutoffs
    PlausibleThresholds,
    /// UNSURE on both passes; capped below VERIFIED
    BothUnsureCapped,
    /// Confident, but confidence barely moved with the evidence
    LowDelta,
    /// Full confidence below the plausible cutoff
    LowConfidence,
}

/// Per-claim verification outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationResult {
    pub claim: Claim,
    pub scrubbed: PassResult,
    pub full: PassResult,

    /// `full.confidence - scrubbed.confidence`
    pub delta: f64,

    pub status: VerificationStatus,
    pub reason: StatusReason,
}

impl VerificationResult {
    /// Both passes were UNSURE and both came from a real judgment.
    pub fn insufficient_evidence(&self) -> bool {
        self.scrubbed.verdict == Verdict::Unsure
            && self.full.verdict == Verdict::Unsure
            && !self.scrubbed.is_degraded()
            && !self.full.is_degraded()
    }

    /// VERIFIED although one pass never got a real judgment.
    ///
    /// A degraded scrubbed pass reads as UNSURE at 0.0, which the evidence
    /// flip branch accepts as "not known without evidence".
    pub fn verified_on_degraded_pass(&self) -> bool {
        self.status == VerificationStatus::Verified
            && (self.scrubbed.is_degraded() || self.full.is_degraded())
    }

    /// Audit annotations for passes that did not come straight from the oracle.
    pub fn annotations(&self) -> Vec<String> {
        [(PassKind::Scrubbed, &self.scrubbed), (PassKind::Full, &self.full)]
            .into_iter()
            .filter_map(|(kind, pass)| match pass.source {
                JudgmentSource::Oracle => None,
                JudgmentSource::FallbackExtraction => Some(format!(
                    "{} pass: extraction fallback used after {} attempts",
                    kind, pass.attempts
                )),
                JudgmentSource::Degraded => Some(format!(
                    "{} pass: {}",
                    kind,
                    pass.note.as_deref().unwrap_or("oracle judgment unavailable")
                )),
            })
            .collect()
    }
}

/// Overall recommendation for a verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Proceed,
    ProceedWithWarnings,
    Stop,
    GatherMoreEvidence,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::Proceed => write!(f, "PROCEED"),
            Recommendation::ProceedWithWarnings => write!(f, "PROCEED_WITH_WARNINGS"),
            Recommendation::Stop => write!(f, "STOP"),
            Recommendation::GatherMoreEvidence => write!(f, "GATHER_MORE_EVIDENCE"),
        }
    }
}

/// Per-status tallies for a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub verified: usize,
    pub plausible: usize,
    pub suspicious: usize,
    pub unsupported: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: VerificationStatus) {
        match status {
            VerificationStatus::Verified => self.verified += 1,
            VerificationStatus::Plausible => self.plausible += 1,
            VerificationStatus::Suspicious => self.suspicious += 1,
            VerificationStatus::Unsupported => self.unsupported += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.verified + self.plausible + self.suspicious + self.unsupported
    }
}

/// Terminal artifact of a verification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub profile: String,
    pub results: Vec<VerificationResult>,
    pub recommendation: Recommendation,
    pub counts: StatusCounts,

    /// Distinct identifying tokens replaced during scrubbing
    pub placeholders_used: usize,

    pub evaluated_at: DateTime<Utc>,
}

impl Report {
    /// Project into the external report shape.
    pub fn to_wire(&self) -> VerifyReport {
        VerifyReport {
            profile: self.profile.clone(),
            results: self
                .results
                .iter()
                .map(|r| WireResult {
                    claim: r.claim.text.clone(),
                    scrubbed_confidence: r.scrubbed.confidence,
                    full_confidence: r.full.confidence,
                    delta: r.delta,
                    status: r.status,
                    annotations: r.annotations(),
                })
                .collect(),
            recommendation: self.recommendation,
        }
    }
}

/// Input to a verification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub profile: String,
    pub claims: Vec<Claim>,
    pub evidence: Vec<EvidenceSpan>,
}

impl VerifyRequest {
    /// Reject requests that cannot produce a meaningful report.
    pub fn validate(&self) -> Result<(), VerifyError> {
        if self.claims.is_empty() {
            return Err(VerifyError::EmptyClaims);
        }
        if self.evidence.is_empty() {
            return Err(VerifyError::EmptyEvidence);
        }
        Ok(())
    }

    /// Parse a request from YAML (JSON is a YAML subset).
    pub fn from_yaml(yaml: &str) -> Result<Self, VerifyError> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// External report shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyReport {
    pub profile: String,
    pub results: Vec<WireResult>,
    pub recommendation: Recommendation,
}

/// One claim in the external report shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResult {
    pub claim: String,
    pub scrubbed_confidence: f64,
    pub full_confidence: f64,
    pub delta: f64,
    pub status: VerificationStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_result_rejects_out_of_range_confidence() {
        assert!(PassResult::new(Verdict::Entailed, 1.2, "").is_err());
        assert!(PassResult::new(Verdict::Entailed, -0.1, "").is_err());
        assert!(PassResult::new(Verdict::Entailed, f64::NAN, "").is_err());
        assert!(PassResult::new(Verdict::Entailed, 1.0, "").is_ok());
    }

    #[test]
    fn test_status_rank_ordering() {
        assert!(VerificationStatus::Unsupported < VerificationStatus::Suspicious);
        assert!(VerificationStatus::Suspicious < VerificationStatus::Plausible);
        assert!(VerificationStatus::Plausible < VerificationStatus::Verified);
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_string(&Recommendation::ProceedWithWarnings).unwrap();
        assert_eq!(json, "\"PROCEED_WITH_WARNINGS\"");

        let json = serde_json::to_string(&VerificationStatus::Unsupported).unwrap();
        assert_eq!(json, "\"UNSUPPORTED\"");
    }

    #[test]
    fn test_request_from_yaml() {
        let yaml = r#"
profile: strawberry
claims:
  - text: "The orders table has a total column"
    kind: schema
evidence:
  - id: "e1"
    text: "CREATE TABLE orders (id INT, total NUMERIC)"
    source: "schema.sql"
"#;
        let request = VerifyRequest::from_yaml(yaml).unwrap();
        assert_eq!(request.profile, "strawberry");
        assert_eq!(request.claims[0].kind.as_deref(), Some("schema"));
        assert_eq!(request.evidence[0].source.as_deref(), Some("schema.sql"));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_validation() {
        let request = VerifyRequest {
            profile: "strawberry".to_string(),
            claims: vec![],
            evidence: vec![EvidenceSpan::new("e1", "text")],
        };
        assert!(matches!(request.validate(), Err(VerifyError::EmptyClaims)));

        let request = VerifyRequest {
            profile: "strawberry".to_string(),
            claims: vec![Claim::new("x")],
            evidence: vec![],
        };
        assert!(matches!(request.validate(), Err(VerifyError::EmptyEvidence)));
    }

    #[test]
    fn test_degraded_annotation() {
        let ok = PassResult::new(Verdict::Entailed, 0.9, "fine").unwrap();
        let result = VerificationResult {
            claim: Claim::new("x"),
            scrubbed: PassResult::degraded("timed out after 30s", 3),
            full: ok,
            delta: 0.9,
            status: VerificationStatus::Verified,
            reason: StatusReason::VerifiedThresholds,
        };

        let notes = result.annotations();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].starts_with("scrubbed pass"));
        assert!(notes[0].contains("timed out"));
    }

    #[test]
    fn test_critical_claim_kind() {
        assert!(Claim::new("x").with_kind("Security").is_critical());
        assert!(Claim::new("x").with_kind("critical").is_critical());
        assert!(!Claim::new("x").with_kind("docs").is_critical());
        assert!(!Claim::new("x").is_critical());
    }
}
