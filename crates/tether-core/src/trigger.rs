//! When a claim should be sent through two-pass verification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lower bound of the "medium confidence" band.
pub const MEDIUM_CONFIDENCE_LOW: f64 = 0.4;

/// Upper bound (exclusive) of the "medium confidence" band.
pub const MEDIUM_CONFIDENCE_HIGH: f64 = 0.8;

/// Default trigger policy carried by a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolicy {
    Always,
    #[default]
    OnMediumConfidence,
    OnCriticalClaim,
    OnConflict,
    Manual,
}

impl fmt::Display for TriggerPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerPolicy::Always => "always",
            TriggerPolicy::OnMediumConfidence => "on_medium_confidence",
            TriggerPolicy::OnCriticalClaim => "on_critical_claim",
            TriggerPolicy::OnConflict => "on_conflict",
            TriggerPolicy::Manual => "manual",
        };
        write!(f, "{}", s)
    }
}

/// What the caller knows about a claim before deciding to verify it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TriggerContext {
    /// Confidence of the answer that produced the claim, if known
    pub prior_confidence: Option<f64>,

    /// Claim is critical (explicitly, or by its kind tag)
    pub critical: bool,

    /// Conflicting sources were observed
    pub conflict: bool,

    /// Verification was requested explicitly
    pub requested: bool,
}

impl TriggerContext {
    pub fn requested() -> Self {
        Self {
            requested: true,
            ..Default::default()
        }
    }
}

impl TriggerPolicy {
    /// Decide whether a claim warrants verification.
    ///
    /// An explicit request always verifies.
    pub fn should_verify(&self, ctx: &TriggerContext) -> bool {
        if ctx.requested {
            return true;
        }

        match self {
            TriggerPolicy::Always => true,
            TriggerPolicy::OnMediumConfidence => match ctx.prior_confidence {
                Some(c) => (MEDIUM_CONFIDENCE_LOW..MEDIUM_CONFIDENCE_HIGH).contains(&c),
                None => true,
            },
            TriggerPolicy::OnCriticalClaim => ctx.critical,
            TriggerPolicy::OnConflict => ctx.conflict,
            TriggerPolicy::Manual => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always() {
        assert!(TriggerPolicy::Always.should_verify(&TriggerContext::default()));
    }

    #[test]
    fn test_medium_confidence_band() {
        let policy = TriggerPolicy::OnMediumConfidence;
        let at = |c| TriggerContext {
            prior_confidence: Some(c),
            ..Default::default()
        };

        assert!(!policy.should_verify(&at(0.2)));
        assert!(policy.should_verify(&at(0.4)));
        assert!(policy.should_verify(&at(0.79)));
        assert!(!policy.should_verify(&at(0.8)));
        assert!(policy.should_verify(&TriggerContext::default()));
    }

    #[test]
    fn test_critical_and_conflict() {
        let critical = TriggerContext {
            critical: true,
            ..Default::default()
        };
        let conflict = TriggerContext {
            conflict: true,
            ..Default::default()
        };

        assert!(TriggerPolicy::OnCriticalClaim.should_verify(&critical));
        assert!(!TriggerPolicy::OnCriticalClaim.should_verify(&conflict));
        assert!(TriggerPolicy::OnConflict.should_verify(&conflict));
        assert!(!TriggerPolicy::OnConflict.should_verify(&critical));
    }

    #[test]
    fn test_manual_only_on_request() {
        assert!(!TriggerPolicy::Manual.should_verify(&TriggerContext::default()));
        assert!(TriggerPolicy::Manual.should_verify(&TriggerContext::requested()));
    }

    #[test]
    fn test_policy_serde_names() {
        let policy: TriggerPolicy = serde_yaml::from_str("on_medium_confidence").unwrap();
        assert_eq!(policy, TriggerPolicy::OnMediumConfidence);
        assert_eq!(TriggerPolicy::OnConflict.to_string(), "on_conflict");
    }
}
