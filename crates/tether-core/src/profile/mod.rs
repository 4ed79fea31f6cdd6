//! Verification profiles.
//!
//! A profile bundles an ordered list of scrub categories, a threshold set
//! and a default trigger policy. Profiles are plain data keyed by name;
//! the built-in table is loaded once and never mutated.

mod registry;

pub use registry::ProfileRegistry;

use serde::{Deserialize, Serialize};

use crate::scrub::ScrubCategory;
use crate::trigger::TriggerPolicy;
use crate::VerifyError;

/// Four cutoffs defining status boundaries.
///
/// Invariant: `verified_confidence >= plausible_confidence` and
/// `verified_delta >= plausible_delta`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub verified_confidence: f64,
    pub verified_delta: f64,
    pub plausible_confidence: f64,
    pub plausible_delta: f64,
}

impl ThresholdSet {
    /// Build a threshold set, enforcing the ordering invariant.
    pub fn new(
        verified_confidence: f64,
        verified_delta: f64,
        plausible_confidence: f64,
        plausible_delta: f64,
    ) -> Result<Self, VerifyError> {
        let set = Self {
            verified_confidence,
            verified_delta,
            plausible_confidence,
            plausible_delta,
        };
        set.validate()?;
        Ok(set)
    }

    /// Check ranges and ordering.
    pub fn validate(&self) -> Result<(), VerifyError> {
        let values = [
            ("verified_confidence", self.verified_confidence),
            ("verified_delta", self.verified_delta),
            ("plausible_confidence", self.plausible_confidence),
            ("plausible_delta", self.plausible_delta),
        ];
        for (name, value) in values {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(VerifyError::InvalidThresholds(format!(
                    "{} = {} is outside [0, 1]",
                    name, value
                )));
            }
        }

        if self.verified_confidence < self.plausible_confidence {
            return Err(VerifyError::InvalidThresholds(format!(
                "verified_confidence {} below plausible_confidence {}",
                self.verified_confidence, self.plausible_confidence
            )));
        }
        if self.verified_delta < self.plausible_delta {
            return Err(VerifyError::InvalidThresholds(format!(
                "verified_delta {} below plausible_delta {}",
                self.verified_delta, self.plausible_delta
            )));
        }

        Ok(())
    }
}

/// A named verification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Scrub categories in match-priority order
    pub rules: Vec<ScrubCategory>,

    pub thresholds: ThresholdSet,

    #[serde(default)]
    pub trigger: TriggerPolicy,
}

impl Profile {
    /// Validate a profile loaded from outside the built-in table.
    pub fn validate(&self) -> Result<(), VerifyError> {
        if self.name.trim().is_empty() {
            return Err(VerifyError::InvalidProfile("name must not be empty".to_string()));
        }

        if self.rules.is_empty() {
            return Err(VerifyError::InvalidProfile(format!(
                "profile '{}' declares no scrub rules",
                self.name
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for category in &self.rules {
            if !seen.insert(category) {
                return Err(VerifyError::InvalidProfile(format!(
                    "profile '{}' lists {} twice",
                    self.name,
                    category.label()
                )));
            }
        }

        self.thresholds.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_invariant() {
        assert!(ThresholdSet::new(0.8, 0.3, 0.6, 0.15).is_ok());
        assert!(ThresholdSet::new(0.5, 0.3, 0.6, 0.15).is_err());
        assert!(ThresholdSet::new(0.8, 0.1, 0.6, 0.15).is_err());
        assert!(ThresholdSet::new(1.5, 0.3, 0.6, 0.15).is_err());
    }

    #[test]
    fn test_equal_thresholds_allowed() {
        assert!(ThresholdSet::new(0.7, 0.2, 0.7, 0.2).is_ok());
    }

    #[test]
    fn test_duplicate_rule_rejected() {
        let profile = Profile {
            name: "dup".to_string(),
            description: String::new(),
            rules: vec![ScrubCategory::Num, ScrubCategory::Num],
            thresholds: ThresholdSet::new(0.8, 0.3, 0.6, 0.15).unwrap(),
            trigger: TriggerPolicy::Always,
        };
        assert!(matches!(profile.validate(), Err(VerifyError::InvalidProfile(_))));
    }
}
