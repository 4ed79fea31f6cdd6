//! Named profile catalog.

use lazy_static::lazy_static;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use super::{Profile, ThresholdSet};
use crate::scrub::ScrubCategory;
use crate::trigger::TriggerPolicy;
use crate::VerifyError;

lazy_static! {
    static ref BUILTIN: ProfileRegistry = ProfileRegistry::builtin_table();
}

/// Immutable catalog of profiles keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, Profile>,
}

/// On-disk shape for custom profiles.
#[derive(Debug, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    profiles: Vec<Profile>,
}

impl ProfileRegistry {
    /// The process-wide built-in registry.
    pub fn builtin() -> &'static ProfileRegistry {
        &BUILTIN
    }

    /// Look a profile up by name.
    pub fn resolve(&self, name: &str) -> Result<&Profile, VerifyError> {
        self.profiles
            .get(name)
            .ok_or_else(|| VerifyError::UnknownProfile(name.to_string()))
    }

    /// Profile names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(|s| s.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Built-ins plus the custom profiles declared in a YAML document.
    ///
    /// A custom profile with a built-in name replaces the built-in.
    /// Two custom profiles with the same name are rejected.
    pub fn from_yaml(yaml: &str) -> Result<Self, VerifyError> {
        let file: ProfileFile = serde_yaml::from_str(yaml)?;
        let mut registry = Self::builtin().clone();
        let mut seen = HashSet::new();

        for profile in file.profiles {
            profile.validate()?;
            if !seen.insert(profile.name.clone()) {
                return Err(VerifyError::InvalidProfile(format!(
                    "profile '{}' defined twice",
                    profile.name
                )));
            }
            if registry.contains(&profile.name) {
                tracing::info!(profile = %profile.name, "Custom profile replaces built-in");
            }
            registry.profiles.insert(profile.name.clone(), profile);
        }

        Ok(registry)
    }

    /// Load custom profiles from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, VerifyError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    fn builtin_table() -> Self {
        use ScrubCategory as C;

        let table = [
            (
                "strawberry",
                "General factual claims over prose evidence",
                vec![
                    C::Secret, C::Email, C::Url, C::Uuid, C::Ip, C::Date, C::Version,
                    C::Name, C::Num,
                ],
                (0.80, 0.30, 0.60, 0.15),
                TriggerPolicy::OnMediumConfidence,
            ),
            (
                "code",
                "Claims about source code: functions, identifiers, paths",
                vec![
                    C::Secret, C::Url, C::Email, C::Uuid, C::Path, C::Version, C::Hash,
                    C::Func, C::Ident, C::Num,
                ],
                (0.85, 0.35, 0.65, 0.20),
                TriggerPolicy::OnCriticalClaim,
            ),
            (
                "documentation",
                "Claims about documentation and prose references",
                vec![C::Url, C::Email, C::Path, C::Version, C::Name, C::Num],
                (0.75, 0.25, 0.55, 0.10),
                TriggerPolicy::Manual,
            ),
            (
                "schema",
                "Claims about data schemas: tables, columns, types",
                vec![C::Secret, C::Uuid, C::Date, C::Table, C::Field, C::Ident, C::Num],
                (0.85, 0.30, 0.65, 0.15),
                TriggerPolicy::OnConflict,
            ),
            (
                "security",
                "Security claims: credentials, hosts, versions, identities",
                vec![
                    C::Secret, C::Email, C::Url, C::Uuid, C::Ip, C::Path, C::Hash,
                    C::Version, C::Date, C::Func, C::Ident, C::Name, C::Num,
                ],
                (0.90, 0.40, 0.70, 0.20),
                TriggerPolicy::Always,
            ),
        ];

        let profiles = table
            .into_iter()
            .map(|(name, description, rules, (vc, vd, pc, pd), trigger)| {
                let profile = Profile {
                    name: name.to_string(),
                    description: description.to_string(),
                    rules,
                    thresholds: ThresholdSet {
                        verified_confidence: vc,
                        verified_delta: vd,
                        plausible_confidence: pc,
                        plausible_delta: pd,
                    },
                    trigger,
                };
                (name.to_string(), profile)
            })
            .collect();

        Self { profiles }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_profiles_present() {
        let registry = ProfileRegistry::builtin();
        assert_eq!(
            registry.names(),
            vec!["code", "documentation", "schema", "security", "strawberry"]
        );
    }

    #[test]
    fn test_builtin_profiles_valid() {
        for profile in ProfileRegistry::builtin().iter() {
            assert!(profile.validate().is_ok(), "{} invalid", profile.name);
        }
    }

    #[test]
    fn test_strawberry_thresholds() {
        let profile = ProfileRegistry::builtin().resolve("strawberry").unwrap();
        assert_eq!(profile.thresholds.verified_confidence, 0.80);
        assert_eq!(profile.thresholds.verified_delta, 0.30);
        assert_eq!(profile.thresholds.plausible_confidence, 0.60);
        assert_eq!(profile.thresholds.plausible_delta, 0.15);
    }

    #[test]
    fn test_security_strictest_documentation_most_relaxed() {
        let registry = ProfileRegistry::builtin();
        let security = registry.resolve("security").unwrap().thresholds;
        let docs = registry.resolve("documentation").unwrap().thresholds;

        for profile in registry.iter() {
            let t = profile.thresholds;
            assert!(security.verified_confidence >= t.verified_confidence);
            assert!(security.verified_delta >= t.verified_delta);
            assert!(docs.verified_confidence <= t.verified_confidence);
            assert!(docs.plausible_delta <= t.plausible_delta);
        }
    }

    #[test]
    fn test_unknown_profile() {
        let result = ProfileRegistry::builtin().resolve("nope");
        assert!(matches!(result, Err(VerifyError::UnknownProfile(name)) if name == "nope"));
    }

    #[test]
    fn test_custom_profiles_from_yaml() {
        let yaml = r#"
profiles:
  - name: finance
    description: "Ledger claims"
    rules: [NUM, DATE, NAME]
    thresholds:
      verified_confidence: 0.85
      verified_delta: 0.30
      plausible_confidence: 0.60
      plausible_delta: 0.15
    trigger: on_critical_claim
"#;
        let registry = ProfileRegistry::from_yaml(yaml).unwrap();
        let finance = registry.resolve("finance").unwrap();
        assert_eq!(finance.rules, vec![ScrubCategory::Num, ScrubCategory::Date, ScrubCategory::Name]);
        assert_eq!(finance.trigger, TriggerPolicy::OnCriticalClaim);

        // Built-ins still available
        assert!(registry.contains("strawberry"));
    }

    #[test]
    fn test_custom_profile_bad_thresholds() {
        let yaml = r#"
profiles:
  - name: broken
    rules: [NUM]
    thresholds:
      verified_confidence: 0.50
      verified_delta: 0.30
      plausible_confidence: 0.60
      plausible_delta: 0.15
"#;
        let result = ProfileRegistry::from_yaml(yaml);
        assert!(matches!(result, Err(VerifyError::InvalidThresholds(_))));
    }

    #[test]
    fn test_custom_profile_unknown_category() {
        let yaml = r#"
profiles:
  - name: odd
    rules: [NUM, COLOUR]
    thresholds:
      verified_confidence: 0.8
      verified_delta: 0.3
      plausible_confidence: 0.6
      plausible_delta: 0.15
"#;
        assert!(matches!(ProfileRegistry::from_yaml(yaml), Err(VerifyError::Yaml(_))));
    }

    #[test]
    fn test_custom_profile_defined_twice() {
        let yaml = r#"
profiles:
  - name: twin
    rules: [NUM]
    thresholds: { verified_confidence: 0.8, verified_delta: 0.3, plausible_confidence: 0.6, plausible_delta: 0.15 }
  - name: twin
    rules: [DATE]
    thresholds: { verified_confidence: 0.8, verified_delta: 0.3, plausible_confidence: 0.6, plausible_delta: 0.15 }
"#;
        assert!(matches!(
            ProfileRegistry::from_yaml(yaml),
            Err(VerifyError::InvalidProfile(_))
        ));
    }
}
