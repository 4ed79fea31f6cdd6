//! Oracle reply validation.
//!
//! A reply is accepted only if it contains a JSON object that validates
//! against `schemas/judgment.schema.json`. Code fences and prose around the
//! object are tolerated. When every attempt fails validation, a last-resort
//! pattern extraction can still salvage a verdict and a confidence from the
//! text; the result is marked so the report shows where it came from.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::OnceLock;

use tether_core::{JudgmentSource, PassResult, Verdict};

use crate::oracle::OracleError;

/// Embedded judgment schema (loaded at compile time).
const JUDGMENT_SCHEMA_JSON: &str = include_str!("../schemas/judgment.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

lazy_static! {
    static ref VERDICT_KEY: Regex = Regex::new(
        r#"(?i)\bverdict\b["']?\s*[:=]?\s*["']?(?P<v>entailed|contradicted|unsure)\b"#
    ).unwrap();

    static ref VERDICT_WORD: Regex =
        Regex::new(r"(?i)\b(?P<v>entailed|contradicted|unsure)\b").unwrap();

    static ref CONFIDENCE_KEY: Regex = Regex::new(
        r#"(?i)\bconfidence\b["']?\s*(?:[:=]|\bis\b|\bof\b)?\s*["']?(?P<num>\d+(?:\.\d+)?|\.\d+)\s*(?P<pct>%)?"#
    ).unwrap();
}

/// Note attached to salvaged results.
pub const FALLBACK_NOTE: &str = "extraction fallback used";

fn get_validator() -> Result<&'static jsonschema::Validator, OracleError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: Value = match serde_json::from_str(JUDGMENT_SCHEMA_JSON) {
            Ok(v) => v,
            Err(e) => return Err(format!("Invalid schema JSON: {}", e)),
        };

        match jsonschema::options().build(&schema_value) {
            Ok(v) => Ok(v),
            Err(e) => Err(format!("Failed to compile schema: {}", e)),
        }
    });

    match result {
        Ok(v) => Ok(v),
        Err(e) => Err(OracleError::Unavailable(e.clone())),
    }
}

#[derive(Debug, Deserialize)]
struct RawJudgment {
    verdict: Verdict,
    confidence: f64,
    reasoning: String,
}

/// Parse and validate a structured oracle reply.
pub fn parse_judgment(raw: &str) -> Result<PassResult, OracleError> {
    let value = locate_object(raw)
        .ok_or_else(|| OracleError::Malformed("no JSON object in reply".to_string()))?;

    let validator = get_validator()?;
    let errors: Vec<String> = validator
        .iter_errors(&value)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();
    if !errors.is_empty() {
        return Err(OracleError::Malformed(errors.join("; ")));
    }

    let judgment: RawJudgment =
        serde_json::from_value(value).map_err(|e| OracleError::Malformed(e.to_string()))?;

    PassResult::new(judgment.verdict, judgment.confidence, judgment.reasoning)
        .map_err(|e| OracleError::Malformed(e.to_string()))
}

/// Salvage a judgment from an unstructured reply.
///
/// Needs an unambiguous verdict and an explicit confidence; returns `None`
/// rather than guess.
pub fn extract_fallback(raw: &str) -> Option<PassResult> {
    let verdict = extract_verdict(raw)?;
    let confidence = extract_confidence(raw)?;

    PassResult::new(verdict, confidence, "extracted from unstructured reply")
        .ok()
        .map(|r| {
            r.with_source(JudgmentSource::FallbackExtraction)
                .with_note(FALLBACK_NOTE)
        })
}

fn extract_verdict(raw: &str) -> Option<Verdict> {
    if let Some(caps) = VERDICT_KEY.captures(raw) {
        return Verdict::parse(&caps["v"]);
    }

    let distinct: BTreeSet<String> = VERDICT_WORD
        .captures_iter(raw)
        .map(|c| c["v"].to_ascii_uppercase())
        .collect();

    match distinct.len() {
        1 => distinct.iter().next().and_then(|v| Verdict::parse(v)),
        _ => None,
    }
}

fn extract_confidence(raw: &str) -> Option<f64> {
    let caps = CONFIDENCE_KEY.captures(raw)?;
    let text = &caps["num"];
    let value: f64 = text.parse().ok()?;

    let value = if caps.name("pct").is_some() {
        value / 100.0
    } else if value > 1.0 && !text.contains('.') && value <= 100.0 {
        // "confidence: 85" means 85%
        value / 100.0
    } else {
        value
    };

    (0.0..=1.0).contains(&value).then_some(value)
}

/// First balanced `{...}` in `raw` that parses as a JSON object.
fn locate_object(raw: &str) -> Option<Value> {
    for (start, _) in raw.match_indices('{') {
        let Some(len) = balanced_len(&raw[start..]) else {
            continue;
        };
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&raw[start..start + len]) {
            return Some(value);
        }
    }
    None
}

/// Byte length of the brace-balanced prefix of `s`, which starts with `{`.
fn balanced_len(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let result =
            parse_judgment(r#"{"verdict": "ENTAILED", "confidence": 0.92, "reasoning": "[E1] says so"}"#)
                .unwrap();
        assert_eq!(result.verdict, Verdict::Entailed);
        assert_eq!(result.confidence, 0.92);
        assert_eq!(result.source, JudgmentSource::Oracle);
    }

    #[test]
    fn test_parse_fenced_json_with_prose() {
        let raw = "Here is my answer:\n```json\n{\"verdict\": \"UNSURE\", \"confidence\": 0.3, \"reasoning\": \"placeholders hide {the} value\"}\n```\nThanks.";
        let result = parse_judgment(raw).unwrap();
        assert_eq!(result.verdict, Verdict::Unsure);
        assert_eq!(result.reasoning, "placeholders hide {the} value");
    }

    #[test]
    fn test_schema_rejects_out_of_range_confidence() {
        let err = parse_judgment(r#"{"verdict": "ENTAILED", "confidence": 1.4, "reasoning": ""}"#)
            .unwrap_err();
        assert!(matches!(err, OracleError::Malformed(_)));
    }

    #[test]
    fn test_schema_rejects_unknown_verdict() {
        let err = parse_judgment(r#"{"verdict": "PROBABLY", "confidence": 0.5, "reasoning": ""}"#)
            .unwrap_err();
        assert!(matches!(err, OracleError::Malformed(msg) if msg.contains("verdict")));
    }

    #[test]
    fn test_schema_rejects_missing_reasoning() {
        assert!(parse_judgment(r#"{"verdict": "ENTAILED", "confidence": 0.5}"#).is_err());
    }

    #[test]
    fn test_no_json_is_malformed() {
        assert!(matches!(
            parse_judgment("Verdict: ENTAILED (confidence 0.9)"),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn test_fallback_from_prose() {
        let result = extract_fallback("Verdict: ENTAILED (confidence 0.9)").unwrap();
        assert_eq!(result.verdict, Verdict::Entailed);
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.source, JudgmentSource::FallbackExtraction);
        assert_eq!(result.note.as_deref(), Some(FALLBACK_NOTE));
    }

    #[test]
    fn test_fallback_percentages() {
        let result = extract_fallback("I'd call it contradicted. Confidence: 85%").unwrap();
        assert_eq!(result.verdict, Verdict::Contradicted);
        assert!((result.confidence - 0.85).abs() < 1e-9);

        let result = extract_fallback("verdict=unsure, confidence is 40").unwrap();
        assert_eq!(result.verdict, Verdict::Unsure);
        assert!((result.confidence - 0.40).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_ambiguous_verdict_fails() {
        assert!(extract_fallback("Either entailed or contradicted, confidence 0.5").is_none());
    }

    #[test]
    fn test_fallback_needs_confidence() {
        assert!(extract_fallback("Verdict: ENTAILED").is_none());
    }

    #[test]
    fn test_fallback_rejects_out_of_range() {
        assert!(extract_fallback("verdict: entailed, confidence 1.7").is_none());
        assert!(extract_fallback("verdict: entailed, confidence 250").is_none());
    }

    #[test]
    fn test_fallback_salvages_invalid_json() {
        let raw = r#"{"verdict": "ENTAILED", "confidence": "0.8", "reasoning": "quoted number"}"#;
        assert!(parse_judgment(raw).is_err());
        let result = extract_fallback(raw).unwrap();
        assert_eq!(result.verdict, Verdict::Entailed);
        assert_eq!(result.confidence, 0.8);
    }

    #[test]
    fn test_balanced_len_ignores_braces_in_strings() {
        assert_eq!(balanced_len(r#"{"a": "}"} tail"#), Some(10));
        assert_eq!(balanced_len("{ unclosed"), None);
    }
}
