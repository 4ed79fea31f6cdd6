//! Prompts for the LLM-backed oracle.
//!
//! The system prompt is identical for both passes. The oracle must not be
//! told which pass it is serving, or it could hedge on scrubbed evidence
//! deliberately.

use crate::oracle::{JudgmentRequest, PromptStyle};
use crate::providers::ChatMessage;

/// System prompt for the first attempt.
pub const JUDGE_SYSTEM_PROMPT: &str = r#"
You are an evidence judge. You decide whether a claim follows from the evidence you are given.

## Rules
1. Use ONLY the evidence below. Do not use anything you already know about the subject.
2. Evidence may contain placeholders such as [TABLE_1] or [NAME_2]. Each stands for one
   consistent but hidden value. Reason about them as opaque symbols; do not guess what they hide.
3. ENTAILED: the evidence supports the claim.
   CONTRADICTED: the evidence conflicts with the claim.
   UNSURE: the evidence neither supports nor contradicts the claim.
4. Confidence is how sure you are of your verdict, from 0.0 to 1.0.
   If you would need outside knowledge to decide, answer UNSURE with low confidence.

## Output Format (JSON only, no other text)
{
  "verdict": "ENTAILED" | "CONTRADICTED" | "UNSURE",
  "confidence": 0.0-1.0,
  "reasoning": "one or two sentences citing evidence tags like [E1]"
}
"#;

/// System prompt for retries after a malformed reply.
pub const SIMPLIFIED_SYSTEM_PROMPT: &str = r#"
Judge the claim using only the evidence. Reply with exactly one JSON object and nothing else:
{"verdict": "ENTAILED" or "CONTRADICTED" or "UNSURE", "confidence": number from 0 to 1, "reasoning": "short"}
"#;

/// Build the chat messages for a judgment request.
pub fn build_messages(request: &JudgmentRequest) -> Vec<ChatMessage> {
    let system = match request.style {
        PromptStyle::Standard => JUDGE_SYSTEM_PROMPT,
        PromptStyle::Simplified => SIMPLIFIED_SYSTEM_PROMPT,
    };

    let user = format!(
        "## Claim\n{}\n\n## Evidence\n{}\n",
        request.claim.text, request.evidence
    );

    vec![ChatMessage::system(system.trim()), ChatMessage::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::{Claim, PassKind};

    #[test]
    fn test_messages_carry_claim_and_evidence() {
        let request = JudgmentRequest::new(
            Claim::new("The [TABLE_1] table has 3 columns"),
            PassKind::Scrubbed,
            "[E1] CREATE TABLE [TABLE_1] (a INT, b INT, c INT)",
        );
        let messages = build_messages(&request);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("\"verdict\""));
        assert!(messages[1].content.contains("The [TABLE_1] table has 3 columns"));
        assert!(messages[1].content.contains("[E1] CREATE TABLE"));
    }

    #[test]
    fn test_passes_are_indistinguishable_in_prompt() {
        let scrubbed = JudgmentRequest::new(Claim::new("c"), PassKind::Scrubbed, "[E1] e");
        let full = JudgmentRequest::new(Claim::new("c"), PassKind::Full, "[E1] e");
        let a = build_messages(&scrubbed);
        let b = build_messages(&full);
        assert_eq!(a[0].content, b[0].content);
        assert_eq!(a[1].content, b[1].content);
    }

    #[test]
    fn test_retry_uses_simplified_prompt() {
        let mut request = JudgmentRequest::new(Claim::new("c"), PassKind::Full, "[E1] e");
        request.style = PromptStyle::Simplified;
        let messages = build_messages(&request);
        assert_eq!(messages[0].content, SIMPLIFIED_SYSTEM_PROMPT.trim());
    }
}
