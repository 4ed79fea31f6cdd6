//! Evidence scrubbing.
//!
//! Rules run in profile order across every span of the run. A token claimed
//! by an earlier rule is never re-matched by a later one, and text already
//! in placeholder form is masked before any rule runs. Once a token has a
//! placeholder, its other standalone occurrences are replaced too, even
//! where no rule would have matched them. Matching repeats until nothing
//! new is found, so running the scrubber over its own output is a no-op.

use aho_corasick::AhoCorasick;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Range;

use super::patterns::{ScrubRule, PLACEHOLDER_PATTERN};
use super::placeholder::PlaceholderMap;
use super::ScrubCategory;
use crate::profile::Profile;
use crate::types::EvidenceSpan;

/// Scrubbed rendering of one evidence span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScrubbedEvidenceSpan {
    /// Id of the span this was derived from
    pub source_id: String,

    /// Position of the source span in the request
    pub source_index: usize,

    pub text: String,

    /// Number of tokens replaced in this span
    pub substitutions: usize,
}

/// Output of one scrubbing run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScrubOutcome {
    pub spans: Vec<ScrubbedEvidenceSpan>,
    pub map: PlaceholderMap,
}

impl ScrubOutcome {
    pub fn substitutions(&self) -> usize {
        self.spans.iter().map(|s| s.substitutions).sum()
    }
}

/// Replaces identifying tokens with typed placeholders.
#[derive(Debug, Clone)]
pub struct Scrubber {
    rules: Vec<ScrubRule>,
}

impl Scrubber {
    /// Scrubber using a profile's rule order.
    pub fn new(profile: &Profile) -> Self {
        Self::from_categories(&profile.rules)
    }

    pub fn from_categories(categories: &[ScrubCategory]) -> Self {
        Self {
            rules: categories.iter().map(|c| c.rule()).collect(),
        }
    }

    pub fn categories(&self) -> Vec<ScrubCategory> {
        self.rules.iter().map(|r| r.category).collect()
    }

    /// Scrub a set of spans with one fresh placeholder map.
    pub fn scrub(&self, spans: &[EvidenceSpan]) -> ScrubOutcome {
        let mut map = PlaceholderMap::new();
        let mut states: Vec<SpanState<'_>> = spans
            .iter()
            .map(|s| SpanState::new(&s.text, &mut map))
            .collect();
        let mut index: Option<TokenIndex> = None;

        loop {
            let mut changed = false;
            for rule in &self.rules {
                for state in states.iter_mut() {
                    while state.apply(rule, &mut map) {
                        changed = true;
                    }
                }
            }

            if !map.is_empty() {
                // Rebuild only when the rules assigned new tokens
                if index.as_ref().map_or(true, |i| i.len() != map.len()) {
                    index = Some(TokenIndex::build(&map));
                }
                if let Some(index) = &index {
                    for state in states.iter_mut() {
                        changed |= state.propagate(index);
                    }
                }
            }

            if !changed {
                break;
            }
        }

        let spans: Vec<ScrubbedEvidenceSpan> = spans
            .iter()
            .zip(&states)
            .enumerate()
            .map(|(index, (span, state))| ScrubbedEvidenceSpan {
                source_id: span.id.clone(),
                source_index: index,
                text: state.render(),
                substitutions: state.substitutions(),
            })
            .collect();

        tracing::debug!(
            spans = spans.len(),
            placeholders = map.len(),
            "Scrubbed evidence"
        );

        ScrubOutcome { spans, map }
    }

    /// Scrub a single piece of text on its own.
    pub fn scrub_text(&self, text: &str) -> String {
        let span = EvidenceSpan::new("text", text);
        self.scrub(std::slice::from_ref(&span))
            .spans
            .into_iter()
            .next()
            .map(|s| s.text)
            .unwrap_or_default()
    }
}

/// Every mapped token, found in a single scan of a segment.
struct TokenIndex {
    automaton: Option<AhoCorasick>,
    tokens: Vec<String>,
    placeholders: Vec<String>,
}

impl TokenIndex {
    fn build(map: &PlaceholderMap) -> Self {
        let tokens: Vec<String> = map.entries().iter().map(|e| e.token.clone()).collect();
        let placeholders = map.entries().iter().map(|e| e.placeholder.clone()).collect();

        let automaton = match AhoCorasick::new(&tokens) {
            Ok(automaton) => Some(automaton),
            Err(e) => {
                tracing::warn!(
                    tokens = tokens.len(),
                    error = %e,
                    "Token automaton unavailable, scanning tokens one at a time"
                );
                None
            }
        };

        Self {
            automaton,
            tokens,
            placeholders,
        }
    }

    fn len(&self) -> usize {
        self.tokens.len()
    }

    /// All occurrences in `text` as (entry, range), first-seen entries first.
    fn occurrences(&self, text: &str) -> Vec<(usize, Range<usize>)> {
        let mut found: Vec<(usize, Range<usize>)> = match &self.automaton {
            Some(automaton) => automaton
                .find_overlapping_iter(text)
                .map(|m| (m.pattern().as_usize(), m.range()))
                .collect(),
            None => self
                .tokens
                .iter()
                .enumerate()
                .flat_map(|(entry, token)| {
                    text.match_indices(token.as_str())
                        .map(move |(at, tok)| (entry, at..at + tok.len()))
                })
                .collect(),
        };
        found.sort_by_key(|(entry, range)| (*entry, range.start));
        found
    }
}

/// A region of span text that is no longer matchable.
#[derive(Debug)]
struct Claimed {
    end: usize,
    /// `None` for placeholders already present in the input
    replacement: Option<String>,
}

/// Per-span matching state.
struct SpanState<'a> {
    text: &'a str,
    /// Keyed by start offset; ranges never overlap
    claims: BTreeMap<usize, Claimed>,
}

impl<'a> SpanState<'a> {
    fn new(text: &'a str, map: &mut PlaceholderMap) -> Self {
        let claims = PLACEHOLDER_PATTERN
            .find_iter(text)
            .map(|m| {
                map.reserve(m.as_str());
                (
                    m.start(),
                    Claimed {
                        end: m.end(),
                        replacement: None,
                    },
                )
            })
            .collect();
        Self { text, claims }
    }

    /// Unclaimed stretches of text.
    fn gaps(&self) -> Vec<Range<usize>> {
        let mut gaps = Vec::with_capacity(self.claims.len() + 1);
        let mut cursor = 0;
        for (&start, claim) in &self.claims {
            if start > cursor {
                gaps.push(cursor..start);
            }
            cursor = claim.end;
        }
        if cursor < self.text.len() {
            gaps.push(cursor..self.text.len());
        }
        gaps
    }

    /// Only the last claim starting before `range.end` can overlap it.
    fn overlaps(&self, range: &Range<usize>) -> bool {
        self.claims
            .range(..range.end)
            .next_back()
            .is_some_and(|(_, c)| c.end > range.start)
    }

    fn claim(&mut self, range: Range<usize>, placeholder: String) {
        self.claims.insert(
            range.start,
            Claimed {
                end: range.end,
                replacement: Some(placeholder),
            },
        );
    }

    /// Run one rule over every gap. Returns whether anything was claimed.
    fn apply(&mut self, rule: &ScrubRule, map: &mut PlaceholderMap) -> bool {
        let mut claimed_any = false;

        for gap in self.gaps() {
            let segment = &self.text[gap.clone()];
            for local in rule.candidates(segment) {
                let range = (gap.start + local.start)..(gap.start + local.end);
                if self.overlaps(&range) {
                    continue;
                }

                let token = &self.text[range.clone()];
                let placeholder = map.assign(rule.category, token).to_string();
                self.claim(range, placeholder);
                claimed_any = true;
            }
        }

        claimed_any
    }

    /// Replace standalone occurrences of already-mapped tokens.
    ///
    /// Earlier map entries win where occurrences overlap. One pass claims
    /// everything claimable for the current map.
    fn propagate(&mut self, index: &TokenIndex) -> bool {
        let text = self.text;
        let mut claimed_any = false;

        for gap in self.gaps() {
            for (entry, local) in index.occurrences(&text[gap.clone()]) {
                let range = (gap.start + local.start)..(gap.start + local.end);
                if !standalone(text, &range) || self.overlaps(&range) {
                    continue;
                }
                self.claim(range, index.placeholders[entry].clone());
                claimed_any = true;
            }
        }

        claimed_any
    }

    fn render(&self) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut cursor = 0;
        for (&start, claim) in &self.claims {
            out.push_str(&self.text[cursor..start]);
            match &claim.replacement {
                Some(placeholder) => out.push_str(placeholder),
                None => out.push_str(&self.text[start..claim.end]),
            }
            cursor = claim.end;
        }
        out.push_str(&self.text[cursor..]);
        out
    }

    fn substitutions(&self) -> usize {
        self.claims
            .values()
            .filter(|c| c.replacement.is_some())
            .count()
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether `range` is not glued to neighbouring word characters.
fn standalone(text: &str, range: &Range<usize>) -> bool {
    let token = &text[range.clone()];
    let starts_word = token.chars().next().is_some_and(is_word_char);
    let ends_word = token.chars().next_back().is_some_and(is_word_char);

    let before_ok = !starts_word
        || !text[..range.start]
            .chars()
            .next_back()
            .is_some_and(is_word_char);
    let after_ok = !ends_word || !text[range.end..].chars().next().is_some_and(is_word_char);
    before_ok && after_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileRegistry;
    use proptest::prelude::*;

    fn scrubber(profile: &str) -> Scrubber {
        Scrubber::new(ProfileRegistry::builtin().resolve(profile).unwrap())
    }

    fn spans(texts: &[&str]) -> Vec<EvidenceSpan> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| EvidenceSpan::new(format!("e{}", i + 1), *t))
            .collect()
    }

    #[test]
    fn test_schema_scrub() {
        let outcome = scrubber("schema").scrub(&spans(&[
            "CREATE TABLE orders (id INT, total NUMERIC)",
            "SELECT total FROM orders WHERE id = 42",
        ]));

        assert_eq!(
            outcome.spans[0].text,
            "CREATE TABLE [TABLE_1] ([FIELD_1] INT, [FIELD_2] NUMERIC)"
        );
        assert_eq!(
            outcome.spans[1].text,
            "SELECT [FIELD_2] FROM [TABLE_1] WHERE [FIELD_1] = [NUM_1]"
        );
        assert_eq!(outcome.map.token_for("[TABLE_1]"), Some("orders"));
        assert_eq!(outcome.spans[1].source_id, "e2");
        assert_eq!(outcome.spans[1].source_index, 1);
    }

    #[test]
    fn test_rule_order_decides_overlap() {
        // URL is declared before EMAIL in the code profile; the email inside
        // the URL belongs to the URL token.
        let outcome = scrubber("code").scrub(&spans(&[
            "see https://git.example.com/u/dev@example.com/repo now",
        ]));
        assert_eq!(outcome.spans[0].text, "see [URL_1] now");
        assert_eq!(outcome.map.len(), 1);
    }

    #[test]
    fn test_repeated_tokens_share_placeholder() {
        let outcome = scrubber("strawberry").scrub(&spans(&[
            "Ada Lovelace wrote notes in 1843.",
            "In 1843 the notes by Ada Lovelace were published.",
        ]));
        assert_eq!(outcome.spans[0].text, "[NAME_1] wrote notes in [NUM_1].");
        assert_eq!(
            outcome.spans[1].text,
            "In [NUM_1] the notes by [NAME_1] were published."
        );
        assert_eq!(outcome.map.len(), 2);
    }

    #[test]
    fn test_no_matchable_tokens_passes_through() {
        let outcome = scrubber("strawberry").scrub(&spans(&["nothing identifying here"]));
        assert_eq!(outcome.spans[0].text, "nothing identifying here");
        assert_eq!(outcome.spans[0].substitutions, 0);
        assert!(outcome.map.is_empty());
    }

    #[test]
    fn test_existing_placeholders_untouched() {
        let s = scrubber("security");
        assert_eq!(s.scrub_text("host [IP_1] runs [VERSION_2]"), "host [IP_1] runs [VERSION_2]");
    }

    #[test]
    fn test_idempotent_on_mixed_evidence() {
        let s = scrubber("security");
        let once = s.scrub_text(
            "from Alice Bob Carol: token=abcdefghijklmnop1234 on 10.1.2.3, see /var/log/auth.log \
             and call verify_token() at v1.2.3 (commit 9fceb02d) on 2024-01-05",
        );
        let twice = s.scrub_text(&once);
        assert_eq!(once, twice);
        assert!(!once.contains("abcdefghijklmnop1234"));
        assert!(!once.contains("10.1.2.3"));
    }

    #[test]
    fn test_mapped_tokens_replaced_everywhere() {
        // "orders" is only matched after FROM, but every standalone
        // occurrence is hidden; "reorders" is a different word.
        let s = scrubber("schema");
        assert_eq!(
            s.scrub_text("orders grew; SELECT * FROM orders; reorders pending"),
            "[TABLE_1] grew; SELECT * FROM [TABLE_1]; reorders pending"
        );
    }

    #[test]
    fn test_fresh_placeholders_avoid_existing_ones() {
        let outcome = scrubber("strawberry").scrub(&spans(&["[NUM_1] then 55"]));
        assert_eq!(outcome.spans[0].text, "[NUM_1] then [NUM_2]");
        assert_eq!(outcome.map.token_for("[NUM_2]"), Some("55"));
        assert_eq!(outcome.spans[0].substitutions, 1);
    }

    #[test]
    fn test_large_evidence_scrubs_in_bounded_time() {
        let text: String = (0..4_000)
            .map(|i| format!("item {} costs {}.{} at node_{}\n", i, 7 * i, i % 10, i))
            .collect();
        let evidence = spans(&[text.as_str(), text.as_str()]);

        let started = std::time::Instant::now();
        let outcome = scrubber("security").scrub(&evidence);
        let elapsed = started.elapsed();

        assert!(
            elapsed < std::time::Duration::from_secs(10),
            "scrubbing {} bytes took {:?}",
            text.len() * 2,
            elapsed
        );
        assert!(outcome.map.len() >= 8_000);
        assert_eq!(outcome.spans[0].text, outcome.spans[1].text);
        assert!(!outcome.spans[0].text.contains("node_3999"));
        assert_eq!(outcome.map.restore(&outcome.spans[1].text), text);
    }

    #[test]
    fn test_restore_round_trip() {
        let evidence = spans(&["Grace Hopper joined in 1944 and left in 1966"]);
        let outcome = scrubber("strawberry").scrub(&evidence);
        assert_eq!(outcome.map.restore(&outcome.spans[0].text), evidence[0].text);
    }

    const WORDS: &[&str] = &[
        "the", "orders", "table", "from", "FROM", "join", "column", "user_id", "Alice",
        "Bob", "Smith", "in", "Paris", "42", "3.14", "1,200", "v2.0", "1.4.2", "2024-05-01",
        "10.0.0.1", "src/lib.rs", "/etc/hosts", "a@b.io", "https://x.io/a", "fn()",
        "parse_config()", "HttpClient", "retryPolicy", "MAX_SIZE", "9fceb02d", "token",
        "abcdefghijklmnop1234", "[NUM_1]", "(", ")", ",", "id", "INT", "was", "born",
    ];

    fn evidence_text() -> impl Strategy<Value = String> {
        prop::collection::vec(prop::sample::select(WORDS), 0..24).prop_map(|w| w.join(" "))
    }

    fn any_profile() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec!["strawberry", "code", "documentation", "schema", "security"])
    }

    proptest! {
        #[test]
        fn prop_scrub_is_deterministic(
            profile in any_profile(),
            texts in prop::collection::vec(evidence_text(), 1..4),
        ) {
            let evidence: Vec<EvidenceSpan> = texts
                .iter()
                .enumerate()
                .map(|(i, t)| EvidenceSpan::new(format!("e{}", i), t.clone()))
                .collect();
            let s = scrubber(profile);
            let first = s.scrub(&evidence);
            let second = s.scrub(&evidence);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_scrub_is_idempotent(
            profile in any_profile(),
            texts in prop::collection::vec(evidence_text(), 1..4),
        ) {
            let evidence: Vec<EvidenceSpan> = texts
                .iter()
                .enumerate()
                .map(|(i, t)| EvidenceSpan::new(format!("e{}", i), t.clone()))
                .collect();
            let s = scrubber(profile);
            let once = s.scrub(&evidence);

            let rescrub_input: Vec<EvidenceSpan> = once
                .spans
                .iter()
                .map(|span| EvidenceSpan::new(span.source_id.clone(), span.text.clone()))
                .collect();
            let twice = s.scrub(&rescrub_input);

            prop_assert_eq!(twice.substitutions(), 0);
            prop_assert!(twice.map.is_empty());
            for (a, b) in once.spans.iter().zip(&twice.spans) {
                prop_assert_eq!(&a.text, &b.text);
            }
        }
    }
}
