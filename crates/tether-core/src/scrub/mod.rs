//! Evidence scrubbing with typed placeholders.
//!
//! Identifying tokens (names, numbers, identifiers, paths, secrets) are
//! replaced with placeholders like `[TABLE_1]` so an oracle cannot lean on
//! memorised facts about them. The placeholder keeps the token's category,
//! so sentence structure survives.

mod patterns;
mod placeholder;
mod scrubber;

pub use patterns::{ScrubCategory, ScrubRule, PLACEHOLDER_PATTERN};
pub use placeholder::{PlaceholderEntry, PlaceholderMap};
pub use scrubber::{ScrubOutcome, ScrubbedEvidenceSpan, Scrubber};
