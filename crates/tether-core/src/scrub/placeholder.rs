//! Run-scoped token ↔ placeholder mapping.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use super::patterns::PLACEHOLDER_PATTERN;
use super::ScrubCategory;

/// One assigned placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceholderEntry {
    pub token: String,
    pub placeholder: String,
    pub category: ScrubCategory,
}

/// Bijective mapping from identifying tokens to typed placeholders.
///
/// Built incrementally while scrubbing one run; indices start at 1 and
/// count independently per category. Never shared between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaceholderMap {
    entries: Vec<PlaceholderEntry>,
    #[serde(skip)]
    by_token: HashMap<String, usize>,
    #[serde(skip)]
    by_placeholder: HashMap<String, usize>,
    #[serde(skip)]
    counters: BTreeMap<ScrubCategory, u32>,
    /// Placeholders already present in the input; never handed out
    #[serde(skip)]
    reserved: HashSet<String>,
}

impl PlaceholderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder for `token`, assigning the next index of `category` on
    /// first sight. A token seen before keeps its original placeholder even
    /// if a different category matches it later.
    pub fn assign(&mut self, category: ScrubCategory, token: &str) -> &str {
        let index = match self.by_token.get(token) {
            Some(&index) => index,
            None => {
                let counter = self.counters.entry(category).or_insert(0);
                let placeholder = loop {
                    *counter += 1;
                    let candidate = format!("[{}_{}]", category.label(), counter);
                    if !self.reserved.contains(&candidate) {
                        break candidate;
                    }
                };

                let index = self.entries.len();
                self.entries.push(PlaceholderEntry {
                    token: token.to_string(),
                    placeholder: placeholder.clone(),
                    category,
                });
                self.by_token.insert(token.to_string(), index);
                self.by_placeholder.insert(placeholder, index);
                index
            }
        };
        &self.entries[index].placeholder
    }

    /// Mark a placeholder found verbatim in the input as taken.
    pub fn reserve(&mut self, placeholder: &str) {
        self.reserved.insert(placeholder.to_string());
    }

    pub fn placeholder_for(&self, token: &str) -> Option<&str> {
        self.by_token
            .get(token)
            .map(|&i| self.entries[i].placeholder.as_str())
    }

    pub fn token_for(&self, placeholder: &str) -> Option<&str> {
        self.by_placeholder
            .get(placeholder)
            .map(|&i| self.entries[i].token.as_str())
    }

    /// Entries in first-seen order.
    pub fn entries(&self) -> &[PlaceholderEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of placeholders assigned for one category.
    pub fn count(&self, category: ScrubCategory) -> usize {
        self.entries
            .iter()
            .filter(|e| e.category == category)
            .count()
    }

    /// Put the original tokens back into scrubbed text.
    ///
    /// Placeholders this map did not assign are left as they are.
    pub fn restore(&self, scrubbed: &str) -> String {
        PLACEHOLDER_PATTERN
            .replace_all(scrubbed, |caps: &regex::Captures<'_>| {
                let placeholder = &caps[0];
                self.token_for(placeholder)
                    .unwrap_or(placeholder)
                    .to_string()
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_per_category() {
        let mut map = PlaceholderMap::new();
        assert_eq!(map.assign(ScrubCategory::Table, "orders"), "[TABLE_1]");
        assert_eq!(map.assign(ScrubCategory::Field, "total"), "[FIELD_1]");
        assert_eq!(map.assign(ScrubCategory::Table, "customers"), "[TABLE_2]");
        assert_eq!(map.assign(ScrubCategory::Num, "42"), "[NUM_1]");
        assert_eq!(map.count(ScrubCategory::Table), 2);
    }

    #[test]
    fn test_repeated_token_reuses_placeholder() {
        let mut map = PlaceholderMap::new();
        map.assign(ScrubCategory::Table, "orders");
        assert_eq!(map.assign(ScrubCategory::Table, "orders"), "[TABLE_1]");
        // First category wins
        assert_eq!(map.assign(ScrubCategory::Ident, "orders"), "[TABLE_1]");
        assert_eq!(map.len(), 1);
        assert_eq!(map.count(ScrubCategory::Ident), 0);
    }

    #[test]
    fn test_bijective_lookup() {
        let mut map = PlaceholderMap::new();
        map.assign(ScrubCategory::Email, "a@b.io");
        assert_eq!(map.placeholder_for("a@b.io"), Some("[EMAIL_1]"));
        assert_eq!(map.token_for("[EMAIL_1]"), Some("a@b.io"));
        assert_eq!(map.token_for("[EMAIL_2]"), None);
    }

    #[test]
    fn test_reserved_placeholders_skipped() {
        let mut map = PlaceholderMap::new();
        map.reserve("[NUM_1]");
        map.reserve("[NUM_2]");
        assert_eq!(map.assign(ScrubCategory::Num, "7"), "[NUM_3]");
        assert_eq!(map.token_for("[NUM_1]"), None);
    }

    #[test]
    fn test_restore() {
        let mut map = PlaceholderMap::new();
        map.assign(ScrubCategory::Table, "orders");
        map.assign(ScrubCategory::Num, "12");

        let restored = map.restore("[TABLE_1] has [NUM_1] rows and [NAME_9]");
        assert_eq!(restored, "orders has 12 rows and [NAME_9]");
    }
}
