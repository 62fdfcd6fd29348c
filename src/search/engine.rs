use super::exact::ExactIndex;
use super::fuzzy::{DEFAULT_TOLERANCE, FuzzyIndex};
use super::prefix::PrefixIndex;
use super::tokenizer::extract;
use std::collections::BTreeSet;

/// The three word indices, kept in lockstep.
///
/// Every word goes into all of them under the same song id; a query is the
/// union of exact, prefix and fuzzy matches for each of its words.
#[derive(Debug)]
pub struct SearchIndex {
    exact: ExactIndex,
    prefix: PrefixIndex,
    fuzzy: FuzzyIndex,
    tolerance: usize,
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::with_tolerance(DEFAULT_TOLERANCE)
    }
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(tolerance: usize) -> Self {
        Self {
            exact: ExactIndex::new(),
            prefix: PrefixIndex::new(),
            fuzzy: FuzzyIndex::new(),
            tolerance,
        }
    }

    pub fn insert_word(&mut self, word: &str, song_id: u32) {
        tracing::trace!("Indexing word '{}' for song {}", word, song_id);
        self.exact.insert(word, song_id);
        self.prefix.insert(word, song_id);
        self.fuzzy.insert(word, song_id);
    }

    /// Tokenizes `text` and indexes every resulting word. Returns the word count.
    pub fn insert_text(&mut self, text: &str, song_id: u32) -> usize {
        let words = extract(text);
        for word in &words {
            self.insert_word(word, song_id);
        }
        words.len()
    }

    /// Deduplicated song ids matching any word of `query`, ascending.
    ///
    /// A query that tokenizes to nothing yields an empty result.
    pub fn search(&self, query: &str) -> Vec<u32> {
        let words = extract(query);
        let mut found: BTreeSet<u32> = BTreeSet::new();

        for word in &words {
            if let Some(ids) = self.exact.lookup(word) {
                found.extend(ids.iter().copied());
            }
            found.extend(self.prefix.lookup_prefix(word));
            found.extend(self.fuzzy.search(word, self.tolerance));
        }

        tracing::debug!(
            "Search '{}' -> {} word(s), {} song(s)",
            query,
            words.len(),
            found.len()
        );
        found.into_iter().collect()
    }

    pub fn exact(&self) -> &ExactIndex {
        &self.exact
    }

    pub fn prefix(&self) -> &PrefixIndex {
        &self.prefix
    }

    pub fn fuzzy(&self) -> &FuzzyIndex {
        &self.fuzzy
    }
}
