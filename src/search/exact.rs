use std::collections::HashMap;

/// Word → song ids, exact full-word lookup.
#[derive(Debug, Default)]
pub struct ExactIndex {
    entries: HashMap<String, Vec<u32>>,
}

impl ExactIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `song_id` under `word`, creating the entry on first use.
    /// A song is listed at most once per word.
    pub fn insert(&mut self, word: &str, song_id: u32) {
        if word.is_empty() {
            return;
        }
        let ids = self.entries.entry(word.to_string()).or_default();
        if !ids.contains(&song_id) {
            ids.push(song_id);
        }
    }

    pub fn lookup(&self, word: &str) -> Option<&[u32]> {
        self.entries.get(word).map(Vec::as_slice)
    }

    /// Number of distinct words indexed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
