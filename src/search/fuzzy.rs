//! Burkhard–Keller tree over Levenshtein distance.
//!
//! Each node stores one word and the songs indexed under it. Children are
//! keyed by their distance to the parent's word, at most one per distance.
//! Nodes are kept in an arena and linked by index.

use std::collections::BTreeSet;

/// Tolerance used by the search engine for approximate matches.
pub const DEFAULT_TOLERANCE: usize = 2;

/// Classic edit distance (insert, delete, substitute all cost 1), computed
/// over Unicode scalar values with a full dynamic-programming table.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut dp = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, cell) in dp[0].iter_mut().enumerate() {
        *cell = j;
    }

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            dp[i][j] = if a[i - 1] == b[j - 1] {
                dp[i - 1][j - 1]
            } else {
                1 + dp[i - 1][j].min(dp[i][j - 1]).min(dp[i - 1][j - 1])
            };
        }
    }

    dp[a.len()][b.len()]
}

#[derive(Debug)]
struct BkNode {
    word: String,
    song_ids: Vec<u32>,
    /// `(distance to this node's word, child node index)`
    children: Vec<(usize, usize)>,
}

impl BkNode {
    fn new(word: &str, song_id: u32) -> Self {
        Self {
            word: word.to_string(),
            song_ids: vec![song_id],
            children: Vec::new(),
        }
    }

    fn child_at(&self, distance: usize) -> Option<usize> {
        self.children
            .iter()
            .find(|(d, _)| *d == distance)
            .map(|(_, child)| *child)
    }
}

#[derive(Debug, Default)]
pub struct FuzzyIndex {
    nodes: Vec<BkNode>,
}

impl FuzzyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, word: &str, song_id: u32) {
        if word.is_empty() {
            return;
        }
        if self.nodes.is_empty() {
            self.nodes.push(BkNode::new(word, song_id));
            return;
        }

        let mut current = 0;
        loop {
            let node = &mut self.nodes[current];
            if node.word == word {
                if !node.song_ids.contains(&song_id) {
                    node.song_ids.push(song_id);
                }
                return;
            }

            let distance = levenshtein(word, &node.word);
            match node.child_at(distance) {
                Some(child) => current = child,
                None => {
                    let child = self.nodes.len();
                    self.nodes[current].children.push((distance, child));
                    self.nodes.push(BkNode::new(word, song_id));
                    return;
                }
            }
        }
    }

    /// Song ids of every word within `tolerance` edits of `query`.
    pub fn search(&self, query: &str, tolerance: usize) -> BTreeSet<u32> {
        let mut found = BTreeSet::new();
        if self.nodes.is_empty() {
            return found;
        }

        let mut stack = vec![0];
        while let Some(current) = stack.pop() {
            let node = &self.nodes[current];
            let distance = levenshtein(query, &node.word);
            if distance <= tolerance {
                found.extend(node.song_ids.iter().copied());
            }

            // Triangle inequality: only children in [d - t, d + t] can match.
            let low = distance.saturating_sub(tolerance);
            let high = distance + tolerance;
            stack.extend(
                node.children
                    .iter()
                    .filter(|(d, _)| (low..=high).contains(d))
                    .map(|(_, child)| *child),
            );
        }
        found
    }

    /// Number of distinct words in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
