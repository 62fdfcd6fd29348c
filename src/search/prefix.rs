//! Arena-backed trie for "starts-with" lookups.
//!
//! Nodes live in a single `Vec` and refer to their children by index, so the
//! tree never holds references into itself. Node 0 is the root.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default)]
struct TrieNode {
    children: BTreeMap<char, usize>,
    is_end_of_word: bool,
    song_ids: Vec<u32>,
}

#[derive(Debug)]
pub struct PrefixIndex {
    nodes: Vec<TrieNode>,
}

const ROOT: usize = 0;

impl Default for PrefixIndex {
    fn default() -> Self {
        Self {
            nodes: vec![TrieNode::default()],
        }
    }
}

impl PrefixIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, word: &str, song_id: u32) {
        if word.is_empty() {
            return;
        }

        let mut node = ROOT;
        for c in word.chars().map(|c| c.to_ascii_lowercase()) {
            node = match self.nodes[node].children.get(&c) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(TrieNode::default());
                    self.nodes[node].children.insert(c, child);
                    child
                }
            };
        }

        let terminal = &mut self.nodes[node];
        terminal.is_end_of_word = true;
        if !terminal.song_ids.contains(&song_id) {
            terminal.song_ids.push(song_id);
        }
    }

    /// Song ids of every indexed word that starts with `prefix`.
    ///
    /// Returns an empty set when `prefix` is empty or no indexed word has it.
    pub fn lookup_prefix(&self, prefix: &str) -> BTreeSet<u32> {
        let mut results = BTreeSet::new();
        if prefix.is_empty() {
            return results;
        }

        let mut node = ROOT;
        for c in prefix.chars().map(|c| c.to_ascii_lowercase()) {
            match self.nodes[node].children.get(&c) {
                Some(&child) => node = child,
                None => return results,
            }
        }

        // Pre-order walk of the located subtree.
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let current = &self.nodes[current];
            if current.is_end_of_word {
                results.extend(current.song_ids.iter().copied());
            }
            stack.extend(current.children.values().rev().copied());
        }
        results
    }

    /// Total nodes including the root.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}
