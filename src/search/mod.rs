//! Search Module
//!
//! Word-level retrieval over song titles and artists.
//!
//! ## Overview
//! Text is split by the tokenizer into normalized words, and each word is fed
//! into three independent indices keyed by song id. A query is tokenized the
//! same way and answered by the union of all three lookups.
//!
//! ## Submodules
//! - **`tokenizer`**: UTF-8 aware word extraction with a multilingual stop-word filter.
//! - **`exact`**: Hash map from full word to song ids.
//! - **`prefix`**: Trie answering "starts-with" queries.
//! - **`fuzzy`**: BK-tree answering edit-distance queries, plus `levenshtein`.
//! - **`engine`**: `SearchIndex`, which keeps the three indices in lockstep and unions results.

pub mod engine;
pub mod exact;
pub mod fuzzy;
pub mod prefix;
pub mod tokenizer;
