//! Sift core: tabular row model, text normalization, and the persistent
//! inverted index (builder, on-disk format, and immutable snapshots).
//!
//! The query engine, result cache, and search orchestration live in
//! `sift_search`, which consumes this crate.

pub mod index;
pub mod normalize;
pub mod types;
