//! Sift search library.
//!
//! Answers exact, prefix and bounded-contains queries over a tabular
//! dataset using the persistent index from `sift_core`.
//!
//! # Design
//!
//! - [`SearchManager`] owns the data version, the result cache, the search
//!   history and the quick-prefix context. It rebuilds the index only when
//!   the dataset fingerprint or the index settings change, or a data change
//!   was signalled.
//! - [`QueryEngine`] turns a normalized query into candidate rows; scoring
//!   and ordering happen in the manager.
//! - [`ResultCache`] is an LRU memo whose entries also expire by age and by
//!   data version.
//!
//! # Provisional results
//!
//! When a query extends the previous one, `perform_search_with` first
//! re-scores the previous result rows and reports them as a provisional
//! answer, then runs the full index search.

mod cache;
mod config;
mod engine;
pub mod error;
mod history;
mod manager;
mod metrics;
mod results;
mod scoring;

pub use cache::{CacheEntry, CacheStats, Lookup, ResultCache};
pub use config::SearchConfig;
pub use engine::QueryEngine;
pub use error::SearchError;
pub use history::SearchHistory;
pub use manager::{DataChangeNotifier, SearchManager, SearchRequest};
pub use metrics::SearchMetrics;
pub use results::{SearchResult, SearchResults};
pub use scoring::{RowScore, Scorer, match_score};
