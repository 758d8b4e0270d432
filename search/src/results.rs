//! Search result types.

use sift_core::types::RowRef;

/// One matching row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub row: RowRef,
    pub match_score: u32,
    /// Header of the column that produced the score.
    pub matched_column: Option<String>,
    /// Raw cell text of that column.
    pub matched_value: Option<String>,
}

/// Outcome of one `perform_search` call, ordered by descending score.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    pub results: Vec<SearchResult>,
    pub total_count: usize,
    pub search_time_ms: u64,
    pub from_cache: bool,
    pub normalized_query: String,
    /// Quick-prefix answer that a full recompute may still refine.
    pub provisional: bool,
}

impl SearchResults {
    pub(crate) fn empty(normalized_query: String) -> Self {
        Self {
            normalized_query,
            ..Self::default()
        }
    }

    pub(crate) fn new(results: Vec<SearchResult>, normalized_query: String) -> Self {
        Self {
            total_count: results.len(),
            results,
            normalized_query,
            ..Self::default()
        }
    }

    /// Matching rows in result order.
    pub fn rows(&self) -> impl Iterator<Item = RowRef> + '_ {
        self.results.iter().map(|result| result.row)
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
