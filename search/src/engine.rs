//! Token matching against an index snapshot.

use sift_core::index::{IndexSnapshot, IndexStore};
use sift_core::normalize::Normalizer;
use sift_core::types::{QueryConfig, RowSet};
use std::sync::Arc;
use tracing::trace;

/// Resolves normalized queries to candidate rows.
///
/// Each query token tries exact, then prefix, then a bounded contains scan,
/// moving on only when the previous strategy matched no dictionary entry.
/// Matches from all tokens and all variants are unioned.
pub struct QueryEngine {
    config: QueryConfig,
    normalizer: Arc<dyn Normalizer>,
}

impl QueryEngine {
    pub fn new(config: QueryConfig, normalizer: Arc<dyn Normalizer>) -> Self {
        Self { config, normalizer }
    }

    /// Candidate rows for `normalized` and its variants.
    ///
    /// Returns an empty set when the store has no published index.
    pub fn search(&self, store: &IndexStore, normalized: &str) -> RowSet {
        let Some(snapshot) = store.snapshot() else {
            return RowSet::new();
        };
        let variants = self.normalizer.variants(normalized);
        self.search_variants(&snapshot, &variants)
    }

    pub fn search_variants(&self, snapshot: &IndexSnapshot, variants: &[String]) -> RowSet {
        let mut candidates = RowSet::new();

        for variant in variants {
            let significant: Vec<char> = self
                .normalizer
                .significant_chars()
                .iter()
                .copied()
                .filter(|c| variant.contains(*c))
                .collect();

            for token in self.normalizer.tokenize(variant) {
                self.match_token(snapshot, token, &significant, &mut candidates);
            }
        }

        candidates
    }

    fn match_token(
        &self,
        snapshot: &IndexSnapshot,
        token: &str,
        significant: &[char],
        candidates: &mut RowSet,
    ) {
        if let Some(postings) = snapshot.lookup_exact(token) {
            trace!(token, rows = postings.len(), "Exact match");
            candidates.extend(postings);
            return;
        }

        let mut prefix_hits = 0usize;
        for (_, postings) in snapshot.lookup_prefix(token) {
            prefix_hits += 1;
            candidates.extend(postings);
        }
        if prefix_hits > 0 {
            trace!(token, entries = prefix_hits, "Prefix match");
            return;
        }

        if token.chars().count() > self.config.contains_max_token_len
            || candidates.len() >= self.config.contains_gate
        {
            return;
        }
        self.scan_contains(snapshot, token, significant, candidates);
    }

    /// Linear dictionary scan for entries holding `token` past their start.
    fn scan_contains(
        &self,
        snapshot: &IndexSnapshot,
        token: &str,
        significant: &[char],
        candidates: &mut RowSet,
    ) {
        let mut scanned = 0usize;
        for entry in snapshot.entries() {
            scanned += 1;

            if significant.iter().all(|c| entry.token.contains(*c))
                && !entry.token.starts_with(token)
                && entry.token.contains(token)
            {
                candidates.extend(snapshot.postings(entry));
                if candidates.len() > self.config.contains_result_cap {
                    break;
                }
            }

            if scanned > self.config.contains_scan_limit && !candidates.is_empty() {
                break;
            }
        }
        trace!(token, scanned, rows = candidates.len(), "Contains scan");
    }
}
