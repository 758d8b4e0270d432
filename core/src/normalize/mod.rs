//! Text normalization boundary.
//!
//! The index builder, the query engine, and the scorer all see cell and
//! query text only through a [`Normalizer`]. Every implementation must be
//! pure: deterministic, idempotent, and free of side effects, because the
//! same text is normalized at build time, at query time, and again when a
//! row is re-scored.

mod standard;
mod variants;

pub use standard::StandardNormalizer;

pub mod error {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum NormalizerError {
        #[error("Invalid variant pattern {pattern:?}: {source}")]
        InvalidPattern {
            pattern: String,
            #[source]
            source: regex::Error,
        },
    }
}

/// Canonicalizes raw text into comparable lowercase tokens.
pub trait Normalizer: Send + Sync {
    /// Normalizes a cell value.
    fn normalize(&self, text: &str) -> String;

    /// Normalizes a raw query. Defaults to [`Normalizer::normalize`].
    fn normalize_query(&self, text: &str) -> String {
        self.normalize(text)
    }

    /// Splits normalized text into tokens.
    fn tokenize<'a>(&self, normalized: &'a str) -> Vec<&'a str> {
        normalized.split_whitespace().collect()
    }

    /// Extra index-only tokens derived from one token.
    fn derived_tokens(&self, _token: &str) -> Vec<String> {
        Vec::new()
    }

    /// The flat list of variants a normalized query is searched under.
    ///
    /// The first element is the query itself.
    fn variants(&self, normalized: &str) -> Vec<String> {
        vec![normalized.to_string()]
    }

    /// Characters that carry structure inside identifiers (e.g. `-`).
    ///
    /// A contains-match for a query token holding one of these is only
    /// accepted against dictionary tokens holding it too.
    fn significant_chars(&self) -> &[char] {
        &[]
    }

    /// Fingerprint of the settings that decide [`Normalizer::index_tokens`].
    ///
    /// An index built under a different fingerprint is rebuilt. Settings
    /// that only affect queries must not feed into it.
    fn fingerprint(&self) -> u64 {
        0
    }

    /// Every token a cell contributes to the index.
    fn index_tokens(&self, cell: &str) -> Vec<String> {
        let normalized = self.normalize(cell);
        let mut tokens = Vec::new();
        for token in self.tokenize(&normalized) {
            tokens.push(token.to_string());
            tokens.extend(self.derived_tokens(token));
        }
        tokens
    }
}

#[cfg(test)]
mod tests;
