//! Per-row match scoring.
//!
//! Cells are normalized and compared against every query variant:
//!
//! | match                                  | score              |
//! |----------------------------------------|--------------------|
//! | cell equals the variant                | 1000               |
//! | cell starts with the variant           | 500 + 10 x chars   |
//! | variant appears as a bounded substring | 100 + 5 x chars    |
//!
//! A bounded substring is at least two chars long with no letter or digit
//! directly before or after it.

use crate::config::SearchConfig;
use sift_core::index::is_opaque_column;
use sift_core::normalize::Normalizer;
use sift_core::types::Row;

const EXACT_SCORE: u32 = 1000;
const PREFIX_SCORE: u32 = 500;
const PREFIX_PER_CHAR: u32 = 10;
const CONTAINS_SCORE: u32 = 100;
const CONTAINS_PER_CHAR: u32 = 5;
const CONTAINS_MIN_CHARS: usize = 2;

/// Score of a cell that already went through the normalizer.
pub fn match_score(cell: &str, variant: &str) -> u32 {
    if cell.is_empty() || variant.is_empty() {
        return 0;
    }
    let chars = variant.chars().count() as u32;

    if cell == variant {
        EXACT_SCORE
    } else if cell.starts_with(variant) {
        PREFIX_SCORE.saturating_add(chars.saturating_mul(PREFIX_PER_CHAR))
    } else if contains_bounded(cell, variant) {
        CONTAINS_SCORE.saturating_add(chars.saturating_mul(CONTAINS_PER_CHAR))
    } else {
        0
    }
}

fn contains_bounded(haystack: &str, needle: &str) -> bool {
    if needle.chars().count() < CONTAINS_MIN_CHARS {
        return false;
    }

    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let index = start + pos;
        let end = index + needle.len();
        let before = haystack[..index].chars().next_back();
        let after = haystack[end..].chars().next();
        if !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        {
            return true;
        }
        start = index + haystack[index..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowScore {
    pub score: u32,
    /// Column that produced the score.
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Columns {
    /// Only this column is examined.
    Selected(usize),
    /// The requested column does not exist; nothing matches.
    Unavailable,
    All {
        opaque: Vec<bool>,
        primary: Option<usize>,
    },
}

/// Scores rows for one query against one header layout.
pub struct Scorer<'a> {
    normalizer: &'a dyn Normalizer,
    variants: &'a [String],
    columns: Columns,
    selected_bonus: u32,
    primary_bonus: u32,
}

impl<'a> Scorer<'a> {
    pub fn new(
        normalizer: &'a dyn Normalizer,
        variants: &'a [String],
        headers: &[String],
        selected_column: Option<&str>,
        config: &SearchConfig,
    ) -> Self {
        let opaque: Vec<bool> = headers
            .iter()
            .map(|header| is_opaque_column(header, &config.opaque_column_markers))
            .collect();
        let position = |name: &str| {
            headers
                .iter()
                .position(|header| header.to_lowercase() == name.to_lowercase())
        };

        let columns = match selected_column {
            Some(name) => match position(name) {
                Some(index) if !opaque[index] => Columns::Selected(index),
                _ => Columns::Unavailable,
            },
            None => Columns::All {
                primary: config.primary_column.as_deref().and_then(position),
                opaque,
            },
        };

        Self {
            normalizer,
            variants,
            columns,
            selected_bonus: config.selected_column_bonus,
            primary_bonus: config.primary_column_bonus,
        }
    }

    /// Best score of `row`, or `None` when nothing in it matches.
    pub fn score<R: Row>(&self, row: &R) -> Option<RowScore> {
        match &self.columns {
            Columns::Unavailable => None,
            Columns::Selected(column) => {
                let base = self.cell_score(row.column_value(*column)?);
                (base > 0).then(|| RowScore {
                    score: base.saturating_add(self.selected_bonus),
                    column: *column,
                })
            }
            Columns::All { opaque, primary } => {
                let mut best: Option<RowScore> = None;
                for column in 0..row.column_count() {
                    if opaque.get(column).copied().unwrap_or(false) {
                        continue;
                    }
                    let Some(cell) = row.column_value(column) else {
                        continue;
                    };
                    let base = self.cell_score(cell);
                    if base == 0 {
                        continue;
                    }

                    let bonus = if *primary == Some(column) {
                        self.primary_bonus
                    } else {
                        0
                    };
                    let score = base.saturating_add(bonus);
                    if best.is_none_or(|b| score > b.score) {
                        best = Some(RowScore { score, column });
                    }
                }
                best
            }
        }
    }

    fn cell_score(&self, cell: &str) -> u32 {
        let normalized = self.normalizer.normalize(cell);
        if normalized.is_empty() {
            return 0;
        }
        self.variants
            .iter()
            .map(|variant| match_score(&normalized, variant))
            .max()
            .unwrap_or(0)
    }
}
