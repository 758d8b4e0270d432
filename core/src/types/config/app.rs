use crate::types::MAX_QUERY_LENGTH;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// User-facing engine configuration, persisted as sift.toml.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl AppConfig {
    /// Loads config from a TOML file. Returns default config if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, AppConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<(), AppConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates config values and returns list of validation errors.
    /// Returns empty vec if config is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.normalizer.max_query_chars == 0 || self.normalizer.max_query_chars > MAX_QUERY_LENGTH
        {
            errors.push(format!(
                "max_query_chars must be between 1 and {MAX_QUERY_LENGTH}"
            ));
        }

        if self.normalizer.max_cell_chars == 0 {
            errors.push("max_cell_chars must be at least 1".to_string());
        }

        let fragments = &self.normalizer.numeric_fragments;
        if fragments.min_len == 0 || fragments.min_len > fragments.max_len {
            errors.push("numeric_fragments requires 1 <= min_len <= max_len".to_string());
        }

        for rule in &self.normalizer.variant_rules {
            if let Err(e) = regex::Regex::new(&rule.pattern) {
                errors.push(format!("invalid variant pattern {:?}: {e}", rule.pattern));
            }
        }

        if self.cache.max_entries == 0 {
            errors.push("cache.max_entries must be at least 1".to_string());
        }

        if self.history.max_entries == 0 {
            errors.push("history.max_entries must be at least 1".to_string());
        }

        errors
    }

    /// Returns a validated config, replacing invalid values with defaults.
    pub fn with_defaults_for_invalid(&self) -> Self {
        let defaults = Self::default();
        let normalizer = &self.normalizer;
        let fragments = &normalizer.numeric_fragments;

        Self {
            index: self.index.clone(),
            normalizer: NormalizerConfig {
                max_query_chars: if normalizer.max_query_chars == 0
                    || normalizer.max_query_chars > MAX_QUERY_LENGTH
                {
                    defaults.normalizer.max_query_chars
                } else {
                    normalizer.max_query_chars
                },
                max_cell_chars: if normalizer.max_cell_chars == 0 {
                    defaults.normalizer.max_cell_chars
                } else {
                    normalizer.max_cell_chars
                },
                numeric_fragments: if fragments.min_len == 0 || fragments.min_len > fragments.max_len
                {
                    defaults.normalizer.numeric_fragments
                } else {
                    fragments.clone()
                },
                variant_rules: normalizer
                    .variant_rules
                    .iter()
                    .filter(|rule| regex::Regex::new(&rule.pattern).is_ok())
                    .cloned()
                    .collect(),
                ..normalizer.clone()
            },
            query: self.query.clone(),
            cache: CacheConfig {
                max_entries: if self.cache.max_entries == 0 {
                    defaults.cache.max_entries
                } else {
                    self.cache.max_entries
                },
                max_age_ms: self.cache.max_age_ms,
            },
            scoring: self.scoring.clone(),
            history: HistoryConfig {
                max_entries: if self.history.max_entries == 0 {
                    defaults.history.max_entries
                } else {
                    self.history.max_entries
                },
            },
        }
    }
}

/// Which columns the index builder skips.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexConfig {
    /// A header containing any of these (case-insensitive) marks an opaque
    /// column, such as an embedded document path.
    #[serde(default = "default_opaque_column_markers")]
    pub opaque_column_markers: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            opaque_column_markers: default_opaque_column_markers(),
        }
    }
}

fn default_opaque_column_markers() -> Vec<String> {
    vec!["pdf".to_string()]
}

/// Settings for `StandardNormalizer`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Fold Cyrillic letters that look like Latin ones onto Latin.
    #[serde(default = "default_true")]
    pub fold_confusables: bool,
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
    #[serde(default = "default_max_cell_chars")]
    pub max_cell_chars: usize,
    /// Characters that keep their meaning inside identifiers.
    #[serde(default = "default_significant_chars")]
    pub significant_chars: Vec<char>,
    #[serde(default)]
    pub numeric_fragments: NumericFragmentConfig,
    #[serde(default = "default_variant_rules")]
    pub variant_rules: Vec<VariantRuleConfig>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            fold_confusables: true,
            max_query_chars: default_max_query_chars(),
            max_cell_chars: default_max_cell_chars(),
            significant_chars: default_significant_chars(),
            numeric_fragments: NumericFragmentConfig::default(),
            variant_rules: default_variant_rules(),
        }
    }
}

fn default_max_query_chars() -> usize {
    1000
}

fn default_max_cell_chars() -> usize {
    2000
}

fn default_significant_chars() -> Vec<char> {
    vec!['-', '/']
}

fn default_variant_rules() -> Vec<VariantRuleConfig> {
    vec![
        VariantRuleConfig {
            pattern: r"^(\p{L})[- ]?(\d+)$".to_string(),
            expansions: vec![
                "${1}-${2}".to_string(),
                "${1}${2}".to_string(),
                "${1} ${2}".to_string(),
            ],
        },
        VariantRuleConfig {
            pattern: r"^(\p{L})-$".to_string(),
            expansions: vec!["${1}-".to_string(), "${1}".to_string()],
        },
    ]
}

/// Digit runs indexed as extra tokens, so "95" finds "m-95".
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NumericFragmentConfig {
    #[serde(default = "default_fragment_min_len")]
    pub min_len: usize,
    #[serde(default = "default_fragment_max_len")]
    pub max_len: usize,
    #[serde(default = "default_fragment_max_per_token")]
    pub max_per_token: usize,
}

impl Default for NumericFragmentConfig {
    fn default() -> Self {
        Self {
            min_len: default_fragment_min_len(),
            max_len: default_fragment_max_len(),
            max_per_token: default_fragment_max_per_token(),
        }
    }
}

fn default_fragment_min_len() -> usize {
    2
}

fn default_fragment_max_len() -> usize {
    6
}

fn default_fragment_max_per_token() -> usize {
    3
}

/// One row of the query variant table.
///
/// When `pattern` matches the whole normalized query, each expansion is a
/// `regex` replacement template (`${1}`, `${name}`) producing one variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRuleConfig {
    pub pattern: String,
    #[serde(default)]
    pub expansions: Vec<String>,
}

/// Bounds on the contains strategy of the query engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Contains matching is only attempted for tokens up to this many chars.
    #[serde(default = "default_contains_max_token_len")]
    pub contains_max_token_len: usize,
    /// Contains matching is skipped once this many candidates are collected.
    #[serde(default = "default_contains_gate")]
    pub contains_gate: usize,
    /// The contains scan stops once candidates exceed this.
    #[serde(default = "default_contains_result_cap")]
    pub contains_result_cap: usize,
    /// The contains scan stops after this many dictionary entries once it
    /// has found anything.
    #[serde(default = "default_contains_scan_limit")]
    pub contains_scan_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            contains_max_token_len: default_contains_max_token_len(),
            contains_gate: default_contains_gate(),
            contains_result_cap: default_contains_result_cap(),
            contains_scan_limit: default_contains_scan_limit(),
        }
    }
}

fn default_contains_max_token_len() -> usize {
    3
}

fn default_contains_gate() -> usize {
    100
}

fn default_contains_result_cap() -> usize {
    1000
}

fn default_contains_scan_limit() -> usize {
    5000
}

/// Result cache bounds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_cache_max_age_ms")]
    pub max_age_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_max_entries(),
            max_age_ms: default_cache_max_age_ms(),
        }
    }
}

fn default_cache_max_entries() -> usize {
    50
}

fn default_cache_max_age_ms() -> u64 {
    30_000
}

/// Score bonuses applied on top of the per-cell match score.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_selected_column_bonus")]
    pub selected_column_bonus: u32,
    /// Header of the primary identifier column, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_column: Option<String>,
    #[serde(default = "default_primary_column_bonus")]
    pub primary_column_bonus: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            selected_column_bonus: default_selected_column_bonus(),
            primary_column: None,
            primary_column_bonus: default_primary_column_bonus(),
        }
    }
}

fn default_selected_column_bonus() -> u32 {
    200
}

fn default_primary_column_bonus() -> u32 {
    100
}

/// Search history settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_max_entries")]
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_history_max_entries(),
        }
    }
}

fn default_history_max_entries() -> usize {
    10
}

fn default_true() -> bool {
    true
}

/// Errors that can occur when loading or saving config.
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
