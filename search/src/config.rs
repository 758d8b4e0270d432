use sift_core::types::{AppConfig, QueryConfig};
use std::time::Duration;

/// Runtime search settings derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub query: QueryConfig,
    pub cache_capacity: usize,
    pub cache_max_age: Duration,
    pub selected_column_bonus: u32,
    /// Header of the primary identifier column.
    pub primary_column: Option<String>,
    pub primary_column_bonus: u32,
    pub history_limit: usize,
    pub opaque_column_markers: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for SearchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            query: config.query.clone(),
            cache_capacity: config.cache.max_entries,
            cache_max_age: Duration::from_millis(config.cache.max_age_ms),
            selected_column_bonus: config.scoring.selected_column_bonus,
            primary_column: config.scoring.primary_column.clone(),
            primary_column_bonus: config.scoring.primary_column_bonus,
            history_limit: config.history.max_entries,
            opaque_column_markers: config.index.opaque_column_markers.clone(),
        }
    }
}
