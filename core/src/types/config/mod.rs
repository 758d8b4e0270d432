mod app;
mod core;

pub use app::{
    AppConfig, AppConfigError, CacheConfig, HistoryConfig, IndexConfig, NormalizerConfig,
    NumericFragmentConfig, QueryConfig, ScoringConfig, VariantRuleConfig,
};
pub use self::core::Config;
