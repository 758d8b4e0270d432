pub(crate) mod config;
pub use config::{
    AppConfig, AppConfigError, CacheConfig, Config, HistoryConfig, IndexConfig, NormalizerConfig,
    NumericFragmentConfig, QueryConfig, ScoringConfig, VariantRuleConfig,
};

pub(crate) mod query;
pub use query::{MAX_QUERY_LENGTH, Query, QueryError};

pub(crate) mod row;
pub use row::{Row, RowRef, RowSet};

pub(crate) mod version;
pub use version::DataVersion;
