use sift_core::index::error::IndexError;
use sift_core::normalize::error::NormalizerError;
use sift_core::types::AppConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Normalizer(#[from] NormalizerError),
    #[error(transparent)]
    Config(#[from] AppConfigError),
}
