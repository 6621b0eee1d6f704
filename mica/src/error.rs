//! Unified error type for the catalog facade

use mica_common::{Classify, ErrorCode};
use mica_config::ConfigError;
use mica_fetch::FetchError;
use mica_store::StoreError;
use mica_views::RenderError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MicaError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MicaError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl Classify for MicaError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::Config(e) => e.code(),
            Self::Store(e) => e.code(),
            Self::Fetch(e) => e.code(),
            Self::Render(e) => e.code(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Config(e) => e.details(),
            Self::Store(e) => e.details(),
            Self::Fetch(e) => e.details(),
            Self::Render(e) => e.details(),
        }
    }
}
