//! # Application Errors

use thiserror::Error;
use traitsmith_core::{AddressError, CatalogError, CompositionError, PublishError, StoreError};

/// Everything a CLI command or server startup can fail with.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Composition(#[from] CompositionError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Address(#[from] AddressError),
}
