//! Error taxonomy for eligibility resolution and weight-range administration.

use thiserror::Error;

use carrierwise_core::{DomainError, LanguageId, ProductId, RangeId, StorageError};

use crate::overlap::WeightBounds;
use crate::weight_range::WeightRange;

/// Result type used across the shipping domain.
pub type ShippingResult<T> = Result<T, ShippingError>;

/// Shipping domain error.
///
/// Validation variants (`InvalidRange`, `RangeOverlap`, `DuplicateRange`) are raised before
/// any write is issued. `Storage` wraps whatever the backend reported; when it happens
/// inside a mutation the whole transaction has been rolled back.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ShippingError {
    /// Caller supplied unusable input (e.g. an empty product set).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// A per-language product name has no entry for the active language.
    #[error("product {product_id} has no name for language {language_id}")]
    TranslationMissing {
        product_id: ProductId,
        language_id: LanguageId,
    },

    #[error("invalid weight range [{delimiter1}, {delimiter2}): {reason}")]
    InvalidRange {
        delimiter1: f64,
        delimiter2: f64,
        reason: &'static str,
    },

    #[error(
        "weight range [{}, {}) overlaps range {} [{}, {})",
        .requested.delimiter1(),
        .requested.delimiter2(),
        .conflicting.id(),
        .conflicting.delimiter1(),
        .conflicting.delimiter2()
    )]
    RangeOverlap {
        requested: WeightBounds,
        conflicting: WeightRange,
    },

    #[error(
        "weight range [{}, {}) already exists as range {} (carrier {})",
        .existing.delimiter1(),
        .existing.delimiter2(),
        .existing.id(),
        .existing.carrier_id()
    )]
    DuplicateRange { existing: WeightRange },

    #[error("weight range {0} not found")]
    RangeNotFound(RangeId),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ShippingError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl From<DomainError> for ShippingError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvalidId(msg) => ShippingError::InvalidArgument(msg),
        }
    }
}
