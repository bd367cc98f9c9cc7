//! `carrierwise-core`: shared building blocks for the shipping domain.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod context;
pub mod error;
pub mod id;
pub mod localized;

pub use context::RequestContext;
pub use error::{DomainError, StorageError};
pub use id::{CarrierId, CarrierReference, LanguageId, ProductId, RangeId, ShopId, ZoneId};
pub use localized::{LocalizedText, TranslationMissing};
