//! Shipping eligibility and weight-tier pricing.
//!
//! This crate contains the business rules for carriers, implemented as deterministic
//! domain logic. Catalog lookups and persistence are reached only through the traits in
//! [`ports`].

pub mod eligibility;
pub mod error;
pub mod overlap;
pub mod ports;
pub mod validator;
pub mod weight_range;

pub use eligibility::{
    CarrierEligibilityResolver, CarrierSummary, EligibilityResult, FilteredCarrier,
    ProductSummary, compute_eligibility,
};
pub use error::{ShippingError, ShippingResult};
pub use overlap::{WeightBounds, overlaps};
pub use ports::{
    CarrierRepository, PriceWriter, ProductRecord, ProductRepository, RangeTransaction,
    WeightRangeStore, ZoneProvider,
};
pub use validator::{WeightRangeValidator, ensure_admissible, find_duplicate, find_overlap};
pub use weight_range::{NewWeightRange, Price, WeightRange, listing_order, sort_for_listing};
