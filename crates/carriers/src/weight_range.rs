//! Weight tiers and their per-zone prices.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use carrierwise_core::{CarrierId, RangeId};

use crate::overlap::WeightBounds;

/// Price in the smallest currency unit (e.g. cents).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(u64);

impl Price {
    pub const ZERO: Price = Price(0);

    pub fn from_minor_units(units: u64) -> Self {
        Self(units)
    }

    pub fn minor_units(self) -> u64 {
        self.0
    }
}

/// A weight range that has not been persisted yet (no id assigned).
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWeightRange {
    pub carrier_id: CarrierId,
    pub bounds: WeightBounds,
}

/// A persisted weight tier of one carrier.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRange {
    id: RangeId,
    carrier_id: CarrierId,
    #[serde(flatten)]
    bounds: WeightBounds,
}

impl WeightRange {
    pub fn new(id: RangeId, carrier_id: CarrierId, bounds: WeightBounds) -> Self {
        Self {
            id,
            carrier_id,
            bounds,
        }
    }

    /// Attach a storage-assigned id to a draft.
    pub fn persisted(id: RangeId, draft: &NewWeightRange) -> Self {
        Self::new(id, draft.carrier_id, draft.bounds)
    }

    pub fn id(&self) -> RangeId {
        self.id
    }

    pub fn carrier_id(&self) -> CarrierId {
        self.carrier_id
    }

    pub fn bounds(&self) -> WeightBounds {
        self.bounds
    }

    pub fn delimiter1(&self) -> f64 {
        self.bounds.delimiter1()
    }

    pub fn delimiter2(&self) -> f64 {
        self.bounds.delimiter2()
    }

    pub fn with_bounds(&self, bounds: WeightBounds) -> Self {
        Self { bounds, ..*self }
    }

    pub fn contains_weight(&self, weight: f64) -> bool {
        self.bounds.contains(weight)
    }
}

/// Listing order: `delimiter1`, then `delimiter2`, then id.
pub fn listing_order(a: &WeightRange, b: &WeightRange) -> Ordering {
    a.delimiter1()
        .total_cmp(&b.delimiter1())
        .then_with(|| a.delimiter2().total_cmp(&b.delimiter2()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort ranges into listing order in place.
pub fn sort_for_listing(ranges: &mut [WeightRange]) {
    ranges.sort_by(listing_order);
}
