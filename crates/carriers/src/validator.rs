//! Weight-range administration with non-overlap enforcement.
//!
//! Every mutation runs inside one [`RangeTransaction`] scoped to the carrier:
//!
//! ```text
//! validate bounds (no IO)
//!   ↓
//! begin(carrier)            -- waits for the carrier's lock
//!   ↓
//! duplicate check           -- carrier, or every sibling sharing its reference
//!   ↓
//! overlap check             -- same carrier only, excluding the range being updated
//!   ↓
//! write range (+ zone price rows on create, price purge on delete)
//!   ↓
//! commit                    -- anything short of this rolls back
//! ```
//!
//! Two requests for the same carrier serialize on the lock; requests for different
//! carriers do not contend.

use tracing::{error, info, instrument, warn};

use carrierwise_core::{CarrierId, RangeId};

use crate::error::ShippingError;
use crate::overlap::WeightBounds;
use crate::ports::{PriceWriter, RangeTransaction, WeightRangeStore, ZoneProvider};
use crate::weight_range::{NewWeightRange, Price, WeightRange, sort_for_listing};

/// First range (in listing order) with exactly the same delimiters.
pub fn find_duplicate(
    existing: &[WeightRange],
    bounds: &WeightBounds,
    exclude: Option<RangeId>,
) -> Option<WeightRange> {
    candidates(existing, exclude).find(|r| r.bounds().same_as(bounds))
}

/// First range (in listing order) overlapping `bounds`.
pub fn find_overlap(
    existing: &[WeightRange],
    bounds: &WeightBounds,
    exclude: Option<RangeId>,
) -> Option<WeightRange> {
    candidates(existing, exclude).find(|r| bounds.overlaps(&r.bounds()))
}

fn candidates(
    existing: &[WeightRange],
    exclude: Option<RangeId>,
) -> impl Iterator<Item = WeightRange> {
    let mut sorted: Vec<WeightRange> = existing
        .iter()
        .filter(|r| Some(r.id()) != exclude)
        .copied()
        .collect();
    sort_for_listing(&mut sorted);
    sorted.into_iter()
}

/// Check `bounds` against the carrier's ranges and its siblings' ranges.
///
/// Duplicates are reported before overlaps: an exact duplicate also overlaps, and the
/// more specific error wins.
pub fn ensure_admissible(
    carrier_ranges: &[WeightRange],
    sibling_ranges: &[WeightRange],
    bounds: WeightBounds,
    exclude: Option<RangeId>,
) -> Result<(), ShippingError> {
    if let Some(existing) = find_duplicate(sibling_ranges, &bounds, exclude)
        .or_else(|| find_duplicate(carrier_ranges, &bounds, exclude))
    {
        return Err(ShippingError::DuplicateRange { existing });
    }
    if let Some(conflicting) = find_overlap(carrier_ranges, &bounds, exclude) {
        return Err(ShippingError::RangeOverlap {
            requested: bounds,
            conflicting,
        });
    }
    Ok(())
}

fn check_in_transaction<T: RangeTransaction>(
    tx: &mut T,
    bounds: WeightBounds,
    exclude: Option<RangeId>,
) -> Result<(), ShippingError> {
    let own = tx.ranges_for_carrier()?;
    let siblings = tx.sibling_ranges()?;
    ensure_admissible(&own, &siblings, bounds, exclude)
}

/// Log a failed mutation: rejected input at `warn`, storage failures at `error`.
fn report<T>(result: Result<T, ShippingError>) -> Result<T, ShippingError> {
    match &result {
        Err(err @ ShippingError::Storage(_)) => {
            error!(error = %err, "weight range mutation failed")
        }
        Err(err) => warn!(error = %err, "weight range rejected"),
        Ok(_) => {}
    }
    result
}

/// Creates, updates, deletes and lists the weight tiers of carriers.
#[derive(Debug)]
pub struct WeightRangeValidator<S, Z> {
    store: S,
    zones: Z,
}

impl<S, Z> WeightRangeValidator<S, Z> {
    pub fn new(store: S, zones: Z) -> Self {
        Self { store, zones }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, Z> WeightRangeValidator<S, Z>
where
    S: WeightRangeStore,
    Z: ZoneProvider,
{
    /// Create a range and seed one zero price row per zone of the carrier.
    ///
    /// The range row and the price rows commit together or not at all.
    #[instrument(skip(self))]
    pub fn create(
        &self,
        carrier_id: CarrierId,
        delimiter1: f64,
        delimiter2: f64,
    ) -> Result<WeightRange, ShippingError> {
        report(self.try_create(carrier_id, delimiter1, delimiter2))
    }

    /// Change the bounds of an existing range.
    ///
    /// The range itself is ignored by the duplicate and overlap checks. Zone price rows
    /// are left untouched.
    #[instrument(skip(self))]
    pub fn update(
        &self,
        range_id: RangeId,
        delimiter1: f64,
        delimiter2: f64,
    ) -> Result<WeightRange, ShippingError> {
        report(self.try_update(range_id, delimiter1, delimiter2))
    }

    /// Delete a range together with its zone price rows.
    #[instrument(skip(self))]
    pub fn delete(&self, range_id: RangeId) -> Result<WeightRange, ShippingError> {
        report(self.try_delete(range_id))
    }

    pub fn get(&self, range_id: RangeId) -> Result<WeightRange, ShippingError> {
        self.store
            .find(range_id)?
            .ok_or(ShippingError::RangeNotFound(range_id))
    }

    /// Ranges of a carrier sorted by `delimiter1`, `delimiter2`, then id.
    pub fn list(&self, carrier_id: CarrierId) -> Result<Vec<WeightRange>, ShippingError> {
        let mut ranges = self.store.list(carrier_id)?;
        sort_for_listing(&mut ranges);
        Ok(ranges)
    }

    /// The tier whose `[delimiter1, delimiter2)` contains `weight`, if any.
    pub fn tier_for_weight(
        &self,
        carrier_id: CarrierId,
        weight: f64,
    ) -> Result<Option<WeightRange>, ShippingError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ShippingError::invalid_argument(format!(
                "weight must be a finite non-negative number, got {weight}"
            )));
        }
        Ok(self
            .list(carrier_id)?
            .into_iter()
            .find(|r| r.contains_weight(weight)))
    }

    fn try_create(
        &self,
        carrier_id: CarrierId,
        delimiter1: f64,
        delimiter2: f64,
    ) -> Result<WeightRange, ShippingError> {
        let bounds = WeightBounds::new(delimiter1, delimiter2)?;

        let mut tx = self.store.begin(carrier_id)?;
        check_in_transaction(&mut tx, bounds, None)?;

        let range = tx.insert(&NewWeightRange { carrier_id, bounds })?;
        let zones = self.zones.zones_for_carrier(carrier_id)?;
        tx.seed_zone_prices(range.id(), &zones, Price::ZERO)?;
        tx.commit()?;

        info!(
            range_id = %range.id(),
            carrier_id = %carrier_id,
            zones = zones.len(),
            "weight range created"
        );
        Ok(range)
    }

    fn try_update(
        &self,
        range_id: RangeId,
        delimiter1: f64,
        delimiter2: f64,
    ) -> Result<WeightRange, ShippingError> {
        let bounds = WeightBounds::new(delimiter1, delimiter2)?;
        let carrier_id = self.carrier_of(range_id)?;

        let mut tx = self.store.begin(carrier_id)?;
        let current = locked_range(&mut tx, range_id)?;
        check_in_transaction(&mut tx, bounds, Some(range_id))?;

        let updated = current.with_bounds(bounds);
        tx.update(&updated)?;
        tx.commit()?;

        info!(range_id = %range_id, carrier_id = %carrier_id, "weight range updated");
        Ok(updated)
    }

    fn try_delete(&self, range_id: RangeId) -> Result<WeightRange, ShippingError> {
        let carrier_id = self.carrier_of(range_id)?;

        let mut tx = self.store.begin(carrier_id)?;
        let current = locked_range(&mut tx, range_id)?;
        tx.purge_range_prices(range_id)?;
        tx.delete(range_id)?;
        tx.commit()?;

        info!(range_id = %range_id, carrier_id = %carrier_id, "weight range deleted");
        Ok(current)
    }

    fn carrier_of(&self, range_id: RangeId) -> Result<CarrierId, ShippingError> {
        Ok(self.get(range_id)?.carrier_id())
    }
}

/// Re-read a range under the carrier lock; it may have been deleted or moved meanwhile.
fn locked_range<T: RangeTransaction>(
    tx: &mut T,
    range_id: RangeId,
) -> Result<WeightRange, ShippingError> {
    match tx.get(range_id)? {
        Some(range) if range.carrier_id() == tx.carrier_id() => Ok(range),
        _ => Err(ShippingError::RangeNotFound(range_id)),
    }
}
