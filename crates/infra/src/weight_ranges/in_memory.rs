use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{RwLock, RwLockReadGuard};
use std::time::Duration;

use tracing::debug;

use carrierwise_carriers::{
    NewWeightRange, Price, PriceWriter, RangeTransaction, WeightRange, WeightRangeStore,
};
use carrierwise_core::{CarrierId, CarrierReference, RangeId, StorageError, ZoneId};

use super::locks::{CarrierLockGuard, CarrierLocks};
use crate::config::DEFAULT_LOCK_TIMEOUT;

#[derive(Debug, Default)]
struct Committed {
    ranges: BTreeMap<RangeId, WeightRange>,
    prices: BTreeMap<(RangeId, ZoneId), Price>,
    references: HashMap<CarrierId, CarrierReference>,
}

/// In-memory weight-range store with per-carrier transactions.
///
/// Intended for tests/dev. Writes are staged inside an [`InMemoryRangeTx`] and applied in
/// one step on commit, so readers never observe a range without its price rows. Range ids
/// are drawn from a counter and are not reused after a rollback.
#[derive(Debug)]
pub struct InMemoryWeightRangeStore {
    state: RwLock<Committed>,
    locks: CarrierLocks,
    next_id: AtomicU32,
}

impl Default for InMemoryWeightRangeStore {
    fn default() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }
}

impl InMemoryWeightRangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock_timeout(timeout: Duration) -> Self {
        Self {
            state: RwLock::new(Committed::default()),
            locks: CarrierLocks::new(timeout),
            next_id: AtomicU32::new(0),
        }
    }

    /// Register the reference shared by all versions of a carrier.
    pub fn set_carrier_reference(
        &self,
        carrier_id: CarrierId,
        reference: CarrierReference,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().map_err(|_| StorageError::LockPoisoned)?;
        state.references.insert(carrier_id, reference);
        Ok(())
    }

    /// Committed price rows of a range, ordered by zone.
    pub fn zone_prices(&self, range_id: RangeId) -> Result<Vec<(ZoneId, Price)>, StorageError> {
        let state = self.read()?;
        Ok(state
            .prices
            .range((range_id, ZoneId::MIN)..)
            .take_while(|((r, _), _)| *r == range_id)
            .map(|((_, z), p)| (*z, *p))
            .collect())
    }

    /// Total number of committed price rows.
    pub fn price_row_count(&self) -> Result<usize, StorageError> {
        Ok(self.read()?.prices.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Committed>, StorageError> {
        self.state.read().map_err(|_| StorageError::LockPoisoned)
    }

    fn allocate_id(&self) -> Result<RangeId, StorageError> {
        let next = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        RangeId::new(next).map_err(|e| StorageError::backend(e.to_string()))
    }
}

impl WeightRangeStore for InMemoryWeightRangeStore {
    type Tx<'a> = InMemoryRangeTx<'a>;

    fn begin(&self, carrier_id: CarrierId) -> Result<InMemoryRangeTx<'_>, StorageError> {
        let lock = self.locks.acquire(carrier_id)?;
        Ok(InMemoryRangeTx {
            store: self,
            carrier_id,
            staged_ranges: BTreeMap::new(),
            staged_prices: BTreeMap::new(),
            purged: BTreeSet::new(),
            committed: false,
            _lock: lock,
        })
    }

    fn find(&self, range_id: RangeId) -> Result<Option<WeightRange>, StorageError> {
        Ok(self.read()?.ranges.get(&range_id).copied())
    }

    fn list(&self, carrier_id: CarrierId) -> Result<Vec<WeightRange>, StorageError> {
        Ok(self
            .read()?
            .ranges
            .values()
            .filter(|r| r.carrier_id() == carrier_id)
            .copied()
            .collect())
    }
}

/// Staged writes against an [`InMemoryWeightRangeStore`], holding one carrier's lock.
#[derive(Debug)]
pub struct InMemoryRangeTx<'a> {
    store: &'a InMemoryWeightRangeStore,
    carrier_id: CarrierId,
    /// `Some` = insert or update, `None` = delete.
    staged_ranges: BTreeMap<RangeId, Option<WeightRange>>,
    staged_prices: BTreeMap<(RangeId, ZoneId), Price>,
    purged: BTreeSet<RangeId>,
    committed: bool,
    _lock: CarrierLockGuard<'a>,
}

impl InMemoryRangeTx<'_> {
    fn visible_ranges<F>(&self, keep: F) -> Result<Vec<WeightRange>, StorageError>
    where
        F: Fn(&WeightRange) -> bool,
    {
        let state = self.store.read()?;
        let mut merged: BTreeMap<RangeId, WeightRange> = state
            .ranges
            .iter()
            .filter(|(_, r)| keep(r))
            .map(|(id, r)| (*id, *r))
            .collect();

        for (id, staged) in &self.staged_ranges {
            match staged {
                Some(range) if keep(range) => {
                    merged.insert(*id, *range);
                }
                _ => {
                    merged.remove(id);
                }
            }
        }
        Ok(merged.into_values().collect())
    }

    fn visible_range(&self, range_id: RangeId) -> Result<Option<WeightRange>, StorageError> {
        if let Some(staged) = self.staged_ranges.get(&range_id) {
            return Ok(*staged);
        }
        Ok(self.store.read()?.ranges.get(&range_id).copied())
    }

    fn has_committed_prices(&self, range_id: RangeId) -> Result<bool, StorageError> {
        if self.purged.contains(&range_id) {
            return Ok(false);
        }
        let state = self.store.read()?;
        Ok(state
            .prices
            .range((range_id, ZoneId::MIN)..)
            .next()
            .is_some_and(|((r, _), _)| *r == range_id))
    }

    fn price_row_exists(&self, range_id: RangeId, zone_id: ZoneId) -> Result<bool, StorageError> {
        if self.staged_prices.contains_key(&(range_id, zone_id)) {
            return Ok(true);
        }
        if self.purged.contains(&range_id) {
            return Ok(false);
        }
        Ok(self.store.read()?.prices.contains_key(&(range_id, zone_id)))
    }
}

impl PriceWriter for InMemoryRangeTx<'_> {
    fn seed_zone_prices(
        &mut self,
        range_id: RangeId,
        zone_ids: &[ZoneId],
        price: Price,
    ) -> Result<(), StorageError> {
        if self.visible_range(range_id)?.is_none() {
            return Err(StorageError::constraint(format!(
                "price rows reference missing range {range_id}"
            )));
        }
        for zone_id in zone_ids {
            if self.price_row_exists(range_id, *zone_id)? {
                return Err(StorageError::constraint(format!(
                    "duplicate price row for range {range_id}, zone {zone_id}"
                )));
            }
            self.staged_prices.insert((range_id, *zone_id), price);
        }
        Ok(())
    }

    fn purge_range_prices(&mut self, range_id: RangeId) -> Result<(), StorageError> {
        self.staged_prices.retain(|(r, _), _| *r != range_id);
        self.purged.insert(range_id);
        Ok(())
    }
}

impl RangeTransaction for InMemoryRangeTx<'_> {
    fn carrier_id(&self) -> CarrierId {
        self.carrier_id
    }

    fn ranges_for_carrier(&mut self) -> Result<Vec<WeightRange>, StorageError> {
        let carrier_id = self.carrier_id;
        self.visible_ranges(|r| r.carrier_id() == carrier_id)
    }

    fn sibling_ranges(&mut self) -> Result<Vec<WeightRange>, StorageError> {
        let references = self.store.read()?.references.clone();
        let Some(reference) = references.get(&self.carrier_id).copied() else {
            return self.ranges_for_carrier();
        };
        self.visible_ranges(|r| references.get(&r.carrier_id()) == Some(&reference))
    }

    fn get(&mut self, range_id: RangeId) -> Result<Option<WeightRange>, StorageError> {
        self.visible_range(range_id)
    }

    fn insert(&mut self, draft: &NewWeightRange) -> Result<WeightRange, StorageError> {
        if draft.carrier_id != self.carrier_id {
            return Err(StorageError::constraint(format!(
                "transaction for carrier {} cannot insert for carrier {}",
                self.carrier_id, draft.carrier_id
            )));
        }
        let range = WeightRange::persisted(self.store.allocate_id()?, draft);
        self.staged_ranges.insert(range.id(), Some(range));
        Ok(range)
    }

    fn update(&mut self, range: &WeightRange) -> Result<(), StorageError> {
        match self.visible_range(range.id())? {
            Some(existing)
                if existing.carrier_id() == self.carrier_id
                    && range.carrier_id() == self.carrier_id =>
            {
                self.staged_ranges.insert(range.id(), Some(*range));
                Ok(())
            }
            _ => Err(StorageError::constraint(format!(
                "range {} is not a range of carrier {}",
                range.id(),
                self.carrier_id
            ))),
        }
    }

    fn delete(&mut self, range_id: RangeId) -> Result<(), StorageError> {
        let staged_prices = self.staged_prices.keys().any(|(r, _)| *r == range_id);
        if staged_prices || self.has_committed_prices(range_id)? {
            return Err(StorageError::constraint(format!(
                "price rows still reference range {range_id}"
            )));
        }
        self.staged_ranges.insert(range_id, None);
        Ok(())
    }

    fn commit(mut self) -> Result<(), StorageError> {
        let mut state = self
            .store
            .state
            .write()
            .map_err(|_| StorageError::LockPoisoned)?;

        for range_id in &self.purged {
            state.prices.retain(|(r, _), _| r != range_id);
        }
        for (id, staged) in std::mem::take(&mut self.staged_ranges) {
            match staged {
                Some(range) => {
                    state.ranges.insert(id, range);
                }
                None => {
                    state.ranges.remove(&id);
                }
            }
        }
        state.prices.append(&mut self.staged_prices);
        drop(state);

        self.committed = true;
        Ok(())
    }
}

impl Drop for InMemoryRangeTx<'_> {
    fn drop(&mut self) {
        if !self.committed {
            debug!(carrier_id = %self.carrier_id, "weight range transaction rolled back");
        }
    }
}
