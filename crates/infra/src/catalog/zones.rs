use std::collections::HashMap;
use std::sync::RwLock;

use carrierwise_carriers::ZoneProvider;
use carrierwise_core::{CarrierId, StorageError, ZoneId};

/// Carrier → zone assignments for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryZoneDirectory {
    zones: RwLock<HashMap<CarrierId, Vec<ZoneId>>>,
}

impl InMemoryZoneDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the zone list of a carrier (order is kept as given).
    pub fn assign(&self, carrier_id: CarrierId, zones: Vec<ZoneId>) -> Result<(), StorageError> {
        let mut map = self.zones.write().map_err(|_| StorageError::LockPoisoned)?;
        map.insert(carrier_id, zones);
        Ok(())
    }
}

impl ZoneProvider for InMemoryZoneDirectory {
    fn zones_for_carrier(&self, carrier_id: CarrierId) -> Result<Vec<ZoneId>, StorageError> {
        let map = self.zones.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(map.get(&carrier_id).cloned().unwrap_or_default())
    }
}
