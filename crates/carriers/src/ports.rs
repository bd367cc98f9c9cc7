//! Collaborator boundaries the shipping domain depends on.
//!
//! Nothing in this crate performs IO; catalogs, zone assignments and weight-range
//! persistence are reached only through these traits. In-memory and SQL implementations
//! live in the infrastructure crate.

use std::collections::HashMap;
use std::sync::Arc;

use carrierwise_core::{CarrierId, LocalizedText, ProductId, RangeId, ShopId, StorageError, ZoneId};

use crate::eligibility::CarrierSummary;
use crate::error::ShippingError;
use crate::weight_range::{NewWeightRange, Price, WeightRange};

/// Catalog product as returned by the product repository (name not yet resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: LocalizedText,
}

/// Carrier offers per product, scoped to a shop.
pub trait CarrierRepository: Send + Sync {
    /// Ordered carrier list for each requested product.
    ///
    /// A product without an entry in the returned map offers no carrier.
    fn find_carriers_by_product_ids(
        &self,
        product_ids: &[ProductId],
        shop_id: ShopId,
    ) -> Result<HashMap<ProductId, Vec<CarrierSummary>>, ShippingError>;
}

/// Product lookup, scoped to a shop.
pub trait ProductRepository: Send + Sync {
    /// Fails with [`ShippingError::ProductNotFound`] for unknown ids.
    fn get(&self, product_id: ProductId, shop_id: ShopId) -> Result<ProductRecord, ShippingError>;
}

/// Zones a carrier currently ships to.
pub trait ZoneProvider: Send + Sync {
    fn zones_for_carrier(&self, carrier_id: CarrierId) -> Result<Vec<ZoneId>, StorageError>;
}

/// Writes per-zone price rows for a weight range.
///
/// Implemented by transaction handles, so every write joins the caller's transaction.
pub trait PriceWriter {
    /// Insert one price row per zone for `range_id`.
    fn seed_zone_prices(
        &mut self,
        range_id: RangeId,
        zone_ids: &[ZoneId],
        price: Price,
    ) -> Result<(), StorageError>;

    /// Remove every price row of `range_id`.
    fn purge_range_prices(&mut self, range_id: RangeId) -> Result<(), StorageError>;
}

/// Unit of work over the weight ranges of one carrier.
///
/// The handle holds the carrier's lock from `begin` until it is committed or dropped, so
/// check-then-write sequences on the same carrier are serialized. Dropping a handle
/// without calling [`RangeTransaction::commit`] discards every staged write.
pub trait RangeTransaction: PriceWriter {
    /// The carrier this transaction is scoped to.
    fn carrier_id(&self) -> CarrierId;

    /// Ranges of the scoped carrier, including writes staged in this transaction.
    fn ranges_for_carrier(&mut self) -> Result<Vec<WeightRange>, StorageError>;

    /// Ranges of every carrier sharing the scoped carrier's reference.
    ///
    /// Without a reference this is the same as [`RangeTransaction::ranges_for_carrier`].
    fn sibling_ranges(&mut self) -> Result<Vec<WeightRange>, StorageError>;

    fn get(&mut self, range_id: RangeId) -> Result<Option<WeightRange>, StorageError>;

    fn insert(&mut self, draft: &NewWeightRange) -> Result<WeightRange, StorageError>;

    fn update(&mut self, range: &WeightRange) -> Result<(), StorageError>;

    fn delete(&mut self, range_id: RangeId) -> Result<(), StorageError>;

    /// Make every staged write visible at once.
    fn commit(self) -> Result<(), StorageError>
    where
        Self: Sized;
}

/// Transactional weight-range storage.
pub trait WeightRangeStore: Send + Sync {
    type Tx<'a>: RangeTransaction
    where
        Self: 'a;

    /// Open a transaction scoped to `carrier_id`, waiting for the carrier's lock.
    fn begin(&self, carrier_id: CarrierId) -> Result<Self::Tx<'_>, StorageError>;

    /// Committed range by id.
    fn find(&self, range_id: RangeId) -> Result<Option<WeightRange>, StorageError>;

    /// Committed ranges of one carrier, in no particular order.
    fn list(&self, carrier_id: CarrierId) -> Result<Vec<WeightRange>, StorageError>;
}

impl<S> CarrierRepository for Arc<S>
where
    S: CarrierRepository + ?Sized,
{
    fn find_carriers_by_product_ids(
        &self,
        product_ids: &[ProductId],
        shop_id: ShopId,
    ) -> Result<HashMap<ProductId, Vec<CarrierSummary>>, ShippingError> {
        (**self).find_carriers_by_product_ids(product_ids, shop_id)
    }
}

impl<S> ProductRepository for Arc<S>
where
    S: ProductRepository + ?Sized,
{
    fn get(&self, product_id: ProductId, shop_id: ShopId) -> Result<ProductRecord, ShippingError> {
        (**self).get(product_id, shop_id)
    }
}

impl<S> WeightRangeStore for Arc<S>
where
    S: WeightRangeStore + ?Sized,
{
    type Tx<'a>
        = S::Tx<'a>
    where
        Self: 'a;

    fn begin(&self, carrier_id: CarrierId) -> Result<Self::Tx<'_>, StorageError> {
        (**self).begin(carrier_id)
    }

    fn find(&self, range_id: RangeId) -> Result<Option<WeightRange>, StorageError> {
        (**self).find(range_id)
    }

    fn list(&self, carrier_id: CarrierId) -> Result<Vec<WeightRange>, StorageError> {
        (**self).list(carrier_id)
    }
}

impl<S> ZoneProvider for Arc<S>
where
    S: ZoneProvider + ?Sized,
{
    fn zones_for_carrier(&self, carrier_id: CarrierId) -> Result<Vec<ZoneId>, StorageError> {
        (**self).zones_for_carrier(carrier_id)
    }
}
