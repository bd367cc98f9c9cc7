use std::collections::HashMap;
use std::sync::RwLock;

use carrierwise_carriers::{
    CarrierRepository, CarrierSummary, ProductRecord, ProductRepository, ShippingError,
};
use carrierwise_core::{LocalizedText, ProductId, ShopId, StorageError};

/// In-memory, shop-isolated product catalog with carrier offers for tests/dev.
///
/// Every entry is keyed by `(shop_id, product_id)`; a product registered in one shop is
/// unknown in every other shop.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<(ShopId, ProductId), LocalizedText>>,
    offers: RwLock<HashMap<(ShopId, ProductId), Vec<CarrierSummary>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_product(
        &self,
        shop_id: ShopId,
        product_id: ProductId,
        name: impl Into<LocalizedText>,
    ) -> Result<(), StorageError> {
        let mut products = self.products.write().map_err(|_| StorageError::LockPoisoned)?;
        products.insert((shop_id, product_id), name.into());
        Ok(())
    }

    /// Replace the ordered carrier offer of a product.
    pub fn set_carriers(
        &self,
        shop_id: ShopId,
        product_id: ProductId,
        carriers: Vec<CarrierSummary>,
    ) -> Result<(), StorageError> {
        let mut offers = self.offers.write().map_err(|_| StorageError::LockPoisoned)?;
        if carriers.is_empty() {
            offers.remove(&(shop_id, product_id));
        } else {
            offers.insert((shop_id, product_id), carriers);
        }
        Ok(())
    }
}

impl CarrierRepository for InMemoryCatalog {
    fn find_carriers_by_product_ids(
        &self,
        product_ids: &[ProductId],
        shop_id: ShopId,
    ) -> Result<HashMap<ProductId, Vec<CarrierSummary>>, ShippingError> {
        let offers = self.offers.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(product_ids
            .iter()
            .filter_map(|id| {
                offers
                    .get(&(shop_id, *id))
                    .map(|carriers| (*id, carriers.clone()))
            })
            .collect())
    }
}

impl ProductRepository for InMemoryCatalog {
    fn get(&self, product_id: ProductId, shop_id: ShopId) -> Result<ProductRecord, ShippingError> {
        let products = self.products.read().map_err(|_| StorageError::LockPoisoned)?;
        products
            .get(&(shop_id, product_id))
            .map(|name| ProductRecord {
                id: product_id,
                name: name.clone(),
            })
            .ok_or(ShippingError::ProductNotFound(product_id))
    }
}
