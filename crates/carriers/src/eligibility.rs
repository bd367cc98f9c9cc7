//! Carrier eligibility across a multi-product cart.
//!
//! A carrier is *available* when every requested product offers it. Every other carrier
//! seen on at least one product is reported as *removed*, together with the products that
//! do offer it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use carrierwise_core::{CarrierId, ProductId, RequestContext};

use crate::error::ShippingError;
use crate::ports::{CarrierRepository, ProductRepository};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierSummary {
    pub id: CarrierId,
    pub name: String,
}

/// Product with its display name already resolved for the request language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
}

/// A carrier that is not common to every product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilteredCarrier {
    pub carrier: CarrierSummary,
    /// Products that offer this carrier, in request order.
    pub excluded_for_products: Vec<ProductSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EligibilityResult {
    pub available: Vec<CarrierSummary>,
    pub removed: Vec<FilteredCarrier>,
}

impl EligibilityResult {
    pub fn available_ids(&self) -> Vec<CarrierId> {
        self.available.iter().map(|c| c.id).collect()
    }

    pub fn removed_ids(&self) -> Vec<CarrierId> {
        self.removed.iter().map(|f| f.carrier.id).collect()
    }
}

/// Compute eligibility from already-fetched data.
///
/// `offers[i]` is the ordered carrier list of `products[i]`. Both slices must have the
/// same length. Output order follows input order throughout:
///
/// - `available`: the first product's carriers that every other product also offers.
/// - `removed`: the remaining carriers in first-seen order across products, each listing
///   the products that offer it.
pub fn compute_eligibility(
    products: &[ProductSummary],
    offers: &[Vec<CarrierSummary>],
) -> EligibilityResult {
    debug_assert_eq!(products.len(), offers.len());

    let offered: Vec<HashSet<CarrierId>> = offers
        .iter()
        .map(|list| list.iter().map(|c| c.id).collect())
        .collect();

    let mut seen = HashSet::new();
    let mut union = Vec::new();
    for carrier in offers.iter().flatten() {
        if seen.insert(carrier.id) {
            union.push(carrier);
        }
    }

    let common = |id: CarrierId| offered.iter().all(|set| set.contains(&id));

    let mut available = Vec::new();
    let mut removed = Vec::new();
    for carrier in union {
        if common(carrier.id) {
            available.push(carrier.clone());
        } else {
            let excluded_for_products = products
                .iter()
                .zip(&offered)
                .filter(|(_, set)| set.contains(&carrier.id))
                .map(|(product, _)| product.clone())
                .collect();
            removed.push(FilteredCarrier {
                carrier: carrier.clone(),
                excluded_for_products,
            });
        }
    }

    EligibilityResult { available, removed }
}

/// Computes which carriers can ship a whole set of products.
///
/// Read-only: repeated calls with unchanged collaborator data return identical results.
#[derive(Debug)]
pub struct CarrierEligibilityResolver<C, P> {
    carriers: C,
    products: P,
}

impl<C, P> CarrierEligibilityResolver<C, P> {
    pub fn new(carriers: C, products: P) -> Self {
        Self { carriers, products }
    }
}

impl<C, P> CarrierEligibilityResolver<C, P>
where
    C: CarrierRepository,
    P: ProductRepository,
{
    /// Resolve available and removed carriers for `product_ids`.
    ///
    /// Duplicate ids are ignored after their first occurrence. Fails with
    /// `InvalidArgument` on empty input, and aborts with the first `ProductNotFound` or
    /// `TranslationMissing` encountered; no partial result is returned.
    #[instrument(
        skip(self, product_ids),
        fields(
            shop_id = %ctx.shop_id(),
            language_id = %ctx.language_id(),
            requested = product_ids.len()
        ),
        err(level = "warn")
    )]
    pub fn resolve(
        &self,
        product_ids: &[ProductId],
        ctx: RequestContext,
    ) -> Result<EligibilityResult, ShippingError> {
        let ids = dedup_preserving_order(product_ids);
        if ids.is_empty() {
            return Err(ShippingError::invalid_argument(
                "at least one product id is required",
            ));
        }

        let products = ids
            .iter()
            .map(|&id| self.product_summary(id, ctx))
            .collect::<Result<Vec<_>, _>>()?;

        let mut by_product = self
            .carriers
            .find_carriers_by_product_ids(&ids, ctx.shop_id())?;

        let offers: Vec<Vec<CarrierSummary>> = ids
            .iter()
            .map(|id| dedup_carriers(by_product.remove(id).unwrap_or_default()))
            .collect();

        let result = compute_eligibility(&products, &offers);
        debug!(
            products = products.len(),
            available = result.available.len(),
            removed = result.removed.len(),
            "carrier eligibility resolved"
        );
        Ok(result)
    }

    fn product_summary(
        &self,
        product_id: ProductId,
        ctx: RequestContext,
    ) -> Result<ProductSummary, ShippingError> {
        let record = self.products.get(product_id, ctx.shop_id())?;
        let name = record
            .name
            .resolve(ctx.language_id())
            .map_err(|missing| ShippingError::TranslationMissing {
                product_id,
                language_id: missing.language_id,
            })?;
        Ok(ProductSummary {
            id: record.id,
            name: name.to_string(),
        })
    }
}

fn dedup_preserving_order(ids: &[ProductId]) -> Vec<ProductId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn dedup_carriers(carriers: Vec<CarrierSummary>) -> Vec<CarrierSummary> {
    let mut seen = HashSet::with_capacity(carriers.len());
    carriers.into_iter().filter(|c| seen.insert(c.id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use carrierwise_core::{LanguageId, LocalizedText, ShopId};

    use crate::ports::ProductRecord;

    #[derive(Default)]
    struct FakeCatalog {
        offers: HashMap<ProductId, Vec<CarrierSummary>>,
        names: HashMap<ProductId, LocalizedText>,
    }

    impl FakeCatalog {
        fn product(mut self, id: u32, name: LocalizedText, carriers: &[u32]) -> Self {
            let pid = pid(id);
            self.names.insert(pid, name);
            if !carriers.is_empty() {
                self.offers
                    .insert(pid, carriers.iter().map(|&c| carrier(c)).collect());
            }
            self
        }
    }

    impl CarrierRepository for FakeCatalog {
        fn find_carriers_by_product_ids(
            &self,
            product_ids: &[ProductId],
            _shop_id: ShopId,
        ) -> Result<HashMap<ProductId, Vec<CarrierSummary>>, ShippingError> {
            Ok(product_ids
                .iter()
                .filter_map(|id| self.offers.get(id).map(|list| (*id, list.clone())))
                .collect())
        }
    }

    impl ProductRepository for FakeCatalog {
        fn get(
            &self,
            product_id: ProductId,
            _shop_id: ShopId,
        ) -> Result<ProductRecord, ShippingError> {
            self.names
                .get(&product_id)
                .map(|name| ProductRecord {
                    id: product_id,
                    name: name.clone(),
                })
                .ok_or(ShippingError::ProductNotFound(product_id))
        }
    }

    fn pid(id: u32) -> ProductId {
        ProductId::new(id).unwrap()
    }

    fn cid(id: u32) -> CarrierId {
        CarrierId::new(id).unwrap()
    }

    fn lang(id: u32) -> LanguageId {
        LanguageId::new(id).unwrap()
    }

    fn carrier(id: u32) -> CarrierSummary {
        CarrierSummary {
            id: cid(id),
            name: format!("Carrier {id}"),
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new(ShopId::new(1).unwrap(), lang(1))
    }

    type SharedCatalog = std::sync::Arc<FakeCatalog>;

    fn resolver(catalog: FakeCatalog) -> CarrierEligibilityResolver<SharedCatalog, SharedCatalog> {
        let shared = std::sync::Arc::new(catalog);
        CarrierEligibilityResolver::new(shared.clone(), shared)
    }

    fn ids(raw: &[u32]) -> Vec<CarrierId> {
        raw.iter().map(|&c| cid(c)).collect()
    }

    #[test]
    fn single_product_keeps_its_own_carriers() {
        let r = resolver(FakeCatalog::default().product(1, "Mug".into(), &[3, 1, 2]));
        let result = r.resolve(&[pid(1)], ctx()).unwrap();
        assert_eq!(result.available_ids(), ids(&[3, 1, 2]));
        assert!(result.removed.is_empty());
    }

    #[test]
    fn two_products_intersect_and_explain_removals() {
        let r = resolver(
            FakeCatalog::default()
                .product(1, "A".into(), &[1, 2, 3])
                .product(2, "B".into(), &[2, 3, 4]),
        );
        let result = r.resolve(&[pid(1), pid(2)], ctx()).unwrap();

        assert_eq!(result.available_ids(), ids(&[2, 3]));
        assert_eq!(result.removed.len(), 2);
        assert_eq!(result.removed[0].carrier.id, cid(1));
        assert_eq!(
            result.removed[0].excluded_for_products,
            vec![ProductSummary { id: pid(1), name: "A".into() }]
        );
        assert_eq!(result.removed[1].carrier.id, cid(4));
        assert_eq!(
            result.removed[1].excluded_for_products,
            vec![ProductSummary { id: pid(2), name: "B".into() }]
        );
    }

    #[test]
    fn available_follows_first_product_order() {
        let r = resolver(
            FakeCatalog::default()
                .product(1, "A".into(), &[5, 2, 9])
                .product(2, "B".into(), &[9, 5, 2]),
        );
        let result = r.resolve(&[pid(1), pid(2)], ctx()).unwrap();
        assert_eq!(result.available_ids(), ids(&[5, 2, 9]));
    }

    #[test]
    fn removed_lists_every_offering_product() {
        let r = resolver(
            FakeCatalog::default()
                .product(1, "A".into(), &[1, 7])
                .product(2, "B".into(), &[1])
                .product(3, "C".into(), &[1, 7]),
        );
        let result = r.resolve(&[pid(1), pid(2), pid(3)], ctx()).unwrap();
        assert_eq!(result.available_ids(), ids(&[1]));
        let offering: Vec<ProductId> = result.removed[0]
            .excluded_for_products
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(offering, vec![pid(1), pid(3)]);
    }

    #[test]
    fn product_without_carriers_empties_available() {
        let r = resolver(
            FakeCatalog::default()
                .product(1, "A".into(), &[1, 2])
                .product(2, "B".into(), &[]),
        );
        let result = r.resolve(&[pid(1), pid(2)], ctx()).unwrap();
        assert!(result.available.is_empty());
        assert_eq!(result.removed_ids(), ids(&[1, 2]));
    }

    #[test]
    fn duplicate_product_ids_are_ignored() {
        let r = resolver(
            FakeCatalog::default()
                .product(1, "A".into(), &[1, 2])
                .product(2, "B".into(), &[2]),
        );
        let once = r.resolve(&[pid(1), pid(2)], ctx()).unwrap();
        let twice = r.resolve(&[pid(1), pid(2), pid(1)], ctx()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_input_is_rejected() {
        let r = resolver(FakeCatalog::default());
        let err = r.resolve(&[], ctx()).unwrap_err();
        assert!(matches!(err, ShippingError::InvalidArgument(_)));
    }

    #[test]
    fn unknown_product_propagates_not_found() {
        let r = resolver(FakeCatalog::default().product(1, "A".into(), &[1]));
        let err = r.resolve(&[pid(1), pid(42)], ctx()).unwrap_err();
        assert_eq!(err, ShippingError::ProductNotFound(pid(42)));
    }

    #[test]
    fn per_language_name_is_resolved() {
        let name = LocalizedText::per_language([(lang(1), "Mug"), (lang(2), "Tasse")]);
        let r = resolver(
            FakeCatalog::default()
                .product(1, name, &[1])
                .product(2, "Plate".into(), &[2]),
        );
        let german = RequestContext::new(ShopId::new(1).unwrap(), lang(2));
        let result = r.resolve(&[pid(1), pid(2)], german).unwrap();
        assert_eq!(result.removed[0].excluded_for_products[0].name, "Tasse");
    }

    #[test]
    fn missing_translation_aborts_whole_call() {
        let name = LocalizedText::per_language([(lang(2), "Tasse")]);
        let r = resolver(
            FakeCatalog::default()
                .product(1, "Plate".into(), &[1])
                .product(2, name, &[1]),
        );
        let err = r.resolve(&[pid(1), pid(2)], ctx()).unwrap_err();
        assert_eq!(
            err,
            ShippingError::TranslationMissing {
                product_id: pid(2),
                language_id: lang(1),
            }
        );
    }

    #[test]
    fn repeated_calls_are_byte_identical() {
        let r = resolver(
            FakeCatalog::default()
                .product(1, "A".into(), &[4, 1, 2, 3])
                .product(2, "B".into(), &[2, 3, 4, 8])
                .product(3, "C".into(), &[3, 9, 2]),
        );
        let input = [pid(3), pid(1), pid(2)];
        let first = serde_json::to_vec(&r.resolve(&input, ctx()).unwrap()).unwrap();
        for _ in 0..10 {
            let again = serde_json::to_vec(&r.resolve(&input, ctx()).unwrap()).unwrap();
            assert_eq!(first, again);
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;
        use std::collections::BTreeSet;

        fn cart() -> impl Strategy<Value = Vec<Vec<u32>>> {
            prop::collection::vec(
                prop::collection::btree_set(1u32..12, 0..8).prop_map(|s| s.into_iter().collect()),
                1..6,
            )
        }

        fn summaries(cart: &[Vec<u32>]) -> (Vec<ProductSummary>, Vec<Vec<CarrierSummary>>) {
            let products = (1..=cart.len() as u32)
                .map(|i| ProductSummary { id: pid(i), name: format!("P{i}") })
                .collect();
            let offers = cart
                .iter()
                .map(|list| list.iter().map(|&c| carrier(c)).collect())
                .collect();
            (products, offers)
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            #[test]
            fn available_is_the_intersection(cart in cart()) {
                let (products, offers) = summaries(&cart);
                let result = compute_eligibility(&products, &offers);

                let sets: Vec<BTreeSet<u32>> =
                    cart.iter().map(|l| l.iter().copied().collect()).collect();
                let mut expected = sets[0].clone();
                for s in &sets[1..] {
                    expected = expected.intersection(s).copied().collect();
                }
                let got: BTreeSet<u32> = result.available.iter().map(|c| c.id.get()).collect();
                prop_assert_eq!(got, expected);
            }

            #[test]
            fn removed_is_union_minus_available(cart in cart()) {
                let (products, offers) = summaries(&cart);
                let result = compute_eligibility(&products, &offers);

                let union: BTreeSet<u32> = cart.iter().flatten().copied().collect();
                let available: BTreeSet<u32> =
                    result.available.iter().map(|c| c.id.get()).collect();
                let removed: BTreeSet<u32> =
                    result.removed.iter().map(|f| f.carrier.id.get()).collect();
                prop_assert_eq!(removed.len(), result.removed.len());
                prop_assert!(available.is_disjoint(&removed));
                prop_assert_eq!(&available | &removed, union);

                for filtered in &result.removed {
                    prop_assert!(!filtered.excluded_for_products.is_empty());
                    prop_assert!(filtered.excluded_for_products.len() < products.len());
                    for p in &filtered.excluded_for_products {
                        let idx = (p.id.get() - 1) as usize;
                        prop_assert!(cart[idx].contains(&filtered.carrier.id.get()));
                    }
                }
            }

            #[test]
            fn computation_is_deterministic(cart in cart()) {
                let (products, offers) = summaries(&cart);
                prop_assert_eq!(
                    compute_eligibility(&products, &offers),
                    compute_eligibility(&products, &offers)
                );
            }
        }
    }
}
