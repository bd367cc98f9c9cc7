use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use carrierwise_carriers::{
    CarrierEligibilityResolver, CarrierSummary, ProductSummary, WeightRangeValidator,
    compute_eligibility,
};
use carrierwise_core::{CarrierId, LanguageId, ProductId, RequestContext, ShopId, ZoneId};
use carrierwise_infra::catalog::{InMemoryCatalog, InMemoryZoneDirectory};
use carrierwise_infra::weight_ranges::InMemoryWeightRangeStore;

/// Product `i` offers carriers `i % 7 ..= i % 7 + 20`, so most carts keep a common core.
fn offers_for(product: u32) -> Vec<CarrierSummary> {
    let start = 1 + product % 7;
    (start..start + 20)
        .map(|id| CarrierSummary {
            id: CarrierId::new(id).unwrap(),
            name: format!("Carrier {id}"),
        })
        .collect()
}

fn cart(size: u32) -> (Vec<ProductSummary>, Vec<Vec<CarrierSummary>>) {
    let products = (1..=size)
        .map(|id| ProductSummary {
            id: ProductId::new(id).unwrap(),
            name: format!("Product {id}"),
        })
        .collect();
    let offers = (1..=size).map(offers_for).collect();
    (products, offers)
}

fn bench_compute_eligibility(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_eligibility");

    for size in [1_u32, 10, 100, 1000].iter() {
        let (products, offers) = cart(*size);
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(compute_eligibility(black_box(&products), black_box(&offers))));
        });
    }

    group.finish();
}

fn bench_resolve_cart(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_cart");
    let shop = ShopId::new(1).unwrap();
    let ctx = RequestContext::new(shop, LanguageId::new(1).unwrap());

    for size in [10_u32, 100, 1000].iter() {
        let catalog = Arc::new(InMemoryCatalog::new());
        for id in 1..=*size {
            let product_id = ProductId::new(id).unwrap();
            catalog
                .upsert_product(shop, product_id, format!("Product {id}"))
                .unwrap();
            catalog.set_carriers(shop, product_id, offers_for(id)).unwrap();
        }
        let resolver = CarrierEligibilityResolver::new(catalog.clone(), catalog);
        let ids: Vec<ProductId> = (1..=*size).map(|id| ProductId::new(id).unwrap()).collect();

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(resolver.resolve(black_box(&ids), ctx).unwrap()));
        });
    }

    group.finish();
}

fn bench_create_weight_ranges(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_weight_ranges");

    for existing in [0_u32, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(existing), existing, |b, &existing| {
            b.iter_with_setup(
                || {
                    let zones = InMemoryZoneDirectory::new();
                    let carrier = CarrierId::new(1).unwrap();
                    zones
                        .assign(carrier, (1..=10).map(|z| ZoneId::new(z).unwrap()).collect())
                        .unwrap();
                    let validator =
                        WeightRangeValidator::new(InMemoryWeightRangeStore::new(), zones);
                    for i in 0..existing {
                        let d1 = f64::from(i);
                        validator.create(carrier, d1, d1 + 1.0).unwrap();
                    }
                    (validator, carrier)
                },
                |(validator, carrier)| {
                    let d1 = f64::from(existing);
                    black_box(validator.create(carrier, d1, d1 + 1.0).unwrap());
                },
            );
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compute_eligibility,
    bench_resolve_cart,
    bench_create_weight_ranges
);
criterion_main!(benches);
