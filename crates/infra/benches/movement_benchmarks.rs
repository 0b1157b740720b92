use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;

use chrono::Utc;
use stockroom_catalog::{NewProduct, NewWarehouse, Product, Warehouse};
use stockroom_core::{MovementId, ProductId, UserId, WarehouseId};
use stockroom_infra::catalog::{CatalogStore, InMemoryCatalogStore};
use stockroom_infra::stock::InMemoryInventoryStore;
use stockroom_infra::{InventoryReports, MovementProcessor};
use stockroom_inventory::{derive_balances, Movement, MovementRequest, MovementType};
use tokio::runtime::Runtime;

struct Setup {
    processor: MovementProcessor,
    reports: InventoryReports,
    products: Vec<Product>,
    warehouses: Vec<Warehouse>,
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn setup(rt: &Runtime, product_count: usize, warehouse_count: usize) -> Setup {
    let catalog = Arc::new(InMemoryCatalogStore::new());
    let store = Arc::new(InMemoryInventoryStore::new());

    let (products, warehouses) = rt.block_on(async {
        let mut products = Vec::with_capacity(product_count);
        for i in 0..product_count {
            let product = NewProduct {
                code: format!("SKU-{i:05}"),
                name: format!("Product {i}"),
                min_stock: Some(10),
                ..Default::default()
            }
            .validate(ProductId::new(), Utc::now())
            .unwrap();
            catalog.insert_product(&product).await.unwrap();
            products.push(product);
        }
        let mut warehouses = Vec::with_capacity(warehouse_count);
        for i in 0..warehouse_count {
            let warehouse = NewWarehouse {
                name: format!("Warehouse {i}"),
                ..Default::default()
            }
            .validate(WarehouseId::new(), Utc::now())
            .unwrap();
            catalog.insert_warehouse(&warehouse).await.unwrap();
            warehouses.push(warehouse);
        }
        (products, warehouses)
    });

    Setup {
        processor: MovementProcessor::new(catalog.clone(), store.clone()),
        reports: InventoryReports::new(catalog, store),
        products,
        warehouses,
    }
}

fn entry(product: &Product, warehouse: &Warehouse, quantity: i64) -> MovementRequest {
    MovementRequest {
        product_id: product.id,
        movement_type: MovementType::Entry,
        quantity,
        source_warehouse_id: None,
        destination_warehouse_id: Some(warehouse.id),
        unit_price: None,
        reason: None,
    }
}

fn bench_record_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("movement_record_latency");
    let rt = runtime();
    let s = setup(&rt, 1, 2);
    let user = UserId::new();
    let (p, a, b) = (&s.products[0], &s.warehouses[0], &s.warehouses[1]);

    group.bench_function("entry", |bench| {
        bench.iter(|| {
            rt.block_on(s.processor.record(entry(p, a, 1), user)).unwrap();
        });
    });

    group.bench_function("transfer_there_and_back", |bench| {
        rt.block_on(s.processor.record(entry(p, a, 1), user)).unwrap();
        bench.iter(|| {
            for (from, to) in [(a, b), (b, a)] {
                let request = MovementRequest {
                    product_id: p.id,
                    movement_type: MovementType::Transfer,
                    quantity: 1,
                    source_warehouse_id: Some(from.id),
                    destination_warehouse_id: Some(to.id),
                    unit_price: None,
                    reason: None,
                };
                black_box(rt.block_on(s.processor.record(request, user)).unwrap());
            }
        });
    });

    group.finish();
}

fn bench_balance_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("balance_derivation");
    let product_id = ProductId::new();
    let warehouses: Vec<WarehouseId> = (0..8).map(|_| WarehouseId::new()).collect();

    for count in [100usize, 1_000, 10_000].iter() {
        let history: Vec<Movement> = (0..*count)
            .map(|i| Movement {
                id: MovementId::new(),
                product_id,
                movement_type: MovementType::Entry,
                quantity: 1 + (i % 5) as i64,
                source_warehouse_id: None,
                destination_warehouse_id: Some(warehouses[i % warehouses.len()]),
                unit_price: None,
                total_value: None,
                reason: None,
                user_id: UserId::new(),
                created_at: Utc::now(),
            })
            .collect();

        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("derive_balances", count), &history, |b, h| {
            b.iter(|| black_box(derive_balances(h).unwrap()));
        });
    }

    group.finish();
}

fn bench_low_stock_report(c: &mut Criterion) {
    let mut group = c.benchmark_group("low_stock_report");
    let rt = runtime();

    for product_count in [10usize, 100, 1_000].iter() {
        let s = setup(&rt, *product_count, 4);
        let user = UserId::new();
        rt.block_on(async {
            for (i, product) in s.products.iter().enumerate() {
                let warehouse = &s.warehouses[i % s.warehouses.len()];
                s.processor
                    .record(entry(product, warehouse, (i % 20) as i64 + 1), user)
                    .await
                    .unwrap();
            }
        });

        group.bench_with_input(
            BenchmarkId::new("low_stock", product_count),
            product_count,
            |b, _| {
                b.iter(|| black_box(rt.block_on(s.reports.low_stock()).unwrap()));
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_record_latency,
    bench_balance_derivation,
    bench_low_stock_report
);
criterion_main!(benches);
