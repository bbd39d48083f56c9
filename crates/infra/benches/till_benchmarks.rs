use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use tillpoint_auth::{Principal, Role, UserId};
use tillpoint_core::{Money, TenantId};
use tillpoint_events::{EventEnvelope, InMemoryEventBus};
use tillpoint_infra::Till;
use tillpoint_infra::command_dispatcher::CommandDispatcher;
use tillpoint_infra::event_store::InMemoryEventStore;
use tillpoint_infra::projections::Projections;
use tillpoint_infra::services::{CartRequestItem, CheckoutRequest, NewProduct};
use tillpoint_products::{Category, Pricing, ProductDetails, ProductId, UnitType};
use tillpoint_sales::{PaymentMethod, SaleStatus};

type BenchTill = Till<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

fn till() -> BenchTill {
    Till::new(
        CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new())),
        Arc::new(Projections::new()),
    )
}

fn cashier(tenant_id: TenantId) -> Principal {
    Principal {
        user_id: UserId::new(),
        username: "bench".into(),
        tenant_id,
        role: Role::Cashier,
        must_change_password: false,
    }
}

fn stock(till: &BenchTill, tenant_id: TenantId, n: usize) -> Vec<ProductId> {
    (0..n)
        .map(|i| {
            till.create_product(
                tenant_id,
                NewProduct {
                    details: ProductDetails {
                        name: format!("Item {i}"),
                        category: Category::Food,
                        description: String::new(),
                        pricing: Pricing {
                            purchase_price: Money::from_minor(800),
                            full_price: Money::from_minor(1_000),
                            half_price: None,
                        },
                    },
                    packs: 900_000,
                    sku: None,
                },
                Utc::now(),
            )
            .unwrap()
            .product_id
        })
        .collect()
}

fn request(products: &[ProductId]) -> CheckoutRequest {
    CheckoutRequest {
        items: products
            .iter()
            .map(|&product_id| CartRequestItem {
                product_id,
                quantity: 1,
                unit_type: UnitType::Quarter,
            })
            .collect(),
        status: SaleStatus::Completed,
        payment_method: PaymentMethod::Cash,
        amount_paid: Money::from_minor(1_000_000),
        continue_sale_id: None,
    }
}

fn bench_checkout(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkout");
    for lines in [1usize, 5, 20] {
        let till = till();
        let tenant_id = TenantId::new();
        let clerk = cashier(tenant_id);
        let products = stock(&till, tenant_id, lines);

        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::new("lines", lines), &lines, |b, _| {
            b.iter(|| {
                let outcome = till.checkout(&clerk, request(&products), Utc::now()).unwrap();
                black_box(outcome.sale.total)
            })
        });
    }
    group.finish();
}

fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebuild");
    for sales in [100usize, 1_000] {
        let till = till();
        let tenant_id = TenantId::new();
        let clerk = cashier(tenant_id);
        let products = stock(&till, tenant_id, 5);
        for _ in 0..sales {
            till.checkout(&clerk, request(&products), Utc::now()).unwrap();
        }

        group.bench_with_input(BenchmarkId::new("sales", sales), &sales, |b, _| {
            b.iter(|| black_box(till.rebuild(tenant_id).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_checkout, bench_rebuild);
criterion_main!(benches);
