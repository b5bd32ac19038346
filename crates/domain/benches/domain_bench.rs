use common::{Customer, CustomerId, Money, OrderId, Product, ProductId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{CreateOrder, CustomerService, OrderService, ProductService};
use store::InMemoryStore;

const LINES: i32 = 5;

async fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    CustomerService::new(store.clone())
        .create_customer(Customer {
            id: CustomerId::new("C1"),
            name: "Bench Customer".to_string(),
            email: "bench@example.com".to_string(),
        })
        .await
        .unwrap();

    let products = ProductService::new(store.clone());
    for i in 0..LINES {
        products
            .create_product(Product {
                id: ProductId::new(format!("P{i}")),
                name: format!("Product {i}"),
                description: String::new(),
                price: Money::from_cents(1000),
                stock: 1_000_000,
                category: "Bench".to_string(),
            })
            .await
            .unwrap();
    }
    store
}

fn create_cmd(order_id: String) -> CreateOrder {
    (0..LINES).fold(
        CreateOrder::new(order_id, "C1", Money::from_cents(1000 * i64::from(LINES))),
        |cmd, i| cmd.with_line(format!("P{i}"), 1),
    )
}

fn bench_create_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = OrderService::new(rt.block_on(seeded_store()));
    let mut counter = 0u64;

    c.bench_function("domain/create_order_5_lines", |b| {
        b.iter(|| {
            counter += 1;
            let cmd = create_cmd(format!("O{counter}"));
            rt.block_on(async {
                service.create_order(cmd).await.unwrap();
            });
        });
    });
}

fn bench_create_and_cancel(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = OrderService::new(rt.block_on(seeded_store()));
    let mut counter = 0u64;

    c.bench_function("domain/create_then_cancel", |b| {
        b.iter(|| {
            counter += 1;
            let order_id = format!("O{counter}");
            let cmd = create_cmd(order_id.clone());
            rt.block_on(async {
                service.create_order(cmd).await.unwrap();
                service
                    .cancel_order(&OrderId::new(order_id))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_rejected_total_mismatch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let service = OrderService::new(rt.block_on(seeded_store()));

    c.bench_function("domain/reject_total_mismatch", |b| {
        b.iter(|| {
            let cmd = CreateOrder::new("O-bad", "C1", Money::from_cents(1)).with_line("P0", 1);
            rt.block_on(async {
                service.create_order(cmd).await.unwrap_err();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_create_order,
    bench_create_and_cancel,
    bench_rejected_total_mismatch,
);
criterion_main!(benches);
