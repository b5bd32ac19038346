//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency and need a
//! running Docker daemon. Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{Customer, CustomerId, Money, Order, OrderId, OrderLine, OrderStatus, Product, ProductId};
use serial_test::serial;
use sqlx::PgPool;
use store::{PgStore, Store, StoreError, StoreTx};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            // raw_sql executes the multi-statement migration file
            sqlx::raw_sql(include_str!("../../../migrations/001_create_tables.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PgStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_lines, orders, products, customers")
        .execute(&pool)
        .await
        .unwrap();

    PgStore::new(pool)
}

fn customer(id: &str, name: &str, email: &str) -> Customer {
    Customer {
        id: CustomerId::new(id),
        name: name.to_string(),
        email: email.to_string(),
    }
}

fn product(id: &str, name: &str, price_cents: i64, stock: i32) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        description: String::new(),
        price: Money::from_cents(price_cents),
        stock,
        category: "General".to_string(),
    }
}

fn order(id: &str, customer_id: &str, lines: &[(&str, i32, i64)]) -> Order {
    let lines: Vec<OrderLine> = lines
        .iter()
        .map(|(product_id, quantity, unit_cents)| OrderLine {
            product_id: ProductId::new(*product_id),
            quantity: *quantity,
            unit_price: Money::from_cents(*unit_cents),
            subtotal: Money::from_cents(*unit_cents * i64::from(*quantity)),
        })
        .collect();
    Order {
        id: OrderId::new(id),
        customer_id: CustomerId::new(customer_id),
        placed_at: Utc::now(),
        total: lines.iter().map(|l| l.subtotal).sum(),
        status: OrderStatus::pending(),
        lines,
    }
}

async fn seed(store: &PgStore) {
    store
        .insert_customer(&customer("C1", "Ana Souza", "ana@example.com"))
        .await
        .unwrap();
    store
        .insert_product(&product("P1", "Keyboard", 1000, 5))
        .await
        .unwrap();
    store
        .insert_product(&product("P2", "Mouse", 250, 3))
        .await
        .unwrap();
}

async fn stock_of(store: &PgStore, id: &str) -> i32 {
    store
        .get_product(&ProductId::new(id))
        .await
        .unwrap()
        .unwrap()
        .stock
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn debit_stops_at_zero() {
    let store = get_test_store().await;
    seed(&store).await;
    let p1 = ProductId::new("P1");

    store.adjust_stock(&p1, -5).await.unwrap();
    assert_eq!(stock_of(&store, "P1").await, 0);

    let err = store.adjust_stock(&p1, -1).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::InsufficientStock { requested: 1, .. }
    ));
    assert_eq!(stock_of(&store, "P1").await, 0);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn adjust_unknown_product_reports_not_found() {
    let store = get_test_store().await;

    let err = store
        .adjust_stock(&ProductId::new("missing"), -1)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ProductNotFound(_)));

    let err = store
        .adjust_stock(&ProductId::new("missing"), 4)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ProductNotFound(_)));

    // zero never touches the table
    store
        .adjust_stock(&ProductId::new("missing"), 0)
        .await
        .unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn credit_overflow_is_reported() {
    let store = get_test_store().await;
    store
        .insert_product(&product("P9", "Bulk", 100, i32::MAX - 1))
        .await
        .unwrap();

    let err = store
        .adjust_stock(&ProductId::new("P9"), 2)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::StockOverflow(_)));
    assert_eq!(stock_of(&store, "P9").await, i32::MAX - 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn order_round_trips_with_lines_in_position_order() {
    let store = get_test_store().await;
    seed(&store).await;

    let placed = order("O1", "C1", &[("P2", 1, 250), ("P1", 2, 1000)]);
    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&placed).await.unwrap();
    tx.commit().await.unwrap();

    let loaded = store.get_order(&OrderId::new("O1")).await.unwrap().unwrap();
    assert_eq!(loaded.lines.len(), 2);
    assert_eq!(loaded.lines[0].product_id, ProductId::new("P2"));
    assert_eq!(loaded.lines[1].product_id, ProductId::new("P1"));
    assert_eq!(loaded.total, Money::from_cents(2250));
    assert_eq!(loaded.status, OrderStatus::pending());
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn uncommitted_transaction_leaves_nothing_behind() {
    let store = get_test_store().await;
    seed(&store).await;

    {
        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&order("O1", "C1", &[("P1", 2, 1000)]))
            .await
            .unwrap();
        tx.adjust_stock(&ProductId::new("P1"), -2).await.unwrap();
        // dropped without commit
    }

    assert!(store.get_order(&OrderId::new("O1")).await.unwrap().is_none());
    assert_eq!(stock_of(&store, "P1").await, 5);

    let mut tx = store.begin().await.unwrap();
    tx.adjust_stock(&ProductId::new("P1"), -1).await.unwrap();
    tx.rollback().await.unwrap();
    assert_eq!(stock_of(&store, "P1").await, 5);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn constraints_map_to_store_errors() {
    let store = get_test_store().await;
    seed(&store).await;

    let err = store
        .insert_customer(&customer("C2", "Other", "ana@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UniqueViolation(ref c) if c == "customers_email_key"));

    let mut tx = store.begin().await.unwrap();
    let err = tx
        .insert_order(&order("O1", "nobody", &[("P1", 1, 1000)]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ForeignKeyViolation(_)));
    drop(tx);

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order("O1", "C1", &[("P1", 1, 1000)]))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let err = store
        .delete_customer(&CustomerId::new("C1"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ForeignKeyViolation(_)));

    let err = store
        .delete_product(&ProductId::new("P1"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ForeignKeyViolation(_)));
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn mark_cancelled_changes_one_row_once() {
    let store = get_test_store().await;
    seed(&store).await;

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order("O1", "C1", &[("P1", 1, 1000)]))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let id = OrderId::new("O1");
    let mut tx = store.begin().await.unwrap();
    assert!(tx.mark_cancelled(&id).await.unwrap());
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert!(!tx.mark_cancelled(&id).await.unwrap());
    tx.rollback().await.unwrap();

    let loaded = store.get_order(&id).await.unwrap().unwrap();
    assert!(loaded.status.is_cancelled());
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn delete_order_removes_lines_and_header() {
    let store = get_test_store().await;
    seed(&store).await;

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&order("O1", "C1", &[("P1", 1, 1000), ("P2", 1, 250)]))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert!(tx.delete_order(&OrderId::new("O1")).await.unwrap());
    tx.commit().await.unwrap();

    assert!(store.get_order(&OrderId::new("O1")).await.unwrap().is_none());
    assert!(!store.product_in_orders(&ProductId::new("P1")).await.unwrap());
    assert_eq!(store.count_orders().await.unwrap(), 0);

    let mut tx = store.begin().await.unwrap();
    assert!(!tx.delete_order(&OrderId::new("O1")).await.unwrap());
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn orders_list_newest_first_and_search_by_customer_name() {
    let store = get_test_store().await;
    seed(&store).await;
    store
        .insert_customer(&customer("C2", "Bruno Lima", "bruno@example.com"))
        .await
        .unwrap();

    let mut older = order("O1", "C1", &[("P1", 1, 1000)]);
    older.placed_at = Utc::now() - Duration::days(1);
    let newer = order("O2", "C2", &[("P2", 1, 250)]);

    let mut tx = store.begin().await.unwrap();
    tx.insert_order(&older).await.unwrap();
    tx.insert_order(&newer).await.unwrap();
    tx.commit().await.unwrap();

    let listed = store.list_orders().await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["O2", "O1"]);
    assert!(listed.iter().all(|o| o.lines.len() == 1));

    let found = store.search_orders_by_customer_name("Souza").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, OrderId::new("O1"));
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn search_treats_wildcards_literally() {
    let store = get_test_store().await;
    seed(&store).await;
    store
        .insert_product(&product("P3", "Cable 50%_off", 100, 1))
        .await
        .unwrap();

    let found = store.search_products("%_").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, ProductId::new("P3"));

    assert_eq!(store.search_products("_").await.unwrap().len(), 1);
    assert!(store.search_customers("%").await.unwrap().is_empty());
    assert!(store.search_orders_by_customer_name("_").await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn update_product_keeps_stock() {
    let store = get_test_store().await;
    seed(&store).await;

    let mut changed = product("P1", "Mechanical Keyboard", 1200, 999);
    changed.category = "Peripherals".to_string();
    assert!(store.update_product(&changed).await.unwrap());

    let loaded = store.get_product(&ProductId::new("P1")).await.unwrap().unwrap();
    assert_eq!(loaded.name, "Mechanical Keyboard");
    assert_eq!(loaded.price, Money::from_cents(1200));
    assert_eq!(loaded.stock, 5);

    let names: Vec<String> = store
        .list_products()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["Mechanical Keyboard", "Mouse"]);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn concurrent_debits_never_oversell() {
    let store = get_test_store().await;
    seed(&store).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.adjust_stock(&ProductId::new("P1"), -1).await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => ok += 1,
            Err(StoreError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(ok, 5);
    assert_eq!(stock_of(&store, "P1").await, 0);
}
