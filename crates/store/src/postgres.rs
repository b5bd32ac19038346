use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    Customer, CustomerId, Money, Order, OrderId, OrderLine, OrderStatus, Product, ProductId,
};
use sqlx::{PgPool, Postgres, Row, postgres::PgPoolOptions, postgres::PgRow};

use crate::{
    Result, StoreError,
    store::{Store, StoreTx},
};

const ORDER_COLUMNS: &str = "o.id, o.customer_id, o.placed_at, o.total_cents, o.status";

/// Builds a `LIKE ... ESCAPE '\'` pattern matching `term` anywhere, with
/// `%` and `_` in the term taken literally.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool to `url` and wraps it in a store.
    pub async fn connect(url: &str, max_connections: u32, max_lifetime: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .max_lifetime(max_lifetime)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    fn row_to_customer(row: PgRow) -> Result<Customer> {
        Ok(Customer {
            id: CustomerId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            email: row.try_get("email")?,
        })
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock: row.try_get("stock")?,
            category: row.try_get("category")?,
        })
    }

    fn row_to_order_header(row: PgRow) -> Result<Order> {
        Ok(Order {
            id: OrderId::new(row.try_get::<String, _>("id")?),
            customer_id: CustomerId::new(row.try_get::<String, _>("customer_id")?),
            placed_at: row.try_get::<DateTime<Utc>, _>("placed_at")?,
            total: Money::from_cents(row.try_get("total_cents")?),
            status: OrderStatus::from(row.try_get::<String, _>("status")?),
            lines: Vec::new(),
        })
    }

    fn row_to_line(row: &PgRow) -> Result<OrderLine> {
        Ok(OrderLine {
            product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
            quantity: row.try_get("quantity")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            subtotal: Money::from_cents(row.try_get("subtotal_cents")?),
        })
    }

    /// Loads the lines of every order in `orders` with a single query.
    async fn attach_lines(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let mut orders = rows
            .into_iter()
            .map(Self::row_to_order_header)
            .collect::<Result<Vec<_>>>()?;
        if orders.is_empty() {
            return Ok(orders);
        }

        let ids: Vec<String> = orders.iter().map(|o| o.id.to_string()).collect();
        let line_rows = sqlx::query(
            r#"
            SELECT order_id, product_id, quantity, unit_price_cents, subtotal_cents
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lines: HashMap<String, Vec<OrderLine>> = HashMap::new();
        for row in &line_rows {
            let order_id: String = row.try_get("order_id")?;
            lines
                .entry(order_id)
                .or_default()
                .push(Self::row_to_line(row)?);
        }
        for order in &mut orders {
            order.lines = lines.remove(order.id.as_str()).unwrap_or_default();
        }
        Ok(orders)
    }
}

/// Transaction over a [`PgStore`].
///
/// Wraps `sqlx::Transaction`, which rolls back when dropped uncommitted.
pub struct PgTx {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, placed_at, total_cents, status)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order.id.as_str())
        .bind(order.customer_id.as_str())
        .bind(order.placed_at)
        .bind(order.total.cents())
        .bind(order.status.as_str())
        .execute(&mut *self.tx)
        .await?;

        for (position, line) in order.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_lines
                    (order_id, product_id, position, quantity, unit_price_cents, subtotal_cents)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order.id.as_str())
            .bind(line.product_id.as_str())
            .bind(position as i32)
            .bind(line.quantity)
            .bind(line.unit_price.cents())
            .bind(line.subtotal.cents())
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn mark_cancelled(&mut self, id: &OrderId) -> Result<bool> {
        let result = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2 AND status <> $1")
            .bind(OrderStatus::CANCELLED)
            .bind(id.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_order(&mut self, id: &OrderId) -> Result<bool> {
        sqlx::query("DELETE FROM order_lines WHERE order_id = $1")
            .bind(id.as_str())
            .execute(&mut *self.tx)
            .await?;

        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn adjust_stock(&mut self, product_id: &ProductId, delta: i32) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }

        let sql = if delta > 0 {
            "UPDATE products SET stock = stock + $1 WHERE id = $2"
        } else {
            "UPDATE products SET stock = stock - $1 WHERE id = $2 AND stock >= $1"
        };
        let amount = i64::from(delta.unsigned_abs());

        let result = sqlx::query(sql)
            .bind(amount)
            .bind(product_id.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| match e {
                // numeric_value_out_of_range
                sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some("22003") => {
                    StoreError::StockOverflow(product_id.clone())
                }
                other => StoreError::from(other),
            })?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Nothing changed: tell a missing product apart from a refused debit.
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
                .bind(product_id.as_str())
                .fetch_one(&mut *self.tx)
                .await?;

        if exists {
            tracing::debug!(%product_id, delta, "stock debit refused");
            Err(StoreError::InsufficientStock {
                product_id: product_id.clone(),
                requested: delta.unsigned_abs(),
            })
        } else {
            Err(StoreError::ProductNotFound(product_id.clone()))
        }
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx> {
        Ok(PgTx {
            tx: self.pool.begin().await?,
        })
    }

    async fn list_customers(&self) -> Result<Vec<Customer>> {
        let rows = sqlx::query("SELECT id, name, email FROM customers ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_customer).collect()
    }

    async fn get_customer(&self, id: &CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query("SELECT id, name, email FROM customers WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_customer).transpose()
    }

    async fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>> {
        let row = sqlx::query("SELECT id, name, email FROM customers WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_customer).transpose()
    }

    async fn search_customers(&self, term: &str) -> Result<Vec<Customer>> {
        let rows = sqlx::query(
            r"SELECT id, name, email FROM customers WHERE name LIKE $1 ESCAPE '\' ORDER BY id",
        )
        .bind(contains_pattern(term))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_customer).collect()
    }

    async fn insert_customer(&self, customer: &Customer) -> Result<()> {
        sqlx::query("INSERT INTO customers (id, name, email) VALUES ($1, $2, $3)")
            .bind(customer.id.as_str())
            .bind(&customer.name)
            .bind(&customer.email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_customer(&self, customer: &Customer) -> Result<bool> {
        let result = sqlx::query("UPDATE customers SET name = $1, email = $2 WHERE id = $3")
            .bind(&customer.name)
            .bind(&customer.email)
            .bind(customer.id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_customer(&self, id: &CustomerId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn customer_has_orders(&self, id: &CustomerId) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE customer_id = $1)")
                .bind(id.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn count_customers(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, price_cents, stock, category
            FROM products
            ORDER BY name, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, price_cents, stock, category
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_product).transpose()
    }

    async fn search_products(&self, term: &str) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, price_cents, stock, category
            FROM products
            WHERE name LIKE $1 ESCAPE '\'
            ORDER BY name, id
            "#,
        )
        .bind(contains_pattern(term))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price_cents, stock, category)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(product.stock)
        .bind(&product.category)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $1, description = $2, price_cents = $3, category = $4
            WHERE id = $5
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(&product.category)
        .bind(product.id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_product(&self, id: &ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn product_in_orders(&self, id: &ProductId) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM order_lines WHERE product_id = $1)")
                .bind(id.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn count_products(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o ORDER BY o.placed_at DESC, o.id"
        ))
        .fetch_all(&self.pool)
        .await?;
        self.attach_lines(rows).await
    }

    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.attach_lines(vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    async fn search_orders_by_customer_name(&self, term: &str) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders o
            JOIN customers c ON o.customer_id = c.id
            WHERE c.name LIKE $1 ESCAPE '\'
            ORDER BY o.placed_at DESC, o.id
            "#
        ))
        .bind(contains_pattern(term))
        .fetch_all(&self.pool)
        .await?;
        self.attach_lines(rows).await
    }

    async fn update_order_status(&self, id: &OrderId, status: &OrderStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_orders(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_wraps_plain_terms() {
        assert_eq!(contains_pattern("Souza"), "%Souza%");
    }

    #[test]
    fn pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("50%_off"), r"%50\%\_off%");
        assert_eq!(contains_pattern(r"a\b"), r"%a\\b%");
    }
}
