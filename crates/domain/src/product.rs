//! Product lookup, catalog maintenance and the public stock adjustment.

use common::{Product, ProductId};
use store::{Store, StoreError};
use tracing::{info, warn};

use crate::error::{DomainError, require};

/// Records one stock movement in the `stock_adjustments_total` counter.
pub(crate) fn record_stock_adjustment(delta: i32) {
    let direction = if delta > 0 { "credit" } else { "debit" };
    metrics::counter!("stock_adjustments_total", "direction" => direction).increment(1);
}

/// Service for managing products and their stock.
#[derive(Clone)]
pub struct ProductService<S: Store> {
    store: S,
}

impl<S: Store> ProductService<S> {
    /// Creates a new product service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns every product, ordered by name.
    #[tracing::instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<Product>, DomainError> {
        Ok(self.store.list_products().await?)
    }

    /// Loads a product by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Product, DomainError> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Product", id))
    }

    /// Adds a product to the catalog with its opening stock.
    #[tracing::instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn create_product(&self, product: Product) -> Result<Product, DomainError> {
        require("product id", product.id.as_str())?;
        Self::validate(&product)?;
        if product.stock < 0 {
            return Err(DomainError::InvalidInput(
                "stock cannot be negative".to_string(),
            ));
        }

        if self.store.get_product(&product.id).await?.is_some() {
            return Err(DomainError::Duplicate(format!("Product {}", product.id)));
        }

        self.store
            .insert_product(&product)
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation(_) => {
                    DomainError::Duplicate(format!("Product {}", product.id))
                }
                other => other.into(),
            })?;

        info!(stock = product.stock, "product created");
        Ok(product)
    }

    /// Rewrites a product's catalog fields.
    ///
    /// The stored stock is kept; the returned product carries it.
    #[tracing::instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn update_product(&self, product: Product) -> Result<Product, DomainError> {
        Self::validate(&product)?;

        if !self.store.update_product(&product).await? {
            return Err(DomainError::not_found("Product", &product.id));
        }

        info!("product updated");
        self.get_product(&product.id).await
    }

    /// Deletes a product that no order line references.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, id: &ProductId) -> Result<(), DomainError> {
        self.get_product(id).await?;

        if self.store.product_in_orders(id).await? {
            warn!("product is referenced by orders");
            return Err(DomainError::Dependency(format!("Product {id}")));
        }

        let deleted = self.store.delete_product(id).await.map_err(|e| match e {
            StoreError::ForeignKeyViolation(_) => DomainError::Dependency(format!("Product {id}")),
            other => other.into(),
        })?;
        if !deleted {
            return Err(DomainError::not_found("Product", id));
        }

        info!("product deleted");
        Ok(())
    }

    /// Counts catalog products.
    #[tracing::instrument(skip(self))]
    pub async fn count_products(&self) -> Result<i64, DomainError> {
        Ok(self.store.count_products().await?)
    }

    /// Returns products whose name contains `term`.
    #[tracing::instrument(skip(self))]
    pub async fn search_products(&self, term: &str) -> Result<Vec<Product>, DomainError> {
        require("search term", term)?;
        Ok(self.store.search_products(term).await?)
    }

    /// Moves a product's stock by a signed `delta`.
    ///
    /// A debit that would take stock below zero fails with
    /// `InsufficientStock` and changes nothing. Zero is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn adjust_stock(&self, id: &ProductId, delta: i32) -> Result<(), DomainError> {
        if delta == 0 {
            return Ok(());
        }

        if let Err(e) = self.store.adjust_stock(id, delta).await {
            warn!(error = %e, "stock adjustment refused");
            return Err(e.into());
        }

        record_stock_adjustment(delta);
        info!("stock adjusted");
        Ok(())
    }

    fn validate(product: &Product) -> Result<(), DomainError> {
        require("name", &product.name)?;
        if !product.price.is_positive() {
            return Err(DomainError::InvalidInput(
                "price must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
