use common::ProductId;
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The product targeted by a stock adjustment does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A stock debit would have taken the product below zero.
    #[error("Insufficient stock for product {product_id}: cannot remove {requested} units")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
    },

    /// A stock credit would overflow the stock column.
    #[error("Stock overflow for product {0}")]
    StockOverflow(ProductId),

    /// A uniqueness constraint rejected the write.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A foreign key constraint rejected the write.
    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = e {
            let constraint = db_err.constraint().unwrap_or_default().to_string();
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation(constraint);
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::ForeignKeyViolation(constraint);
            }
        }
        StoreError::Database(e)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
