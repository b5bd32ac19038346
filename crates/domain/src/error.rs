//! Domain error types.

use common::ProductId;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Missing, malformed or inconsistent caller data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Not enough stock to satisfy a debit.
    #[error("Insufficient stock for product {product_id}: requested {requested}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
    },

    /// Other rows reference the entity, so it can't be deleted.
    #[error("{0} is still referenced and cannot be deleted")]
    Dependency(String),

    /// A uniqueness rule rejected a create or update.
    #[error("{0} already exists")]
    Duplicate(String),

    /// The store failed for reasons unrelated to the request.
    #[error("Storage error: {0}")]
    Storage(#[source] StoreError),
}

impl DomainError {
    /// Builds a `NotFound` for the given entity kind.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::InvalidInput(_) => "invalid_input",
            DomainError::NotFound { .. } => "not_found",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::Dependency(_) => "dependency",
            DomainError::Duplicate(_) => "duplicate",
            DomainError::Storage(_) => "storage",
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ProductNotFound(id) => DomainError::not_found("Product", id),
            StoreError::InsufficientStock {
                product_id,
                requested,
            } => DomainError::InsufficientStock {
                product_id,
                requested,
            },
            StoreError::StockOverflow(id) => {
                DomainError::InvalidInput(format!("stock of product {id} would overflow"))
            }
            other => DomainError::Storage(other),
        }
    }
}

/// Rejects an empty or blank required field.
pub(crate) fn require(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::InvalidInput(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_outcomes_keep_their_meaning() {
        let err = DomainError::from(StoreError::ProductNotFound(ProductId::new("P1")));
        assert_eq!(err.code(), "not_found");
        assert_eq!(err.to_string(), "Product not found: P1");

        let err = DomainError::from(StoreError::InsufficientStock {
            product_id: ProductId::new("P1"),
            requested: 3,
        });
        assert!(matches!(
            err,
            DomainError::InsufficientStock { requested: 3, .. }
        ));
    }

    #[test]
    fn unmapped_store_errors_become_storage() {
        let err = DomainError::from(StoreError::UniqueViolation("orders_pkey".to_string()));
        assert_eq!(err.code(), "storage");
    }

    #[test]
    fn require_rejects_blank_values() {
        assert!(require("name", "Ana").is_ok());
        assert!(matches!(
            require("name", "   "),
            Err(DomainError::InvalidInput(msg)) if msg == "name is required"
        ));
    }
}
