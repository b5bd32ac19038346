//! Customer lookup and maintenance.

use common::{Customer, CustomerId};
use store::{Store, StoreError};
use tracing::{info, warn};

use crate::error::{DomainError, require};

/// Service for managing customers.
#[derive(Clone)]
pub struct CustomerService<S: Store> {
    store: S,
}

impl<S: Store> CustomerService<S> {
    /// Creates a new customer service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns every customer.
    #[tracing::instrument(skip(self))]
    pub async fn list_customers(&self) -> Result<Vec<Customer>, DomainError> {
        Ok(self.store.list_customers().await?)
    }

    /// Loads a customer by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_customer(&self, id: &CustomerId) -> Result<Customer, DomainError> {
        self.store
            .get_customer(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Customer", id))
    }

    /// Registers a new customer.
    ///
    /// The email must not belong to any other customer.
    #[tracing::instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn create_customer(&self, customer: Customer) -> Result<Customer, DomainError> {
        require("customer id", customer.id.as_str())?;
        Self::validate(&customer)?;

        if self
            .store
            .find_customer_by_email(&customer.email)
            .await?
            .is_some()
        {
            warn!(email = %customer.email, "email already registered");
            return Err(DomainError::Duplicate(format!(
                "Customer with email {}",
                customer.email
            )));
        }

        self.store
            .insert_customer(&customer)
            .await
            .map_err(|e| Self::map_unique(e, &customer))?;

        info!("customer created");
        Ok(customer)
    }

    /// Rewrites a customer's name and email.
    #[tracing::instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn update_customer(&self, customer: Customer) -> Result<Customer, DomainError> {
        Self::validate(&customer)?;
        self.get_customer(&customer.id).await?;

        if let Some(owner) = self.store.find_customer_by_email(&customer.email).await? {
            if owner.id != customer.id {
                warn!(email = %customer.email, "email belongs to another customer");
                return Err(DomainError::Duplicate(format!(
                    "Customer with email {}",
                    customer.email
                )));
            }
        }

        let updated = self
            .store
            .update_customer(&customer)
            .await
            .map_err(|e| Self::map_unique(e, &customer))?;
        if !updated {
            return Err(DomainError::not_found("Customer", &customer.id));
        }

        info!("customer updated");
        Ok(customer)
    }

    /// Deletes a customer that has no orders.
    #[tracing::instrument(skip(self))]
    pub async fn delete_customer(&self, id: &CustomerId) -> Result<(), DomainError> {
        self.get_customer(id).await?;

        if self.store.customer_has_orders(id).await? {
            warn!("customer has orders");
            return Err(DomainError::Dependency(format!("Customer {id}")));
        }

        let deleted = self.store.delete_customer(id).await.map_err(|e| match e {
            StoreError::ForeignKeyViolation(_) => DomainError::Dependency(format!("Customer {id}")),
            other => other.into(),
        })?;
        if !deleted {
            return Err(DomainError::not_found("Customer", id));
        }

        info!("customer deleted");
        Ok(())
    }

    /// Counts registered customers.
    #[tracing::instrument(skip(self))]
    pub async fn count_customers(&self) -> Result<i64, DomainError> {
        Ok(self.store.count_customers().await?)
    }

    /// Returns customers whose name contains `term`.
    #[tracing::instrument(skip(self))]
    pub async fn search_customers(&self, term: &str) -> Result<Vec<Customer>, DomainError> {
        require("search term", term)?;
        Ok(self.store.search_customers(term).await?)
    }

    fn validate(customer: &Customer) -> Result<(), DomainError> {
        require("name", &customer.name)?;
        require("email", &customer.email)
    }

    fn map_unique(e: StoreError, customer: &Customer) -> DomainError {
        match e {
            StoreError::UniqueViolation(constraint) if constraint == "customers_pkey" => {
                DomainError::Duplicate(format!("Customer {}", customer.id))
            }
            StoreError::UniqueViolation(_) => {
                DomainError::Duplicate(format!("Customer with email {}", customer.email))
            }
            other => other.into(),
        }
    }
}
