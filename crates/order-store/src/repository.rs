use async_trait::async_trait;
use common::{CustomerId, OrderId};
use domain::{Customer, Order, OrderStatus};

use crate::Result;

/// Zero-based page selector for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: u32,
    pub size: u32,
}

impl PageRequest {
    /// Creates a page request. A size of zero is bumped to one.
    pub fn new(number: u32, size: u32) -> Self {
        Self {
            number,
            size: size.max(1),
        }
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.number) * u64::from(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, 25)
    }
}

/// Storage for orders and their lines.
///
/// `save` is an atomic upsert guarded by optimistic concurrency: an order at
/// [`Version::initial`](common::Version::initial) is inserted, any other
/// order must carry the currently stored version. The returned order carries
/// the new version.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Loads an order with its lines.
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>>;

    /// Inserts or updates an order and its lines in one transaction.
    async fn save(&self, order: Order) -> Result<Order>;

    /// Lists a customer's orders, newest first.
    async fn find_by_customer(
        &self,
        customer_id: CustomerId,
        page: PageRequest,
    ) -> Result<Vec<Order>>;

    /// Counts a customer's orders.
    async fn count_by_customer(&self, customer_id: CustomerId) -> Result<u64>;

    /// Lists every order currently in `status`.
    async fn find_all_by_status(&self, status: OrderStatus) -> Result<Vec<Order>>;
}

/// Storage for customers.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>>;

    async fn save(&self, customer: Customer) -> Result<Customer>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(PageRequest::new(0, 10).offset(), 0);
        assert_eq!(PageRequest::new(3, 10).offset(), 30);
    }

    #[test]
    fn test_page_size_never_zero() {
        assert_eq!(PageRequest::new(2, 0).size, 1);
    }
}
