use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{CustomerId, OrderId, Version};
use domain::{Customer, Order, OrderStatus};
use tokio::sync::RwLock;

use crate::{CustomerRepository, OrderRepository, OrderStoreError, PageRequest, Result};

/// In-memory order repository for testing.
///
/// Applies the same optimistic version check as the PostgreSQL
/// implementation. Saves can be made to fail to exercise persistence
/// failure handling.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    fail_on_save: Arc<AtomicBool>,
}

impl InMemoryOrderRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent save fail until reset.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.fail_on_save.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Overwrites the stored copy without any version check.
    ///
    /// Simulates a write made by another process, e.g. to provoke a
    /// concurrency conflict.
    pub async fn force_put(&self, order: Order) {
        self.orders.write().await.insert(order.id(), order);
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn save(&self, mut order: Order) -> Result<Order> {
        if self.fail_on_save.load(Ordering::SeqCst) {
            return Err(OrderStoreError::Unavailable(
                "order store rejected write".to_string(),
            ));
        }

        let mut orders = self.orders.write().await;

        let actual = orders
            .get(&order.id())
            .map(Order::version)
            .unwrap_or(Version::initial());

        if actual != order.version() {
            return Err(OrderStoreError::ConcurrencyConflict {
                order_id: order.id(),
                expected: order.version(),
                actual,
            });
        }

        order.mark_persisted(actual.next(), Utc::now());
        orders.insert(order.id(), order.clone());

        Ok(order)
    }

    async fn find_by_customer(
        &self,
        customer_id: CustomerId,
        page: PageRequest,
    ) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut matching: Vec<_> = orders
            .values()
            .filter(|o| o.customer_id() == customer_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

        Ok(matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.size as usize)
            .collect())
    }

    async fn count_by_customer(&self, customer_id: CustomerId) -> Result<u64> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .filter(|o| o.customer_id() == customer_id)
            .count() as u64)
    }

    async fn find_all_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .filter(|o| o.status() == status)
            .cloned()
            .collect())
    }
}

/// In-memory customer repository for testing.
#[derive(Clone, Default)]
pub struct InMemoryCustomerRepository {
    customers: Arc<RwLock<HashMap<CustomerId, Customer>>>,
}

impl InMemoryCustomerRepository {
    /// Creates a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Customer>> {
        Ok(self.customers.read().await.get(&id).cloned())
    }

    async fn save(&self, customer: Customer) -> Result<Customer> {
        self.customers
            .write()
            .await
            .insert(customer.id, customer.clone());
        Ok(customer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{NewOrderLine, OrderEvent, transition};

    fn new_order(customer_id: CustomerId) -> Order {
        Order::new(customer_id, None, vec![NewOrderLine::new("SKU-001", 2)]).unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_first_version() {
        let repo = InMemoryOrderRepository::new();
        let order = new_order(CustomerId::new());

        let saved = repo.save(order.clone()).await.unwrap();

        assert_eq!(saved.version(), Version::first());
        let found = repo.find_by_id(order.id()).await.unwrap().unwrap();
        assert_eq!(found, saved);
    }

    #[tokio::test]
    async fn test_update_bumps_version() {
        let repo = InMemoryOrderRepository::new();
        let mut saved = repo.save(new_order(CustomerId::new())).await.unwrap();

        let t = transition(saved.status(), OrderEvent::ValidateOrder).unwrap();
        saved.apply_transition(&t).unwrap();
        let updated = repo.save(saved).await.unwrap();

        assert_eq!(updated.version(), Version::new(2));
        assert_eq!(updated.status(), OrderStatus::ValidationPending);
    }

    #[tokio::test]
    async fn test_stale_save_conflicts() {
        let repo = InMemoryOrderRepository::new();
        let saved = repo.save(new_order(CustomerId::new())).await.unwrap();

        repo.save(saved.clone()).await.unwrap();
        let result = repo.save(saved).await;

        assert!(matches!(
            result,
            Err(OrderStoreError::ConcurrencyConflict { expected, actual, .. })
                if expected == Version::first() && actual == Version::new(2)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_insert_conflicts() {
        let repo = InMemoryOrderRepository::new();
        let order = new_order(CustomerId::new());

        repo.save(order.clone()).await.unwrap();
        let result = repo.save(order).await;

        assert!(result.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn test_fail_on_save() {
        let repo = InMemoryOrderRepository::new();
        repo.set_fail_on_save(true);

        let result = repo.save(new_order(CustomerId::new())).await;

        assert!(matches!(result, Err(OrderStoreError::Unavailable(_))));
        assert_eq!(repo.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_find_by_customer_pages() {
        let repo = InMemoryOrderRepository::new();
        let customer = CustomerId::new();
        for _ in 0..5 {
            repo.save(new_order(customer)).await.unwrap();
        }
        repo.save(new_order(CustomerId::new())).await.unwrap();

        let first = repo
            .find_by_customer(customer, PageRequest::new(0, 2))
            .await
            .unwrap();
        let last = repo
            .find_by_customer(customer, PageRequest::new(2, 2))
            .await
            .unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(last.len(), 1);
        assert!(first[0].created_at() >= first[1].created_at());
        assert_eq!(repo.count_by_customer(customer).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_find_all_by_status() {
        let repo = InMemoryOrderRepository::new();
        repo.save(new_order(CustomerId::new())).await.unwrap();

        let new_orders = repo.find_all_by_status(OrderStatus::New).await.unwrap();
        let cancelled = repo
            .find_all_by_status(OrderStatus::Cancelled)
            .await
            .unwrap();

        assert_eq!(new_orders.len(), 1);
        assert!(cancelled.is_empty());
    }

    #[tokio::test]
    async fn test_customer_roundtrip() {
        let repo = InMemoryCustomerRepository::new();
        let customer = Customer::new("Test Customer");

        repo.save(customer.clone()).await.unwrap();

        assert_eq!(repo.find_by_id(customer.id).await.unwrap(), Some(customer));
        assert_eq!(repo.find_by_id(CustomerId::new()).await.unwrap(), None);
    }
}
