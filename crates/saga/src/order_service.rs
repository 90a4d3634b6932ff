//! Customer-facing order operations on top of the orchestrator.

use std::sync::Arc;

use common::{CustomerId, OrderId};
use domain::{NewOrderLine, Order};
use order_store::{CustomerRepository, OrderRepository, PageRequest};
use serde::{Deserialize, Serialize};

use crate::channel::MessageChannel;
use crate::error::{Result, SagaError};
use crate::manager::{FireOutcome, OrderSagaManager};
use crate::messages::OrderDto;

/// Request to place an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    #[serde(default)]
    pub customer_ref: Option<String>,
    pub lines: Vec<NewOrderLine>,
}

/// One page of a customer's orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPage {
    pub orders: Vec<OrderDto>,
    pub page_number: u32,
    pub page_size: u32,
    pub total_elements: u64,
}

/// Order operations scoped to a customer.
///
/// Every operation checks that the customer exists and owns the order
/// before delegating to the [`OrderSagaManager`].
pub struct OrderService<R, Cu, C>
where
    R: OrderRepository + Clone,
    Cu: CustomerRepository,
    C: MessageChannel,
{
    manager: Arc<OrderSagaManager<R, Cu, C>>,
}

impl<R, Cu, C> OrderService<R, Cu, C>
where
    R: OrderRepository + Clone,
    Cu: CustomerRepository,
    C: MessageChannel,
{
    pub fn new(manager: Arc<OrderSagaManager<R, Cu, C>>) -> Self {
        Self { manager }
    }

    /// Places an order and starts its saga.
    #[tracing::instrument(skip(self, request))]
    pub async fn place_order(&self, customer_id: CustomerId, request: PlaceOrder) -> Result<OrderDto> {
        self.require_customer(customer_id).await?;
        let order = Order::new(customer_id, request.customer_ref, request.lines)?;
        let order = self.manager.create_order(order).await?;
        Ok(OrderDto::from(&order))
    }

    /// Loads one of the customer's orders.
    pub async fn get_order(&self, customer_id: CustomerId, order_id: OrderId) -> Result<OrderDto> {
        let order = self.owned_order(customer_id, order_id).await?;
        Ok(OrderDto::from(&order))
    }

    /// Lists the customer's orders, newest first.
    pub async fn list_orders(&self, customer_id: CustomerId, page: PageRequest) -> Result<OrderPage> {
        self.require_customer(customer_id).await?;

        let orders = self.manager.orders();
        let items = orders.find_by_customer(customer_id, page).await?;
        let total_elements = orders.count_by_customer(customer_id).await?;

        Ok(OrderPage {
            orders: items.iter().map(OrderDto::from).collect(),
            page_number: page.number,
            page_size: page.size,
            total_elements,
        })
    }

    /// Picks up one of the customer's orders.
    #[tracing::instrument(skip(self))]
    pub async fn pickup_order(&self, customer_id: CustomerId, order_id: OrderId) -> Result<FireOutcome> {
        self.owned_order(customer_id, order_id).await?;
        Ok(self.manager.pick_up(order_id).await)
    }

    /// Cancels one of the customer's orders.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, customer_id: CustomerId, order_id: OrderId) -> Result<FireOutcome> {
        self.owned_order(customer_id, order_id).await?;
        Ok(self.manager.cancel(order_id).await)
    }

    async fn require_customer(&self, customer_id: CustomerId) -> Result<()> {
        self.manager
            .customers()
            .find_by_id(customer_id)
            .await?
            .ok_or(SagaError::CustomerNotFound(customer_id))?;
        Ok(())
    }

    async fn owned_order(&self, customer_id: CustomerId, order_id: OrderId) -> Result<Order> {
        self.require_customer(customer_id).await?;

        let order = self
            .manager
            .get_order(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))?;

        if order.customer_id() != customer_id {
            return Err(SagaError::NotOrderOwner {
                order_id,
                customer_id,
            });
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use domain::{Customer, DomainError, OrderStatus};
    use order_store::{InMemoryCustomerRepository, InMemoryOrderRepository};

    use super::*;
    use crate::SagaConfig;
    use crate::channel::InMemoryChannel;

    type Service =
        OrderService<InMemoryOrderRepository, InMemoryCustomerRepository, InMemoryChannel>;

    async fn setup() -> (Service, CustomerId, CustomerId) {
        let customers = InMemoryCustomerRepository::new();
        let alice = customers.save(Customer::new("Alice's Taproom")).await.unwrap();
        let bob = customers.save(Customer::new("Bob's Bar")).await.unwrap();
        let manager = OrderSagaManager::new(
            InMemoryOrderRepository::new(),
            customers,
            InMemoryChannel::new(),
            SagaConfig::default(),
        );
        (OrderService::new(Arc::new(manager)), alice.id, bob.id)
    }

    fn request(quantity: u32) -> PlaceOrder {
        PlaceOrder {
            customer_ref: Some("table-4".to_string()),
            lines: vec![NewOrderLine::new("0631234200036", quantity)],
        }
    }

    #[tokio::test]
    async fn test_place_order() {
        let (service, alice, _) = setup().await;

        let order = service.place_order(alice, request(3)).await.unwrap();

        assert_eq!(order.customer_id, alice);
        assert_eq!(order.status, OrderStatus::ValidationPending);
        assert_eq!(order.customer_ref.as_deref(), Some("table-4"));
    }

    #[tokio::test]
    async fn test_place_order_unknown_customer() {
        let (service, _, _) = setup().await;
        let result = service.place_order(CustomerId::new(), request(1)).await;
        assert!(matches!(result, Err(SagaError::CustomerNotFound(_))));
    }

    #[tokio::test]
    async fn test_place_order_rejects_empty_lines() {
        let (service, alice, _) = setup().await;
        let result = service
            .place_order(
                alice,
                PlaceOrder {
                    customer_ref: None,
                    lines: vec![],
                },
            )
            .await;
        assert!(matches!(result, Err(SagaError::Domain(DomainError::NoLines))));
    }

    #[tokio::test]
    async fn test_get_order_checks_owner() {
        let (service, alice, bob) = setup().await;
        let order = service.place_order(alice, request(1)).await.unwrap();

        assert_eq!(service.get_order(alice, order.id).await.unwrap().id, order.id);
        assert!(matches!(
            service.get_order(bob, order.id).await,
            Err(SagaError::NotOrderOwner { .. })
        ));
        assert!(matches!(
            service.get_order(alice, OrderId::new()).await,
            Err(SagaError::OrderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_orders_pages() {
        let (service, alice, bob) = setup().await;
        for qty in 1..=3 {
            service.place_order(alice, request(qty)).await.unwrap();
        }
        service.place_order(bob, request(9)).await.unwrap();

        let page = service
            .list_orders(alice, PageRequest::new(0, 2))
            .await
            .unwrap();

        assert_eq!(page.orders.len(), 2);
        assert_eq!(page.total_elements, 3);
        assert!(page.orders.iter().all(|o| o.customer_id == alice));

        let last = service
            .list_orders(alice, PageRequest::new(1, 2))
            .await
            .unwrap();
        assert_eq!(last.orders.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_order_by_other_customer_is_refused() {
        let (service, alice, bob) = setup().await;
        let order = service.place_order(alice, request(1)).await.unwrap();

        let result = service.cancel_order(bob, order.id).await;

        assert!(matches!(result, Err(SagaError::NotOrderOwner { .. })));
        let order = service.get_order(alice, order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::ValidationPending);
    }

    #[tokio::test]
    async fn test_pickup_before_allocation_is_rejected() {
        let (service, alice, _) = setup().await;
        let order = service.place_order(alice, request(1)).await.unwrap();

        let outcome = service.pickup_order(alice, order.id).await.unwrap();

        assert!(matches!(outcome, FireOutcome::Rejected { .. }));
    }
}
