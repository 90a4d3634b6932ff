//! Saga orchestrator: the single entry point for every order event.

use std::sync::Arc;
use std::time::Instant;

use common::OrderId;
use domain::{Order, OrderEvent, OrderStatus, SagaAction, transition};
use order_store::{CustomerRepository, OrderRepository};

use crate::actions::OutboundActions;
use crate::channel::MessageChannel;
use crate::config::SagaConfig;
use crate::error::{Result, SagaError};
use crate::locks::OrderLocks;
use crate::messages::OrderDto;
use crate::persister::StatusPersister;
use crate::signals::{StatusSignals, StatusWait};

/// What happened to a fired event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireOutcome {
    /// The event was accepted and the new status committed.
    Transitioned {
        from: OrderStatus,
        to: OrderStatus,
        action: Option<SagaAction>,
    },
    /// The event is not legal in the order's current status; nothing changed.
    Rejected {
        status: OrderStatus,
        event: OrderEvent,
    },
    /// No order with that id exists.
    NotFound,
    /// The action or the status write failed; the status is unchanged.
    Failed { reason: String },
}

impl FireOutcome {
    pub fn is_transitioned(&self) -> bool {
        matches!(self, FireOutcome::Transitioned { .. })
    }
}

/// Drives orders through the fulfillment saga.
///
/// Every event is evaluated against the order's persisted status while
/// holding that order's lock: read, look up the transition, run its action,
/// persist the target status. A version conflict from storage re-runs the
/// whole cycle up to `max_conflict_retries` times.
pub struct OrderSagaManager<R, Cu, C>
where
    R: OrderRepository + Clone,
    Cu: CustomerRepository,
    C: MessageChannel,
{
    orders: R,
    customers: Cu,
    persister: StatusPersister<R>,
    actions: OutboundActions<R, C>,
    locks: OrderLocks,
    signals: Arc<StatusSignals>,
    config: SagaConfig,
}

impl<R, Cu, C> OrderSagaManager<R, Cu, C>
where
    R: OrderRepository + Clone,
    Cu: CustomerRepository,
    C: MessageChannel,
{
    /// Creates a new orchestrator.
    pub fn new(orders: R, customers: Cu, channel: C, config: SagaConfig) -> Self {
        let signals = Arc::new(StatusSignals::new());
        Self {
            persister: StatusPersister::new(orders.clone(), signals.clone()),
            actions: OutboundActions::new(orders.clone(), channel),
            orders,
            customers,
            locks: OrderLocks::new(),
            signals,
            config,
        }
    }

    pub fn orders(&self) -> &R {
        &self.orders
    }

    pub fn customers(&self) -> &Cu {
        &self.customers
    }

    /// Persists a new order at `NEW` and starts validation.
    ///
    /// Returns the order as stored after `VALIDATE_ORDER` was processed.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id()))]
    pub async fn create_order(&self, order: Order) -> Result<Order> {
        if !order.version().is_initial() || order.status() != OrderStatus::New {
            return Err(SagaError::InvalidOrder(format!(
                "order {} is already saved (status {}, version {})",
                order.id(),
                order.status(),
                order.version()
            )));
        }

        let customer_id = order.customer_id();
        self.customers
            .find_by_id(customer_id)
            .await?
            .ok_or(SagaError::CustomerNotFound(customer_id))?;

        let saved = self.orders.save(order).await?;
        let order_id = saved.id();
        metrics::counter!("saga_orders_created_total").increment(1);
        tracing::info!(%customer_id, "order created");

        let outcome = self.fire(order_id, OrderEvent::ValidateOrder).await;
        if !outcome.is_transitioned() {
            tracing::warn!(?outcome, "validation not started");
        }

        self.orders
            .find_by_id(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))
    }

    /// Handles the validation service's verdict.
    ///
    /// On success, waits for `VALIDATED` to commit and then requests
    /// allocation. Returns the outcome of the validation event.
    #[tracing::instrument(skip(self))]
    pub async fn process_validation_result(&self, order_id: OrderId, is_valid: bool) -> FireOutcome {
        if !is_valid {
            return self.fire(order_id, OrderEvent::ValidationFailed).await;
        }

        let outcome = self.fire(order_id, OrderEvent::ValidationPassed).await;
        if !outcome.is_transitioned() {
            return outcome;
        }

        match self.await_status(order_id, OrderStatus::Validated).await {
            StatusWait::Reached => {
                self.fire(order_id, OrderEvent::AllocateOrder).await;
            }
            StatusWait::Superseded(status) => {
                tracing::info!(%status, "order left the saga before allocation");
            }
            StatusWait::TimedOut => {
                tracing::warn!("validated status not observed, allocation not requested");
            }
        }
        outcome
    }

    /// Handles a full allocation.
    pub async fn on_allocation_success(&self, order: OrderDto) -> FireOutcome {
        self.on_allocation(order, OrderEvent::AllocationSuccess, OrderStatus::Allocated)
            .await
    }

    /// Handles a partial allocation.
    pub async fn on_allocation_pending_inventory(&self, order: OrderDto) -> FireOutcome {
        self.on_allocation(
            order,
            OrderEvent::AllocationNoInventory,
            OrderStatus::PendingInventory,
        )
        .await
    }

    /// Handles a failed allocation. No quantities are recorded.
    pub async fn on_allocation_failed(&self, order: OrderDto) -> FireOutcome {
        self.fire(order.id, OrderEvent::AllocationFailed).await
    }

    /// Marks an allocated order as picked up.
    pub async fn pick_up(&self, order_id: OrderId) -> FireOutcome {
        self.fire(order_id, OrderEvent::PickedUp).await
    }

    /// Cancels an order, releasing its inventory if it holds any.
    pub async fn cancel(&self, order_id: OrderId) -> FireOutcome {
        self.fire(order_id, OrderEvent::CancelOrder).await
    }

    /// Loads an order.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.find_by_id(order_id).await?)
    }

    /// Fires one event against an order.
    ///
    /// Never returns an error: failures are logged and reported as
    /// [`FireOutcome::Failed`] with the persisted status untouched.
    pub async fn fire(&self, order_id: OrderId, event: OrderEvent) -> FireOutcome {
        self.fire_with(order_id, event, None).await
    }

    /// Fires an event, recording `allocation` in the same save as the
    /// status change.
    #[tracing::instrument(skip(self, event, allocation), fields(event = %event))]
    async fn fire_with(
        &self,
        order_id: OrderId,
        event: OrderEvent,
        allocation: Option<&OrderDto>,
    ) -> FireOutcome {
        metrics::counter!("saga_events_total", "event" => event.as_str()).increment(1);

        let mut attempt = 0;
        loop {
            let result = {
                let _guard = self.locks.acquire(order_id).await;
                self.try_fire(order_id, event, allocation).await
            };

            match result {
                Ok(outcome) => return outcome,
                Err(e) if e.is_conflict() && attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %e, "version conflict, retrying");
                }
                Err(e) => {
                    metrics::counter!("saga_events_rejected_total", "reason" => "failed")
                        .increment(1);
                    tracing::error!(error = %e, "event processing failed");
                    return FireOutcome::Failed {
                        reason: e.to_string(),
                    };
                }
            }
        }
    }

    async fn try_fire(
        &self,
        order_id: OrderId,
        event: OrderEvent,
        allocation: Option<&OrderDto>,
    ) -> Result<FireOutcome> {
        let Some(mut order) = self.orders.find_by_id(order_id).await? else {
            metrics::counter!("saga_events_rejected_total", "reason" => "not_found").increment(1);
            tracing::warn!("order not found");
            return Ok(FireOutcome::NotFound);
        };

        let from = order.status();
        let t = match transition(from, event) {
            Ok(t) => t,
            Err(e) => {
                if from.is_terminal() {
                    metrics::counter!("saga_events_rejected_total", "reason" => "terminal")
                        .increment(1);
                    tracing::info!(%from, "event ignored: {e}");
                } else {
                    metrics::counter!("saga_events_rejected_total", "reason" => "invalid_transition")
                        .increment(1);
                    tracing::warn!(%from, "event rejected: {e}");
                }
                return Ok(FireOutcome::Rejected {
                    status: from,
                    event,
                });
            }
        };

        if let Some(allocation) = allocation {
            match order.apply_allocation(allocation.allocations()) {
                Ok(changed) => tracing::debug!(lines = changed, "allocated quantities applied"),
                Err(e) => tracing::warn!(error = %e, "allocation rejected, quantities not recorded"),
            }
        }
        if let Some(action) = t.action {
            self.actions.execute(action, order_id).await?;
        }
        self.persister.persist(order, &t).await?;

        metrics::counter!(
            "saga_transitions_total",
            "from" => from.as_str(),
            "to" => t.to.as_str()
        )
        .increment(1);
        tracing::info!(%from, to = %t.to, "transition applied");

        Ok(FireOutcome::Transitioned {
            from,
            to: t.to,
            action: t.action,
        })
    }

    async fn on_allocation(
        &self,
        order: OrderDto,
        event: OrderEvent,
        target: OrderStatus,
    ) -> FireOutcome {
        let order_id = order.id;
        let outcome = self.fire_with(order_id, event, Some(&order)).await;

        match &outcome {
            FireOutcome::Transitioned { .. } => match self.await_status(order_id, target).await {
                StatusWait::Reached => {
                    tracing::debug!(%order_id, %target, "allocation committed");
                }
                StatusWait::Superseded(status) => {
                    tracing::info!(%order_id, %status, "order moved on after allocation");
                }
                StatusWait::TimedOut => {
                    tracing::warn!(%order_id, %target, "allocation commit not observed, status wait timed out");
                }
            },
            // Redelivered result: re-applying the same quantities is harmless.
            FireOutcome::Rejected { status, .. } if *status == target => {
                self.update_allocated_quantities(&order, target).await;
            }
            FireOutcome::Rejected { .. } | FireOutcome::NotFound | FireOutcome::Failed { .. } => {}
        }
        outcome
    }

    /// Waits until `target` is committed or can no longer happen.
    async fn await_status(&self, order_id: OrderId, target: OrderStatus) -> StatusWait {
        let started = Instant::now();
        let mut rx = self.signals.subscribe(order_id);

        let current = match self.orders.find_by_id(order_id).await {
            Ok(order) => order.map(|o| o.status()),
            Err(e) => {
                tracing::warn!(%order_id, error = %e, "status re-check failed");
                None
            }
        };

        let result = match current {
            Some(status) if status == target => StatusWait::Reached,
            Some(status) if status.is_terminal() => StatusWait::Superseded(status),
            _ => {
                let waited = tokio::time::timeout(self.config.status_wait_timeout, async {
                    rx.wait_for(|s| s.is_some_and(|s| s == target || s.is_terminal()))
                        .await
                        .map(|status| *status)
                })
                .await;

                match waited {
                    Ok(Ok(Some(status))) if status == target => StatusWait::Reached,
                    Ok(Ok(Some(status))) => StatusWait::Superseded(status),
                    _ => {
                        metrics::counter!("saga_status_wait_timeouts_total").increment(1);
                        StatusWait::TimedOut
                    }
                }
            }
        };

        metrics::histogram!("saga_status_wait_seconds").record(started.elapsed().as_secs_f64());
        tracing::debug!(%order_id, %target, ?result, "status wait finished");
        result
    }

    async fn update_allocated_quantities(&self, allocation: &OrderDto, target: OrderStatus) {
        let order_id = allocation.id;
        let mut attempt = 0;
        loop {
            let result = {
                let _guard = self.locks.acquire(order_id).await;
                self.try_update_allocated_quantities(allocation, target)
                    .await
            };

            match result {
                Ok(()) => return,
                Err(e) if e.is_conflict() && attempt < self.config.max_conflict_retries => {
                    attempt += 1;
                    tracing::warn!(%order_id, attempt, "version conflict, retrying allocation update");
                }
                Err(e) => {
                    tracing::error!(%order_id, error = %e, "allocation update failed");
                    return;
                }
            }
        }
    }

    async fn try_update_allocated_quantities(
        &self,
        allocation: &OrderDto,
        target: OrderStatus,
    ) -> Result<()> {
        let order_id = allocation.id;
        let Some(mut order) = self.orders.find_by_id(order_id).await? else {
            tracing::error!(%order_id, "order not found, allocation update skipped");
            return Ok(());
        };

        if order.status() != target {
            tracing::info!(%order_id, status = %order.status(), "order moved on, allocation update skipped");
            return Ok(());
        }

        match order.apply_allocation(allocation.allocations()) {
            Ok(0) => {
                tracing::debug!(%order_id, "allocation unchanged");
            }
            Ok(changed) => {
                self.orders.save(order).await?;
                tracing::info!(%order_id, lines = changed, "allocated quantities recorded");
            }
            Err(e) => {
                tracing::warn!(%order_id, error = %e, "allocation rejected");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use common::CustomerId;
    use domain::{Customer, NewOrderLine};
    use order_store::{InMemoryCustomerRepository, InMemoryOrderRepository, PageRequest};

    use super::*;
    use crate::channel::InMemoryChannel;
    use crate::channels;

    /// Repository where another writer bumps the stored order right before
    /// each of the next `n` saves, so the save loses the version check.
    #[derive(Clone, Default)]
    struct ConcurrentWriterRepository {
        inner: InMemoryOrderRepository,
        interleaved_writes: Arc<AtomicU32>,
    }

    #[async_trait]
    impl OrderRepository for ConcurrentWriterRepository {
        async fn find_by_id(&self, id: OrderId) -> order_store::Result<Option<Order>> {
            self.inner.find_by_id(id).await
        }

        async fn save(&self, order: Order) -> order_store::Result<Order> {
            let pending = self.interleaved_writes.load(Ordering::SeqCst);
            if pending > 0 {
                self.interleaved_writes.store(pending - 1, Ordering::SeqCst);
                if let Some(mut stored) = self.inner.find_by_id(order.id()).await? {
                    let bumped = stored.version().next();
                    stored.mark_persisted(bumped, Utc::now());
                    self.inner.force_put(stored).await;
                }
            }
            self.inner.save(order).await
        }

        async fn find_by_customer(
            &self,
            customer_id: CustomerId,
            page: PageRequest,
        ) -> order_store::Result<Vec<Order>> {
            self.inner.find_by_customer(customer_id, page).await
        }

        async fn count_by_customer(&self, customer_id: CustomerId) -> order_store::Result<u64> {
            self.inner.count_by_customer(customer_id).await
        }

        async fn find_all_by_status(&self, status: OrderStatus) -> order_store::Result<Vec<Order>> {
            self.inner.find_all_by_status(status).await
        }
    }

    type Manager<R> = OrderSagaManager<R, InMemoryCustomerRepository, InMemoryChannel>;

    async fn manager_with<R: OrderRepository + Clone>(
        orders: R,
    ) -> (Manager<R>, InMemoryChannel, CustomerId) {
        let customers = InMemoryCustomerRepository::new();
        let customer = customers.save(Customer::new("Test Room")).await.unwrap();
        let channel = InMemoryChannel::new();
        let config = SagaConfig::default().with_status_wait_timeout(Duration::from_millis(200));
        (
            OrderSagaManager::new(orders, customers, channel.clone(), config),
            channel,
            customer.id,
        )
    }

    fn new_order(customer_id: CustomerId) -> Order {
        Order::new(customer_id, None, vec![NewOrderLine::new("SKU-1", 5)]).unwrap()
    }

    #[tokio::test]
    async fn test_create_order_starts_validation() {
        let (manager, channel, customer_id) = manager_with(InMemoryOrderRepository::new()).await;

        let order = manager.create_order(new_order(customer_id)).await.unwrap();

        assert_eq!(order.status(), OrderStatus::ValidationPending);
        assert_eq!(channel.published_count(channels::VALIDATE_ORDER_REQUEST), 1);
    }

    #[tokio::test]
    async fn test_create_order_requires_customer() {
        let (manager, _, _) = manager_with(InMemoryOrderRepository::new()).await;
        let stranger = CustomerId::new();

        let result = manager.create_order(new_order(stranger)).await;

        assert!(matches!(result, Err(SagaError::CustomerNotFound(id)) if id == stranger));
        assert_eq!(manager.orders().order_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_order_rejects_saved_order() {
        let (manager, _, customer_id) = manager_with(InMemoryOrderRepository::new()).await;
        let order = manager.create_order(new_order(customer_id)).await.unwrap();

        let result = manager.create_order(order).await;

        assert!(matches!(result, Err(SagaError::InvalidOrder(_))));
    }

    #[tokio::test]
    async fn test_fire_unknown_order() {
        let (manager, _, _) = manager_with(InMemoryOrderRepository::new()).await;
        let outcome = manager.fire(OrderId::new(), OrderEvent::CancelOrder).await;
        assert_eq!(outcome, FireOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_fire_rejects_illegal_event() {
        let (manager, _, customer_id) = manager_with(InMemoryOrderRepository::new()).await;
        let order = manager.create_order(new_order(customer_id)).await.unwrap();

        let outcome = manager.pick_up(order.id()).await;

        assert_eq!(
            outcome,
            FireOutcome::Rejected {
                status: OrderStatus::ValidationPending,
                event: OrderEvent::PickedUp,
            }
        );
    }

    #[tokio::test]
    async fn test_fire_retries_version_conflict() {
        let repo = ConcurrentWriterRepository::default();
        let (manager, _, customer_id) = manager_with(repo.clone()).await;
        let order = manager.create_order(new_order(customer_id)).await.unwrap();

        repo.interleaved_writes.store(2, Ordering::SeqCst);
        let outcome = manager.cancel(order.id()).await;

        assert!(outcome.is_transitioned());
        let stored = repo.find_by_id(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_fire_gives_up_after_retry_budget() {
        let repo = ConcurrentWriterRepository::default();
        let (manager, channel, customer_id) = manager_with(repo.clone()).await;
        let order = manager.create_order(new_order(customer_id)).await.unwrap();

        repo.interleaved_writes.store(10, Ordering::SeqCst);
        let outcome = manager.cancel(order.id()).await;

        assert!(matches!(outcome, FireOutcome::Failed { ref reason } if reason.contains("conflict")));
        let stored = repo.inner.find_by_id(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::ValidationPending);
        assert!(stored.version() > order.version());
        assert_eq!(channel.published_count(channels::DEALLOCATE_ORDER_REQUEST), 0);
    }

    #[tokio::test]
    async fn test_validation_pass_requests_allocation() {
        let (manager, channel, customer_id) = manager_with(InMemoryOrderRepository::new()).await;
        let order = manager.create_order(new_order(customer_id)).await.unwrap();

        let outcome = manager.process_validation_result(order.id(), true).await;

        assert!(outcome.is_transitioned());
        let stored = manager.get_order(order.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::AllocationPending);
        assert_eq!(channel.published_count(channels::ALLOCATE_ORDER_REQUEST), 1);
    }

    #[tokio::test]
    async fn test_await_status_times_out() {
        let (manager, _, customer_id) = manager_with(InMemoryOrderRepository::new()).await;
        let order = manager.create_order(new_order(customer_id)).await.unwrap();

        let wait = manager.await_status(order.id(), OrderStatus::Allocated).await;

        assert_eq!(wait, StatusWait::TimedOut);
    }

    #[tokio::test]
    async fn test_await_status_sees_later_commit() {
        let (manager, _, customer_id) = manager_with(InMemoryOrderRepository::new()).await;
        let manager = Arc::new(manager);
        let order = manager.create_order(new_order(customer_id)).await.unwrap();

        let waiter = {
            let manager = manager.clone();
            let order_id = order.id();
            tokio::spawn(async move { manager.await_status(order_id, OrderStatus::Validated).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.fire(order.id(), OrderEvent::ValidationPassed).await;

        assert_eq!(waiter.await.unwrap(), StatusWait::Reached);
    }

    #[tokio::test]
    async fn test_await_status_superseded_by_terminal() {
        let (manager, _, customer_id) = manager_with(InMemoryOrderRepository::new()).await;
        let order = manager.create_order(new_order(customer_id)).await.unwrap();
        manager.cancel(order.id()).await;

        let wait = manager.await_status(order.id(), OrderStatus::Validated).await;

        assert_eq!(wait, StatusWait::Superseded(OrderStatus::Cancelled));
    }
}
