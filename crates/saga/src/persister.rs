//! Status persistence for saga transitions.

use std::sync::Arc;

use domain::{Order, Transition};
use order_store::OrderRepository;

use crate::error::Result;
use crate::signals::StatusSignals;

/// Writes the target status of an accepted transition to storage.
///
/// This is the only code path that changes an order's status. Once the
/// save commits, waiters on [`StatusSignals`] are notified.
pub struct StatusPersister<R: OrderRepository> {
    orders: R,
    signals: Arc<StatusSignals>,
}

impl<R: OrderRepository> StatusPersister<R> {
    pub fn new(orders: R, signals: Arc<StatusSignals>) -> Self {
        Self { orders, signals }
    }

    /// Applies the transition to the order and saves it.
    ///
    /// Fails without writing if the order is no longer in the transition's
    /// source status; a storage failure leaves the persisted status as it was.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id()))]
    pub async fn persist(&self, mut order: Order, transition: &Transition) -> Result<Order> {
        order.apply_transition(transition)?;

        let saved = self.orders.save(order).await?;

        self.signals.publish(saved.id(), saved.status());
        tracing::debug!(
            from = %transition.from,
            to = %transition.to,
            version = saved.version().as_i64(),
            "status persisted"
        );
        Ok(saved)
    }
}
