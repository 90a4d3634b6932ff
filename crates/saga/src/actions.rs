//! Outbound action handlers.
//!
//! Each action re-reads the order from storage, translates it to the
//! request shape of the external service and publishes it. Delivery is
//! fire-and-forget; consumers of the requests must tolerate duplicates.

use common::OrderId;
use domain::{Order, SagaAction};
use order_store::OrderRepository;

use crate::channel::{MessageChannel, MessageChannelExt};
use crate::channels;
use crate::error::Result;
use crate::messages::{
    AllocateOrderRequest, AllocationFailureEvent, DeallocateOrderRequest, OrderDto,
    ValidateOrderRequest,
};

/// Publishes the request attached to a transition.
pub struct OutboundActions<R, C> {
    orders: R,
    channel: C,
}

impl<R, C> OutboundActions<R, C>
where
    R: OrderRepository,
    C: MessageChannel,
{
    pub fn new(orders: R, channel: C) -> Self {
        Self { orders, channel }
    }

    /// Executes an action for an order.
    ///
    /// A missing order is logged and skipped. A publish failure is returned
    /// so the caller can abandon the transition.
    #[tracing::instrument(skip(self, action), fields(action = %action))]
    pub async fn execute(&self, action: SagaAction, order_id: OrderId) -> Result<()> {
        let Some(order) = self.orders.find_by_id(order_id).await? else {
            tracing::error!(%order_id, "order not found, action skipped");
            return Ok(());
        };

        match action {
            SagaAction::ValidateOrder => self.send_validation_request(&order).await?,
            SagaAction::AllocateOrder => self.send_allocation_request(&order).await?,
            SagaAction::DeallocateOrder => self.send_deallocation_request(&order).await?,
            SagaAction::NotifyAllocationFailure => self.send_allocation_failure(&order).await?,
        }
        Ok(())
    }

    async fn send_validation_request(&self, order: &Order) -> Result<()> {
        let request = ValidateOrderRequest {
            order: OrderDto::from(order),
        };
        self.send(channels::VALIDATE_ORDER_REQUEST, &request).await
    }

    async fn send_allocation_request(&self, order: &Order) -> Result<()> {
        let request = AllocateOrderRequest {
            order: OrderDto::from(order),
        };
        self.send(channels::ALLOCATE_ORDER_REQUEST, &request).await
    }

    async fn send_deallocation_request(&self, order: &Order) -> Result<()> {
        let request = DeallocateOrderRequest {
            order: OrderDto::from(order),
        };
        self.send(channels::DEALLOCATE_ORDER_REQUEST, &request).await
    }

    async fn send_allocation_failure(&self, order: &Order) -> Result<()> {
        let event = AllocationFailureEvent {
            order_id: order.id(),
        };
        self.send(channels::ALLOCATION_FAILURE_NOTIFICATION, &event)
            .await
    }

    async fn send<T>(&self, channel: &'static str, message: &T) -> Result<()>
    where
        T: serde::Serialize + Sync,
    {
        self.channel.publish_message(channel, message).await?;
        metrics::counter!("saga_outbound_messages_total", "channel" => channel).increment(1);
        tracing::info!(channel, "request sent");
        Ok(())
    }
}
