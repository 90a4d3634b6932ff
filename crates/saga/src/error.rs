//! Saga error types.

use common::{CustomerId, OrderId};
use domain::DomainError;
use order_store::OrderStoreError;
use thiserror::Error;

use crate::channel::ChannelError;

/// Errors that can occur during saga operations.
///
/// Only order creation and the customer-facing service surface these to
/// callers; event handling logs them and reports a [`FireOutcome`](crate::FireOutcome).
#[derive(Debug, Error)]
pub enum SagaError {
    /// Customer not found.
    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order belongs to a different customer.
    #[error("Order {order_id} does not belong to customer {customer_id}")]
    NotOrderOwner {
        order_id: OrderId,
        customer_id: CustomerId,
    },

    /// The order cannot start the saga.
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Order store error.
    #[error("Order store error: {0}")]
    Store(#[from] OrderStoreError),

    /// Message channel error.
    #[error("Message channel error: {0}")]
    Channel(#[from] ChannelError),
}

impl SagaError {
    /// Returns true if the failure was an optimistic concurrency conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SagaError::Store(e) if e.is_conflict())
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
