//! Domain error types.

use common::OrderLineId;
use thiserror::Error;

use crate::order::{OrderEvent, OrderStatus};

/// Errors raised by the order model and the transition table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// No transition is defined for this (status, event) pair.
    #[error("Invalid transition: {event} is not accepted in {status} status")]
    InvalidTransition {
        status: OrderStatus,
        event: OrderEvent,
    },

    /// The order has reached a terminal status and accepts no further events.
    #[error("Order is in terminal status {status}; {event} ignored")]
    TerminalStatus {
        status: OrderStatus,
        event: OrderEvent,
    },

    /// A transition was applied to an order whose status does not match its source.
    #[error("Stale transition: order is {actual}, transition expects {expected}")]
    StaleTransition {
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// Ordered quantity must be positive.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Allocated quantity must not exceed the ordered quantity.
    #[error("Allocation of {allocated} exceeds ordered quantity {ordered} on line {line_id}")]
    OverAllocation {
        line_id: OrderLineId,
        allocated: u32,
        ordered: u32,
    },

    /// An order needs at least one line.
    #[error("Order has no lines")]
    NoLines,

    /// A persisted status value could not be recognised.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}
