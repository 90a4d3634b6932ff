//! Domain layer for the order saga.
//!
//! This crate provides:
//! - The `Order` / `OrderLine` model and the `Customer` record
//! - The closed `OrderStatus` set and the `OrderEvent` signals
//! - The transition table mapping (status, event) to (next status, action)
//!
//! Everything here is synchronous and free of I/O. The saga crate drives
//! events through [`transition`] and persists the results.

pub mod customer;
pub mod error;
pub mod order;

pub use customer::Customer;
pub use error::DomainError;
pub use order::{
    NewOrderLine, Order, OrderEvent, OrderLine, OrderParts, OrderStatus, ProductId, SagaAction,
    TRANSITIONS, Transition, transition,
};
