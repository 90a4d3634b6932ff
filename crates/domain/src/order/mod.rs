//! Order model, lifecycle statuses, events, and the transition table.

mod event;
mod machine;
mod model;
mod status;

pub use event::OrderEvent;
pub use machine::{SagaAction, TRANSITIONS, Transition, transition};
pub use model::{NewOrderLine, Order, OrderLine, OrderParts, ProductId};
pub use status::OrderStatus;
