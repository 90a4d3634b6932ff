//! Shared identifier and versioning types for the order saga system.

pub mod types;

pub use types::{CustomerId, OrderId, OrderLineId, Version};
