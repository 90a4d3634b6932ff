//! Saga orchestration for order fulfillment.
//!
//! An order passes through two externally performed steps, validation and
//! inventory allocation, before it can be picked up. Each step is a request
//! published on a message channel and a result consumed asynchronously:
//!
//! 1. `create_order` persists the order at `NEW` and fires `VALIDATE_ORDER`
//! 2. a validation result fires `VALIDATION_PASSED` / `VALIDATION_FAILED`;
//!    on pass the orchestrator waits for `VALIDATED` and fires `ALLOCATE_ORDER`
//! 3. an allocation result fires `ALLOCATION_SUCCESS`,
//!    `ALLOCATION_NO_INVENTORY` or `ALLOCATION_FAILED`; the allocated
//!    quantities are saved together with the new status
//! 4. pick-up and cancellation are fired on demand; cancelling an order that
//!    holds inventory publishes a deallocation request as compensation
//!
//! Every event is evaluated against the order's persisted status under a
//! per-order lock, so events for one order never interleave.

pub mod actions;
pub mod channel;
pub mod channels;
pub mod config;
pub mod error;
pub mod listeners;
pub mod locks;
pub mod manager;
pub mod messages;
pub mod order_service;
pub mod persister;
pub mod services;
pub mod signals;

pub use actions::OutboundActions;
pub use channel::{ChannelError, InMemoryChannel, MessageChannel, MessageChannelExt, MessageStream};
pub use config::SagaConfig;
pub use error::SagaError;
pub use listeners::ResultListener;
pub use locks::OrderLocks;
pub use manager::{FireOutcome, OrderSagaManager};
pub use messages::{
    AllocateOrderRequest, AllocateOrderResult, AllocationFailureEvent, AllocationOutcome,
    DeallocateOrderRequest, OrderDto, OrderLineDto, ValidateOrderRequest, ValidateOrderResult,
};
pub use order_service::{OrderPage, OrderService, PlaceOrder};
pub use persister::StatusPersister;
pub use services::{InMemoryAllocationService, InMemoryValidationService};
pub use signals::{StatusSignals, StatusWait};
