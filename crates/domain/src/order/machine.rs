//! The order saga transition table.
//!
//! The table is plain data: each row maps a (status, event) pair to the next
//! status and at most one outbound action. There is no resident state machine
//! object; callers look up a row against the order's persisted status every
//! time an event arrives, so any process can service any order.

use serde::{Deserialize, Serialize};

use super::{OrderEvent, OrderStatus};
use crate::error::DomainError;

/// Side effect attached to a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SagaAction {
    /// Publish a validation request for the order.
    ValidateOrder,
    /// Publish an allocation request for the order.
    AllocateOrder,
    /// Publish a deallocation request (compensation for a prior allocation).
    DeallocateOrder,
    /// Publish an allocation-failure notification.
    NotifyAllocationFailure,
}

impl SagaAction {
    /// Returns the action name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaAction::ValidateOrder => "validate_order",
            SagaAction::AllocateOrder => "allocate_order",
            SagaAction::DeallocateOrder => "deallocate_order",
            SagaAction::NotifyAllocationFailure => "notify_allocation_failure",
        }
    }
}

impl std::fmt::Display for SagaAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: OrderStatus,
    pub event: OrderEvent,
    pub to: OrderStatus,
    pub action: Option<SagaAction>,
}

impl Transition {
    const fn new(
        from: OrderStatus,
        event: OrderEvent,
        to: OrderStatus,
        action: Option<SagaAction>,
    ) -> Self {
        Self {
            from,
            event,
            to,
            action,
        }
    }
}

use super::OrderEvent as E;
use super::OrderStatus as S;

/// Every legal transition. A pair missing from this table is rejected.
///
/// Cancellation is spelled out per source status; the rows leaving a status
/// that holds inventory carry the deallocation compensation.
pub const TRANSITIONS: &[Transition] = &[
    Transition::new(
        S::New,
        E::ValidateOrder,
        S::ValidationPending,
        Some(SagaAction::ValidateOrder),
    ),
    Transition::new(S::ValidationPending, E::ValidationPassed, S::Validated, None),
    Transition::new(
        S::ValidationPending,
        E::ValidationFailed,
        S::ValidationException,
        None,
    ),
    Transition::new(
        S::Validated,
        E::AllocateOrder,
        S::AllocationPending,
        Some(SagaAction::AllocateOrder),
    ),
    Transition::new(S::AllocationPending, E::AllocationSuccess, S::Allocated, None),
    Transition::new(
        S::AllocationPending,
        E::AllocationNoInventory,
        S::PendingInventory,
        None,
    ),
    Transition::new(
        S::AllocationPending,
        E::AllocationFailed,
        S::AllocationException,
        Some(SagaAction::NotifyAllocationFailure),
    ),
    Transition::new(S::Allocated, E::PickedUp, S::PickedUp, None),
    Transition::new(S::New, E::CancelOrder, S::Cancelled, None),
    Transition::new(S::ValidationPending, E::CancelOrder, S::Cancelled, None),
    Transition::new(S::Validated, E::CancelOrder, S::Cancelled, None),
    Transition::new(S::AllocationPending, E::CancelOrder, S::Cancelled, None),
    Transition::new(
        S::PendingInventory,
        E::CancelOrder,
        S::Cancelled,
        Some(SagaAction::DeallocateOrder),
    ),
    Transition::new(
        S::Allocated,
        E::CancelOrder,
        S::Cancelled,
        Some(SagaAction::DeallocateOrder),
    ),
];

/// Looks up the transition for `event` fired while the order is in `status`.
///
/// Terminal statuses reject every event with [`DomainError::TerminalStatus`];
/// any other missing pair yields [`DomainError::InvalidTransition`]. Both are
/// expected races (duplicate or late delivery) rather than defects.
pub fn transition(status: OrderStatus, event: OrderEvent) -> Result<Transition, DomainError> {
    if status.is_terminal() {
        return Err(DomainError::TerminalStatus { status, event });
    }

    TRANSITIONS
        .iter()
        .find(|t| t.from == status && t.event == event)
        .copied()
        .ok_or(DomainError::InvalidTransition { status, event })
}
