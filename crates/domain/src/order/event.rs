//! Saga events that drive order status changes.

use serde::{Deserialize, Serialize};

/// A signal fed into the transition table.
///
/// Events are the only legal trigger for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEvent {
    ValidateOrder,
    ValidationPassed,
    ValidationFailed,
    AllocateOrder,
    AllocationSuccess,
    AllocationNoInventory,
    AllocationFailed,
    #[serde(rename = "BEER_ORDER_PICKED_UP")]
    PickedUp,
    CancelOrder,
}

impl OrderEvent {
    /// All events.
    pub const ALL: [OrderEvent; 9] = [
        OrderEvent::ValidateOrder,
        OrderEvent::ValidationPassed,
        OrderEvent::ValidationFailed,
        OrderEvent::AllocateOrder,
        OrderEvent::AllocationSuccess,
        OrderEvent::AllocationNoInventory,
        OrderEvent::AllocationFailed,
        OrderEvent::PickedUp,
        OrderEvent::CancelOrder,
    ];

    /// Returns the event name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderEvent::ValidateOrder => "VALIDATE_ORDER",
            OrderEvent::ValidationPassed => "VALIDATION_PASSED",
            OrderEvent::ValidationFailed => "VALIDATION_FAILED",
            OrderEvent::AllocateOrder => "ALLOCATE_ORDER",
            OrderEvent::AllocationSuccess => "ALLOCATION_SUCCESS",
            OrderEvent::AllocationNoInventory => "ALLOCATION_NO_INVENTORY",
            OrderEvent::AllocationFailed => "ALLOCATION_FAILED",
            OrderEvent::PickedUp => "BEER_ORDER_PICKED_UP",
            OrderEvent::CancelOrder => "CANCEL_ORDER",
        }
    }
}

impl std::fmt::Display for OrderEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
