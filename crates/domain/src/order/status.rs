//! Order lifecycle statuses.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The status of an order in its lifecycle.
///
/// Status flow:
/// ```text
/// New ──► ValidationPending ──┬──► Validated ──► AllocationPending ──┬──► Allocated ──► PickedUp
///                             │                                      ├──► PendingInventory
///                             └──► ValidationException               └──► AllocationException
///
/// Any non-terminal status ──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order was accepted and persisted, validation not yet requested.
    #[default]
    New,

    /// Validation request sent, awaiting the validator's answer.
    ValidationPending,

    /// Validator accepted the order.
    Validated,

    /// Validator rejected the order (terminal).
    ValidationException,

    /// Allocation request sent, awaiting the allocator's answer.
    AllocationPending,

    /// Every line is fully allocated.
    Allocated,

    /// Allocator failed (terminal).
    AllocationException,

    /// Some lines could only be partially allocated.
    PendingInventory,

    /// Customer collected the order (terminal).
    PickedUp,

    /// Order was cancelled (terminal).
    Cancelled,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [OrderStatus; 10] = [
        OrderStatus::New,
        OrderStatus::ValidationPending,
        OrderStatus::Validated,
        OrderStatus::ValidationException,
        OrderStatus::AllocationPending,
        OrderStatus::Allocated,
        OrderStatus::AllocationException,
        OrderStatus::PendingInventory,
        OrderStatus::PickedUp,
        OrderStatus::Cancelled,
    ];

    /// Returns true if no further events are accepted in this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::PickedUp
                | OrderStatus::Cancelled
                | OrderStatus::ValidationException
                | OrderStatus::AllocationException
        )
    }

    /// Returns true if inventory is (at least partially) reserved for the order.
    pub fn holds_inventory(&self) -> bool {
        matches!(self, OrderStatus::Allocated | OrderStatus::PendingInventory)
    }

    /// Returns the status name as stored and sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::ValidationPending => "VALIDATION_PENDING",
            OrderStatus::Validated => "VALIDATED",
            OrderStatus::ValidationException => "VALIDATION_EXCEPTION",
            OrderStatus::AllocationPending => "ALLOCATION_PENDING",
            OrderStatus::Allocated => "ALLOCATED",
            OrderStatus::AllocationException => "ALLOCATION_EXCEPTION",
            OrderStatus::PendingInventory => "PENDING_INVENTORY",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_new() {
        assert_eq!(OrderStatus::default(), OrderStatus::New);
    }

    #[test]
    fn test_terminal_statuses() {
        let terminal: Vec<_> = OrderStatus::ALL
            .into_iter()
            .filter(OrderStatus::is_terminal)
            .collect();
        assert_eq!(
            terminal,
            vec![
                OrderStatus::ValidationException,
                OrderStatus::AllocationException,
                OrderStatus::PickedUp,
                OrderStatus::Cancelled,
            ]
        );
    }

    #[test]
    fn test_holds_inventory() {
        assert!(OrderStatus::Allocated.holds_inventory());
        assert!(OrderStatus::PendingInventory.holds_inventory());
        assert!(!OrderStatus::AllocationPending.holds_inventory());
        assert!(!OrderStatus::PickedUp.holds_inventory());
    }

    #[test]
    fn test_parse_matches_display() {
        for status in OrderStatus::ALL {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
        assert_eq!(
            "SHIPPED".parse::<OrderStatus>(),
            Err(DomainError::UnknownStatus("SHIPPED".to_string()))
        );
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&OrderStatus::PendingInventory).unwrap();
        assert_eq!(json, "\"PENDING_INVENTORY\"");
    }
}
