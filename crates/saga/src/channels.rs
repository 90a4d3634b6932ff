//! Logical names of the message channels the saga talks on.

/// Outbound: ask the validator to check an order.
pub const VALIDATE_ORDER_REQUEST: &str = "validate-order-request";

/// Inbound: the validator's verdict.
pub const VALIDATE_ORDER_RESULT: &str = "validate-order-result";

/// Outbound: ask the allocator to reserve inventory.
pub const ALLOCATE_ORDER_REQUEST: &str = "allocate-order-request";

/// Inbound: the allocator's answer with per-line quantities.
pub const ALLOCATE_ORDER_RESULT: &str = "allocate-order-result";

/// Outbound: an order ended in allocation failure.
pub const ALLOCATION_FAILURE_NOTIFICATION: &str = "allocation-failure-notification";

/// Outbound: release inventory reserved for a cancelled order.
pub const DEALLOCATE_ORDER_REQUEST: &str = "deallocate-order-request";
