//! Messages exchanged with the validation and allocation services.

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId, OrderLineId};
use domain::{Order, OrderStatus};
use serde::{Deserialize, Serialize};

/// Wire form of an order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineDto {
    pub id: OrderLineId,
    #[serde(alias = "upc")]
    pub product_id: String,
    pub order_quantity: u32,
    #[serde(default)]
    pub quantity_allocated: u32,
}

/// Wire form of an order, re-derived from storage before every publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDto {
    pub id: OrderId,
    pub customer_id: CustomerId,
    #[serde(default)]
    pub customer_ref: Option<String>,
    pub status: OrderStatus,
    pub lines: Vec<OrderLineDto>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl OrderDto {
    /// Per-line allocated quantities carried by the message.
    pub fn allocations(&self) -> impl Iterator<Item = (OrderLineId, u32)> + '_ {
        self.lines.iter().map(|l| (l.id, l.quantity_allocated))
    }
}

impl From<&Order> for OrderDto {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id(),
            customer_id: order.customer_id(),
            customer_ref: order.customer_ref().map(str::to_string),
            status: order.status(),
            lines: order
                .lines()
                .iter()
                .map(|line| OrderLineDto {
                    id: line.id(),
                    product_id: line.product_id().to_string(),
                    order_quantity: line.order_quantity(),
                    quantity_allocated: line.quantity_allocated(),
                })
                .collect(),
            created_at: Some(order.created_at()),
            updated_at: Some(order.updated_at()),
        }
    }
}

/// Published on `validate-order-request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateOrderRequest {
    pub order: OrderDto,
}

/// Consumed from `validate-order-result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateOrderResult {
    pub order_id: OrderId,
    pub is_valid: bool,
}

/// Published on `allocate-order-request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocateOrderRequest {
    pub order: OrderDto,
}

/// How an allocation attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationOutcome {
    Allocated,
    PendingInventory,
    Failed,
}

/// Consumed from `allocate-order-result`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocateOrderResult {
    pub order: OrderDto,
    #[serde(default)]
    pub allocation_error: bool,
    #[serde(default)]
    pub pending_inventory: bool,
}

impl AllocateOrderResult {
    /// Classifies the result. An error wins over the pending flag.
    pub fn outcome(&self) -> AllocationOutcome {
        match (self.allocation_error, self.pending_inventory) {
            (true, _) => AllocationOutcome::Failed,
            (false, true) => AllocationOutcome::PendingInventory,
            (false, false) => AllocationOutcome::Allocated,
        }
    }
}

/// Published on `deallocate-order-request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeallocateOrderRequest {
    pub order: OrderDto,
}

/// Published on `allocation-failure-notification`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationFailureEvent {
    pub order_id: OrderId,
}
