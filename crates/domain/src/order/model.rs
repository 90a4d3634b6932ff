//! Order and order line model.

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId, OrderLineId, Version};
use serde::{Deserialize, Serialize};

use super::{OrderStatus, Transition};
use crate::error::DomainError;

/// Product identifier (SKU or UPC).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A line requested when placing an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl NewOrderLine {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A line of an order.
///
/// Invariant: `0 <= quantity_allocated <= order_quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    id: OrderLineId,
    product_id: ProductId,
    order_quantity: u32,
    quantity_allocated: u32,
}

impl OrderLine {
    /// Creates an unallocated line. The quantity must be positive.
    pub fn new(product_id: impl Into<ProductId>, order_quantity: u32) -> Result<Self, DomainError> {
        Self::restore(OrderLineId::new(), product_id.into(), order_quantity, 0)
    }

    /// Rebuilds a line from stored fields, re-checking its invariants.
    pub fn restore(
        id: OrderLineId,
        product_id: ProductId,
        order_quantity: u32,
        quantity_allocated: u32,
    ) -> Result<Self, DomainError> {
        if order_quantity == 0 {
            return Err(DomainError::InvalidQuantity {
                quantity: order_quantity,
            });
        }
        if quantity_allocated > order_quantity {
            return Err(DomainError::OverAllocation {
                line_id: id,
                allocated: quantity_allocated,
                ordered: order_quantity,
            });
        }
        Ok(Self {
            id,
            product_id,
            order_quantity,
            quantity_allocated,
        })
    }

    pub fn id(&self) -> OrderLineId {
        self.id
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn order_quantity(&self) -> u32 {
        self.order_quantity
    }

    pub fn quantity_allocated(&self) -> u32 {
        self.quantity_allocated
    }

    /// Returns true if the whole ordered quantity is allocated.
    pub fn is_fully_allocated(&self) -> bool {
        self.quantity_allocated == self.order_quantity
    }

    fn check_allocation(&self, allocated: u32) -> Result<(), DomainError> {
        if allocated > self.order_quantity {
            return Err(DomainError::OverAllocation {
                line_id: self.id,
                allocated,
                ordered: self.order_quantity,
            });
        }
        Ok(())
    }
}

/// Stored fields of an order, used by repositories to rebuild an [`Order`].
#[derive(Debug, Clone)]
pub struct OrderParts {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub customer_ref: Option<String>,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order moving through the fulfillment saga.
///
/// The status can only change through [`Order::apply_transition`]; allocated
/// quantities only through [`Order::apply_allocation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    customer_ref: Option<String>,
    status: OrderStatus,
    lines: Vec<OrderLine>,
    version: Version,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new, unsaved order in `New` status.
    pub fn new(
        customer_id: CustomerId,
        customer_ref: Option<String>,
        lines: Vec<NewOrderLine>,
    ) -> Result<Self, DomainError> {
        if lines.is_empty() {
            return Err(DomainError::NoLines);
        }

        let lines = lines
            .into_iter()
            .map(|line| OrderLine::new(line.product_id, line.quantity))
            .collect::<Result<Vec<_>, _>>()?;

        let now = Utc::now();
        Ok(Self {
            id: OrderId::new(),
            customer_id,
            customer_ref,
            status: OrderStatus::New,
            lines,
            version: Version::initial(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    /// Free-form customer reference carried to the external services.
    pub fn customer_ref(&self) -> Option<&str> {
        self.customer_ref.as_deref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn line(&self, line_id: OrderLineId) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns true if every line is fully allocated.
    pub fn is_fully_allocated(&self) -> bool {
        self.lines.iter().all(OrderLine::is_fully_allocated)
    }

    /// Moves the order to the transition's target status.
    ///
    /// Fails with [`DomainError::StaleTransition`] if the order is no longer
    /// in the transition's source status.
    pub fn apply_transition(&mut self, transition: &Transition) -> Result<(), DomainError> {
        if self.status != transition.from {
            return Err(DomainError::StaleTransition {
                expected: transition.from,
                actual: self.status,
            });
        }
        self.status = transition.to;
        Ok(())
    }

    /// Sets the allocated quantity of the identified lines.
    ///
    /// Quantities replace the current values, so re-applying the same
    /// allocation is harmless. Unknown line ids are skipped. All quantities
    /// are checked before any is written; one over-allocation rejects the
    /// whole update. Returns the number of lines whose value changed.
    pub fn apply_allocation<I>(&mut self, allocations: I) -> Result<usize, DomainError>
    where
        I: IntoIterator<Item = (OrderLineId, u32)>,
    {
        let allocations: Vec<_> = allocations.into_iter().collect();

        for (line_id, allocated) in &allocations {
            if let Some(line) = self.line(*line_id) {
                line.check_allocation(*allocated)?;
            }
        }

        let mut changed = 0;
        for (line_id, allocated) in allocations {
            if let Some(line) = self.lines.iter_mut().find(|l| l.id == line_id)
                && line.quantity_allocated != allocated
            {
                line.quantity_allocated = allocated;
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Records the outcome of a successful save. Called by repositories.
    pub fn mark_persisted(&mut self, version: Version, at: DateTime<Utc>) {
        self.version = version;
        self.updated_at = at;
    }
}

impl From<OrderParts> for Order {
    fn from(parts: OrderParts) -> Self {
        Self {
            id: parts.id,
            customer_id: parts.customer_id,
            customer_ref: parts.customer_ref,
            status: parts.status,
            lines: parts.lines,
            version: parts.version,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderEvent, transition};

    fn order_with(quantities: &[u32]) -> Order {
        let lines = quantities
            .iter()
            .enumerate()
            .map(|(i, q)| NewOrderLine::new(format!("SKU-{i:03}"), *q))
            .collect();
        Order::new(CustomerId::new(), None, lines).unwrap()
    }

    #[test]
    fn test_new_order_starts_unsaved_in_new_status() {
        let order = order_with(&[3]);
        assert_eq!(order.status(), OrderStatus::New);
        assert!(order.version().is_initial());
        assert_eq!(order.lines()[0].quantity_allocated(), 0);
    }

    #[test]
    fn test_new_order_requires_lines() {
        assert_eq!(
            Order::new(CustomerId::new(), None, vec![]),
            Err(DomainError::NoLines)
        );
    }

    #[test]
    fn test_new_order_rejects_zero_quantity() {
        let result = Order::new(
            CustomerId::new(),
            None,
            vec![NewOrderLine::new("SKU-001", 0)],
        );
        assert_eq!(result, Err(DomainError::InvalidQuantity { quantity: 0 }));
    }

    #[test]
    fn test_apply_transition_moves_status() {
        let mut order = order_with(&[1]);
        let t = transition(OrderStatus::New, OrderEvent::ValidateOrder).unwrap();
        order.apply_transition(&t).unwrap();
        assert_eq!(order.status(), OrderStatus::ValidationPending);
    }

    #[test]
    fn test_apply_transition_rejects_stale_source() {
        let mut order = order_with(&[1]);
        let t = transition(OrderStatus::Validated, OrderEvent::AllocateOrder).unwrap();
        assert_eq!(
            order.apply_transition(&t),
            Err(DomainError::StaleTransition {
                expected: OrderStatus::Validated,
                actual: OrderStatus::New,
            })
        );
        assert_eq!(order.status(), OrderStatus::New);
    }

    #[test]
    fn test_apply_allocation_is_idempotent() {
        let mut order = order_with(&[3, 2]);
        let first = order.lines()[0].id();
        assert_eq!(order.apply_allocation([(first, 2)]).unwrap(), 1);
        assert_eq!(order.apply_allocation([(first, 2)]).unwrap(), 0);
        assert_eq!(order.line(first).unwrap().quantity_allocated(), 2);
        assert!(!order.is_fully_allocated());
    }

    #[test]
    fn test_apply_allocation_rejects_over_allocation_atomically() {
        let mut order = order_with(&[3, 2]);
        let (a, b) = (order.lines()[0].id(), order.lines()[1].id());

        let result = order.apply_allocation([(a, 3), (b, 5)]);

        assert_eq!(
            result,
            Err(DomainError::OverAllocation {
                line_id: b,
                allocated: 5,
                ordered: 2,
            })
        );
        assert_eq!(order.line(a).unwrap().quantity_allocated(), 0);
    }

    #[test]
    fn test_apply_allocation_skips_unknown_lines() {
        let mut order = order_with(&[1]);
        assert_eq!(order.apply_allocation([(OrderLineId::new(), 1)]).unwrap(), 0);
    }

    #[test]
    fn test_restore_line_checks_invariants() {
        let id = OrderLineId::new();
        assert!(OrderLine::restore(id, "SKU".into(), 2, 2).is_ok());
        assert!(OrderLine::restore(id, "SKU".into(), 2, 3).is_err());
        assert!(OrderLine::restore(id, "SKU".into(), 0, 0).is_err());
    }
}
