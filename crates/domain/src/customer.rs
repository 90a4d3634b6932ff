//! Customer record.

use common::CustomerId;
use serde::{Deserialize, Serialize};

/// A customer that owns orders.
///
/// The saga only checks that a customer exists before accepting an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
}

impl Customer {
    /// Creates a customer with a fresh identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CustomerId::new(),
            name: name.into(),
        }
    }
}
