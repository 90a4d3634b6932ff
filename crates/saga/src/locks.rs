//! Per-order mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use common::OrderId;
use tokio::sync::OwnedMutexGuard;

const PRUNE_THRESHOLD: usize = 256;

/// Arena of async mutexes keyed by order id.
///
/// Holding the guard returned by [`OrderLocks::acquire`] serializes every
/// read-evaluate-write cycle for that order within this process. Different
/// orders never contend.
#[derive(Default)]
pub struct OrderLocks {
    locks: Mutex<HashMap<OrderId, Arc<tokio::sync::Mutex<()>>>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to an order.
    pub async fn acquire(&self, order_id: OrderId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            if locks.len() > PRUNE_THRESHOLD {
                // Entries referenced only by the map are idle.
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            locks.entry(order_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of tracked orders.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
