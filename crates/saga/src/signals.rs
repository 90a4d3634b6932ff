//! Commit notifications for order status changes.
//!
//! The status persister publishes every committed status here; the
//! orchestrator subscribes when it must not act before a status is durable.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use common::OrderId;
use domain::OrderStatus;
use tokio::sync::watch;

/// Result of waiting for an order to reach a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusWait {
    /// The awaited status was committed.
    Reached,
    /// The order reached a terminal status other than the awaited one.
    Superseded(OrderStatus),
    /// The wait gave up.
    TimedOut,
}

/// One `watch` channel per order that has live subscribers or recent commits.
#[derive(Default)]
pub struct StatusSignals {
    senders: Mutex<HashMap<OrderId, watch::Sender<Option<OrderStatus>>>>,
}

impl StatusSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a committed status.
    ///
    /// Terminal statuses are the last signal an order produces, so its
    /// channel is released after delivering them.
    pub fn publish(&self, order_id: OrderId, status: OrderStatus) {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);

        if status.is_terminal() {
            if let Some(tx) = senders.remove(&order_id) {
                tx.send_replace(Some(status));
            }
            return;
        }

        match senders.get(&order_id) {
            Some(tx) if tx.receiver_count() > 0 => {
                tx.send_replace(Some(status));
            }
            // Nobody listening; a later subscriber re-reads storage anyway.
            _ => {
                senders.remove(&order_id);
            }
        }
    }

    /// Subscribes to an order's committed statuses.
    ///
    /// Callers must re-read the persisted status after subscribing: the
    /// receiver only observes commits made from now on.
    pub fn subscribe(&self, order_id: OrderId) -> watch::Receiver<Option<OrderStatus>> {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        match senders.get(&order_id) {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = watch::channel(None);
                senders.insert(order_id, tx);
                rx
            }
        }
    }

    /// Number of orders with an open channel.
    pub fn len(&self) -> usize {
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_sees_published_status() {
        let signals = StatusSignals::new();
        let id = OrderId::new();
        let mut rx = signals.subscribe(id);

        signals.publish(id, OrderStatus::Validated);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Some(OrderStatus::Validated));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_keeps_no_channel() {
        let signals = StatusSignals::new();
        signals.publish(OrderId::new(), OrderStatus::Validated);
        assert!(signals.is_empty());
    }

    #[tokio::test]
    async fn test_terminal_status_releases_channel() {
        let signals = StatusSignals::new();
        let id = OrderId::new();
        let mut rx = signals.subscribe(id);

        signals.publish(id, OrderStatus::Cancelled);

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Some(OrderStatus::Cancelled));
        assert!(signals.is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_share_a_channel() {
        let signals = StatusSignals::new();
        let id = OrderId::new();
        let mut a = signals.subscribe(id);
        let mut b = signals.subscribe(id);
        assert_eq!(signals.len(), 1);

        signals.publish(id, OrderStatus::Allocated);

        a.changed().await.unwrap();
        b.changed().await.unwrap();
        assert_eq!(*b.borrow(), Some(OrderStatus::Allocated));
    }
}
