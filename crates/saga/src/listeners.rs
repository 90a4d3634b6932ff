//! Inbound event translators.
//!
//! Decode results from the validation and allocation services and hand
//! them to the orchestrator.

use std::sync::Arc;

use futures_util::StreamExt;
use order_store::{CustomerRepository, OrderRepository};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::channel::MessageChannel;
use crate::channels;
use crate::manager::{FireOutcome, OrderSagaManager};
use crate::messages::{AllocateOrderResult, AllocationOutcome, ValidateOrderResult};

/// Routes result messages to an [`OrderSagaManager`].
pub struct ResultListener<R, Cu, C>
where
    R: OrderRepository + Clone,
    Cu: CustomerRepository,
    C: MessageChannel,
{
    manager: Arc<OrderSagaManager<R, Cu, C>>,
}

impl<R, Cu, C> Clone for ResultListener<R, Cu, C>
where
    R: OrderRepository + Clone,
    Cu: CustomerRepository,
    C: MessageChannel,
{
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
        }
    }
}

impl<R, Cu, C> ResultListener<R, Cu, C>
where
    R: OrderRepository + Clone + 'static,
    Cu: CustomerRepository + 'static,
    C: MessageChannel + 'static,
{
    pub fn new(manager: Arc<OrderSagaManager<R, Cu, C>>) -> Self {
        Self { manager }
    }

    /// Handles a validation result.
    pub async fn on_validation_result(&self, result: ValidateOrderResult) -> FireOutcome {
        tracing::debug!(order_id = %result.order_id, is_valid = result.is_valid, "validation result received");
        self.manager
            .process_validation_result(result.order_id, result.is_valid)
            .await
    }

    /// Handles an allocation result, routing on its outcome.
    pub async fn on_allocation_result(&self, result: AllocateOrderResult) -> FireOutcome {
        let outcome = result.outcome();
        tracing::debug!(order_id = %result.order.id, ?outcome, "allocation result received");
        match outcome {
            AllocationOutcome::Allocated => self.manager.on_allocation_success(result.order).await,
            AllocationOutcome::PendingInventory => {
                self.manager
                    .on_allocation_pending_inventory(result.order)
                    .await
            }
            AllocationOutcome::Failed => self.manager.on_allocation_failed(result.order).await,
        }
    }

    /// Decodes and dispatches a raw message. Malformed payloads are dropped.
    pub async fn handle(&self, channel: &str, payload: Value) -> Option<FireOutcome> {
        match channel {
            channels::VALIDATE_ORDER_RESULT => match serde_json::from_value(payload) {
                Ok(result) => Some(self.on_validation_result(result).await),
                Err(e) => {
                    tracing::error!(channel, error = %e, "malformed message dropped");
                    None
                }
            },
            channels::ALLOCATE_ORDER_RESULT => match serde_json::from_value(payload) {
                Ok(result) => Some(self.on_allocation_result(result).await),
                Err(e) => {
                    tracing::error!(channel, error = %e, "malformed message dropped");
                    None
                }
            },
            _ => {
                tracing::warn!(channel, "no handler for channel");
                None
            }
        }
    }

    /// Subscribes to both result channels and processes every message on
    /// its own task. Returns the subscription tasks.
    pub fn spawn<M: MessageChannel + ?Sized>(&self, channel: &M) -> Vec<JoinHandle<()>> {
        [channels::VALIDATE_ORDER_RESULT, channels::ALLOCATE_ORDER_RESULT]
            .into_iter()
            .map(|name| {
                let mut stream = channel.subscribe(name);
                let listener = self.clone();
                tokio::spawn(async move {
                    tracing::info!(channel = name, "listener started");
                    while let Some(payload) = stream.next().await {
                        let listener = listener.clone();
                        tokio::spawn(async move {
                            listener.handle(name, payload).await;
                        });
                    }
                    tracing::info!(channel = name, "listener stopped");
                })
            })
            .collect()
    }
}
