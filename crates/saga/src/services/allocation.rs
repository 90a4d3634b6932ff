//! In-memory allocation service.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use common::OrderId;
use futures_util::StreamExt;
use tokio::task::JoinHandle;

use super::{DONT_ALLOCATE, FAIL_ALLOCATION, PARTIAL_ALLOCATION};
use crate::channel::{ChannelError, MessageChannel, MessageChannelExt};
use crate::channels;
use crate::messages::{AllocateOrderRequest, AllocateOrderResult, DeallocateOrderRequest};

#[derive(Debug, Default)]
struct AllocationState {
    allocation_requests: usize,
    deallocations: HashMap<OrderId, usize>,
}

/// Answers allocation requests and records deallocations.
///
/// Lines are fully allocated unless the customer reference asks for a
/// partial allocation, a failure, or silence.
#[derive(Clone)]
pub struct InMemoryAllocationService<C> {
    channel: C,
    state: Arc<RwLock<AllocationState>>,
}

impl<C> InMemoryAllocationService<C>
where
    C: MessageChannel + Clone + 'static,
{
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            state: Arc::new(RwLock::new(AllocationState::default())),
        }
    }

    /// Number of allocation requests received.
    pub fn requests_received(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .allocation_requests
    }

    /// Number of deallocation requests received for an order.
    pub fn deallocation_count(&self, order_id: OrderId) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .deallocations
            .get(&order_id)
            .copied()
            .unwrap_or(0)
    }

    /// Number of deallocation requests received for all orders.
    pub fn total_deallocations(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .deallocations
            .values()
            .sum()
    }

    /// Handles one allocation request, publishing the result unless told to
    /// stay silent.
    pub async fn respond(
        &self,
        request: AllocateOrderRequest,
    ) -> Result<Option<AllocateOrderResult>, ChannelError> {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .allocation_requests += 1;

        let mut order = request.order;
        let customer_ref = order.customer_ref.clone();
        let result = match customer_ref.as_deref() {
            Some(DONT_ALLOCATE) => {
                tracing::debug!(order_id = %order.id, "allocation withheld");
                return Ok(None);
            }
            Some(FAIL_ALLOCATION) => AllocateOrderResult {
                order,
                allocation_error: true,
                pending_inventory: false,
            },
            Some(PARTIAL_ALLOCATION) => {
                for line in &mut order.lines {
                    line.quantity_allocated = line.order_quantity.saturating_sub(1);
                }
                AllocateOrderResult {
                    order,
                    allocation_error: false,
                    pending_inventory: true,
                }
            }
            _ => {
                for line in &mut order.lines {
                    line.quantity_allocated = line.order_quantity;
                }
                AllocateOrderResult {
                    order,
                    allocation_error: false,
                    pending_inventory: false,
                }
            }
        };

        self.channel
            .publish_message(channels::ALLOCATE_ORDER_RESULT, &result)
            .await?;
        Ok(Some(result))
    }

    /// Records a deallocation request.
    pub fn deallocate(&self, request: DeallocateOrderRequest) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state.deallocations.entry(request.order.id).or_default() += 1;
        tracing::debug!(order_id = %request.order.id, "inventory released");
    }

    /// Serves allocation and deallocation requests until the channel closes.
    pub fn spawn(&self) -> Vec<JoinHandle<()>> {
        let mut allocations = self.channel.subscribe(channels::ALLOCATE_ORDER_REQUEST);
        let mut deallocations = self.channel.subscribe(channels::DEALLOCATE_ORDER_REQUEST);

        let service = self.clone();
        let allocate = tokio::spawn(async move {
            while let Some(payload) = allocations.next().await {
                match serde_json::from_value::<AllocateOrderRequest>(payload) {
                    Ok(request) => {
                        if let Err(e) = service.respond(request).await {
                            tracing::error!(error = %e, "allocation result not sent");
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "malformed allocation request dropped"),
                }
            }
        });

        let service = self.clone();
        let deallocate = tokio::spawn(async move {
            while let Some(payload) = deallocations.next().await {
                match serde_json::from_value::<DeallocateOrderRequest>(payload) {
                    Ok(request) => service.deallocate(request),
                    Err(e) => tracing::error!(error = %e, "malformed deallocation request dropped"),
                }
            }
        });

        vec![allocate, deallocate]
    }
}
