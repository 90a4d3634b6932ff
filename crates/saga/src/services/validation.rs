//! In-memory validation service.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::task::JoinHandle;

use super::{DONT_VALIDATE, FAIL_VALIDATION};
use crate::channel::{ChannelError, MessageChannel, MessageChannelExt};
use crate::channels;
use crate::messages::{ValidateOrderRequest, ValidateOrderResult};

/// Answers validation requests published on the channel.
///
/// Every order is valid unless its customer reference says otherwise.
#[derive(Clone)]
pub struct InMemoryValidationService<C> {
    channel: C,
    requests: Arc<AtomicUsize>,
}

impl<C> InMemoryValidationService<C>
where
    C: MessageChannel + Clone + 'static,
{
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of validation requests received.
    pub fn requests_received(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Handles one request, publishing the result unless told to stay silent.
    pub async fn respond(
        &self,
        request: ValidateOrderRequest,
    ) -> Result<Option<ValidateOrderResult>, ChannelError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let customer_ref = request.order.customer_ref.as_deref();
        if customer_ref == Some(DONT_VALIDATE) {
            tracing::debug!(order_id = %request.order.id, "validation withheld");
            return Ok(None);
        }

        let result = ValidateOrderResult {
            order_id: request.order.id,
            is_valid: customer_ref != Some(FAIL_VALIDATION),
        };
        self.channel
            .publish_message(channels::VALIDATE_ORDER_RESULT, &result)
            .await?;
        Ok(Some(result))
    }

    /// Serves requests from the channel until it closes.
    pub fn spawn(&self) -> JoinHandle<()> {
        let mut requests = self.channel.subscribe(channels::VALIDATE_ORDER_REQUEST);
        let service = self.clone();
        tokio::spawn(async move {
            while let Some(payload) = requests.next().await {
                let request: ValidateOrderRequest = match serde_json::from_value(payload) {
                    Ok(request) => request,
                    Err(e) => {
                        tracing::error!(error = %e, "malformed validation request dropped");
                        continue;
                    }
                };
                if let Err(e) = service.respond(request).await {
                    tracing::error!(error = %e, "validation result not sent");
                }
            }
        })
    }
}
