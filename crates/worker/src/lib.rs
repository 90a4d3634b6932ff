//! Order saga worker.
//!
//! Wires the orchestrator to a message channel, consumes validation and
//! allocation results, optionally runs in-process stand-ins for the external
//! services, and serves operational endpoints with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{CustomerRepository, OrderRepository};
use saga::{
    InMemoryAllocationService, InMemoryChannel, InMemoryValidationService, OrderSagaManager,
    OrderService, ResultListener, SagaConfig,
};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum router with the operational routes.
pub fn create_app<R: OrderRepository + 'static>(
    state: Arc<AppState<R>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/admin/orders", get(routes::orders::by_status::<R>))
        .with_state(state)
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http())
}

/// A running saga: orchestrator plus its background tasks.
pub struct Worker<R, Cu>
where
    R: OrderRepository + Clone,
    Cu: CustomerRepository,
{
    manager: Arc<OrderSagaManager<R, Cu, InMemoryChannel>>,
    channel: InMemoryChannel,
    tasks: Vec<JoinHandle<()>>,
}

impl<R, Cu> Worker<R, Cu>
where
    R: OrderRepository + Clone + 'static,
    Cu: CustomerRepository + 'static,
{
    /// Builds the orchestrator and starts the result listeners, plus the
    /// in-process validation and allocation services when `demo_services`
    /// is set. Must be called inside a Tokio runtime.
    pub fn start(orders: R, customers: Cu, saga: SagaConfig, demo_services: bool) -> Self {
        let channel = InMemoryChannel::new();
        let manager = Arc::new(OrderSagaManager::new(
            orders,
            customers,
            channel.clone(),
            saga,
        ));

        let mut tasks = ResultListener::new(manager.clone()).spawn(&channel);
        if demo_services {
            tasks.push(InMemoryValidationService::new(channel.clone()).spawn());
            tasks.extend(InMemoryAllocationService::new(channel.clone()).spawn());
            tracing::info!("in-process validation and allocation services started");
        }
        tracing::info!(tasks = tasks.len(), "saga worker started");

        Self {
            manager,
            channel,
            tasks,
        }
    }

    pub fn manager(&self) -> &Arc<OrderSagaManager<R, Cu, InMemoryChannel>> {
        &self.manager
    }

    pub fn channel(&self) -> &InMemoryChannel {
        &self.channel
    }

    /// Customer-facing operations on the running saga.
    pub fn order_service(&self) -> OrderService<R, Cu, InMemoryChannel> {
        OrderService::new(self.manager.clone())
    }

    /// State for [`create_app`].
    pub fn app_state(&self) -> Arc<AppState<R>> {
        Arc::new(AppState {
            orders: self.manager.orders().clone(),
        })
    }

    /// Stops the background tasks.
    pub async fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        for task in self.tasks {
            // Aborted tasks report cancellation.
            let _ = task.await;
        }
        tracing::info!("saga worker stopped");
    }
}
