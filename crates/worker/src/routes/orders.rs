//! Operational order listing for reconciliation.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use domain::OrderStatus;
use order_store::OrderRepository;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared state of the operational endpoints.
pub struct AppState<R: OrderRepository> {
    pub orders: R,
}

#[derive(Deserialize)]
pub struct StatusQuery {
    pub status: String,
}

#[derive(Serialize)]
pub struct OrderSummary {
    pub id: String,
    pub customer_id: String,
    pub status: OrderStatus,
    pub version: i64,
    pub updated_at: String,
}

/// GET /admin/orders?status=ALLOCATION_PENDING — lists every order in a status.
pub async fn by_status<R: OrderRepository>(
    State(state): State<Arc<AppState<R>>>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<OrderSummary>>, ApiError> {
    let status: OrderStatus = query.status.parse()?;

    let mut orders = state.orders.find_all_by_status(status).await?;
    orders.sort_by_key(|o| o.updated_at());

    metrics::gauge!("saga_orders_in_status", "status" => status.as_str()).set(orders.len() as f64);
    tracing::debug!(%status, count = orders.len(), "orders listed by status");
    Ok(Json(
        orders
            .iter()
            .map(|o| OrderSummary {
                id: o.id().to_string(),
                customer_id: o.customer_id().to_string(),
                status: o.status(),
                version: o.version().as_i64(),
                updated_at: o.updated_at().to_rfc3339(),
            })
            .collect(),
    ))
}
