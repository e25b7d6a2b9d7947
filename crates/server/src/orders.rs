//! Order endpoints: checkout plus the order read paths.
//!
//! - `POST /api/pedidos`                    — place an order (checkout)
//! - `GET  /api/orders/{user_id}`           — order history with line counts
//! - `GET  /api/orders/detail/{order_id}`   — line items with product data
//! - `PUT  /api/orders/{order_id}/status`   — admin status update
//! - `GET  /api/admin/orders`               — all orders with customer identity
//!
//! The checkout route keeps the field names the existing frontend already
//! sends (`usuario_id`, `producto_id`, `cantidad`, `precio_unitario`) and
//! answers with `pedido_id`, so the static site works against this server
//! unchanged. The remaining routes are new surface and use English names.

use std::str::FromStr;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use panaderia_core::cart::{Cart, CartItem};
use panaderia_core::domain::order::{OrderId, OrderStatus};
use panaderia_core::domain::product::ProductId;
use panaderia_core::domain::user::UserId;
use panaderia_core::errors::{ApplicationError, DomainError};
use panaderia_core::money;
use panaderia_db::checkout::place_order;
use panaderia_db::repositories::{OrderStore, SqlOrderRepository};
use panaderia_db::DbPool;

use crate::respond::{self, ApiError, ApiMessage};

#[derive(Clone)]
pub struct OrdersState {
    db_pool: DbPool,
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub usuario_id: i64,
    pub items: Vec<CheckoutItem>,
    #[serde(default)]
    pub total: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutItem {
    pub producto_id: i64,
    pub cantidad: i64,
    pub precio_unitario: f64,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    pub pedido_id: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderSummaryDto {
    pub id: i64,
    pub total: f64,
    pub status: &'static str,
    pub created_at: String,
    pub item_count: i64,
}

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub success: bool,
    pub orders: Vec<OrderSummaryDto>,
}

#[derive(Debug, Serialize)]
pub struct OrderLineDto {
    pub product_id: i64,
    pub name: String,
    pub description: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub unit_price: f64,
    pub line_total: f64,
}

#[derive(Debug, Serialize)]
pub struct OrderDetailResponse {
    pub success: bool,
    pub order_id: i64,
    pub detail: Vec<OrderLineDto>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct AdminOrderDto {
    pub id: i64,
    pub user_id: i64,
    pub customer_name: String,
    pub customer_email: String,
    pub total: f64,
    pub status: &'static str,
    pub created_at: String,
    pub item_count: i64,
}

#[derive(Debug, Serialize)]
pub struct AdminOrdersResponse {
    pub success: bool,
    pub orders: Vec<AdminOrderDto>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(db_pool: DbPool) -> Router {
    Router::new()
        .route("/api/pedidos", post(create_order))
        // {id} is a user id on the listing route and an order id on the
        // status route; the router needs one spelling per position.
        .route("/api/orders/{id}", get(list_orders))
        .route("/api/orders/detail/{order_id}", get(order_detail))
        .route("/api/orders/{id}/status", put(update_status))
        .route("/api/admin/orders", get(admin_list_orders))
        .with_state(OrdersState { db_pool })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn create_order(
    State(state): State<OrdersState>,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, (StatusCode, Json<ApiError>)> {
    let cart = cart_from_wire(&body.items)
        .map_err(|error| respond::failure(ApplicationError::Domain(error)))?;

    // The client's total is advisory only: the server computes its own and
    // persists that. A mismatch is worth a log line, nothing more.
    if let Some(client_total) = body.total {
        let computed = cart.totals().total;
        if money::from_f64(client_total) != computed {
            warn!(
                event_name = "checkout.total_mismatch",
                user_id = body.usuario_id,
                client_total,
                computed_total = %computed,
                "client-supplied total disagrees with computed total"
            );
        }
    }

    let placed = place_order(&state.db_pool, UserId(body.usuario_id), &cart)
        .await
        .map_err(|error| respond::failure(error.into()))?;

    Ok(Json(CheckoutResponse { success: true, pedido_id: placed.order_id.0 }))
}

fn cart_from_wire(items: &[CheckoutItem]) -> Result<Cart, DomainError> {
    let mut cart_items = Vec::with_capacity(items.len());
    for item in items {
        let quantity = u32::try_from(item.cantidad)
            .map_err(|_| DomainError::InvalidQuantity(item.cantidad))?;
        cart_items.push(CartItem {
            product_id: ProductId(item.producto_id),
            // The wire payload carries no display name; checkout never needs one.
            name: String::new(),
            unit_price: money::from_f64(item.precio_unitario),
            quantity,
        });
    }
    Cart::from_items(cart_items)
}

async fn list_orders(
    Path(user_id): Path<i64>,
    State(state): State<OrdersState>,
) -> Result<Json<OrdersResponse>, (StatusCode, Json<ApiError>)> {
    let repo = SqlOrderRepository::new(state.db_pool.clone());
    let summaries = repo
        .list_for_user(UserId(user_id))
        .await
        .map_err(|error| respond::failure(error.into()))?;

    let orders = summaries
        .into_iter()
        .map(|summary| OrderSummaryDto {
            id: summary.order.id.0,
            total: money::to_f64(summary.order.total),
            status: summary.order.status.as_str(),
            created_at: summary.order.created_at.to_rfc3339(),
            item_count: summary.line_count,
        })
        .collect();

    Ok(Json(OrdersResponse { success: true, orders }))
}

async fn order_detail(
    Path(order_id): Path<i64>,
    State(state): State<OrdersState>,
) -> Result<Json<OrderDetailResponse>, (StatusCode, Json<ApiError>)> {
    let repo = SqlOrderRepository::new(state.db_pool.clone());

    let order = repo
        .find_by_id(OrderId(order_id))
        .await
        .map_err(|error| respond::failure(error.into()))?
        .ok_or_else(|| respond::failure(ApplicationError::not_found(format!("order {order_id}"))))?;

    let lines = repo
        .line_items(order.id)
        .await
        .map_err(|error| respond::failure(error.into()))?;

    let detail = lines
        .into_iter()
        .map(|detail| OrderLineDto {
            product_id: detail.line.product_id.0,
            quantity: detail.line.quantity,
            unit_price: money::to_f64(detail.line.unit_price),
            line_total: money::to_f64(detail.line.line_total()),
            name: detail.product_name,
            description: detail.product_description,
            image: detail.product_image,
        })
        .collect();

    Ok(Json(OrderDetailResponse { success: true, order_id, detail }))
}

async fn update_status(
    Path(order_id): Path<i64>,
    State(state): State<OrdersState>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<ApiMessage>, (StatusCode, Json<ApiError>)> {
    let status = OrderStatus::from_str(&body.status)
        .map_err(|error| respond::failure(ApplicationError::Domain(error)))?;

    let repo = SqlOrderRepository::new(state.db_pool.clone());
    let updated = repo
        .update_status(OrderId(order_id), status)
        .await
        .map_err(|error| respond::failure(error.into()))?;

    if !updated {
        return Err(respond::failure(ApplicationError::not_found(format!("order {order_id}"))));
    }

    Ok(Json(ApiMessage::new(format!("order status updated to {}", status.as_str()))))
}

async fn admin_list_orders(
    State(state): State<OrdersState>,
) -> Result<Json<AdminOrdersResponse>, (StatusCode, Json<ApiError>)> {
    let repo = SqlOrderRepository::new(state.db_pool.clone());
    let summaries = repo.list_all().await.map_err(|error| respond::failure(error.into()))?;

    let orders = summaries
        .into_iter()
        .map(|summary| AdminOrderDto {
            id: summary.order.id.0,
            user_id: summary.order.user_id.0,
            customer_name: summary.customer_name,
            customer_email: summary.customer_email,
            total: money::to_f64(summary.order.total),
            status: summary.order.status.as_str(),
            created_at: summary.order.created_at.to_rfc3339(),
            item_count: summary.line_count,
        })
        .collect();

    Ok(Json(AdminOrdersResponse { success: true, orders }))
}
