use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    checkout::{CheckoutIntent, PlacedOrder},
    dto::orders::{CheckoutIntentRequest, CompleteCheckoutRequest, OrderList},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/checkout/intent", post(checkout_intent))
        .route("/checkout/complete", post(checkout_complete))
        .route("/{id}", get(get_order))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by order status")
    ),
    responses(
        (status = 200, description = "List orders for current user", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = order_service::list_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/checkout/intent",
    request_body = CheckoutIntentRequest,
    responses(
        (status = 200, description = "Payment intent created", body = ApiResponse<CheckoutIntent>),
        (status = 400, description = "Empty cart or insufficient stock"),
        (status = 404, description = "Address not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn checkout_intent(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CheckoutIntentRequest>,
) -> AppResult<Json<ApiResponse<CheckoutIntent>>> {
    let resp = order_service::begin_checkout(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/orders/checkout/complete",
    request_body = CompleteCheckoutRequest,
    responses(
        (status = 200, description = "Order placed (idempotent per payment reference)", body = ApiResponse<PlacedOrder>),
        (status = 400, description = "Payment not successful"),
        (status = 409, description = "Inventory conflict"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn checkout_complete(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CompleteCheckoutRequest>,
) -> AppResult<Json<ApiResponse<PlacedOrder>>> {
    let resp = order_service::complete_checkout(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with items", body = ApiResponse<PlacedOrder>),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PlacedOrder>>> {
    let resp = order_service::get_order(&state, &user, id).await?;
    Ok(Json(resp))
}
