use sea_orm::{
    ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

use crate::checkout::{CheckoutIntent, PlacedOrder};
use crate::dto::orders::{CheckoutIntentRequest, CompleteCheckoutRequest, OrderList};
use crate::{
    audit::log_audit,
    entity::{
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        orders::{Column as OrderCol, Entity as Orders},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

use crate::checkout::pg::{order_from_entity, order_item_from_entity};

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(OrderCol::OrderStatus.eq(status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<PlacedOrder>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        PlacedOrder {
            order: order_from_entity(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Phase 1: create a payment intent for the current cart. No local state
/// changes; safe to retry.
pub async fn begin_checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutIntentRequest,
) -> AppResult<ApiResponse<CheckoutIntent>> {
    let intent = state
        .checkout
        .begin_checkout(user.user_id, payload.address_id, &payload.payment_method)
        .await?;

    Ok(ApiResponse::success(
        "Payment intent created",
        intent,
        Some(Meta::empty()),
    ))
}

/// Phase 2: verify payment and commit the order. Idempotent per payment
/// reference; replays return the already-placed order.
pub async fn complete_checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CompleteCheckoutRequest,
) -> AppResult<ApiResponse<PlacedOrder>> {
    let placed = state
        .checkout
        .complete_checkout(user.user_id, &payload.payment_reference, payload.address_id)
        .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "checkout_complete",
        Some("orders"),
        Some(serde_json::json!({ "order_id": placed.order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order placed successfully",
        placed,
        Some(Meta::empty()),
    ))
}
