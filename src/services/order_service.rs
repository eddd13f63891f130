use serde_json::json;
use uuid::Uuid;

use crate::{
    audit::{self, AuditAction, AuditEntry},
    dto::{
        checkout::CheckoutRequest,
        orders::{OrderList, OrderListQuery},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Order,
    repositories::OrderFilter,
    response::{ApiResponse, Meta},
    routes::params::SortOrder,
    services::checkout_service::PlacedOrder,
    state::AppState,
};

pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<PlacedOrder>> {
    let placed = state.checkout.place_order(user.user_id, payload).await?;

    if !placed.duplicate {
        let order = &placed.order;
        audit::record(
            &state.pool,
            AuditEntry::new(user.user_id, AuditAction::OrderPlaced, "orders")
                .resource_id(order.id)
                .metadata(json!({
                    "reference": order.reference,
                    "grand_total": order.totals.grand_total,
                    "discount_code": order.discount_code,
                })),
        )
        .await;
    }

    let message = if placed.duplicate {
        "Order already placed"
    } else {
        "Order placed"
    };
    Ok(ApiResponse::success(message, placed, Some(Meta::empty())))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    list(state, Some(user.user_id), query).await
}

pub async fn get_order(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<ApiResponse<Order>> {
    let scope = if user.is_admin() {
        None
    } else {
        Some(user.user_id)
    };
    let order = state
        .orders
        .find(id, scope)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    list(state, None, query).await
}

async fn list(
    state: &AppState,
    owner_id: Option<Uuid>,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let filter = OrderFilter {
        owner_id,
        status: query.status,
        newest_first: query.sort_order.unwrap_or(SortOrder::Desc).newest_first(),
        limit: limit as u64,
        offset: offset as u64,
    };

    let (items, total) = state.orders.list(filter).await?;
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items },
        Some(Meta::paged(page, limit, total)),
    ))
}
