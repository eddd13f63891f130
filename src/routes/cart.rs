use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use serde_json::json;

use crate::{
    dto::cart::AddToCartRequest,
    error::AppResult,
    middleware::auth::AuthUser,
    models::CartLine,
    response::{ApiResponse, Meta},
    services::cart_service::CartView,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(cart_list).post(add_to_cart).delete(clear_cart))
        .route("/{product_id}", delete(remove_from_cart))
        .route("/{product_id}/increment", post(increment_line))
        .route("/{product_id}/decrement", post(decrement_line))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart lines for current user", body = ApiResponse<CartView>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_list(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let view = state.carts.list(user.user_id).await?;
    let meta = Meta::new(1, view.lines.len() as i64, view.lines.len() as i64);
    Ok(Json(ApiResponse::success("OK", view, Some(meta))))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Add product or raise its quantity", body = ApiResponse<CartLine>),
        (status = 400, description = "Unknown or inactive product, bad quantity"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartLine>>> {
    let line = state
        .carts
        .add(user.user_id, payload.product_id, payload.quantity)
        .await?;
    Ok(Json(ApiResponse::success("OK", line, None)))
}

#[utoipa::path(
    post,
    path = "/api/cart/{product_id}/increment",
    params(("product_id" = i64, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Quantity raised by one", body = ApiResponse<CartLine>),
        (status = 404, description = "Product not in cart"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn increment_line(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<i64>,
) -> AppResult<Json<ApiResponse<CartLine>>> {
    let line = state.carts.increment(user.user_id, product_id).await?;
    Ok(Json(ApiResponse::success("OK", line, None)))
}

#[utoipa::path(
    post,
    path = "/api/cart/{product_id}/decrement",
    params(("product_id" = i64, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Quantity lowered by one, never below 1", body = ApiResponse<CartLine>),
        (status = 404, description = "Product not in cart"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn decrement_line(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<i64>,
) -> AppResult<Json<ApiResponse<CartLine>>> {
    let line = state.carts.decrement(user.user_id, product_id).await?;
    Ok(Json(ApiResponse::success("OK", line, None)))
}

#[utoipa::path(
    delete,
    path = "/api/cart/{product_id}",
    params(("product_id" = i64, Path, description = "Product ID")),
    responses(
        (status = 200, description = "OK", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Cart item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<i64>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    state.carts.remove(user.user_id, product_id).await?;
    Ok(Json(ApiResponse::success(
        "Removed from cart",
        json!({ "product_id": product_id }),
        Some(Meta::empty()),
    )))
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart emptied; clearing an empty cart is fine", body = ApiResponse<serde_json::Value>),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let removed = state.carts.clear(user.user_id).await?;
    Ok(Json(ApiResponse::success(
        "Cart cleared",
        json!({ "removed": removed }),
        Some(Meta::empty()),
    )))
}
