use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use rust_decimal::Decimal;

use crate::{
    dto::checkout::{PromoCheck, PromoCheckRequest, Quote, QuoteQuery},
    error::AppResult,
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/promo", post(check_promo))
        .route("/quote", get(quote))
}

#[utoipa::path(
    post,
    path = "/api/checkout/promo",
    request_body = PromoCheckRequest,
    responses(
        (status = 200, description = "Promo outcome and totals for the current cart", body = ApiResponse<PromoCheck>),
        (status = 503, description = "Discount store unavailable"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn check_promo(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PromoCheckRequest>,
) -> AppResult<Json<ApiResponse<PromoCheck>>> {
    let quote = state
        .checkout
        .quote(user.user_id, Some(&payload.code), Decimal::ZERO)
        .await?;

    let (message, data) = match quote.promo_rejection {
        None => (
            "Promo code applied".to_string(),
            PromoCheck {
                applied: true,
                code: quote.discount_code.unwrap_or_default(),
                rejection: None,
                message: "Promo code applied".to_string(),
                totals: quote.totals,
            },
        ),
        Some(reason) => (
            reason.message().to_string(),
            PromoCheck {
                applied: false,
                code: payload.code.trim().to_string(),
                rejection: Some(reason),
                message: reason.message().to_string(),
                totals: quote.totals,
            },
        ),
    };

    Ok(Json(ApiResponse::success(message, data, Some(Meta::empty()))))
}

#[utoipa::path(
    get,
    path = "/api/checkout/quote",
    params(
        ("promo_code" = Option<String>, Query, description = "Promo code to price in"),
        ("add_on_fees" = Option<String>, Query, description = "Extra fees as a decimal, default 0")
    ),
    responses(
        (status = 200, description = "Order totals for the current cart", body = ApiResponse<Quote>),
        (status = 422, description = "Negative add-on fees"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn quote(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<QuoteQuery>,
) -> AppResult<Json<ApiResponse<Quote>>> {
    let promo_code = query.promo_code.as_deref().filter(|c| !c.trim().is_empty());
    let quote = state
        .checkout
        .quote(
            user.user_id,
            promo_code,
            query.add_on_fees.unwrap_or(Decimal::ZERO),
        )
        .await?;
    Ok(Json(ApiResponse::success("OK", quote, Some(Meta::empty()))))
}
