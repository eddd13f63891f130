use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::notifications::{DispatchRequest, PushConfig, RegisterTokenRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::DeviceToken,
    notifications::DispatchReport,
    response::ApiResponse,
    services::notification_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tokens", post(register_token))
        .route("/dispatch", post(dispatch))
        .route("/config", get(push_config))
}

#[utoipa::path(
    post,
    path = "/api/notifications/tokens",
    request_body = RegisterTokenRequest,
    responses(
        (status = 200, description = "Device token stored for the caller", body = ApiResponse<DeviceToken>),
        (status = 400, description = "Blank token"),
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn register_token(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<RegisterTokenRequest>,
) -> AppResult<Json<ApiResponse<DeviceToken>>> {
    let resp = notification_service::register_token(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/notifications/dispatch",
    request_body = DispatchRequest,
    responses(
        (status = 200, description = "Per-token delivery report; zero targets is not an error", body = ApiResponse<DispatchReport>),
        (status = 403, description = "new_order requires the admin role"),
        (status = 503, description = "Credential exchange failed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn dispatch(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<DispatchRequest>,
) -> AppResult<Json<ApiResponse<DispatchReport>>> {
    let resp = notification_service::dispatch(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/notifications/config",
    responses(
        (status = 200, description = "Whether push is enabled and the public VAPID key", body = ApiResponse<PushConfig>),
    ),
    tag = "Notifications"
)]
pub async fn push_config(State(state): State<AppState>) -> Json<ApiResponse<PushConfig>> {
    Json(notification_service::config(&state))
}
