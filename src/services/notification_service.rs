use serde_json::json;

use crate::{
    audit::{self, AuditAction, AuditEntry},
    dto::notifications::{DispatchKind, DispatchRequest, PushConfig, RegisterTokenRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::DeviceToken,
    notifications::{DispatchReport, PushEvent},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn register_token(
    state: &AppState,
    user: &AuthUser,
    payload: RegisterTokenRequest,
) -> AppResult<ApiResponse<DeviceToken>> {
    let token = payload.token.trim();
    if token.is_empty() {
        return Err(AppError::BadRequest("token is required".to_string()));
    }

    let saved = state
        .device_tokens
        .upsert(user.user_id, &user.role, token)
        .await?;
    tracing::info!(owner_id = %user.user_id, "device token registered");

    audit::record(
        &state.pool,
        AuditEntry::new(user.user_id, AuditAction::DeviceTokenRegistered, "device_tokens")
            .resource_id(user.user_id)
            .metadata(json!({ "role": user.role })),
    )
    .await;

    Ok(ApiResponse::success("Token registered", saved, Some(Meta::empty())))
}

/// `new_order` broadcasts to admins and is admin-only; `test` goes to the caller.
pub async fn dispatch(
    state: &AppState,
    user: &AuthUser,
    payload: DispatchRequest,
) -> AppResult<ApiResponse<DispatchReport>> {
    let event = match payload.kind {
        DispatchKind::NewOrder => {
            ensure_admin(user)?;
            PushEvent::NewOrder
        }
        DispatchKind::Test => PushEvent::Test {
            owner_id: user.user_id,
        },
    };

    let report = state.notifier.dispatch(event, payload.payload).await?;
    let message = report
        .message
        .clone()
        .unwrap_or_else(|| format!("{} delivered, {} failed", report.success_count, report.failure_count));

    Ok(ApiResponse::success(message, report, Some(Meta::empty())))
}

pub fn config(state: &AppState) -> ApiResponse<PushConfig> {
    let fcm = state.config.fcm.as_ref();
    let data = PushConfig {
        enabled: fcm.is_some(),
        vapid_public_key: fcm.and_then(|fcm| fcm.vapid_public_key.clone()),
    };
    ApiResponse::success("OK", data, Some(Meta::empty()))
}
