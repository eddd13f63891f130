use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit::{self, AuditAction, AuditEntry},
    dto::discounts::{CreateDiscountRequest, DiscountList, UpdateDiscountRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{DiscountCode, DiscountKind, DiscountUpdate, NewDiscount},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::checkout_service::FieldError,
    state::AppState,
};

const MAX_CODE_LEN: usize = 64;

pub async fn list_discounts(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<DiscountList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();
    let (items, total) = state.discounts.list(limit as u64, offset as u64).await?;

    Ok(ApiResponse::success(
        "OK",
        DiscountList { items },
        Some(Meta::paged(page, limit, total)),
    ))
}

pub async fn create_discount(
    state: &AppState,
    user: &AuthUser,
    payload: CreateDiscountRequest,
) -> AppResult<ApiResponse<DiscountCode>> {
    ensure_admin(user)?;
    let discount = validate_new(payload).map_err(AppError::Validation)?;
    let created = state.discounts.create(discount).await?;

    audit::record(
        &state.pool,
        AuditEntry::new(user.user_id, AuditAction::DiscountCreated, "discount_codes")
            .resource_id(created.id)
            .metadata(json!({ "code": created.code, "kind": created.kind.as_str() })),
    )
    .await;

    Ok(ApiResponse::success("Discount created", created, Some(Meta::empty())))
}

pub async fn update_discount(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateDiscountRequest,
) -> AppResult<ApiResponse<DiscountCode>> {
    ensure_admin(user)?;
    let current = state
        .discounts
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound)?;

    let update: DiscountUpdate = payload.into();
    validate_update(&current, &update).map_err(AppError::Validation)?;

    let updated = state
        .discounts
        .update(id, update)
        .await?
        .ok_or(AppError::NotFound)?;

    audit::record(
        &state.pool,
        AuditEntry::new(user.user_id, AuditAction::DiscountUpdated, "discount_codes")
            .resource_id(updated.id)
            .metadata(json!({ "code": updated.code, "active": updated.active })),
    )
    .await;

    Ok(ApiResponse::success("Discount updated", updated, Some(Meta::empty())))
}

fn validate_new(payload: CreateDiscountRequest) -> Result<NewDiscount, Vec<FieldError>> {
    let code = payload.code.trim().to_uppercase();
    let mut errors = Vec::new();

    if code.is_empty() {
        errors.push(field("code", "code is required"));
    } else if code.len() > MAX_CODE_LEN || code.chars().any(char::is_whitespace) {
        errors.push(field("code", "code must be a single word of at most 64 characters"));
    }
    errors.extend(validate_value(payload.kind, payload.value));
    errors.extend(payload.max_uses.and_then(validate_max_uses));

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(NewDiscount {
        code,
        kind: payload.kind,
        value: payload.value,
        max_uses: payload.max_uses,
        expires_at: payload.expires_at,
        active: payload.active,
    })
}

/// Checks an edit against the stored row; a cap below the uses already
/// taken would break the table's usage constraint.
fn validate_update(current: &DiscountCode, update: &DiscountUpdate) -> Result<(), Vec<FieldError>> {
    let mut errors: Vec<FieldError> = validate_value(
        update.kind.unwrap_or(current.kind),
        update.value.unwrap_or(current.value),
    )
    .into_iter()
    .collect();

    if let Some(max_uses) = update.max_uses.flatten() {
        if let Some(err) = validate_max_uses(max_uses) {
            errors.push(err);
        } else if max_uses < current.used_count {
            errors.push(field("max_uses", "max_uses cannot be below current usage"));
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn validate_value(kind: DiscountKind, value: Decimal) -> Option<FieldError> {
    if value < Decimal::ZERO {
        return Some(field("value", "value cannot be negative"));
    }
    if kind == DiscountKind::Percentage && value > Decimal::ONE_HUNDRED {
        return Some(field("value", "percentage cannot exceed 100"));
    }
    None
}

fn validate_max_uses(max_uses: i32) -> Option<FieldError> {
    (max_uses < 1).then(|| field("max_uses", "max_uses must be at least 1"))
}

fn field(name: &str, message: &str) -> FieldError {
    FieldError {
        field: name.to_string(),
        message: message.to_string(),
    }
}
