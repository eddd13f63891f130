use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{models::OrderTotals, services::promo_service::PromoRejection};

fn default_payment_method() -> String {
    "card".to_string()
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub contact_email: String,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub shipping_address: String,
    #[serde(default = "default_payment_method")]
    pub payment_method: String,
    pub promo_code: Option<String>,
    #[serde(default)]
    pub add_on_fees: Decimal,
    /// Client-generated key; resubmitting with the same key returns the first order.
    pub idempotency_key: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PromoCheckRequest {
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct QuoteQuery {
    pub promo_code: Option<String>,
    pub add_on_fees: Option<Decimal>,
}

/// Totals for the caller's current cart, with the promo outcome if one was given.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Quote {
    pub totals: OrderTotals,
    pub item_count: i64,
    pub discount_code: Option<String>,
    pub promo_rejection: Option<PromoRejection>,
    pub promo_message: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PromoCheck {
    pub applied: bool,
    pub code: String,
    pub rejection: Option<PromoRejection>,
    pub message: String,
    pub totals: OrderTotals,
}
