use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::models::{DiscountCode, DiscountKind, DiscountUpdate};

fn active_by_default() -> bool {
    true
}

/// Keeps "field absent" apart from "field set to null".
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDiscountRequest {
    pub code: String,
    pub kind: DiscountKind,
    pub value: Decimal,
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateDiscountRequest {
    pub kind: Option<DiscountKind>,
    pub value: Option<Decimal>,
    /// `null` removes the cap.
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<i32>)]
    pub max_uses: Option<Option<i32>>,
    /// `null` removes the expiry.
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<DateTime<Utc>>)]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub active: Option<bool>,
}

impl From<UpdateDiscountRequest> for DiscountUpdate {
    fn from(req: UpdateDiscountRequest) -> Self {
        DiscountUpdate {
            kind: req.kind,
            value: req.value,
            max_uses: req.max_uses,
            expires_at: req.expires_at,
            active: req.active,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DiscountList {
    pub items: Vec<DiscountCode>,
}
