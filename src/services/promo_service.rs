use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    models::DiscountCode,
    repositories::{DiscountStore, StoreError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PromoRejection {
    NotFound,
    Expired,
    Exhausted,
    Inactive,
}

impl PromoRejection {
    pub fn message(&self) -> &'static str {
        match self {
            PromoRejection::NotFound => "Promo code not found",
            PromoRejection::Expired => "Promo code has expired",
            PromoRejection::Exhausted => "Promo code has reached its usage limit",
            PromoRejection::Inactive => "Promo code is not active",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PromoOutcome {
    Applied(DiscountCode),
    Rejected(PromoRejection),
}

impl PromoOutcome {
    pub fn applied(&self) -> Option<&DiscountCode> {
        match self {
            PromoOutcome::Applied(discount) => Some(discount),
            PromoOutcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<PromoRejection> {
        match self {
            PromoOutcome::Applied(_) => None,
            PromoOutcome::Rejected(reason) => Some(*reason),
        }
    }
}

/// Read-only promo checks. Never touches `used_count`.
#[derive(Clone)]
pub struct PromoValidator {
    discounts: Arc<dyn DiscountStore>,
}

impl PromoValidator {
    pub fn new(discounts: Arc<dyn DiscountStore>) -> Self {
        Self { discounts }
    }

    /// `subtotal` is accepted so minimum-spend rules can slot in here; none
    /// exist today.
    #[tracing::instrument(name = "promo.validate", skip(self, subtotal), err)]
    pub async fn validate(
        &self,
        code: &str,
        subtotal: Decimal,
        now: DateTime<Utc>,
    ) -> Result<PromoOutcome, StoreError> {
        let code = code.trim();
        if code.is_empty() {
            return Ok(PromoOutcome::Rejected(PromoRejection::NotFound));
        }

        let discount = match self.discounts.find_by_code(code).await? {
            Some(d) => d,
            None => return Ok(PromoOutcome::Rejected(PromoRejection::NotFound)),
        };

        Ok(check(discount, now))
    }
}

/// Applicability rules in precedence order: expiry, usage cap, active flag.
pub fn check(discount: DiscountCode, now: DateTime<Utc>) -> PromoOutcome {
    if discount.is_expired(now) {
        PromoOutcome::Rejected(PromoRejection::Expired)
    } else if discount.is_exhausted() {
        PromoOutcome::Rejected(PromoRejection::Exhausted)
    } else if !discount.active {
        PromoOutcome::Rejected(PromoRejection::Inactive)
    } else {
        PromoOutcome::Applied(discount)
    }
}
