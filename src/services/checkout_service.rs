//! Order submission.
//!
//! `place_order` walks Idle → Validating → Persisting → NotifyingBestEffort →
//! Cleared. Only validation and persistence can fail the request; once the
//! order row exists, the usage counter, the admin push and the cart clear are
//! best-effort and only logged.

use std::{collections::BTreeMap, sync::Arc};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::checkout::{CheckoutRequest, Quote},
    models::{CartLine, Contact, DiscountCode, NewOrder, Order},
    notifications::{DispatchError, DispatchReport, Notifier, PushEvent, PushPayload},
    pricing::{self, PricingConfig},
    repositories::{
        CartStore, DiscountStore, IncrementOutcome, InsertOutcome, OrderStore, StoreError,
    },
    services::promo_service::{PromoOutcome, PromoRejection, PromoValidator},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("checkout request is invalid")]
    Validation(Vec<FieldError>),

    #[error("we could not process your order, try again: {0}")]
    Persistence(#[from] StoreError),
}

/// Failures after the order is committed. Logged, never returned to the buyer.
#[derive(Debug, Error)]
pub enum SideEffectError {
    #[error("discount usage update failed: {0}")]
    Discount(#[source] StoreError),

    #[error("order notification failed: {0}")]
    Notification(#[source] DispatchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    Idle,
    Validating,
    Persisting,
    NotifyingBestEffort,
    Cleared,
    Failed,
}

impl CheckoutState {
    pub fn can_advance_to(self, next: CheckoutState) -> bool {
        use CheckoutState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Persisting)
                | (Validating, Failed)
                | (Persisting, NotifyingBestEffort)
                | (Persisting, Failed)
                | (NotifyingBestEffort, Cleared)
        )
    }

    /// Moves to `next`. An illegal edge is a programming error; it is logged
    /// and the machine stays where it was.
    fn advance(&mut self, next: CheckoutState, order_ref: &str) {
        if self.can_advance_to(next) {
            tracing::debug!(from = ?*self, to = ?next, order = %order_ref, "checkout state");
            *self = next;
        } else {
            tracing::error!(from = ?*self, to = ?next, "illegal checkout transition");
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlacedOrder {
    pub order: Order,
    /// Set when a promo code was supplied but could not be applied.
    pub promo_rejection: Option<PromoRejection>,
    pub state: CheckoutState,
    /// True when the idempotency key matched an earlier submission.
    pub duplicate: bool,
}

#[derive(Clone)]
pub struct CheckoutService {
    carts: Arc<dyn CartStore>,
    discounts: Arc<dyn DiscountStore>,
    orders: Arc<dyn OrderStore>,
    notifier: Arc<dyn Notifier>,
    promo: PromoValidator,
    pricing: PricingConfig,
    storefront_url: String,
}

impl CheckoutService {
    pub fn new(
        carts: Arc<dyn CartStore>,
        discounts: Arc<dyn DiscountStore>,
        orders: Arc<dyn OrderStore>,
        notifier: Arc<dyn Notifier>,
        pricing: PricingConfig,
        storefront_url: impl Into<String>,
    ) -> Self {
        Self {
            promo: PromoValidator::new(discounts.clone()),
            carts,
            discounts,
            orders,
            notifier,
            pricing,
            storefront_url: storefront_url.into(),
        }
    }

    /// Prices the current cart without writing anything.
    pub async fn quote(
        &self,
        owner_id: Uuid,
        promo_code: Option<&str>,
        add_on_fees: Decimal,
    ) -> Result<Quote, CheckoutError> {
        if let Some(err) = validate_add_on_fees(add_on_fees) {
            return Err(CheckoutError::Validation(vec![err]));
        }
        let lines = self.carts.lines(owner_id).await?;
        let subtotal = pricing::subtotal(&lines);

        let outcome = match promo_code {
            Some(code) => Some(self.promo.validate(code, subtotal, Utc::now()).await?),
            None => None,
        };
        let applied = outcome.as_ref().and_then(PromoOutcome::applied);
        let rejection = outcome.as_ref().and_then(PromoOutcome::rejection);

        Ok(Quote {
            totals: self.pricing.compute(subtotal, applied, add_on_fees),
            item_count: lines.iter().map(|line| i64::from(line.quantity)).sum(),
            discount_code: applied.map(|d| d.code.clone()),
            promo_rejection: rejection,
            promo_message: rejection.map(|r| r.message().to_string()),
        })
    }

    #[tracing::instrument(name = "checkout.place_order", skip(self, request), err)]
    pub async fn place_order(
        &self,
        owner_id: Uuid,
        request: CheckoutRequest,
    ) -> Result<PlacedOrder, CheckoutError> {
        let mut state = CheckoutState::Idle;

        if let Some(key) = request.idempotency_key {
            if let Some(existing) = self.orders.find_by_idempotency_key(owner_id, key).await? {
                // The first submission already cleared its cart; whatever is
                // there now was added afterwards.
                tracing::info!(order = %existing.reference, "duplicate checkout submission");
                return Ok(duplicate(existing));
            }
        }

        state.advance(CheckoutState::Validating, "-");
        let lines = match self.carts.lines(owner_id).await {
            Ok(lines) => lines,
            Err(err) => {
                state.advance(CheckoutState::Failed, "-");
                return Err(err.into());
            }
        };
        let errors = validate_request(&request, &lines);
        if !errors.is_empty() {
            state.advance(CheckoutState::Failed, "-");
            return Err(CheckoutError::Validation(errors));
        }

        let subtotal = pricing::subtotal(&lines);
        let outcome = match request.promo_code.as_deref() {
            Some(code) => match self.promo.validate(code, subtotal, Utc::now()).await {
                Ok(outcome) => Some(outcome),
                Err(err) => {
                    state.advance(CheckoutState::Failed, "-");
                    return Err(err.into());
                }
            },
            None => None,
        };
        let applied = outcome.as_ref().and_then(PromoOutcome::applied).cloned();
        let promo_rejection = outcome.as_ref().and_then(PromoOutcome::rejection);
        if let Some(reason) = promo_rejection {
            tracing::info!(?reason, "promo code not applied");
        }

        let totals = self
            .pricing
            .compute(subtotal, applied.as_ref(), request.add_on_fees);
        let id = Uuid::new_v4();
        let reference = order_reference(id);

        state.advance(CheckoutState::Persisting, &reference);
        let new_order = NewOrder {
            id,
            reference: reference.clone(),
            owner_id,
            contact: Contact {
                email: request.contact_email.trim().to_string(),
                name: trimmed(request.contact_name),
                phone: trimmed(request.contact_phone),
            },
            shipping_address: request.shipping_address.trim().to_string(),
            line_items: lines,
            totals,
            discount_code: applied.as_ref().map(|d| d.code.clone()),
            payment_method: request.payment_method.trim().to_string(),
            idempotency_key: request.idempotency_key,
        };

        let order = match self.orders.insert(new_order).await {
            Ok(InsertOutcome::Created(order)) => order,
            Ok(InsertOutcome::Existing(order)) => {
                // Lost a race with an identical submission over the same cart.
                self.clear_cart(owner_id, &order.reference).await;
                return Ok(duplicate(order));
            }
            Err(err) => {
                state.advance(CheckoutState::Failed, &reference);
                tracing::error!(error = %err, order = %reference, "order insert failed");
                return Err(err.into());
            }
        };
        tracing::info!(order = %order.reference, total = %order.totals.grand_total, "order placed");

        state.advance(CheckoutState::NotifyingBestEffort, &order.reference);
        let (usage, notified) = tokio::join!(
            self.record_discount_use(applied.as_ref()),
            self.notify_admins(&order),
        );
        if let Err(err) = usage {
            tracing::warn!(error = %err, order = %order.reference, "discount usage not recorded");
        }
        if let Err(err) = notified {
            tracing::warn!(error = %err, order = %order.reference, "admin notification not sent");
        }

        self.clear_cart(owner_id, &order.reference).await;
        state.advance(CheckoutState::Cleared, &order.reference);

        Ok(PlacedOrder {
            order,
            promo_rejection,
            state,
            duplicate: false,
        })
    }

    async fn clear_cart(&self, owner_id: Uuid, order_ref: &str) {
        if let Err(err) = self.carts.clear(owner_id).await {
            tracing::warn!(error = %err, order = %order_ref, "cart clear failed");
        }
    }

    async fn record_discount_use(
        &self,
        discount: Option<&DiscountCode>,
    ) -> Result<(), SideEffectError> {
        let Some(discount) = discount else {
            return Ok(());
        };
        match self
            .discounts
            .increment_usage(discount.id)
            .await
            .map_err(SideEffectError::Discount)?
        {
            IncrementOutcome::Incremented => {}
            IncrementOutcome::CapReached => {
                tracing::warn!(code = %discount.code, "discount cap reached by a concurrent order");
            }
            IncrementOutcome::Missing => {
                tracing::warn!(code = %discount.code, "discount disappeared before usage was recorded");
            }
        }
        Ok(())
    }

    async fn notify_admins(&self, order: &Order) -> Result<DispatchReport, SideEffectError> {
        self.notifier
            .dispatch(PushEvent::NewOrder, new_order_payload(order, &self.storefront_url))
            .await
            .map_err(SideEffectError::Notification)
    }
}

fn validate_request(request: &CheckoutRequest, lines: &[CartLine]) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let email = request.contact_email.trim();
    if email.is_empty() {
        errors.push(FieldError::new("contact_email", "email is required"));
    } else if !email.contains('@') {
        errors.push(FieldError::new("contact_email", "email is not valid"));
    }
    if request.shipping_address.trim().is_empty() {
        errors.push(FieldError::new("shipping_address", "shipping address is required"));
    }
    if request.payment_method.trim().is_empty() {
        errors.push(FieldError::new("payment_method", "payment method is required"));
    }
    errors.extend(validate_add_on_fees(request.add_on_fees));
    if lines.is_empty() {
        errors.push(FieldError::new("cart", "cart is empty"));
    }

    errors
}

fn validate_add_on_fees(add_on_fees: Decimal) -> Option<FieldError> {
    (add_on_fees < Decimal::ZERO)
        .then(|| FieldError::new("add_on_fees", "add-on fees cannot be negative"))
}

fn duplicate(order: Order) -> PlacedOrder {
    PlacedOrder {
        order,
        promo_rejection: None,
        state: CheckoutState::Cleared,
        duplicate: true,
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `ORD-YYYYMMDD-` followed by the first eight hex digits of the order id.
pub fn order_reference(id: Uuid) -> String {
    let simple = id.simple().to_string();
    format!("ORD-{}-{}", Utc::now().format("%Y%m%d"), &simple[..8])
}

pub fn new_order_payload(order: &Order, storefront_url: &str) -> PushPayload {
    let item_count: i64 = order
        .line_items
        .iter()
        .map(|line| i64::from(line.quantity))
        .sum();

    let mut data = BTreeMap::new();
    data.insert("order_id".to_string(), json!(order.id));
    data.insert("reference".to_string(), json!(order.reference));
    data.insert("grand_total".to_string(), json!(order.totals.grand_total));
    data.insert("item_count".to_string(), json!(item_count));

    PushPayload {
        title: "New order received".to_string(),
        message: format!(
            "{} placed {} for {} ({} items)",
            order.contact.email, order.reference, order.totals.grand_total, item_count
        ),
        url: format!("{storefront_url}/admin/orders/{}", order.id),
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            contact_email: "buyer@example.com".into(),
            contact_name: None,
            contact_phone: None,
            shipping_address: "1 Harbour St".into(),
            payment_method: "card".into(),
            promo_code: None,
            add_on_fees: Decimal::ZERO,
            idempotency_key: None,
        }
    }

    fn one_line() -> Vec<CartLine> {
        vec![CartLine {
            product_id: 1,
            name: "Mug".into(),
            unit_price: Decimal::new(1200, 2),
            quantity: 1,
            image_ref: "mug.jpg".into(),
        }]
    }

    #[test]
    fn legal_transitions_only() {
        use CheckoutState::*;
        assert!(Idle.can_advance_to(Validating));
        assert!(Validating.can_advance_to(Failed));
        assert!(Persisting.can_advance_to(Failed));
        assert!(NotifyingBestEffort.can_advance_to(Cleared));
        assert!(!Idle.can_advance_to(Persisting));
        assert!(!NotifyingBestEffort.can_advance_to(Failed));
        assert!(!Cleared.can_advance_to(Idle));
    }

    #[test]
    fn collects_every_field_error() {
        let mut req = request();
        req.contact_email = "   ".into();
        req.shipping_address = "".into();
        req.add_on_fees = Decimal::new(-1, 0);

        let errors = validate_request(&req, &[]);
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["contact_email", "shipping_address", "add_on_fees", "cart"]);
    }

    #[test]
    fn email_needs_an_at_sign() {
        let mut req = request();
        req.contact_email = "buyer.example.com".into();
        let errors = validate_request(&req, &one_line());
        assert_eq!(errors, vec![FieldError::new("contact_email", "email is not valid")]);
    }

    #[test]
    fn reference_has_date_and_id_prefix() {
        let id = Uuid::parse_str("1b4e28ba-2fa1-11d2-883f-0016d3cca427").expect("uuid");
        let reference = order_reference(id);
        assert!(reference.starts_with("ORD-"));
        assert!(reference.ends_with("-1b4e28ba"));
        assert_eq!(reference.len(), "ORD-20260101-1b4e28ba".len());
    }
}
