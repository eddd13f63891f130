//! In-memory stores for driving `CheckoutService` without Postgres.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use storefront_api::{
    models::{
        CartLine, DiscountCode, DiscountKind, DiscountUpdate, NewDiscount, NewOrder, Order,
        OrderStatus,
    },
    notifications::{
        CredentialError, DispatchError, DispatchReport, Notifier, PushEvent, PushPayload,
    },
    pricing::{PricingConfig, ShippingRule},
    repositories::{
        CartStore, DiscountStore, IncrementOutcome, InsertOutcome, OrderFilter, OrderStore,
        StoreError,
    },
    services::checkout_service::CheckoutService,
};
use uuid::Uuid;

pub fn dec(s: &str) -> Decimal {
    s.parse().expect("decimal literal")
}

pub fn line(product_id: i64, price: &str, quantity: i32) -> CartLine {
    CartLine {
        product_id,
        name: format!("Product {product_id}"),
        unit_price: dec(price),
        quantity,
        image_ref: format!("products/{product_id}.jpg"),
    }
}

pub fn discount(code: &str, kind: DiscountKind, value: &str) -> DiscountCode {
    DiscountCode {
        id: Uuid::new_v4(),
        code: code.to_string(),
        kind,
        value: dec(value),
        max_uses: None,
        used_count: 0,
        expires_at: None,
        active: true,
    }
}

fn unavailable() -> StoreError {
    StoreError::Unavailable("injected failure".to_string())
}

#[derive(Default)]
pub struct MemoryCart {
    lines: Mutex<HashMap<Uuid, Vec<CartLine>>>,
    pub fail_reads: AtomicBool,
    pub fail_clear: AtomicBool,
}

impl MemoryCart {
    pub fn refill(&self, owner_id: Uuid, lines: Vec<CartLine>) {
        self.lines.lock().unwrap().insert(owner_id, lines);
    }

    pub fn with_lines(owner_id: Uuid, lines: Vec<CartLine>) -> Self {
        let cart = Self::default();
        cart.lines.lock().unwrap().insert(owner_id, lines);
        cart
    }

    pub fn snapshot(&self, owner_id: Uuid) -> Vec<CartLine> {
        self.lines
            .lock()
            .unwrap()
            .get(&owner_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl CartStore for MemoryCart {
    async fn lines(&self, owner_id: Uuid) -> Result<Vec<CartLine>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.snapshot(owner_id))
    }

    async fn line(&self, owner_id: Uuid, product_id: i64) -> Result<Option<CartLine>, StoreError> {
        Ok(self
            .snapshot(owner_id)
            .into_iter()
            .find(|l| l.product_id == product_id))
    }

    async fn put_line(&self, owner_id: Uuid, line: CartLine) -> Result<CartLine, StoreError> {
        let mut carts = self.lines.lock().unwrap();
        let lines = carts.entry(owner_id).or_default();
        lines.retain(|l| l.product_id != line.product_id);
        lines.push(line.clone());
        Ok(line)
    }

    async fn remove_line(&self, owner_id: Uuid, product_id: i64) -> Result<bool, StoreError> {
        let mut carts = self.lines.lock().unwrap();
        let lines = carts.entry(owner_id).or_default();
        let before = lines.len();
        lines.retain(|l| l.product_id != product_id);
        Ok(lines.len() != before)
    }

    async fn clear(&self, owner_id: Uuid) -> Result<u64, StoreError> {
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let removed = self.lines.lock().unwrap().remove(&owner_id);
        Ok(removed.map(|l| l.len() as u64).unwrap_or(0))
    }
}

#[derive(Default)]
pub struct MemoryDiscounts {
    codes: Mutex<Vec<DiscountCode>>,
    pub fail_increment: AtomicBool,
    /// Another order takes one use between validation and the increment.
    pub rival_use_first: AtomicBool,
    pub increments: AtomicUsize,
}

impl MemoryDiscounts {
    pub fn with(codes: Vec<DiscountCode>) -> Self {
        let store = Self::default();
        *store.codes.lock().unwrap() = codes;
        store
    }

    pub fn used_count(&self, code: &str) -> Option<i32> {
        self.codes
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.code.eq_ignore_ascii_case(code))
            .map(|d| d.used_count)
    }
}

#[async_trait]
impl DiscountStore for MemoryDiscounts {
    async fn find_by_code(&self, code: &str) -> Result<Option<DiscountCode>, StoreError> {
        Ok(self
            .codes
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DiscountCode>, StoreError> {
        Ok(self.codes.lock().unwrap().iter().find(|d| d.id == id).cloned())
    }

    async fn list(&self, limit: u64, offset: u64) -> Result<(Vec<DiscountCode>, u64), StoreError> {
        let codes = self.codes.lock().unwrap();
        let page = codes
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((page, codes.len() as u64))
    }

    async fn create(&self, discount: NewDiscount) -> Result<DiscountCode, StoreError> {
        let mut codes = self.codes.lock().unwrap();
        if codes.iter().any(|d| d.code.eq_ignore_ascii_case(&discount.code)) {
            return Err(StoreError::Conflict(discount.code));
        }
        let created = DiscountCode {
            id: Uuid::new_v4(),
            code: discount.code,
            kind: discount.kind,
            value: discount.value,
            max_uses: discount.max_uses,
            used_count: 0,
            expires_at: discount.expires_at,
            active: discount.active,
        };
        codes.push(created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        id: Uuid,
        update: DiscountUpdate,
    ) -> Result<Option<DiscountCode>, StoreError> {
        let mut codes = self.codes.lock().unwrap();
        let Some(d) = codes.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };
        if let Some(kind) = update.kind {
            d.kind = kind;
        }
        if let Some(value) = update.value {
            d.value = value;
        }
        if let Some(max_uses) = update.max_uses {
            d.max_uses = max_uses;
        }
        if let Some(expires_at) = update.expires_at {
            d.expires_at = expires_at;
        }
        if let Some(active) = update.active {
            d.active = active;
        }
        Ok(Some(d.clone()))
    }

    async fn increment_usage(&self, id: Uuid) -> Result<IncrementOutcome, StoreError> {
        self.increments.fetch_add(1, Ordering::SeqCst);
        if self.fail_increment.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut codes = self.codes.lock().unwrap();
        let Some(d) = codes.iter_mut().find(|d| d.id == id) else {
            return Ok(IncrementOutcome::Missing);
        };
        if self.rival_use_first.load(Ordering::SeqCst) {
            d.used_count += 1;
        }
        if d.max_uses.is_some_and(|max| d.used_count >= max) {
            return Ok(IncrementOutcome::CapReached);
        }
        d.used_count += 1;
        Ok(IncrementOutcome::Incremented)
    }
}

#[derive(Default)]
pub struct MemoryOrders {
    orders: Mutex<Vec<(Option<Uuid>, Order)>>,
    pub fail_insert: AtomicBool,
    /// Hides stored keys from the up-front lookup, as when two identical
    /// submissions race to the insert.
    pub miss_key_lookups: AtomicBool,
}

impl MemoryOrders {
    pub fn count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }
}

#[async_trait]
impl OrderStore for MemoryOrders {
    async fn insert(&self, order: NewOrder) -> Result<InsertOutcome, StoreError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut orders = self.orders.lock().unwrap();
        if let Some(key) = order.idempotency_key {
            if let Some((_, existing)) = orders
                .iter()
                .find(|(k, o)| *k == Some(key) && o.owner_id == order.owner_id)
            {
                return Ok(InsertOutcome::Existing(existing.clone()));
            }
        }
        let stored = Order {
            id: order.id,
            reference: order.reference,
            owner_id: order.owner_id,
            contact: order.contact,
            shipping_address: order.shipping_address,
            line_items: order.line_items,
            totals: order.totals,
            discount_code: order.discount_code,
            payment_method: order.payment_method,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        orders.push((order.idempotency_key, stored.clone()));
        Ok(InsertOutcome::Created(stored))
    }

    async fn find(&self, id: Uuid, owner_id: Option<Uuid>) -> Result<Option<Order>, StoreError> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .map(|(_, o)| o)
            .find(|o| o.id == id && owner_id.is_none_or(|owner| o.owner_id == owner))
            .cloned())
    }

    async fn list(&self, filter: OrderFilter) -> Result<(Vec<Order>, u64), StoreError> {
        let orders: Vec<Order> = self
            .orders
            .lock()
            .unwrap()
            .iter()
            .map(|(_, o)| o.clone())
            .filter(|o| filter.owner_id.is_none_or(|owner| o.owner_id == owner))
            .collect();
        let total = orders.len() as u64;
        Ok((orders, total))
    }

    async fn find_by_idempotency_key(
        &self,
        owner_id: Uuid,
        key: Uuid,
    ) -> Result<Option<Order>, StoreError> {
        if self.miss_key_lookups.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .find(|(k, o)| *k == Some(key) && o.owner_id == owner_id)
            .map(|(_, o)| o.clone()))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub payloads: Mutex<Vec<PushPayload>>,
    pub fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn calls(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn dispatch(
        &self,
        event: PushEvent,
        payload: PushPayload,
    ) -> Result<DispatchReport, DispatchError> {
        assert_eq!(event, PushEvent::NewOrder);
        self.payloads.lock().unwrap().push(payload);
        if self.fail.load(Ordering::SeqCst) {
            return Err(DispatchError::Credential(CredentialError::NotConfigured));
        }
        Ok(DispatchReport::no_targets())
    }
}

pub struct Harness {
    pub owner_id: Uuid,
    pub carts: Arc<MemoryCart>,
    pub discounts: Arc<MemoryDiscounts>,
    pub orders: Arc<MemoryOrders>,
    pub notifier: Arc<RecordingNotifier>,
    pub service: CheckoutService,
}

pub fn pricing() -> PricingConfig {
    PricingConfig {
        shipping: ShippingRule {
            flat_rate: dec("15.00"),
            free_threshold: dec("150.00"),
        },
        tax_rate: dec("0.08"),
    }
}

impl Harness {
    pub fn new(lines: Vec<CartLine>, codes: Vec<DiscountCode>) -> Self {
        let owner_id = Uuid::new_v4();
        let carts = Arc::new(MemoryCart::with_lines(owner_id, lines));
        let discounts = Arc::new(MemoryDiscounts::with(codes));
        let orders = Arc::new(MemoryOrders::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let service = CheckoutService::new(
            carts.clone(),
            discounts.clone(),
            orders.clone(),
            notifier.clone(),
            pricing(),
            "https://shop.test",
        );
        Self {
            owner_id,
            carts,
            discounts,
            orders,
            notifier,
            service,
        }
    }
}
