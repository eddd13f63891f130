//! Persistence seams. Services depend on these traits so the checkout flow can
//! run against Postgres in production and in-memory fakes under test.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    CartLine, CatalogProduct, DeviceToken, DiscountCode, DiscountUpdate, NewDiscount, NewOrder,
    Order, OrderStatus,
};

pub mod carts;
pub mod catalog;
pub mod device_tokens;
pub mod discounts;
pub mod orders;

pub use carts::PgCartStore;
pub use catalog::PgCatalog;
pub use device_tokens::PgDeviceTokenStore;
pub use discounts::PgDiscountStore;
pub use orders::PgOrderStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("database error: {0}")]
    Orm(#[from] sea_orm::DbErr),

    #[error("duplicate record: {0}")]
    Conflict(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementOutcome {
    Incremented,
    /// The counter already sits at `max_uses`; nothing was written.
    CapReached,
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Created(Order),
    /// An order with the same owner and idempotency key already exists.
    Existing(Order),
}

impl InsertOutcome {
    pub fn order(&self) -> &Order {
        match self {
            InsertOutcome::Created(order) | InsertOutcome::Existing(order) => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            InsertOutcome::Created(order) | InsertOutcome::Existing(order) => order,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub owner_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub newest_first: bool,
    pub limit: u64,
    pub offset: u64,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn lines(&self, owner_id: Uuid) -> Result<Vec<CartLine>, StoreError>;

    async fn line(&self, owner_id: Uuid, product_id: i64) -> Result<Option<CartLine>, StoreError>;

    /// Insert or overwrite the line for `line.product_id`.
    async fn put_line(&self, owner_id: Uuid, line: CartLine) -> Result<CartLine, StoreError>;

    async fn remove_line(&self, owner_id: Uuid, product_id: i64) -> Result<bool, StoreError>;

    /// Returns the number of removed lines. Clearing an empty cart is not an error.
    async fn clear(&self, owner_id: Uuid) -> Result<u64, StoreError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn find_product(&self, product_id: i64) -> Result<Option<CatalogProduct>, StoreError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait DiscountStore: Send + Sync {
    /// Case-insensitive lookup.
    async fn find_by_code(&self, code: &str) -> Result<Option<DiscountCode>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DiscountCode>, StoreError>;

    async fn list(&self, limit: u64, offset: u64) -> Result<(Vec<DiscountCode>, u64), StoreError>;

    async fn create(&self, discount: NewDiscount) -> Result<DiscountCode, StoreError>;

    async fn update(
        &self,
        id: Uuid,
        update: DiscountUpdate,
    ) -> Result<Option<DiscountCode>, StoreError>;

    /// Atomically bumps `used_count` unless it already reached `max_uses`.
    async fn increment_usage(&self, id: Uuid) -> Result<IncrementOutcome, StoreError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: NewOrder) -> Result<InsertOutcome, StoreError>;

    /// `owner_id` scopes the lookup to one customer; admins pass `None`.
    async fn find(&self, id: Uuid, owner_id: Option<Uuid>) -> Result<Option<Order>, StoreError>;

    async fn list(&self, filter: OrderFilter) -> Result<(Vec<Order>, u64), StoreError>;

    async fn find_by_idempotency_key(
        &self,
        owner_id: Uuid,
        key: Uuid,
    ) -> Result<Option<Order>, StoreError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait DeviceTokenStore: Send + Sync {
    /// One token per owner; a newer registration replaces the old one,
    /// role included.
    async fn upsert(
        &self,
        owner_id: Uuid,
        role: &str,
        token: &str,
    ) -> Result<DeviceToken, StoreError>;

    async fn token_for(&self, owner_id: Uuid) -> Result<Option<DeviceToken>, StoreError>;

    async fn admin_tokens(&self) -> Result<Vec<DeviceToken>, StoreError>;
}
