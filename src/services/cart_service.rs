use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    models::CartLine,
    pricing,
    repositories::{CartStore, Catalog, StoreError},
};

#[derive(Debug, Error)]
pub enum CartError {
    #[error("product {0} not found")]
    ProductNotFound(i64),

    #[error("product {0} is no longer available")]
    ProductUnavailable(i64),

    #[error("quantity must be greater than 0")]
    InvalidQuantity,

    #[error("product {0} is not in the cart")]
    LineNotFound(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub subtotal: Decimal,
    pub item_count: i64,
}

impl CartView {
    pub fn new(lines: Vec<CartLine>) -> Self {
        let subtotal = pricing::subtotal(&lines);
        let item_count = lines.iter().map(|line| i64::from(line.quantity)).sum();
        Self {
            lines,
            subtotal,
            item_count,
        }
    }
}

#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn Catalog>,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self { carts, catalog }
    }

    pub async fn list(&self, owner_id: Uuid) -> Result<CartView, CartError> {
        let lines = self.carts.lines(owner_id).await?;
        Ok(CartView::new(lines))
    }

    /// Adds `quantity` units, merging into an existing line. The line keeps the
    /// catalog snapshot taken at this call.
    #[tracing::instrument(name = "cart.add", skip(self), err)]
    pub async fn add(
        &self,
        owner_id: Uuid,
        product_id: i64,
        quantity: i32,
    ) -> Result<CartLine, CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity);
        }

        let product = self
            .catalog
            .find_product(product_id)
            .await?
            .ok_or(CartError::ProductNotFound(product_id))?;
        if !product.active {
            return Err(CartError::ProductUnavailable(product_id));
        }

        let existing = self
            .carts
            .line(owner_id, product_id)
            .await?
            .map(|line| line.quantity)
            .unwrap_or(0);

        let line = CartLine {
            product_id,
            name: product.name,
            unit_price: product.price,
            quantity: existing.saturating_add(quantity),
            image_ref: product.image_ref,
        };
        Ok(self.carts.put_line(owner_id, line).await?)
    }

    pub async fn increment(&self, owner_id: Uuid, product_id: i64) -> Result<CartLine, CartError> {
        let mut line = self.existing_line(owner_id, product_id).await?;
        line.quantity = line.quantity.saturating_add(1);
        Ok(self.carts.put_line(owner_id, line).await?)
    }

    /// Never drops a line below one unit; use `remove` for that.
    pub async fn decrement(&self, owner_id: Uuid, product_id: i64) -> Result<CartLine, CartError> {
        let mut line = self.existing_line(owner_id, product_id).await?;
        if line.quantity <= 1 {
            return Ok(line);
        }
        line.quantity -= 1;
        Ok(self.carts.put_line(owner_id, line).await?)
    }

    pub async fn remove(&self, owner_id: Uuid, product_id: i64) -> Result<(), CartError> {
        if !self.carts.remove_line(owner_id, product_id).await? {
            return Err(CartError::LineNotFound(product_id));
        }
        Ok(())
    }

    pub async fn clear(&self, owner_id: Uuid) -> Result<u64, CartError> {
        Ok(self.carts.clear(owner_id).await?)
    }

    async fn existing_line(&self, owner_id: Uuid, product_id: i64) -> Result<CartLine, CartError> {
        self.carts
            .line(owner_id, product_id)
            .await?
            .ok_or(CartError::LineNotFound(product_id))
    }
}
