use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    db::DbPool,
    models::CartLine,
    repositories::{CartStore, StoreError},
};

#[derive(FromRow)]
struct CartLineRow {
    product_id: i64,
    name: String,
    unit_price: Decimal,
    quantity: i32,
    image_ref: String,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        CartLine {
            product_id: row.product_id,
            name: row.name,
            unit_price: row.unit_price,
            quantity: row.quantity,
            image_ref: row.image_ref,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgCartStore {
    pool: DbPool,
}

impl PgCartStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn lines(&self, owner_id: Uuid) -> Result<Vec<CartLine>, StoreError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r#"
            SELECT product_id, name, unit_price, quantity, image_ref
            FROM cart_items
            WHERE owner_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CartLine::from).collect())
    }

    async fn line(&self, owner_id: Uuid, product_id: i64) -> Result<Option<CartLine>, StoreError> {
        let row = sqlx::query_as::<_, CartLineRow>(
            r#"
            SELECT product_id, name, unit_price, quantity, image_ref
            FROM cart_items
            WHERE owner_id = $1 AND product_id = $2
            "#,
        )
        .bind(owner_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(CartLine::from))
    }

    async fn put_line(&self, owner_id: Uuid, line: CartLine) -> Result<CartLine, StoreError> {
        let row = sqlx::query_as::<_, CartLineRow>(
            r#"
            INSERT INTO cart_items (id, owner_id, product_id, name, unit_price, quantity, image_ref)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (owner_id, product_id) DO UPDATE
            SET name = EXCLUDED.name,
                unit_price = EXCLUDED.unit_price,
                quantity = EXCLUDED.quantity,
                image_ref = EXCLUDED.image_ref,
                updated_at = now()
            RETURNING product_id, name, unit_price, quantity, image_ref
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(line.product_id)
        .bind(&line.name)
        .bind(line.unit_price)
        .bind(line.quantity)
        .bind(&line.image_ref)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn remove_line(&self, owner_id: Uuid, product_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE owner_id = $1 AND product_id = $2")
            .bind(owner_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self, owner_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE owner_id = $1")
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
