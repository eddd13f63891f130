use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    entity::orders::{
        ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
    },
    models::{CartLine, Contact, NewOrder, Order, OrderStatus, OrderTotals},
    repositories::{InsertOutcome, OrderFilter, OrderStore, StoreError},
};

#[derive(Debug, Clone)]
pub struct PgOrderStore {
    orm: DatabaseConnection,
}

impl PgOrderStore {
    pub fn new(orm: DatabaseConnection) -> Self {
        Self { orm }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: NewOrder) -> Result<InsertOutcome, StoreError> {
        if let Some(key) = order.idempotency_key {
            if let Some(existing) = self.find_by_idempotency_key(order.owner_id, key).await? {
                return Ok(InsertOutcome::Existing(existing));
            }
        }

        let line_items = serde_json::to_value(&order.line_items)
            .map_err(|err| StoreError::Corrupt(format!("cannot encode line items: {err}")))?;

        let active = OrderActive {
            id: Set(order.id),
            reference: Set(order.reference),
            owner_id: Set(order.owner_id),
            contact_email: Set(order.contact.email),
            contact_name: Set(order.contact.name),
            contact_phone: Set(order.contact.phone),
            shipping_address: Set(order.shipping_address),
            line_items: Set(line_items),
            subtotal: Set(order.totals.subtotal),
            shipping_fee: Set(order.totals.shipping_fee),
            tax_amount: Set(order.totals.tax_amount),
            discount_amount: Set(order.totals.discount_amount),
            add_on_fees: Set(order.totals.add_on_fees),
            grand_total: Set(order.totals.grand_total),
            discount_code: Set(order.discount_code),
            payment_method: Set(order.payment_method),
            status: Set(OrderStatus::Pending.as_str().to_string()),
            idempotency_key: Set(order.idempotency_key),
            created_at: NotSet,
            updated_at: NotSet,
        };

        match active.insert(&self.orm).await {
            Ok(model) => order_from_entity(model).map(InsertOutcome::Created),
            // A concurrent retry with the same key won the race.
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                let key = order.idempotency_key.ok_or_else(|| {
                    StoreError::Conflict(format!("order {} already exists", order.id))
                })?;
                self.find_by_idempotency_key(order.owner_id, key)
                    .await?
                    .map(InsertOutcome::Existing)
                    .ok_or_else(|| StoreError::Conflict(format!("order {} already exists", order.id)))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find(&self, id: Uuid, owner_id: Option<Uuid>) -> Result<Option<Order>, StoreError> {
        let mut condition = Condition::all().add(OrderCol::Id.eq(id));
        if let Some(owner_id) = owner_id {
            condition = condition.add(OrderCol::OwnerId.eq(owner_id));
        }

        Orders::find()
            .filter(condition)
            .one(&self.orm)
            .await?
            .map(order_from_entity)
            .transpose()
    }

    async fn list(&self, filter: OrderFilter) -> Result<(Vec<Order>, u64), StoreError> {
        let mut condition = Condition::all();
        if let Some(owner_id) = filter.owner_id {
            condition = condition.add(OrderCol::OwnerId.eq(owner_id));
        }
        if let Some(status) = filter.status {
            condition = condition.add(OrderCol::Status.eq(status.as_str()));
        }

        let mut finder = Orders::find().filter(condition);
        finder = if filter.newest_first {
            finder.order_by_desc(OrderCol::CreatedAt)
        } else {
            finder.order_by_asc(OrderCol::CreatedAt)
        };

        let total = finder.clone().count(&self.orm).await?;

        let orders = finder
            .limit(filter.limit)
            .offset(filter.offset)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(order_from_entity)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((orders, total))
    }

    async fn find_by_idempotency_key(
        &self,
        owner_id: Uuid,
        key: Uuid,
    ) -> Result<Option<Order>, StoreError> {
        Orders::find()
            .filter(
                Condition::all()
                    .add(OrderCol::OwnerId.eq(owner_id))
                    .add(OrderCol::IdempotencyKey.eq(key)),
            )
            .one(&self.orm)
            .await?
            .map(order_from_entity)
            .transpose()
    }
}

fn order_from_entity(model: OrderModel) -> Result<Order, StoreError> {
    let status = OrderStatus::parse(&model.status).ok_or_else(|| {
        StoreError::Corrupt(format!("order {} has unknown status {:?}", model.id, model.status))
    })?;
    let line_items: Vec<CartLine> = serde_json::from_value(model.line_items)
        .map_err(|err| StoreError::Corrupt(format!("order {} line items: {err}", model.id)))?;

    Ok(Order {
        id: model.id,
        reference: model.reference,
        owner_id: model.owner_id,
        contact: Contact {
            email: model.contact_email,
            name: model.contact_name,
            phone: model.contact_phone,
        },
        shipping_address: model.shipping_address,
        line_items,
        totals: OrderTotals {
            subtotal: model.subtotal,
            shipping_fee: model.shipping_fee,
            tax_amount: model.tax_amount,
            discount_amount: model.discount_amount,
            add_on_fees: model.add_on_fees,
            grand_total: model.grand_total,
        },
        discount_code: model.discount_code,
        payment_method: model.payment_method,
        status,
        created_at: model.created_at.with_timezone(&Utc),
    })
}
