use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
    sea_query::{Expr, Func},
};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    entity::discount_codes::{
        ActiveModel as DiscountActive, Column as DiscountCol, Entity as DiscountCodes,
        Model as DiscountModel,
    },
    models::{DiscountCode, DiscountKind, DiscountUpdate, NewDiscount},
    repositories::{DiscountStore, IncrementOutcome, StoreError},
};

#[derive(Debug, Clone)]
pub struct PgDiscountStore {
    orm: DatabaseConnection,
}

impl PgDiscountStore {
    pub fn new(orm: DatabaseConnection) -> Self {
        Self { orm }
    }
}

#[async_trait]
impl DiscountStore for PgDiscountStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<DiscountCode>, StoreError> {
        let normalized = code.trim().to_lowercase();
        DiscountCodes::find()
            .filter(Expr::expr(Func::lower(Expr::col(DiscountCol::Code))).eq(normalized))
            .one(&self.orm)
            .await?
            .map(discount_from_entity)
            .transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DiscountCode>, StoreError> {
        DiscountCodes::find_by_id(id)
            .one(&self.orm)
            .await?
            .map(discount_from_entity)
            .transpose()
    }

    async fn list(&self, limit: u64, offset: u64) -> Result<(Vec<DiscountCode>, u64), StoreError> {
        let finder = DiscountCodes::find().order_by_desc(DiscountCol::CreatedAt);
        let total = finder.clone().count(&self.orm).await?;

        let items = finder
            .limit(limit)
            .offset(offset)
            .all(&self.orm)
            .await?
            .into_iter()
            .map(discount_from_entity)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((items, total))
    }

    async fn create(&self, discount: NewDiscount) -> Result<DiscountCode, StoreError> {
        let code = discount.code.clone();
        let active = DiscountActive {
            id: Set(Uuid::new_v4()),
            code: Set(discount.code),
            kind: Set(discount.kind.as_str().to_string()),
            value: Set(discount.value),
            max_uses: Set(discount.max_uses),
            used_count: Set(0),
            expires_at: Set(discount.expires_at.map(Into::into)),
            active: Set(discount.active),
            created_at: NotSet,
            updated_at: NotSet,
        };

        match active.insert(&self.orm).await {
            Ok(model) => discount_from_entity(model),
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Err(StoreError::Conflict(format!("discount code {code} already exists")))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn update(
        &self,
        id: Uuid,
        update: DiscountUpdate,
    ) -> Result<Option<DiscountCode>, StoreError> {
        let existing = DiscountCodes::find_by_id(id).one(&self.orm).await?;
        let existing = match existing {
            Some(d) => d,
            None => return Ok(None),
        };

        let mut active: DiscountActive = existing.into();
        if let Some(kind) = update.kind {
            active.kind = Set(kind.as_str().to_string());
        }
        if let Some(value) = update.value {
            active.value = Set(value);
        }
        if let Some(max_uses) = update.max_uses {
            active.max_uses = Set(max_uses);
        }
        if let Some(expires_at) = update.expires_at {
            active.expires_at = Set(expires_at.map(Into::into));
        }
        if let Some(flag) = update.active {
            active.active = Set(flag);
        }
        active.updated_at = Set(Utc::now().into());

        let model = active.update(&self.orm).await?;
        discount_from_entity(model).map(Some)
    }

    async fn increment_usage(&self, id: Uuid) -> Result<IncrementOutcome, StoreError> {
        let under_cap = Condition::any()
            .add(DiscountCol::MaxUses.is_null())
            .add(Expr::col(DiscountCol::UsedCount).lt(Expr::col(DiscountCol::MaxUses)));

        let result = DiscountCodes::update_many()
            .col_expr(
                DiscountCol::UsedCount,
                Expr::col(DiscountCol::UsedCount).add(1),
            )
            .col_expr(DiscountCol::UpdatedAt, Expr::current_timestamp().into())
            .filter(DiscountCol::Id.eq(id))
            .filter(under_cap)
            .exec(&self.orm)
            .await?;

        if result.rows_affected > 0 {
            return Ok(IncrementOutcome::Incremented);
        }

        let exists = DiscountCodes::find_by_id(id).one(&self.orm).await?.is_some();
        Ok(if exists {
            IncrementOutcome::CapReached
        } else {
            IncrementOutcome::Missing
        })
    }
}

fn discount_from_entity(model: DiscountModel) -> Result<DiscountCode, StoreError> {
    let kind = DiscountKind::parse(&model.kind).ok_or_else(|| {
        StoreError::Corrupt(format!(
            "discount {} has unknown kind {:?}",
            model.id, model.kind
        ))
    })?;

    Ok(DiscountCode {
        id: model.id,
        code: model.code,
        kind,
        value: model.value,
        max_uses: model.max_uses,
        used_count: model.used_count,
        expires_at: model.expires_at.map(|dt| dt.with_timezone(&Utc)),
        active: model.active,
    })
}
