use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, sea_query::OnConflict,
};
use uuid::Uuid;

use crate::{
    entity::device_tokens::{
        ActiveModel as TokenActive, Column as TokenCol, Entity as DeviceTokens,
        Model as TokenModel,
    },
    models::DeviceToken,
    repositories::{DeviceTokenStore, StoreError},
};

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone)]
pub struct PgDeviceTokenStore {
    orm: DatabaseConnection,
}

impl PgDeviceTokenStore {
    pub fn new(orm: DatabaseConnection) -> Self {
        Self { orm }
    }
}

#[async_trait]
impl DeviceTokenStore for PgDeviceTokenStore {
    async fn upsert(
        &self,
        owner_id: Uuid,
        role: &str,
        token: &str,
    ) -> Result<DeviceToken, StoreError> {
        let active = TokenActive {
            owner_id: Set(owner_id),
            token: Set(token.to_string()),
            role: Set(role.to_string()),
            registered_at: Set(Utc::now().into()),
        };

        DeviceTokens::insert(active)
            .on_conflict(
                OnConflict::column(TokenCol::OwnerId)
                    .update_columns([TokenCol::Token, TokenCol::Role, TokenCol::RegisteredAt])
                    .to_owned(),
            )
            .exec(&self.orm)
            .await?;

        DeviceTokens::find_by_id(owner_id)
            .one(&self.orm)
            .await?
            .map(token_from_entity)
            .ok_or_else(|| StoreError::Corrupt(format!("device token for {owner_id} vanished")))
    }

    async fn token_for(&self, owner_id: Uuid) -> Result<Option<DeviceToken>, StoreError> {
        let token = DeviceTokens::find_by_id(owner_id)
            .one(&self.orm)
            .await?
            .map(token_from_entity);
        Ok(token)
    }

    async fn admin_tokens(&self) -> Result<Vec<DeviceToken>, StoreError> {
        let tokens = DeviceTokens::find()
            .filter(TokenCol::Role.eq(ADMIN_ROLE))
            .all(&self.orm)
            .await?
            .into_iter()
            .map(token_from_entity)
            .collect();
        Ok(tokens)
    }
}

fn token_from_entity(model: TokenModel) -> DeviceToken {
    DeviceToken {
        owner_id: model.owner_id,
        token: model.token,
        role: model.role,
        registered_at: model.registered_at.with_timezone(&Utc),
    }
}
