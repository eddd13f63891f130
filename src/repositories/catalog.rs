use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait};

use crate::{
    entity::products::{Entity as Products, Model as ProductModel},
    models::CatalogProduct,
    repositories::{Catalog, StoreError},
};

#[derive(Debug, Clone)]
pub struct PgCatalog {
    orm: DatabaseConnection,
}

impl PgCatalog {
    pub fn new(orm: DatabaseConnection) -> Self {
        Self { orm }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn find_product(&self, product_id: i64) -> Result<Option<CatalogProduct>, StoreError> {
        let product = Products::find_by_id(product_id)
            .one(&self.orm)
            .await?
            .map(product_from_entity);
        Ok(product)
    }
}

fn product_from_entity(model: ProductModel) -> CatalogProduct {
    CatalogProduct {
        id: model.id,
        name: model.name,
        price: model.price,
        image_ref: model.image_ref,
        active: model.active,
    }
}
