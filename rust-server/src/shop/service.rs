//! Shop creation and lookup on top of the card catalog and the shops table.

use super::assortment::ShopAssortment;
use super::generator::ShopGenerator;
use crate::db::Database;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ShopError {
    #[error("failed to load catalog: {0}")]
    CatalogLoad(#[source] sqlx::Error),
    #[error("failed to serialize shop: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to persist shop: {0}")]
    Persist(#[source] sqlx::Error),
    #[error("failed to read shop: {0}")]
    Read(#[source] sqlx::Error),
    #[error("stored shop is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),
}

#[derive(Clone)]
pub struct ShopService {
    db: Arc<Database>,
    generator: ShopGenerator,
}

impl ShopService {
    pub fn new(db: Arc<Database>, generator: ShopGenerator) -> Self {
        Self { db, generator }
    }

    /// Generate a new assortment from the current catalog and store it
    pub async fn create_shop(&self) -> Result<ShopAssortment, ShopError> {
        let catalog = self.db.load_catalog().await.map_err(ShopError::CatalogLoad)?;

        let vendors = {
            let mut rng = StdRng::from_entropy();
            self.generator.generate(&catalog, &mut rng)
        };
        let shop = ShopAssortment::new(vendors);

        let data = serde_json::to_string(&shop).map_err(ShopError::Serialize)?;
        self.db
            .insert_shop(&shop.slug, &data, shop.created)
            .await
            .map_err(ShopError::Persist)?;

        info!(
            "Created shop {} with {} items from {} catalog cards",
            shop.slug,
            shop.item_count(),
            catalog.len()
        );
        Ok(shop)
    }

    /// The shop document exactly as stored at creation, checked to still parse
    pub async fn get_shop_json(&self, slug: &str) -> Result<Option<String>, ShopError> {
        let Some(data) = self.db.get_shop_data(slug).await.map_err(ShopError::Read)? else {
            return Ok(None);
        };

        serde_json::from_str::<ShopAssortment>(&data).map_err(ShopError::Corrupt)?;
        Ok(Some(data))
    }
}
