use crate::card::Card;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A generated shop: vendor name to the cards on its counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopAssortment {
    pub slug: String,
    pub created: DateTime<Utc>,
    pub vendors: BTreeMap<String, Vec<Card>>,
}

impl ShopAssortment {
    /// Stamp freshly generated stock with a new slug and the current time
    pub fn new(vendors: BTreeMap<String, Vec<Card>>) -> Self {
        Self {
            slug: uuid::Uuid::new_v4().to_string(),
            created: Utc::now(),
            vendors,
        }
    }

    pub fn item_count(&self) -> usize {
        self.vendors.values().map(Vec::len).sum()
    }
}
