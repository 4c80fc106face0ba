//! Shop Generator
//!
//! Splits the catalog into per-vendor pools and draws each vendor's stock,
//! tier by tier, without replacement.

use super::definition::VendorDefinition;
use super::registry::VendorRegistry;
use crate::card::{Card, Rarity};
use crate::dice::roll_quantity;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Cards one vendor may stock, borrowed from the catalog snapshot
pub struct VendorPool<'a> {
    pub vendor: &'a VendorDefinition,
    pub items: Vec<&'a Card>,
}

impl<'a> VendorPool<'a> {
    fn of_rarity(&self, rarity: Rarity) -> Vec<&'a Card> {
        self.items
            .iter()
            .copied()
            .filter(|card| card.rarity == rarity)
            .collect()
    }
}

#[derive(Clone)]
pub struct ShopGenerator {
    registry: Arc<VendorRegistry>,
}

impl ShopGenerator {
    pub fn new(registry: Arc<VendorRegistry>) -> Self {
        Self { registry }
    }

    /// Build one pool per vendor. A card may land in several pools.
    pub fn partition<'a>(&'a self, catalog: &'a [Card]) -> Vec<VendorPool<'a>> {
        self.registry
            .all()
            .map(|vendor| VendorPool {
                vendor,
                items: catalog
                    .iter()
                    .filter(|card| !card.is_template_only() && vendor.accepts(card))
                    .collect(),
            })
            .collect()
    }

    /// Draw a vendor's stock from its pool, rarity tiers in ascending order
    pub fn sample<R: Rng + ?Sized>(pool: &VendorPool<'_>, rng: &mut R) -> Vec<Card> {
        let mut stock = Vec::new();

        for (rarity, rule) in &pool.vendor.rules {
            let quantity = roll_quantity(rule, rng).saturating_mul(pool.vendor.multiplier);
            if quantity == 0 {
                continue;
            }

            let candidates = pool.of_rarity(*rarity);
            let drawn = sample_tier(&candidates, quantity as usize, rng);
            debug!(
                "{}: {} {} of {} rolled, {} available",
                pool.vendor.name,
                drawn.len(),
                rarity.as_str(),
                quantity,
                candidates.len()
            );
            stock.extend(drawn);
        }

        stock
    }

    /// Generate the full assortment. Every vendor is present, possibly empty.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        catalog: &[Card],
        rng: &mut R,
    ) -> BTreeMap<String, Vec<Card>> {
        self.partition(catalog)
            .iter()
            .map(|pool| (pool.vendor.name.clone(), Self::sample(pool, rng)))
            .collect()
    }
}

/// Uniform draw without replacement, capped at the number of candidates
fn sample_tier<R: Rng + ?Sized>(candidates: &[&Card], quantity: usize, rng: &mut R) -> Vec<Card> {
    candidates
        .choose_multiple(rng, quantity)
        .map(|card| (*card).clone())
        .collect()
}
