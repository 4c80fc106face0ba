//! Vendor Definition Structures
//!
//! A vendor is one stall of the generated shop: which cards it may stock and
//! how many of each rarity it puts on the counter.

use crate::card::model::item_types;
use crate::card::{Card, Rarity};
use crate::dice::DiceExpr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A vendor definition with its stocking rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VendorDefinition {
    pub name: String,
    /// Rolled quantities are multiplied by this
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
    /// A card is stocked if it matches any of these criteria
    #[serde(default)]
    pub stock: Vec<StockCriterion>,
    /// Dice expression per rarity tier; tiers without a rule are never stocked
    #[serde(default)]
    pub rules: BTreeMap<Rarity, String>,
}

fn default_multiplier() -> u32 {
    1
}

/// All set fields must match; an empty criterion matches every card
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StockCriterion {
    pub item_type: Option<String>,
    pub tag: Option<String>,
    pub property: Option<String>,
    pub min_rarity: Option<Rarity>,
}

impl StockCriterion {
    pub fn item_type(item_type: &str) -> Self {
        Self {
            item_type: Some(item_type.to_string()),
            ..Default::default()
        }
    }

    pub fn property(property: &str) -> Self {
        Self {
            property: Some(property.to_string()),
            ..Default::default()
        }
    }

    pub fn min_rarity(rarity: Rarity) -> Self {
        Self {
            min_rarity: Some(rarity),
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }

    /// True when no field is set, so every card matches
    pub fn is_catch_all(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, card: &Card) -> bool {
        self.item_type.as_deref().is_none_or(|t| card.is_item_type(t))
            && self.tag.as_deref().is_none_or(|t| card.has_tag(t))
            && self.property.as_deref().is_none_or(|p| card.has_property(p))
            && self.min_rarity.is_none_or(|r| card.rarity >= r)
    }
}

impl VendorDefinition {
    pub fn new(name: &str, stock: Vec<StockCriterion>, rules: &[(Rarity, &str)]) -> Self {
        Self {
            name: name.to_string(),
            multiplier: 1,
            stock,
            rules: rules
                .iter()
                .map(|(rarity, expr)| (*rarity, expr.to_string()))
                .collect(),
        }
    }

    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// An empty `[[stock]]` table makes the vendor accept the whole catalog
    pub fn has_catch_all(&self) -> bool {
        self.stock.iter().any(StockCriterion::is_catch_all)
    }

    /// Fewest and most cards of a tier this vendor can put out, multiplier applied.
    /// None when the tier has no rule or the rule does not parse.
    pub fn quantity_range(&self, rarity: Rarity) -> Option<(u32, u32)> {
        let dice = DiceExpr::parse(self.rules.get(&rarity)?).ok()?;
        Some((
            dice.min_roll().saturating_mul(self.multiplier),
            dice.max_roll().saturating_mul(self.multiplier),
        ))
    }

    /// Check whether a card belongs in this vendor's pool
    pub fn accepts(&self, card: &Card) -> bool {
        self.stock.iter().any(|criterion| criterion.matches(card))
    }
}

// ============================================================================
// Built-in Vendors
// ============================================================================

pub const MARTIAL_TAG: &str = "Воинское";

const BASE_RULES: &[(Rarity, &str)] = &[
    (Rarity::Common, "1d10+6"),
    (Rarity::Uncommon, "1d6+1"),
    (Rarity::Rare, "1d4-1"),
    (Rarity::VeryRare, "1d2-1"),
];

const MAGIC_RULES: &[(Rarity, &str)] = &[
    (Rarity::Uncommon, "1d8+2"),
    (Rarity::Rare, "1d6"),
    (Rarity::VeryRare, "1d4-1"),
    (Rarity::Artifact, "1d2-1"),
];

/// The stalls used when no vendor files are configured
pub fn builtin_vendors() -> Vec<VendorDefinition> {
    vec![
        VendorDefinition::new(
            "Кожевник",
            vec![
                StockCriterion::property("cloth"),
                StockCriterion::property("light_armor"),
            ],
            BASE_RULES,
        ),
        VendorDefinition::new(
            "Оруженик",
            vec![StockCriterion::item_type(item_types::WEAPON)],
            BASE_RULES,
        ),
        VendorDefinition::new(
            "Кузнец-оружейник",
            vec![StockCriterion::item_type(item_types::WEAPON).with_tag(MARTIAL_TAG)],
            BASE_RULES,
        ),
        VendorDefinition::new(
            "Кузнец-броневик",
            vec![
                StockCriterion::property("medium_armor"),
                StockCriterion::property("heavy_armor"),
                StockCriterion::item_type(item_types::SHIELD),
            ],
            BASE_RULES,
        ),
        VendorDefinition::new(
            "Ювелир",
            vec![
                StockCriterion::item_type(item_types::RING),
                StockCriterion::item_type(item_types::NECKLACE),
            ],
            BASE_RULES,
        ),
        VendorDefinition::new(
            "Магическая лавка",
            vec![StockCriterion::min_rarity(Rarity::Uncommon)],
            MAGIC_RULES,
        ),
        VendorDefinition::new(
            "Лавка Раввана",
            vec![StockCriterion::min_rarity(Rarity::Uncommon)],
            MAGIC_RULES,
        )
        .with_multiplier(4),
    ]
}
