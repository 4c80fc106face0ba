use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Rarity
// ============================================================================

/// Rarity tiers, ordered from most to least common
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    VeryRare,
    Artifact,
}

impl Rarity {
    pub const ALL: [Rarity; 5] = [
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::VeryRare,
        Rarity::Artifact,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::VeryRare => "very_rare",
            Rarity::Artifact => "artifact",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == value)
    }
}

// ============================================================================
// Card Enumerations
// ============================================================================

/// Whether a card is a playable item, a template, or both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TemplateType {
    #[default]
    #[serde(rename = "false")]
    NotTemplate,
    #[serde(rename = "template")]
    Template,
    #[serde(rename = "only_template")]
    OnlyTemplate,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateType::NotTemplate => "false",
            TemplateType::Template => "template",
            TemplateType::OnlyTemplate => "only_template",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "false" | "" => Some(TemplateType::NotTemplate),
            "template" => Some(TemplateType::Template),
            "only_template" => Some(TemplateType::OnlyTemplate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusType {
    Damage,
    Defense,
}

impl BonusType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BonusType::Damage => "damage",
            BonusType::Defense => "defense",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "damage" => Some(BonusType::Damage),
            "defense" => Some(BonusType::Defense),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentSlot {
    Head,
    Body,
    Arms,
    Feet,
    Cloak,
    OneHand,
    Versatile,
    TwoHands,
    Necklace,
    Ring,
}

impl EquipmentSlot {
    const ALL: [EquipmentSlot; 10] = [
        EquipmentSlot::Head,
        EquipmentSlot::Body,
        EquipmentSlot::Arms,
        EquipmentSlot::Feet,
        EquipmentSlot::Cloak,
        EquipmentSlot::OneHand,
        EquipmentSlot::Versatile,
        EquipmentSlot::TwoHands,
        EquipmentSlot::Necklace,
        EquipmentSlot::Ring,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentSlot::Head => "head",
            EquipmentSlot::Body => "body",
            EquipmentSlot::Arms => "arms",
            EquipmentSlot::Feet => "feet",
            EquipmentSlot::Cloak => "cloak",
            EquipmentSlot::OneHand => "one_hand",
            EquipmentSlot::Versatile => "versatile",
            EquipmentSlot::TwoHands => "two_hands",
            EquipmentSlot::Necklace => "necklace",
            EquipmentSlot::Ring => "ring",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

/// Item type names the vendor tables refer to
pub mod item_types {
    pub const WEAPON: &str = "weapon";
    pub const SHIELD: &str = "shield";
    pub const RING: &str = "ring";
    pub const NECKLACE: &str = "necklace";
}

/// Recognised card properties
pub const KNOWN_PROPERTIES: &[&str] = &[
    "consumable",
    "single_use",
    "light",
    "heavy",
    "finesse",
    "thrown",
    "versatile",
    "two-handed",
    "reach",
    "ammunition",
    "loading",
    "special",
    "cloth",
    "light_armor",
    "medium_armor",
    "heavy_armor",
    "shield",
    "ring",
    "necklace",
    "cloak",
];

pub const DEFAULT_AUTHOR: &str = "Admin";

// ============================================================================
// Card
// ============================================================================

/// A catalog card. Also the snapshot format embedded in generated shops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    pub description: String,
    pub detailed_description: Option<String>,
    #[serde(default)]
    pub image_url: String,
    pub rarity: Rarity,
    pub card_number: String,
    pub price: Option<i32>,
    pub weight: Option<f64>,
    pub bonus_type: Option<BonusType>,
    pub bonus_value: Option<String>,
    pub damage_type: Option<String>,
    pub defense_type: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub properties: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub attunement: Option<String>,
    #[serde(default)]
    pub author: String,
    pub source: Option<String>,
    #[serde(default)]
    pub is_template: TemplateType,
    pub slot: Option<EquipmentSlot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// Build a new card from a create request
    pub fn from_request(id: String, card_number: String, req: CreateCardRequest, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: req.name.trim().to_string(),
            description: req.description,
            detailed_description: req.detailed_description,
            image_url: req.image_url.unwrap_or_default(),
            rarity: req.rarity,
            card_number,
            price: req.price,
            weight: req.weight,
            bonus_type: req.bonus_type,
            bonus_value: req.bonus_value,
            damage_type: req.damage_type,
            defense_type: req.defense_type,
            item_type: req.item_type,
            properties: req.properties,
            tags: req.tags,
            attunement: req.attunement,
            author: req
                .author
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
            source: req.source,
            is_template: req.is_template.unwrap_or_default(),
            slot: req.slot,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply the fields present in an update request
    pub fn apply_update(&mut self, req: UpdateCardRequest, now: DateTime<Utc>) {
        if let Some(name) = req.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = req.description {
            self.description = description;
        }
        if req.detailed_description.is_some() {
            self.detailed_description = req.detailed_description;
        }
        if let Some(image_url) = req.image_url {
            self.image_url = image_url;
        }
        if let Some(rarity) = req.rarity {
            self.rarity = rarity;
        }
        if req.price.is_some() {
            self.price = req.price;
        }
        if req.weight.is_some() {
            self.weight = req.weight;
        }
        if req.bonus_type.is_some() {
            self.bonus_type = req.bonus_type;
        }
        if req.bonus_value.is_some() {
            self.bonus_value = req.bonus_value;
        }
        if req.damage_type.is_some() {
            self.damage_type = req.damage_type;
        }
        if req.defense_type.is_some() {
            self.defense_type = req.defense_type;
        }
        if req.item_type.is_some() {
            self.item_type = req.item_type;
        }
        if req.properties.is_some() {
            self.properties = req.properties;
        }
        if req.tags.is_some() {
            self.tags = req.tags;
        }
        if req.attunement.is_some() {
            self.attunement = req.attunement;
        }
        if let Some(author) = req.author.filter(|a| !a.trim().is_empty()) {
            self.author = author;
        }
        if req.source.is_some() {
            self.source = req.source;
        }
        if let Some(is_template) = req.is_template {
            self.is_template = is_template;
        }
        if req.slot.is_some() {
            self.slot = req.slot;
        }
        self.updated_at = now;
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.as_ref().is_some_and(|tags| tags.iter().any(|t| t == tag))
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.properties
            .as_ref()
            .is_some_and(|props| props.iter().any(|p| p == property))
    }

    pub fn is_item_type(&self, item_type: &str) -> bool {
        self.item_type.as_deref() == Some(item_type)
    }

    /// Template-only cards never show up as stock
    pub fn is_template_only(&self) -> bool {
        self.is_template == TemplateType::OnlyTemplate
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCardRequest {
    pub name: String,
    pub description: String,
    pub rarity: Rarity,
    pub detailed_description: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<i32>,
    pub weight: Option<f64>,
    pub bonus_type: Option<BonusType>,
    pub bonus_value: Option<String>,
    pub damage_type: Option<String>,
    pub defense_type: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub properties: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub attunement: Option<String>,
    pub author: Option<String>,
    pub source: Option<String>,
    pub is_template: Option<TemplateType>,
    pub slot: Option<EquipmentSlot>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCardRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub rarity: Option<Rarity>,
    pub detailed_description: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<i32>,
    pub weight: Option<f64>,
    pub bonus_type: Option<BonusType>,
    pub bonus_value: Option<String>,
    pub damage_type: Option<String>,
    pub defense_type: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub properties: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub attunement: Option<String>,
    pub author: Option<String>,
    pub source: Option<String>,
    pub is_template: Option<TemplateType>,
    pub slot: Option<EquipmentSlot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rarity_ordering() {
        assert!(Rarity::Common < Rarity::Uncommon);
        assert!(Rarity::Uncommon < Rarity::Rare);
        assert!(Rarity::Rare < Rarity::VeryRare);
        assert!(Rarity::VeryRare < Rarity::Artifact);
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_string(&Rarity::VeryRare).unwrap(), "\"very_rare\"");
        assert_eq!(serde_json::to_string(&TemplateType::NotTemplate).unwrap(), "\"false\"");
        assert_eq!(serde_json::to_string(&EquipmentSlot::TwoHands).unwrap(), "\"two_hands\"");

        for rarity in Rarity::ALL {
            assert_eq!(Rarity::parse(rarity.as_str()), Some(rarity));
        }
        assert_eq!(TemplateType::parse("only_template"), Some(TemplateType::OnlyTemplate));
        assert_eq!(EquipmentSlot::parse("one_hand"), Some(EquipmentSlot::OneHand));
        assert_eq!(BonusType::parse("armor"), None);
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateCardRequest = serde_json::from_str(
            r#"{"name": "  Longsword ", "description": "Steel", "rarity": "common", "type": "weapon"}"#,
        )
        .unwrap();
        let card = Card::from_request("id-1".into(), "CARD-0001".into(), req, Utc::now());

        assert_eq!(card.name, "Longsword");
        assert_eq!(card.author, DEFAULT_AUTHOR);
        assert_eq!(card.is_template, TemplateType::NotTemplate);
        assert!(card.is_item_type(item_types::WEAPON));
        assert!(!card.has_tag("Воинское"));
    }

    #[test]
    fn test_apply_update_keeps_absent_fields() {
        let req: CreateCardRequest = serde_json::from_str(
            r#"{"name": "Cloak", "description": "Warm", "rarity": "uncommon", "price": 40, "tags": ["travel"]}"#,
        )
        .unwrap();
        let mut card = Card::from_request("id-2".into(), "CARD-0002".into(), req, Utc::now());

        let update = UpdateCardRequest {
            price: Some(55),
            rarity: Some(Rarity::Rare),
            ..Default::default()
        };
        card.apply_update(update, Utc::now());

        assert_eq!(card.price, Some(55));
        assert_eq!(card.rarity, Rarity::Rare);
        assert_eq!(card.name, "Cloak");
        assert!(card.has_tag("travel"));
    }
}
