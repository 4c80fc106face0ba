//! Card field validation applied before any write.

use super::model::{Card, KNOWN_PROPERTIES};
use thiserror::Error;

pub const MIN_PRICE: i32 = 1;
pub const MAX_PRICE: i32 = 50_000;
pub const MIN_WEIGHT: f64 = 0.01;
pub const MAX_WEIGHT: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CardValidationError {
    #[error("Card name is required")]
    MissingName,
    #[error("Card description is required")]
    MissingDescription,
    #[error("Unknown property '{0}'")]
    UnknownProperty(String),
    #[error("Price must be between 1 and 50000, got {0}")]
    PriceOutOfRange(i32),
    #[error("Weight must be between 0.01 and 1000, got {0}")]
    WeightOutOfRange(f64),
}

pub fn validate_card(card: &Card) -> Result<(), CardValidationError> {
    if card.name.trim().is_empty() {
        return Err(CardValidationError::MissingName);
    }
    if card.description.trim().is_empty() {
        return Err(CardValidationError::MissingDescription);
    }

    if let Some(properties) = &card.properties {
        if let Some(unknown) = properties
            .iter()
            .find(|p| !KNOWN_PROPERTIES.contains(&p.as_str()))
        {
            return Err(CardValidationError::UnknownProperty(unknown.clone()));
        }
    }

    if let Some(price) = card.price {
        if !(MIN_PRICE..=MAX_PRICE).contains(&price) {
            return Err(CardValidationError::PriceOutOfRange(price));
        }
    }

    if let Some(weight) = card.weight {
        if !(MIN_WEIGHT..=MAX_WEIGHT).contains(&weight) {
            return Err(CardValidationError::WeightOutOfRange(weight));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::model::{CreateCardRequest, Rarity};
    use chrono::Utc;

    fn card_with(json: &str) -> Card {
        let req: CreateCardRequest = serde_json::from_str(json).unwrap();
        Card::from_request("id".into(), "CARD-0001".into(), req, Utc::now())
    }

    #[test]
    fn test_valid_card_passes() {
        let card = card_with(
            r#"{"name": "Leather Armor", "description": "Supple", "rarity": "common",
                "properties": ["light_armor"], "price": 10, "weight": 10.0}"#,
        );
        assert_eq!(card.rarity, Rarity::Common);
        assert_eq!(validate_card(&card), Ok(()));
    }

    #[test]
    fn test_rejects_blank_fields() {
        let card = card_with(r#"{"name": "  ", "description": "x", "rarity": "common"}"#);
        assert_eq!(validate_card(&card), Err(CardValidationError::MissingName));

        let card = card_with(r#"{"name": "Rope", "description": "", "rarity": "common"}"#);
        assert_eq!(validate_card(&card), Err(CardValidationError::MissingDescription));
    }

    #[test]
    fn test_rejects_unknown_property() {
        let card = card_with(
            r#"{"name": "Rope", "description": "x", "rarity": "common", "properties": ["cloth", "sticky"]}"#,
        );
        assert_eq!(
            validate_card(&card),
            Err(CardValidationError::UnknownProperty("sticky".into()))
        );
    }

    #[test]
    fn test_price_and_weight_bounds() {
        let card = card_with(r#"{"name": "Gem", "description": "x", "rarity": "rare", "price": 0}"#);
        assert_eq!(validate_card(&card), Err(CardValidationError::PriceOutOfRange(0)));

        let card = card_with(r#"{"name": "Gem", "description": "x", "rarity": "rare", "price": 50000}"#);
        assert_eq!(validate_card(&card), Ok(()));

        let card = card_with(r#"{"name": "Anvil", "description": "x", "rarity": "common", "weight": 1500.0}"#);
        assert_eq!(validate_card(&card), Err(CardValidationError::WeightOutOfRange(1500.0)));
    }
}
