pub mod model;
pub mod validate;

pub use model::{
    BonusType, Card, CreateCardRequest, EquipmentSlot, Rarity, TemplateType, UpdateCardRequest,
};
pub use validate::{validate_card, CardValidationError};
