use super::{decode_error, Database};
use crate::card::{BonusType, Card, EquipmentSlot, Rarity, TemplateType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{QueryBuilder, Row};
use std::collections::HashMap;

const CARD_COLUMNS: &str = "id, name, description, detailed_description, image_url, rarity, card_number, \
     price, weight, bonus_type, bonus_value, damage_type, defense_type, item_type, properties, tags, \
     attunement, author, source, is_template, slot, created_at, updated_at";

const RARITY_RANK: &str = "CASE rarity WHEN 'common' THEN 0 WHEN 'uncommon' THEN 1 WHEN 'rare' THEN 2 \
     WHEN 'very_rare' THEN 3 WHEN 'artifact' THEN 4 ELSE 5 END";

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;
/// Pages past this are clamped; keeps the OFFSET arithmetic in range
pub const MAX_PAGE: i64 = 1_000_000;

// ============================================================================
// Listing
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardSort {
    CreatedAsc,
    #[default]
    CreatedDesc,
    UpdatedAsc,
    UpdatedDesc,
    RarityAsc,
    RarityDesc,
    PriceAsc,
    PriceDesc,
}

impl CardSort {
    fn order_by(&self) -> String {
        match self {
            CardSort::CreatedAsc => "created_at ASC".to_string(),
            CardSort::CreatedDesc => "created_at DESC".to_string(),
            CardSort::UpdatedAsc => "updated_at ASC".to_string(),
            CardSort::UpdatedDesc => "updated_at DESC".to_string(),
            CardSort::RarityAsc => format!("{} ASC", RARITY_RANK),
            CardSort::RarityDesc => format!("{} DESC", RARITY_RANK),
            CardSort::PriceAsc => "price ASC".to_string(),
            CardSort::PriceDesc => "price DESC".to_string(),
        }
    }
}

/// Catalog listing filters, deserialized straight from the query string
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CardFilter {
    pub rarity: Option<Rarity>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    pub slot: Option<EquipmentSlot>,
    pub search: Option<String>,
    #[serde(default)]
    pub exclude_template_only: bool,
    #[serde(default)]
    pub template_only: bool,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub sort_by: CardSort,
}

impl CardFilter {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    fn push_conditions(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE deleted_at IS NULL");

        if let Some(rarity) = self.rarity {
            qb.push(" AND rarity = ").push_bind(rarity.as_str());
        }
        if let Some(item_type) = self.item_type.as_ref().filter(|t| !t.is_empty()) {
            qb.push(" AND item_type = ").push_bind(item_type.clone());
        }
        if let Some(slot) = self.slot {
            qb.push(" AND slot = ").push_bind(slot.as_str());
        }
        if let Some(search) = self.search.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            qb.push(" AND (name LIKE ")
                .push_bind(format!("%{}%", escape_like(search)))
                .push(" ESCAPE '\\' OR card_number = ")
                .push_bind(search.to_string())
                .push(")");
        }
        if self.exclude_template_only {
            qb.push(" AND is_template != 'only_template'");
        }
        if self.template_only {
            qb.push(" AND is_template IN ('template', 'only_template')");
        }
    }
}

/// Escape LIKE wildcards so user input matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, Clone, Serialize)]
pub struct CardPage {
    pub cards: Vec<Card>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

// ============================================================================
// Queries
// ============================================================================

impl Database {
    pub async fn insert_card(&self, card: &Card) -> Result<(), sqlx::Error> {
        let properties = encode_list(&card.properties)?;
        let tags = encode_list(&card.tags)?;

        sqlx::query(
            r#"INSERT INTO cards (
                id, name, description, detailed_description, image_url, rarity, card_number,
                price, weight, bonus_type, bonus_value, damage_type, defense_type, item_type,
                properties, tags, attunement, author, source, is_template, slot, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&card.id)
        .bind(&card.name)
        .bind(&card.description)
        .bind(&card.detailed_description)
        .bind(&card.image_url)
        .bind(card.rarity.as_str())
        .bind(&card.card_number)
        .bind(card.price)
        .bind(card.weight)
        .bind(card.bonus_type.map(|b| b.as_str()))
        .bind(&card.bonus_value)
        .bind(&card.damage_type)
        .bind(&card.defense_type)
        .bind(&card.item_type)
        .bind(properties)
        .bind(tags)
        .bind(&card.attunement)
        .bind(&card.author)
        .bind(&card.source)
        .bind(card.is_template.as_str())
        .bind(card.slot.map(|s| s.as_str()))
        .bind(card.created_at)
        .bind(card.updated_at)
        .execute(&self.pool)
        .await?;

        tracing::info!("Created card {} ({})", card.card_number, card.name);
        Ok(())
    }

    /// Next `CARD-NNNN` number. Soft-deleted cards keep their numbers.
    pub async fn next_card_number(&self) -> Result<String, sqlx::Error> {
        // Compare numerically: as text, "CARD-9999" sorts after "CARD-10000"
        let max: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(CAST(substr(card_number, 6) AS INTEGER)) FROM cards WHERE card_number LIKE 'CARD-%'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(format!("CARD-{:04}", max.unwrap_or(0) + 1))
    }

    pub async fn get_card(&self, id: &str) -> Result<Option<Card>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM cards WHERE id = ? AND deleted_at IS NULL",
            CARD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(card_from_row).transpose()
    }

    pub async fn list_cards(&self, filter: &CardFilter) -> Result<CardPage, sqlx::Error> {
        let page = filter.page();
        let limit = filter.limit();

        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM cards");
        filter.push_conditions(&mut count_query);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM cards", CARD_COLUMNS));
        filter.push_conditions(&mut select);
        select
            .push(" ORDER BY ")
            .push(filter.sort_by.order_by())
            .push(", card_number ASC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind((page - 1).saturating_mul(limit));

        let rows = select.build().fetch_all(&self.pool).await?;
        let cards = rows.iter().map(card_from_row).collect::<Result<Vec<_>, _>>()?;

        Ok(CardPage { cards, total, page, limit })
    }

    /// Overwrite a live card. Returns false when it does not exist.
    pub async fn update_card(&self, card: &Card) -> Result<bool, sqlx::Error> {
        let properties = encode_list(&card.properties)?;
        let tags = encode_list(&card.tags)?;

        let result = sqlx::query(
            r#"UPDATE cards SET
                name = ?, description = ?, detailed_description = ?, image_url = ?, rarity = ?,
                price = ?, weight = ?, bonus_type = ?, bonus_value = ?, damage_type = ?,
                defense_type = ?, item_type = ?, properties = ?, tags = ?, attunement = ?,
                author = ?, source = ?, is_template = ?, slot = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL"#,
        )
        .bind(&card.name)
        .bind(&card.description)
        .bind(&card.detailed_description)
        .bind(&card.image_url)
        .bind(card.rarity.as_str())
        .bind(card.price)
        .bind(card.weight)
        .bind(card.bonus_type.map(|b| b.as_str()))
        .bind(&card.bonus_value)
        .bind(&card.damage_type)
        .bind(&card.defense_type)
        .bind(&card.item_type)
        .bind(properties)
        .bind(tags)
        .bind(&card.attunement)
        .bind(&card.author)
        .bind(&card.source)
        .bind(card.is_template.as_str())
        .bind(card.slot.map(|s| s.as_str()))
        .bind(card.updated_at)
        .bind(&card.id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Soft delete. Returns false when the card is missing or already deleted.
    pub async fn delete_card(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE cards SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Cards by id, soft-deleted ones included so held items keep their card
    pub(super) async fn cards_by_ids(&self, ids: &[String]) -> Result<HashMap<String, Card>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM cards WHERE id IN (", CARD_COLUMNS));
        let mut separated = select.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");

        let rows = select.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| card_from_row(row).map(|card| (card.id.clone(), card)))
            .collect()
    }

    /// Snapshot of every stockable card: not deleted and not template-only
    pub async fn load_catalog(&self) -> Result<Vec<Card>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM cards WHERE deleted_at IS NULL AND is_template != 'only_template' ORDER BY card_number",
            CARD_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(card_from_row).collect()
    }
}

// ============================================================================
// Row Mapping
// ============================================================================

fn encode_list(list: &Option<Vec<String>>) -> Result<Option<String>, sqlx::Error> {
    list.as_ref()
        .map(|values| serde_json::to_string(values).map_err(|e| sqlx::Error::Encode(Box::new(e))))
        .transpose()
}

fn decode_list(row: &SqliteRow, column: &str) -> Result<Option<Vec<String>>, sqlx::Error> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|json| {
        serde_json::from_str(&json).map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
    })
    .transpose()
}

fn decode_optional<T>(
    row: &SqliteRow,
    column: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>, sqlx::Error> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| parse(&value).ok_or_else(|| decode_error(column, &value)))
        .transpose()
}

fn card_from_row(row: &SqliteRow) -> Result<Card, sqlx::Error> {
    let rarity: String = row.try_get("rarity")?;
    let is_template: Option<String> = row.try_get("is_template")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(Card {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        detailed_description: row.try_get("detailed_description")?,
        image_url: row.try_get("image_url")?,
        rarity: Rarity::parse(&rarity).ok_or_else(|| decode_error("rarity", &rarity))?,
        card_number: row.try_get("card_number")?,
        price: row.try_get("price")?,
        weight: row.try_get("weight")?,
        bonus_type: decode_optional(row, "bonus_type", BonusType::parse)?,
        bonus_value: row.try_get("bonus_value")?,
        damage_type: row.try_get("damage_type")?,
        defense_type: row.try_get("defense_type")?,
        item_type: row.try_get("item_type")?,
        properties: decode_list(row, "properties")?,
        tags: decode_list(row, "tags")?,
        attunement: row.try_get("attunement")?,
        author: row.try_get("author")?,
        source: row.try_get("source")?,
        is_template: match is_template {
            Some(value) => {
                TemplateType::parse(&value).ok_or_else(|| decode_error("is_template", &value))?
            }
            None => TemplateType::NotTemplate,
        },
        slot: decode_optional(row, "slot", EquipmentSlot::parse)?,
        created_at,
        updated_at,
    })
}
