//! Dice expressions
//!
//! Parses and rolls quantity formulas such as "1d10+6", "d4-1" or "2d6".
//! Vendors use these to decide how many items of a rarity tier they stock.

use rand::Rng;
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Upper bound on dice per expression; larger counts are rejected as malformed.
pub const MAX_DICE_COUNT: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceParseError {
    #[error("empty dice expression")]
    Empty,
    #[error("missing 'd' separator in '{0}'")]
    MissingSeparator(String),
    #[error("invalid dice count '{0}'")]
    InvalidCount(String),
    #[error("too many dice: {0}")]
    TooManyDice(u32),
    #[error("invalid die size '{0}'")]
    InvalidSides(String),
    #[error("invalid modifier '{0}'")]
    InvalidModifier(String),
}

/// A parsed `[count]d<sides>[+|-modifier]` expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceExpr {
    pub count: u32,
    pub sides: u32,
    pub modifier: i64,
}

impl DiceExpr {
    pub fn parse(input: &str) -> Result<Self, DiceParseError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(DiceParseError::Empty);
        }

        let (count_str, rest) = input
            .split_once(|c: char| c == 'd' || c == 'D')
            .ok_or_else(|| DiceParseError::MissingSeparator(input.to_string()))?;

        let count_str = count_str.trim();
        let count = if count_str.is_empty() {
            1
        } else {
            parse_digits(count_str)
                .ok_or_else(|| DiceParseError::InvalidCount(count_str.to_string()))?
        };
        if count > MAX_DICE_COUNT {
            return Err(DiceParseError::TooManyDice(count));
        }

        let (sides_str, modifier) = match rest.find(|c: char| c == '+' || c == '-') {
            Some(pos) => {
                let mod_str = rest[pos + 1..].trim();
                let magnitude = parse_digits(mod_str)
                    .ok_or_else(|| DiceParseError::InvalidModifier(rest[pos..].to_string()))?;
                let magnitude = i64::from(magnitude);
                let modifier = if rest[pos..].starts_with('-') { -magnitude } else { magnitude };
                (&rest[..pos], modifier)
            }
            None => (rest, 0),
        };

        let sides_str = sides_str.trim();
        let sides = parse_digits(sides_str)
            .filter(|&sides| sides > 0)
            .ok_or_else(|| DiceParseError::InvalidSides(sides_str.to_string()))?;

        Ok(Self { count, sides, modifier })
    }

    /// Roll the expression; the result is floored at zero
    pub fn roll<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let mut total: i64 = 0;
        for _ in 0..self.count {
            total += i64::from(rng.gen_range(1..=self.sides));
        }
        Self::clamp(total + self.modifier)
    }

    pub fn min_roll(&self) -> u32 {
        Self::clamp(i64::from(self.count) + self.modifier)
    }

    pub fn max_roll(&self) -> u32 {
        Self::clamp(i64::from(self.count) * i64::from(self.sides) + self.modifier)
    }

    fn clamp(value: i64) -> u32 {
        u32::try_from(value.max(0)).unwrap_or(u32::MAX)
    }
}

impl fmt::Display for DiceExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.modifier {
            0 => write!(f, "{}d{}", self.count, self.sides),
            m if m > 0 => write!(f, "{}d{}+{}", self.count, self.sides, m),
            m => write!(f, "{}d{}{}", self.count, self.sides, m),
        }
    }
}

// Plain decimal digits only; `str::parse` would also accept a leading '+'.
fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Roll a stocking rule. Malformed expressions stock nothing.
pub fn roll_quantity<R: Rng + ?Sized>(expr: &str, rng: &mut R) -> u32 {
    match DiceExpr::parse(expr) {
        Ok(dice) => dice.roll(rng),
        Err(e) => {
            warn!("Ignoring dice rule '{}': {}", expr, e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_parse_full_expression() {
        let dice = DiceExpr::parse("1d10+6").unwrap();
        assert_eq!(dice, DiceExpr { count: 1, sides: 10, modifier: 6 });

        let dice = DiceExpr::parse(" 3d4 - 2 ").unwrap();
        assert_eq!(dice, DiceExpr { count: 3, sides: 4, modifier: -2 });
    }

    #[test]
    fn test_parse_defaults_count_to_one() {
        let dice = DiceExpr::parse("d6").unwrap();
        assert_eq!(dice.count, 1);
        assert_eq!(dice.sides, 6);
        assert_eq!(dice.modifier, 0);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(DiceExpr::parse(""), Err(DiceParseError::Empty));
        assert!(matches!(DiceExpr::parse("abc"), Err(DiceParseError::MissingSeparator(_))));
        assert!(matches!(DiceExpr::parse("d"), Err(DiceParseError::InvalidSides(_))));
        assert!(matches!(DiceExpr::parse("1d0"), Err(DiceParseError::InvalidSides(_))));
        assert!(matches!(DiceExpr::parse("xd6"), Err(DiceParseError::InvalidCount(_))));
        assert!(matches!(DiceExpr::parse("1d6+"), Err(DiceParseError::InvalidModifier(_))));
        assert!(matches!(DiceExpr::parse("1d6+1+2"), Err(DiceParseError::InvalidModifier(_))));
        assert!(matches!(DiceExpr::parse("1d6++1"), Err(DiceParseError::InvalidModifier(_))));
        assert!(matches!(DiceExpr::parse("+1d6"), Err(DiceParseError::InvalidCount(_))));
        assert!(matches!(DiceExpr::parse("1d6d6"), Err(DiceParseError::InvalidSides(_))));
        assert!(matches!(DiceExpr::parse("5000d6"), Err(DiceParseError::TooManyDice(5000))));
    }

    #[test]
    fn test_rolls_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let value = roll_quantity("1d10+6", &mut rng);
            assert!((7..=16).contains(&value), "1d10+6 rolled {}", value);

            let value = roll_quantity("1d4-1", &mut rng);
            assert!(value <= 3, "1d4-1 rolled {}", value);

            let value = roll_quantity("2d6", &mut rng);
            assert!((2..=12).contains(&value), "2d6 rolled {}", value);
        }
    }

    #[test]
    fn test_negative_totals_floor_at_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(roll_quantity("1d2-5", &mut rng), 0);
        }
        let dice = DiceExpr::parse("1d4-1").unwrap();
        assert_eq!(dice.min_roll(), 0);
        assert_eq!(dice.max_roll(), 3);
    }

    #[test]
    fn test_malformed_rolls_zero() {
        let mut rng = StdRng::seed_from_u64(3);
        for expr in ["abc", "d", "", "1d", "1d6++1", "-1d6"] {
            assert_eq!(roll_quantity(expr, &mut rng), 0, "expected zero for '{}'", expr);
        }
    }

    #[test]
    fn test_single_sided_die_is_constant() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            assert_eq!(roll_quantity("1d1", &mut rng), 1);
        }
    }

    #[test]
    fn test_display_round_trips_sign() {
        assert_eq!(DiceExpr::parse("1d4-1").unwrap().to_string(), "1d4-1");
        assert_eq!(DiceExpr::parse("d8+2").unwrap().to_string(), "1d8+2");
        assert_eq!(DiceExpr::parse("1d6").unwrap().to_string(), "1d6");
    }
}
