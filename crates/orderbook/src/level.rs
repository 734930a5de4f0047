//! Price level representation and raw record decoding.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RecordError;

/// Marks whether the exchange re-sent a level.
///
/// The marker is carried through untouched; nothing in the book interprets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LevelKind {
    #[default]
    Plain,
    Republish(String),
}

/// A single price level in the order book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// The price at this level.
    pub price: Decimal,
    /// The total volume resting at this price.
    pub volume: Decimal,
    /// Opaque freshness token from the feed.
    pub timestamp: Option<String>,
    pub kind: LevelKind,
}

impl PriceLevel {
    /// Creates a new plain price level without a timestamp.
    pub fn new(price: Decimal, volume: Decimal) -> Self {
        Self {
            price,
            volume,
            timestamp: None,
            kind: LevelKind::Plain,
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_republish(mut self, marker: impl Into<String>) -> Self {
        self.kind = LevelKind::Republish(marker.into());
        self
    }

    /// Decode a raw `[price, volume, timestamp?, republish?]` record.
    ///
    /// This is the only place the record arity is inspected.
    pub fn from_record(record: &Value) -> Result<Self, RecordError> {
        let elements = record
            .as_array()
            .ok_or_else(|| RecordError::NotAnArray(record.to_string()))?;

        match elements.len() {
            0 | 1 => return Err(RecordError::TooFewElements(elements.len())),
            2..=4 => {}
            n => return Err(RecordError::TooManyElements(n)),
        }

        let price = price_of(record)?;
        let volume = volume_of(record)?;
        let timestamp = elements.get(2).and_then(opaque_text);
        let kind = match elements.get(3) {
            Some(marker) => LevelKind::Republish(opaque_text(marker).unwrap_or_default()),
            None => LevelKind::Plain,
        };

        Ok(Self {
            price,
            volume,
            timestamp,
            kind,
        })
    }

    /// Returns true if the exchange flagged this level as re-sent.
    pub fn is_republish(&self) -> bool {
        matches!(self.kind, LevelKind::Republish(_))
    }

    /// A zero-volume level means "remove this price".
    pub fn is_removal(&self) -> bool {
        self.volume.is_zero()
    }

}

/// First element of a record as a positive exact decimal.
pub fn price_of(record: &Value) -> Result<Decimal, RecordError> {
    let raw = record
        .get(0)
        .ok_or_else(|| RecordError::InvalidPrice("missing".to_string()))?;
    let price = decimal_from_value(raw)
        .ok_or_else(|| RecordError::InvalidPrice(raw.to_string()))?;
    if price <= Decimal::ZERO {
        return Err(RecordError::InvalidPrice(price.to_string()));
    }
    Ok(price)
}

/// Second element of a record as a non-negative exact decimal.
pub fn volume_of(record: &Value) -> Result<Decimal, RecordError> {
    let raw = record
        .get(1)
        .ok_or_else(|| RecordError::InvalidVolume("missing".to_string()))?;
    let volume = decimal_from_value(raw)
        .ok_or_else(|| RecordError::InvalidVolume(raw.to_string()))?;
    if volume.is_sign_negative() && !volume.is_zero() {
        return Err(RecordError::InvalidVolume(volume.to_string()));
    }
    Ok(volume)
}

/// Sum of level volumes, saturating at `Decimal::MAX`.
pub(crate) fn cumulative_volume<'a>(levels: impl Iterator<Item = &'a PriceLevel>) -> Decimal {
    levels.fold(Decimal::ZERO, |total, level| total.saturating_add(level.volume))
}

/// Republish records are exactly the four-element ones.
pub fn is_republish(record: &Value) -> bool {
    record.as_array().is_some_and(|elements| elements.len() == 4)
}

/// Linear scan for the level at exactly `price`.
pub fn find_by_price(levels: &[PriceLevel], price: Decimal) -> Option<&PriceLevel> {
    levels.iter().find(|level| level.price == price)
}

/// Index at which `price` belongs in a sorted sequence.
///
/// For descending order this is the first index whose price is not greater
/// than `price`; for ascending order the first whose price is not less. When
/// a level at `price` exists, its index is returned. The sequence must already
/// be strictly sorted in the given direction, which makes the predicate a
/// prefix and lets the scan be a binary search.
pub fn find_insertion_index(levels: &[PriceLevel], price: Decimal, descending: bool) -> usize {
    if descending {
        levels.partition_point(|level| level.price > price)
    } else {
        levels.partition_point(|level| level.price < price)
    }
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(text) => parse_decimal(text.trim()),
        Value::Number(number) => {
            if let Some(n) = number.as_i64() {
                Some(Decimal::from(n))
            } else if let Some(n) = number.as_u64() {
                Some(Decimal::from(n))
            } else {
                parse_decimal(&number.to_string())
            }
        }
        _ => None,
    }
}

/// Parse without rounding; text that `Decimal` cannot hold exactly is rejected.
fn parse_decimal(text: &str) -> Option<Decimal> {
    let Some((mantissa, exponent)) = text.split_once(|c| c == 'e' || c == 'E') else {
        return Decimal::from_str_exact(text).ok();
    };

    let mut value = Decimal::from_str_exact(mantissa).ok()?;
    let exponent: i32 = exponent.parse().ok()?;
    if value.is_zero() {
        return Some(value);
    }

    if exponent < 0 {
        let scale = value.scale().checked_add(exponent.unsigned_abs())?;
        value.set_scale(scale).ok()?;
    } else {
        // Spend the fractional digits first, then grow the integer part; a
        // non-zero integer overflows within 29 steps.
        let exponent = exponent.unsigned_abs();
        let shift = exponent.min(value.scale());
        value.set_scale(value.scale() - shift).ok()?;
        for _ in shift..exponent {
            value = value.checked_mul(Decimal::TEN)?;
        }
    }
    Some(value)
}

fn opaque_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn levels(prices: &[Decimal]) -> Vec<PriceLevel> {
        prices.iter().map(|p| PriceLevel::new(*p, dec!(1))).collect()
    }

    #[test]
    fn test_decode_plain_record() {
        let level = PriceLevel::from_record(&json!(["100.5", "2", "111"])).unwrap();
        assert_eq!(level.price, dec!(100.5));
        assert_eq!(level.volume, dec!(2));
        assert_eq!(level.timestamp.as_deref(), Some("111"));
        assert_eq!(level.kind, LevelKind::Plain);
        assert!(!level.is_republish());
    }

    #[test]
    fn test_decode_two_element_record() {
        let level = PriceLevel::from_record(&json!(["10", "1"])).unwrap();
        assert_eq!(level, PriceLevel::new(dec!(10), dec!(1)));
    }

    #[test]
    fn test_decode_republish_record() {
        let record = json!(["5541.30000", "2.50700000", "1534614248.456738", "r"]);
        assert!(is_republish(&record));

        let level = PriceLevel::from_record(&record).unwrap();
        assert_eq!(
            level,
            PriceLevel::new(dec!(5541.3), dec!(2.507))
                .with_timestamp("1534614248.456738")
                .with_republish("r")
        );
        assert_eq!(level.kind, LevelKind::Republish("r".to_string()));
        assert!(level.is_republish());
    }

    #[test]
    fn test_decode_numeric_elements() {
        let level = PriceLevel::from_record(&json!([101, 3, 1534614248])).unwrap();
        assert_eq!(level.price, dec!(101));
        assert_eq!(level.volume, dec!(3));
        assert_eq!(level.timestamp.as_deref(), Some("1534614248"));

        let level = PriceLevel::from_record(&json!([100.25, "0.5"])).unwrap();
        assert_eq!(level.price, dec!(100.25));
    }

    #[test]
    fn test_decode_scientific_notation() {
        let level = PriceLevel::from_record(&json!(["1e-8", "5"])).unwrap();
        assert_eq!(level.price, dec!(0.00000001));
    }

    #[test]
    fn test_decode_preserves_precision() {
        let record = json!(["100.1234567890123456789", "1"]);
        let level = PriceLevel::from_record(&record).unwrap();
        assert_eq!(level.price, dec!(100.1234567890123456789));
    }

    #[test]
    fn test_malformed_records() {
        assert!(matches!(
            PriceLevel::from_record(&json!({"price": "1"})),
            Err(RecordError::NotAnArray(_))
        ));
        assert_eq!(
            PriceLevel::from_record(&json!(["10"])),
            Err(RecordError::TooFewElements(1))
        );
        assert_eq!(
            PriceLevel::from_record(&json!([])),
            Err(RecordError::TooFewElements(0))
        );
        assert_eq!(
            PriceLevel::from_record(&json!(["10", "1", "1", "r", "x"])),
            Err(RecordError::TooManyElements(5))
        );
        assert!(matches!(
            PriceLevel::from_record(&json!(["abc", "1"])),
            Err(RecordError::InvalidPrice(_))
        ));
        assert!(matches!(
            PriceLevel::from_record(&json!(["0", "1"])),
            Err(RecordError::InvalidPrice(_))
        ));
        assert!(matches!(
            PriceLevel::from_record(&json!(["10", "-1"])),
            Err(RecordError::InvalidVolume(_))
        ));
        assert!(matches!(
            PriceLevel::from_record(&json!(["10", null])),
            Err(RecordError::InvalidVolume(_))
        ));
    }

    #[test]
    fn test_zero_volume_is_removal() {
        let level = PriceLevel::from_record(&json!(["10", "0.00000000", "2"])).unwrap();
        assert!(level.is_removal());
    }

    #[test]
    fn test_price_and_volume_accessors() {
        let record = json!(["100.5", "2", "111"]);
        assert_eq!(price_of(&record).unwrap(), dec!(100.5));
        assert_eq!(volume_of(&record).unwrap(), dec!(2));
        assert!(!is_republish(&record));
        assert!(!is_republish(&json!("not a record")));
    }

    #[test]
    fn test_find_by_price_exact() {
        let side = levels(&[dec!(101.0), dec!(100.5), dec!(100.0)]);
        assert_eq!(
            find_by_price(&side, dec!(100.50)).map(|l| l.price),
            Some(dec!(100.5))
        );
        assert!(find_by_price(&side, dec!(100.5000001)).is_none());
    }

    #[test]
    fn test_insertion_index_descending() {
        let side = levels(&[dec!(101.0), dec!(100.5), dec!(100.0)]);
        assert_eq!(find_insertion_index(&side, dec!(102), true), 0);
        assert_eq!(find_insertion_index(&side, dec!(100.5), true), 1);
        assert_eq!(find_insertion_index(&side, dec!(100.2), true), 2);
        assert_eq!(find_insertion_index(&side, dec!(99), true), 3);
        assert_eq!(find_insertion_index(&[], dec!(99), true), 0);
    }

    #[test]
    fn test_insertion_index_ascending() {
        let side = levels(&[dec!(50.0), dec!(51.0)]);
        assert_eq!(find_insertion_index(&side, dec!(49.5), false), 0);
        assert_eq!(find_insertion_index(&side, dec!(51.0), false), 1);
        assert_eq!(find_insertion_index(&side, dec!(50.5), false), 1);
        assert_eq!(find_insertion_index(&side, dec!(52), false), 2);
    }

    #[test]
    fn test_decode_rejects_prices_that_would_round() {
        // 29 fractional digits, one more than `Decimal` can hold
        let first = json!(["0.12345678901234567890123456781", "1"]);
        let second = json!(["0.12345678901234567890123456782", "2"]);

        assert!(matches!(price_of(&first), Err(RecordError::InvalidPrice(_))));
        assert!(matches!(
            PriceLevel::from_record(&second),
            Err(RecordError::InvalidPrice(_))
        ));
        assert!(matches!(
            PriceLevel::from_record(&json!(["10", "1.00000000000000000000000000001"])),
            Err(RecordError::InvalidVolume(_))
        ));
    }

    #[test]
    fn test_decode_scientific_is_exact() {
        assert_eq!(price_of(&json!(["2.5E3", "1"])).unwrap(), dec!(2500));
        assert_eq!(
            price_of(&json!(["0.01e30", "1"])).unwrap(),
            Decimal::from_str_exact("10000000000000000000000000000").unwrap()
        );
        assert_eq!(volume_of(&json!(["1", "0e99"])).unwrap(), Decimal::ZERO);
        assert!(matches!(
            price_of(&json!(["1e-29", "1"])),
            Err(RecordError::InvalidPrice(_))
        ));
        assert!(matches!(
            price_of(&json!(["1e40", "1"])),
            Err(RecordError::InvalidPrice(_))
        ));
    }
}
