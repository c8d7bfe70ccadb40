// Shared data contract for the ingest and export flows

use chrono::NaiveDate;
use serde::Serialize;

/// Column names written as the first row of every exported payload.
pub const HEADER: [&str; 5] = ["id", "name", "category", "price", "create_date"];

/// Number of fields in every row of the tabular payload.
pub const FIELD_COUNT: usize = HEADER.len();

/// Calendar format shared by validation, storage and export.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// RECORD
// ============================================================================

/// One priced item. Immutable once committed to the store.
///
/// Prices are held as whole cents so storage, aggregation and export agree
/// exactly with the two-decimal text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub price_cents: i64,
    pub created_at: NaiveDate,
}

impl Record {
    /// Encode into the five canonical text fields, in header order.
    pub fn to_fields(&self) -> [String; FIELD_COUNT] {
        [
            self.id.to_string(),
            self.name.clone(),
            self.category.clone(),
            format_cents(self.price_cents),
            self.created_at.format(DATE_FORMAT).to_string(),
        ]
    }
}

/// RawRow - one decoded line before validation
/// `line` is the 1-based line of the row inside the payload (header is line 1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub line: u64,
    pub fields: [String; FIELD_COUNT],
}

impl RawRow {
    pub fn id(&self) -> &str {
        &self.fields[0]
    }

    pub fn name(&self) -> &str {
        &self.fields[1]
    }

    pub fn category(&self) -> &str {
        &self.fields[2]
    }

    pub fn price(&self) -> &str {
        &self.fields[3]
    }

    pub fn created_at(&self) -> &str {
        &self.fields[4]
    }
}

/// Two-decimal text for a non-negative cent amount: 1234 -> "12.34".
pub fn format_cents(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

// ============================================================================
// STATISTICS
// ============================================================================

/// Grand-total aggregates over the whole store, read inside the committing
/// transaction. Serialized as the ingest response body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceStats {
    pub total_items: i64,
    pub total_categories: i64,
    pub total_price: f64,
}

impl PriceStats {
    /// Build from the exact cent sum; the float is derived once, here.
    pub fn from_cents(total_items: i64, total_categories: i64, total_cents: i64) -> Self {
        PriceStats {
            total_items,
            total_categories,
            total_price: total_cents as f64 / 100.0,
        }
    }
}

/// Outcome of one atomic commit: rows written by this call plus the
/// statistics describing the store right after them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchCommit {
    pub inserted: usize,
    pub stats: PriceStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_fields_formats_price_and_date() {
        let record = Record {
            id: 7,
            name: "Widget".to_string(),
            category: "tools".to_string(),
            price_cents: 1250,
            created_at: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
        };

        let fields = record.to_fields();

        assert_eq!(fields[0], "7");
        assert_eq!(fields[3], "12.50");
        assert_eq!(fields[4], "2024-03-09");
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(123), "1.23");
        assert_eq!(format_cents(100_000_099), "1000000.99");
    }

    #[test]
    fn test_stats_from_cents_has_no_float_drift() {
        // 0.10 + 0.20 summed as cents
        let stats = PriceStats::from_cents(2, 1, 10 + 20);

        assert_eq!(stats.total_price, 0.3);
        assert_eq!(
            serde_json::to_string(&stats).unwrap(),
            r#"{"total_items":2,"total_categories":1,"total_price":0.3}"#
        );
    }

    #[test]
    fn test_stats_serialize_with_snake_case_keys() {
        let stats = PriceStats {
            total_items: 3,
            total_categories: 2,
            total_price: 600.0,
        };

        let json = serde_json::to_value(stats).unwrap();

        assert_eq!(json["total_items"], 3);
        assert_eq!(json["total_categories"], 2);
        assert_eq!(json["total_price"], 600.0);
    }
}
