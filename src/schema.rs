// Shape Layer - Record validation
// Maps one raw field tuple to a typed Record. Pure: never touches the store.

use crate::error::{PipelineError, PipelineResult};
use crate::record::{RawRow, Record, DATE_FORMAT};
use chrono::NaiveDate;

/// RecordValidator - coerces raw text fields into a `Record`
///
/// Every field is trimmed of surrounding whitespace first. The first failing
/// field decides the error; fields are checked in column order.
#[derive(Debug, Clone, Default)]
pub struct RecordValidator;

impl RecordValidator {
    pub fn new() -> Self {
        RecordValidator
    }

    pub fn validate(&self, row: &RawRow) -> PipelineResult<Record> {
        let line = row.line;

        let id = parse_identifier(row.id().trim()).ok_or_else(|| {
            PipelineError::InvalidIdentifier {
                line,
                value: row.id().to_string(),
            }
        })?;

        let name = require_text(row.name(), "name", line)?;
        let category = require_text(row.category(), "category", line)?;

        let price_cents =
            parse_price_cents(row.price().trim()).ok_or_else(|| PipelineError::InvalidPrice {
                line,
                value: row.price().to_string(),
            })?;

        let created_at = NaiveDate::parse_from_str(row.created_at().trim(), DATE_FORMAT)
            .map_err(|_| PipelineError::InvalidDate {
                line,
                value: row.created_at().to_string(),
            })?;

        Ok(Record {
            id,
            name,
            category,
            price_cents,
            created_at,
        })
    }
}

// ============================================================================
// FIELD RULES
// ============================================================================

/// Non-negative integer made of ASCII digits only.
fn parse_identifier(text: &str) -> Option<i64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<i64>().ok()
}

fn require_text(value: &str, field: &'static str, line: u64) -> PipelineResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::InvalidField { line, field });
    }
    Ok(trimmed.to_string())
}

/// Plain decimal `digits[.digits]` converted to whole cents. Signs, exponents
/// and NaN/inf are rejected. Digits past the second decimal are rounded half up,
/// so the stored value is exactly what export prints.
fn parse_price_cents(text: &str) -> Option<i64> {
    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));

    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !digits(whole) || !digits(fraction) {
        return None;
    }

    let units = if whole.is_empty() {
        0
    } else {
        whole.parse::<i64>().ok()?
    };

    let mut decimals = fraction.bytes().map(|b| i64::from(b - b'0'));
    let tenths = decimals.next().unwrap_or(0);
    let hundredths = decimals.next().unwrap_or(0);
    let round_up = decimals.next().is_some_and(|d| d >= 5);

    units
        .checked_mul(100)?
        .checked_add(tenths * 10 + hundredths + i64::from(round_up))
}
