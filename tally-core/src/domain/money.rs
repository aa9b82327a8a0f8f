//! Minor-unit formatting

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Number of minor units per major unit for every supported currency
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Convert an amount in minor units to a decimal in major units
pub fn to_decimal(minor_units: i64) -> Decimal {
    Decimal::new(minor_units, MINOR_UNIT_SCALE)
}

/// Parse a major-unit amount ("12.34") into minor units.
///
/// Returns `None` when the value has more precision than the currency
/// supports or does not fit in an `i64`.
pub fn parse_minor_units(input: &str) -> Option<i64> {
    let value: Decimal = input.trim().parse().ok()?;
    let scaled = value.checked_mul(Decimal::from(10i64.pow(MINOR_UNIT_SCALE)))?;
    if scaled.fract() != Decimal::ZERO {
        return None;
    }
    scaled.trunc().to_i64()
}

/// Format minor units with the currency code
pub fn format_amount(minor_units: i64, currency: &str) -> String {
    format!("{} {}", to_decimal(minor_units), currency)
}
