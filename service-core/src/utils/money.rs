//! Lenient money parsing.
//!
//! Operator-entered amounts (attribute values, reimbursement slots) arrive as
//! free text. Billing treats anything absent or unparsable as zero; the
//! invariant lives here so call sites never parse ad hoc.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a monetary value, defaulting to zero on `None`, blank, or garbage.
pub fn parse_money(value: Option<&str>) -> Decimal {
    match value {
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
                return Decimal::ZERO;
            }
            Decimal::from_str(trimmed).unwrap_or(Decimal::ZERO)
        }
        None => Decimal::ZERO,
    }
}

/// Parse a monetary value, `None` when absent or not numeric.
///
/// The service-fee precedence chain needs to distinguish "basis attribute
/// missing" from "basis is zero"; everything else uses [`parse_money`].
pub fn parse_money_opt(value: Option<&str>) -> Option<Decimal> {
    let trimmed = value?.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return None;
    }
    Decimal::from_str(trimmed).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_plain_amounts() {
        assert_eq!(parse_money(Some("1250.50")), dec!(1250.50));
        assert_eq!(parse_money(Some(" 300 ")), dec!(300));
    }

    #[test]
    fn defaults_to_zero_on_absent_or_garbage() {
        assert_eq!(parse_money(None), Decimal::ZERO);
        assert_eq!(parse_money(Some("")), Decimal::ZERO);
        assert_eq!(parse_money(Some("   ")), Decimal::ZERO);
        assert_eq!(parse_money(Some("null")), Decimal::ZERO);
        assert_eq!(parse_money(Some("N/A")), Decimal::ZERO);
        assert_eq!(parse_money(Some("12,500")), Decimal::ZERO);
    }

    #[test]
    fn opt_distinguishes_absent_from_zero() {
        assert_eq!(parse_money_opt(Some("0")), Some(Decimal::ZERO));
        assert_eq!(parse_money_opt(Some("abc")), None);
        assert_eq!(parse_money_opt(Some("")), None);
        assert_eq!(parse_money_opt(None), None);
    }
}
