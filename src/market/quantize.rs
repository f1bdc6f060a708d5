//! Exchange-legal rounding of prices and quantities.
//!
//! Both functions truncate toward zero at the requested decimal count.
//! Rounding a buy quantity up could spend more than the budget, and rounding
//! a price up could pay more than intended, so nothing here ever rounds up.

use rust_decimal::Decimal;

/// Truncate a quantity to the symbol's quantity precision.
///
/// A non-positive input yields `Decimal::ZERO`; callers short-circuit on it
/// instead of submitting a zero or negative order.
pub fn quantize_quantity(raw: Decimal, decimals: u32) -> Decimal {
    if raw <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    raw.trunc_with_scale(decimals)
}

/// Truncate a price to the symbol's price precision.
///
/// `decimals == 0` yields an integer value with no fractional part.
pub fn quantize_price(raw: Decimal, decimals: u32) -> Decimal {
    if raw <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    raw.trunc_with_scale(decimals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_never_rounds_up() {
        let cases = [
            (dec!(9.99999), 4u32),
            (dec!(0.123456789), 8),
            (dec!(123.456), 2),
            (dec!(10), 4),
            (dec!(0.00001), 4),
        ];
        for (raw, decimals) in cases {
            let q = quantize_quantity(raw, decimals);
            assert!(q <= raw, "quantize({raw}, {decimals}) = {q} rounded up");
            assert!(q.scale() <= decimals);
        }
    }

    #[test]
    fn test_truncates_at_precision() {
        assert_eq!(quantize_quantity(dec!(9.99999), 4), dec!(9.9999));
        assert_eq!(quantize_quantity(dec!(0.123456789), 8), dec!(0.12345678));
        assert_eq!(quantize_price(dec!(123.456), 2), dec!(123.45));
    }

    #[test]
    fn test_zero_price_decimals_yields_integer() {
        let q = quantize_price(dec!(54321.987), 0);
        assert_eq!(q, dec!(54321));
        assert_eq!(q.scale(), 0);
    }

    #[test]
    fn test_non_positive_input_is_sentinel_zero() {
        assert_eq!(quantize_quantity(dec!(0), 4), Decimal::ZERO);
        assert_eq!(quantize_quantity(dec!(-1.5), 4), Decimal::ZERO);
        assert_eq!(quantize_price(dec!(0), 0), Decimal::ZERO);
        assert_eq!(quantize_price(dec!(-100), 2), Decimal::ZERO);
    }

    #[test]
    fn test_budget_over_entry_scenario() {
        // budget 1000 / entry 100 with qty precision 4 -> exactly 10.0000
        let raw_qty = dec!(1000) / dec!(100);
        assert_eq!(quantize_quantity(raw_qty, 4), dec!(10.0000));
    }

    #[test]
    fn test_tiny_quantity_truncates_to_zero() {
        // Below the representable precision the result is zero, which callers
        // must treat as "quantity too small"
        assert_eq!(quantize_quantity(dec!(0.00004), 4), Decimal::ZERO);
    }
}
