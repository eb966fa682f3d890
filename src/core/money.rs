//! Fixed-precision currency handling.
//!
//! All monetary values in the domain are [`Decimal`]s held at two fractional
//! digits. Parsing is deliberately forgiving: user input arrives as raw
//! strings and anything that fails to parse coerces to zero rather than
//! producing an error, so a malformed amount can never make a dispatch
//! throw.

use rust_decimal::Decimal;

/// Number of fractional digits monetary values are stored at.
pub const SCALE: u32 = 2;

/// Parses a raw amount string into a two-decimal monetary value.
///
/// Reads the leading numeric prefix (an optional sign, then digits and at
/// most one decimal point) and ignores whatever follows, the way a float
/// parser would: `"19.999,999"` reads as `19.999` and rounds to `20.00`.
/// Input with no leading number yields zero, never an error.
#[must_use]
pub fn parse(raw: &str) -> Decimal {
    let trimmed = raw.trim();
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in trimmed.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '.' if !seen_dot => seen_dot = true,
            '0'..='9' => {}
            _ => break,
        }
        end = i + 1;
    }
    trimmed[..end]
        .trim_end_matches('.')
        .parse::<Decimal>()
        .map(|d| d.round_dp(SCALE))
        .unwrap_or_default()
}

/// Adds two monetary values, keeping the result at two decimals.
#[must_use]
pub fn add(a: Decimal, b: Decimal) -> Decimal {
    (a + b).round_dp(SCALE)
}

/// Subtracts `b` from `a`, keeping the result at two decimals.
#[must_use]
pub fn subtract(a: Decimal, b: Decimal) -> Decimal {
    (a - b).round_dp(SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parse_plain_amounts() {
        assert_eq!(parse("100"), dec!(100));
        assert_eq!(parse("19.99"), dec!(19.99));
        assert_eq!(parse(" 42.5 "), dec!(42.5));
    }

    #[test]
    fn parse_rounds_over_precise_input_to_two_decimals() {
        assert_eq!(parse("0.999"), dec!(1.00));
        assert_eq!(parse("10.004"), dec!(10.00));
        assert_eq!(parse("10.005"), dec!(10.01));
    }

    #[test]
    fn parse_reads_the_leading_numeric_prefix() {
        assert_eq!(parse("19.999,999"), dec!(20.00));
        assert_eq!(parse("42abc"), dec!(42));
        assert_eq!(parse("12.34.56"), dec!(12.34));
        assert_eq!(parse("-500 CLP"), dec!(-500));
        assert_eq!(parse("7."), dec!(7));
    }

    #[test]
    fn parse_coerces_garbage_to_zero() {
        assert_eq!(parse(""), Decimal::ZERO);
        assert_eq!(parse("not a number"), Decimal::ZERO);
        assert_eq!(parse("$100"), Decimal::ZERO);
        assert_eq!(parse("--5"), Decimal::ZERO);
    }

    #[test]
    fn repeated_addition_has_no_float_drift() {
        let mut total = Decimal::ZERO;
        for _ in 0..100 {
            total = add(total, parse("0.1"));
            total = add(total, parse("0.2"));
        }
        assert_eq!(total, dec!(30.00));
        assert!(total.scale() <= SCALE);
    }
}
