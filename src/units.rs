//! Amount Conversion Module
//!
//! Converts between display-unit decimal strings (e.g. "0.01") and the chain's
//! smallest-unit integers (wei), and parses JSON-RPC hex quantities. All
//! arithmetic is done on `u128` so payment matching never touches floating point.

use thiserror::Error;

/// Errors produced while parsing amounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitsError {
    #[error("empty amount")]
    Empty,
    #[error("invalid decimal amount: {0}")]
    InvalidDecimal(String),
    #[error("too many fractional digits: {digits} (max {decimals})")]
    TooPrecise { digits: usize, decimals: u32 },
    #[error("invalid hex quantity: {0}")]
    InvalidHex(String),
    #[error("amount overflows 128 bits")]
    Overflow,
}

/// Converts a display-unit decimal string to smallest units.
///
/// `parse_units("0.01", 18)` is `10_000_000_000_000_000`.
pub fn parse_units(amount: &str, decimals: u32) -> Result<u128, UnitsError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(UnitsError::Empty);
    }

    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (amount, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(UnitsError::InvalidDecimal(amount.to_string()));
    }
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) {
        return Err(UnitsError::InvalidDecimal(amount.to_string()));
    }
    if fraction.len() > decimals as usize {
        return Err(UnitsError::TooPrecise {
            digits: fraction.len(),
            decimals,
        });
    }

    let scale = 10u128
        .checked_pow(decimals)
        .ok_or(UnitsError::Overflow)?;
    let whole_value = if whole.is_empty() {
        0
    } else {
        whole.parse::<u128>().map_err(|_| UnitsError::Overflow)?
    };

    // Right-pad the fraction to exactly `decimals` digits.
    let mut fraction_value: u128 = 0;
    for digit in fraction
        .chars()
        .chain(std::iter::repeat('0'))
        .take(decimals as usize)
    {
        fraction_value = fraction_value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u128::from(digit as u8 - b'0')))
            .ok_or(UnitsError::Overflow)?;
    }

    whole_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(fraction_value))
        .ok_or(UnitsError::Overflow)
}

/// Formats a smallest-unit value as a display decimal without trailing zeros.
pub fn format_units(value: u128, decimals: u32) -> String {
    let Some(scale) = 10u128.checked_pow(decimals) else {
        return value.to_string();
    };
    let whole = value / scale;
    let fraction = value % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{:0width$}", fraction, width = decimals as usize);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

/// Parses a JSON-RPC quantity such as `"0x2386f26fc10000"`.
pub fn parse_hex_quantity(quantity: &str) -> Result<u128, UnitsError> {
    let digits = quantity
        .strip_prefix("0x")
        .or_else(|| quantity.strip_prefix("0X"))
        .ok_or_else(|| UnitsError::InvalidHex(quantity.to_string()))?;
    if digits.is_empty() {
        return Err(UnitsError::InvalidHex(quantity.to_string()));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(UnitsError::InvalidHex(quantity.to_string()));
    }
    let significant = digits.trim_start_matches('0');
    if significant.len() > 32 {
        return Err(UnitsError::Overflow);
    }
    if significant.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(significant, 16).map_err(|_| UnitsError::InvalidHex(quantity.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fractional_amounts() {
        assert_eq!(parse_units("0.01", 18), Ok(10_000_000_000_000_000));
        assert_eq!(parse_units("0.0001", 18), Ok(100_000_000_000_000));
        assert_eq!(parse_units(".5", 2), Ok(50));
        assert_eq!(parse_units("1.", 2), Ok(100));
        assert_eq!(parse_units("12", 0), Ok(12));
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert_eq!(parse_units("", 18), Err(UnitsError::Empty));
        assert!(matches!(parse_units("-1", 18), Err(UnitsError::InvalidDecimal(_))));
        assert!(matches!(parse_units("1e3", 18), Err(UnitsError::InvalidDecimal(_))));
        assert!(matches!(parse_units(".", 18), Err(UnitsError::InvalidDecimal(_))));
        assert_eq!(
            parse_units("0.123", 2),
            Err(UnitsError::TooPrecise { digits: 3, decimals: 2 })
        );
        assert_eq!(
            parse_units("340282366920938463463374607431768211456", 0),
            Err(UnitsError::Overflow)
        );
    }

    #[test]
    fn formats_without_trailing_zeros() {
        assert_eq!(format_units(10_000_000_000_000_000, 18), "0.01");
        assert_eq!(format_units(1_000_000_000_000_000_000, 18), "1");
        assert_eq!(format_units(1_500_000_000_000_000_000, 18), "1.5");
        assert_eq!(format_units(0, 18), "0");
    }

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(parse_hex_quantity("0x2386f26fc10000"), Ok(10_000_000_000_000_000));
        assert_eq!(parse_hex_quantity("0x0"), Ok(0));
        assert_eq!(parse_hex_quantity("0x000000000000000000000000000000000000001"), Ok(1));
        assert!(matches!(parse_hex_quantity("2386"), Err(UnitsError::InvalidHex(_))));
        assert!(matches!(parse_hex_quantity("0x"), Err(UnitsError::InvalidHex(_))));
        assert!(matches!(parse_hex_quantity("0xzz"), Err(UnitsError::InvalidHex(_))));
        assert_eq!(
            parse_hex_quantity("0x1ffffffffffffffffffffffffffffffff"),
            Err(UnitsError::Overflow)
        );
    }
}
