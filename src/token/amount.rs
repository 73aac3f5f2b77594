//! Exact conversion between UI amounts and raw base units

use thiserror::Error;

/// Decimal places of the native asset (lamports per SOL)
pub const NATIVE_DECIMALS: u8 = 9;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmountError {
    #[error("Amount is empty")]
    Empty,
    #[error("Invalid amount: {0}")]
    Invalid(String),
    #[error("Amount {amount} has more than {decimals} decimal places")]
    TooPrecise { amount: String, decimals: u8 },
    #[error("Amount {0} is too large")]
    Overflow(String),
    #[error("Invalid decimals: must be 0-19")]
    InvalidDecimals,
}

/// Parse a UI amount such as `"0.1"` into base units without floating point
pub fn parse_ui_amount(input: &str, decimals: u8) -> Result<u64, AmountError> {
    if decimals > 19 {
        return Err(AmountError::InvalidDecimals);
    }
    let input = input.trim();
    if input.is_empty() {
        return Err(AmountError::Empty);
    }

    let (whole, fraction) = match input.split_once('.') {
        Some((w, f)) => (w, f),
        None => (input, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(AmountError::Invalid(input.to_string()));
    }
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) {
        return Err(AmountError::Invalid(input.to_string()));
    }

    let fraction = fraction.trim_end_matches('0');
    if fraction.len() > usize::from(decimals) {
        return Err(AmountError::TooPrecise {
            amount: input.to_string(),
            decimals,
        });
    }

    let overflow = || AmountError::Overflow(input.to_string());
    let scale = 10u64.checked_pow(u32::from(decimals)).ok_or_else(overflow)?;
    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };
    let fraction_units: u64 = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", fraction, width = usize::from(decimals));
        padded.parse().map_err(|_| overflow())?
    };

    whole
        .checked_mul(scale)
        .and_then(|v| v.checked_add(fraction_units))
        .ok_or_else(overflow)
}

/// Render base units as a UI amount, trimming trailing zeros
pub fn format_ui_amount(raw: u64, decimals: u8) -> String {
    if decimals == 0 {
        return raw.to_string();
    }
    let digits = format!("{:0>width$}", raw, width = usize::from(decimals) + 1);
    let (whole, fraction) = digits.split_at(digits.len() - usize::from(decimals));
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sol() {
        assert_eq!(parse_ui_amount("0.1", NATIVE_DECIMALS), Ok(100_000_000));
        assert_eq!(parse_ui_amount("1", NATIVE_DECIMALS), Ok(1_000_000_000));
        assert_eq!(parse_ui_amount(".5", NATIVE_DECIMALS), Ok(500_000_000));
        assert_eq!(parse_ui_amount("2.", NATIVE_DECIMALS), Ok(2_000_000_000));
        assert_eq!(parse_ui_amount("0.000000001", NATIVE_DECIMALS), Ok(1));
    }

    #[test]
    fn test_parse_rejects() {
        assert_eq!(parse_ui_amount("", 6), Err(AmountError::Empty));
        assert!(matches!(parse_ui_amount("-1", 6), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_ui_amount("1e5", 6), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_ui_amount(".", 6), Err(AmountError::Invalid(_))));
        assert!(matches!(
            parse_ui_amount("0.0000001", 6),
            Err(AmountError::TooPrecise { .. })
        ));
        assert!(matches!(
            parse_ui_amount("99999999999999999999", 9),
            Err(AmountError::Overflow(_))
        ));
    }

    #[test]
    fn test_trailing_zeros_are_not_precision() {
        assert_eq!(parse_ui_amount("1.500000000", 6), Ok(1_500_000));
    }

    #[test]
    fn test_format() {
        assert_eq!(format_ui_amount(100_000_000, 9), "0.1");
        assert_eq!(format_ui_amount(1_500_000, 6), "1.5");
        assert_eq!(format_ui_amount(3_000_000, 6), "3");
        assert_eq!(format_ui_amount(42, 0), "42");
        assert_eq!(format_ui_amount(0, 2), "0");
    }
}
