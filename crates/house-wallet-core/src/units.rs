//! Conversions between smallest-unit integers and decimal strings.
//!
//! Scaling is done on digit strings; floats only appear in the display helpers.

use alloy::primitives::U256;

use crate::error::WalletError;

/// Render `raw` smallest units as an exact decimal string (`1500000`, 6 -> `"1.5"`).
pub fn to_decimal_string(raw: U256, decimals: u8) -> String {
    let digits = raw.to_string();
    let scale = decimals as usize;
    if scale == 0 {
        return digits;
    }

    let (int_part, frac_part) = if digits.len() > scale {
        let split = digits.len() - scale;
        (digits[..split].to_owned(), digits[split..].to_owned())
    } else {
        ("0".to_owned(), format!("{digits:0>scale$}"))
    };

    let frac = frac_part.trim_end_matches('0');
    if frac.is_empty() {
        int_part
    } else {
        format!("{int_part}.{frac}")
    }
}

/// Parse a non-negative decimal string into smallest units.
///
/// Rejects signs, exponents, separators, and more fractional digits than
/// `decimals` allows.
pub fn to_raw_amount(value: &str, decimals: u8) -> Result<U256, WalletError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(WalletError::InvalidAmount("amount is empty".to_owned()));
    }

    let (int_part, frac_part, has_point) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f, true),
        None => (trimmed, "", false),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(WalletError::InvalidAmount(format!(
            "'{trimmed}' is not a number"
        )));
    }
    if has_point && frac_part.is_empty() {
        return Err(WalletError::InvalidAmount(format!(
            "'{trimmed}' has a trailing decimal point"
        )));
    }
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return Err(WalletError::InvalidAmount(format!(
            "'{trimmed}' is not a non-negative decimal number"
        )));
    }

    let scale = decimals as usize;
    if frac_part.len() > scale {
        return Err(WalletError::InvalidAmount(format!(
            "'{trimmed}' has {} fractional digits, token allows {scale}",
            frac_part.len()
        )));
    }

    let mut digits = String::with_capacity(int_part.len() + scale);
    digits.push_str(int_part);
    digits.push_str(frac_part);
    digits.extend(std::iter::repeat('0').take(scale - frac_part.len()));

    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(significant, 10)
        .map_err(|e| WalletError::InvalidAmount(format!("'{trimmed}' out of range: {e}")))
}

/// Presentation rounding only; never feed the result back into a transfer.
pub fn format_for_display(value: &str, fraction_digits: usize) -> String {
    let num: f64 = match value.trim().parse() {
        Ok(n) => n,
        Err(_) => return "0.00".to_owned(),
    };
    if !num.is_finite() || num == 0.0 {
        return "0.00".to_owned();
    }
    if num < 0.01 {
        return "< 0.01".to_owned();
    }
    format!("{num:.fraction_digits$}")
}

/// `1234.5` -> `"$1,234.50"`.
pub fn format_usd(value: f64) -> String {
    if !value.is_finite() {
        return "$0.00".to_owned();
    }
    let cents = (value.abs() * 100.0).round() as u128;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, ch) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}

/// `0x1234567890abcdef...` -> `0x1234...cdef`.
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_owned();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
