// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Decimal amount parsing and formatting.
//!
//! User input may use `,` or `.` as the decimal separator and may contain
//! grouping characters (spaces, no-break spaces, apostrophes). Parsing is
//! exact: input with more fractional digits than the asset supports is
//! rejected, never rounded.

use super::error::TransferError;

/// Characters used for digit grouping in supported locales.
fn is_group_separator(c: char) -> bool {
    c.is_whitespace() || c == '\'' || c == '\u{2019}'
}

fn invalid(message: impl Into<String>) -> TransferError {
    TransferError::InvalidAmount(message.into())
}

/// Parse a decimal string into base units of an asset with `decimals`
/// fractional digits.
pub fn parse_amount(raw: &str, decimals: u8) -> Result<u128, TransferError> {
    let cleaned: String = raw.chars().filter(|c| !is_group_separator(*c)).collect();
    if cleaned.is_empty() {
        return Err(invalid("amount is empty"));
    }

    let separators = cleaned.chars().filter(|c| *c == '.' || *c == ',').count();
    if separators > 1 {
        return Err(invalid("more than one decimal separator"));
    }

    let (whole, fraction) = match cleaned.find(['.', ',']) {
        Some(pos) => (&cleaned[..pos], &cleaned[pos + 1..]),
        None => (cleaned.as_str(), ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("amount has no digits"));
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid("amount contains non-digit characters"));
    }
    if fraction.len() > decimals as usize {
        return Err(invalid(format!(
            "too many decimal places (max {decimals})"
        )));
    }

    let multiplier = 10u128
        .checked_pow(decimals as u32)
        .ok_or_else(|| invalid(format!("unsupported decimals {decimals}")))?;
    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("amount overflow"))?
    };
    let fraction: u128 = if fraction.is_empty() {
        0
    } else {
        // Pad with zeros to match decimals
        let padded = format!("{:0<width$}", fraction, width = decimals as usize);
        padded.parse().map_err(|_| invalid("amount overflow"))?
    };

    whole
        .checked_mul(multiplier)
        .and_then(|w| w.checked_add(fraction))
        .ok_or_else(|| invalid("amount overflow"))
}

/// Format base units as a dot-separated decimal, trailing zeros trimmed.
pub fn format_amount(amount: u128, decimals: u8) -> String {
    if amount == 0 {
        return "0".to_string();
    }
    let Some(divisor) = 10u128.checked_pow(decimals as u32) else {
        return amount.to_string();
    };
    let whole = amount / divisor;
    let remainder = amount % divisor;

    if remainder == 0 {
        whole.to_string()
    } else {
        let decimal_str = format!("{:0>width$}", remainder, width = decimals as usize);
        format!("{}.{}", whole, decimal_str.trim_end_matches('0'))
    }
}
