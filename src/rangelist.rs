//! Range-list parsing for core group definitions.
//!
//! A range list is a comma-separated sequence of unsigned numbers and
//! inclusive ranges, for example:
//!
//! - `0,1,2,3`
//! - `0-10,20-18`
//! - `1,3,5-8,10,0x10-12`
//!
//! Numbers may be decimal, hexadecimal (`0x` prefix) or octal (leading `0`).

use ahash::AHashSet;
use thiserror::Error;

/// Error returned when a range list cannot be converted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeListError {
    /// A token (or one bound of a range) is not an unsigned 64-bit number.
    #[error("cannot convert '{0}' to an unsigned number")]
    InvalidNumber(String),
}

/// Parses a range list into unique values, in first-seen order.
///
/// Empty tokens are skipped. A range whose lower bound is larger than its
/// upper bound is swapped before expansion, so `20-18` yields `18,19,20`.
/// Expansion stops as soon as `max` values are collected; this is a capacity
/// guard and not an error.
pub fn parse(input: &str, max: usize) -> Result<Vec<u64>, RangeListError> {
    let mut values = Vec::new();
    if max == 0 {
        return Ok(values);
    }

    let mut seen = AHashSet::new();

    for token in input.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        let (start, end) = match token.split_once('-') {
            Some((first, second)) => {
                let start = parse_number(first)?;
                let end = parse_number(second)?;
                if start > end {
                    (end, start)
                } else {
                    (start, end)
                }
            }
            None => {
                let value = parse_number(token)?;
                (value, value)
            }
        };

        for value in start..=end {
            if seen.insert(value) {
                values.push(value);
            }
            if values.len() >= max {
                return Ok(values);
            }
        }
    }

    Ok(values)
}

/// Renders values as a canonical comma-separated decimal list.
pub fn render(values: &[u64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Converts a single number with C-style base detection.
fn parse_number(text: &str) -> Result<u64, RangeListError> {
    let text = text.trim();
    let invalid = || RangeListError::InvalidNumber(text.to_string());

    let (digits, radix) = if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        (hex, 16)
    } else if text.len() > 1 && text.starts_with('0') {
        (&text[1..], 8)
    } else {
        (text, 10)
    };

    // from_str_radix accepts a leading sign, a range list never does
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }

    u64::from_str_radix(digits, radix).map_err(|_| invalid())
}
