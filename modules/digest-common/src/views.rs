//! View-count tokens as X renders them on post cards.
//!
//! Cards show "1,234", "1.2K", "3M" and locale variants ("1.234", "1 234",
//! "1,2K"). Parsing is exact: suffixed decimals are scaled with integer
//! arithmetic and truncated, never routed through floats.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// A decimal number followed by a K/M magnitude suffix, whitespace already removed.
static ABBREVIATED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+(?:[.,][0-9]+)*)([KkMm])$").unwrap());

/// Plain digits, or digits in thousands groups separated by `.` or `,`.
static GROUPED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[0-9]{1,3}(?:[.,][0-9]{3})+|[0-9]+)$").unwrap());

/// The token could not be read as a view count.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unparsable view count: {0:?}")]
pub struct UnparsableViews(pub String);

/// Parse a rendered view-count token into an exact count.
///
/// Pure: the same token always yields the same result.
pub fn parse_views(token: &str) -> Result<u64, UnparsableViews> {
    let unparsable = || UnparsableViews(token.to_string());
    let compact: String = token.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(unparsable());
    }

    if let Some(caps) = ABBREVIATED.captures(&compact) {
        let multiplier = match &caps[2] {
            "K" | "k" => 1_000,
            _ => 1_000_000,
        };
        return scale(&caps[1], multiplier).ok_or_else(unparsable);
    }

    if GROUPED.is_match(&compact) {
        let digits: String = compact.chars().filter(char::is_ascii_digit).collect();
        return digits.parse::<u64>().map_err(|_| unparsable());
    }

    Err(unparsable())
}

/// Scale a suffixed number. The last separator is the decimal point; any
/// earlier separator must delimit a three-digit thousands group.
fn scale(number: &str, multiplier: u128) -> Option<u64> {
    let (whole, fraction) = match number.rfind(['.', ',']) {
        Some(idx) => (&number[..idx], &number[idx + 1..]),
        None => (number, ""),
    };

    let mut groups = whole.split(['.', ',']);
    let mut integer: u128 = groups.next()?.parse().ok()?;
    for group in groups {
        if group.len() != 3 {
            return None;
        }
        integer = integer.checked_mul(1_000)? + group.parse::<u128>().ok()?;
    }

    // Digits past the eighteenth cannot move a K or M count; drop them so
    // the power of ten stays within u128.
    let fraction = fraction.get(..18).unwrap_or(fraction).trim_end_matches('0');

    let mut value = integer.checked_mul(multiplier)?;
    if !fraction.is_empty() {
        let denominator = 10u128.checked_pow(fraction.len() as u32)?;
        let numerator: u128 = fraction.parse().ok()?;
        value = value.checked_add(numerator.checked_mul(multiplier)? / denominator)?;
    }

    u64::try_from(value).ok()
}

/// Render a count the way cards abbreviate it ("1.2K", "3M"). Display only.
pub fn format_views(count: u64) -> String {
    let (scaled, suffix) = match count {
        c if c >= 1_000_000 => (c as f64 / 1_000_000.0, "M"),
        c if c >= 1_000 => (c as f64 / 1_000.0, "K"),
        c => return c.to_string(),
    };
    let text = format!("{scaled:.1}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_k_suffix() {
        assert_eq!(parse_views("1K"), Ok(1_000));
        assert_eq!(parse_views("1.2K"), Ok(1_200));
        assert_eq!(parse_views("15.7K"), Ok(15_700));
        assert_eq!(parse_views("100K"), Ok(100_000));
    }

    #[test]
    fn parses_m_suffix() {
        assert_eq!(parse_views("1M"), Ok(1_000_000));
        assert_eq!(parse_views("1.5M"), Ok(1_500_000));
        assert_eq!(parse_views("1.23M"), Ok(1_230_000));
    }

    #[test]
    fn suffix_is_case_insensitive() {
        assert_eq!(parse_views("1.2k"), Ok(1_200));
        assert_eq!(parse_views("3m"), Ok(3_000_000));
    }

    #[test]
    fn scaling_truncates_without_float_drift() {
        assert_eq!(parse_views("1.999K"), Ok(1_999));
        assert_eq!(parse_views("1.9999K"), Ok(1_999));
        assert_eq!(parse_views("2.3K"), Ok(2_300));
        assert_eq!(parse_views("0K"), Ok(0));
    }

    #[test]
    fn comma_decimal_and_grouped_suffix() {
        assert_eq!(parse_views("1,2K"), Ok(1_200));
        assert_eq!(parse_views("1,234.5K"), Ok(1_234_500));
    }

    #[test]
    fn whitespace_is_ignored() {
        assert_eq!(parse_views("  1.2K  "), Ok(1_200));
        assert_eq!(parse_views("1.2 K"), Ok(1_200));
        assert_eq!(parse_views("12 345"), Ok(12_345));
        assert_eq!(parse_views("1\u{a0}200"), Ok(1_200));
    }

    #[test]
    fn parses_plain_and_grouped_integers() {
        assert_eq!(parse_views("0"), Ok(0));
        assert_eq!(parse_views("500"), Ok(500));
        assert_eq!(parse_views("12,345"), Ok(12_345));
        assert_eq!(parse_views("1,234,567"), Ok(1_234_567));
        assert_eq!(parse_views("1.200"), Ok(1_200));
        assert_eq!(parse_views("1.234.567"), Ok(1_234_567));
    }

    #[test]
    fn integer_tokens_round_trip() {
        for n in [0u64, 7, 999, 1_000, 123_456_789] {
            assert_eq!(parse_views(&n.to_string()), Ok(n));
        }
    }

    #[test]
    fn rejects_garbage() {
        for token in ["", "   ", "abc", "K", "views", "1.2.3K", "-100", "1.5", "12B", "1,23"] {
            assert_eq!(
                parse_views(token),
                Err(UnparsableViews(token.to_string())),
                "{token:?} should be unparsable"
            );
        }
    }

    #[test]
    fn formats_abbreviations() {
        assert_eq!(format_views(999), "999");
        assert_eq!(format_views(1_000), "1K");
        assert_eq!(format_views(1_200), "1.2K");
        assert_eq!(format_views(1_500_000), "1.5M");
        assert_eq!(format_views(10_000_000), "10M");
    }

    #[test]
    fn long_fractions_truncate_instead_of_failing() {
        let zeros = "0".repeat(40);
        assert_eq!(parse_views(&format!("1.{zeros}K")), Ok(1_000));
        assert_eq!(parse_views(&format!("2.5{zeros}M")), Ok(2_500_000));
        assert_eq!(parse_views(&format!("1.{}K", "9".repeat(45))), Ok(1_999));
    }
}
