//! Warranty period parsing and calendar arithmetic.
//!
//! Months and years are added as calendar months (`2024-01-31 + 1 month =
//! 2024-02-29`), so "12 months" from 1 January always lands on 1 January of
//! the following year. Weeks and days are fixed-length.

use std::sync::LazyLock;

use chrono::{Days, Months, NaiveDate};
use regex::Regex;

static DURATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,4}(?:\.\d+)?|one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)\s*-?\s*(days?|d|weeks?|wks?|w|months?|mos?|m|years?|yrs?|y)\b",
    )
    .unwrap()
});

/// Words that mean "no fixed expiry" rather than a parse failure upstream.
const OPEN_ENDED: &[&str] = &["lifetime", "none", "no warranty", "n/a", "na", "unknown"];

/// A parsed warranty period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarrantyDuration {
    Days(u32),
    Weeks(u32),
    Months(u32),
    Years(u32),
}

impl WarrantyDuration {
    /// Expiry date for a warranty starting on `start`. `None` on overflow.
    pub fn add_to(&self, start: NaiveDate) -> Option<NaiveDate> {
        match *self {
            Self::Days(n) => start.checked_add_days(Days::new(u64::from(n))),
            Self::Weeks(n) => start.checked_add_days(Days::new(u64::from(n) * 7)),
            Self::Months(n) => start.checked_add_months(Months::new(n)),
            Self::Years(n) => n
                .checked_mul(12)
                .and_then(|months| start.checked_add_months(Months::new(months))),
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(
            self,
            Self::Days(0) | Self::Weeks(0) | Self::Months(0) | Self::Years(0)
        )
    }
}

impl std::fmt::Display for WarrantyDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (n, unit) = match *self {
            Self::Days(n) => (n, "day"),
            Self::Weeks(n) => (n, "week"),
            Self::Months(n) => (n, "month"),
            Self::Years(n) => (n, "year"),
        };
        let plural = if n == 1 { "" } else { "s" };
        write!(f, "{n} {unit}{plural}")
    }
}

/// Parse a warranty period as printed on an invoice ("12 months",
/// "2-year limited", "90 days"). Returns `None` for open-ended or
/// unreadable periods, and for zero-length ones.
pub fn parse_warranty_duration(raw: &str) -> Option<WarrantyDuration> {
    let text = raw.trim();
    if text.is_empty() || OPEN_ENDED.contains(&text.to_lowercase().as_str()) {
        return None;
    }

    let caps = DURATION_PATTERN.captures(text)?;
    let number = caps.get(1)?;
    // "1,5 years" or ".5 years" would otherwise match as "5 years"
    if text[..number.start()].ends_with([',', '.']) {
        return None;
    }
    let unit = caps.get(2)?.as_str().to_lowercase();

    let duration = match number.as_str().split_once('.') {
        None => whole_duration(parse_amount(number.as_str())?, &unit)?,
        Some((whole, fraction)) => fractional_duration(whole, fraction, &unit)?,
    };

    if duration.is_zero() {
        return None;
    }
    Some(duration)
}

fn whole_duration(amount: u32, unit: &str) -> Option<WarrantyDuration> {
    let duration = match unit {
        "d" | "day" | "days" => WarrantyDuration::Days(amount),
        "w" | "wk" | "wks" | "week" | "weeks" => WarrantyDuration::Weeks(amount),
        "m" | "mo" | "mos" | "month" | "months" => WarrantyDuration::Months(amount),
        "y" | "yr" | "yrs" | "year" | "years" => WarrantyDuration::Years(amount),
        _ => return None,
    };
    Some(duration)
}

/// Decimal amounts are only exact for years that come to a whole number of
/// months ("1.5 years" is 18 months). Anything else is unreadable.
fn fractional_duration(whole: &str, fraction: &str, unit: &str) -> Option<WarrantyDuration> {
    let whole: u32 = whole.parse().ok()?;
    if fraction.bytes().all(|b| b == b'0') {
        return whole_duration(whole, unit);
    }
    if !matches!(unit, "y" | "yr" | "yrs" | "year" | "years") {
        return None;
    }

    // Twelfths of a year, scaled by 10^digits to stay in integers
    let scale = 10u32.checked_pow(u32::try_from(fraction.len()).ok()?)?;
    let digits: u32 = fraction.parse().ok()?;
    let fractional_months = digits.checked_mul(12)?;
    if fractional_months % scale != 0 {
        return None;
    }
    let months = whole.checked_mul(12)?.checked_add(fractional_months / scale)?;
    Some(WarrantyDuration::Months(months))
}

fn parse_amount(token: &str) -> Option<u32> {
    if let Ok(n) = token.parse::<u32>() {
        return Some(n);
    }
    let n = match token.to_lowercase().as_str() {
        "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        _ => return None,
    };
    Some(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_plain_periods() {
        assert_eq!(parse_warranty_duration("12 months"), Some(WarrantyDuration::Months(12)));
        assert_eq!(parse_warranty_duration("1 year"), Some(WarrantyDuration::Years(1)));
        assert_eq!(parse_warranty_duration("90 days"), Some(WarrantyDuration::Days(90)));
        assert_eq!(parse_warranty_duration("6 weeks"), Some(WarrantyDuration::Weeks(6)));
    }

    #[test]
    fn parses_abbreviations_and_hyphens() {
        assert_eq!(parse_warranty_duration("24mo"), Some(WarrantyDuration::Months(24)));
        assert_eq!(parse_warranty_duration("2-year"), Some(WarrantyDuration::Years(2)));
        assert_eq!(parse_warranty_duration("3 YRS"), Some(WarrantyDuration::Years(3)));
        assert_eq!(parse_warranty_duration("30d"), Some(WarrantyDuration::Days(30)));
    }

    #[test]
    fn parses_words_and_surrounding_text() {
        assert_eq!(
            parse_warranty_duration("Two years limited warranty"),
            Some(WarrantyDuration::Years(2))
        );
        assert_eq!(
            parse_warranty_duration("Limited 1-year manufacturer warranty"),
            Some(WarrantyDuration::Years(1))
        );
    }

    #[test]
    fn open_ended_or_garbage_is_none() {
        assert_eq!(parse_warranty_duration(""), None);
        assert_eq!(parse_warranty_duration("Lifetime"), None);
        assert_eq!(parse_warranty_duration("N/A"), None);
        assert_eq!(parse_warranty_duration("see manufacturer terms"), None);
        assert_eq!(parse_warranty_duration("0 months"), None);
    }

    #[test]
    fn decimal_years_become_whole_months() {
        assert_eq!(parse_warranty_duration("1.5 years"), Some(WarrantyDuration::Months(18)));
        assert_eq!(parse_warranty_duration("2.5 yrs"), Some(WarrantyDuration::Months(30)));
        assert_eq!(parse_warranty_duration("0.25 year"), Some(WarrantyDuration::Months(3)));
        assert_eq!(parse_warranty_duration("2.0 years"), Some(WarrantyDuration::Years(2)));
    }

    #[test]
    fn inexact_decimal_periods_are_none() {
        assert_eq!(parse_warranty_duration("18.5 months"), None);
        assert_eq!(parse_warranty_duration("1.3 years"), None);
        assert_eq!(parse_warranty_duration("10.5 days"), None);
        assert_eq!(parse_warranty_duration("1,5 years"), None);
        assert_eq!(parse_warranty_duration(".5 years"), None);
    }

    #[test]
    fn months_are_calendar_months() {
        let start = date(2024, 1, 1);
        assert_eq!(WarrantyDuration::Months(12).add_to(start), Some(date(2025, 1, 1)));
        assert_eq!(WarrantyDuration::Years(1).add_to(start), Some(date(2025, 1, 1)));
        // End-of-month clamps
        assert_eq!(
            WarrantyDuration::Months(1).add_to(date(2024, 1, 31)),
            Some(date(2024, 2, 29))
        );
    }

    #[test]
    fn days_and_weeks_are_fixed_length() {
        let start = date(2024, 1, 1);
        assert_eq!(WarrantyDuration::Days(90).add_to(start), Some(date(2024, 3, 31)));
        assert_eq!(WarrantyDuration::Weeks(2).add_to(start), Some(date(2024, 1, 15)));
    }

    #[test]
    fn overflow_is_none() {
        assert_eq!(WarrantyDuration::Years(u32::MAX).add_to(date(2024, 1, 1)), None);
        assert_eq!(WarrantyDuration::Years(9999).add_to(NaiveDate::MAX), None);
    }

    #[test]
    fn display_pluralizes() {
        assert_eq!(WarrantyDuration::Months(12).to_string(), "12 months");
        assert_eq!(WarrantyDuration::Years(1).to_string(), "1 year");
    }
}
