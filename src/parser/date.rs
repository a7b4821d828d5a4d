//! Feed date parsing.
//!
//! Tries RFC 3339, then RFC 2822 via chrono, then a loose RFC 822 tokenizer
//! for the malformed variants real feeds carry (missing weekday, two-digit
//! years, named US zones). Anything unparsable becomes timestamp 0, which
//! downstream means "unknown date" rather than an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

pub fn parse_timestamp(raw: &str) -> i64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.timestamp();
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return dt.timestamp();
    }
    parse_rfc822_loose(raw).unwrap_or(0)
}

fn parse_rfc822_loose(raw: &str) -> Option<i64> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    let mut idx = 0;

    if let Some(first) = tokens.first() {
        if is_weekday(first.trim_end_matches(',')) {
            idx = 1;
        }
    }

    let day: u32 = tokens.get(idx)?.trim_end_matches(',').parse().ok()?;
    let month = month_number(tokens.get(idx + 1)?)?;
    let year_token: i32 = tokens.get(idx + 2)?.parse().ok()?;
    let year = match year_token {
        0..=69 => year_token + 2000,
        70..=99 => year_token + 1900,
        _ => year_token,
    };

    let mut time_parts = tokens.get(idx + 3)?.split(':');
    let hour: u32 = time_parts.next()?.parse().ok()?;
    let minute: u32 = time_parts.next()?.parse().ok()?;
    let second: u32 = match time_parts.next() {
        Some(s) => s.parse().ok()?,
        None => 0,
    };

    let offset = match tokens.get(idx + 4) {
        Some(zone) => zone_offset_seconds(zone)?,
        None => 0,
    };

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, second)?;
    Some(NaiveDateTime::new(date, time).and_utc().timestamp() - offset)
}

fn is_weekday(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    ["mon", "tue", "wed", "thu", "fri", "sat", "sun"]
        .iter()
        .any(|d| lower.starts_with(d))
}

fn month_number(token: &str) -> Option<u32> {
    let lower = token.to_ascii_lowercase();
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    MONTHS
        .iter()
        .position(|m| lower.starts_with(m))
        .map(|i| i as u32 + 1)
}

/// Seconds east of UTC for the zone token, so that
/// `epoch = naive_timestamp - offset`.
fn zone_offset_seconds(token: &str) -> Option<i64> {
    match token.to_ascii_uppercase().as_str() {
        "GMT" | "UTC" | "UT" | "Z" => return Some(0),
        "EST" => return Some(-5 * 3600),
        "EDT" => return Some(-4 * 3600),
        "CST" => return Some(-6 * 3600),
        "CDT" => return Some(-5 * 3600),
        "MST" => return Some(-7 * 3600),
        "MDT" => return Some(-6 * 3600),
        "PST" => return Some(-8 * 3600),
        "PDT" => return Some(-7 * 3600),
        _ => {}
    }

    let (sign, digits) = match token.as_bytes().first()? {
        b'+' => (1, &token[1..]),
        b'-' => (-1, &token[1..]),
        _ => return None,
    };
    let digits = digits.replace(':', "");
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i64 = digits[..2].parse().ok()?;
    let minutes: i64 = digits[2..].parse().ok()?;
    Some(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc3339() {
        assert_eq!(parse_timestamp("2024-10-02T15:30:00Z"), 1_727_883_000);
    }

    #[test]
    fn test_rfc3339_with_offset() {
        assert_eq!(
            parse_timestamp("2024-10-02T15:30:00+02:00"),
            parse_timestamp("2024-10-02T13:30:00Z")
        );
    }

    #[test]
    fn test_rfc1123() {
        assert_eq!(
            parse_timestamp("Wed, 02 Oct 2024 15:30:00 GMT"),
            parse_timestamp("2024-10-02T15:30:00Z")
        );
    }

    #[test]
    fn test_missing_weekday() {
        assert_eq!(
            parse_timestamp("02 Oct 2024 15:30:00 GMT"),
            parse_timestamp("2024-10-02T15:30:00Z")
        );
    }

    #[test]
    fn test_named_us_zone() {
        // EST is five hours behind UTC.
        assert_eq!(
            parse_timestamp("Wed, 02 Oct 2024 10:30:00 EST"),
            parse_timestamp("2024-10-02T15:30:00Z")
        );
    }

    #[test]
    fn test_numeric_offset_without_colon() {
        assert_eq!(
            parse_timestamp("02 Oct 2024 17:30:00 +0200"),
            parse_timestamp("2024-10-02T15:30:00Z")
        );
    }

    #[test]
    fn test_two_digit_year() {
        assert_eq!(
            parse_timestamp("02 Oct 24 15:30:00 GMT"),
            parse_timestamp("2024-10-02T15:30:00Z")
        );
    }

    #[test]
    fn test_missing_seconds() {
        assert_eq!(
            parse_timestamp("02 Oct 2024 15:30 GMT"),
            parse_timestamp("2024-10-02T15:30:00Z")
        );
    }

    #[test]
    fn test_garbage_is_zero() {
        assert_eq!(parse_timestamp("not a date"), 0);
        assert_eq!(parse_timestamp(""), 0);
        assert_eq!(parse_timestamp("32 Oct 2024 15:30:00 GMT"), 0);
    }
}
