//! Human-readable expiry durations ("30d", "2 weeks", "1h30m", "10:30")
//! and the cutoff timestamps derived from them.

use std::sync::OnceLock;

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;

use crate::{Error, Result};

const MINUTE: f64 = 60.0;
const HOUR: f64 = 60.0 * MINUTE;
const DAY: f64 = 24.0 * HOUR;
const WEEK: f64 = 7.0 * DAY;
const MONTH: f64 = 30.0 * DAY;
const YEAR: f64 = 365.0 * DAY;

fn number_regex() -> &'static Regex {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    NUMBER.get_or_init(|| Regex::new(r"^(?:\d+(?:\.\d*)?|\.\d+)$").expect("number pattern"))
}

fn clock_regex() -> &'static Regex {
    static CLOCK: OnceLock<Regex> = OnceLock::new();
    CLOCK.get_or_init(|| {
        Regex::new(r"^(\d+):([0-5]?\d)(?::([0-5]?\d(?:\.\d+)?))?$").expect("clock pattern")
    })
}

fn term_regex() -> &'static Regex {
    static TERM: OnceLock<Regex> = OnceLock::new();
    TERM.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?|\.\d+)\s*([a-z]+)").expect("term pattern")
    })
}

/// Seconds per unit, `None` for unknown units
fn unit_seconds(unit: &str) -> Option<f64> {
    let seconds = match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "m" | "min" | "mins" | "minute" | "minutes" => MINUTE,
        "h" | "hr" | "hrs" | "hour" | "hours" => HOUR,
        "d" | "day" | "days" => DAY,
        "w" | "wk" | "wks" | "week" | "weeks" => WEEK,
        "mo" | "mon" | "mons" | "month" | "months" => MONTH,
        "y" | "yr" | "yrs" | "year" | "years" => YEAR,
        _ => return None,
    };
    Some(seconds)
}

/// Text between terms may only hold whitespace, commas and "and"
fn is_separator(gap: &str) -> bool {
    gap.split(|c: char| c.is_whitespace() || c == ',')
        .all(|word| word.is_empty() || word == "and")
}

/// Parse a duration expression into whole seconds
pub fn parse_duration(expr: &str) -> Result<TimeDelta> {
    let normalized = expr.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(Error::invalid_expiry(expr, "empty duration"));
    }
    if normalized.starts_with('-') {
        return Err(Error::invalid_expiry(expr, "negative durations are not allowed"));
    }
    let text = normalized.strip_prefix('+').unwrap_or(&normalized).trim_start();

    let total = if number_regex().is_match(text) {
        parse_number(expr, text)?
    } else if let Some(caps) = clock_regex().captures(text) {
        // "mm:ss" or "h:mm:ss"
        let first = parse_number(expr, &caps[1])?;
        let second = parse_number(expr, &caps[2])?;
        match caps.get(3) {
            Some(third) => first * HOUR + second * MINUTE + parse_number(expr, third.as_str())?,
            None => first * MINUTE + second,
        }
    } else {
        parse_terms(expr, text)?
    };

    if !total.is_finite() || total >= i64::MAX as f64 {
        return Err(Error::invalid_expiry(expr, "duration is too large"));
    }

    TimeDelta::try_seconds(total.trunc() as i64)
        .ok_or_else(|| Error::invalid_expiry(expr, "duration is too large"))
}

fn parse_number(expr: &str, text: &str) -> Result<f64> {
    text.parse::<f64>()
        .map_err(|_| Error::invalid_expiry(expr, format!("'{}' is not a number", text)))
}

fn parse_terms(expr: &str, text: &str) -> Result<f64> {
    let mut total = 0.0;
    let mut last_end = 0;
    let mut terms = 0;

    for caps in term_regex().captures_iter(text) {
        let whole = caps.get(0).expect("group 0 always participates");
        let gap = &text[last_end..whole.start()];
        if !is_separator(gap) {
            return Err(Error::invalid_expiry(expr, format!("unexpected '{}'", gap.trim())));
        }

        let unit = &caps[2];
        let per_unit = unit_seconds(unit)
            .ok_or_else(|| Error::invalid_expiry(expr, format!("unknown unit '{}'", unit)))?;
        total += parse_number(expr, &caps[1])? * per_unit;

        last_end = whole.end();
        terms += 1;
    }

    let rest = &text[last_end..];
    if terms == 0 || !is_separator(rest) {
        let unexpected = if terms == 0 { text } else { rest.trim() };
        return Err(Error::invalid_expiry(expr, format!("unexpected '{}'", unexpected)));
    }

    Ok(total)
}

/// Instant `expr` before `now`
pub fn expiry_cutoff(expr: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let delta = parse_duration(expr)?;
    now.checked_sub_signed(delta)
        .ok_or_else(|| Error::invalid_expiry(expr, "cutoff is out of range"))
}

/// Unix timestamp of the instant `expr` before the current time, as a string
/// suitable for the `before` query parameter
pub fn calculate_expiry_timestamp(expr: &str) -> Result<String> {
    let now = Utc::now();
    let cutoff = expiry_cutoff(expr, now)?;

    tracing::debug!(
        "{} = {} seconds, now = {} ({}), expiry_ts = {} ({})",
        expr,
        (now - cutoff).num_seconds(),
        now.timestamp(),
        now.format("%Y-%m-%dT%H:%M:%S"),
        cutoff.timestamp(),
        cutoff.format("%Y-%m-%dT%H:%M:%S"),
    );

    Ok(cutoff.timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(expr: &str) -> i64 {
        parse_duration(expr).unwrap().num_seconds()
    }

    #[test]
    fn test_unit_terms() {
        assert_eq!(secs("30d"), 30 * 86_400);
        assert_eq!(secs("2 weeks"), 14 * 86_400);
        assert_eq!(secs("2w"), 14 * 86_400);
        assert_eq!(secs("1 day"), 86_400);
        assert_eq!(secs("0 seconds"), 0);
        assert_eq!(secs("45 MIN"), 45 * 60);
        assert_eq!(secs("1mo"), 30 * 86_400);
        assert_eq!(secs("1y"), 365 * 86_400);
    }

    #[test]
    fn test_compound_terms() {
        assert_eq!(secs("1h30m"), 5_400);
        assert_eq!(secs("1 day, 2 hours"), 93_600);
        assert_eq!(secs("1 day and 2 hours"), 93_600);
        assert_eq!(secs("1w 1d"), 8 * 86_400);
    }

    #[test]
    fn test_fractions_truncate() {
        assert_eq!(secs("1.5 hours"), 5_400);
        assert_eq!(secs("1.5"), 1);
        assert_eq!(secs(".5m"), 30);
    }

    #[test]
    fn test_plain_seconds_and_clock() {
        assert_eq!(secs("3600"), 3_600);
        assert_eq!(secs("+60"), 60);
        assert_eq!(secs("10:30"), 630);
        assert_eq!(secs("1:00:00"), 3_600);
        assert_eq!(secs("2:03:04"), 7_384);
    }

    #[test]
    fn test_rejects_garbage() {
        for expr in ["", "   ", "soon", "30 fortnights", "5 days ago", "x 5d", "-3d", "1::2", "12:99"] {
            let err = parse_duration(expr).unwrap_err();
            assert!(
                matches!(err, Error::InvalidExpiry { .. }),
                "expected InvalidExpiry for {:?}",
                expr
            );
        }
    }

    #[test]
    fn test_rejects_huge_values() {
        assert!(parse_duration("99999999999999999999 years").is_err());
    }

    #[test]
    fn test_cutoff_relative_to_now() {
        let now = DateTime::parse_from_rfc3339("2024-03-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let cutoff = expiry_cutoff("7 days", now).unwrap();
        assert_eq!(cutoff.to_rfc3339(), "2024-03-03T12:00:00+00:00");
    }

    #[test]
    fn test_timestamp_zero_is_now() {
        let before = Utc::now().timestamp();
        let ts: i64 = calculate_expiry_timestamp("0 seconds").unwrap().parse().unwrap();
        let after = Utc::now().timestamp();
        assert!(ts >= before - 1 && ts <= after + 1);
    }

    #[test]
    fn test_timestamp_one_day_ago() {
        let before = Utc::now().timestamp();
        let ts: i64 = calculate_expiry_timestamp("1 day").unwrap().parse().unwrap();
        let after = Utc::now().timestamp();
        assert!(ts >= before - 86_400 - 1 && ts <= after - 86_400 + 1);
    }

    #[test]
    fn test_timestamp_error_is_typed() {
        let err = calculate_expiry_timestamp("whenever").unwrap_err();
        assert!(err.to_string().contains("whenever"));
    }
}
