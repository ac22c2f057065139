//! Cron expression evaluation: "is it due now" and "next run after".

use {
    chrono::{DateTime, Duration, Timelike, Utc},
    cron::Schedule,
};

use crate::{Error, Result};

/// Parse a cron expression.
///
/// The `cron` crate requires 7 fields (sec min hour dom month dow year);
/// callers typically provide the standard 5 fields (min hour dom month dow).
/// Prepend "0" for seconds and append "*" for year.
pub fn parse(expr: &str) -> Result<Schedule> {
    expr.parse()
        .or_else(|_| format!("0 {expr} *").parse::<Schedule>())
        .map_err(|e| Error::schedule(expr, e))
}

/// Truncate an instant to minute resolution.
#[must_use]
pub fn truncate_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}

/// Whether the expression matches the minute containing `now`.
pub fn is_due_at(expr: &str, now: DateTime<Utc>) -> Result<bool> {
    let schedule = parse(expr)?;
    let minute = truncate_to_minute(now);
    // Occurrences of a padded expression land on second 0, so the schedule
    // is due iff the first occurrence at or after the minute start is the
    // minute start itself.
    let due = schedule
        .after(&(minute - Duration::seconds(1)))
        .next()
        .is_some_and(|next| next < minute + Duration::seconds(60));
    Ok(due)
}

/// Next run instant strictly after `after`, if the schedule has one.
pub fn next_after(expr: &str, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    let schedule = parse(expr)?;
    Ok(schedule.after(&after).next())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_five_field() {
        assert!(parse("*/5 * * * *").is_ok());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(parse("not a cron"), Err(Error::Schedule { .. })));
    }

    #[test]
    fn test_due_within_matching_minute() {
        // Every 5 minutes: due at 10:05:00 and anywhere in that minute.
        assert!(is_due_at("*/5 * * * *", at("2026-03-01T10:05:00Z")).unwrap());
        assert!(is_due_at("*/5 * * * *", at("2026-03-01T10:05:42Z")).unwrap());
    }

    #[test]
    fn test_not_due_outside_window() {
        assert!(!is_due_at("*/5 * * * *", at("2026-03-01T10:06:00Z")).unwrap());
        assert!(!is_due_at("0 4 * * *", at("2026-03-01T10:05:00Z")).unwrap());
    }

    #[test]
    fn test_daily_due_at_scheduled_minute() {
        assert!(is_due_at("0 4 * * *", at("2026-03-01T04:00:30Z")).unwrap());
    }

    #[test]
    fn test_next_after_is_strict() {
        // Next run after exactly 04:00 is the following day.
        let next = next_after("0 4 * * *", at("2026-03-01T04:00:00Z"))
            .unwrap()
            .unwrap();
        assert_eq!(next, at("2026-03-02T04:00:00Z"));
    }

    #[test]
    fn test_next_after_same_day() {
        let next = next_after("0 4 * * *", at("2026-03-01T01:00:00Z"))
            .unwrap()
            .unwrap();
        assert_eq!(next, at("2026-03-01T04:00:00Z"));
    }

    #[test]
    fn test_truncate_to_minute() {
        assert_eq!(
            truncate_to_minute(at("2026-03-01T10:05:42Z")),
            at("2026-03-01T10:05:00Z")
        );
    }
}
