//! The due-decision predicate: should a recurring job run now?

use chrono::{DateTime, Utc};

use crate::{
    Result,
    schedule::{is_due_at, next_after, truncate_to_minute},
    types::DueStatus,
};

/// Decide whether a job with the given schedule must run at `now`.
///
/// Two branches:
/// - The expression matches the current minute: run unless the job already
///   ran within this same minute (suppresses double-fire when the trigger is
///   invoked more than once per minute).
/// - Otherwise: run if a scheduled instant between `last_checked` and `now`
///   was missed because the trigger was not invoked in time. Without any
///   history there is no way to detect a missed window.
pub fn is_due(expr: &str, status: Option<&DueStatus>, now: DateTime<Utc>) -> Result<bool> {
    if is_due_at(expr, now)? {
        return Ok(match status.and_then(|s| s.last_run) {
            None => true,
            Some(last_run) => truncate_to_minute(last_run) != truncate_to_minute(now),
        });
    }

    let Some(last_checked) = status.map(|s| s.last_checked) else {
        return Ok(false);
    };

    match next_after(expr, last_checked)? {
        Some(next_expected) => Ok(next_expected <= now),
        None => Ok(false),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const EVERY_5_MIN: &str = "*/5 * * * *";
    const DAILY_4AM: &str = "0 4 * * *";

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn status(last_checked: &str, last_run: Option<&str>) -> DueStatus {
        DueStatus {
            job_id: "job".into(),
            last_checked: at(last_checked),
            last_run: last_run.map(at),
        }
    }

    #[test]
    fn test_due_now_without_history() {
        assert!(is_due(EVERY_5_MIN, None, at("2026-03-01T10:05:00Z")).unwrap());
    }

    #[test]
    fn test_due_now_without_last_run() {
        let s = status("2026-03-01T10:04:00Z", None);
        assert!(is_due(EVERY_5_MIN, Some(&s), at("2026-03-01T10:05:00Z")).unwrap());
    }

    #[test]
    fn test_same_minute_double_fire_suppressed() {
        let s = status("2026-03-01T10:05:10Z", Some("2026-03-01T10:05:10Z"));
        assert!(!is_due(EVERY_5_MIN, Some(&s), at("2026-03-01T10:05:40Z")).unwrap());
    }

    #[test]
    fn test_due_again_in_later_window() {
        let s = status("2026-03-01T10:05:00Z", Some("2026-03-01T10:05:00Z"));
        assert!(is_due(EVERY_5_MIN, Some(&s), at("2026-03-01T10:10:00Z")).unwrap());
    }

    #[test]
    fn test_not_due_without_history() {
        // 10:06 does not match, and with no history a missed window cannot
        // be detected.
        assert!(!is_due(EVERY_5_MIN, None, at("2026-03-01T10:06:00Z")).unwrap());
    }

    #[test]
    fn test_missed_window_detected() {
        // Last check before 04:00, trigger arrives late at 07:30.
        let s = status("2026-03-01T02:00:00Z", Some("2026-02-28T04:00:00Z"));
        assert!(is_due(DAILY_4AM, Some(&s), at("2026-03-01T07:30:00Z")).unwrap());
    }

    #[test]
    fn test_no_missed_window() {
        // Checked at 05:00 (after today's 04:00 fire), now 07:30: next
        // expected run is tomorrow.
        let s = status("2026-03-01T05:00:00Z", Some("2026-03-01T04:00:00Z"));
        assert!(!is_due(DAILY_4AM, Some(&s), at("2026-03-01T07:30:00Z")).unwrap());
    }

    #[test]
    fn test_malformed_expression_is_an_error() {
        assert!(is_due("bogus", None, at("2026-03-01T10:00:00Z")).is_err());
    }
}
