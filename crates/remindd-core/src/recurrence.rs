//! Next-fire-time resolution for recurring reminders.

use chrono::{DateTime, Duration, Utc};

use crate::cron::CronExpr;
use crate::error::RecurrenceError;

/// Prefix marking a schedule as plugin-defined. Rejected outright — the
/// engine only evaluates the five-field cron grammar.
pub const PLUGIN_PREFIX: &str = "plugin:";

/// Resolve the scheduled fire time for `expression` given a user-requested
/// time and the current wall clock.
///
/// A future `requested` that is itself the next natural occurrence of the
/// expression (evaluated from one second earlier) is returned unchanged, so
/// a deliberately chosen first occurrence that already matches the pattern
/// survives. Anything else resolves to the first occurrence after
/// `max(now, requested)`.
pub fn next_run(
    expression: &str,
    requested: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, RecurrenceError> {
    if expression.starts_with(PLUGIN_PREFIX) {
        return Err(RecurrenceError::Unsupported(expression.to_string()));
    }
    let expr = CronExpr::parse(expression)?;

    let mut base = now;
    if requested > now {
        if expr.next_after(requested - Duration::seconds(1)) == Some(requested) {
            return Ok(requested);
        }
        base = requested;
    }

    expr.next_after(base).ok_or_else(|| {
        RecurrenceError::Malformed(format!("expression never fires: {expression}"))
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    // 2024-01-01 was a Monday.

    #[test]
    fn preserves_requested_time_matching_pattern() {
        let now = utc(2024, 1, 3, 12, 0, 0);
        let requested = utc(2024, 1, 8, 9, 0, 0); // next Monday 09:00
        let got = next_run("0 9 * * MON", requested, now).unwrap();
        assert_eq!(got, requested);
    }

    #[test]
    fn future_requested_off_pattern_resolves_forward() {
        let now = utc(2024, 1, 3, 12, 0, 0);
        let requested = utc(2024, 1, 8, 10, 0, 0); // Monday but wrong hour
        let got = next_run("0 9 * * MON", requested, now).unwrap();
        assert_eq!(got, utc(2024, 1, 15, 9, 0, 0));
    }

    #[test]
    fn past_requested_resolves_from_now() {
        let now = utc(2024, 1, 3, 12, 0, 0);
        let requested = utc(2023, 12, 1, 0, 0, 0);
        let got = next_run("0 9 * * MON", requested, now).unwrap();
        assert_eq!(got, utc(2024, 1, 8, 9, 0, 0));
        assert!(got > now);
    }

    #[test]
    fn requested_with_stray_seconds_is_not_preserved() {
        let now = utc(2024, 1, 3, 12, 0, 0);
        let requested = utc(2024, 1, 8, 9, 0, 30);
        let got = next_run("0 9 * * MON", requested, now).unwrap();
        assert_eq!(got, utc(2024, 1, 15, 9, 0, 0));
    }

    #[test]
    fn plugin_prefix_is_rejected() {
        let now = utc(2024, 1, 3, 12, 0, 0);
        let err = next_run("plugin:lunar-phase", now, now).unwrap_err();
        assert!(matches!(err, RecurrenceError::Unsupported(_)));
    }

    #[test]
    fn malformed_expression_is_rejected() {
        let now = utc(2024, 1, 3, 12, 0, 0);
        let err = next_run("not a cron", now, now).unwrap_err();
        assert!(matches!(err, RecurrenceError::Malformed(_)));
    }

    #[test]
    fn never_firing_expression_is_malformed() {
        let now = utc(2024, 1, 3, 12, 0, 0);
        let err = next_run("0 0 31 2 *", now, now).unwrap_err();
        assert!(matches!(err, RecurrenceError::Malformed(_)));
    }

    #[test]
    fn advance_is_strictly_monotonic() {
        let now = utc(2024, 1, 3, 12, 0, 0);
        for expr in ["* * * * *", "*/5 * * * *", "0 9 * * MON", "30 8 1 * *"] {
            let got = next_run(expr, now, now).unwrap();
            assert!(got > now, "{expr} produced {got} <= {now}");
        }
    }
}
