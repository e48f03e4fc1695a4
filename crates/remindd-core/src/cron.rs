//! Five-field cron expression parser and evaluator.
//!
//! Grammar per field: `*`, lists `a,b,c`, ranges `a-b`, steps `*/n` and
//! `a-b/n`, plus three-letter month (`JAN`..`DEC`) and weekday (`SUN`..`SAT`)
//! names. Weekday `7` is an alias for `0` (Sunday). When both day-of-month
//! and day-of-week are restricted, a day matching either fires (classic
//! cron OR semantics).

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};

use crate::error::RecurrenceError;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// Search horizon for `next_after` — an expression with no occurrence in
/// five years (e.g. `0 0 31 2 *`) is treated as never firing.
const HORIZON_DAYS: i64 = 365 * 5;

/// A parsed five-field cron expression, one bitmask per field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    minutes: u64,
    hours: u64,
    days: u64,
    months: u64,
    weekdays: u64,
    /// Whether the day-of-month field started with `*` — controls the
    /// dom/dow OR rule below.
    dom_star: bool,
    dow_star: bool,
}

impl CronExpr {
    pub fn parse(text: &str) -> Result<Self, RecurrenceError> {
        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(RecurrenceError::Malformed(format!(
                "expected 5 fields (minute hour day month weekday), got {}",
                fields.len()
            )));
        }

        let (minutes, _) = parse_field(fields[0], 0, 59, None)?;
        let (hours, _) = parse_field(fields[1], 0, 23, None)?;
        let (days, dom_star) = parse_field(fields[2], 1, 31, None)?;
        let (months, _) = parse_field(fields[3], 1, 12, Some((&MONTH_NAMES, 1)))?;
        let (mut weekdays, dow_star) = parse_field(fields[4], 0, 7, Some((&DAY_NAMES, 0)))?;

        // Fold weekday 7 (alias for Sunday) into bit 0.
        if weekdays & (1 << 7) != 0 {
            weekdays = (weekdays & !(1 << 7)) | 1;
        }

        Ok(Self {
            minutes,
            hours,
            days,
            months,
            weekdays,
            dom_star,
            dow_star,
        })
    }

    /// First occurrence strictly after `after`, on the minute grid.
    ///
    /// Returns `None` when no day within the search horizon satisfies the
    /// expression.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut t = truncate_to_minute(after)? + Duration::minutes(1);
        let horizon = after + Duration::days(HORIZON_DAYS);

        while t < horizon {
            if self.months & (1 << t.month()) == 0 {
                t = start_of_next_month(t)?;
                continue;
            }
            if !self.day_matches(t) {
                t = start_of_next_day(t)?;
                continue;
            }
            if self.hours & (1 << t.hour()) == 0 {
                t = truncate_to_hour(t)? + Duration::hours(1);
                continue;
            }
            if self.minutes & (1 << t.minute()) == 0 {
                t = t + Duration::minutes(1);
                continue;
            }
            return Some(t);
        }
        None
    }

    fn day_matches(&self, t: DateTime<Utc>) -> bool {
        let dom = self.days & (1 << t.day()) != 0;
        let dow = self.weekdays & (1 << t.weekday().num_days_from_sunday()) != 0;
        match (self.dom_star, self.dow_star) {
            (true, true) => true,
            (true, false) => dow,
            (false, true) => dom,
            // Both restricted: classic cron fires on either.
            (false, false) => dom || dow,
        }
    }
}

/// Parse one field into a bitmask over `min..=max`.
///
/// The returned bool is the "star" flag: true when the field text begins
/// with `*` (including `*/n`), used for the dom/dow rule.
fn parse_field(
    text: &str,
    min: u32,
    max: u32,
    names: Option<(&[&str], u32)>,
) -> Result<(u64, bool), RecurrenceError> {
    let star = text.starts_with('*');
    let mut mask: u64 = 0;

    let resolve = |s: &str| -> Result<u32, RecurrenceError> {
        if let Ok(v) = s.parse::<u32>() {
            if v < min || v > max {
                return Err(RecurrenceError::Malformed(format!(
                    "value {v} out of range {min}-{max}"
                )));
            }
            return Ok(v);
        }
        if let Some((table, base)) = names {
            let lower = s.to_ascii_lowercase();
            if let Some(i) = table.iter().position(|n| *n == lower) {
                return Ok(i as u32 + base);
            }
        }
        Err(RecurrenceError::Malformed(format!("unrecognized value {s:?}")))
    };

    for part in text.split(',') {
        if part.is_empty() {
            return Err(RecurrenceError::Malformed("empty list element".to_string()));
        }

        let (range_text, step) = match part.split_once('/') {
            Some((r, s)) => {
                let step: u32 = s
                    .parse()
                    .map_err(|_| RecurrenceError::Malformed(format!("bad step {s:?}")))?;
                if step == 0 {
                    return Err(RecurrenceError::Malformed("step must be positive".to_string()));
                }
                (r, Some(step))
            }
            None => (part, None),
        };

        let (lo, hi) = if range_text == "*" {
            (min, max)
        } else if let Some((a, b)) = range_text.split_once('-') {
            (resolve(a)?, resolve(b)?)
        } else {
            let v = resolve(range_text)?;
            // "a/n" extends to the top of the field, per classic cron.
            match step {
                Some(_) => (v, max),
                None => (v, v),
            }
        };

        if lo > hi {
            return Err(RecurrenceError::Malformed(format!(
                "inverted range {lo}-{hi}"
            )));
        }

        let step = step.unwrap_or(1) as usize;
        for v in (lo..=hi).step_by(step) {
            mask |= 1 << v;
        }
    }

    if mask == 0 {
        return Err(RecurrenceError::Malformed("field selects nothing".to_string()));
    }
    Ok((mask, star))
}

fn truncate_to_minute(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    t.with_second(0)?.with_nanosecond(0)
}

fn truncate_to_hour(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    truncate_to_minute(t)?.with_minute(0)
}

fn start_of_next_day(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let next = t.date_naive().succ_opt()?;
    Utc.with_ymd_and_hms(next.year(), next.month(), next.day(), 0, 0, 0)
        .single()
}

fn start_of_next_month(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (year, month) = if t.month() == 12 {
        (t.year() + 1, 1)
    } else {
        (t.year(), t.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(CronExpr::parse("* * * *").is_err());
        assert!(CronExpr::parse("* * * * * *").is_err());
        assert!(CronExpr::parse("").is_err());
    }

    #[test]
    fn rejects_out_of_range_and_garbage() {
        assert!(CronExpr::parse("60 * * * *").is_err());
        assert!(CronExpr::parse("* 24 * * *").is_err());
        assert!(CronExpr::parse("* * 0 * *").is_err());
        assert!(CronExpr::parse("* * * 13 *").is_err());
        assert!(CronExpr::parse("* * * * 8").is_err());
        assert!(CronExpr::parse("a * * * *").is_err());
        assert!(CronExpr::parse("*/0 * * * *").is_err());
        assert!(CronExpr::parse("5-2 * * * *").is_err());
        assert!(CronExpr::parse("1,,2 * * * *").is_err());
    }

    #[test]
    fn every_minute() {
        let e = CronExpr::parse("* * * * *").unwrap();
        let t = utc(2024, 1, 1, 12, 30, 15);
        assert_eq!(e.next_after(t), Some(utc(2024, 1, 1, 12, 31, 0)));
    }

    #[test]
    fn step_minutes() {
        let e = CronExpr::parse("*/15 * * * *").unwrap();
        assert_eq!(
            e.next_after(utc(2024, 1, 1, 12, 0, 0)),
            Some(utc(2024, 1, 1, 12, 15, 0))
        );
        assert_eq!(
            e.next_after(utc(2024, 1, 1, 12, 50, 0)),
            Some(utc(2024, 1, 1, 13, 0, 0))
        );
    }

    #[test]
    fn weekday_by_name_case_insensitive() {
        // 2024-01-01 was a Monday.
        let e = CronExpr::parse("0 9 * * mon").unwrap();
        assert_eq!(
            e.next_after(utc(2024, 1, 1, 8, 0, 0)),
            Some(utc(2024, 1, 1, 9, 0, 0))
        );
        assert_eq!(
            e.next_after(utc(2024, 1, 1, 10, 0, 0)),
            Some(utc(2024, 1, 8, 9, 0, 0))
        );
        assert_eq!(
            CronExpr::parse("0 9 * * MON").unwrap(),
            CronExpr::parse("0 9 * * 1").unwrap()
        );
    }

    #[test]
    fn sunday_seven_aliases_zero() {
        let seven = CronExpr::parse("0 0 * * 7").unwrap();
        let zero = CronExpr::parse("0 0 * * 0").unwrap();
        // 2024-01-07 was a Sunday.
        let from = utc(2024, 1, 1, 0, 0, 0);
        assert_eq!(seven.next_after(from), Some(utc(2024, 1, 7, 0, 0, 0)));
        assert_eq!(seven.next_after(from), zero.next_after(from));
    }

    #[test]
    fn dom_and_dow_both_restricted_fires_on_either() {
        let e = CronExpr::parse("0 0 13 * FRI").unwrap();
        // First Friday after Jan 1 2024 is Jan 5 — before the 13th.
        assert_eq!(
            e.next_after(utc(2024, 1, 1, 0, 0, 0)),
            Some(utc(2024, 1, 5, 0, 0, 0))
        );
        // Between Fridays, the 13th itself matches (Jan 13 2024 was a Saturday).
        assert_eq!(
            e.next_after(utc(2024, 1, 12, 1, 0, 0)),
            Some(utc(2024, 1, 13, 0, 0, 0))
        );
    }

    #[test]
    fn month_rollover_by_name() {
        let e = CronExpr::parse("0 0 1 feb *").unwrap();
        assert_eq!(
            e.next_after(utc(2024, 3, 1, 0, 0, 0)),
            Some(utc(2025, 2, 1, 0, 0, 0))
        );
    }

    #[test]
    fn weekday_name_range() {
        let e = CronExpr::parse("30 8 * * MON-FRI").unwrap();
        // 2024-01-05 Friday 09:00 -> Monday Jan 8 08:30.
        assert_eq!(
            e.next_after(utc(2024, 1, 5, 9, 0, 0)),
            Some(utc(2024, 1, 8, 8, 30, 0))
        );
    }

    #[test]
    fn impossible_date_returns_none() {
        let e = CronExpr::parse("0 0 31 2 *").unwrap();
        assert_eq!(e.next_after(utc(2024, 1, 1, 0, 0, 0)), None);
    }

    #[test]
    fn list_of_values() {
        let e = CronExpr::parse("0 6,18 * * *").unwrap();
        assert_eq!(
            e.next_after(utc(2024, 1, 1, 7, 0, 0)),
            Some(utc(2024, 1, 1, 18, 0, 0))
        );
        assert_eq!(
            e.next_after(utc(2024, 1, 1, 19, 0, 0)),
            Some(utc(2024, 1, 2, 6, 0, 0))
        );
    }
}
