//! Cron schedule parsing and evaluation.
//!
//! Standard 5-field expressions (`minute hour day-of-month month
//! day-of-week`), evaluated in UTC at minute granularity. Supports `*`,
//! numbers, lists, ranges, and steps. When both day fields are restricted
//! they combine as OR (Vixie cron semantics); a field counts as restricted
//! when it does not start with `*`.

use chrono::{DateTime, Datelike, Days, TimeZone, Timelike, Utc};
use thiserror::Error;

/// Cron expression parse error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("cron expression must have 5 fields, got {0}")]
    FieldCount(usize),
    #[error("invalid cron {field} field: {reason}")]
    Field { field: &'static str, reason: String },
}

fn field_err(field: &'static str, reason: impl Into<String>) -> ScheduleError {
    ScheduleError::Field {
        field,
        reason: reason.into(),
    }
}

/// A parsed cron schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    minutes: Vec<u8>,
    hours: Vec<u8>,
    days_of_month: Vec<u8>,
    months: Vec<u8>,
    days_of_week: Vec<u8>, // 0 = Sunday
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ScheduleError::FieldCount(fields.len()));
        }

        let minutes = parse_field(fields[0], "minute", 0, 59)?;
        let hours = parse_field(fields[1], "hour", 0, 23)?;
        let days_of_month = parse_field(fields[2], "day-of-month", 1, 31)?;
        let months = parse_field(fields[3], "month", 1, 12)?;
        let mut days_of_week = parse_field(fields[4], "day-of-week", 0, 7)?;

        // 7 is an alias for Sunday.
        if days_of_week.contains(&7) {
            days_of_week.retain(|&d| d != 7);
            if !days_of_week.contains(&0) {
                days_of_week.insert(0, 0);
            }
        }

        Ok(Self {
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            dom_restricted: !fields[2].starts_with('*'),
            dow_restricted: !fields[4].starts_with('*'),
        })
    }

    /// Whether the schedule fires at `t` (seconds ignored).
    pub fn matches(&self, t: DateTime<Utc>) -> bool {
        self.minutes.contains(&(t.minute() as u8))
            && self.hours.contains(&(t.hour() as u8))
            && self.months.contains(&(t.month() as u8))
            && self.day_matches(&t)
    }

    /// Next fire time strictly after `t`.
    ///
    /// `None` when no occurrence exists within a four-year window (covers
    /// leap-day schedules; anything rarer is a configuration mistake).
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut t = (after + chrono::Duration::minutes(1))
            .with_second(0)?
            .with_nanosecond(0)?;

        let limit = t + chrono::Duration::days(4 * 366);
        while t < limit {
            if !self.months.contains(&(t.month() as u8)) {
                let (year, month) = if t.month() == 12 {
                    (t.year() + 1, 1)
                } else {
                    (t.year(), t.month() + 1)
                };
                t = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()?;
                continue;
            }

            if !self.day_matches(&t) {
                t = start_of_next_day(&t)?;
                continue;
            }

            if !self.hours.contains(&(t.hour() as u8)) {
                match self.hours.iter().find(|&&h| (h as u32) > t.hour()) {
                    Some(&h) => t = t.with_hour(h as u32)?.with_minute(0)?,
                    None => t = start_of_next_day(&t)?,
                }
                continue;
            }

            match self.minutes.iter().find(|&&m| (m as u32) >= t.minute()) {
                Some(&m) => return t.with_minute(m as u32),
                None => t = (t + chrono::Duration::hours(1)).with_minute(0)?,
            }
        }
        None
    }

    fn day_matches(&self, t: &DateTime<Utc>) -> bool {
        let dom = self.days_of_month.contains(&(t.day() as u8));
        let dow = self
            .days_of_week
            .contains(&(t.weekday().num_days_from_sunday() as u8));

        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }
}

fn start_of_next_day(t: &DateTime<Utc>) -> Option<DateTime<Utc>> {
    Some(
        (t.date_naive() + Days::new(1))
            .and_hms_opt(0, 0, 0)?
            .and_utc(),
    )
}

fn parse_num(s: &str, field: &'static str, min: u8, max: u8) -> Result<u8, ScheduleError> {
    let v: u8 = s
        .parse()
        .map_err(|_| field_err(field, format!("`{s}` is not a number")))?;
    if v < min || v > max {
        return Err(field_err(
            field,
            format!("{v} out of range {min}-{max}"),
        ));
    }
    Ok(v)
}

fn parse_field(
    field: &str,
    name: &'static str,
    min: u8,
    max: u8,
) -> Result<Vec<u8>, ScheduleError> {
    let mut values: Vec<u8> = Vec::new();

    for item in field.split(',') {
        let (range_part, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u8 = step
                    .parse()
                    .map_err(|_| field_err(name, format!("bad step `{step}`")))?;
                if step == 0 {
                    return Err(field_err(name, "step must be >= 1"));
                }
                (range, step)
            }
            None => (item, 1),
        };

        let (lo, hi) = if range_part == "*" {
            (min, max)
        } else if let Some((a, b)) = range_part.split_once('-') {
            (
                parse_num(a, name, min, max)?,
                parse_num(b, name, min, max)?,
            )
        } else {
            let v = parse_num(range_part, name, min, max)?;
            // `a/step` extends to the top of the range, like `a-max/step`.
            if item.contains('/') { (v, max) } else { (v, v) }
        };

        if lo > hi {
            return Err(field_err(name, format!("empty range `{item}`")));
        }

        let mut v = lo as u16;
        while v <= hi as u16 {
            values.push(v as u8);
            v += step as u16;
        }
    }

    if values.is_empty() {
        return Err(field_err(name, "no values"));
    }
    values.sort_unstable();
    values.dedup();
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn every_five_minutes() {
        let s = CronSchedule::parse("*/5 * * * *").unwrap();

        assert_eq!(s.next_after(at(2026, 8, 6, 10, 2)), Some(at(2026, 8, 6, 10, 5)));
        assert_eq!(s.next_after(at(2026, 8, 6, 10, 5)), Some(at(2026, 8, 6, 10, 10)));
        assert_eq!(s.next_after(at(2026, 8, 6, 10, 58)), Some(at(2026, 8, 6, 11, 0)));
    }

    #[test]
    fn daily_at_two() {
        let s = CronSchedule::parse("0 2 * * *").unwrap();

        assert_eq!(s.next_after(at(2026, 8, 6, 1, 0)), Some(at(2026, 8, 6, 2, 0)));
        assert_eq!(s.next_after(at(2026, 8, 6, 3, 0)), Some(at(2026, 8, 7, 2, 0)));
        // Exactly at the fire time: next is strictly after.
        assert_eq!(s.next_after(at(2026, 8, 6, 2, 0)), Some(at(2026, 8, 7, 2, 0)));
    }

    #[test]
    fn first_of_month_rolls_over_year() {
        let s = CronSchedule::parse("30 14 1 * *").unwrap();

        assert_eq!(s.next_after(at(2026, 12, 1, 15, 0)), Some(at(2027, 1, 1, 14, 30)));
    }

    #[test]
    fn lists_ranges_and_stepped_ranges() {
        let s = CronSchedule::parse("0,30 9-17 * * *").unwrap();
        assert_eq!(s.next_after(at(2026, 8, 6, 9, 1)), Some(at(2026, 8, 6, 9, 30)));
        assert_eq!(s.next_after(at(2026, 8, 6, 17, 31)), Some(at(2026, 8, 7, 9, 0)));

        let s = CronSchedule::parse("10-20/5 * * * *").unwrap();
        assert_eq!(s.next_after(at(2026, 8, 6, 10, 0)), Some(at(2026, 8, 6, 10, 10)));
        assert_eq!(s.next_after(at(2026, 8, 6, 10, 16)), Some(at(2026, 8, 6, 10, 20)));
        assert_eq!(s.next_after(at(2026, 8, 6, 10, 21)), Some(at(2026, 8, 6, 11, 10)));
    }

    #[test]
    fn weekday_schedule() {
        // 2026-08-06 is a Thursday; next Monday is 2026-08-10.
        let s = CronSchedule::parse("0 9 * * 1").unwrap();
        assert_eq!(s.next_after(at(2026, 8, 6, 12, 0)), Some(at(2026, 8, 10, 9, 0)));
    }

    #[test]
    fn sunday_alias_seven() {
        let a = CronSchedule::parse("0 0 * * 0").unwrap();
        let b = CronSchedule::parse("0 0 * * 7").unwrap();

        let from = at(2026, 8, 6, 0, 0);
        assert_eq!(a.next_after(from), b.next_after(from));
        // 2026-08-09 is a Sunday.
        assert_eq!(a.next_after(from), Some(at(2026, 8, 9, 0, 0)));
    }

    #[test]
    fn restricted_dom_and_dow_combine_as_or() {
        // Fires on the 13th of the month OR on Fridays.
        let s = CronSchedule::parse("0 0 13 * 5").unwrap();

        // 2026-08-07 is a Friday, before the 13th.
        assert_eq!(s.next_after(at(2026, 8, 6, 1, 0)), Some(at(2026, 8, 7, 0, 0)));
        // After that Friday, the 13th comes next (a Thursday).
        assert_eq!(s.next_after(at(2026, 8, 12, 1, 0)), Some(at(2026, 8, 13, 0, 0)));
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert!(matches!(
            CronSchedule::parse("* * * *"),
            Err(ScheduleError::FieldCount(4))
        ));
        assert!(CronSchedule::parse("60 * * * *").is_err());
        assert!(CronSchedule::parse("* 24 * * *").is_err());
        assert!(CronSchedule::parse("*/0 * * * *").is_err());
        assert!(CronSchedule::parse("a * * * *").is_err());
        assert!(CronSchedule::parse("5-2 * * * *").is_err());
        assert!(CronSchedule::parse("* * 0 * *").is_err());
    }

    #[test]
    fn parse_error_names_the_field() {
        let err = CronSchedule::parse("* * * 13 *").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid cron month field: 13 out of range 1-12"
        );
    }

    mod properties {
        use proptest::prelude::*;

        use super::*;

        fn brute_force_next(s: &CronSchedule, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
            let mut t = (after + chrono::Duration::minutes(1))
                .with_second(0)
                .unwrap()
                .with_nanosecond(0)
                .unwrap();
            let limit = after + chrono::Duration::days(7);
            while t < limit {
                if s.matches(t) {
                    return Some(t);
                }
                t += chrono::Duration::minutes(1);
            }
            None
        }

        proptest! {
            #[test]
            fn next_after_agrees_with_minute_scan(
                minute_step in 1u8..=20,
                hour_step in 1u8..=6,
                offset_minutes in 0i64..(14 * 24 * 60),
            ) {
                let expr = format!("*/{minute_step} */{hour_step} * * *");
                let s = CronSchedule::parse(&expr).unwrap();
                let after = at(2026, 2, 20, 0, 0) + chrono::Duration::minutes(offset_minutes);

                let next = s.next_after(after);
                prop_assert_eq!(next, brute_force_next(&s, after));

                let next = next.unwrap();
                prop_assert!(next > after);
                prop_assert!(s.matches(next));
            }

            #[test]
            fn next_after_is_monotone(
                offset_a in 0i64..(30 * 24 * 60),
                offset_b in 0i64..(30 * 24 * 60),
            ) {
                let s = CronSchedule::parse("0 9 * * 1-5").unwrap();
                let base = at(2026, 1, 1, 0, 0);
                let (t1, t2) = if offset_a <= offset_b {
                    (base + chrono::Duration::minutes(offset_a), base + chrono::Duration::minutes(offset_b))
                } else {
                    (base + chrono::Duration::minutes(offset_b), base + chrono::Duration::minutes(offset_a))
                };

                prop_assert!(s.next_after(t1).unwrap() <= s.next_after(t2).unwrap());
            }
        }
    }
}
