// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal 5-field cron evaluator, just enough to compute the next fire
//! time for `ExecutionInfo::cron_schedule` (§4.3's cron-backoff path). No
//! crate in this codebase's dependency stack covers cron parsing, so this
//! covers only the subset of syntax a schedule here actually needs: `*`, a
//! comma-separated list of numbers, and `*/step`. Field order is standard
//! cron: minute hour day-of-month month day-of-week.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use std::ops::RangeInclusive;

#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldMatch {
    /// `None` means "any value" (the `*` wildcard).
    values: Option<Vec<u32>>,
}

impl FieldMatch {
    fn matches(&self, value: u32) -> bool {
        match &self.values {
            None => true,
            Some(values) => values.contains(&value),
        }
    }
}

fn parse_field(field: &str, range: RangeInclusive<u32>) -> Option<FieldMatch> {
    if field == "*" {
        return Some(FieldMatch { values: None });
    }
    if let Some(step_str) = field.strip_prefix("*/") {
        let step: usize = step_str.parse().ok()?;
        if step == 0 {
            return None;
        }
        return Some(FieldMatch { values: Some(range.step_by(step).collect()) });
    }
    let values = field.split(',').map(|v| v.parse::<u32>()).collect::<Result<Vec<_>, _>>().ok()?;
    Some(FieldMatch { values: Some(values) })
}

/// A parsed 5-field cron expression.
struct CronSchedule {
    minute: FieldMatch,
    hour: FieldMatch,
    day_of_month: FieldMatch,
    month: FieldMatch,
    day_of_week: FieldMatch,
}

impl CronSchedule {
    fn parse(expr: &str) -> Option<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        let [minute, hour, day_of_month, month, day_of_week] = fields.as_slice() else {
            return None;
        };
        Some(Self {
            minute: parse_field(minute, 0..=59)?,
            hour: parse_field(hour, 0..=23)?,
            day_of_month: parse_field(day_of_month, 1..=31)?,
            month: parse_field(month, 1..=12)?,
            day_of_week: parse_field(day_of_week, 0..=6)?,
        })
    }

    fn matches(&self, dt: &DateTime<Utc>) -> bool {
        self.minute.matches(dt.minute())
            && self.hour.matches(dt.hour())
            && self.day_of_month.matches(dt.day())
            && self.month.matches(dt.month())
            && self.day_of_week.matches(dt.weekday().num_days_from_sunday())
    }
}

/// Seconds from `now_ms` until the next minute-aligned time matching
/// `schedule`. Scans forward minute by minute, bounded to two years out.
/// Returns `None` if `schedule` doesn't parse or has no match in that
/// window (a malformed schedule should not wedge the decision handler).
pub fn seconds_until_next(schedule: &str, now_ms: i64) -> Option<u32> {
    let parsed = CronSchedule::parse(schedule)?;
    let now = Utc.timestamp_millis_opt(now_ms).single()?;
    let mut candidate = (now + Duration::minutes(1)).with_second(0)?.with_nanosecond(0)?;
    let limit = now + Duration::days(366 * 2);
    while candidate <= limit {
        if parsed.matches(&candidate) {
            let delta_ms = candidate.timestamp_millis() - now_ms;
            return u32::try_from(delta_ms / 1000).ok();
        }
        candidate += Duration::minutes(1);
    }
    None
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
