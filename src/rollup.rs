use crate::store::CheckinEvent;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Bad calendar parameters (month outside 1..=12, unrepresentable year).
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidRange(pub String);

impl fmt::Display for InvalidRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRollup {
    pub date_key: String,
    pub checkins: Vec<CheckinEvent>,
    pub count: usize,
    pub avg_morale: f64,
    pub avg_understanding: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentHistory {
    pub name: String,
    pub checkins: Vec<CheckinEvent>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayStats {
    pub count: usize,
    pub avg_morale: f64,
    pub avg_understanding: f64,
}

/// One slot in the month grid. `day == 0` marks padding outside the month;
/// such cells carry neither a date key nor stats.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarCell {
    pub day: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<DayStats>,
}

fn rollup_for(date_key: &str, checkins: Vec<CheckinEvent>) -> DailyRollup {
    let count = checkins.len();
    let sum_morale: i64 = checkins.iter().map(|c| c.morale).sum();
    let sum_understanding: i64 = checkins.iter().map(|c| c.understanding).sum();
    // count > 0 by construction: groups only exist for present events.
    let n = count as f64;
    DailyRollup {
        date_key: date_key.to_string(),
        count,
        avg_morale: sum_morale as f64 / n,
        avg_understanding: sum_understanding as f64 / n,
        checkins,
    }
}

/// Group by calendar date. Days with no events have no entry; absence is the
/// only representation of "no data", never a zero-filled rollup.
pub fn daily_rollups(events: &[CheckinEvent]) -> BTreeMap<String, DailyRollup> {
    let mut grouped: BTreeMap<String, Vec<CheckinEvent>> = BTreeMap::new();
    for event in events {
        grouped
            .entry(event.date_key().to_string())
            .or_default()
            .push(event.clone());
    }
    grouped
        .into_iter()
        .map(|(date_key, checkins)| {
            let rollup = rollup_for(&date_key, checkins);
            (date_key, rollup)
        })
        .collect()
}

/// The rollup for `date`, or `None` when nothing was submitted that day.
/// The distinction matters for display: "no check-ins yet" is not the same
/// as "check-ins averaging zero".
pub fn todays_summary(events: &[CheckinEvent], date: NaiveDate) -> Option<DailyRollup> {
    let key = date.format("%Y-%m-%d").to_string();
    let checkins: Vec<CheckinEvent> = events
        .iter()
        .filter(|e| e.date_key() == key)
        .cloned()
        .collect();
    if checkins.is_empty() {
        return None;
    }
    Some(rollup_for(&key, checkins))
}

/// One history per distinct normalized identity, keyed and iterated in
/// ascending identity order; events stay chronological within each history.
pub fn student_histories(events: &[CheckinEvent]) -> BTreeMap<String, StudentHistory> {
    let mut grouped: BTreeMap<String, StudentHistory> = BTreeMap::new();
    for event in events {
        grouped
            .entry(event.name.clone())
            .or_insert_with(|| StudentHistory {
                name: event.name.clone(),
                checkins: Vec::new(),
            })
            .checkins
            .push(event.clone());
    }
    grouped
}

pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((next - first).num_days() as u32)
}

/// Classic month-matrix: rows of exactly 7 cells, weeks starting Monday,
/// leading/trailing slots outside the month zero-filled. In-month cells carry
/// that day's stats when a rollup exists for the date, else nothing.
pub fn month_calendar(
    events: &[CheckinEvent],
    year: i32,
    month: u32,
) -> Result<Vec<Vec<CalendarCell>>, InvalidRange> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| InvalidRange(format!("invalid year/month: {}-{}", year, month)))?;
    let days = days_in_month(year, month)
        .ok_or_else(|| InvalidRange(format!("invalid year/month: {}-{}", year, month)))?;

    let rollups = daily_rollups(events);

    let blank = || CalendarCell {
        day: 0,
        date_key: None,
        stats: None,
    };

    let mut weeks: Vec<Vec<CalendarCell>> = Vec::new();
    let mut week: Vec<CalendarCell> = Vec::new();
    for _ in 0..first.weekday().num_days_from_monday() {
        week.push(blank());
    }
    for day in 1..=days {
        let date_key = format!("{:04}-{:02}-{:02}", year, month, day);
        let stats = rollups.get(&date_key).map(|r| DayStats {
            count: r.count,
            avg_morale: r.avg_morale,
            avg_understanding: r.avg_understanding,
        });
        week.push(CalendarCell {
            day,
            date_key: Some(date_key),
            stats,
        });
        if week.len() == 7 {
            weeks.push(std::mem::take(&mut week));
        }
    }
    if !week.is_empty() {
        while week.len() < 7 {
            week.push(blank());
        }
        weeks.push(week);
    }
    Ok(weeks)
}
