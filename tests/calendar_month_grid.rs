use checkind::rollup::{days_in_month, month_calendar};
use checkind::store::CheckinEvent;

fn event(stamp: &str) -> CheckinEvent {
    CheckinEvent {
        id: format!("id-{}", stamp),
        name: "Alex Johnson".to_string(),
        morale: 6,
        understanding: 7,
        submitted_at: stamp.to_string(),
    }
}

#[test]
fn every_row_is_seven_cells_and_in_month_days_are_complete() {
    for (year, month) in [(2025, 6), (2025, 9), (2024, 2), (2025, 12)] {
        let weeks = month_calendar(&[], year, month).expect("valid month");
        let mut in_month = 0u32;
        let mut last_day = 0u32;
        for week in &weeks {
            assert_eq!(week.len(), 7, "{}-{} row width", year, month);
            for cell in week {
                if cell.day == 0 {
                    assert!(cell.date_key.is_none());
                    assert!(cell.stats.is_none());
                } else {
                    in_month += 1;
                    assert_eq!(cell.day, last_day + 1, "days must be consecutive");
                    last_day = cell.day;
                }
            }
        }
        assert_eq!(in_month, days_in_month(year, month).expect("days"));
    }
}

#[test]
fn weeks_start_on_monday() {
    // June 2025 begins on a Sunday, so the first row is six blanks then day 1.
    let weeks = month_calendar(&[], 2025, 6).expect("valid month");
    let first: Vec<u32> = weeks[0].iter().map(|c| c.day).collect();
    assert_eq!(first, vec![0, 0, 0, 0, 0, 0, 1]);

    // September 2025 begins on a Monday, so there is no leading padding.
    let weeks = month_calendar(&[], 2025, 9).expect("valid month");
    let first: Vec<u32> = weeks[0].iter().map(|c| c.day).collect();
    assert_eq!(first, vec![1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn leap_february_has_twenty_nine_days() {
    assert_eq!(days_in_month(2024, 2), Some(29));
    assert_eq!(days_in_month(2025, 2), Some(28));

    let weeks = month_calendar(&[], 2024, 2).expect("valid month");
    let max_day = weeks
        .iter()
        .flatten()
        .map(|c| c.day)
        .max()
        .unwrap_or(0);
    assert_eq!(max_day, 29);
}

#[test]
fn stats_appear_only_on_days_with_events() {
    let events = vec![
        event("2025-06-03T09:00:00.000000"),
        event("2025-06-03T10:00:00.000000"),
        event("2025-06-15T09:00:00.000000"),
    ];
    let weeks = month_calendar(&events, 2025, 6).expect("valid month");
    let mut days_with_stats = Vec::new();
    for cell in weeks.iter().flatten() {
        if let Some(stats) = &cell.stats {
            days_with_stats.push(cell.day);
            if cell.day == 3 {
                assert_eq!(stats.count, 2);
                assert_eq!(stats.avg_morale, 6.0);
            }
        }
    }
    assert_eq!(days_with_stats, vec![3, 15]);
}

#[test]
fn out_of_range_months_are_rejected() {
    assert!(month_calendar(&[], 2025, 0).is_err());
    assert!(month_calendar(&[], 2025, 13).is_err());
    assert!(days_in_month(2025, 13).is_none());
}
