use chrono::{DateTime, Datelike, NaiveDate, TimeDelta};

/// Candidate window bounds in epoch milliseconds, centered on noon UTC of
/// the meeting date and extending `window_hours` in each direction.
/// Returns None for an unparseable date.
pub fn local_day_bounds_ms(date_str: &str, window_hours: i64) -> Option<(i64, i64)> {
    let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").ok()?;
    let noon_utc = date.and_hms_opt(12, 0, 0)?.and_utc();
    let center = noon_utc.timestamp_millis();
    let half = window_hours * 60 * 60 * 1000;
    Some((center - half, center + half))
}

/// Proximity of a candidate's midpoint to the window center, in [0, 1].
/// Midpoint is the average of both bounds when present, else whichever
/// bound exists, else the center itself (scoring 1.0).
pub fn time_proximity(
    start_ms: Option<i64>,
    end_ms: Option<i64>,
    center_ms: i64,
    lo_ms: i64,
    hi_ms: i64,
) -> f64 {
    let midpoint = match (start_ms, end_ms) {
        (Some(s), Some(e)) => (s + e) / 2,
        (Some(s), None) => s,
        (None, Some(e)) => e,
        (None, None) => center_ms,
    };
    let span = (hi_ms - lo_ms).max(1) as f64;
    (1.0 - ((midpoint - center_ms).abs() as f64 / span)).max(0.0)
}

/// Whether `start_ms` falls on the pending record's calendar day in an
/// approximated US-Eastern local time: UTC-5 for months 3..=11, UTC-6
/// otherwise. A deliberate simplification, not full timezone handling.
pub fn same_local_calendar_day(meeting_date: &str, start_ms: Option<i64>) -> bool {
    let Some(ms) = start_ms else {
        return false;
    };
    let Some(dt_utc) = DateTime::from_timestamp_millis(ms) else {
        return false;
    };
    let month = dt_utc.month();
    let offset_hours = if (3..=11).contains(&month) { -5 } else { -6 };
    let local = dt_utc + TimeDelta::hours(offset_hours);
    local.format("%Y-%m-%d").to_string() == meeting_date.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_day_bounds() {
        let (lo, hi) = local_day_bounds_ms("2024-03-10", 36).unwrap();
        // Centered on noon UTC, +/- 36h
        let center = (lo + hi) / 2;
        assert_eq!(hi - lo, 2 * 36 * 3600 * 1000);
        let noon = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        assert_eq!(center, noon);
        assert!(local_day_bounds_ms("not-a-date", 36).is_none());
    }

    #[test]
    fn test_time_proximity_center_and_edges() {
        let (lo, hi) = (0i64, 100_000i64);
        let center = 50_000i64;
        assert_eq!(time_proximity(Some(40_000), Some(60_000), center, lo, hi), 1.0);
        assert_eq!(time_proximity(None, None, center, lo, hi), 1.0);
        let near = time_proximity(Some(60_000), None, center, lo, hi);
        assert!(near > 0.8 && near < 1.0);
        // Far outside the window clamps to zero
        assert_eq!(time_proximity(Some(500_000), Some(600_000), center, lo, hi), 0.0);
    }

    #[test]
    fn test_time_proximity_monotonic() {
        let (lo, hi) = (0i64, 200_000i64);
        let center = 100_000i64;
        let a = time_proximity(Some(110_000), Some(110_000), center, lo, hi);
        let b = time_proximity(Some(150_000), Some(150_000), center, lo, hi);
        assert!(a > b);
    }

    #[test]
    fn test_same_local_calendar_day() {
        // 2024-03-10 17:00 UTC is 12:00 local at UTC-5
        let ms = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        assert!(same_local_calendar_day("2024-03-10", Some(ms)));
        // 03:00 UTC is still the previous local day
        let early = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(3, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        assert!(!same_local_calendar_day("2024-03-10", Some(early)));
        assert!(!same_local_calendar_day("2024-03-10", None));
    }
}
