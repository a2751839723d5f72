//! Time helpers
//!
//! All timestamps in storage and on the wire are UTC epoch milliseconds.

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};

/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Start of the UTC day containing `ts` (milliseconds)
pub fn day_start_millis(ts: i64) -> i64 {
    let dt = DateTime::<Utc>::from_timestamp_millis(ts).unwrap_or_default();
    dt.date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp_millis()
}

/// Resolve a statistics period selector to its window start.
///
/// - `day`: start of the current UTC day
/// - `week`: seven days before `now`
/// - `month`: one calendar month before `now`
///
/// Unknown selectors fall back to `day`.
pub fn period_start_millis(period: &str, now: i64) -> i64 {
    let now_dt = DateTime::<Utc>::from_timestamp_millis(now).unwrap_or_default();
    match period {
        "week" => (now_dt - Duration::days(7)).timestamp_millis(),
        "month" => now_dt
            .checked_sub_months(Months::new(1))
            .unwrap_or(now_dt)
            .timestamp_millis(),
        _ => day_start_millis(now),
    }
}

/// Parse a range-start bound: `YYYY-MM-DD` (start of day) or RFC 3339.
pub fn parse_range_start(s: &str) -> Option<i64> {
    parse_bound(s, false)
}

/// Parse a range-end bound: `YYYY-MM-DD` is inclusive through
/// 23:59:59.999 of that day; RFC 3339 datetimes are taken as-is.
pub fn parse_range_end(s: &str) -> Option<i64> {
    parse_bound(s, true)
}

fn parse_bound(s: &str, end_of_day: bool) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    let time = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999).unwrap()
    } else {
        date.and_hms_opt(0, 0, 0).unwrap()
    };
    Some(time.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_start() {
        // 2026-03-05T13:45:12Z
        let ts = 1_772_977_512_000;
        let start = day_start_millis(ts);
        assert_eq!((ts - start) % 86_400_000, ts - start);
        assert_eq!(start % 86_400_000, 0);
        assert!(start <= ts);
    }

    #[test]
    fn test_parse_date_bounds() {
        let start = parse_range_start("2026-01-15").unwrap();
        let end = parse_range_end("2026-01-15").unwrap();
        assert_eq!(end - start, 86_400_000 - 1);
    }

    #[test]
    fn test_parse_datetime_bound() {
        let ts = parse_range_start("2026-01-15T10:30:00Z").unwrap();
        assert_eq!(ts % 1000, 0);
        assert!(ts > parse_range_start("2026-01-15").unwrap());
    }

    #[test]
    fn test_period_start_ordering() {
        let now = now_millis();
        let day = period_start_millis("day", now);
        let week = period_start_millis("week", now);
        let month = period_start_millis("month", now);
        assert!(day <= now);
        assert!(week < day);
        assert!(month <= week);
    }

    #[test]
    fn test_unknown_period_falls_back_to_day() {
        let now = now_millis();
        assert_eq!(period_start_millis("fortnight", now), period_start_millis("day", now));
    }
}
