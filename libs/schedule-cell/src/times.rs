// libs/schedule-cell/src/times.rs
//
// Time-of-day helpers for the scheduling engine. Times of day travel as
// "HH:MM" strings at the API boundary and as `NaiveTime` internally; the
// shift arithmetic works on minutes-since-midnight so no calendar-date
// side effects can leak in.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Timelike, Utc, Weekday};

use shared_models::AppError;

const MINUTES_PER_DAY: i64 = 24 * 60;

pub fn parse_hhmm(raw: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| AppError::validation(format!("invalid time of day {:?}, expected HH:MM", raw)))
}

pub fn format_hhmm(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

/// Combine a date with a time of day into an absolute instant, zeroing
/// seconds and sub-seconds.
pub fn combine(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let truncated = time
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(time);
    date.and_time(truncated).and_utc()
}

/// Shift a time of day by a signed number of minutes. Crossing midnight
/// wraps modulo 24 hours in either direction.
pub fn shift_time(time: NaiveTime, minutes: i64) -> NaiveTime {
    let total = time.hour() as i64 * 60 + time.minute() as i64 + minutes;
    let wrapped = total.rem_euclid(MINUTES_PER_DAY);
    NaiveTime::from_hms_opt((wrapped / 60) as u32, (wrapped % 60) as u32, 0).unwrap_or(time)
}

/// "HH:MM" rendition of [`shift_time`] for the external boundary.
pub fn shift_hhmm(raw: &str, minutes: i64) -> Result<String, AppError> {
    Ok(format_hhmm(shift_time(parse_hhmm(raw)?, minutes)))
}

/// Expand a symbolic weekday set into the concrete matching dates within
/// the look-ahead horizon, starting from (and including) `from`.
pub fn expand_weekdays(from: NaiveDate, weekdays: &[Weekday], weeks: u32) -> Vec<NaiveDate> {
    let horizon = weeks as i64 * 7;
    (0..horizon)
        .filter_map(|offset| {
            let date = from + Duration::days(offset);
            weekdays.contains(&date.weekday()).then_some(date)
        })
        .collect()
}

/// Parse a day name ("monday", "mon", case-insensitive) into a weekday.
pub fn parse_weekday(raw: &str) -> Result<Weekday, AppError> {
    raw.parse::<Weekday>()
        .map_err(|_| AppError::validation(format!("unknown weekday name {:?}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn parses_and_formats_hhmm() {
        assert_eq!(parse_hhmm("09:05").unwrap(), hm(9, 5));
        assert_eq!(format_hhmm(hm(9, 5)), "09:05");
        assert!(parse_hhmm("9am").is_err());
        assert!(parse_hhmm("25:00").is_err());
    }

    #[test]
    fn combine_zeroes_seconds() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let instant = combine(date, NaiveTime::from_hms_opt(9, 30, 42).unwrap());
        assert_eq!(instant.to_rfc3339(), "2026-03-02T09:30:00+00:00");
    }

    #[test]
    fn shift_wraps_across_midnight() {
        assert_eq!(shift_time(hm(23, 30), 45), hm(0, 15));
        assert_eq!(shift_time(hm(0, 15), -30), hm(23, 45));
        assert_eq!(shift_hhmm("09:00", 90).unwrap(), "10:30");
    }

    #[test]
    fn expands_weekdays_over_horizon() {
        // 2026-03-02 is a Monday.
        let from = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let dates = expand_weekdays(from, &[Weekday::Mon, Weekday::Wed], 2);
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
                NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
                NaiveDate::from_ymd_opt(2026, 3, 11).unwrap(),
            ]
        );
    }

    #[test]
    fn parses_weekday_names() {
        assert_eq!(parse_weekday("monday").unwrap(), Weekday::Mon);
        assert_eq!(parse_weekday("Fri").unwrap(), Weekday::Fri);
        assert!(parse_weekday("noday").is_err());
    }
}
