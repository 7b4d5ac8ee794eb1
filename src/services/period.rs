//! Calendar ranges used by the year and month filters
//!
//! Ranges are half-open, `[start, end)`, in UTC.

use chrono::{DateTime, NaiveDate, Utc};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

fn start_of(year: i32, month: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// The whole of `year`; `None` when chrono cannot represent it
pub fn year_range(year: i32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    Some((start_of(year, 1)?, start_of(year.checked_add(1)?, 1)?))
}

/// One month of one year; `None` for a month outside `1..=12`
pub fn month_range(year: i32, month: u32) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let end = if month == 12 {
        start_of(year.checked_add(1)?, 1)?
    } else {
        start_of(year, month + 1)?
    };
    Some((start_of(year, month)?, end))
}

/// English month name, `None` outside `1..=12`
pub fn month_name(month: u32) -> Option<&'static str> {
    let index = usize::try_from(month).ok()?.checked_sub(1)?;
    MONTH_NAMES.get(index).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_year_range() {
        let (start, end) = year_range(2024).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert!(year_range(i32::MAX).is_none());
    }

    #[test]
    fn test_month_range_wraps_december() {
        let (start, end) = month_range(2023, 12).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

        let (start, end) = month_range(2024, 2).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_month_range_rejects_bad_month() {
        assert!(month_range(2024, 0).is_none());
        assert!(month_range(2024, 13).is_none());
    }

    #[test]
    fn test_month_name() {
        assert_eq!(month_name(1), Some("January"));
        assert_eq!(month_name(12), Some("December"));
        assert_eq!(month_name(0), None);
        assert_eq!(month_name(13), None);
    }
}
