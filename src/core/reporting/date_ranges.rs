use std::fmt;

use chrono::{Datelike, Duration, NaiveDate};

/// Length of the trailing window used by the 90-day report.
pub const TRAILING_WINDOW_DAYS: i64 = 90;

/// An inclusive calendar date range. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when `start` is after `end`.
    #[cfg(test)]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    #[cfg(test)]
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// `YYYY-MM-DD` form of the start date, as the GA4 API expects it.
    pub fn start_iso(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_iso(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start_iso(), self.end_iso())
    }
}

/// The last full month and the month before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthComparison {
    pub current: DateRange,
    pub previous: DateRange,
}

/// The full calendar month that ends before the month containing `date`.
fn month_before(date: NaiveDate) -> DateRange {
    let first_of_month = date - Duration::days(i64::from(date.day0()));
    let end = first_of_month - Duration::days(1);
    let start = end - Duration::days(i64::from(end.day0()));
    DateRange { start, end }
}

/// The last full calendar month before `today`.
///
/// A run on 2025-01-15 yields 2024-12-01..2024-12-31.
pub fn last_full_month(today: NaiveDate) -> DateRange {
    month_before(today)
}

/// The last full month plus the month before it, for month-over-month
/// comparison.
pub fn month_over_month(today: NaiveDate) -> MonthComparison {
    let current = last_full_month(today);
    let previous = month_before(current.start);
    MonthComparison { current, previous }
}

/// The trailing window ending today, equivalent to GA4's
/// `{days}daysAgo`..`today` relative range.
pub fn trailing_days(today: NaiveDate, days: i64) -> DateRange {
    let start = today - Duration::days(days.max(0));
    DateRange { start, end: today }
}

pub fn yesterday(today: NaiveDate) -> DateRange {
    let day = today - Duration::days(1);
    DateRange {
        start: day,
        end: day,
    }
}

/// Today's local calendar date.
pub fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_new_rejects_inverted_range() {
        assert!(DateRange::new(date(2025, 3, 2), date(2025, 3, 1)).is_none());
        assert!(DateRange::new(date(2025, 3, 1), date(2025, 3, 1)).is_some());
    }

    #[test]
    fn test_last_full_month_mid_year() {
        let range = last_full_month(date(2025, 7, 18));
        assert_eq!(range.start(), date(2025, 6, 1));
        assert_eq!(range.end(), date(2025, 6, 30));
    }

    #[test]
    fn test_last_full_month_rolls_over_year() {
        let range = last_full_month(date(2025, 1, 1));
        assert_eq!(range.start(), date(2024, 12, 1));
        assert_eq!(range.end(), date(2024, 12, 31));
    }

    #[test]
    fn test_month_over_month_in_february() {
        let months = month_over_month(date(2025, 2, 10));
        assert_eq!(months.current, DateRange::new(date(2025, 1, 1), date(2025, 1, 31)).unwrap());
        assert_eq!(
            months.previous,
            DateRange::new(date(2024, 12, 1), date(2024, 12, 31)).unwrap()
        );
    }

    #[test]
    fn test_month_over_month_handles_leap_february() {
        let months = month_over_month(date(2024, 4, 30));
        assert_eq!(months.current.start(), date(2024, 3, 1));
        assert_eq!(months.previous.end(), date(2024, 2, 29));
    }

    #[test]
    fn test_trailing_days() {
        let range = trailing_days(date(2025, 3, 31), TRAILING_WINDOW_DAYS);
        assert_eq!(range.start(), date(2024, 12, 31));
        assert_eq!(range.end(), date(2025, 3, 31));
    }

    #[test]
    fn test_yesterday_crosses_year() {
        let range = yesterday(date(2026, 1, 1));
        assert_eq!(range.start(), date(2025, 12, 31));
        assert_eq!(range.start(), range.end());
    }

    #[test]
    fn test_every_resolver_keeps_start_before_end() {
        let mut day = date(2023, 12, 25);
        let stop = date(2025, 1, 10);

        while day <= stop {
            let months = month_over_month(day);
            for range in [
                last_full_month(day),
                months.current,
                months.previous,
                trailing_days(day, TRAILING_WINDOW_DAYS),
                yesterday(day),
            ] {
                assert!(range.start() <= range.end(), "inverted range {} for {}", range, day);
            }
            assert!(months.previous.end() < months.current.start());
            assert_eq!(months.current.start().day(), 1);
            day += Duration::days(1);
        }
    }

    #[test]
    fn test_iso_rendering() {
        let range = DateRange::new(date(2025, 9, 1), date(2025, 9, 30)).unwrap();
        assert_eq!(range.start_iso(), "2025-09-01");
        assert_eq!(range.end_iso(), "2025-09-30");
        assert_eq!(range.to_string(), "2025-09-01..2025-09-30");
    }
}
