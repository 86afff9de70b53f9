//! # Clock Source
//!
//! Injectable wall clock. Code numbering is scoped by calendar year, and
//! follow-up/staleness checks compare against "today", so every service
//! reads time through [`ClockSource`] instead of calling `Utc::now()`.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Abstraction over the current instant.
///
/// [`SystemClock`] is used in production; [`FixedClock`] pins time in tests
/// (e.g. issuing `CLI-2025-0001` regardless of when the suite runs).
pub trait ClockSource: Send + Sync {
    /// Returns the current instant in UTC.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current calendar year (UTC).
    fn year(&self) -> i32 {
        self.now().year()
    }

    /// Returns today's date (UTC).
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Clock source reading the real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock source frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        FixedClock(at)
    }

    /// Midnight UTC on the given date.
    pub fn on(date: NaiveDate) -> Self {
        FixedClock(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }
}

impl ClockSource for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_reports_year_and_day() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let clock = FixedClock::on(date);
        assert_eq!(clock.year(), 2025);
        assert_eq!(clock.today(), date);
    }

    #[test]
    fn test_system_clock_is_recent() {
        assert!(SystemClock.year() >= 2024);
    }
}
