//! Clocks and the ledger calendar
//!
//! Limit windows and pool dates are calendar days in the ledger's configured
//! time zone, not rolling 24h windows. [`LedgerCalendar`] converts between
//! UTC instants and those local boundaries.

use super::traits::Clock;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use std::sync::{Mutex, PoisonError};

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
///
/// Used by the replay CLI (driven by the `at` column) and by tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Calendar boundaries in a fixed UTC offset
#[derive(Debug, Clone, Copy)]
pub struct LedgerCalendar {
    offset: FixedOffset,
}

impl LedgerCalendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// The local calendar date of an instant
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// The UTC instant at which the local day containing `now` began
    pub fn start_of_day(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.to_utc(self.today(now).and_time(chrono::NaiveTime::MIN))
    }

    /// The UTC instant at which the local month containing `now` began
    pub fn start_of_month(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = self.today(now);
        let first = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
        self.to_utc(first.and_time(chrono::NaiveTime::MIN))
    }

    /// Interpret a local wall-clock time in this offset
    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        (local - Duration::seconds(i64::from(self.offset.local_minus_utc()))).and_utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[rstest]
    #[case::utc(0, utc(2026, 3, 15, 10, 0), utc(2026, 3, 15, 0, 0))]
    #[case::east_same_day(120, utc(2026, 3, 15, 10, 0), utc(2026, 3, 14, 22, 0))]
    #[case::east_next_local_day(120, utc(2026, 3, 15, 23, 0), utc(2026, 3, 15, 22, 0))]
    #[case::west_previous_local_day(-300, utc(2026, 3, 15, 3, 0), utc(2026, 3, 14, 5, 0))]
    fn test_start_of_day(
        #[case] offset_minutes: i32,
        #[case] now: DateTime<Utc>,
        #[case] expected: DateTime<Utc>,
    ) {
        let calendar = LedgerCalendar::new(FixedOffset::east_opt(offset_minutes * 60).unwrap());
        assert_eq!(calendar.start_of_day(now), expected);
    }

    #[rstest]
    #[case::utc(0, utc(2026, 3, 15, 10, 0), utc(2026, 3, 1, 0, 0))]
    #[case::west_still_previous_month(-300, utc(2026, 4, 1, 2, 0), utc(2026, 3, 1, 5, 0))]
    #[case::east_already_next_month(60, utc(2026, 3, 31, 23, 30), utc(2026, 3, 31, 23, 0))]
    fn test_start_of_month(
        #[case] offset_minutes: i32,
        #[case] now: DateTime<Utc>,
        #[case] expected: DateTime<Utc>,
    ) {
        let calendar = LedgerCalendar::new(FixedOffset::east_opt(offset_minutes * 60).unwrap());
        assert_eq!(calendar.start_of_month(now), expected);
    }

    #[test]
    fn test_manual_clock_moves_only_when_told() {
        let clock = ManualClock::new(utc(2026, 1, 1, 0, 0));
        assert_eq!(clock.now(), utc(2026, 1, 1, 0, 0));

        clock.advance(Duration::hours(25));
        assert_eq!(clock.now(), utc(2026, 1, 2, 1, 0));

        clock.set(utc(2025, 12, 31, 12, 0));
        assert_eq!(clock.now(), utc(2025, 12, 31, 12, 0));
    }
}
