//! Time source and calendar-day helpers.
//!
//! "Today" and the dedup day bucket are both derived from one configured UTC
//! offset so risk classification and alert dedup agree on the calendar day.

use std::sync::RwLock;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.write() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.write() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Calendar date of `at` in `offset`.
pub fn local_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// `[start, end)` of `date` in `offset`, expressed in UTC.
pub fn day_bounds(date: NaiveDate, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_midnight = date.and_time(NaiveTime::MIN);
    let utc_midnight = local_midnight - Duration::seconds(i64::from(offset.local_minus_utc()));
    let start = Utc.from_utc_datetime(&utc_midnight);
    (start, start + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_shift_with_offset() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();

        let (start, end) = day_bounds(date, FixedOffset::east_opt(0).unwrap());
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());

        let (start, _) = day_bounds(date, FixedOffset::east_opt(2 * 3600).unwrap());
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 9, 22, 0, 0).unwrap());

        let (start, _) = day_bounds(date, FixedOffset::west_opt(5 * 3600).unwrap());
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 10, 5, 0, 0).unwrap());
    }

    #[test]
    fn local_date_is_inside_its_bounds() {
        let offset = FixedOffset::east_opt(9 * 3600).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap();
        let date = local_date(at, offset);
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());

        let (start, end) = day_bounds(date, offset);
        assert!(start <= at && at < end);
    }

    #[test]
    fn fixed_clock_advances() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let clock = FixedClock::new(t0);
        clock.advance(Duration::hours(13));
        assert_eq!(clock.now(), t0 + Duration::hours(13));
        clock.set(t0);
        assert_eq!(clock.now(), t0);
    }
}
