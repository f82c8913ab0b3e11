//! Turns a forward-in-time series of wall-clock readings into timestamps.
//!
//! Timetable pages list only `HH:MM`; the calendar date has to be inferred.
//! A [`DaySequencer`] is seeded with the service date and advances by one day
//! whenever a reading would otherwise go backwards in time.

use chrono::{DateTime, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};
use chrono_tz::Europe::Bucharest;
use chrono_tz::Tz;

/// Timezone every CFR timetable is published in.
pub const RAILWAY_TZ: Tz = Bucharest;

/// Stateful date inference for one itinerary (or one station list).
///
/// Never share an instance across unrelated records: the midnight boundary is
/// only detectable relative to the previous reading of the same sequence.
#[derive(Debug, Clone)]
pub struct DaySequencer {
    previous: NaiveDateTime,
}

impl DaySequencer {
    /// Start just before local midnight of `date`, so a first reading of
    /// exactly `00:00` does not roll over.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            previous: date.and_time(NaiveTime::MIN) - TimeDelta::seconds(1),
        }
    }

    /// Next timestamp for `hour:minute`, or `None` for an impossible time.
    pub fn next(&mut self, hour: u32, minute: u32) -> Option<DateTime<FixedOffset>> {
        self.next_hms(hour, minute, 0)
    }

    pub fn next_hms(
        &mut self,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Option<DateTime<FixedOffset>> {
        let time = NaiveTime::from_hms_opt(hour, minute, second)?;
        let mut candidate = self.previous.date().and_time(time);
        if candidate < self.previous {
            candidate += TimeDelta::days(1);
        }
        self.previous = candidate;
        Some(localize(candidate))
    }
}

/// Attach the railway timezone to a wall-clock time.
///
/// Ambiguous times (autumn fall-back) take the earlier instant; times inside
/// the spring-forward gap are pushed past it.
pub fn localize(local: NaiveDateTime) -> DateTime<FixedOffset> {
    match RAILWAY_TZ.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.fixed_offset(),
        LocalResult::Ambiguous(earliest, _) => earliest.fixed_offset(),
        LocalResult::None => {
            // The gap is one hour in Europe/Bucharest.
            let shifted = local + TimeDelta::hours(1);
            match RAILWAY_TZ.from_local_datetime(&shifted) {
                LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.fixed_offset(),
                LocalResult::None => RAILWAY_TZ.from_utc_datetime(&local).fixed_offset(),
            }
        }
    }
}

/// Current calendar date in the railway timezone.
pub fn railway_date(now: DateTime<chrono::Utc>) -> NaiveDate {
    now.with_timezone(&RAILWAY_TZ).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rollover_detected_once() {
        let mut seq = DaySequencer::new(date(2024, 3, 10));
        let a = seq.next(23, 50).unwrap();
        let b = seq.next(0, 5).unwrap();
        let c = seq.next(0, 40).unwrap();

        assert!(a < b && b < c);
        assert_eq!(a.date_naive(), date(2024, 3, 10));
        assert_eq!(b.date_naive(), date(2024, 3, 11));
        assert_eq!(c.date_naive(), date(2024, 3, 11));
    }

    #[test]
    fn midnight_first_reading_stays_on_seed_date() {
        let mut seq = DaySequencer::new(date(2024, 3, 10));
        let first = seq.next(0, 0).unwrap();
        assert_eq!(first.date_naive(), date(2024, 3, 10));
        assert_eq!(first.hour(), 0);
    }

    #[test]
    fn equal_readings_do_not_roll_over() {
        let mut seq = DaySequencer::new(date(2024, 3, 10));
        let a = seq.next(12, 0).unwrap();
        let b = seq.next(12, 0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn multi_day_itinerary() {
        let mut seq = DaySequencer::new(date(2024, 12, 31));
        seq.next(22, 0).unwrap();
        let jan1 = seq.next(6, 0).unwrap();
        let jan2 = seq.next(5, 0).unwrap();
        assert_eq!(jan1.date_naive(), date(2025, 1, 1));
        assert_eq!(jan2.date_naive(), date(2025, 1, 2));
        assert_eq!(jan2.year(), 2025);
    }

    #[test]
    fn winter_and_summer_offsets() {
        let mut winter = DaySequencer::new(date(2024, 1, 15));
        assert_eq!(winter.next(10, 0).unwrap().offset().local_minus_utc(), 2 * 3600);

        let mut summer = DaySequencer::new(date(2024, 7, 15));
        assert_eq!(summer.next(10, 0).unwrap().offset().local_minus_utc(), 3 * 3600);
    }

    #[test]
    fn spring_forward_gap_is_skipped() {
        // 2024-03-31 03:00 local jumps to 04:00.
        let mut seq = DaySequencer::new(date(2024, 3, 31));
        let t = seq.next(3, 30).unwrap();
        assert_eq!(t.hour(), 4);
        assert_eq!(t.minute(), 30);
        assert_eq!(t.offset().local_minus_utc(), 3 * 3600);
    }

    #[test]
    fn invalid_time_is_rejected() {
        let mut seq = DaySequencer::new(date(2024, 3, 10));
        assert!(seq.next(24, 0).is_none());
        assert!(seq.next(12, 60).is_none());
    }

    #[test]
    fn serialized_timestamp_carries_offset() {
        let mut seq = DaySequencer::new(date(2024, 3, 10));
        let t = seq.next(7, 5).unwrap();
        assert_eq!(t.to_rfc3339(), "2024-03-10T07:05:00+02:00");
    }
}
