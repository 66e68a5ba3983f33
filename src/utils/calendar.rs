//! Date and time arithmetic shared by the leave, permission and time-entry
//! handlers. Date ranges are inclusive on both ends, time ranges are
//! half-open (`[start, end)`).

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike, Weekday};

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Intersection of two ranges, if they share at least one day.
    pub fn intersect(&self, other: &DateRange) -> Option<DateRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(DateRange { start, end })
    }
}

/// Half-open interval inside one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn minutes(&self) -> Option<i64> {
        minutes_between(self.start, self.end)
    }

    pub fn is_whole_minutes(&self) -> bool {
        is_whole_minute(self.start) && is_whole_minute(self.end)
    }
}

/// Minute counts floor, so capped durations only accept times on a minute
/// boundary.
pub fn is_whole_minute(t: NaiveTime) -> bool {
    t.second() == 0 && t.nanosecond() == 0
}

pub fn truncate_to_minute(t: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(t.hour(), t.minute(), 0).unwrap_or(t)
}

/// Last representable second of a day.
pub fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

pub fn is_weekend(day: NaiveDate) -> bool {
    matches!(day.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Number of Monday..=Friday days in `[start, end]`. Zero when the range is
/// reversed.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> u32 {
    if start > end {
        return 0;
    }

    let total_days = (end - start).num_days() + 1;
    let full_weeks = total_days / 7;
    let mut count = full_weeks * 5;

    // walk the remainder (< 7 days) that trails the full weeks
    let mut day = start + Duration::days(full_weeks * 7);
    while day <= end {
        if !is_weekend(day) {
            count += 1;
        }
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    count as u32
}

/// Business days of `range` that fall inside calendar `year`.
pub fn business_days_in_year(range: DateRange, year: i32) -> u32 {
    let (Some(first), Some(last)) = (
        NaiveDate::from_ymd_opt(year, 1, 1),
        NaiveDate::from_ymd_opt(year, 12, 31),
    ) else {
        return 0;
    };

    range
        .intersect(&DateRange::new(first, last))
        .map(|r| business_days(r.start, r.end))
        .unwrap_or(0)
}

/// Calendar years touched by `range`, ascending.
pub fn years_spanned(range: DateRange) -> std::ops::RangeInclusive<i32> {
    range.start.year()..=range.end.year()
}

pub fn date_ranges_overlap(a: DateRange, b: DateRange) -> bool {
    a.start <= b.end && b.start <= a.end
}

/// Touching intervals (`a.end == b.start`) do not overlap.
pub fn time_ranges_overlap(a: TimeRange, b: TimeRange) -> bool {
    a.start < b.end && b.start < a.end
}

/// Whole minutes from `start` to `end`, `None` unless `end` is later.
pub fn minutes_between(start: NaiveTime, end: NaiveTime) -> Option<i64> {
    (end > start).then(|| (end - start).num_minutes())
}

/// Time worked between clock-in and clock-out minus approved permission
/// time, never negative. An inverted clock pair counts as zero.
pub fn worked_minutes(clock_in: NaiveTime, clock_out: NaiveTime, permission_minutes: i64) -> i64 {
    let span = minutes_between(clock_in, clock_out).unwrap_or(0);
    (span - permission_minutes.max(0)).max(0)
}

/// True if adding `requested` minutes to `existing` keeps the day within `cap`.
pub fn fits_daily_cap(existing: i64, requested: i64, cap: i64) -> bool {
    existing + requested <= cap
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).expect("date")
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("time")
    }

    fn brute_force_business_days(start: NaiveDate, end: NaiveDate) -> u32 {
        let mut count = 0;
        let mut day = start;
        while day <= end {
            if !is_weekend(day) {
                count += 1;
            }
            day = day.succ_opt().expect("next day");
        }
        count
    }

    #[test]
    fn counts_weekdays_in_a_single_week() {
        // 2026-10-19 is a Monday
        assert_eq!(business_days(d(2026, 10, 19), d(2026, 10, 23)), 5);
        assert_eq!(business_days(d(2026, 10, 19), d(2026, 10, 25)), 5);
        assert_eq!(business_days(d(2026, 10, 24), d(2026, 10, 25)), 0);
        assert_eq!(business_days(d(2026, 10, 21), d(2026, 10, 21)), 1);
    }

    #[test]
    fn reversed_range_has_no_business_days() {
        assert_eq!(business_days(d(2026, 10, 23), d(2026, 10, 19)), 0);
    }

    #[test]
    fn closed_form_matches_day_by_day_count() {
        let base = d(2026, 1, 1);
        for offset in 0..14 {
            let start = base + Duration::days(offset);
            for len in 0..40 {
                let end = start + Duration::days(len);
                assert_eq!(
                    business_days(start, end),
                    brute_force_business_days(start, end),
                    "{start}..={end}"
                );
            }
        }
    }

    #[test]
    fn splits_business_days_across_years() {
        // Mon 2026-12-28 .. Fri 2027-01-08
        let range = DateRange::new(d(2026, 12, 28), d(2027, 1, 8));
        assert_eq!(business_days_in_year(range, 2026), 4);
        assert_eq!(business_days_in_year(range, 2027), 6);
        assert_eq!(business_days_in_year(range, 2028), 0);
        assert_eq!(years_spanned(range).collect::<Vec<_>>(), vec![2026, 2027]);
    }

    #[test]
    fn inclusive_date_ranges_sharing_an_edge_overlap() {
        let a = DateRange::new(d(2026, 3, 2), d(2026, 3, 6));
        let b = DateRange::new(d(2026, 3, 6), d(2026, 3, 10));
        let c = DateRange::new(d(2026, 3, 7), d(2026, 3, 10));

        assert!(date_ranges_overlap(a, b));
        assert!(date_ranges_overlap(b, a));
        assert!(!date_ranges_overlap(a, c));
        assert_eq!(a.intersect(&b), Some(DateRange::single(d(2026, 3, 6))));
        assert_eq!(a.intersect(&c), None);
    }

    #[test]
    fn touching_time_ranges_do_not_overlap() {
        let morning = TimeRange::new(t(9, 0), t(10, 0));
        let after = TimeRange::new(t(10, 0), t(11, 0));
        let inside = TimeRange::new(t(9, 30), t(9, 45));

        assert!(!time_ranges_overlap(morning, after));
        assert!(time_ranges_overlap(morning, inside));
        assert!(time_ranges_overlap(inside, morning));
    }

    #[test]
    fn minutes_between_requires_forward_interval() {
        assert_eq!(minutes_between(t(8, 0), t(9, 30)), Some(90));
        assert_eq!(minutes_between(t(9, 30), t(9, 30)), None);
        assert_eq!(minutes_between(t(10, 0), t(9, 0)), None);
    }

    #[test]
    fn worked_minutes_subtracts_permission_and_floors_at_zero() {
        assert_eq!(worked_minutes(t(8, 0), t(17, 0), 0), 540);
        assert_eq!(worked_minutes(t(8, 0), t(17, 0), 90), 450);
        assert_eq!(worked_minutes(t(8, 0), t(9, 0), 120), 0);
        assert_eq!(worked_minutes(t(17, 0), t(8, 0), 0), 0);
    }

    #[test]
    fn seconds_break_the_whole_minute_rule() {
        let with_seconds = NaiveTime::from_hms_opt(11, 0, 59).expect("time");
        let with_millis = NaiveTime::from_hms_milli_opt(11, 0, 0, 500).expect("time");

        assert!(is_whole_minute(t(11, 0)));
        assert!(!is_whole_minute(with_seconds));
        assert!(!is_whole_minute(with_millis));
        assert!(TimeRange::new(t(9, 0), t(11, 0)).is_whole_minutes());
        assert!(!TimeRange::new(t(9, 0), with_seconds).is_whole_minutes());
        assert_eq!(truncate_to_minute(with_seconds), t(11, 0));
    }

    #[test]
    fn daily_cap_is_inclusive() {
        assert!(fits_daily_cap(60, 60, 120));
        assert!(!fits_daily_cap(60, 61, 120));
        assert!(fits_daily_cap(0, 120, 120));
    }
}
