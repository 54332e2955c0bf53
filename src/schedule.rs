//! Calendar arithmetic for recurring payment schedules.

use std::{fmt, str::FromStr};

use serde::Serialize;
use time::{Date, Duration, Month, OffsetDateTime, util::days_in_year_month};

use crate::Error;

/// The calendar unit a payment plan repeats in.
///
/// Days are the finest granularity the scheduler supports; its tick
/// interval may be much coarser than an hour without missing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleUnit {
    /// Calendar days (exact multiples of 86 400 seconds; the ledger is
    /// UTC-anchored, so there is no DST to account for).
    Day,
    /// Calendar weeks (seven days).
    Week,
    /// Calendar months of variable length.
    Month,
    /// Calendar years, leap years included.
    Year,
}

impl ScheduleUnit {
    /// The textual form stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleUnit::Day => "day",
            ScheduleUnit::Week => "week",
            ScheduleUnit::Month => "month",
            ScheduleUnit::Year => "year",
        }
    }
}

impl fmt::Display for ScheduleUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(ScheduleUnit::Day),
            "week" => Ok(ScheduleUnit::Week),
            "month" => Ok(ScheduleUnit::Month),
            "year" => Ok(ScheduleUnit::Year),
            other => Err(Error::InvalidScheduleUnit(other.to_owned())),
        }
    }
}

/// Advance `timestamp` by `interval` schedule units.
///
/// Day and week intervals are exact second arithmetic. Month and year
/// intervals move through the calendar and clamp the day of month to the
/// last valid day of the target month, so Jan 31 plus one month lands on
/// Feb 28, or Feb 29 in a leap year. The time of day is preserved.
///
/// # Errors
/// Returns [Error::TimestampOutOfRange] if `timestamp` or the advanced
/// result cannot be represented.
pub fn advance(timestamp: i64, interval: u32, unit: ScheduleUnit) -> Result<i64, Error> {
    let start = OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|_| Error::TimestampOutOfRange(timestamp))?;

    let advanced = match unit {
        ScheduleUnit::Day => start.checked_add(Duration::days(i64::from(interval))),
        ScheduleUnit::Week => start.checked_add(Duration::weeks(i64::from(interval))),
        ScheduleUnit::Month => add_months(start, i64::from(interval)),
        ScheduleUnit::Year => add_months(start, i64::from(interval) * 12),
    };

    advanced
        .map(|datetime| datetime.unix_timestamp())
        .ok_or(Error::TimestampOutOfRange(timestamp))
}

/// Move `start` forward by whole calendar months, clamping the day of
/// month into the target month.
fn add_months(start: OffsetDateTime, months: i64) -> Option<OffsetDateTime> {
    let zero_based = i64::from(start.year()) * 12 + i64::from(u8::from(start.month())) - 1 + months;

    let year = i32::try_from(zero_based.div_euclid(12)).ok()?;
    let month = Month::January.nth_next(zero_based.rem_euclid(12) as u8);
    let day = start.day().min(days_in_year_month(year, month));

    let date = Date::from_calendar_date(year, month, day).ok()?;

    Some(start.replace_date(date))
}

/// Preview the next `count` execution times of a schedule.
///
/// The sequence starts with `first` itself and applies [advance]
/// repeatedly. It is a pure function of its inputs; calling it again
/// restarts the sequence.
pub fn preview_schedule(
    first: i64,
    interval: u32,
    unit: ScheduleUnit,
    count: u64,
) -> SchedulePreview {
    SchedulePreview {
        state: PreviewState::Upcoming(first),
        interval,
        unit,
        remaining: count,
    }
}

#[derive(Debug, Clone)]
enum PreviewState {
    Upcoming(i64),
    Failed(i64),
    Done,
}

/// A lazy, finite sequence of upcoming execution times, created by
/// [preview_schedule].
///
/// Yields at most `count` timestamps; if the arithmetic runs out of
/// representable range the iterator yields one `Err` and fuses.
#[derive(Debug, Clone)]
pub struct SchedulePreview {
    state: PreviewState,
    interval: u32,
    unit: ScheduleUnit,
    remaining: u64,
}

impl Iterator for SchedulePreview {
    type Item = Result<i64, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        match self.state {
            PreviewState::Upcoming(current) => {
                self.state = if self.remaining > 0 {
                    match advance(current, self.interval, self.unit) {
                        Ok(next) => PreviewState::Upcoming(next),
                        Err(_) => PreviewState::Failed(current),
                    }
                } else {
                    PreviewState::Done
                };

                Some(Ok(current))
            }
            PreviewState::Failed(timestamp) => {
                self.state = PreviewState::Done;
                self.remaining = 0;

                Some(Err(Error::TimestampOutOfRange(timestamp)))
            }
            PreviewState::Done => None,
        }
    }
}

#[cfg(test)]
mod schedule_tests {
    use time::{Date, Month, OffsetDateTime, Time};

    use super::{ScheduleUnit, advance, preview_schedule};
    use crate::Error;

    fn timestamp(year: i32, month: Month, day: u8) -> i64 {
        OffsetDateTime::new_utc(
            Date::from_calendar_date(year, month, day).unwrap(),
            Time::MIDNIGHT,
        )
        .unix_timestamp()
    }

    #[test]
    fn day_intervals_are_exact_second_arithmetic() {
        let start = timestamp(2024, Month::March, 1);

        let got = advance(start, 3, ScheduleUnit::Day).unwrap();

        assert_eq!(got, start + 3 * 86_400);
    }

    #[test]
    fn week_intervals_are_seven_days() {
        let start = timestamp(2024, Month::March, 1);

        let got = advance(start, 2, ScheduleUnit::Week).unwrap();

        assert_eq!(got, start + 14 * 86_400);
    }

    #[test]
    fn month_end_clamps_into_a_leap_february() {
        let start = timestamp(2024, Month::January, 31);

        let got = advance(start, 1, ScheduleUnit::Month).unwrap();

        assert_eq!(got, timestamp(2024, Month::February, 29));
    }

    #[test]
    fn month_end_clamps_into_a_regular_february() {
        let start = timestamp(2023, Month::January, 31);

        let got = advance(start, 1, ScheduleUnit::Month).unwrap();

        assert_eq!(got, timestamp(2023, Month::February, 28));
    }

    #[test]
    fn month_intervals_cross_year_boundaries() {
        let start = timestamp(2023, Month::November, 15);

        let got = advance(start, 3, ScheduleUnit::Month).unwrap();

        assert_eq!(got, timestamp(2024, Month::February, 15));
    }

    #[test]
    fn leap_day_clamps_in_non_leap_target_years() {
        let start = timestamp(2024, Month::February, 29);

        let got = advance(start, 1, ScheduleUnit::Year).unwrap();

        assert_eq!(got, timestamp(2025, Month::February, 28));
    }

    #[test]
    fn time_of_day_is_preserved_across_month_shifts() {
        let start = timestamp(2024, Month::January, 31) + 9 * 3_600 + 30 * 60;

        let got = advance(start, 1, ScheduleUnit::Month).unwrap();

        assert_eq!(got, timestamp(2024, Month::February, 29) + 9 * 3_600 + 30 * 60);
    }

    #[test]
    fn preview_starts_with_the_first_payment_itself() {
        let start = timestamp(2024, Month::June, 1);

        let got: Vec<_> = preview_schedule(start, 7, ScheduleUnit::Day, 3)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(
            got,
            vec![start, start + 7 * 86_400, start + 14 * 86_400],
            "want the first payment followed by two seven day steps"
        );
    }

    #[test]
    fn preview_yields_exactly_count_items() {
        let start = timestamp(2024, Month::June, 1);

        assert_eq!(preview_schedule(start, 1, ScheduleUnit::Month, 12).count(), 12);
        assert_eq!(preview_schedule(start, 1, ScheduleUnit::Month, 0).count(), 0);
    }

    #[test]
    fn preview_is_restartable() {
        let start = timestamp(2024, Month::June, 1);

        let first: Vec<_> = preview_schedule(start, 2, ScheduleUnit::Week, 4).collect();
        let second: Vec<_> = preview_schedule(start, 2, ScheduleUnit::Week, 4).collect();

        assert_eq!(first, second);
    }

    #[test]
    fn unit_strings_round_trip() {
        for unit in [
            ScheduleUnit::Day,
            ScheduleUnit::Week,
            ScheduleUnit::Month,
            ScheduleUnit::Year,
        ] {
            assert_eq!(unit.as_str().parse::<ScheduleUnit>().unwrap(), unit);
        }
    }

    #[test]
    fn unknown_unit_string_is_rejected() {
        assert_eq!(
            "fortnight".parse::<ScheduleUnit>(),
            Err(Error::InvalidScheduleUnit("fortnight".to_owned()))
        );
    }
}
