//! Holiday date resolution.
//!
//! Every holiday is described declaratively by a [`HolidayRule`]; resolving a
//! holiday for a year is a pure function of the rule and the year. New
//! rule-based holidays only need a new [`Holiday`] variant and its rule.

use crate::errors::{Error, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The fixed holiday vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Holiday {
    /// January 1
    NewYearsDay,
    /// February 14
    ValentinesDay,
    /// Western (Gregorian) Easter Sunday
    Easter,
    /// Second Sunday of May
    MothersDay,
    /// Third Sunday of June
    FathersDay,
    /// July 4
    IndependenceDay,
    /// October 31
    Halloween,
    /// Fourth Thursday of November
    Thanksgiving,
    /// December 25
    Christmas,
}

/// How a holiday's date is derived for a given year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolidayRule {
    /// Same month and day every year.
    Fixed {
        /// Month (1-12)
        month: u32,
        /// Day of month
        day: u32,
    },
    /// The `nth` (1-based) `weekday` of `month`.
    NthWeekday {
        /// Month (1-12)
        month: u32,
        /// Weekday to count
        weekday: Weekday,
        /// Which occurrence, starting at 1
        nth: u8,
    },
    /// The last `weekday` of `month`.
    LastWeekday {
        /// Month (1-12)
        month: u32,
        /// Weekday to find
        weekday: Weekday,
    },
    /// Easter Sunday, computed with the anonymous Gregorian algorithm.
    Easter,
}

impl Holiday {
    /// Every holiday, in calendar order.
    pub const ALL: [Self; 9] = [
        Self::NewYearsDay,
        Self::ValentinesDay,
        Self::Easter,
        Self::MothersDay,
        Self::FathersDay,
        Self::IndependenceDay,
        Self::Halloween,
        Self::Thanksgiving,
        Self::Christmas,
    ];

    /// The declarative rule for this holiday.
    #[must_use]
    pub const fn rule(self) -> HolidayRule {
        match self {
            Self::NewYearsDay => HolidayRule::Fixed { month: 1, day: 1 },
            Self::ValentinesDay => HolidayRule::Fixed { month: 2, day: 14 },
            Self::Easter => HolidayRule::Easter,
            Self::MothersDay => HolidayRule::NthWeekday {
                month: 5,
                weekday: Weekday::Sun,
                nth: 2,
            },
            Self::FathersDay => HolidayRule::NthWeekday {
                month: 6,
                weekday: Weekday::Sun,
                nth: 3,
            },
            Self::IndependenceDay => HolidayRule::Fixed { month: 7, day: 4 },
            Self::Halloween => HolidayRule::Fixed { month: 10, day: 31 },
            Self::Thanksgiving => HolidayRule::NthWeekday {
                month: 11,
                weekday: Weekday::Thu,
                nth: 4,
            },
            Self::Christmas => HolidayRule::Fixed { month: 12, day: 25 },
        }
    }

    /// Canonical identifier as stored in the database.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewYearsDay => "new_years_day",
            Self::ValentinesDay => "valentines_day",
            Self::Easter => "easter",
            Self::MothersDay => "mothers_day",
            Self::FathersDay => "fathers_day",
            Self::IndependenceDay => "independence_day",
            Self::Halloween => "halloween",
            Self::Thanksgiving => "thanksgiving",
            Self::Christmas => "christmas",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::NewYearsDay => "New Year's Day",
            Self::ValentinesDay => "Valentine's Day",
            Self::Easter => "Easter",
            Self::MothersDay => "Mother's Day",
            Self::FathersDay => "Father's Day",
            Self::IndependenceDay => "Independence Day",
            Self::Halloween => "Halloween",
            Self::Thanksgiving => "Thanksgiving",
            Self::Christmas => "Christmas",
        }
    }

    /// Resolves this holiday's date in `year`.
    pub fn date_in(self, year: i32) -> Result<NaiveDate> {
        match self.rule() {
            HolidayRule::Fixed { month, day } => ymd(year, month, day),
            HolidayRule::NthWeekday {
                month,
                weekday,
                nth,
            } => nth_weekday_of_month(year, month, weekday, nth),
            HolidayRule::LastWeekday { month, weekday } => {
                last_weekday_of_month(year, month, weekday)
            }
            HolidayRule::Easter => easter_sunday(year),
        }
    }
}

impl fmt::Display for Holiday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Holiday {
    type Err = Error;

    /// Accepts the canonical id (`"mothers_day"`) or the display name
    /// (`"Mother's Day"`), ignoring case.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalize(s);
        Self::ALL
            .into_iter()
            .find(|h| normalize(h.as_str()) == wanted || normalize(h.display_name()) == wanted)
            .ok_or_else(|| Error::Configuration {
                message: format!("Unknown holiday identifier: {s:?}"),
            })
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Resolves a holiday identifier to its calendar date in `year`.
///
/// # Errors
/// Returns [`Error::Configuration`] for an unknown identifier.
pub fn resolve(holiday_id: &str, year: i32) -> Result<NaiveDate> {
    holiday_id.parse::<Holiday>()?.date_in(year)
}

fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| Error::Configuration {
        message: format!("Invalid holiday date {year}-{month:02}-{day:02}"),
    })
}

/// Returns the `nth` (1-based) occurrence of `weekday` in the given month.
///
/// # Errors
/// Returns [`Error::Configuration`] if the month has fewer than `nth` such weekdays
/// or the month itself is invalid.
pub fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, nth: u8) -> Result<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, nth).ok_or_else(|| {
        Error::Configuration {
            message: format!("No occurrence {nth} of {weekday} in {year}-{month:02}"),
        }
    })
}

/// Returns the last occurrence of `weekday` in the given month.
pub fn last_weekday_of_month(year: i32, month: u32, weekday: Weekday) -> Result<NaiveDate> {
    let first_of_next = if month == 12 {
        ymd(year + 1, 1, 1)?
    } else {
        ymd(year, month + 1, 1)?
    };
    let last_day = first_of_next - Duration::days(1);
    let back = (7 + last_day.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    Ok(last_day - Duration::days(i64::from(back)))
}

/// Western Easter Sunday using the anonymous Gregorian computus
/// (Meeus/Jones/Butcher).
pub fn easter_sunday(year: i32) -> Result<NaiveDate> {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15).rem_euclid(30);
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k).rem_euclid(7);
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;

    let month = u32::try_from(month).map_err(|_| Error::Configuration {
        message: format!("Easter computation out of range for {year}"),
    })?;
    let day = u32::try_from(day).map_err(|_| Error::Configuration {
        message: format!("Easter computation out of range for {year}"),
    })?;
    ymd(year, month, day)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_christmas_is_always_december_25() {
        for year in 1990..2060 {
            assert_eq!(resolve("Christmas", year).unwrap(), date(year, 12, 25));
        }
    }

    #[test]
    fn test_fixed_holidays() {
        assert_eq!(resolve("new_years_day", 2025).unwrap(), date(2025, 1, 1));
        assert_eq!(resolve("Valentine's Day", 2025).unwrap(), date(2025, 2, 14));
        assert_eq!(resolve("independence_day", 2025).unwrap(), date(2025, 7, 4));
        assert_eq!(resolve("HALLOWEEN", 2025).unwrap(), date(2025, 10, 31));
    }

    #[test]
    fn test_mothers_day_is_second_sunday_of_may() {
        for year in 1990..2060 {
            let d = resolve("Mother's Day", year).unwrap();
            assert_eq!(d.month(), 5);
            assert_eq!(d.weekday(), Weekday::Sun);
            // Second Sunday falls on day 8..=14
            assert!((8..=14).contains(&d.day()), "{d}");
        }
        assert_eq!(resolve("mothers_day", 2024).unwrap(), date(2024, 5, 12));
        assert_eq!(resolve("mothers_day", 2025).unwrap(), date(2025, 5, 11));
    }

    #[test]
    fn test_fathers_day_and_thanksgiving() {
        assert_eq!(resolve("fathers_day", 2024).unwrap(), date(2024, 6, 16));
        assert_eq!(resolve("fathers_day", 2025).unwrap(), date(2025, 6, 15));
        assert_eq!(resolve("thanksgiving", 2024).unwrap(), date(2024, 11, 28));
        assert_eq!(resolve("Thanksgiving", 2025).unwrap(), date(2025, 11, 27));
    }

    #[test]
    fn test_easter_known_dates() {
        assert_eq!(easter_sunday(2000).unwrap(), date(2000, 4, 23));
        assert_eq!(easter_sunday(2019).unwrap(), date(2019, 4, 21));
        assert_eq!(easter_sunday(2024).unwrap(), date(2024, 3, 31));
        assert_eq!(easter_sunday(2025).unwrap(), date(2025, 4, 20));
        assert_eq!(easter_sunday(2038).unwrap(), date(2038, 4, 25));
        for year in 1900..2100 {
            assert_eq!(easter_sunday(year).unwrap().weekday(), Weekday::Sun);
        }
    }

    #[test]
    fn test_last_weekday_of_month() {
        // Memorial Day style rule: last Monday of May
        assert_eq!(
            last_weekday_of_month(2024, 5, Weekday::Mon).unwrap(),
            date(2024, 5, 27)
        );
        assert_eq!(
            last_weekday_of_month(2025, 12, Weekday::Wed).unwrap(),
            date(2025, 12, 31)
        );
    }

    #[test]
    fn test_fifth_weekday_may_not_exist() {
        // February 2025 has only four Mondays
        assert!(matches!(
            nth_weekday_of_month(2025, 2, Weekday::Mon, 5),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_unknown_holiday_is_configuration_error() {
        assert!(matches!(
            resolve("Festivus", 2025),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_canonical_ids_round_trip() {
        for holiday in Holiday::ALL {
            assert_eq!(holiday.as_str().parse::<Holiday>().unwrap(), holiday);
        }
    }
}
