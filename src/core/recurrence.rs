//! Next-occurrence calculation for recurring personal occasions.
//!
//! A February 29 occasion falls on **March 1** in non-leap years.

use crate::errors::{Error, Result};
use chrono::{Datelike, NaiveDate};

/// Validates a user-entered month/day pair; February 29 is accepted.
///
/// # Errors
/// Returns [`Error::Validation`] if the pair never exists on a calendar.
pub fn validate_month_day(month: u32, day: u32) -> Result<()> {
    // 2024 is a leap year, so every real month/day pair exists in it.
    NaiveDate::from_ymd_opt(2024, month, day)
        .map(|_| ())
        .ok_or_else(|| Error::Validation {
            message: format!("Invalid month/day: {month}/{day}"),
        })
}

/// Resolves a recurring month/day in a specific year.
pub fn occurrence_in_year(month: u32, day: u32, year: i32) -> Result<NaiveDate> {
    validate_month_day(month, day)?;
    NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| {
            // Only Feb 29 in a non-leap year can fail after validation.
            NaiveDate::from_ymd_opt(year, 3, 1)
        })
        .ok_or_else(|| Error::Validation {
            message: format!("Year {year} is out of range"),
        })
}

/// Returns the next date on or after `reference` that falls on `month`/`day`.
///
/// The reference date itself counts as an occurrence, so an occasion on the
/// reference day is due rather than passed.
pub fn next_occurrence(month: u32, day: u32, reference: NaiveDate) -> Result<NaiveDate> {
    let this_year = occurrence_in_year(month, day, reference.year())?;
    if this_year < reference {
        occurrence_in_year(month, day, reference.year() + 1)
    } else {
        Ok(this_year)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_upcoming_this_year() {
        assert_eq!(next_occurrence(5, 10, date(2025, 5, 1)).unwrap(), date(2025, 5, 10));
    }

    #[test]
    fn test_same_day_is_due() {
        assert_eq!(next_occurrence(5, 10, date(2025, 5, 10)).unwrap(), date(2025, 5, 10));
    }

    #[test]
    fn test_passed_rolls_to_next_year() {
        assert_eq!(next_occurrence(5, 10, date(2025, 5, 11)).unwrap(), date(2026, 5, 10));
        assert_eq!(next_occurrence(1, 1, date(2025, 12, 31)).unwrap(), date(2026, 1, 1));
    }

    #[test]
    fn test_feb_29_policy() {
        // Leap year keeps Feb 29
        assert_eq!(next_occurrence(2, 29, date(2024, 2, 1)).unwrap(), date(2024, 2, 29));
        // Non-leap year moves to Mar 1
        assert_eq!(next_occurrence(2, 29, date(2025, 2, 1)).unwrap(), date(2025, 3, 1));
        // Mar 1 itself is the due day
        assert_eq!(next_occurrence(2, 29, date(2025, 3, 1)).unwrap(), date(2025, 3, 1));
        // After it passes, next cycle (2026 is not leap either)
        assert_eq!(next_occurrence(2, 29, date(2025, 3, 2)).unwrap(), date(2026, 3, 1));
        // Rolling into a leap year lands on Feb 29 again
        assert_eq!(next_occurrence(2, 29, date(2027, 3, 2)).unwrap(), date(2028, 2, 29));
    }

    #[test]
    fn test_never_before_reference_and_equal_only_on_match() {
        let start = date(2023, 1, 1);
        for offset in 0..800 {
            let reference = start + chrono::Duration::days(offset);
            for (month, day) in [(1, 1), (2, 29), (5, 10), (12, 31), (7, 4)] {
                let next = next_occurrence(month, day, reference).unwrap();
                assert!(next >= reference);
                let resolved = occurrence_in_year(month, day, reference.year()).unwrap();
                assert_eq!(next == reference, resolved == reference);
            }
        }
    }

    #[test]
    fn test_invalid_month_day() {
        assert!(matches!(
            next_occurrence(4, 31, date(2025, 1, 1)),
            Err(Error::Validation { .. })
        ));
        assert!(matches!(
            next_occurrence(13, 1, date(2025, 1, 1)),
            Err(Error::Validation { .. })
        ));
        assert!(validate_month_day(2, 29).is_ok());
    }
}
