//! "Just because" date selection.
//!
//! A just-because card goes out on a system-chosen day once per recipient per
//! cycle. The day is drawn from a generator seeded by `(recipient_id, year)`,
//! so re-running a batch pass reproduces the same choice, and it is kept at
//! least [`MIN_SPACING_DAYS`] away from every other date on file for the
//! recipient.

use crate::{
    core::recipient::Relationship,
    errors::{Error, Result},
};
use chrono::{Duration, NaiveDate};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum distance, in days, between a just-because date and any other date
/// on file for the same recipient. A candidate exactly this far away is rejected.
pub const MIN_SPACING_DAYS: i64 = 14;

/// Samples drawn before the selector gives up on a crowded calendar.
pub const MAX_SELECTION_ATTEMPTS: u32 = 64;

/// Neutral card design tag derived from the recipient relationship.
///
/// The presentation layer maps this to colors and artwork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardVariation {
    /// Family
    Warm,
    /// Friend
    Playful,
    /// Romantic
    Heartfelt,
    /// Professional
    Classic,
}

impl CardVariation {
    /// Fixed mapping from relationship to variation.
    #[must_use]
    pub const fn for_relationship(relationship: Relationship) -> Self {
        match relationship {
            Relationship::Family => Self::Warm,
            Relationship::Friend => Self::Playful,
            Relationship::Romantic => Self::Heartfelt,
            Relationship::Professional => Self::Classic,
        }
    }

    /// Tag as stored on orders.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warm => "warm",
            Self::Playful => "playful",
            Self::Heartfelt => "heartfelt",
            Self::Classic => "classic",
        }
    }
}

impl fmt::Display for CardVariation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a just-because selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JustBecauseSelection {
    /// Chosen send date within the cycle year
    pub date: NaiveDate,
    /// Design tag for the card
    pub card_variation: CardVariation,
}

fn seed_for(recipient_id: i64, year: i32) -> u64 {
    // Stable across builds and platforms, unlike `std::hash`.
    #[allow(clippy::cast_sign_loss)]
    let id = recipient_id as u64;
    #[allow(clippy::cast_sign_loss)]
    let year = i64::from(year) as u64;
    id.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ year.wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
}

/// Whether `candidate` is at least [`MIN_SPACING_DAYS`] + 1 days from every date in `existing`.
fn is_spaced(candidate: NaiveDate, existing: &[NaiveDate]) -> bool {
    existing
        .iter()
        .all(|d| (candidate - *d).num_days().abs() > MIN_SPACING_DAYS)
}

/// Picks the just-because date for `recipient_id` in `year`.
///
/// `existing_dates` should hold every other occasion and holiday date on file
/// for the recipient, including neighbouring years so that late-December and
/// early-January dates are spaced correctly.
///
/// # Errors
/// Returns [`Error::SchedulingConflict`] if no spaced date is found within
/// [`MAX_SELECTION_ATTEMPTS`] samples.
pub fn select(
    recipient_id: i64,
    relationship: Relationship,
    year: i32,
    existing_dates: &[NaiveDate],
) -> Result<JustBecauseSelection> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(|| Error::Validation {
        message: format!("Year {year} is out of range"),
    })?;
    let days_in_year = if start.leap_year() { 366 } else { 365 };

    let mut rng = StdRng::seed_from_u64(seed_for(recipient_id, year));
    for _ in 0..MAX_SELECTION_ATTEMPTS {
        let candidate = start + Duration::days(rng.gen_range(0..days_in_year));
        if is_spaced(candidate, existing_dates) {
            return Ok(JustBecauseSelection {
                date: candidate,
                card_variation: CardVariation::for_relationship(relationship),
            });
        }
    }

    Err(Error::SchedulingConflict {
        recipient_id,
        year,
        attempts: MAX_SELECTION_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::Datelike;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_selection_is_reproducible() {
        let existing = vec![date(2025, 5, 10), date(2025, 12, 25)];
        let first = select(42, Relationship::Friend, 2025, &existing).unwrap();
        let second = select(42, Relationship::Friend, 2025, &existing).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.date.year(), 2025);
    }

    #[test]
    fn test_selection_varies_by_recipient_or_year() {
        let picks: std::collections::HashSet<NaiveDate> = (1..=20)
            .map(|id| select(id, Relationship::Family, 2025, &[]).unwrap().date)
            .collect();
        assert!(picks.len() > 1);

        let years: std::collections::HashSet<u32> = (2020..2030)
            .map(|y| select(7, Relationship::Family, y, &[]).unwrap().date.ordinal())
            .collect();
        assert!(years.len() > 1);
    }

    #[test]
    fn test_selection_respects_spacing() {
        // A date every 40 days leaves narrow gaps the selector must land in.
        let existing: Vec<NaiveDate> = (0..10)
            .map(|i| date(2025, 1, 1) + Duration::days(i * 40))
            .collect();
        for id in 1..50 {
            let pick = select(id, Relationship::Romantic, 2025, &existing).unwrap();
            for d in &existing {
                assert!((pick.date - *d).num_days().abs() > MIN_SPACING_DAYS);
            }
        }
    }

    #[test]
    fn test_dense_calendar_is_a_conflict() {
        // Something every 10 days leaves no valid candidate anywhere.
        let existing: Vec<NaiveDate> = (-3..40)
            .map(|i| date(2025, 1, 1) + Duration::days(i * 10))
            .collect();
        let result = select(1, Relationship::Family, 2025, &existing);
        assert!(matches!(
            result,
            Err(Error::SchedulingConflict {
                recipient_id: 1,
                year: 2025,
                attempts: MAX_SELECTION_ATTEMPTS,
            })
        ));
    }

    #[test]
    fn test_card_variation_follows_relationship() {
        assert_eq!(
            select(3, Relationship::Family, 2025, &[]).unwrap().card_variation,
            CardVariation::Warm
        );
        assert_eq!(
            CardVariation::for_relationship(Relationship::Professional),
            CardVariation::Classic
        );
        assert_eq!(CardVariation::Heartfelt.as_str(), "heartfelt");
    }
}
