//! Occasion business logic - vocabulary, validation and CRUD.
//!
//! Occasion kinds form a closed vocabulary. Personal recurring occasions carry a
//! month/day, holidays never do, and a recipient has at most one just-because
//! occasion. All edits go through the recipient lock.

use crate::{
    core::{
        allocation::{self, Allocation},
        holiday::Holiday,
        recipient, recurrence,
    },
    entities::{Occasion, occasion},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{QueryOrder, Set, SqlErr, TransactionTrait, prelude::*, sea_query::Expr};
use std::{collections::BTreeMap, fmt, str::FromStr};
use tracing::{info, instrument, warn};

/// Every kind of occasion a card can be sent for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OccasionKind {
    /// Recurring, user-entered month/day
    Birthday,
    /// Recurring, user-entered month/day
    Anniversary,
    /// System-chosen date once per cycle
    JustBecause,
    /// Date derived from the holiday rule
    Holiday(Holiday),
}

impl OccasionKind {
    /// Value stored in `occasions.kind` and `orders.occasion_kind`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Birthday => "birthday",
            Self::Anniversary => "anniversary",
            Self::JustBecause => "just_because",
            Self::Holiday(holiday) => holiday.as_str(),
        }
    }

    /// Whether the kind needs a user-entered month/day.
    #[must_use]
    pub const fn is_personal_recurring(self) -> bool {
        matches!(self, Self::Birthday | Self::Anniversary)
    }
}

impl fmt::Display for OccasionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OccasionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "birthday" => Ok(Self::Birthday),
            "anniversary" => Ok(Self::Anniversary),
            "just_because" | "justbecause" => Ok(Self::JustBecause),
            _ => s.parse::<Holiday>().map(Self::Holiday).map_err(|_| Error::Configuration {
                message: format!("Unknown occasion kind: {s:?}"),
            }),
        }
    }
}

/// Notes keyed by occasion kind, validated against the vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccasionNotes(BTreeMap<OccasionKind, String>);

impl OccasionNotes {
    /// Builds notes from string keys, e.g. as submitted by an intake form.
    /// Blank notes are dropped.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] for a key outside the vocabulary.
    pub fn from_raw<I, K, V>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut notes = BTreeMap::new();
        for (key, value) in entries {
            let kind = key.as_ref().parse::<OccasionKind>().map_err(|_| Error::Validation {
                message: format!("Note for unknown occasion kind: {:?}", key.as_ref()),
            })?;
            let value = value.as_ref().trim();
            if !value.is_empty() {
                notes.insert(kind, value.to_string());
            }
        }
        Ok(Self(notes))
    }

    /// The note for `kind`, if any.
    #[must_use]
    pub fn get(&self, kind: OccasionKind) -> Option<&str> {
        self.0.get(&kind).map(String::as_str)
    }

    /// Iterates notes in vocabulary order.
    pub fn iter(&self) -> impl Iterator<Item = (OccasionKind, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// How an occasion's date is produced each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccasionSchedule {
    /// Fixed month/day chosen by the customer
    Recurring {
        /// Month (1-12)
        month: u32,
        /// Day of month
        day: u32,
    },
    /// Derived from a holiday rule
    Holiday(Holiday),
    /// Chosen by the just-because selector
    JustBecause,
}

impl OccasionSchedule {
    /// Date of a recurring or holiday occasion in `year`; `None` for just-because.
    pub fn fixed_date_in(self, year: i32) -> Result<Option<NaiveDate>> {
        match self {
            Self::Recurring { month, day } => {
                recurrence::occurrence_in_year(month, day, year).map(Some)
            }
            Self::Holiday(holiday) => holiday.date_in(year).map(Some),
            Self::JustBecause => Ok(None),
        }
    }
}

fn stored_month_day(model: &occasion::Model) -> Result<(u32, u32)> {
    match (model.month, model.day) {
        (Some(month), Some(day)) => Ok((
            u32::try_from(month).map_err(|_| invalid_stored(model))?,
            u32::try_from(day).map_err(|_| invalid_stored(model))?,
        )),
        _ => Err(invalid_stored(model)),
    }
}

fn invalid_stored(model: &occasion::Model) -> Error {
    Error::Configuration {
        message: format!(
            "Occasion {} ({}) has no valid month/day",
            model.id, model.kind
        ),
    }
}

/// Derives the schedule of a stored occasion.
///
/// # Errors
/// Returns [`Error::Configuration`] for an unknown kind or a personal occasion
/// stored without a month/day.
pub fn schedule_of(model: &occasion::Model) -> Result<OccasionSchedule> {
    match model.kind.parse::<OccasionKind>()? {
        OccasionKind::Birthday | OccasionKind::Anniversary => {
            let (month, day) = stored_month_day(model)?;
            Ok(OccasionSchedule::Recurring { month, day })
        }
        OccasionKind::JustBecause => Ok(OccasionSchedule::JustBecause),
        OccasionKind::Holiday(holiday) => Ok(OccasionSchedule::Holiday(holiday)),
    }
}

/// Fields for a new occasion.
#[derive(Debug, Clone)]
pub struct NewOccasion {
    /// Recipient the occasion belongs to
    pub recipient_id: i64,
    /// Occasion kind
    pub kind: OccasionKind,
    /// Month, personal recurring kinds only
    pub month: Option<u32>,
    /// Day, personal recurring kinds only
    pub day: Option<u32>,
    /// Card note
    pub note: Option<String>,
}

/// A newly added occasion together with the account's capacity after the add.
#[derive(Debug, Clone)]
pub struct OccasionAdded {
    /// The stored occasion
    pub occasion: occasion::Model,
    /// Allocation of the owning account, counting the new occasion
    pub allocation: Allocation,
}

/// A partial occasion edit. The kind cannot change.
#[derive(Debug, Clone, Default)]
pub struct OccasionUpdate {
    /// New month/day, personal recurring kinds only
    pub month_day: Option<(u32, u32)>,
    /// New note (`Some(None)` clears it)
    pub note: Option<Option<String>>,
}

fn validate_date_fields(
    kind: OccasionKind,
    month: Option<u32>,
    day: Option<u32>,
) -> Result<Option<(u32, u32)>> {
    match (kind.is_personal_recurring(), month, day) {
        (true, Some(month), Some(day)) => {
            recurrence::validate_month_day(month, day)?;
            Ok(Some((month, day)))
        }
        (true, _, _) => Err(Error::Validation {
            message: format!("{kind} requires a month and day"),
        }),
        (false, None, None) => Ok(None),
        (false, _, _) => Err(Error::Validation {
            message: format!("{kind} dates are computed and cannot be entered"),
        }),
    }
}

fn clean_note(note: Option<String>) -> Option<String> {
    note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

fn to_column(value: u32) -> i32 {
    // Month and day values are validated to at most 31.
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Finds an occasion that already covers `kind` (and, for personal kinds, the
/// same month/day) for the recipient.
async fn find_duplicate<C>(
    db: &C,
    recipient_id: i64,
    kind: OccasionKind,
    month_day: Option<(u32, u32)>,
) -> Result<Option<occasion::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Occasion::find()
        .filter(occasion::Column::RecipientId.eq(recipient_id))
        .filter(occasion::Column::Kind.eq(kind.as_str()));
    if let Some((month, day)) = month_day {
        query = query
            .filter(occasion::Column::Month.eq(to_column(month)))
            .filter(occasion::Column::Day.eq(to_column(day)));
    }
    query.one(db).await.map_err(Into::into)
}

/// Adds an occasion to an unlocked recipient.
///
/// This is the entry point for every new reason to send a card: the lock check,
/// the duplicate check, the insert and the capacity recount all run in one
/// transaction. The returned [`Allocation`] already includes the new occasion,
/// so the caller can tell the customer right away when they went over their
/// plan. Going over capacity does not block the add.
///
/// A second occasion of the same kind (and date) is a [`Error::Conflict`]
/// unless `allow_duplicate` is set. A second just-because occasion is always
/// a conflict.
#[instrument(skip(db, new), fields(recipient_id = new.recipient_id, kind = %new.kind))]
pub async fn add_occasion(
    db: &DatabaseConnection,
    new: NewOccasion,
    allow_duplicate: bool,
) -> Result<OccasionAdded> {
    let month_day = validate_date_fields(new.kind, new.month, new.day)?;
    let is_just_because = new.kind == OccasionKind::JustBecause;

    let txn = db.begin().await?;
    let owner = recipient::require_recipient(&txn, new.recipient_id).await?;
    recipient::ensure_unlocked(&txn, new.recipient_id).await?;

    if let Some(existing) = find_duplicate(&txn, new.recipient_id, new.kind, month_day).await? {
        if is_just_because || !allow_duplicate {
            return Err(Error::Conflict {
                recipient_id: new.recipient_id,
                existing_occasion_id: existing.id,
            });
        }
    }

    let now = chrono::Utc::now().naive_utc();
    let model = occasion::ActiveModel {
        recipient_id: Set(new.recipient_id),
        kind: Set(new.kind.as_str().to_string()),
        month: Set(month_day.map(|(m, _)| to_column(m))),
        day: Set(month_day.map(|(_, d)| to_column(d))),
        note: Set(clean_note(new.note)),
        is_just_because: Set(is_just_because),
        computed_send_date: Set(None),
        last_sent_year: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let created = match model.insert(&txn).await {
        Ok(created) => created,
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            let existing = find_duplicate(&txn, new.recipient_id, new.kind, None).await?;
            return Err(Error::Conflict {
                recipient_id: new.recipient_id,
                existing_occasion_id: existing.map_or(0, |o| o.id),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let allocation = allocation::allocation_for_account(&txn, owner.account_id).await?;
    txn.commit().await?;

    info!(occasion_id = created.id, "Occasion added");
    if allocation.is_over_limit {
        warn!(
            account_id = owner.account_id,
            shortfall = allocation.shortfall,
            "Account is over its card allocation"
        );
    }
    Ok(OccasionAdded {
        occasion: created,
        allocation,
    })
}

/// Edits an occasion of an unlocked recipient.
///
/// Only the month/day of a birthday or anniversary and the note can change;
/// the kind is fixed once the occasion exists. The edit is refused while the
/// recipient has orders in flight.
#[instrument(skip(db, update))]
pub async fn update_occasion(
    db: &DatabaseConnection,
    occasion_id: i64,
    update: OccasionUpdate,
) -> Result<occasion::Model> {
    let txn = db.begin().await?;
    let existing = require_occasion(&txn, occasion_id).await?;
    recipient::ensure_unlocked(&txn, existing.recipient_id).await?;

    let kind = existing.kind.parse::<OccasionKind>()?;
    let mut model: occasion::ActiveModel = existing.into();

    if let Some((month, day)) = update.month_day {
        validate_date_fields(kind, Some(month), Some(day))?;
        model.month = Set(Some(to_column(month)));
        model.day = Set(Some(to_column(day)));
    }
    if let Some(note) = update.note {
        model.note = Set(clean_note(note));
    }
    model.updated_at = Set(chrono::Utc::now().naive_utc());

    let updated = model.update(&txn).await?;
    txn.commit().await?;
    Ok(updated)
}

/// Removes an occasion from an unlocked recipient.
///
/// Orders already created from the occasion are kept; only future cycles stop.
#[instrument(skip(db))]
pub async fn remove_occasion(db: &DatabaseConnection, occasion_id: i64) -> Result<()> {
    let txn = db.begin().await?;
    let existing = require_occasion(&txn, occasion_id).await?;
    recipient::ensure_unlocked(&txn, existing.recipient_id).await?;
    existing.delete(&txn).await?;
    txn.commit().await?;
    info!("Occasion removed");
    Ok(())
}

/// Applies notes to the recipient's occasions of the matching kinds.
///
/// Returns the number of occasions whose note changed. Kinds the recipient has
/// no occasion for are ignored.
#[instrument(skip(db, notes))]
pub async fn set_occasion_notes(
    db: &DatabaseConnection,
    recipient_id: i64,
    notes: &OccasionNotes,
) -> Result<u64> {
    let txn = db.begin().await?;
    recipient::require_recipient(&txn, recipient_id).await?;
    recipient::ensure_unlocked(&txn, recipient_id).await?;

    let now = chrono::Utc::now().naive_utc();
    let mut changed = 0;
    for (kind, note) in notes.iter() {
        let result = Occasion::update_many()
            .col_expr(occasion::Column::Note, Expr::value(note))
            .col_expr(occasion::Column::UpdatedAt, Expr::value(now))
            .filter(occasion::Column::RecipientId.eq(recipient_id))
            .filter(occasion::Column::Kind.eq(kind.as_str()))
            .exec(&txn)
            .await?;
        changed += result.rows_affected;
    }

    txn.commit().await?;
    Ok(changed)
}

/// Finds an occasion by id.
pub async fn get_occasion<C>(db: &C, occasion_id: i64) -> Result<Option<occasion::Model>>
where
    C: ConnectionTrait,
{
    Occasion::find_by_id(occasion_id)
        .one(db)
        .await
        .map_err(Into::into)
}

async fn require_occasion<C>(db: &C, occasion_id: i64) -> Result<occasion::Model>
where
    C: ConnectionTrait,
{
    get_occasion(db, occasion_id).await?.ok_or(Error::NotFound {
        entity: "Occasion",
        id: occasion_id,
    })
}

/// Lists a recipient's occasions in creation order.
///
/// This function is used both by the operator surface and by the batch pass,
/// which needs a recipient's other occasions to space the just-because card.
pub async fn list_occasions_for_recipient<C>(
    db: &C,
    recipient_id: i64,
) -> Result<Vec<occasion::Model>>
where
    C: ConnectionTrait,
{
    Occasion::find()
        .filter(occasion::Column::RecipientId.eq(recipient_id))
        .order_by_asc(occasion::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]
    use super::*;
    use crate::core::order::mark_printed;
    use crate::test_utils::*;
    use chrono::Utc;

    #[test]
    fn test_kind_vocabulary() {
        assert_eq!("birthday".parse::<OccasionKind>().unwrap(), OccasionKind::Birthday);
        assert_eq!(
            "Just Because".parse::<OccasionKind>().unwrap(),
            OccasionKind::JustBecause
        );
        assert_eq!(
            "Mother's Day".parse::<OccasionKind>().unwrap(),
            OccasionKind::Holiday(Holiday::MothersDay)
        );
        assert_eq!(OccasionKind::Holiday(Holiday::Christmas).as_str(), "christmas");
        assert!(matches!(
            "graduation".parse::<OccasionKind>(),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_notes_validated_against_vocabulary() {
        let notes = OccasionNotes::from_raw([
            ("birthday", "Happy birthday!"),
            ("christmas", "  "),
            ("Valentine's Day", "xo"),
        ])
        .unwrap();
        assert_eq!(notes.get(OccasionKind::Birthday), Some("Happy birthday!"));
        assert_eq!(notes.get(OccasionKind::Holiday(Holiday::Christmas)), None);
        assert_eq!(notes.iter().count(), 2);

        let unknown = OccasionNotes::from_raw([("birthdya", "typo")]);
        assert!(matches!(unknown, Err(Error::Validation { .. })));
    }

    #[tokio::test]
    async fn test_holiday_rejects_user_date() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, recipient) = setup_with_recipient(&db, "Mom").await?;

        let result = add_occasion(
            &db,
            NewOccasion {
                recipient_id: recipient.id,
                kind: OccasionKind::Holiday(Holiday::Christmas),
                month: Some(12),
                day: Some(25),
                note: None,
            },
            false,
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let missing_date = add_occasion(
            &db,
            NewOccasion {
                recipient_id: recipient.id,
                kind: OccasionKind::Birthday,
                month: Some(5),
                day: None,
                note: None,
            },
            false,
        )
        .await;
        assert!(matches!(missing_date, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_requires_confirmation() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, recipient) = setup_with_recipient(&db, "Mom").await?;

        let first = create_test_occasion(
            &db,
            recipient.id,
            OccasionKind::Holiday(Holiday::MothersDay),
        )
        .await?;
        let again = add_occasion(
            &db,
            NewOccasion {
                recipient_id: recipient.id,
                kind: OccasionKind::Holiday(Holiday::MothersDay),
                month: None,
                day: None,
                note: None,
            },
            false,
        )
        .await;
        match again {
            Err(Error::Conflict {
                existing_occasion_id,
                ..
            }) => assert_eq!(existing_occasion_id, first.id),
            other => panic!("expected conflict, got {other:?}"),
        }

        let confirmed = add_occasion(
            &db,
            NewOccasion {
                recipient_id: recipient.id,
                kind: OccasionKind::Holiday(Holiday::MothersDay),
                month: None,
                day: None,
                note: Some("second card".to_string()),
            },
            true,
        )
        .await?;
        assert_ne!(confirmed.occasion.id, first.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_add_reports_allocation_crossing_limit() -> Result<()> {
        let db = setup_test_db().await?;
        let account = create_custom_account(&db, "active", Some("basic"), 0).await?;
        let recipient = create_test_recipient(&db, account.id, "Mom").await?;
        for month in 1..=4 {
            create_test_birthday(&db, recipient.id, month, 1).await?;
        }

        let at_limit = add_occasion(
            &db,
            NewOccasion {
                recipient_id: recipient.id,
                kind: OccasionKind::Anniversary,
                month: Some(6),
                day: Some(20),
                note: None,
            },
            false,
        )
        .await?;
        assert_eq!(at_limit.allocation.scheduled_count, 5);
        assert!(!at_limit.allocation.is_over_limit);

        let over = add_occasion(
            &db,
            NewOccasion {
                recipient_id: recipient.id,
                kind: OccasionKind::Holiday(Holiday::Christmas),
                month: None,
                day: None,
                note: None,
            },
            false,
        )
        .await?;
        assert_eq!(over.allocation.scheduled_count, 6);
        assert!(over.allocation.is_over_limit);
        assert_eq!(over.allocation.shortfall, 1);
        assert_eq!(
            get_occasion(&db, over.occasion.id).await?.map(|o| o.kind),
            Some("christmas".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_one_just_because_per_recipient() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, recipient) = setup_with_recipient(&db, "Sam").await?;

        let first = create_test_occasion(&db, recipient.id, OccasionKind::JustBecause).await?;
        assert!(first.is_just_because);

        let second = add_occasion(
            &db,
            NewOccasion {
                recipient_id: recipient.id,
                kind: OccasionKind::JustBecause,
                month: None,
                day: None,
                note: None,
            },
            true,
        )
        .await;
        assert!(matches!(second, Err(Error::Conflict { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_locked_recipient_occasion_set_is_frozen() -> Result<()> {
        let db = setup_test_db().await?;
        let (recipient, order) = setup_with_pending_order(&db).await?;
        mark_printed(&db, &[order.id], Utc::now()).await?;

        let add = create_test_occasion(
            &db,
            recipient.id,
            OccasionKind::Holiday(Holiday::Halloween),
        )
        .await;
        assert!(matches!(add, Err(Error::LockedResource { .. })));

        let update = update_occasion(
            &db,
            order.occasion_id,
            OccasionUpdate {
                note: Some(Some("new note".to_string())),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(update, Err(Error::LockedResource { .. })));

        let remove = remove_occasion(&db, order.occasion_id).await;
        assert!(matches!(remove, Err(Error::LockedResource { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_and_remove_occasion() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, recipient) = setup_with_recipient(&db, "Mom").await?;
        let birthday = create_test_birthday(&db, recipient.id, 5, 10).await?;

        let updated = update_occasion(
            &db,
            birthday.id,
            OccasionUpdate {
                month_day: Some((2, 29)),
                note: Some(Some("leap day!".to_string())),
            },
        )
        .await?;
        assert_eq!((updated.month, updated.day), (Some(2), Some(29)));
        assert_eq!(updated.note.as_deref(), Some("leap day!"));

        let invalid = update_occasion(
            &db,
            birthday.id,
            OccasionUpdate {
                month_day: Some((2, 30)),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(invalid, Err(Error::Validation { .. })));

        remove_occasion(&db, birthday.id).await?;
        assert!(get_occasion(&db, birthday.id).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_set_occasion_notes() -> Result<()> {
        let db = setup_test_db().await?;
        let (_, recipient) = setup_with_recipient(&db, "Mom").await?;
        create_test_birthday(&db, recipient.id, 5, 10).await?;
        create_test_occasion(&db, recipient.id, OccasionKind::Holiday(Holiday::MothersDay))
            .await?;

        let notes =
            OccasionNotes::from_raw([("birthday", "Love you"), ("christmas", "Merry")]).unwrap();
        let changed = set_occasion_notes(&db, recipient.id, &notes).await?;
        assert_eq!(changed, 1);

        let occasions = list_occasions_for_recipient(&db, recipient.id).await?;
        assert_eq!(occasions[0].note.as_deref(), Some("Love you"));
        assert_eq!(occasions[1].note, None);
        Ok(())
    }

    #[test]
    fn test_schedule_of_personal_without_date_is_configuration_error() {
        let now = Utc::now().naive_utc();
        let model = occasion::Model {
            id: 7,
            recipient_id: 1,
            kind: "birthday".to_string(),
            month: None,
            day: None,
            note: None,
            is_just_because: false,
            computed_send_date: None,
            last_sent_year: None,
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(schedule_of(&model), Err(Error::Configuration { .. })));

        let holiday = occasion::Model {
            kind: "thanksgiving".to_string(),
            ..model
        };
        assert_eq!(
            schedule_of(&holiday).unwrap(),
            OccasionSchedule::Holiday(Holiday::Thanksgiving)
        );
    }
}
