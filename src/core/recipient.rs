//! Recipient business logic - creation, edits, deletion and locking.
//!
//! A recipient is locked while any of its orders is pending or printed. Every
//! mutation checks the lock and writes inside one database transaction so an
//! order created by a concurrent batch pass cannot slip in between the check
//! and the write.

use crate::{
    core::{
        address::{AddressVerifier, MailingAddress, check_address},
        order::OrderStatus,
    },
    entities::{Occasion, Order, Recipient, occasion, order, recipient},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::{info, instrument};

/// How the customer knows the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// Parents, siblings, relatives
    Family,
    /// Friends
    Friend,
    /// Partner or spouse
    Romantic,
    /// Colleagues and clients
    Professional,
}

impl Relationship {
    /// Value stored in `recipients.relationship`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Family => "family",
            Self::Friend => "friend",
            Self::Romantic => "romantic",
            Self::Professional => "professional",
        }
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relationship {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "family" => Ok(Self::Family),
            "friend" => Ok(Self::Friend),
            "romantic" => Ok(Self::Romantic),
            "professional" => Ok(Self::Professional),
            other => Err(Error::Configuration {
                message: format!("Unknown relationship: {other:?}"),
            }),
        }
    }
}

/// Fields for a new recipient.
#[derive(Debug, Clone)]
pub struct NewRecipient {
    /// Owning account
    pub account_id: i64,
    /// Primary first name
    pub first_name: String,
    /// Primary last name
    pub last_name: String,
    /// Second person of a couple, first name
    pub partner_first_name: Option<String>,
    /// Second person of a couple, last name
    pub partner_last_name: Option<String>,
    /// Relationship category
    pub relationship: Relationship,
    /// Mailing address
    pub address: MailingAddress,
}

/// A partial edit; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct RecipientUpdate {
    /// New first name
    pub first_name: Option<String>,
    /// New last name
    pub last_name: Option<String>,
    /// New partner first name (`Some(None)` clears it)
    pub partner_first_name: Option<Option<String>>,
    /// New partner last name (`Some(None)` clears it)
    pub partner_last_name: Option<Option<String>>,
    /// New relationship
    pub relationship: Option<Relationship>,
    /// New mailing address
    pub address: Option<MailingAddress>,
}

impl RecipientUpdate {
    const fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.partner_first_name.is_none()
            && self.partner_last_name.is_none()
            && self.relationship.is_none()
            && self.address.is_none()
    }
}

fn required_name(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation {
            message: format!("Recipient {field} cannot be empty"),
        });
    }
    Ok(trimmed.to_string())
}

fn optional_name(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Name as printed on the envelope, e.g. `"Ann & Bob Smith"` for a couple
/// sharing a last name.
#[must_use]
pub fn envelope_name(recipient: &recipient::Model) -> String {
    match (
        recipient.partner_first_name.as_deref(),
        recipient.partner_last_name.as_deref(),
    ) {
        (Some(partner_first), Some(partner_last)) if partner_last != recipient.last_name => {
            format!(
                "{} {} & {partner_first} {partner_last}",
                recipient.first_name, recipient.last_name
            )
        }
        (Some(partner_first), _) => format!(
            "{} & {partner_first} {}",
            recipient.first_name, recipient.last_name
        ),
        (None, _) => format!("{} {}", recipient.first_name, recipient.last_name),
    }
}

/// Parses the stored relationship of a recipient.
pub fn relationship_of(recipient: &recipient::Model) -> Result<Relationship> {
    recipient.relationship.parse()
}

/// Counts orders for the recipient that are still pending or printed.
///
/// This count is the recipient lock: any edit to the recipient or its occasions
/// is refused while it is non-zero, so an order in production never disagrees
/// with what the customer sees.
pub async fn in_flight_order_count<C>(db: &C, recipient_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    Order::find()
        .filter(order::Column::RecipientId.eq(recipient_id))
        .filter(order::Column::Status.is_in(OrderStatus::IN_FLIGHT.map(OrderStatus::as_str)))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Fails with [`Error::LockedResource`] if the recipient has in-flight orders.
pub async fn ensure_unlocked<C>(db: &C, recipient_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let in_flight_orders = in_flight_order_count(db, recipient_id).await?;
    if in_flight_orders > 0 {
        return Err(Error::LockedResource {
            recipient_id,
            in_flight_orders,
        });
    }
    Ok(())
}

/// Whether the recipient is currently locked for edits.
pub async fn is_locked<C>(db: &C, recipient_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    Ok(in_flight_order_count(db, recipient_id).await? > 0)
}

/// Finds a recipient by id.
///
/// This function is used by the operator surface to show a recipient; it
/// returns `None` rather than an error when the id is unknown.
pub async fn get_recipient<C>(db: &C, recipient_id: i64) -> Result<Option<recipient::Model>>
where
    C: ConnectionTrait,
{
    Recipient::find_by_id(recipient_id)
        .one(db)
        .await
        .map_err(Into::into)
}

pub(crate) async fn require_recipient<C>(db: &C, recipient_id: i64) -> Result<recipient::Model>
where
    C: ConnectionTrait,
{
    get_recipient(db, recipient_id)
        .await?
        .ok_or(Error::NotFound {
            entity: "Recipient",
            id: recipient_id,
        })
}

/// Lists an account's recipients ordered by last then first name.
///
/// This function backs the customer's address book view, where recipients are
/// shown alphabetically regardless of when they were added.
pub async fn list_recipients_for_account(
    db: &DatabaseConnection,
    account_id: i64,
) -> Result<Vec<recipient::Model>> {
    Recipient::find()
        .filter(recipient::Column::AccountId.eq(account_id))
        .order_by_asc(recipient::Column::LastName)
        .order_by_asc(recipient::Column::FirstName)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates a recipient after validating names and verifying the address.
///
/// The address goes through `verifier` before anything is written. If the
/// verification service is unavailable the recipient is still created, with
/// `address_status = "provisional"`, so a flaky dependency never blocks the
/// customer from adding someone.
#[instrument(skip(db, verifier, new), fields(account_id = new.account_id))]
pub async fn create_recipient<V>(
    db: &DatabaseConnection,
    verifier: &V,
    new: NewRecipient,
) -> Result<recipient::Model>
where
    V: AddressVerifier + Sync,
{
    let first_name = required_name("first name", &new.first_name)?;
    let last_name = required_name("last name", &new.last_name)?;
    let address = new.address.normalized()?;
    let status = check_address(verifier, &address).await?;

    let now = chrono::Utc::now().naive_utc();
    let model = recipient::ActiveModel {
        account_id: Set(new.account_id),
        first_name: Set(first_name),
        last_name: Set(last_name),
        partner_first_name: Set(optional_name(new.partner_first_name)),
        partner_last_name: Set(optional_name(new.partner_last_name)),
        relationship: Set(new.relationship.as_str().to_string()),
        address_line1: Set(address.line1),
        address_line2: Set(address.line2),
        city: Set(address.city),
        region: Set(address.region),
        postal_code: Set(address.postal_code),
        address_status: Set(status.as_str().to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let created = model.insert(db).await?;
    info!(recipient_id = created.id, "Recipient created");
    Ok(created)
}

/// Applies an edit to an unlocked recipient.
///
/// A new address is verified before the transaction opens; the lock check and
/// the write then share one transaction. Existing orders keep their snapshot,
/// so an edit only affects orders created afterwards.
///
/// # Errors
/// - [`Error::LockedResource`] while orders are pending or printed
/// - [`Error::NotFound`] if the recipient does not exist
/// - [`Error::Validation`] for empty names or an undeliverable address
#[instrument(skip(db, verifier, update))]
pub async fn update_recipient<V>(
    db: &DatabaseConnection,
    verifier: &V,
    recipient_id: i64,
    update: RecipientUpdate,
) -> Result<recipient::Model>
where
    V: AddressVerifier + Sync,
{
    // Verification is external I/O and runs before the transaction opens.
    let verified_address = match &update.address {
        Some(address) => {
            let address = address.normalized()?;
            let status = check_address(verifier, &address).await?;
            Some((address, status))
        }
        None => None,
    };

    let txn = db.begin().await?;
    let existing = require_recipient(&txn, recipient_id).await?;
    ensure_unlocked(&txn, recipient_id).await?;

    if update.is_empty() {
        txn.commit().await?;
        return Ok(existing);
    }

    let mut model: recipient::ActiveModel = existing.into();
    if let Some(first_name) = update.first_name {
        model.first_name = Set(required_name("first name", &first_name)?);
    }
    if let Some(last_name) = update.last_name {
        model.last_name = Set(required_name("last name", &last_name)?);
    }
    if let Some(partner_first_name) = update.partner_first_name {
        model.partner_first_name = Set(optional_name(partner_first_name));
    }
    if let Some(partner_last_name) = update.partner_last_name {
        model.partner_last_name = Set(optional_name(partner_last_name));
    }
    if let Some(relationship) = update.relationship {
        model.relationship = Set(relationship.as_str().to_string());
    }
    if let Some((address, status)) = verified_address {
        model.address_line1 = Set(address.line1);
        model.address_line2 = Set(address.line2);
        model.city = Set(address.city);
        model.region = Set(address.region);
        model.postal_code = Set(address.postal_code);
        model.address_status = Set(status.as_str().to_string());
    }
    model.updated_at = Set(chrono::Utc::now().naive_utc());

    let updated = model.update(&txn).await?;
    txn.commit().await?;
    info!("Recipient updated");
    Ok(updated)
}

/// Deletes an unlocked recipient and its occasions. Orders are kept.
///
/// Orders carry their own snapshot of the name and address, so removing the
/// recipient leaves the fulfillment history intact for billing and support.
#[instrument(skip(db))]
pub async fn delete_recipient(db: &DatabaseConnection, recipient_id: i64) -> Result<()> {
    let txn = db.begin().await?;
    let existing = require_recipient(&txn, recipient_id).await?;
    ensure_unlocked(&txn, recipient_id).await?;

    Occasion::delete_many()
        .filter(occasion::Column::RecipientId.eq(recipient_id))
        .exec(&txn)
        .await?;
    existing.delete(&txn).await?;

    txn.commit().await?;
    info!("Recipient deleted");
    Ok(())
}
