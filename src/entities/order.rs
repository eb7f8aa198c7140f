//! Order entity - An immutable fulfillment record for one occasion occurrence.
//!
//! Orders snapshot the recipient and return address at creation time. They keep
//! plain `recipient_id`/`occasion_id` columns without foreign keys so history
//! survives recipient deletion. `(occasion_id, target_year)` is unique.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Account the order bills against
    pub account_id: i64,
    /// Recipient the order was created for
    pub recipient_id: i64,
    /// Occasion the order was created from
    pub occasion_id: i64,
    /// Cycle year of the occurrence
    pub target_year: i32,
    /// Occasion kind at creation time
    pub occasion_kind: String,
    /// Resolved date of the occurrence
    pub occasion_date: Date,
    /// Capacity bucket: `"subscription"`, `"bulk"` or `"individual"`
    pub card_type: String,
    /// Neutral design tag for just-because cards
    pub card_variation: Option<String>,
    /// Recipient name as printed on the envelope
    pub recipient_name: String,
    /// Snapshot of the recipient address, first line
    pub recipient_line1: String,
    /// Snapshot of the recipient address, second line
    pub recipient_line2: Option<String>,
    /// Snapshot of the recipient city
    pub recipient_city: String,
    /// Snapshot of the recipient region
    pub recipient_region: String,
    /// Snapshot of the recipient postal code
    pub recipient_postal_code: String,
    /// Snapshot of the return name
    pub return_name: String,
    /// Snapshot of the return address, first line
    pub return_line1: String,
    /// Snapshot of the return address, second line
    pub return_line2: Option<String>,
    /// Snapshot of the return city
    pub return_city: String,
    /// Snapshot of the return region
    pub return_region: String,
    /// Snapshot of the return postal code
    pub return_postal_code: String,
    /// `"pending"`, `"printed"`, `"mailed"` or `"cancelled"`
    pub status: String,
    /// When the card was printed
    pub print_date: Option<DateTimeUtc>,
    /// When the card was mailed
    pub mail_date: Option<DateTimeUtc>,
    /// When the order was created
    pub created_at: DateTimeUtc,
    /// When the order status last changed
    pub updated_at: DateTimeUtc,
}

/// Orders are historical snapshots and carry no relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
