//! Occasion entity - A reason to send a card to one recipient.
//!
//! Personal recurring occasions store a month/day; holidays store none and are
//! re-derived per year; just-because occasions carry a computed send date.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Occasion database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "occasions")]
pub struct Model {
    /// Unique identifier for the occasion
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Recipient this occasion belongs to
    pub recipient_id: i64,
    /// Occasion kind from the closed vocabulary (e.g. `"birthday"`, `"christmas"`)
    pub kind: String,
    /// Month of a personal recurring occasion
    pub month: Option<i32>,
    /// Day of month of a personal recurring occasion
    pub day: Option<i32>,
    /// Free-text note printed with the card
    pub note: Option<String>,
    /// Whether this is the recipient's just-because occasion
    pub is_just_because: bool,
    /// System-chosen send date, just-because only
    pub computed_send_date: Option<Date>,
    /// Last cycle year an order was materialized for
    pub last_sent_year: Option<i32>,
    /// When the occasion was created
    pub created_at: DateTime,
    /// When the occasion was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between Occasion and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each occasion belongs to one recipient
    #[sea_orm(
        belongs_to = "super::recipient::Entity",
        from = "Column::RecipientId",
        to = "super::recipient::Column::Id",
        on_delete = "Cascade"
    )]
    Recipient,
}

impl Related<super::recipient::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recipient.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
