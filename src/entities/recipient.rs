//! Recipient entity - A person (or couple) who receives cards.
//!
//! Recipients are mutable until locked by an in-flight order. Deleting a
//! recipient removes its occasions but leaves materialized orders untouched.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Recipient database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "recipients")]
pub struct Model {
    /// Unique identifier for the recipient
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning account
    pub account_id: i64,
    /// First name of the primary person
    pub first_name: String,
    /// Last name of the primary person
    pub last_name: String,
    /// First name of the second person, for couples
    pub partner_first_name: Option<String>,
    /// Last name of the second person, for couples
    pub partner_last_name: Option<String>,
    /// Relationship category: `"family"`, `"friend"`, `"romantic"` or `"professional"`
    pub relationship: String,
    /// Mailing address, first line
    pub address_line1: String,
    /// Mailing address, optional second line
    pub address_line2: Option<String>,
    /// Mailing address city
    pub city: String,
    /// Mailing address state or region
    pub region: String,
    /// Mailing address postal code
    pub postal_code: String,
    /// `"verified"` or `"provisional"` (verification service was unavailable)
    pub address_status: String,
    /// When the recipient was created
    pub created_at: DateTime,
    /// When the recipient was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between Recipient and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each recipient belongs to one account
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id"
    )]
    Account,
    /// One recipient has many occasions
    #[sea_orm(has_many = "super::occasion::Entity")]
    Occasions,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl Related<super::occasion::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Occasions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
