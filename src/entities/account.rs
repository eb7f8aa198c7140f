//! Account entity - The customer who owns recipients and pays for cards.
//!
//! The billing collaborator owns subscription status, plan and credit balance;
//! the engine only reads them. The return address is snapshotted into every
//! order at creation time.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    /// Unique identifier for the account
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Customer display name
    pub name: String,
    /// Name printed on the return address
    pub return_name: String,
    /// Return address, first line
    pub return_line1: String,
    /// Return address, optional second line
    pub return_line2: Option<String>,
    /// Return address city
    pub return_city: String,
    /// Return address state or region
    pub return_region: String,
    /// Return address postal code
    pub return_postal_code: String,
    /// Subscription status: `"active"`, `"past_due"`, `"cancelled"` or `"none"`
    pub subscription_status: String,
    /// Billing product identifier of the current plan, if any
    pub plan_product_id: Option<String>,
    /// Purchased single-card credits outside the subscription allotment
    pub card_credits: i64,
    /// When the account was created
    pub created_at: DateTime,
}

/// Defines relationships between Account and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One account has many recipients
    #[sea_orm(has_many = "super::recipient::Entity")]
    Recipients,
}

impl Related<super::recipient::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recipients.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
