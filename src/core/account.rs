//! Account lookups.
//!
//! Accounts are owned by the billing collaborator. The engine reads plan,
//! credits and the return address; `create_account` exists for seeding.

use crate::{
    core::address::MailingAddress,
    entities::{Account, account},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*};

/// Billing subscription state as stored on the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// Paid and current
    Active,
    /// Payment failed, grace period
    PastDue,
    /// Ended by the customer
    Cancelled,
    /// Never subscribed
    None,
}

impl SubscriptionStatus {
    /// Value stored in `accounts.subscription_status`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Cancelled => "cancelled",
            Self::None => "none",
        }
    }

    /// Parses a stored status; anything unrecognized counts as no subscription.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            "cancelled" => Self::Cancelled,
            _ => Self::None,
        }
    }
}

/// Fields for a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Customer display name
    pub name: String,
    /// Name on the return address
    pub return_name: String,
    /// Return address
    pub return_address: MailingAddress,
    /// Subscription state
    pub subscription_status: SubscriptionStatus,
    /// Billing plan id
    pub plan_product_id: Option<String>,
    /// Purchased credits
    pub card_credits: i64,
}

/// Inserts an account.
pub async fn create_account<C>(db: &C, new: NewAccount) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    if new.name.trim().is_empty() {
        return Err(Error::Validation {
            message: "Account name cannot be empty".to_string(),
        });
    }
    if new.card_credits < 0 {
        return Err(Error::Validation {
            message: format!("Card credits cannot be negative: {}", new.card_credits),
        });
    }
    let address = new.return_address.normalized()?;

    let model = account::ActiveModel {
        name: Set(new.name.trim().to_string()),
        return_name: Set(new.return_name.trim().to_string()),
        return_line1: Set(address.line1),
        return_line2: Set(address.line2),
        return_city: Set(address.city),
        return_region: Set(address.region),
        return_postal_code: Set(address.postal_code),
        subscription_status: Set(new.subscription_status.as_str().to_string()),
        plan_product_id: Set(new.plan_product_id),
        card_credits: Set(new.card_credits),
        created_at: Set(chrono::Utc::now().naive_utc()),
        ..Default::default()
    };
    model.insert(db).await.map_err(Into::into)
}

/// Finds an account by id.
pub async fn get_account<C>(db: &C, account_id: i64) -> Result<Option<account::Model>>
where
    C: ConnectionTrait,
{
    Account::find_by_id(account_id)
        .one(db)
        .await
        .map_err(Into::into)
}
