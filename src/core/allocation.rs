//! Card allocation capacity.
//!
//! Compares the number of scheduled cards against the plan's annual allotment
//! plus purchased credits. [`calculate`] is pure; [`allocation_for_account`]
//! gathers its inputs from the database.

use crate::{
    core::account::{self, SubscriptionStatus},
    entities::{Occasion, Recipient, recipient},
    errors::{Error, Result},
};
use sea_orm::prelude::*;

/// Annual card allotment per plan tier, keyed by billing product id.
pub const PLAN_ALLOTMENTS: [(&str, u64); 4] =
    [("basic", 5), ("plus", 10), ("pro", 15), ("premium", 30)];

/// Capacity report for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// Cards the customer has scheduled
    pub scheduled_count: u64,
    /// Cards covered by the subscription plan
    pub subscription_cards: u64,
    /// Purchased single-card credits
    pub extra_credits: u64,
    /// `subscription_cards + extra_credits`
    pub total_available: u64,
    /// Scheduled cards not covered by any capacity
    pub shortfall: u64,
    /// `scheduled_count > total_available`
    pub is_over_limit: bool,
}

/// Looks up the annual allotment for a plan id, ignoring case. Unknown plans get 0.
#[must_use]
pub fn plan_allotment(plan: Option<&str>) -> u64 {
    plan.and_then(|id| {
        PLAN_ALLOTMENTS
            .iter()
            .find(|(product, _)| product.eq_ignore_ascii_case(id.trim()))
            .map(|(_, cards)| *cards)
    })
    .unwrap_or(0)
}

/// Computes capacity for `scheduled_count` cards.
#[must_use]
pub fn calculate(scheduled_count: u64, plan: Option<&str>, extra_credits: u64) -> Allocation {
    let subscription_cards = plan_allotment(plan);
    let total_available = subscription_cards.saturating_add(extra_credits);
    Allocation {
        scheduled_count,
        subscription_cards,
        extra_credits,
        total_available,
        shortfall: scheduled_count.saturating_sub(total_available),
        is_over_limit: scheduled_count > total_available,
    }
}

/// Number of occasions on file across all of an account's recipients.
///
/// Every occasion recurs once a year, so this is the account's annual card demand.
pub async fn scheduled_occasion_count<C>(db: &C, account_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    Occasion::find()
        .inner_join(Recipient)
        .filter(recipient::Column::AccountId.eq(account_id))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Computes the allocation for an account from its stored plan and credits.
///
/// Subscription cards only count while the subscription is active.
pub async fn allocation_for_account<C>(db: &C, account_id: i64) -> Result<Allocation>
where
    C: ConnectionTrait,
{
    let account = account::get_account(db, account_id)
        .await?
        .ok_or(Error::NotFound {
            entity: "Account",
            id: account_id,
        })?;

    let scheduled = scheduled_occasion_count(db, account_id).await?;
    let plan = match SubscriptionStatus::parse(&account.subscription_status) {
        SubscriptionStatus::Active => account.plan_product_id.as_deref(),
        _ => None,
    };
    let credits = u64::try_from(account.card_credits).unwrap_or(0);

    Ok(calculate(scheduled, plan, credits))
}
