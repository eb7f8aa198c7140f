//! Shared test utilities for `CardCadence`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test accounts, recipients and occasions with sensible defaults.

use crate::{
    config::settings::SchedulingSettings,
    core::{
        account::{self, NewAccount, SubscriptionStatus},
        address::{AddressVerdict, AddressVerifier, MailingAddress},
        occasion::{self, NewOccasion, OccasionKind},
        order,
        recipient::{self, NewRecipient, Relationship},
    },
    entities,
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;

pub use crate::core::address::AcceptAllVerifier;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Installs a test subscriber so `tracing` output shows up with `--nocapture`.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("card_cadence=debug")
        .with_test_writer()
        .try_init();
}

/// Scheduling settings with the default 30-day ordering window.
pub fn test_settings() -> SchedulingSettings {
    SchedulingSettings::default()
}

/// A deliverable-looking address.
pub fn test_address() -> MailingAddress {
    MailingAddress {
        line1: "12 Test Lane".to_string(),
        line2: None,
        city: "Springfield".to_string(),
        region: "IL".to_string(),
        postal_code: "62701".to_string(),
    }
}

/// Creates a test account with sensible defaults.
///
/// # Defaults
/// * `subscription_status`: active
/// * `plan_product_id`: "plus"
/// * `card_credits`: 0
pub async fn create_test_account(db: &DatabaseConnection) -> Result<entities::account::Model> {
    create_custom_account(db, "active", Some("plus"), 0).await
}

/// Creates a test account with custom billing state.
pub async fn create_custom_account(
    db: &DatabaseConnection,
    subscription_status: &str,
    plan: Option<&str>,
    card_credits: i64,
) -> Result<entities::account::Model> {
    account::create_account(
        db,
        NewAccount {
            name: "Test Account".to_string(),
            return_name: "Pat Sender".to_string(),
            return_address: MailingAddress {
                line1: "1 Return Rd".to_string(),
                ..test_address()
            },
            subscription_status: SubscriptionStatus::parse(subscription_status),
            plan_product_id: plan.map(ToString::to_string),
            card_credits,
        },
    )
    .await
}

/// Recipient fields with sensible defaults.
///
/// # Defaults
/// * `last_name`: "Tester"
/// * `relationship`: family
/// * `address`: [`test_address`]
pub fn new_test_recipient(account_id: i64, first_name: &str) -> NewRecipient {
    NewRecipient {
        account_id,
        first_name: first_name.to_string(),
        last_name: "Tester".to_string(),
        partner_first_name: None,
        partner_last_name: None,
        relationship: Relationship::Family,
        address: test_address(),
    }
}

/// Creates a test recipient verified by [`AcceptAllVerifier`].
pub async fn create_test_recipient(
    db: &DatabaseConnection,
    account_id: i64,
    first_name: &str,
) -> Result<entities::recipient::Model> {
    recipient::create_recipient(db, &AcceptAllVerifier, new_test_recipient(account_id, first_name))
        .await
}

/// Creates a holiday or just-because occasion (no user-entered date).
pub async fn create_test_occasion(
    db: &DatabaseConnection,
    recipient_id: i64,
    kind: OccasionKind,
) -> Result<entities::occasion::Model> {
    occasion::add_occasion(
        db,
        NewOccasion {
            recipient_id,
            kind,
            month: None,
            day: None,
            note: None,
        },
        false,
    )
    .await
    .map(|added| added.occasion)
}

/// Creates a birthday on `month`/`day`. Duplicates are allowed.
pub async fn create_test_birthday(
    db: &DatabaseConnection,
    recipient_id: i64,
    month: u32,
    day: u32,
) -> Result<entities::occasion::Model> {
    occasion::add_occasion(
        db,
        NewOccasion {
            recipient_id,
            kind: OccasionKind::Birthday,
            month: Some(month),
            day: Some(day),
            note: None,
        },
        true,
    )
    .await
    .map(|added| added.occasion)
}

/// Sets up an account with one recipient.
/// Returns (account, recipient) for common test scenarios.
pub async fn setup_with_recipient(
    db: &DatabaseConnection,
    first_name: &str,
) -> Result<(entities::account::Model, entities::recipient::Model)> {
    let account = create_test_account(db).await?;
    let recipient = create_test_recipient(db, account.id, first_name).await?;
    Ok((account, recipient))
}

/// Sets up a recipient with a June 1 birthday and runs the batch pass on
/// 2025-05-10, which creates one pending order.
/// Returns (recipient, order).
pub async fn setup_with_pending_order(
    db: &DatabaseConnection,
) -> Result<(entities::recipient::Model, entities::order::Model)> {
    let (_, recipient) = setup_with_recipient(db, "Mom").await?;
    create_test_birthday(db, recipient.id, 6, 1).await?;

    let today = NaiveDate::from_ymd_opt(2025, 5, 10).ok_or(Error::Validation {
        message: "invalid test date".to_string(),
    })?;
    let report = order::create_due_orders(db, today, &test_settings()).await?;
    let order_id = *report.created.first().ok_or(Error::NotFound {
        entity: "Order",
        id: recipient.id,
    })?;
    let created = order::get_order(db, order_id).await?.ok_or(Error::NotFound {
        entity: "Order",
        id: order_id,
    })?;
    Ok((recipient, created))
}

/// Verifier whose service is always down.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingVerifier;

impl AddressVerifier for FailingVerifier {
    async fn verify(&self, _address: &MailingAddress) -> Result<AddressVerdict> {
        Err(Error::ExternalService {
            service: "address-verification",
            message: "connection refused".to_string(),
        })
    }
}

/// Verifier that rejects every address.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectingVerifier;

impl AddressVerifier for RejectingVerifier {
    async fn verify(&self, _address: &MailingAddress) -> Result<AddressVerdict> {
        Ok(AddressVerdict::Undeliverable)
    }
}
