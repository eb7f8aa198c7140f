//! Batch trigger: runs one `create_due_orders` pass.
//!
//! Usage: `card-cadence-batch [YYYY-MM-DD]` (defaults to today, UTC).

use card_cadence::{
    config::{database, settings},
    core::order,
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use dotenvy::dotenv;
use std::{env, path::Path};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn reference_date() -> Result<NaiveDate> {
    match env::args().nth(1) {
        Some(arg) => NaiveDate::parse_from_str(&arg, "%Y-%m-%d").map_err(|e| Error::Validation {
            message: format!("Invalid date {arg:?}, expected YYYY-MM-DD: {e}"),
        }),
        None => Ok(Utc::now().date_naive()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load scheduling settings
    let settings = settings::load_default_settings()
        .inspect_err(|e| error!("Failed to load settings: {e}"))?;

    // 4. Connect and make sure the schema exists
    if env::var("DATABASE_URL").is_err() {
        std::fs::create_dir_all(Path::new("data"))?;
    }
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db).await?;

    // 5. Run the batch pass
    let today = reference_date()?;
    info!(%today, window_days = settings.scheduling.order_window_days, "Starting batch pass");
    let report = order::create_due_orders(&db, today, &settings.scheduling).await?;

    for (occasion_id, fulfillment_date) in &report.deferred {
        info!(occasion_id, %fulfillment_date, "Deferred to next cycle");
    }
    for failure in &report.failures {
        warn!(occasion_id = failure.occasion_id, "Not scheduled: {}", failure.error);
    }
    info!(
        created = report.created.len(),
        already_ordered = report.already_ordered,
        not_yet_due = report.not_yet_due,
        "Done"
    );

    Ok(())
}
