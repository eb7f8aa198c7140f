//! Delivery-window policy.
//!
//! An occurrence can only be fulfilled if at least [`LEAD_TIME_DAYS`] remain
//! for printing and mailing. Otherwise it is deferred to the next cycle. The
//! decision depends on "today", so it is recomputed on every batch pass.

use crate::errors::Result;
use chrono::{Datelike, NaiveDate};

/// Minimum print + mail turnaround in days.
pub const LEAD_TIME_DAYS: i64 = 15;

/// Result of evaluating one occurrence against the lead time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryDecision {
    /// The occurrence is too close and moves to the next cycle
    pub is_deferred: bool,
    /// The date that will actually be fulfilled
    pub fulfillment_date: NaiveDate,
    /// Days from the reference date to `fulfillment_date`
    pub days_until: i64,
}

/// Whether `target` leaves at least `lead_time_days` after `reference`.
#[must_use]
pub fn is_on_time(target: NaiveDate, reference: NaiveDate, lead_time_days: i64) -> bool {
    (target - reference).num_days() >= lead_time_days
}

/// Evaluates `target` against the lead time.
///
/// When deferred, `next_cycle` is called with `target.year() + 1` to resolve the
/// same occasion one cycle later.
///
/// # Errors
/// Propagates any error from `next_cycle`.
pub fn evaluate<F>(
    target: NaiveDate,
    reference: NaiveDate,
    lead_time_days: i64,
    next_cycle: F,
) -> Result<DeliveryDecision>
where
    F: FnOnce(i32) -> Result<NaiveDate>,
{
    if is_on_time(target, reference, lead_time_days) {
        return Ok(DeliveryDecision {
            is_deferred: false,
            fulfillment_date: target,
            days_until: (target - reference).num_days(),
        });
    }

    let fulfillment_date = next_cycle(target.year() + 1)?;
    Ok(DeliveryDecision {
        is_deferred: true,
        fulfillment_date,
        days_until: (fulfillment_date - reference).num_days(),
    })
}
