//! Order lifecycle - batch creation of due orders and status transitions.
//!
//! Orders move `pending → printed → mailed`, or `pending → cancelled`. Creation
//! is idempotent per `(occasion_id, target_year)` through a unique index, so
//! overlapping or retried batch passes never produce a second order. Each
//! status change runs in its own transaction and only applies if the order is
//! still in the expected state.

use crate::{
    config::settings::SchedulingSettings,
    core::{
        account::{self, SubscriptionStatus},
        allocation,
        delivery::{self, DeliveryDecision, LEAD_TIME_DAYS},
        just_because::{self, CardVariation},
        occasion::{self, OccasionSchedule},
        recipient::{self, Relationship},
        recurrence,
    },
    entities::{
        Occasion, Order, account as account_entity, occasion as occasion_entity, order,
        recipient as recipient_entity,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sea_orm::{
    QueryOrder, Set, TransactionTrait, prelude::*,
    sea_query::{Expr, OnConflict},
};
use std::{fmt, str::FromStr};
use tracing::{debug, info, instrument, warn};

/// Fulfillment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    /// Created, waiting to be printed
    Pending,
    /// Printed, waiting to be mailed
    Printed,
    /// Handed to the postal service (terminal)
    Mailed,
    /// Withdrawn before printing (terminal)
    Cancelled,
}

impl OrderStatus {
    /// Statuses that lock the recipient.
    pub const IN_FLIGHT: [Self; 2] = [Self::Pending, Self::Printed];

    /// Value stored in `orders.status`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Printed => "printed",
            Self::Mailed => "mailed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Printed | Self::Cancelled) | (Self::Printed, Self::Mailed)
        )
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Mailed | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "printed" => Ok(Self::Printed),
            "mailed" => Ok(Self::Mailed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(Error::Configuration {
                message: format!("Unknown order status: {other:?}"),
            }),
        }
    }
}

/// Capacity bucket an order draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardType {
    /// Covered by the annual subscription allotment
    Subscription,
    /// Part of a bulk purchase placed outside the batch pass
    Bulk,
    /// A single purchased card
    Individual,
}

impl CardType {
    /// Value stored in `orders.card_type`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subscription => "subscription",
            Self::Bulk => "bulk",
            Self::Individual => "individual",
        }
    }

    /// Bucket for orders created by the batch pass.
    #[must_use]
    pub fn for_account(account: &account_entity::Model) -> Self {
        let subscribed = SubscriptionStatus::parse(&account.subscription_status)
            == SubscriptionStatus::Active
            && allocation::plan_allotment(account.plan_product_id.as_deref()) > 0;
        if subscribed {
            Self::Subscription
        } else {
            Self::Individual
        }
    }
}

/// What the batch pass decided for one occasion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A new pending order was created
    Created {
        /// The new order
        order_id: i64,
    },
    /// An order for this occurrence already exists
    AlreadyOrdered,
    /// Too close to fulfil; moved to the next cycle
    Deferred {
        /// The occurrence that will be fulfilled instead
        fulfillment_date: NaiveDate,
    },
    /// On time but outside the ordering window
    NotYetDue,
}

/// An occasion the batch pass could not schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccasionFailure {
    /// Failing occasion
    pub occasion_id: i64,
    /// Rendered error
    pub error: String,
}

/// Summary of one `create_due_orders` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Orders created by this pass
    pub created: Vec<i64>,
    /// Occasions whose occurrence was already ordered
    pub already_ordered: usize,
    /// Occasions deferred to the next cycle, with their fulfillment date
    pub deferred: Vec<(i64, NaiveDate)>,
    /// Occasions outside the ordering window
    pub not_yet_due: usize,
    /// Occasions that failed; the rest of the pass continued
    pub failures: Vec<OccasionFailure>,
}

impl BatchReport {
    /// Total number of occasions examined.
    #[must_use]
    pub fn examined(&self) -> usize {
        self.created.len()
            + self.already_ordered
            + self.deferred.len()
            + self.not_yet_due
            + self.failures.len()
    }
}

/// Result of a bulk `mark_printed` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkPrintedReport {
    /// Orders moved from pending to printed
    pub printed: Vec<i64>,
    /// Orders that were already printed (no-op)
    pub already_printed: Vec<i64>,
    /// Orders in another status, left untouched
    pub skipped: Vec<(i64, OrderStatus)>,
    /// Ids with no matching order
    pub missing: Vec<i64>,
    /// Orders whose stored status is not recognised, with the raw value
    pub invalid: Vec<(i64, String)>,
}

/// Dates of the recipient's other occasions around `year`, used to space the
/// just-because card.
fn sibling_dates(siblings: &[OccasionSchedule], year: i32) -> Result<Vec<NaiveDate>> {
    let mut dates = Vec::new();
    for schedule in siblings {
        for y in [year - 1, year, year + 1] {
            if let Some(date) = schedule.fixed_date_in(y)? {
                dates.push(date);
            }
        }
    }
    Ok(dates)
}

/// Everything needed to resolve an occasion's dates without further I/O.
struct Resolver {
    recipient_id: i64,
    relationship: Relationship,
    schedule: OccasionSchedule,
    siblings: Vec<OccasionSchedule>,
    stored_send_date: Option<NaiveDate>,
}

impl Resolver {
    /// The occurrence in the cycle `year`.
    fn date_in(&self, year: i32) -> Result<NaiveDate> {
        match self.schedule {
            OccasionSchedule::JustBecause => {
                if let Some(stored) = self.stored_send_date.filter(|d| d.year() == year) {
                    return Ok(stored);
                }
                let existing = sibling_dates(&self.siblings, year)?;
                just_because::select(self.recipient_id, self.relationship, year, &existing)
                    .map(|selection| selection.date)
            }
            OccasionSchedule::Recurring { month, day } => {
                recurrence::occurrence_in_year(month, day, year)
            }
            OccasionSchedule::Holiday(holiday) => holiday.date_in(year),
        }
    }

    /// The first occurrence on or after `today`.
    fn next_on_or_after(&self, today: NaiveDate) -> Result<NaiveDate> {
        if let OccasionSchedule::Recurring { month, day } = self.schedule {
            return recurrence::next_occurrence(month, day, today);
        }
        let this_cycle = self.date_in(today.year())?;
        if this_cycle < today {
            self.date_in(today.year() + 1)
        } else {
            Ok(this_cycle)
        }
    }

    fn card_variation(&self) -> Option<CardVariation> {
        matches!(self.schedule, OccasionSchedule::JustBecause)
            .then(|| CardVariation::for_relationship(self.relationship))
    }
}

async fn build_resolver<C>(
    db: &C,
    occasion: &occasion_entity::Model,
    recipient: &recipient_entity::Model,
) -> Result<Resolver>
where
    C: ConnectionTrait,
{
    let schedule = occasion::schedule_of(occasion)?;
    let siblings = if schedule == OccasionSchedule::JustBecause {
        occasion::list_occasions_for_recipient(db, recipient.id)
            .await?
            .iter()
            .filter(|o| o.id != occasion.id && !o.is_just_because)
            .map(occasion::schedule_of)
            .collect::<Result<Vec<_>>>()?
    } else {
        Vec::new()
    };

    Ok(Resolver {
        recipient_id: recipient.id,
        relationship: recipient::relationship_of(recipient)?,
        schedule,
        siblings,
        stored_send_date: occasion.computed_send_date,
    })
}

fn snapshot(
    occasion: &occasion_entity::Model,
    recipient: &recipient_entity::Model,
    account: &account_entity::Model,
    occasion_date: NaiveDate,
    card_variation: Option<CardVariation>,
    now: DateTime<Utc>,
) -> order::ActiveModel {
    order::ActiveModel {
        account_id: Set(account.id),
        recipient_id: Set(recipient.id),
        occasion_id: Set(occasion.id),
        target_year: Set(occasion_date.year()),
        occasion_kind: Set(occasion.kind.clone()),
        occasion_date: Set(occasion_date),
        card_type: Set(CardType::for_account(account).as_str().to_string()),
        card_variation: Set(card_variation.map(|v| v.as_str().to_string())),
        recipient_name: Set(recipient::envelope_name(recipient)),
        recipient_line1: Set(recipient.address_line1.clone()),
        recipient_line2: Set(recipient.address_line2.clone()),
        recipient_city: Set(recipient.city.clone()),
        recipient_region: Set(recipient.region.clone()),
        recipient_postal_code: Set(recipient.postal_code.clone()),
        return_name: Set(account.return_name.clone()),
        return_line1: Set(account.return_line1.clone()),
        return_line2: Set(account.return_line2.clone()),
        return_city: Set(account.return_city.clone()),
        return_region: Set(account.return_region.clone()),
        return_postal_code: Set(account.return_postal_code.clone()),
        status: Set(OrderStatus::Pending.as_str().to_string()),
        print_date: Set(None),
        mail_date: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
}

/// Decides and, if due, materializes the order for one occasion.
async fn schedule_occasion(
    db: &DatabaseConnection,
    occasion: &occasion_entity::Model,
    today: NaiveDate,
    settings: &SchedulingSettings,
) -> Result<ScheduleOutcome> {
    let recipient = recipient::require_recipient(db, occasion.recipient_id).await?;
    let resolver = build_resolver(db, occasion, &recipient).await?;

    let target = resolver.next_on_or_after(today)?;

    // Pin a freshly drawn just-because date so later edits to the calendar
    // cannot move it within the cycle.
    if resolver.schedule == OccasionSchedule::JustBecause
        && occasion.computed_send_date != Some(target)
    {
        let mut model: occasion_entity::ActiveModel = occasion.clone().into();
        model.computed_send_date = Set(Some(target));
        model.update(db).await?;
    }

    let DeliveryDecision {
        is_deferred,
        fulfillment_date,
        days_until,
    } = delivery::evaluate(target, today, LEAD_TIME_DAYS, |year| resolver.date_in(year))?;

    if is_deferred {
        debug!(occasion_id = occasion.id, %target, %fulfillment_date, "Deferred to next cycle");
        return Ok(ScheduleOutcome::Deferred { fulfillment_date });
    }
    if days_until > LEAD_TIME_DAYS + settings.order_window_days {
        return Ok(ScheduleOutcome::NotYetDue);
    }
    if occasion.last_sent_year == Some(target.year()) {
        return Ok(ScheduleOutcome::AlreadyOrdered);
    }

    let account = account::get_account(db, recipient.account_id)
        .await?
        .ok_or(Error::NotFound {
            entity: "Account",
            id: recipient.account_id,
        })?;

    let txn = db.begin().await?;
    let inserted = Order::insert(snapshot(
        occasion,
        &recipient,
        &account,
        target,
        resolver.card_variation(),
        Utc::now(),
    ))
    .on_conflict(
        OnConflict::columns([order::Column::OccasionId, order::Column::TargetYear])
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(&txn)
    .await?;

    if inserted == 0 {
        txn.commit().await?;
        return Ok(ScheduleOutcome::AlreadyOrdered);
    }

    Occasion::update_many()
        .col_expr(occasion_entity::Column::LastSentYear, Expr::value(target.year()))
        .filter(occasion_entity::Column::Id.eq(occasion.id))
        .exec(&txn)
        .await?;

    let created = Order::find()
        .filter(order::Column::OccasionId.eq(occasion.id))
        .filter(order::Column::TargetYear.eq(target.year()))
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "Order",
            id: occasion.id,
        })?;
    txn.commit().await?;

    info!(
        order_id = created.id,
        occasion_id = occasion.id,
        occasion_date = %target,
        "Order created"
    );
    Ok(ScheduleOutcome::Created {
        order_id: created.id,
    })
}

/// Creates a pending order for every occasion that is due as of `today`.
///
/// An occasion is due when its next occurrence is at least [`LEAD_TIME_DAYS`]
/// away and at most `LEAD_TIME_DAYS + order_window_days` away. Safe to call any
/// number of times; a failing occasion is reported and does not stop the pass.
///
/// This function is the daily batch entry point, invoked by the
/// `card-cadence-batch` binary or an external scheduler. Occurrences that are
/// too close to print and mail are reported as deferred with the date of the
/// next cycle, which a later pass will order once it enters the window.
#[instrument(skip(db, settings))]
pub async fn create_due_orders(
    db: &DatabaseConnection,
    today: NaiveDate,
    settings: &SchedulingSettings,
) -> Result<BatchReport> {
    let occasions = Occasion::find()
        .order_by_asc(occasion_entity::Column::Id)
        .all(db)
        .await?;

    let mut report = BatchReport::default();
    for occasion in &occasions {
        match schedule_occasion(db, occasion, today, settings).await {
            Ok(ScheduleOutcome::Created { order_id }) => report.created.push(order_id),
            Ok(ScheduleOutcome::AlreadyOrdered) => report.already_ordered += 1,
            Ok(ScheduleOutcome::Deferred { fulfillment_date }) => {
                report.deferred.push((occasion.id, fulfillment_date));
            }
            Ok(ScheduleOutcome::NotYetDue) => report.not_yet_due += 1,
            Err(e) => {
                warn!(occasion_id = occasion.id, "Failed to schedule occasion: {e}");
                report.failures.push(OccasionFailure {
                    occasion_id: occasion.id,
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        examined = report.examined(),
        created = report.created.len(),
        already_ordered = report.already_ordered,
        deferred = report.deferred.len(),
        failures = report.failures.len(),
        "Batch pass complete"
    );
    Ok(report)
}

fn status_of(model: &order::Model) -> Result<OrderStatus> {
    model.status.parse()
}

fn rejected(order_id: i64, from: OrderStatus, to: OrderStatus) -> Error {
    warn!(order_id, %from, %to, "Rejected order transition");
    Error::InvalidTransition {
        order_id,
        from: from.as_str().to_string(),
        to: to.as_str().to_string(),
    }
}

/// Moves `order_id` from `from` to `to` if it is still in `from`.
/// Returns whether a row changed.
async fn apply_transition<C>(
    db: &C,
    order_id: i64,
    from: OrderStatus,
    to: OrderStatus,
    stamp: Option<(order::Column, DateTime<Utc>)>,
    now: DateTime<Utc>,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let mut update = Order::update_many()
        .col_expr(order::Column::Status, Expr::value(to.as_str()))
        .col_expr(order::Column::UpdatedAt, Expr::value(now));
    if let Some((column, at)) = stamp {
        update = update.col_expr(column, Expr::value(at));
    }
    let result = update
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Status.eq(from.as_str()))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Marks orders as printed.
///
/// This is called by the print operator with a batch of order ids from the
/// print queue. Each order is handled in its own transaction, so one bad order
/// never holds back the rest of the batch.
///
/// Only pending orders change. Already-printed orders are a no-op, orders in
/// any other status are skipped, and orders with an unrecognised stored status
/// are left untouched and listed in `invalid`. Every case is reported back.
#[instrument(skip(db, order_ids), fields(count = order_ids.len()))]
pub async fn mark_printed(
    db: &DatabaseConnection,
    order_ids: &[i64],
    now: DateTime<Utc>,
) -> Result<MarkPrintedReport> {
    let mut report = MarkPrintedReport::default();

    for &order_id in order_ids {
        let txn = db.begin().await?;
        let Some(existing) = Order::find_by_id(order_id).one(&txn).await? else {
            txn.rollback().await?;
            report.missing.push(order_id);
            continue;
        };

        let status = match status_of(&existing) {
            Ok(status) => status,
            Err(e) => {
                warn!(order_id, "Skipping order with unreadable status: {e}");
                txn.rollback().await?;
                report.invalid.push((order_id, existing.status));
                continue;
            }
        };

        match status {
            OrderStatus::Pending => {
                let changed = apply_transition(
                    &txn,
                    order_id,
                    OrderStatus::Pending,
                    OrderStatus::Printed,
                    Some((order::Column::PrintDate, now)),
                    now,
                )
                .await?;
                if changed {
                    report.printed.push(order_id);
                } else {
                    report.already_printed.push(order_id);
                }
            }
            OrderStatus::Printed => report.already_printed.push(order_id),
            other => report.skipped.push((order_id, other)),
        }
        txn.commit().await?;
    }

    info!(
        printed = report.printed.len(),
        already_printed = report.already_printed.len(),
        skipped = report.skipped.len(),
        missing = report.missing.len(),
        invalid = report.invalid.len(),
        "Marked orders printed"
    );
    Ok(report)
}

async fn transition_single(
    db: &DatabaseConnection,
    order_id: i64,
    from: OrderStatus,
    to: OrderStatus,
    stamp: Option<order::Column>,
    now: DateTime<Utc>,
) -> Result<order::Model> {
    let txn = db.begin().await?;
    let existing = Order::find_by_id(order_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "Order",
            id: order_id,
        })?;

    let current = status_of(&existing)?;
    if current != from || !current.can_transition_to(to) {
        return Err(rejected(order_id, current, to));
    }
    if !apply_transition(&txn, order_id, from, to, stamp.map(|c| (c, now)), now).await? {
        return Err(rejected(order_id, current, to));
    }

    let updated = Order::find_by_id(order_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "Order",
            id: order_id,
        })?;
    txn.commit().await?;
    info!(order_id, %from, %to, "Order transitioned");
    Ok(updated)
}

/// Marks a printed order as mailed.
///
/// This is the last step of fulfillment, called once the card is handed to the
/// postal service. It stamps `mail_date` and releases the recipient lock.
///
/// # Errors
/// Returns [`Error::InvalidTransition`] unless the order is currently printed.
#[instrument(skip(db))]
pub async fn mark_mailed(
    db: &DatabaseConnection,
    order_id: i64,
    now: DateTime<Utc>,
) -> Result<order::Model> {
    transition_single(
        db,
        order_id,
        OrderStatus::Printed,
        OrderStatus::Mailed,
        Some(order::Column::MailDate),
        now,
    )
    .await
}

/// Cancels a pending order.
///
/// Used by support to withdraw a card before it reaches the printer. Printed
/// orders can no longer be cancelled.
///
/// # Errors
/// Returns [`Error::InvalidTransition`] unless the order is currently pending.
#[instrument(skip(db))]
pub async fn cancel_order(
    db: &DatabaseConnection,
    order_id: i64,
    now: DateTime<Utc>,
) -> Result<order::Model> {
    transition_single(
        db,
        order_id,
        OrderStatus::Pending,
        OrderStatus::Cancelled,
        None,
        now,
    )
    .await
}

/// Finds an order by id.
pub async fn get_order<C>(db: &C, order_id: i64) -> Result<Option<order::Model>>
where
    C: ConnectionTrait,
{
    Order::find_by_id(order_id).one(db).await.map_err(Into::into)
}

/// Lists a recipient's orders, newest occurrence first.
///
/// This includes orders whose recipient has since been deleted, since orders
/// keep only a plain `recipient_id`.
pub async fn list_orders_for_recipient<C>(db: &C, recipient_id: i64) -> Result<Vec<order::Model>>
where
    C: ConnectionTrait,
{
    Order::find()
        .filter(order::Column::RecipientId.eq(recipient_id))
        .order_by_desc(order::Column::OccasionDate)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists orders in a status, soonest occurrence first (the print queue for `Pending`).
pub async fn list_orders_by_status<C>(db: &C, status: OrderStatus) -> Result<Vec<order::Model>>
where
    C: ConnectionTrait,
{
    Order::find()
        .filter(order::Column::Status.eq(status.as_str()))
        .order_by_asc(order::Column::OccasionDate)
        .all(db)
        .await
        .map_err(Into::into)
}
