//! Unified error types for the scheduling and fulfillment engine.
//!
//! Every fallible operation in the crate returns [`Result`]. Variants carry
//! enough context for the operator surface to tell a user-recoverable problem
//! (a locked recipient, a duplicate occasion) apart from a programmer error
//! (an unknown holiday identifier).

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown holiday/occasion vocabulary or a malformed configuration file.
    #[error("Configuration error: {message}")]
    Configuration {
        /// What was misconfigured
        message: String,
    },

    /// The just-because selector could not find a free date.
    #[error(
        "No just-because date available for recipient {recipient_id} in {year} after {attempts} attempts"
    )]
    SchedulingConflict {
        /// Recipient being scheduled
        recipient_id: i64,
        /// Cycle year being scheduled
        year: i32,
        /// Number of samples drawn before giving up
        attempts: u32,
    },

    /// An order status change that the lifecycle does not allow.
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Order being transitioned
        order_id: i64,
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// The recipient has orders in flight and cannot be edited.
    #[error("Recipient {recipient_id} is locked by {in_flight_orders} in-flight order(s)")]
    LockedResource {
        /// Locked recipient
        recipient_id: i64,
        /// Orders currently pending or printed
        in_flight_orders: u64,
    },

    /// A matching occasion already exists; the caller may confirm and retry.
    #[error("Occasion already exists for recipient {recipient_id} (occasion {existing_occasion_id})")]
    Conflict {
        /// Recipient the occasion was added to
        recipient_id: i64,
        /// The occasion that already covers this request
        existing_occasion_id: i64,
    },

    /// Requested record does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record ("Recipient", "Order", ...)
        entity: &'static str,
        /// Primary key that was looked up
        id: i64,
    },

    /// Input rejected by validation.
    #[error("Validation error: {message}")]
    Validation {
        /// Why the input was rejected
        message: String,
    },

    /// An external collaborator (e.g. address verification) was unavailable.
    #[error("External service error: {service}: {message}")]
    ExternalService {
        /// Name of the collaborator
        service: &'static str,
        /// Failure detail
        message: String,
    },

    /// Persistence layer failure.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Whether the end user can resolve this error themselves, as opposed to
    /// an operator or developer.
    #[must_use]
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::LockedResource { .. } | Self::Conflict { .. } | Self::Validation { .. }
        )
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
