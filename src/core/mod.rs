//! Core module - Contains the scheduling and fulfillment logic.
//! Date resolution (`holiday`, `recurrence`, `just_because`, `delivery`) is pure;
//! the remaining modules operate on the database through SeaORM.

pub mod account;
pub mod address;
pub mod allocation;
pub mod delivery;
pub mod holiday;
pub mod just_because;
pub mod occasion;
pub mod order;
pub mod recipient;
pub mod recurrence;
