//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod account;
pub mod occasion;
pub mod order;
pub mod recipient;

// Re-export specific types to avoid conflicts
pub use account::{Column as AccountColumn, Entity as Account, Model as AccountModel};
pub use occasion::{Column as OccasionColumn, Entity as Occasion, Model as OccasionModel};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel};
pub use recipient::{Column as RecipientColumn, Entity as Recipient, Model as RecipientModel};
