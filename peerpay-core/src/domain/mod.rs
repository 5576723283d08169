//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
mod amount;
mod identity;
pub mod result;
mod transfer;

pub use account::{max_balance, Account};
pub use amount::{Amount, AMOUNT_SCALE};
pub use identity::Identity;
pub use transfer::{NewTransfer, Recipient, RecordId, TransferRecord, TransferStatus};
