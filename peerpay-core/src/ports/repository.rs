//! Repository port - account and ledger storage abstraction

use rust_decimal::Decimal;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Identity, NewTransfer, RecordId, TransferRecord};

/// Balance access inside a unit of work
pub trait AccountStore {
    /// Current balance as seen by this unit of work
    fn get_balance(&mut self, identity: &Identity) -> Result<Decimal>;

    /// Resolve an identity to a known account, if one exists
    fn find_account(&mut self, identity: &Identity) -> Result<Option<Identity>>;

    /// Apply a signed delta
    ///
    /// Fails with `AccountNotFound` for unknown identities and with
    /// `InsufficientFunds` if the result would be negative; in both cases
    /// nothing is applied.
    fn adjust_balance(&mut self, identity: &Identity, delta: Decimal) -> Result<()>;
}

/// Append-only record storage inside a unit of work
pub trait LedgerStore {
    /// Persist a record alongside the unit's balance changes
    fn append(&mut self, record: &NewTransfer) -> Result<RecordId>;
}

/// One atomic, isolated group of balance adjustments and ledger appends
///
/// Dropping a unit without calling `commit` rolls back every change made
/// through it, so early returns, `?` and panics all leave the stores untouched.
pub trait UnitOfWork: AccountStore + LedgerStore {
    /// Make every change visible at once
    fn commit(self: Box<Self>) -> Result<()>;
}

/// Storage abstraction
///
/// Implementations (adapters) provide the actual storage and the isolation
/// guarantees of `begin`.
pub trait Repository: Send + Sync {
    // === Units of work ===

    /// Start a unit of work covering the given participants
    ///
    /// Waits at most the configured lock timeout before failing with
    /// `Contention`. Participants that are not known accounts are ignored.
    fn begin(&self, participants: &[&Identity]) -> Result<Box<dyn UnitOfWork + '_>>;

    // === Accounts ===

    /// Register a new account; fails with `AccountExists` on duplicates
    fn open_account(&self, account: &Account) -> Result<()>;

    /// Get an account by identity
    fn get_account(&self, identity: &Identity) -> Result<Option<Account>>;

    /// Committed balance of an account
    fn balance_of(&self, identity: &Identity) -> Result<Decimal> {
        self.get_account(identity)?
            .map(|account| account.balance)
            .ok_or_else(|| Error::not_found(identity.as_str()))
    }

    // === Ledger ===

    /// Records where the identity is sender or resolved recipient, newest first
    fn query_by_identity(&self, identity: &Identity) -> Result<Vec<TransferRecord>>;

    /// Total number of ledger records
    fn transfer_count(&self) -> Result<i64>;
}
