//! In-memory repository with per-account locking
//!
//! Committed state lives behind one short-held mutex. Isolation between
//! units of work comes from per-account locks, acquired one at a time in
//! ascending identity order so two transfers touching the same pair of
//! accounts can never deadlock.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rust_decimal::Decimal;

use crate::domain::result::{Error, Result};
use crate::domain::{max_balance, Account, Identity, NewTransfer, RecordId, TransferRecord};
use crate::ports::{AccountStore, LedgerStore, Repository, UnitOfWork};

#[derive(Debug, Default)]
struct LedgerState {
    accounts: BTreeMap<Identity, Account>,
    records: Vec<TransferRecord>,
    next_id: RecordId,
}

/// Identities currently owned by an open unit of work
#[derive(Debug, Default)]
struct AccountLocks {
    held: Mutex<BTreeSet<Identity>>,
    released: Condvar,
}

impl AccountLocks {
    /// Acquire every identity in ascending order, or none of them by the deadline
    fn acquire_ordered(&self, identities: &BTreeSet<Identity>, deadline: Instant) -> Result<HeldLocks<'_>> {
        let mut acquired = HeldLocks {
            locks: self,
            identities: Vec::with_capacity(identities.len()),
        };

        for identity in identities {
            let mut held = self.held.lock();
            while held.contains(identity) {
                if self.released.wait_until(&mut held, deadline).timed_out()
                    && held.contains(identity)
                {
                    tracing::warn!(account = %identity, "account lock not acquired in time");
                    // `acquired` drops here and releases what it already holds
                    return Err(Error::contention(format!(
                        "account {} is locked by another transfer",
                        identity
                    )));
                }
            }
            held.insert(identity.clone());
            acquired.identities.push(identity.clone());
        }

        Ok(acquired)
    }
}

/// Owned account locks, released on drop
struct HeldLocks<'a> {
    locks: &'a AccountLocks,
    identities: Vec<Identity>,
}

impl HeldLocks<'_> {
    fn contains(&self, identity: &Identity) -> bool {
        self.identities.iter().any(|held| held == identity)
    }
}

impl Drop for HeldLocks<'_> {
    fn drop(&mut self) {
        if self.identities.is_empty() {
            return;
        }
        let mut held = self.locks.held.lock();
        for identity in &self.identities {
            held.remove(identity);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}

/// Volatile repository, mainly for tests and property checks
pub struct InMemoryRepository {
    state: Mutex<LedgerState>,
    locks: AccountLocks,
    lock_timeout: Duration,
}

impl InMemoryRepository {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                next_id: 1,
                ..LedgerState::default()
            }),
            locks: AccountLocks::default(),
            lock_timeout,
        }
    }

    /// Sum of all committed balances
    pub fn total_balance(&self) -> Decimal {
        self.state.lock().accounts.values().map(|a| a.balance).sum()
    }
}

impl Repository for InMemoryRepository {
    fn begin(&self, participants: &[&Identity]) -> Result<Box<dyn UnitOfWork + '_>> {
        let deadline = Instant::now() + self.lock_timeout;

        let known: BTreeSet<Identity> = {
            let state = self.state.lock();
            participants
                .iter()
                .filter(|identity| state.accounts.contains_key(**identity))
                .map(|identity| (*identity).clone())
                .collect()
        };

        let held = self.locks.acquire_ordered(&known, deadline)?;

        // Balances cannot change under us from here on: every writer must own the lock
        let staged = {
            let state = self.state.lock();
            known
                .iter()
                .filter_map(|identity| {
                    state
                        .accounts
                        .get(identity)
                        .map(|account| (identity.clone(), account.balance))
                })
                .collect()
        };

        Ok(Box::new(InMemoryUnit {
            repo: self,
            held,
            staged,
            appended: Vec::new(),
        }))
    }

    fn open_account(&self, account: &Account) -> Result<()> {
        account.validate().map_err(Error::invalid_request)?;
        let mut state = self.state.lock();
        if state.accounts.contains_key(&account.identity) {
            return Err(Error::AccountExists(account.identity.to_string()));
        }
        state
            .accounts
            .insert(account.identity.clone(), account.clone());
        Ok(())
    }

    fn get_account(&self, identity: &Identity) -> Result<Option<Account>> {
        Ok(self.state.lock().accounts.get(identity).cloned())
    }

    fn query_by_identity(&self, identity: &Identity) -> Result<Vec<TransferRecord>> {
        let state = self.state.lock();
        let mut records: Vec<TransferRecord> = state
            .records
            .iter()
            .filter(|record| record.involves(identity))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(records)
    }

    fn transfer_count(&self) -> Result<i64> {
        Ok(self.state.lock().records.len() as i64)
    }
}

struct InMemoryUnit<'a> {
    repo: &'a InMemoryRepository,
    held: HeldLocks<'a>,
    staged: BTreeMap<Identity, Decimal>,
    appended: Vec<TransferRecord>,
}

impl InMemoryUnit<'_> {
    /// Working balance of a participant of this unit
    fn staged_balance(&self, identity: &Identity) -> Result<Decimal> {
        if let Some(balance) = self.staged.get(identity) {
            return Ok(*balance);
        }
        if self.repo.state.lock().accounts.contains_key(identity) {
            return Err(Error::storage(format!(
                "account {} is not a participant of this unit of work",
                identity
            )));
        }
        Err(Error::not_found(identity.as_str()))
    }
}

impl AccountStore for InMemoryUnit<'_> {
    fn get_balance(&mut self, identity: &Identity) -> Result<Decimal> {
        self.staged_balance(identity)
    }

    /// Resolution sees accounts as they were when the unit began
    fn find_account(&mut self, identity: &Identity) -> Result<Option<Identity>> {
        Ok(self.staged.contains_key(identity).then(|| identity.clone()))
    }

    fn adjust_balance(&mut self, identity: &Identity, delta: Decimal) -> Result<()> {
        let current = self.staged_balance(identity)?;
        let updated = current
            .checked_add(delta)
            .filter(|balance| *balance <= max_balance())
            .ok_or_else(|| {
                Error::storage(format!("balance of {} would exceed the ledger maximum", identity))
            })?;
        if updated.is_sign_negative() && !updated.is_zero() {
            return Err(Error::InsufficientFunds {
                available: current,
                requested: -delta,
            });
        }
        self.staged.insert(identity.clone(), updated);
        Ok(())
    }
}

impl LedgerStore for InMemoryUnit<'_> {
    fn append(&mut self, record: &NewTransfer) -> Result<RecordId> {
        let id = {
            let mut state = self.repo.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            id
        };
        self.appended.push(record.clone().into_record(id));
        Ok(id)
    }
}

impl UnitOfWork for InMemoryUnit<'_> {
    fn commit(self: Box<Self>) -> Result<()> {
        let unit = *self;
        {
            let mut state = unit.repo.state.lock();
            for (identity, balance) in &unit.staged {
                if let Some(account) = state.accounts.get_mut(identity) {
                    account.balance = *balance;
                }
            }
            state.records.extend(unit.appended);
        }
        debug_assert!(unit.staged.keys().all(|identity| unit.held.contains(identity)));
        // Account locks are released only after the new state is visible
        drop(unit.held);
        Ok(())
    }
}
