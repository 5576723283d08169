//! Transfer engine - validated, atomic balance transfers
//!
//! Each call runs one unit of work: read and check the sender balance,
//! debit, resolve and credit the recipient, append the ledger record,
//! commit. Any failure before commit drops the unit, which discards every
//! change made through it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use rust_decimal::Decimal;

use crate::domain::result::{Error, Result};
use crate::domain::{Amount, Identity, NewTransfer, Recipient, TransferRecord, TransferStatus};
use crate::ports::Repository;

/// Shared flag telling an in-flight transfer that its caller went away
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Guard that cancels the token when dropped, unless disarmed first
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop {
            token: Some(self.clone()),
        }
    }
}

/// See [`CancelToken::cancel_on_drop`]
#[derive(Debug)]
pub struct CancelOnDrop {
    token: Option<CancelToken>,
}

impl CancelOnDrop {
    pub fn disarm(mut self) {
        self.token = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

/// Transfer engine
///
/// Holds no state of its own beyond the repository handle; everything a
/// transfer touches lives in the unit of work opened for that call.
pub struct TransferEngine {
    repository: Arc<dyn Repository>,
}

impl TransferEngine {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Move `amount` from `sender` to whoever `recipient_handle` names
    pub fn transfer(
        &self,
        sender: &str,
        amount: Decimal,
        recipient_handle: &str,
        recipient_name: &str,
    ) -> Result<TransferRecord> {
        self.transfer_with_cancel(
            sender,
            amount,
            recipient_handle,
            recipient_name,
            &CancelToken::new(),
        )
    }

    /// Same as [`transfer`](Self::transfer), abandoning the unit if `cancel`
    /// fires before commit
    pub fn transfer_with_cancel(
        &self,
        sender: &str,
        amount: Decimal,
        recipient_handle: &str,
        recipient_name: &str,
        cancel: &CancelToken,
    ) -> Result<TransferRecord> {
        let sender_identity = Identity::parse(sender).ok();

        let amount = Amount::new(amount)?;

        let sender =
            sender_identity.ok_or_else(|| Error::not_found(Identity::normalize(sender)))?;
        let handle = recipient_handle.trim();
        let handle_identity = Identity::parse(handle)
            .map_err(|_| Error::invalid_request("recipient handle cannot be empty"))?;

        let mut unit = self.repository.begin(&[&sender, &handle_identity])?;

        let balance = unit.get_balance(&sender)?;
        if balance < amount.value() {
            return Err(Error::InsufficientFunds {
                available: balance,
                requested: amount.value(),
            });
        }

        unit.adjust_balance(&sender, amount.debit())?;

        let recipient = match unit.find_account(&handle_identity)? {
            Some(identity) => {
                unit.adjust_balance(&identity, amount.credit())?;
                Recipient::Resolved(identity)
            }
            None => Recipient::External(handle.to_string()),
        };

        let transfer = NewTransfer {
            amount,
            sender,
            recipient_name: recipient_name.trim().to_string(),
            recipient_handle: handle.to_string(),
            recipient,
            status: TransferStatus::Success,
            committed_at: Utc::now().trunc_subsecs(6),
        };
        let id = unit.append(&transfer)?;

        if cancel.is_cancelled() {
            tracing::info!(record_id = id, "caller abandoned transfer, rolling back");
            return Err(Error::Cancelled);
        }
        unit.commit()?;

        tracing::info!(
            record_id = id,
            resolved = transfer.recipient.is_resolved(),
            "transfer committed"
        );
        Ok(transfer.into_record(id))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::adapters::memory::InMemoryRepository;
    use crate::domain::Account;

    fn id(s: &str) -> Identity {
        Identity::parse(s).unwrap()
    }

    fn engine_with(accounts: &[(&str, i64)]) -> (TransferEngine, Arc<InMemoryRepository>) {
        let repo = Arc::new(InMemoryRepository::new(Duration::from_millis(200)));
        for (identity, cents) in accounts {
            repo.open_account(&Account::new(id(identity), *identity, Decimal::new(*cents, 2)))
                .unwrap();
        }
        (TransferEngine::new(repo.clone()), repo)
    }

    fn dec(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    #[test]
    fn test_internal_transfer_moves_exact_amount() {
        let (engine, repo) = engine_with(&[("alice@pay", 100000), ("bob@pay", 50000)]);

        let record = engine
            .transfer("Alice@Pay", dec(25050), "BOB@pay", "Bob")
            .unwrap();

        assert_eq!(repo.balance_of(&id("alice@pay")).unwrap(), dec(74950));
        assert_eq!(repo.balance_of(&id("bob@pay")).unwrap(), dec(75050));
        assert_eq!(record.amount.to_string(), "250.50");
        assert_eq!(record.recipient, Recipient::Resolved(id("bob@pay")));
        assert_eq!(record.status, TransferStatus::Success);
        assert_eq!(record.sender, id("alice@pay"));
        assert_eq!(repo.transfer_count().unwrap(), 1);
    }

    #[test]
    fn test_external_handle_only_debits_sender() {
        let (engine, repo) = engine_with(&[("alice", 10000), ("bob", 500)]);

        let record = engine.transfer("alice", dec(2500), "shop@upi", "Corner Shop").unwrap();

        assert_eq!(repo.balance_of(&id("alice")).unwrap(), dec(7500));
        assert_eq!(repo.balance_of(&id("bob")).unwrap(), dec(500));
        assert_eq!(record.recipient, Recipient::External("shop@upi".to_string()));
        assert_eq!(record.recipient.identity(), None);
        assert_eq!(record.recipient_name, "Corner Shop");
    }

    #[test]
    fn test_non_positive_amount_changes_nothing() {
        let (engine, repo) = engine_with(&[("alice", 10000), ("bob", 0)]);

        for cents in [0, -1, -10000] {
            let err = engine.transfer("alice", dec(cents), "bob", "Bob").unwrap_err();
            assert!(matches!(err, Error::InvalidAmount(_)));
        }
        assert_eq!(repo.balance_of(&id("alice")).unwrap(), dec(10000));
        assert_eq!(repo.balance_of(&id("bob")).unwrap(), dec(0));
        assert_eq!(repo.transfer_count().unwrap(), 0);
    }

    #[test]
    fn test_sub_cent_amount_rejected() {
        let (engine, repo) = engine_with(&[("alice", 10000), ("bob", 0)]);
        let err = engine
            .transfer("alice", Decimal::new(1005, 3), "bob", "Bob")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));
        assert_eq!(repo.transfer_count().unwrap(), 0);
    }

    #[test]
    fn test_insufficient_funds_changes_nothing() {
        let (engine, repo) = engine_with(&[("alice", 1000), ("bob", 0)]);
        let err = engine.transfer("alice", dec(1001), "bob", "Bob").unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));
        assert_eq!(repo.balance_of(&id("alice")).unwrap(), dec(1000));
        assert_eq!(repo.transfer_count().unwrap(), 0);
    }

    #[test]
    fn test_exact_balance_can_be_spent() {
        let (engine, repo) = engine_with(&[("alice", 1000), ("bob", 0)]);
        engine.transfer("alice", dec(1000), "bob", "Bob").unwrap();
        assert_eq!(repo.balance_of(&id("alice")).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_unknown_sender_is_not_found() {
        let (engine, _repo) = engine_with(&[("bob", 0)]);
        let err = engine.transfer("nobody", dec(100), "bob", "Bob").unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(_)));
        let err = engine.transfer("   ", dec(100), "bob", "Bob").unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(_)));
    }

    #[test]
    fn test_amount_is_validated_before_sender_lookup() {
        let (engine, _repo) = engine_with(&[]);
        let err = engine.transfer("nobody", dec(0), "bob", "Bob").unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));
    }

    #[test]
    fn test_self_transfer_nets_to_zero() {
        let (engine, repo) = engine_with(&[("alice", 5000)]);
        let record = engine.transfer("alice", dec(2000), "ALICE", "Me").unwrap();
        assert_eq!(repo.balance_of(&id("alice")).unwrap(), dec(5000));
        assert_eq!(record.recipient, Recipient::Resolved(id("alice")));
        assert_eq!(repo.transfer_count().unwrap(), 1);
    }

    #[test]
    fn test_self_transfer_still_requires_funds() {
        let (engine, _repo) = engine_with(&[("alice", 500)]);
        let err = engine.transfer("alice", dec(501), "alice", "Me").unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));
    }

    #[test]
    fn test_cancelled_transfer_rolls_back() {
        let (engine, repo) = engine_with(&[("alice", 5000), ("bob", 0)]);
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = engine
            .transfer_with_cancel("alice", dec(1000), "bob", "Bob", &cancel)
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(repo.balance_of(&id("alice")).unwrap(), dec(5000));
        assert_eq!(repo.balance_of(&id("bob")).unwrap(), dec(0));
        assert_eq!(repo.transfer_count().unwrap(), 0);
    }

    #[test]
    fn test_cancel_on_drop_guard() {
        let token = CancelToken::new();
        token.cancel_on_drop().disarm();
        assert!(!token.is_cancelled());
        drop(token.cancel_on_drop());
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_empty_handle_rejected() {
        let (engine, repo) = engine_with(&[("alice", 5000)]);
        let err = engine.transfer("alice", dec(100), "  ", "Nobody").unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert_eq!(repo.balance_of(&id("alice")).unwrap(), dec(5000));
    }
}
