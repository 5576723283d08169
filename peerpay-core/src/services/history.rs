//! History service - read-only views of accounts and their transfers

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Identity, TransferRecord};
use crate::ports::Repository;

/// How a record relates to the account whose history is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Sent,
    Received,
    ToSelf,
}

/// One line of an account statement
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub direction: Direction,
    #[serde(flatten)]
    pub record: TransferRecord,
}

impl HistoryEntry {
    /// Effect of the record on the viewed account's balance
    pub fn signed_amount(&self) -> Decimal {
        match self.direction {
            Direction::Sent => self.record.amount.debit(),
            Direction::Received => self.record.amount.credit(),
            Direction::ToSelf => Decimal::ZERO,
        }
    }
}

/// Service for account lookups and transfer history
pub struct HistoryService {
    repository: Arc<dyn Repository>,
}

impl HistoryService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// The account behind a raw identity
    pub fn account(&self, identity: &str) -> Result<Account> {
        let identity = Identity::parse(identity)?;
        self.repository
            .get_account(&identity)?
            .ok_or_else(|| Error::not_found(identity.as_str()))
    }

    pub fn balance(&self, identity: &str) -> Result<Decimal> {
        Ok(self.account(identity)?.balance)
    }

    /// Every record the account sent or received, newest first
    pub fn history(&self, identity: &str) -> Result<Vec<HistoryEntry>> {
        let account = self.account(identity)?;
        let records = self.repository.query_by_identity(&account.identity)?;

        Ok(records
            .into_iter()
            .map(|record| {
                let sent = record.sender == account.identity;
                let received = record.recipient.identity() == Some(&account.identity);
                let direction = match (sent, received) {
                    (true, true) => Direction::ToSelf,
                    (true, false) => Direction::Sent,
                    _ => Direction::Received,
                };
                HistoryEntry { direction, record }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::adapters::memory::InMemoryRepository;
    use crate::services::TransferEngine;

    fn setup() -> (HistoryService, TransferEngine) {
        let repo = Arc::new(InMemoryRepository::new(Duration::from_millis(200)));
        for name in ["alice", "bob"] {
            let account = Account::new(Identity::parse(name).unwrap(), name, Decimal::new(10000, 2));
            repo.open_account(&account).unwrap();
        }
        (HistoryService::new(repo.clone()), TransferEngine::new(repo))
    }

    #[test]
    fn test_directions_and_order() {
        let (history, engine) = setup();
        engine.transfer("alice", Decimal::new(1000, 2), "bob", "Bob").unwrap();
        engine.transfer("bob", Decimal::new(300, 2), "alice", "Alice").unwrap();
        engine.transfer("alice", Decimal::new(100, 2), "alice", "Me").unwrap();
        engine.transfer("alice", Decimal::new(50, 2), "cafe@upi", "Cafe").unwrap();

        let entries = history.history("ALICE").unwrap();
        let directions: Vec<Direction> = entries.iter().map(|e| e.direction).collect();
        assert_eq!(
            directions,
            vec![Direction::Sent, Direction::ToSelf, Direction::Received, Direction::Sent]
        );
        let net: Decimal = entries.iter().map(HistoryEntry::signed_amount).sum();
        assert_eq!(history.balance("alice").unwrap(), Decimal::new(10000, 2) + net);

        // bob does not see alice's external payment
        assert_eq!(history.history("bob").unwrap().len(), 2);
    }

    #[test]
    fn test_repeated_queries_are_stable() {
        let (history, engine) = setup();
        engine.transfer("alice", Decimal::new(100, 2), "bob", "Bob").unwrap();
        engine.transfer("alice", Decimal::new(200, 2), "bob", "Bob").unwrap();

        let first: Vec<i64> = history.history("bob").unwrap().iter().map(|e| e.record.id).collect();
        let second: Vec<i64> = history.history("bob").unwrap().iter().map(|e| e.record.id).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_account() {
        let (history, _engine) = setup();
        assert!(matches!(history.history("carol"), Err(Error::AccountNotFound(_))));
        assert!(matches!(history.balance("carol"), Err(Error::AccountNotFound(_))));
    }
}
