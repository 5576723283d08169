//! Account service - registration of new account holders

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Identity};
use crate::ports::Repository;

/// Service for opening accounts
pub struct AccountService {
    repository: Arc<dyn Repository>,
    default_opening_balance: Decimal,
}

impl AccountService {
    pub fn new(repository: Arc<dyn Repository>, default_opening_balance: Decimal) -> Self {
        Self {
            repository,
            default_opening_balance,
        }
    }

    /// Open an account
    ///
    /// The display name falls back to the identity and the balance to the
    /// configured opening balance.
    pub fn open(
        &self,
        identity: &str,
        display_name: Option<&str>,
        opening_balance: Option<Decimal>,
    ) -> Result<Account> {
        let identity = Identity::parse(identity)?;
        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(identity.as_str())
            .to_string();
        let balance = opening_balance.unwrap_or(self.default_opening_balance);

        let mut account = Account::new(identity, display_name, balance);
        account.validate().map_err(Error::invalid_request)?;
        account.balance.rescale(2);
        self.repository.open_account(&account)?;

        tracing::info!("account opened");
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::adapters::memory::InMemoryRepository;

    fn service() -> AccountService {
        let repo = Arc::new(InMemoryRepository::new(Duration::from_millis(100)));
        AccountService::new(repo, Decimal::new(100000, 2))
    }

    #[test]
    fn test_defaults() {
        let service = service();
        let account = service.open(" Alice@Mail.com ", None, None).unwrap();
        assert_eq!(account.identity.as_str(), "alice@mail.com");
        assert_eq!(account.display_name, "alice@mail.com");
        assert_eq!(account.balance.to_string(), "1000.00");
    }

    #[test]
    fn test_duplicates_rejected_case_insensitively() {
        let service = service();
        service.open("bob", Some("Bob"), Some(Decimal::ZERO)).unwrap();
        let err = service.open("BOB", None, None).unwrap_err();
        assert!(matches!(err, Error::AccountExists(_)));
    }

    #[test]
    fn test_negative_opening_balance_rejected() {
        let service = service();
        let err = service.open("carol", None, Some(Decimal::new(-1, 0))).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        let err = service.open("carol", None, Some(Decimal::new(1005, 3))).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }
}
