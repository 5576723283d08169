//! Account domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::identity::Identity;

/// Largest balance the ledger stores, the top of DECIMAL(18,2)
pub fn max_balance() -> Decimal {
    Decimal::new(999_999_999_999_999_999, 2)
}

/// An account holder's balance, keyed by normalized identity
///
/// Accounts are created once at registration and afterwards only the
/// transfer engine changes `balance`. They are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub identity: Identity,
    pub display_name: String,
    /// Never negative outside an in-flight transfer
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with an opening balance
    pub fn new(identity: Identity, display_name: impl Into<String>, balance: Decimal) -> Self {
        Self {
            identity,
            display_name: display_name.into(),
            balance,
            created_at: Utc::now(),
        }
    }

    /// Validate account data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.balance.is_sign_negative() && !self.balance.is_zero() {
            return Err("opening balance cannot be negative");
        }
        if self.balance.normalize().scale() > super::amount::AMOUNT_SCALE {
            return Err("balance cannot have more than two decimal places");
        }
        if self.balance > max_balance() {
            return Err("balance exceeds the ledger maximum");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_validation() {
        let identity = Identity::parse("alice@example.com").unwrap();
        let mut account = Account::new(identity, "Alice", Decimal::new(100000, 2));
        assert!(account.validate().is_ok());

        account.balance = Decimal::new(-1, 2);
        assert!(account.validate().is_err());

        account.balance = Decimal::new(1, 3);
        assert!(account.validate().is_err());

        account.balance = max_balance();
        assert!(account.validate().is_ok());

        account.balance = Decimal::MAX;
        assert!(account.validate().is_err());
    }
}
