//! Transfer amount - positive, two-decimal money value

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Number of fractional digits an amount may carry
pub const AMOUNT_SCALE: u32 = 2;

/// A strictly positive amount with at most two fractional digits
///
/// Trailing zeros are not precision: `1.000` is accepted and stored as
/// `1.00`, while `1.001` is rejected. Amounts are never rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    /// Validate a decimal value as a transfer amount
    pub fn new(value: Decimal) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(Error::InvalidAmount(format!(
                "amount must be greater than zero, got {}",
                value
            )));
        }
        let mut canonical = value.normalize();
        if canonical.scale() > AMOUNT_SCALE {
            return Err(Error::InvalidAmount(format!(
                "amount {} has more than {} decimal places",
                value, AMOUNT_SCALE
            )));
        }
        canonical.rescale(AMOUNT_SCALE);
        Ok(Self(canonical))
    }

    /// Parse a decimal string such as "250.50"
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let value = Decimal::from_str_exact(trimmed)
            .map_err(|_| Error::InvalidAmount(format!("'{}' is not a decimal amount", trimmed)))?;
        Self::new(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// The signed delta that debits this amount
    pub fn debit(&self) -> Decimal {
        -self.0
    }

    /// The signed delta that credits this amount
    pub fn credit(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = Error;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}
