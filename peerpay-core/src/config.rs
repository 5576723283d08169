//! Configuration management
//!
//! Settings live in `<data_dir>/settings.json`:
//! ```json
//! {
//!   "ledger": {
//!     "lockTimeoutMs": 2000,
//!     "defaultOpeningBalance": "1000.00",
//!     "databaseFile": "peerpay.duckdb"
//!   }
//! }
//! ```
//! Fields this crate does not manage are kept as-is when saving.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::adapters::duckdb::DEFAULT_LOCK_TIMEOUT;
use crate::domain::result::{Error, Result};

const SETTINGS_FILE: &str = "settings.json";
pub const LOCK_TIMEOUT_ENV: &str = "PEERPAY_LOCK_TIMEOUT_MS";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    ledger: LedgerSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lock_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_opening_balance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    database_file: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Ledger configuration (resolved view of settings)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Longest a transfer waits for its unit of work
    pub lock_timeout: Duration,
    /// Balance given to accounts opened without an explicit one
    pub default_opening_balance: Decimal,
    /// Ledger database file name, relative to the data directory
    pub database_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            default_opening_balance: Decimal::new(100000, 2),
            database_file: "peerpay.duckdb".to_string(),
        }
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// The lock timeout can be overridden with PEERPAY_LOCK_TIMEOUT_MS.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let raw = read_settings(data_dir)?;
        let defaults = Config::default();

        let lock_timeout_ms = match std::env::var(LOCK_TIMEOUT_ENV) {
            Ok(value) => Some(value.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!("{} must be a whole number of milliseconds", LOCK_TIMEOUT_ENV))
            })?),
            Err(_) => raw.ledger.lock_timeout_ms,
        };

        let default_opening_balance = match &raw.ledger.default_opening_balance {
            Some(text) => parse_opening_balance(text)?,
            None => defaults.default_opening_balance,
        };

        let database_file = match raw.ledger.database_file {
            Some(name) if name.trim().is_empty() => {
                return Err(Error::Config("databaseFile cannot be empty".to_string()))
            }
            Some(name) => name,
            None => defaults.database_file,
        };

        Ok(Self {
            lock_timeout: lock_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.lock_timeout),
            default_opening_balance,
            database_file,
        })
    }

    /// Save config to the data directory
    /// Preserves other settings that this crate doesn't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let mut settings = read_settings(data_dir)?;

        settings.ledger.lock_timeout_ms = Some(self.lock_timeout.as_millis() as u64);
        settings.ledger.default_opening_balance = Some(self.default_opening_balance.to_string());
        settings.ledger.database_file = Some(self.database_file.clone());

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(data_dir.join(SETTINGS_FILE), content)?;
        Ok(())
    }
}

fn read_settings(data_dir: &Path) -> Result<SettingsFile> {
    let settings_path = data_dir.join(SETTINGS_FILE);
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", settings_path.display(), e)))
}

fn parse_opening_balance(text: &str) -> Result<Decimal> {
    let value = Decimal::from_str(text.trim())
        .map_err(|_| Error::Config(format!("defaultOpeningBalance '{}' is not a number", text)))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(Error::Config("defaultOpeningBalance cannot be negative".to_string()));
    }
    if value.normalize().scale() > crate::domain::AMOUNT_SCALE {
        return Err(Error::Config(
            "defaultOpeningBalance cannot have more than two decimal places".to_string(),
        ));
    }
    if value > crate::domain::max_balance() {
        return Err(Error::Config(
            "defaultOpeningBalance exceeds the ledger maximum".to_string(),
        ));
    }
    Ok(value)
}
