//! Result and error types for the core library

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("User not found: {0}")]
    AccountNotFound(String),

    #[error("Insufficient Balance: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    /// The unit of work could not be acquired in time; safe to retry
    #[error("Ledger busy: {0}")]
    Contention(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Account already exists: {0}")]
    AccountExists(String),

    #[error("Transfer cancelled before commit")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Stable, loggable name for each error variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidAmount,
    AccountNotFound,
    InsufficientFunds,
    Contention,
    Storage,
    InvalidRequest,
    AccountExists,
    Cancelled,
    Config,
    Io,
    Json,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidAmount => "invalid_amount",
            ErrorKind::AccountNotFound => "account_not_found",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::Contention => "contention",
            ErrorKind::Storage => "storage",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::AccountExists => "account_exists",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Json => "json",
        }
    }
}

impl Error {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a not found error
    pub fn not_found(identity: impl Into<String>) -> Self {
        Self::AccountNotFound(identity.into())
    }

    /// Create a contention error
    pub fn contention(msg: impl Into<String>) -> Self {
        Self::Contention(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidAmount(_) => ErrorKind::InvalidAmount,
            Error::AccountNotFound(_) => ErrorKind::AccountNotFound,
            Error::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Error::Contention(_) => ErrorKind::Contention,
            Error::Storage(_) => ErrorKind::Storage,
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::AccountExists(_) => ErrorKind::AccountExists,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Config(_) => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
            Error::Json(_) => ErrorKind::Json,
        }
    }

    /// Only contention is worth retrying; the engine never retries itself
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Contention(_))
    }

    /// Caused by the request rather than by the infrastructure
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidAmount(_)
                | Error::AccountNotFound(_)
                | Error::InsufficientFunds { .. }
                | Error::InvalidRequest(_)
                | Error::AccountExists(_)
        )
    }

    /// Message shown to the person who made the request
    pub fn user_message(&self) -> String {
        match self {
            Error::InsufficientFunds { .. } => "Insufficient Balance".to_string(),
            Error::AccountNotFound(_) => "User not found".to_string(),
            Error::Contention(_) => "Ledger is busy, please retry".to_string(),
            Error::Storage(_) | Error::Io(_) | Error::Json(_) | Error::Config(_) => {
                "Payment could not be processed".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
