//! Transfer record domain model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::amount::Amount;
use super::identity::Identity;
use super::result::{Error, Result};

/// Ledger-assigned record identifier, monotonically increasing
pub type RecordId = i64;

/// Outcome of resolving a recipient handle against known accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Recipient {
    /// The handle matched an internal account, which was credited
    Resolved(Identity),
    /// No account matched; funds left the ledger toward this handle
    External(String),
}

impl Recipient {
    /// The credited account, if the handle resolved
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Recipient::Resolved(identity) => Some(identity),
            Recipient::External(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Recipient::Resolved(_))
    }
}

/// Final status of a transfer attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    Success,
    Failed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Success => "Success",
            TransferStatus::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "Success" => Ok(TransferStatus::Success),
            "Failed" => Ok(TransferStatus::Failed),
            other => Err(Error::storage(format!("unknown transfer status '{}'", other))),
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transfer record that has not been appended yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransfer {
    pub amount: Amount,
    pub sender: Identity,
    pub recipient_name: String,
    pub recipient_handle: String,
    pub recipient: Recipient,
    pub status: TransferStatus,
    pub committed_at: DateTime<Utc>,
}

impl NewTransfer {
    /// Attach the ledger-assigned id
    pub fn into_record(self, id: RecordId) -> TransferRecord {
        TransferRecord {
            id,
            amount: self.amount,
            sender: self.sender,
            recipient_name: self.recipient_name,
            recipient_handle: self.recipient_handle,
            recipient: self.recipient,
            status: self.status,
            committed_at: self.committed_at,
        }
    }
}

/// An immutable ledger entry
///
/// Exactly one record exists per committed transfer, whether or not the
/// recipient handle resolved to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: RecordId,
    pub amount: Amount,
    pub sender: Identity,
    pub recipient_name: String,
    pub recipient_handle: String,
    pub recipient: Recipient,
    pub status: TransferStatus,
    pub committed_at: DateTime<Utc>,
}

impl TransferRecord {
    /// True if the identity paid or received funds in this transfer
    pub fn involves(&self, identity: &Identity) -> bool {
        &self.sender == identity || self.recipient.identity() == Some(identity)
    }
}
