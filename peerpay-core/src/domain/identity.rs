//! Account identity - the canonical account key

use std::fmt;

use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Canonical account key
///
/// Handles are case-insensitive. Every lookup and mutation goes through
/// `Identity`, so the normalized (trimmed, lowercase) form is the only one
/// that ever reaches a store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Normalize a raw handle into an identity
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = Self::normalize(raw);
        if normalized.is_empty() {
            return Err(Error::invalid_request("identity cannot be empty"));
        }
        Ok(Self(normalized))
    }

    /// Canonical form of a handle: trimmed and lowercased
    pub fn normalize(raw: &str) -> String {
        raw.trim().to_lowercase()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identity {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}
