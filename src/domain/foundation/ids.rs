//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ValidationError;

/// Identifier of the account an entitlement belongs to.
///
/// Accounts are owned by the identity layer; this is an opaque, stable
/// string that we never parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Creates a new AccountId, returning error if empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::empty_field("account_id"));
        }
        Ok(Self(id))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_accepts_non_empty_string() {
        let id = AccountId::new("acct-123").unwrap();
        assert_eq!(id.as_str(), "acct-123");
        assert_eq!(id.to_string(), "acct-123");
    }

    #[test]
    fn account_id_rejects_empty_string() {
        match AccountId::new("") {
            Err(ValidationError::EmptyField { field }) => assert_eq!(field, "account_id"),
            other => panic!("expected EmptyField, got {:?}", other),
        }
    }

    #[test]
    fn account_id_rejects_whitespace() {
        assert!("   ".parse::<AccountId>().is_err());
    }

    #[test]
    fn account_id_serializes_transparently() {
        let id = AccountId::new("acct-9").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"acct-9\"");
    }
}
