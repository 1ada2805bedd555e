//! Identifier types for the savings ledger
//!
//! Account, owner and pool identifiers are opaque strings handed to the core
//! by its callers (onboarding, the identity provider, the pool engine).
//! Transfer identifiers are ULIDs generated by the ledger itself.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Internal account identifier, or an opaque external endpoint token
    ///
    /// Transfers use this type for both `from` and `to`: an internal account,
    /// a pool id (for contributions) or a bank-link token are all opaque strings
    /// to the ledger.
    AccountId
);

string_id!(
    /// Authenticated user identity supplied by the identity provider
    OwnerId
);

string_id!(
    /// Savings pool identifier
    PoolId
);

impl PoolId {
    /// Generate a fresh, sortable pool id
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl From<&PoolId> for AccountId {
    fn from(pool: &PoolId) -> Self {
        AccountId(pool.0.clone())
    }
}

/// Transfer identifier
///
/// ULID-based: monotonic, sortable and generated without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(ulid::Ulid);

impl TransferId {
    /// Generate a new unique TransferId
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for TransferId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransferId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}
