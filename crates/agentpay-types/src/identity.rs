//! Identity newtypes for AgentPay
//!
//! Sessions, principals, agents, and transactions each get their own UUID
//! wrapper so ids of different kinds cannot be swapped at a call site. The
//! display form carries a short prefix (`session_…`, `agent_…`) and parsing
//! accepts the prefixed and bare forms alike.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Declares one prefixed UUID newtype with its common impls
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// A fresh random id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// The underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bare = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Uuid::parse_str(bare).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id_type!(SessionId, "session", "Unique identifier for a spending session");
define_id_type!(PrincipalId, "principal", "Unique identifier for a delegating principal");
define_id_type!(AgentId, "agent", "Unique identifier for an autonomous agent");
define_id_type!(TransactionId, "tx", "Unique identifier for a transaction record");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_prefix() {
        assert!(SessionId::new().to_string().starts_with("session_"));
        assert!(TransactionId::new().to_string().starts_with("tx_"));
    }

    #[test]
    fn test_roundtrip_through_display() {
        let id = AgentId::new();
        let parsed: AgentId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parses_bare_uuid() {
        let id = TransactionId::new();
        let parsed: TransactionId = id.0.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!("session_not-a-uuid".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_same_uuid_same_id() {
        let uuid = Uuid::new_v4();
        assert_eq!(PrincipalId::from_uuid(uuid), PrincipalId::from_uuid(uuid));
    }
}
