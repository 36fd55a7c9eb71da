//! Identifiers for tokens, projects, users, and templates
//!
//! All ids are ULIDs so store rows sort by creation time.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use ulid::Ulid;

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Ulid);

        impl $name {
            /// Generate a fresh id
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ulid::from_string(s)
                    .map(Self)
                    .map_err(|e| ModelError::InvalidId(format!("{s}: {e}")))
            }
        }
    };
}

ulid_id!(
    /// Token identifier
    TokenId
);
ulid_id!(
    /// Owning project identifier
    ProjectId
);
ulid_id!(
    /// Deploying user identifier
    UserId
);
ulid_id!(
    /// Stored configuration template identifier
    TemplateId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_roundtrips_through_string() {
        let id = TokenId::new();
        let parsed = TokenId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn invalid_id_is_rejected() {
        let err = ProjectId::from_str("not-a-ulid").unwrap_err();
        assert!(matches!(err, ModelError::InvalidId(_)));
    }

    #[test]
    fn id_serializes_as_plain_string() {
        let id = UserId::new();
        let value = serde_json::to_value(id).unwrap();
        assert_eq!(value, serde_json::Value::String(id.to_string()));
    }
}
