//! Opaque identifiers assigned by the remote service.
//!
//! The service hands out string ids (document ids on its side). The client
//! never parses them, it only compares and forwards them, so each kind gets
//! its own newtype to keep a user id from being passed where a conversation
//! id is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw id string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Raw id string.
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
                Self(id.to_owned())
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
    /// Identifier of a user account.
    UserId
);

string_id!(
    /// Identifier of a direct-message conversation.
    ConversationId
);

string_id!(
    /// Server-assigned identifier of a message.
    MessageId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = UserId::new("65f0c1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"65f0c1\"");

        let back: UserId = serde_json::from_str("\"65f0c1\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn display_is_raw_id() {
        assert_eq!(ConversationId::from("c1").to_string(), "c1");
    }
}
