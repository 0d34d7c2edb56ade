//! Newtypes around Discord's string snowflake IDs.
//!
//! Discord transmits every entity ID as an opaque decimal string; these
//! wrappers keep the IDs apart at the type level without re-interpreting
//! their contents.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

macro_rules! impl_id {
    ($(#[$attr:meta])* $Id:ident) => {
        $(#[$attr])*
        #[derive(Clone, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
        #[serde(transparent)]
        pub struct $Id(String);

        impl $Id {
            /// Views this ID as its wire-format string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the ID carries no value at all.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl Display for $Id {
            fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
                Display::fmt(&self.0, f)
            }
        }

        impl From<String> for $Id {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $Id {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $Id {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_id! {
    /// ID of a Discord voice/text channel.
    ChannelId
}
impl_id! {
    /// ID of a Discord guild (colloquially, "server").
    GuildId
}
impl_id! {
    /// ID of a Discord user.
    UserId
}
impl_id! {
    /// ID of a message within a channel.
    MessageId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_as_plain_strings() {
        let id: UserId = serde_json::from_str("\"80351110224678912\"").unwrap();
        assert_eq!(id.as_str(), "80351110224678912");
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"80351110224678912\""
        );
    }
}
