use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation token attached to a message at first dispatch.
///
/// The token travels with the message as out-of-band metadata so every later
/// lifecycle event can resolve the record created at dispatch time. It is
/// minted exactly once per logical message; redeliveries keep the original
/// token and are distinguished by their own stored records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStamp {
    id: String,
}

impl MonitorStamp {
    /// Mints a fresh globally-unique stamp.
    pub fn mint() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
        }
    }

    /// Rebuilds a stamp from a token received over the wire.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self { id: token.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}
