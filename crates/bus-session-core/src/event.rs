//! Bus notifications delivered to listeners.

use serde::{Deserialize, Serialize};

use crate::types::{SessionId, TransportMask};

/// Notification emitted by a bus backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusEvent {
    /// A service advertising a name matching `name_prefix` appeared.
    FoundAdvertisedName {
        name: String,
        transport: TransportMask,
        name_prefix: String,
    },
    /// A previously found advertisement went away.
    LostAdvertisedName {
        name: String,
        transport: TransportMask,
        name_prefix: String,
    },
    /// Ownership of a bus name changed.
    NameOwnerChanged {
        bus_name: String,
        previous_owner: Option<String>,
        new_owner: Option<String>,
    },
    /// A joined session ended from the remote side.
    SessionLost {
        session_id: SessionId,
        reason: String,
    },
}

impl BusEvent {
    /// Short name for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::FoundAdvertisedName { .. } => "found_advertised_name",
            Self::LostAdvertisedName { .. } => "lost_advertised_name",
            Self::NameOwnerChanged { .. } => "name_owner_changed",
            Self::SessionLost { .. } => "session_lost",
        }
    }
}
