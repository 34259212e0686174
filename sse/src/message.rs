use crate::connection::SubscriberId;
use bytes::Bytes;

/// Which subscribers a notification is fanned out to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageScope {
    /// Send to every registered subscriber
    Broadcast,
    /// Send to every subscriber registered in the group (e.g. a hospital key)
    Group { group_key: String },
    /// Send to the single subscriber registered under this identity
    Identity { identity: SubscriberId },
}

/// A message destined for one, some, or all subscribers.
///
/// The payload is pre-serialized (typically JSON) and is written to each
/// stream unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub scope: MessageScope,
    pub payload: Bytes,
}

impl Notification {
    pub fn broadcast(payload: impl Into<Bytes>) -> Self {
        Self {
            scope: MessageScope::Broadcast,
            payload: payload.into(),
        }
    }

    pub fn to_group(group_key: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            scope: MessageScope::Group {
                group_key: group_key.into(),
            },
            payload: payload.into(),
        }
    }

    pub fn to_identity(identity: impl Into<SubscriberId>, payload: impl Into<Bytes>) -> Self {
        Self {
            scope: MessageScope::Identity {
                identity: identity.into(),
            },
            payload: payload.into(),
        }
    }
}
