use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc::Sender;

/// Identity a subscriber registers under: a hospital key or a connection UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SubscriberId {
    fn from(identity: String) -> Self {
        Self(identity)
    }
}

impl From<&str> for SubscriberId {
    fn from(identity: &str) -> Self {
        Self(identity.to_string())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a single stream connection (server-generated).
///
/// Two connections subscribing under the same identity get different
/// `ConnectionId`s, which lets the registry tell a superseded connection's
/// late cleanup apart from the live entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry entry for one live subscriber.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub connection_id: ConnectionId,
    /// Fan-out group (hospital key) this subscriber listens to, if any.
    pub group: Option<String>,
    pub sender: Sender<Bytes>,
}

/// Mapping from subscriber identity to its outbound channel.
///
/// Holds at most one entry per identity. It is owned and mutated exclusively by
/// the hub loop, so it needs no interior locking.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<SubscriberId, ConnectionInfo>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `identity`. Returns the superseded entry;
    /// dropping it releases the old channel without waiting on its reader.
    pub fn register(
        &mut self,
        identity: SubscriberId,
        info: ConnectionInfo,
    ) -> Option<ConnectionInfo> {
        self.connections.insert(identity, info)
    }

    /// Remove the entry for `identity` if it still belongs to `connection_id`.
    /// A no-op when the identity is absent or was taken over by a newer connection.
    pub fn unregister(
        &mut self,
        identity: &SubscriberId,
        connection_id: &ConnectionId,
    ) -> Option<ConnectionInfo> {
        match self.connections.get(identity) {
            Some(info) if info.connection_id == *connection_id => {
                self.connections.remove(identity)
            }
            _ => None,
        }
    }

    pub fn lookup(&self, identity: &SubscriberId) -> Option<&ConnectionInfo> {
        self.connections.get(identity)
    }

    pub fn all(&self) -> impl Iterator<Item = (&SubscriberId, &ConnectionInfo)> {
        self.connections.iter()
    }

    pub fn in_group<'a>(
        &'a self,
        group_key: &'a str,
    ) -> impl Iterator<Item = (&'a SubscriberId, &'a ConnectionInfo)> + 'a {
        self.connections
            .iter()
            .filter(move |(_, info)| info.group.as_deref() == Some(group_key))
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
