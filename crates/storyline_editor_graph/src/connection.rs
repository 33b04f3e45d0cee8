// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection (edge) definitions and the quest connection-record arena.

use crate::node::NodeId;
use crate::socket::SocketRef;
use indexmap::IndexMap;

/// Stable handle addressing one quest connection record in its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(pub u32);

/// Address of one persisted quest socket: owning node id plus socket name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuestSocketAddr {
    /// Persisted node id
    pub node: u16,
    /// Persisted socket name
    pub socket: String,
}

impl QuestSocketAddr {
    /// Create a new socket address
    pub fn new(node: u16, socket: impl Into<String>) -> Self {
        Self {
            node,
            socket: socket.into(),
        }
    }
}

/// One persisted quest connection record, referenced from both socket ends
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRecord {
    /// Output-side socket
    pub source: QuestSocketAddr,
    /// Input-side socket
    pub destination: QuestSocketAddr,
}

/// Arena of quest connection records addressed by stable integer handles.
///
/// Both sockets of a connection store the same handle; removing a connection
/// is one arena delete plus dropping the handle from the two socket lists.
/// Handles are never reused within a resource's lifetime.
#[derive(Debug, Clone, Default)]
pub struct ConnectionArena {
    records: IndexMap<ConnectionHandle, ConnectionRecord>,
    next: u32,
}

impl ConnectionArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record and return its handle
    pub fn insert(&mut self, record: ConnectionRecord) -> ConnectionHandle {
        let handle = ConnectionHandle(self.next);
        self.next += 1;
        self.records.insert(handle, record);
        handle
    }

    /// Remove a record
    pub fn remove(&mut self, handle: ConnectionHandle) -> Option<ConnectionRecord> {
        self.records.shift_remove(&handle)
    }

    /// Get a record by handle
    pub fn get(&self, handle: ConnectionHandle) -> Option<&ConnectionRecord> {
        self.records.get(&handle)
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the arena holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over live records
    pub fn iter(&self) -> impl Iterator<Item = (ConnectionHandle, &ConnectionRecord)> {
        self.records.iter().map(|(h, r)| (*h, r))
    }
}

/// A view-level connection between one output socket and one input socket.
///
/// For quest graphs it mirrors exactly one arena record; for scene graphs it
/// mirrors one destination descriptor held by the source socket, so `record`
/// is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    /// Output end
    pub source: SocketRef,
    /// Input end
    pub target: SocketRef,
    /// Backing quest connection record, if any
    pub record: Option<ConnectionHandle>,
}

impl Connection {
    /// Check if this connection touches a specific node
    pub fn involves_node(&self, node_id: NodeId) -> bool {
        self.source.node == node_id || self.target.node == node_id
    }

    /// Check if this connection touches a specific socket
    pub fn involves_socket(&self, socket_ref: SocketRef) -> bool {
        self.source == socket_ref || self.target == socket_ref
    }
}
