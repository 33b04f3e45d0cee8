// SPDX-License-Identifier: MIT OR Apache-2.0
//! The per-graph-kind editing engine.
//!
//! A [`Graph`] keeps two representations in lock-step: the persisted resource
//! document (shared with the rest of the editor through `Rc<RefCell<_>>`
//! handles) and the transient view graph of wrapped nodes, sockets and
//! connections. Every structural mutation updates both as one synchronous
//! step; the model is single-threaded by design.

use crate::catalog::{GraphKind, NodeCatalog, NodePayload};
use crate::connection::{Connection, ConnectionRecord, QuestSocketAddr};
use crate::graphs::quest::{QuestNodeData, QuestNodePayload, QuestPhaseResource, QuestSocketData};
use crate::graphs::scene::{
    SceneDestination, SceneNodeData, SceneNodePayload, SceneOutputSocketData, SceneResource,
};
use crate::layout::{self, Rect, ViewportState};
use crate::layout_store::{GraphLayout, LayoutStore, LayoutStoreError, NodeLayout};
use crate::node::{GraphNode, NodeId, Point, Size};
use crate::socket::{SocketDirection, SocketRef};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Error raised by graph mutation operations
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The kind token is not registered in the catalog
    #[error("unknown node kind: {0}")]
    UnknownKind(String),

    /// The kind token belongs to the other graph kind
    #[error("node kind {kind} cannot be placed in a {family:?} graph")]
    KindMismatch {
        /// Offending kind token
        kind: String,
        /// Kind of the graph the placement targeted
        family: GraphKind,
    },

    /// Node not found
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// A persisted socket the operation relies on does not exist
    #[error("socket {name:?} not found on node {node}")]
    SocketNotFound {
        /// Owning node
        node: NodeId,
        /// Socket name
        name: String,
    },

    /// A socket reference does not resolve against the view graph
    #[error("socket reference out of range: {0:?}")]
    InvalidSocketRef(SocketRef),

    /// The socket has the wrong direction for its role in the operation
    #[error("expected an {expected:?} socket")]
    WrongDirection {
        /// Direction the operation requires
        expected: SocketDirection,
    },

    /// Connection index out of range
    #[error("connection {0} does not exist")]
    ConnectionNotFound(usize),

    /// `complete_connection` called with no pending connection
    #[error("no pending connection to complete")]
    NoPendingConnection,

    /// The node kind does not grow sockets of this direction on demand
    #[error("node {0} does not accept additional {1:?} sockets")]
    NotDynamic(NodeId, SocketDirection),

    /// Socket recalculation attempted on a graph kind without support for it
    #[error("socket recalculation is not supported for {0:?} graphs")]
    RecalculateUnsupported(GraphKind),
}

/// Outcome of completing a pending connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A new connection was created
    Connected,
    /// The sockets were already wired; the existing connection was removed
    Removed,
    /// The drop target could not take part in a connection
    Ignored,
}

/// Drop target of a pending connection
#[derive(Debug, Clone, Copy)]
pub enum PendingTarget {
    /// Dropped on a concrete socket
    Socket(SocketRef),
    /// Dropped on a node body; dynamic nodes grow the missing socket
    Node(NodeId),
}

/// Where a phase node's nested graph lives, if anywhere
pub(crate) enum NestedPhase {
    /// The phase references an external file; navigation is deferred
    External(String),
    /// The phase graph is embedded in the current document
    Embedded(Rc<RefCell<QuestPhaseResource>>),
    /// The node is not a nested phase
    NotNested,
}

/// Persisted-side state, tagged by graph kind
#[derive(Debug)]
enum GraphData {
    /// Quest phase: 16-bit monotonically increasing node ids
    Quest {
        resource: Rc<RefCell<QuestPhaseResource>>,
        next_id: u16,
    },
    /// Scene: 32-bit ids owned by the persisted nodes
    Scene {
        resource: Rc<RefCell<SceneResource>>,
        next_id: u32,
    },
}

/// Owned handle on one kind's resource, detached from the graph borrow
enum ResourceRef {
    Quest(Rc<RefCell<QuestPhaseResource>>),
    Scene(Rc<RefCell<SceneResource>>),
}

impl GraphData {
    fn kind(&self) -> GraphKind {
        match self {
            Self::Quest { .. } => GraphKind::Quest,
            Self::Scene { .. } => GraphKind::Scene,
        }
    }

    fn resource(&self) -> ResourceRef {
        match self {
            Self::Quest { resource, .. } => ResourceRef::Quest(Rc::clone(resource)),
            Self::Scene { resource, .. } => ResourceRef::Scene(Rc::clone(resource)),
        }
    }
}

/// The editable view over one persisted narrative graph
pub struct Graph {
    title: String,
    data: GraphData,
    catalog: Rc<NodeCatalog>,
    nodes: IndexMap<NodeId, GraphNode>,
    connections: Vec<Connection>,
    pending: Option<SocketRef>,
    viewport: ViewportState,
    store: Option<LayoutStore>,
    layout_loaded: bool,
    allow_save: bool,
}

impl Graph {
    /// Create an editing view over a quest phase resource
    pub fn quest(
        title: impl Into<String>,
        resource: Rc<RefCell<QuestPhaseResource>>,
        catalog: Rc<NodeCatalog>,
    ) -> Self {
        Self::new(
            title,
            GraphData::Quest {
                resource,
                next_id: 0,
            },
            catalog,
        )
    }

    /// Create an editing view over a scene resource
    pub fn scene(
        title: impl Into<String>,
        resource: Rc<RefCell<SceneResource>>,
        catalog: Rc<NodeCatalog>,
    ) -> Self {
        Self::new(
            title,
            GraphData::Scene {
                resource,
                next_id: 0,
            },
            catalog,
        )
    }

    fn new(title: impl Into<String>, data: GraphData, catalog: Rc<NodeCatalog>) -> Self {
        Self {
            title: title.into(),
            data,
            catalog,
            nodes: IndexMap::new(),
            connections: Vec::new(),
            pending: None,
            viewport: ViewportState::default(),
            store: None,
            layout_loaded: false,
            allow_save: false,
        }
    }

    /// Attach the layout store this graph persists its layout through
    pub fn with_layout_store(mut self, store: LayoutStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Graph title, usually the document header
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Which of the two topologies this graph edits
    pub fn kind(&self) -> GraphKind {
        self.data.kind()
    }

    /// Get a view node by id
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    /// Iterate over all view nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Number of view nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All view connections
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Number of view connections
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Current viewport transform
    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    /// Inform the graph of the host view's size, used for fitting
    pub fn set_viewport_size(&mut self, size: Size) {
        self.viewport.size = size;
    }

    /// The quest resource handle, if this is a quest graph.
    ///
    /// This is the boundary the document property editor mutates persisted
    /// node state through; call [`crate::reconcile`]'s entry point afterwards
    /// when the edit changed a node's socket shape.
    pub fn quest_resource(&self) -> Option<Rc<RefCell<QuestPhaseResource>>> {
        match &self.data {
            GraphData::Quest { resource, .. } => Some(Rc::clone(resource)),
            GraphData::Scene { .. } => None,
        }
    }

    /// The scene resource handle, if this is a scene graph
    pub fn scene_resource(&self) -> Option<Rc<RefCell<SceneResource>>> {
        match &self.data {
            GraphData::Scene { resource, .. } => Some(Rc::clone(resource)),
            GraphData::Quest { .. } => None,
        }
    }

    pub(crate) fn catalog(&self) -> Rc<NodeCatalog> {
        Rc::clone(&self.catalog)
    }

    /// Kind descriptors compatible with this graph, in catalog order
    pub fn node_types(&self) -> impl Iterator<Item = &crate::catalog::NodeKindSpec> {
        self.catalog
            .kinds_for(self.kind())
            .iter()
            .filter_map(|token| self.catalog.get(token))
    }

    /// UI display name for one of this graph's kind tokens
    pub fn clean_kind_name<'a>(&self, token: &'a str) -> &'a str {
        NodeCatalog::display_name(token)
    }

    // ── Generation ──────────────────────────────────────────────────────

    /// One-shot load of the persisted graph into wrapped nodes and
    /// connections. Structural inconsistencies in the document are recovered
    /// locally: the offending node or connection is skipped with a
    /// diagnostic and loading continues.
    pub fn generate_graph(&mut self) {
        match self.data.resource() {
            ResourceRef::Quest(resource) => self.generate_quest(&resource),
            ResourceRef::Scene(resource) => self.generate_scene(&resource),
        }
    }

    fn generate_quest(&mut self, resource: &Rc<RefCell<QuestPhaseResource>>) {
        let mut res = resource.borrow_mut();
        if res.nodes.is_empty() {
            tracing::debug!("quest {:?} does not have any existing graph", self.title);
            return;
        }

        let mut max_id: u16 = 0;
        let mut input_lookup: HashMap<(u16, String), SocketRef> = HashMap::new();
        for node_data in &mut res.nodes {
            max_id = max_id.max(node_data.id);

            let id = NodeId(u32::from(node_data.id));
            if self.nodes.contains_key(&id) {
                tracing::warn!(
                    "duplicate node id {id} in {:?}; some nodes may be missing from the view",
                    self.title
                );
                continue;
            }

            let (inputs, outputs) = node_data.generate_sockets();
            let mut node = GraphNode::new(id, node_data.kind_token.clone());
            node.inputs = inputs;
            node.outputs = outputs;
            for (index, socket) in node.inputs.iter().enumerate() {
                input_lookup.insert((node_data.id, socket.name.clone()), SocketRef::input(id, index));
            }
            self.nodes.insert(id, node);
        }

        // Resolve every output-side record into a view connection. Records
        // are reachable from both ends; walking outputs visits each once.
        for (id, node) in &self.nodes {
            let pid = id.0 as u16;
            let Some(node_data) = res.node(pid) else {
                continue;
            };
            for (out_index, socket) in node.outputs.iter().enumerate() {
                let Some(socket_data) = node_data.socket(&socket.name, SocketDirection::Output)
                else {
                    continue;
                };
                for &handle in &socket_data.connections {
                    let Some(record) = res.connections.get(handle) else {
                        tracing::warn!(
                            "connection record {handle:?} is missing from the arena in {:?}; skipping",
                            self.title
                        );
                        continue;
                    };
                    let key = (record.destination.node, record.destination.socket.clone());
                    let Some(&target) = input_lookup.get(&key) else {
                        tracing::error!(
                            "connection destination {}:{} does not exist in {:?}; skipping",
                            record.destination.node,
                            record.destination.socket,
                            self.title
                        );
                        continue;
                    };
                    self.connections.push(Connection {
                        source: SocketRef::output(*id, out_index),
                        target,
                        record: Some(handle),
                    });
                }
            }
        }

        if let GraphData::Quest { next_id, .. } = &mut self.data {
            *next_id = max_id;
        }
    }

    fn generate_scene(&mut self, resource: &Rc<RefCell<SceneResource>>) {
        let mut res = resource.borrow_mut();
        if res.graph.is_empty() {
            tracing::debug!("scene {:?} does not have any existing graph", self.title);
            return;
        }

        let mut max_id: u32 = 0;
        for node_data in &mut res.graph {
            let id = NodeId(node_data.id);
            if self.nodes.contains_key(&id) {
                tracing::warn!(
                    "duplicate node id {id} in {:?}; some nodes may be missing from the view",
                    self.title
                );
                continue;
            }
            max_id = max_id.max(node_data.id);

            let (inputs, outputs) = node_data.generate_sockets();
            let mut node = GraphNode::new(id, node_data.kind_token.clone());
            node.inputs = inputs;
            node.outputs = outputs;
            self.nodes.insert(id, node);
        }

        let mut destinations: Vec<(NodeId, usize, u32, u32)> = Vec::new();
        for (id, node) in &self.nodes {
            let Some(node_data) = res.node(id.0) else {
                continue;
            };
            for (out_index, socket) in node.outputs.iter().enumerate() {
                let Some(socket_data) = node_data.outputs.iter().find(|o| o.name == socket.name)
                else {
                    continue;
                };
                for dest in &socket_data.destinations {
                    destinations.push((*id, out_index, dest.node_id, dest.ordinal));
                }
            }
        }

        for (source_id, out_index, dest_id, ordinal) in destinations {
            let dynamic_input = res
                .node(dest_id)
                .is_some_and(|n| n.payload.dynamic_input());
            let target_id = NodeId(dest_id);
            let Some(target_node) = self.nodes.get_mut(&target_id) else {
                tracing::error!(
                    "node id {dest_id} is missing in {:?}; delete all existing connections to this node id",
                    self.title
                );
                continue;
            };

            if dynamic_input {
                while target_node.inputs.len() <= ordinal as usize {
                    target_node.add_input();
                }
            }

            if ordinal as usize >= target_node.inputs.len() {
                tracing::warn!(
                    "destination ordinal {ordinal} of node {source_id} is higher than node {target_id} input max ordinal {} in {:?}; skipping",
                    target_node.inputs.len().saturating_sub(1),
                    self.title
                );
                continue;
            }

            target_node.inputs[ordinal as usize].connected = true;
            self.connections.push(Connection {
                source: SocketRef::output(source_id, out_index),
                target: SocketRef::input(target_id, ordinal as usize),
                record: None,
            });
        }

        if let GraphData::Scene { next_id, .. } = &mut self.data {
            *next_id = max_id;
        }
    }

    // ── Connections ─────────────────────────────────────────────────────

    /// Wire an output socket to an input socket, mutating view and persisted
    /// representations as one step
    pub fn add_connection(&mut self, source: SocketRef, target: SocketRef) -> Result<(), GraphError> {
        if source.direction != SocketDirection::Output {
            return Err(GraphError::WrongDirection {
                expected: SocketDirection::Output,
            });
        }
        if target.direction != SocketDirection::Input {
            return Err(GraphError::WrongDirection {
                expected: SocketDirection::Input,
            });
        }
        let source_name = self.resolve_socket(source)?.name.clone();
        let target_name = self.resolve_socket(target)?.name.clone();

        match self.data.resource() {
            ResourceRef::Quest(resource) => {
                let src_pid = source.node.0 as u16;
                let tgt_pid = target.node.0 as u16;
                let mut res = resource.borrow_mut();
                if res
                    .node(src_pid)
                    .and_then(|n| n.socket(&source_name, SocketDirection::Output))
                    .is_none()
                {
                    return Err(GraphError::SocketNotFound {
                        node: source.node,
                        name: source_name,
                    });
                }
                if res
                    .node(tgt_pid)
                    .and_then(|n| n.socket(&target_name, SocketDirection::Input))
                    .is_none()
                {
                    return Err(GraphError::SocketNotFound {
                        node: target.node,
                        name: target_name,
                    });
                }

                let handle = res.connections.insert(ConnectionRecord {
                    source: QuestSocketAddr::new(src_pid, source_name.clone()),
                    destination: QuestSocketAddr::new(tgt_pid, target_name.clone()),
                });
                if let Some(socket) = res
                    .node_mut(src_pid)
                    .and_then(|n| n.socket_mut(&source_name, SocketDirection::Output))
                {
                    socket.connections.push(handle);
                }
                if let Some(socket) = res
                    .node_mut(tgt_pid)
                    .and_then(|n| n.socket_mut(&target_name, SocketDirection::Input))
                {
                    socket.connections.push(handle);
                }
                drop(res);

                self.connections.push(Connection {
                    source,
                    target,
                    record: Some(handle),
                });
            }
            ResourceRef::Scene(resource) => {
                let mut res = resource.borrow_mut();
                let socket = res
                    .node_mut(source.node.0)
                    .ok_or(GraphError::NodeNotFound(source.node))?
                    .output_mut(&source_name)
                    .ok_or(GraphError::SocketNotFound {
                        node: source.node,
                        name: source_name,
                    })?;
                socket.destinations.push(SceneDestination {
                    node_id: target.node.0,
                    ordinal: target.index as u32,
                });
                drop(res);

                self.connections.push(Connection {
                    source,
                    target,
                    record: None,
                });
            }
        }

        self.set_socket_connected(source, true);
        self.set_socket_connected(target, true);
        Ok(())
    }

    /// Remove the connection at the given index, detaching it from the
    /// persisted representation and recomputing both endpoints' connected
    /// flags
    pub fn remove_connection(&mut self, index: usize) -> Result<Connection, GraphError> {
        if index >= self.connections.len() {
            return Err(GraphError::ConnectionNotFound(index));
        }
        let connection = self.connections.remove(index);

        match self.data.resource() {
            ResourceRef::Quest(resource) => {
                let mut res = resource.borrow_mut();
                if let Some(handle) = connection.record {
                    res.connections.remove(handle);

                    // A structural edit may already have replaced either
                    // node's socket list; tolerate absent sockets.
                    let source_name = self.socket_name(connection.source);
                    let target_name = self.socket_name(connection.target);
                    let mut source_connected = false;
                    let mut target_connected = false;
                    if let Some(name) = &source_name {
                        if let Some(socket) = res
                            .node_mut(connection.source.node.0 as u16)
                            .and_then(|n| n.socket_mut(name, SocketDirection::Output))
                        {
                            socket.connections.retain(|h| *h != handle);
                            source_connected = !socket.connections.is_empty();
                        }
                    }
                    if let Some(name) = &target_name {
                        if let Some(socket) = res
                            .node_mut(connection.target.node.0 as u16)
                            .and_then(|n| n.socket_mut(name, SocketDirection::Input))
                        {
                            socket.connections.retain(|h| *h != handle);
                            target_connected = !socket.connections.is_empty();
                        }
                    }
                    drop(res);

                    self.set_socket_connected(connection.source, source_connected);
                    self.set_socket_connected(connection.target, target_connected);
                }
            }
            ResourceRef::Scene(resource) => {
                let mut res = resource.borrow_mut();
                let mut source_connected = false;
                if let Some(name) = self.socket_name(connection.source) {
                    if let Some(socket) = res
                        .node_mut(connection.source.node.0)
                        .and_then(|n| n.output_mut(&name))
                    {
                        let descriptor = SceneDestination {
                            node_id: connection.target.node.0,
                            ordinal: connection.target.index as u32,
                        };
                        if let Some(pos) =
                            socket.destinations.iter().rposition(|d| *d == descriptor)
                        {
                            socket.destinations.remove(pos);
                        }
                        source_connected = !socket.destinations.is_empty();
                    }
                }
                // Inputs hold no back-list; derive the flag by scanning every
                // node's outputs.
                let target_connected = res
                    .input_is_connected(connection.target.node.0, connection.target.index as u32);
                drop(res);

                self.set_socket_connected(connection.source, source_connected);
                self.set_socket_connected(connection.target, target_connected);
            }
        }

        Ok(connection)
    }

    /// Remove every connection touching the given socket
    pub fn disconnect_socket(&mut self, socket: SocketRef) -> Result<(), GraphError> {
        for index in (0..self.connections.len()).rev() {
            if self.connections[index].involves_socket(socket) {
                self.remove_connection(index)?;
            }
        }
        Ok(())
    }

    /// Find the index of the connection between two sockets, if present
    pub fn find_connection(&self, source: SocketRef, target: SocketRef) -> Option<usize> {
        self.connections
            .iter()
            .position(|c| c.source == source && c.target == target)
    }

    // ── Pending connection ──────────────────────────────────────────────

    /// Begin an in-progress wire from the given socket
    pub fn start_connection(&mut self, source: SocketRef) -> Result<(), GraphError> {
        self.resolve_socket(source)?;
        self.pending = Some(source);
        Ok(())
    }

    /// The in-progress wire's source, if one is being drawn
    pub fn pending_connection(&self) -> Option<SocketRef> {
        self.pending
    }

    /// Abandon the in-progress wire
    pub fn cancel_connection(&mut self) {
        self.pending = None;
    }

    /// Complete the in-progress wire on a drop target.
    ///
    /// Dropping on a dynamic node's body grows the missing socket first;
    /// dropping on an already-wired socket pair removes that connection
    /// instead of duplicating it.
    pub fn complete_connection(&mut self, target: PendingTarget) -> Result<ConnectOutcome, GraphError> {
        let source = self.pending.take().ok_or(GraphError::NoPendingConnection)?;
        let target = match target {
            PendingTarget::Socket(socket) => socket,
            PendingTarget::Node(node) => match source.direction.opposite() {
                SocketDirection::Input => self.grow_input(node)?,
                SocketDirection::Output => self.grow_output(node)?,
            },
        };

        if source.direction == target.direction {
            return Ok(ConnectOutcome::Ignored);
        }
        let (output, input) = if source.direction == SocketDirection::Output {
            (source, target)
        } else {
            (target, source)
        };

        if let Some(index) = self.find_connection(output, input) {
            self.remove_connection(index)?;
            return Ok(ConnectOutcome::Removed);
        }
        self.add_connection(output, input)?;
        Ok(ConnectOutcome::Connected)
    }

    /// Grow one input socket on a dynamic-input node
    pub fn grow_input(&mut self, node: NodeId) -> Result<SocketRef, GraphError> {
        match self.data.resource() {
            ResourceRef::Quest(resource) => {
                let mut res = resource.borrow_mut();
                let node_data = res
                    .node_mut(node.0 as u16)
                    .ok_or(GraphError::NodeNotFound(node))?;
                if !node_data.payload.dynamic_input() {
                    return Err(GraphError::NotDynamic(node, SocketDirection::Input));
                }
                let count = node_data
                    .sockets
                    .iter()
                    .filter(|s| s.direction == SocketDirection::Input)
                    .count();
                node_data
                    .sockets
                    .push(QuestSocketData::new(format!("In{count}"), SocketDirection::Input));
            }
            ResourceRef::Scene(resource) => {
                // Scene inputs are implied by ordinal; growth is view-only.
                let res = resource.borrow();
                let node_data = res.node(node.0).ok_or(GraphError::NodeNotFound(node))?;
                if !node_data.payload.dynamic_input() {
                    return Err(GraphError::NotDynamic(node, SocketDirection::Input));
                }
            }
        }
        let view = self
            .nodes
            .get_mut(&node)
            .ok_or(GraphError::NodeNotFound(node))?;
        Ok(view.add_input())
    }

    /// Grow one output socket on a dynamic-output node
    pub fn grow_output(&mut self, node: NodeId) -> Result<SocketRef, GraphError> {
        match self.data.resource() {
            ResourceRef::Quest(resource) => {
                let mut res = resource.borrow_mut();
                let node_data = res
                    .node_mut(node.0 as u16)
                    .ok_or(GraphError::NodeNotFound(node))?;
                if !node_data.payload.dynamic_output() {
                    return Err(GraphError::NotDynamic(node, SocketDirection::Output));
                }
                let count = node_data
                    .sockets
                    .iter()
                    .filter(|s| s.direction == SocketDirection::Output)
                    .count();
                node_data
                    .sockets
                    .push(QuestSocketData::new(format!("Out{count}"), SocketDirection::Output));
            }
            ResourceRef::Scene(resource) => {
                let mut res = resource.borrow_mut();
                let node_data = res.node_mut(node.0).ok_or(GraphError::NodeNotFound(node))?;
                if !node_data.payload.dynamic_output() {
                    return Err(GraphError::NotDynamic(node, SocketDirection::Output));
                }
                let count = node_data.outputs.len();
                node_data
                    .outputs
                    .push(SceneOutputSocketData::new(format!("Out{count}")));
            }
        }
        let view = self
            .nodes
            .get_mut(&node)
            .ok_or(GraphError::NodeNotFound(node))?;
        Ok(view.add_output())
    }

    // ── Nodes ───────────────────────────────────────────────────────────

    /// Instantiate a new persisted node of the requested kind, wrap it and
    /// insert it into both representations
    pub fn create_node(&mut self, token: &str, position: Point) -> Result<NodeId, GraphError> {
        let spec = self
            .catalog
            .get(token)
            .ok_or_else(|| GraphError::UnknownKind(token.to_owned()))?;
        match spec.instantiate() {
            NodePayload::Quest(payload) => self.create_quest_node(token, payload, position),
            NodePayload::Scene(payload) => self.create_scene_node(token, payload, position),
        }
    }

    fn create_quest_node(
        &mut self,
        token: &str,
        payload: QuestNodePayload,
        position: Point,
    ) -> Result<NodeId, GraphError> {
        let family = self.kind();
        let GraphData::Quest { resource, next_id } = &mut self.data else {
            return Err(GraphError::KindMismatch {
                kind: token.to_owned(),
                family,
            });
        };
        let resource = Rc::clone(resource);
        *next_id += 1;
        let pid = *next_id;

        let mut node_data = QuestNodeData::new(pid, token, payload);
        node_data.create_default_sockets();
        let (inputs, outputs) = node_data.generate_sockets();
        resource.borrow_mut().nodes.push(node_data);

        let id = NodeId(u32::from(pid));
        let mut node = GraphNode::new(id, token);
        node.position = Some(position);
        node.inputs = inputs;
        node.outputs = outputs;
        self.nodes.insert(id, node);
        Ok(id)
    }

    fn create_scene_node(
        &mut self,
        token: &str,
        payload: SceneNodePayload,
        position: Point,
    ) -> Result<NodeId, GraphError> {
        let family = self.kind();
        let GraphData::Scene { resource, next_id } = &mut self.data else {
            return Err(GraphError::KindMismatch {
                kind: token.to_owned(),
                family,
            });
        };
        let resource = Rc::clone(resource);
        *next_id += 1;
        let pid = *next_id;

        let mut node_data = SceneNodeData::new(pid, token, payload);
        node_data.create_default_state();
        let (inputs, outputs) = node_data.generate_sockets();
        resource.borrow_mut().graph.push(node_data);

        let id = NodeId(pid);
        let mut node = GraphNode::new(id, token);
        node.position = Some(position);
        node.inputs = inputs;
        node.outputs = outputs;
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Remove a node after severing every connection touching it
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        let node = self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))?;
        let input_count = node.inputs.len();
        let output_count = node.outputs.len();

        for index in 0..input_count {
            self.disconnect_socket(SocketRef::input(id, index))?;
        }
        for index in 0..output_count {
            self.disconnect_socket(SocketRef::output(id, index))?;
        }

        match self.data.resource() {
            ResourceRef::Quest(resource) => {
                resource.borrow_mut().remove_node(id.0 as u16);
            }
            ResourceRef::Scene(resource) => {
                resource.borrow_mut().remove_node(id.0);
            }
        }
        self.nodes.shift_remove(&id);
        Ok(())
    }

    /// Remove several nodes
    pub fn remove_nodes(&mut self, ids: &[NodeId]) -> Result<(), GraphError> {
        for &id in ids {
            self.remove_node(id)?;
        }
        Ok(())
    }

    /// Move a node to a new position
    pub fn set_node_position(&mut self, id: NodeId, position: Point) -> Result<(), GraphError> {
        let node = self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))?;
        node.position = Some(position);
        Ok(())
    }

    // ── Layout ──────────────────────────────────────────────────────────

    /// Run the automatic hierarchical layout over all nodes and return the
    /// resulting bounding rectangle, centered on the origin
    pub fn arrange_nodes(&mut self) -> Rect {
        let boxes: Vec<(NodeId, Size)> = self.nodes.values().map(|n| (n.id, n.size)).collect();
        let edges: Vec<(NodeId, NodeId)> = self
            .connections
            .iter()
            .rev()
            .map(|c| (c.source.node, c.target.node))
            .collect();
        let (positions, rect) = layout::arrange(&boxes, &edges);
        for (id, position) in positions {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.position = Some(position);
            }
        }
        rect
    }

    /// Fit the viewport to a content rectangle
    pub fn fit_to_view(&mut self, rect: Rect) {
        self.viewport.fit_to(rect);
    }

    /// Center the viewport on one node at zoom 1
    pub fn center_on_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        let node = self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))?;
        if let Some(position) = node.position {
            self.viewport.center_on(position, node.size);
        }
        Ok(())
    }

    /// Restore the saved layout for this graph, or arrange and fit when no
    /// saved layout exists. Saving stays disabled until this has run once.
    pub fn load_layout(&mut self) {
        if self.layout_loaded {
            return;
        }

        let mut applied = false;
        if let Some(store) = &self.store {
            match store.load() {
                Ok(Some(saved)) => {
                    for entry in &saved.nodes {
                        if let Some(node) = self.nodes.get_mut(&NodeId(entry.node_id)) {
                            node.position = Some(Point::new(entry.x, entry.y));
                        }
                    }
                    self.viewport.location = Point::new(saved.editor_x, saved.editor_y);
                    self.viewport.zoom = saved.editor_z;
                    applied = true;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("failed to load graph layout for {:?}: {e}", self.title);
                }
            }
        }

        if !applied {
            let rect = self.arrange_nodes();
            self.viewport.fit_to(rect);
        }

        self.layout_loaded = true;
        self.allow_save = true;
    }

    /// Persist the current layout. A no-op until [`Self::load_layout`] has
    /// completed once, so an early state-change event cannot clobber a
    /// not-yet-loaded layout file.
    pub fn save_layout(&self) -> Result<(), LayoutStoreError> {
        if !self.allow_save {
            return Ok(());
        }
        let Some(store) = &self.store else {
            return Ok(());
        };

        let layout = GraphLayout {
            editor_x: self.viewport.location.x,
            editor_y: self.viewport.location.y,
            editor_z: self.viewport.zoom,
            nodes: self
                .nodes
                .values()
                .filter_map(|node| {
                    node.position.map(|p| NodeLayout {
                        node_id: node.id.0,
                        x: p.x,
                        y: p.y,
                    })
                })
                .collect(),
        };
        store.save(&layout)
    }

    // ── Internals ───────────────────────────────────────────────────────

    pub(crate) fn resolve_socket(&self, socket_ref: SocketRef) -> Result<&crate::socket::Socket, GraphError> {
        let node = self
            .nodes
            .get(&socket_ref.node)
            .ok_or(GraphError::NodeNotFound(socket_ref.node))?;
        node.sockets(socket_ref.direction)
            .get(socket_ref.index)
            .ok_or(GraphError::InvalidSocketRef(socket_ref))
    }

    fn socket_name(&self, socket_ref: SocketRef) -> Option<String> {
        self.nodes
            .get(&socket_ref.node)
            .and_then(|n| n.socket(socket_ref))
            .map(|s| s.name.clone())
    }

    pub(crate) fn connections_mut(&mut self) -> &mut Vec<Connection> {
        &mut self.connections
    }

    pub(crate) fn set_socket_connected(&mut self, socket_ref: SocketRef, connected: bool) {
        if let Some(node) = self.nodes.get_mut(&socket_ref.node) {
            if let Some(socket) = node.sockets_mut(socket_ref.direction).get_mut(socket_ref.index)
            {
                socket.connected = connected;
            }
        }
    }

    pub(crate) fn set_node_sockets(
        &mut self,
        id: NodeId,
        inputs: Vec<crate::socket::Socket>,
        outputs: Vec<crate::socket::Socket>,
    ) -> Result<(), GraphError> {
        let node = self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))?;
        node.inputs = inputs;
        node.outputs = outputs;
        Ok(())
    }

    pub(crate) fn nested_phase(&mut self, node: NodeId) -> Result<NestedPhase, GraphError> {
        let ResourceRef::Quest(resource) = self.data.resource() else {
            return Ok(NestedPhase::NotNested);
        };
        if !self.nodes.contains_key(&node) {
            return Err(GraphError::NodeNotFound(node));
        }
        let mut res = resource.borrow_mut();
        let Some(node_data) = res.node_mut(node.0 as u16) else {
            return Err(GraphError::NodeNotFound(node));
        };
        match &mut node_data.payload {
            QuestNodePayload::Phase {
                external_path: Some(path),
                ..
            } => Ok(NestedPhase::External(path.clone())),
            QuestNodePayload::Phase { phase, .. } => {
                let nested = phase.get_or_insert_with(Rc::default);
                Ok(NestedPhase::Embedded(Rc::clone(nested)))
            }
            _ => Ok(NestedPhase::NotNested),
        }
    }

    /// Tear down the view state. Called by the owning document lifecycle;
    /// the persisted resource handles stay with the document.
    pub fn dispose(mut self) {
        self.pending = None;
        self.connections.clear();
        self.nodes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Rc<NodeCatalog> {
        Rc::new(NodeCatalog::built_in())
    }

    fn quest_node(id: u16, token: &str, payload: QuestNodePayload) -> QuestNodeData {
        let mut node = QuestNodeData::new(id, token, payload);
        node.create_default_sockets();
        node
    }

    fn scene_node(id: u32, token: &str, payload: SceneNodePayload) -> SceneNodeData {
        let mut node = SceneNodeData::new(id, token, payload);
        node.create_default_state();
        node
    }

    /// Start(1) -> End(2) with one record wired into both socket ends.
    fn wired_quest() -> (Rc<RefCell<QuestPhaseResource>>, Graph) {
        let resource = Rc::new(RefCell::new(QuestPhaseResource::new()));
        {
            let mut res = resource.borrow_mut();
            let mut start = quest_node(1, "questStartNodeDefinition", QuestNodePayload::Start);
            let mut end = quest_node(2, "questEndNodeDefinition", QuestNodePayload::End);
            let handle = res.connections.insert(ConnectionRecord {
                source: QuestSocketAddr::new(1, "Out"),
                destination: QuestSocketAddr::new(2, "In"),
            });
            start
                .socket_mut("Out", SocketDirection::Output)
                .unwrap()
                .connections
                .push(handle);
            end.socket_mut("In", SocketDirection::Input)
                .unwrap()
                .connections
                .push(handle);
            res.nodes.push(start);
            res.nodes.push(end);
        }
        let mut graph = Graph::quest("phase", Rc::clone(&resource), catalog());
        graph.generate_graph();
        (resource, graph)
    }

    #[test]
    fn test_generate_quest_graph() {
        let (_, graph) = wired_quest();

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.connection_count(), 1);
        let connection = &graph.connections()[0];
        assert_eq!(connection.source, SocketRef::output(NodeId(1), 0));
        assert_eq!(connection.target, SocketRef::input(NodeId(2), 0));
        assert!(connection.record.is_some());
        assert!(graph.node(NodeId(1)).unwrap().outputs[0].connected);
        assert!(graph.node(NodeId(2)).unwrap().inputs[0].connected);
    }

    #[test]
    fn test_generate_quest_drops_duplicate_ids() {
        let resource = Rc::new(RefCell::new(QuestPhaseResource::new()));
        resource.borrow_mut().nodes.push(quest_node(
            1,
            "questStartNodeDefinition",
            QuestNodePayload::Start,
        ));
        resource.borrow_mut().nodes.push(quest_node(
            1,
            "questEndNodeDefinition",
            QuestNodePayload::End,
        ));

        let mut graph = Graph::quest("phase", resource, catalog());
        graph.generate_graph();

        assert_eq!(graph.node_count(), 1);
        assert_eq!(
            graph.node(NodeId(1)).unwrap().kind_token,
            "questStartNodeDefinition"
        );
    }

    #[test]
    fn test_generate_scene_drops_connection_to_missing_node() {
        let resource = Rc::new(RefCell::new(SceneResource::new()));
        {
            let mut res = resource.borrow_mut();
            let mut start = scene_node(1, "scnStartNode", SceneNodePayload::Start);
            start.output_mut("Out").unwrap().destinations.push(SceneDestination {
                node_id: 99,
                ordinal: 0,
            });
            res.graph.push(start);
        }

        let mut graph = Graph::scene("scene", resource, catalog());
        graph.generate_graph();

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.connection_count(), 0);
    }

    #[test]
    fn test_generate_scene_skips_out_of_range_ordinal() {
        let resource = Rc::new(RefCell::new(SceneResource::new()));
        {
            let mut res = resource.borrow_mut();
            let mut start = scene_node(1, "scnStartNode", SceneNodePayload::Start);
            let socket = start.output_mut("Out").unwrap();
            socket.destinations.push(SceneDestination {
                node_id: 2,
                ordinal: 7,
            });
            socket.destinations.push(SceneDestination {
                node_id: 2,
                ordinal: 0,
            });
            res.graph.push(start);
            res.graph
                .push(scene_node(2, "scnEndNode", SceneNodePayload::End));
        }

        let mut graph = Graph::scene("scene", resource, catalog());
        graph.generate_graph();

        // End is not dynamic, so ordinal 7 is dropped and ordinal 0 survives.
        assert_eq!(graph.connection_count(), 1);
        assert_eq!(graph.connections()[0].target, SocketRef::input(NodeId(2), 0));
    }

    #[test]
    fn test_generate_scene_grows_dynamic_inputs() {
        let resource = Rc::new(RefCell::new(SceneResource::new()));
        {
            let mut res = resource.borrow_mut();
            let mut start = scene_node(1, "scnStartNode", SceneNodePayload::Start);
            start.output_mut("Out").unwrap().destinations.push(SceneDestination {
                node_id: 2,
                ordinal: 4,
            });
            res.graph.push(start);
            res.graph.push(scene_node(2, "scnHubNode", SceneNodePayload::Hub));
        }

        let mut graph = Graph::scene("scene", resource, catalog());
        graph.generate_graph();

        let hub = graph.node(NodeId(2)).unwrap();
        assert_eq!(hub.inputs.len(), 5);
        assert!(hub.inputs[4].connected);
        assert_eq!(graph.connection_count(), 1);
    }

    #[test]
    fn test_quest_add_then_remove_connection_restores_resource() {
        let resource = Rc::new(RefCell::new(QuestPhaseResource::new()));
        let mut graph = Graph::quest("phase", Rc::clone(&resource), catalog());
        let start = graph
            .create_node("questStartNodeDefinition", Point::new(0.0, 0.0))
            .unwrap();
        let end = graph
            .create_node("questEndNodeDefinition", Point::new(400.0, 0.0))
            .unwrap();

        let source = SocketRef::output(start, 0);
        let target = SocketRef::input(end, 0);
        graph.add_connection(source, target).unwrap();

        {
            let res = resource.borrow();
            assert_eq!(res.connections.len(), 1);
            assert_eq!(
                res.node(start.0 as u16)
                    .unwrap()
                    .socket("Out", SocketDirection::Output)
                    .unwrap()
                    .connections
                    .len(),
                1
            );
        }
        assert!(graph.node(start).unwrap().outputs[0].connected);

        graph.remove_connection(0).unwrap();
        assert_eq!(graph.connection_count(), 0);
        assert!(resource.borrow().connections.is_empty());
        assert!(!graph.node(start).unwrap().outputs[0].connected);
        assert!(!graph.node(end).unwrap().inputs[0].connected);
    }

    #[test]
    fn test_scene_add_then_remove_connection_restores_resource() {
        let resource = Rc::new(RefCell::new(SceneResource::new()));
        let mut graph = Graph::scene("scene", Rc::clone(&resource), catalog());
        let start = graph.create_node("scnStartNode", Point::new(0.0, 0.0)).unwrap();
        let section = graph
            .create_node("scnSectionNode", Point::new(400.0, 0.0))
            .unwrap();

        graph
            .add_connection(SocketRef::output(start, 0), SocketRef::input(section, 0))
            .unwrap();
        {
            let res = resource.borrow();
            let destinations = &res.node(start.0).unwrap().outputs[0].destinations;
            assert_eq!(
                destinations,
                &vec![SceneDestination {
                    node_id: section.0,
                    ordinal: 0,
                }]
            );
        }

        graph.remove_connection(0).unwrap();
        assert!(resource.borrow().node(start.0).unwrap().outputs[0]
            .destinations
            .is_empty());
        assert!(!graph.node(section).unwrap().inputs[0].connected);
    }

    #[test]
    fn test_create_node_assigns_fresh_id() {
        let (_, mut graph) = wired_quest();
        let id = graph
            .create_node("questCheckpointNodeDefinition", Point::new(0.0, 0.0))
            .unwrap();
        assert_eq!(id, NodeId(3));
        let again = graph
            .create_node("questCheckpointNodeDefinition", Point::new(0.0, 100.0))
            .unwrap();
        assert_eq!(again, NodeId(4));
    }

    #[test]
    fn test_create_node_rejects_wrong_family() {
        let resource = Rc::new(RefCell::new(QuestPhaseResource::new()));
        let mut graph = Graph::quest("phase", resource, catalog());

        let err = graph
            .create_node("scnSectionNode", Point::new(0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, GraphError::KindMismatch { .. }));

        let err = graph.create_node("bogus", Point::new(0.0, 0.0)).unwrap_err();
        assert!(matches!(err, GraphError::UnknownKind(_)));
    }

    #[test]
    fn test_remove_node_severs_connections_everywhere() {
        let (resource, mut graph) = wired_quest();

        graph.remove_node(NodeId(2)).unwrap();

        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.connection_count(), 0);
        let res = resource.borrow();
        assert!(res.node(2).is_none());
        assert!(res.connections.is_empty());
        assert!(res.node(1).unwrap().socket("Out", SocketDirection::Output).unwrap().connections.is_empty());
    }

    #[test]
    fn test_complete_connection_toggles_existing_pair() {
        let (_, mut graph) = wired_quest();
        let source = SocketRef::output(NodeId(1), 0);
        let target = SocketRef::input(NodeId(2), 0);

        graph.start_connection(source).unwrap();
        let outcome = graph.complete_connection(PendingTarget::Socket(target)).unwrap();
        assert_eq!(outcome, ConnectOutcome::Removed);
        assert_eq!(graph.connection_count(), 0);

        graph.start_connection(target).unwrap();
        let outcome = graph.complete_connection(PendingTarget::Socket(source)).unwrap();
        assert_eq!(outcome, ConnectOutcome::Connected);
        assert_eq!(graph.connection_count(), 1);
        assert!(graph.pending_connection().is_none());
    }

    #[test]
    fn test_complete_connection_on_dynamic_node_grows_socket() {
        let resource = Rc::new(RefCell::new(SceneResource::new()));
        let mut graph = Graph::scene("scene", Rc::clone(&resource), catalog());
        let start = graph.create_node("scnStartNode", Point::new(0.0, 0.0)).unwrap();
        let hub = graph.create_node("scnHubNode", Point::new(400.0, 0.0)).unwrap();
        assert_eq!(graph.node(hub).unwrap().inputs.len(), 2);

        graph.start_connection(SocketRef::output(start, 0)).unwrap();
        let outcome = graph.complete_connection(PendingTarget::Node(hub)).unwrap();

        assert_eq!(outcome, ConnectOutcome::Connected);
        assert_eq!(graph.node(hub).unwrap().inputs.len(), 3);
        assert_eq!(
            resource.borrow().node(start.0).unwrap().outputs[0].destinations[0],
            SceneDestination {
                node_id: hub.0,
                ordinal: 2,
            }
        );
    }

    #[test]
    fn test_complete_connection_on_fixed_node_fails() {
        let (_, mut graph) = wired_quest();
        graph
            .start_connection(SocketRef::output(NodeId(1), 0))
            .unwrap();

        // Dropping an output on a non-dynamic node grows nothing.
        let err = graph.complete_connection(PendingTarget::Node(NodeId(2))).unwrap_err();
        assert!(matches!(err, GraphError::NotDynamic(_, _)));

        let err = graph
            .complete_connection(PendingTarget::Socket(SocketRef::input(NodeId(2), 0)))
            .unwrap_err();
        assert!(matches!(err, GraphError::NoPendingConnection));
    }

    #[test]
    fn test_save_layout_is_blocked_until_first_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayoutStore::at_path(dir.path().join("phase.json"));
        let resource = Rc::new(RefCell::new(QuestPhaseResource::new()));
        let mut graph = Graph::quest("phase", resource, catalog()).with_layout_store(store.clone());
        graph
            .create_node("questStartNodeDefinition", Point::new(0.0, 0.0))
            .unwrap();

        // No load attempt yet, so saving must not touch the sidecar.
        graph.save_layout().unwrap();
        assert!(store.load().unwrap().is_none());

        graph.load_layout();
        graph.save_layout().unwrap();
        assert!(store.load().unwrap().is_some());
    }

    #[test]
    fn test_layout_round_trips_through_a_fresh_graph() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayoutStore::at_path(dir.path().join("phase.json"));
        let resource = Rc::new(RefCell::new(QuestPhaseResource::new()));
        let mut graph =
            Graph::quest("phase", Rc::clone(&resource), catalog()).with_layout_store(store.clone());
        let start = graph
            .create_node("questStartNodeDefinition", Point::new(0.0, 0.0))
            .unwrap();
        let end = graph
            .create_node("questEndNodeDefinition", Point::new(0.0, 0.0))
            .unwrap();

        graph.load_layout();
        graph.set_node_position(start, Point::new(123.0, -45.5)).unwrap();
        graph.set_node_position(end, Point::new(610.0, 80.25)).unwrap();
        let saved_viewport = *graph.viewport();
        graph.save_layout().unwrap();

        let mut fresh =
            Graph::quest("phase", Rc::clone(&resource), catalog()).with_layout_store(store);
        fresh.generate_graph();
        fresh.load_layout();

        assert_eq!(
            fresh.node(start).unwrap().position,
            Some(Point::new(123.0, -45.5))
        );
        assert_eq!(
            fresh.node(end).unwrap().position,
            Some(Point::new(610.0, 80.25))
        );
        assert_eq!(fresh.viewport().zoom, saved_viewport.zoom);
        assert_eq!(fresh.viewport().location, saved_viewport.location);
    }

    #[test]
    fn test_node_types_follow_graph_kind() {
        let resource = Rc::new(RefCell::new(SceneResource::new()));
        let graph = Graph::scene("scene", resource, catalog());

        let tokens: Vec<&str> = graph.node_types().map(|spec| spec.token.as_str()).collect();
        assert!(tokens.contains(&"scnChoiceNode"));
        assert!(!tokens.iter().any(|t| t.starts_with("quest")));
        assert_eq!(graph.clean_kind_name("scnChoiceNode"), "Choice");
    }
}
