// SPDX-License-Identifier: MIT OR Apache-2.0
//! View node definitions for the graph framework.

use crate::socket::{Socket, SocketDirection, SocketRef};
use std::fmt;

/// Unique identifier for a view node within its graph.
///
/// Quest nodes widen their persisted 16-bit id; scene nodes use the persisted
/// 32-bit id directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point in graph space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Point {
    /// Create a new point
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A node's visual extent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    /// Width in graph units
    pub width: f64,
    /// Height in graph units
    pub height: f64,
}

impl Size {
    /// Create a new size
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Extent assigned to a node until the host view measures it
pub const DEFAULT_NODE_SIZE: Size = Size {
    width: 220.0,
    height: 90.0,
};

impl Default for Size {
    fn default() -> Self {
        DEFAULT_NODE_SIZE
    }
}

/// A view node wrapping one persisted graph node.
///
/// The persisted node itself lives in the owning resource document; the view
/// node carries the uniform shape the editor works with. Position stays `None`
/// until the layout store or the layout engine assigns one.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Unique instance id within the owning graph
    pub id: NodeId,
    /// Kind token of the wrapped persisted node
    pub kind_token: String,
    /// Screen location of the node's top-left corner, if assigned
    pub position: Option<Point>,
    /// Visual extent
    pub size: Size,
    /// Input sockets, in ordinal order
    pub inputs: Vec<Socket>,
    /// Output sockets, in ordinal order
    pub outputs: Vec<Socket>,
}

impl GraphNode {
    /// Create a location-less node wrapper
    pub fn new(id: NodeId, kind_token: impl Into<String>) -> Self {
        Self {
            id,
            kind_token: kind_token.into(),
            position: None,
            size: Size::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Get the socket list of one direction
    pub fn sockets(&self, direction: SocketDirection) -> &[Socket] {
        match direction {
            SocketDirection::Input => &self.inputs,
            SocketDirection::Output => &self.outputs,
        }
    }

    /// Get the mutable socket list of one direction
    pub fn sockets_mut(&mut self, direction: SocketDirection) -> &mut Vec<Socket> {
        match direction {
            SocketDirection::Input => &mut self.inputs,
            SocketDirection::Output => &mut self.outputs,
        }
    }

    /// Resolve a socket reference against this node
    pub fn socket(&self, socket_ref: SocketRef) -> Option<&Socket> {
        if socket_ref.node != self.id {
            return None;
        }
        self.sockets(socket_ref.direction).get(socket_ref.index)
    }

    /// Find an input socket index by name
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|s| s.name == name)
    }

    /// Find an output socket index by name
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|s| s.name == name)
    }

    /// Grow one additional input socket and return its reference.
    ///
    /// Used for dynamic-input nodes when a connection targets a socket slot
    /// that does not exist yet.
    pub fn add_input(&mut self) -> SocketRef {
        let ordinal = self.inputs.len() as u32;
        self.inputs.push(Socket::input(format!("In{ordinal}"), ordinal));
        SocketRef::input(self.id, self.inputs.len() - 1)
    }

    /// Grow one additional output socket and return its reference
    pub fn add_output(&mut self) -> SocketRef {
        let ordinal = self.outputs.len() as u32;
        self.outputs
            .push(Socket::output(format!("Out{ordinal}"), ordinal));
        SocketRef::output(self.id, self.outputs.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_lookup_by_name() {
        let mut node = GraphNode::new(NodeId(1), "questConditionNodeDefinition");
        node.inputs.push(Socket::input("In", 0));
        node.outputs.push(Socket::output("True", 0));
        node.outputs.push(Socket::output("False", 1));

        assert_eq!(node.input_index("In"), Some(0));
        assert_eq!(node.output_index("False"), Some(1));
        assert_eq!(node.output_index("Maybe"), None);
    }

    #[test]
    fn test_dynamic_growth_assigns_ordinals() {
        let mut node = GraphNode::new(NodeId(7), "scnHubNode");
        let first = node.add_input();
        let second = node.add_input();

        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
        assert_eq!(node.inputs[1].name, "In1");
        assert_eq!(node.inputs[1].ordinal, 1);
    }
}
