// SPDX-License-Identifier: MIT OR Apache-2.0
//! Socket definitions for node inputs/outputs.

use crate::node::NodeId;

/// Socket direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketDirection {
    /// Input socket
    Input,
    /// Output socket
    Output,
}

impl SocketDirection {
    /// Get the opposite direction
    pub fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

/// A connection point on a view node.
///
/// The name is stable across socket regeneration and is the key used to
/// reattach connections after a node's socket set changes. The ordinal is the
/// position scene destination descriptors refer to; for dynamic nodes it grows
/// at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct Socket {
    /// Stable socket name
    pub name: String,
    /// Socket direction
    pub direction: SocketDirection,
    /// Position within the node's sockets of this direction
    pub ordinal: u32,
    /// Whether at least one connection touches this socket
    pub connected: bool,
}

impl Socket {
    /// Create a new disconnected input socket
    pub fn input(name: impl Into<String>, ordinal: u32) -> Self {
        Self {
            name: name.into(),
            direction: SocketDirection::Input,
            ordinal,
            connected: false,
        }
    }

    /// Create a new disconnected output socket
    pub fn output(name: impl Into<String>, ordinal: u32) -> Self {
        Self {
            name: name.into(),
            direction: SocketDirection::Output,
            ordinal,
            connected: false,
        }
    }
}

/// Address of one socket of one view node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketRef {
    /// Owning node
    pub node: NodeId,
    /// Which socket list of the node
    pub direction: SocketDirection,
    /// Index into that socket list
    pub index: usize,
}

impl SocketRef {
    /// Address an input socket
    pub fn input(node: NodeId, index: usize) -> Self {
        Self {
            node,
            direction: SocketDirection::Input,
            index,
        }
    }

    /// Address an output socket
    pub fn output(node: NodeId, index: usize) -> Self {
        Self {
            node,
            direction: SocketDirection::Output,
            index,
        }
    }
}
