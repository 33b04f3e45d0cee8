// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persisted quest-phase document model.
//!
//! Quest connection membership is symmetric: the output socket and the input
//! socket of a connection each hold the same arena handle.

use crate::connection::{ConnectionArena, ConnectionHandle};
use crate::socket::{Socket, SocketDirection};
use std::cell::RefCell;
use std::rc::Rc;

/// A quest phase's persisted graph: node list plus the connection-record arena
#[derive(Debug, Clone, Default)]
pub struct QuestPhaseResource {
    /// Persisted nodes, in document order. Corrupt documents may contain
    /// duplicate ids; the view keeps the first occurrence only.
    pub nodes: Vec<QuestNodeData>,
    /// Connection records shared by both socket ends
    pub connections: ConnectionArena,
}

impl QuestPhaseResource {
    /// Create an empty phase resource
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the first node with the given id
    pub fn node(&self, id: u16) -> Option<&QuestNodeData> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Get the first node with the given id, mutably
    pub fn node_mut(&mut self, id: u16) -> Option<&mut QuestNodeData> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Remove the first node with the given id
    pub fn remove_node(&mut self, id: u16) -> Option<QuestNodeData> {
        let index = self.nodes.iter().position(|n| n.id == id)?;
        Some(self.nodes.remove(index))
    }
}

/// One persisted quest node
#[derive(Debug, Clone)]
pub struct QuestNodeData {
    /// Graph-scoped 16-bit node id
    pub id: u16,
    /// Kind token this node was instantiated from
    pub kind_token: String,
    /// Kind-specific state
    pub payload: QuestNodePayload,
    /// Persisted sockets with their connection handles
    pub sockets: Vec<QuestSocketData>,
}

impl QuestNodeData {
    /// Create a node with no sockets yet
    pub fn new(id: u16, kind_token: impl Into<String>, payload: QuestNodePayload) -> Self {
        Self {
            id,
            kind_token: kind_token.into(),
            payload,
            sockets: Vec::new(),
        }
    }

    /// Seed the minimum structurally required sockets for a newly created
    /// node. Called once before the first [`Self::generate_sockets`].
    pub fn create_default_sockets(&mut self) {
        self.sockets = self.payload.default_sockets();
    }

    /// Get a persisted socket by name and direction
    pub fn socket(&self, name: &str, direction: SocketDirection) -> Option<&QuestSocketData> {
        self.sockets
            .iter()
            .find(|s| s.direction == direction && s.name == name)
    }

    /// Get a persisted socket by name and direction, mutably
    pub fn socket_mut(
        &mut self,
        name: &str,
        direction: SocketDirection,
    ) -> Option<&mut QuestSocketData> {
        self.sockets
            .iter_mut()
            .find(|s| s.direction == direction && s.name == name)
    }

    /// Derive the view socket lists from the node's current persisted state.
    ///
    /// List-driven kinds first reconcile the persisted socket list with their
    /// list-valued field: sockets whose name survives keep their connection
    /// handles, extinct names drop out, new names start unwired.
    pub fn generate_sockets(&mut self) -> (Vec<Socket>, Vec<Socket>) {
        if let Some(expected) = self.payload.expected_sockets() {
            let mut synced = Vec::with_capacity(expected.len());
            for (name, direction) in expected {
                let existing = self
                    .sockets
                    .iter()
                    .position(|s| s.direction == direction && s.name == name);
                match existing {
                    Some(index) => synced.push(self.sockets.remove(index)),
                    None => synced.push(QuestSocketData::new(name, direction)),
                }
            }
            self.sockets = synced;
        }

        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        for socket_data in &self.sockets {
            let list = match socket_data.direction {
                SocketDirection::Input => &mut inputs,
                SocketDirection::Output => &mut outputs,
            };
            let ordinal = list.len() as u32;
            list.push(Socket {
                name: socket_data.name.clone(),
                direction: socket_data.direction,
                ordinal,
                connected: !socket_data.connections.is_empty(),
            });
        }
        (inputs, outputs)
    }
}

/// One persisted quest socket
#[derive(Debug, Clone)]
pub struct QuestSocketData {
    /// Stable socket name
    pub name: String,
    /// Socket direction
    pub direction: SocketDirection,
    /// Handles of the connection records touching this socket
    pub connections: Vec<ConnectionHandle>,
}

impl QuestSocketData {
    /// Create an unwired socket
    pub fn new(name: impl Into<String>, direction: SocketDirection) -> Self {
        Self {
            name: name.into(),
            direction,
            connections: Vec::new(),
        }
    }

    fn input(name: &str) -> Self {
        Self::new(name, SocketDirection::Input)
    }

    fn output(name: &str) -> Self {
        Self::new(name, SocketDirection::Output)
    }
}

/// Kind-specific state of a persisted quest node.
///
/// The full catalog carries ~60 thin data-only kinds; this set covers every
/// structural behavior the engine distinguishes: fixed socket sets,
/// list-driven socket sets, dynamic input/output growth, and nested phases.
#[derive(Debug, Clone)]
pub enum QuestNodePayload {
    /// Phase entry point
    Start,
    /// Phase exit point
    End,
    /// Save checkpoint
    Checkpoint,
    /// Pause/resume gate
    FlowControl,
    /// Fact test with `True`/`False` branches
    Condition,
    /// One output branch per named case; the case list drives the socket set
    Switch {
        /// Case names, each backing one output socket
        cases: Vec<String>,
    },
    /// Random branch selection; the branch count drives the socket set
    Randomizer {
        /// Number of output branches
        branches: u32,
    },
    /// Fires once all inputs have fired; grows inputs on demand
    LogicalAnd,
    /// Forwards any input to its outputs; grows outputs on demand
    LogicalHub,
    /// A nested sub-phase, embedded or referenced by external path
    Phase {
        /// Embedded sub-phase graph, if the phase is inlined
        phase: Option<Rc<RefCell<QuestPhaseResource>>>,
        /// Project-relative path of an external phase file, if not inlined
        external_path: Option<String>,
    },
}

impl QuestNodePayload {
    /// Whether this kind can grow an additional input socket on demand
    pub fn dynamic_input(&self) -> bool {
        matches!(self, Self::LogicalAnd)
    }

    /// Whether this kind can grow an additional output socket on demand
    pub fn dynamic_output(&self) -> bool {
        matches!(self, Self::LogicalHub)
    }

    /// The socket set a fresh node of this kind starts with
    pub fn default_sockets(&self) -> Vec<QuestSocketData> {
        match self {
            Self::Start => vec![QuestSocketData::output("Out")],
            Self::End => vec![QuestSocketData::input("In")],
            Self::Checkpoint | Self::FlowControl | Self::Phase { .. } => vec![
                QuestSocketData::input("In"),
                QuestSocketData::output("Out"),
            ],
            Self::Condition => vec![
                QuestSocketData::input("In"),
                QuestSocketData::output("True"),
                QuestSocketData::output("False"),
            ],
            Self::Switch { .. } | Self::Randomizer { .. } => {
                // List-driven kinds derive their set on the first generate.
                vec![QuestSocketData::input("In")]
            }
            Self::LogicalAnd => vec![
                QuestSocketData::input("In0"),
                QuestSocketData::input("In1"),
                QuestSocketData::output("Out"),
            ],
            Self::LogicalHub => vec![
                QuestSocketData::input("In"),
                QuestSocketData::output("Out0"),
            ],
        }
    }

    /// The socket set a list-driven kind must currently have, or `None` for
    /// kinds whose persisted socket list is authoritative
    fn expected_sockets(&self) -> Option<Vec<(String, SocketDirection)>> {
        match self {
            Self::Switch { cases } => {
                let mut sockets = vec![("In".to_owned(), SocketDirection::Input)];
                sockets.extend(
                    cases
                        .iter()
                        .map(|case| (case.clone(), SocketDirection::Output)),
                );
                Some(sockets)
            }
            Self::Randomizer { branches } => {
                let mut sockets = vec![("In".to_owned(), SocketDirection::Input)];
                sockets.extend(
                    (0..*branches).map(|i| (format!("Out{i}"), SocketDirection::Output)),
                );
                Some(sockets)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_sockets_splits_directions() {
        let mut node = QuestNodeData::new(1, "questConditionNodeDefinition", QuestNodePayload::Condition);
        node.create_default_sockets();

        let (inputs, outputs) = node.generate_sockets();
        assert_eq!(inputs.len(), 1);
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].name, "True");
        assert_eq!(outputs[1].ordinal, 1);
        assert!(!inputs[0].connected);
    }

    #[test]
    fn test_list_driven_sync_preserves_surviving_sockets() {
        let mut node = QuestNodeData::new(
            2,
            "questSwitchNodeDefinition",
            QuestNodePayload::Switch {
                cases: vec!["True".into(), "False".into()],
            },
        );
        node.create_default_sockets();
        node.generate_sockets();

        // Wire "True", then drop the "False" case.
        node.socket_mut("True", SocketDirection::Output)
            .unwrap()
            .connections
            .push(crate::connection::ConnectionHandle(9));
        node.payload = QuestNodePayload::Switch {
            cases: vec!["True".into()],
        };

        let (_, outputs) = node.generate_sockets();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].name, "True");
        assert!(outputs[0].connected);
        assert!(node.socket("False", SocketDirection::Output).is_none());
    }
}
