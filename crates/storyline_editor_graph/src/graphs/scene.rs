// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persisted cinematic-scene document model.
//!
//! Scene connection membership is asymmetric: only the output socket stores
//! destination descriptors (target node id plus target input ordinal). Input
//! sockets have no back-list; their connected state is derived by scanning
//! every node's outputs.

use crate::socket::Socket;

/// A scene's persisted graph
#[derive(Debug, Clone, Default)]
pub struct SceneResource {
    /// Persisted nodes, in document order
    pub graph: Vec<SceneNodeData>,
}

impl SceneResource {
    /// Create an empty scene resource
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the first node with the given id
    pub fn node(&self, id: u32) -> Option<&SceneNodeData> {
        self.graph.iter().find(|n| n.id == id)
    }

    /// Get the first node with the given id, mutably
    pub fn node_mut(&mut self, id: u32) -> Option<&mut SceneNodeData> {
        self.graph.iter_mut().find(|n| n.id == id)
    }

    /// Remove the first node with the given id
    pub fn remove_node(&mut self, id: u32) -> Option<SceneNodeData> {
        let index = self.graph.iter().position(|n| n.id == id)?;
        Some(self.graph.remove(index))
    }

    /// Whether any output socket of any node targets the given input socket
    pub fn input_is_connected(&self, node_id: u32, ordinal: u32) -> bool {
        self.graph.iter().any(|node| {
            node.outputs.iter().any(|output| {
                output
                    .destinations
                    .iter()
                    .any(|d| d.node_id == node_id && d.ordinal == ordinal)
            })
        })
    }
}

/// One persisted scene node
#[derive(Debug, Clone)]
pub struct SceneNodeData {
    /// Graph-scoped 32-bit node id
    pub id: u32,
    /// Kind token this node was instantiated from
    pub kind_token: String,
    /// Kind-specific state
    pub payload: SceneNodePayload,
    /// Output sockets with their destination descriptors. Inputs are implied
    /// by ordinal and carry no persisted state.
    pub outputs: Vec<SceneOutputSocketData>,
}

impl SceneNodeData {
    /// Create a node with no output sockets yet
    pub fn new(id: u32, kind_token: impl Into<String>, payload: SceneNodePayload) -> Self {
        Self {
            id,
            kind_token: kind_token.into(),
            payload,
            outputs: Vec::new(),
        }
    }

    /// Seed the default persisted state for a newly created node. Called once
    /// before the first [`Self::generate_sockets`].
    pub fn create_default_state(&mut self) {
        self.outputs = self.payload.default_outputs();
    }

    /// Get a persisted output socket by name, mutably
    pub fn output_mut(&mut self, name: &str) -> Option<&mut SceneOutputSocketData> {
        self.outputs.iter_mut().find(|s| s.name == name)
    }

    /// Derive the view socket lists from the node's current persisted state.
    ///
    /// Inputs are synthesized from the kind's base input count; list-driven
    /// kinds first reconcile the persisted output list with their list-valued
    /// field, keeping destinations of sockets whose name survives.
    pub fn generate_sockets(&mut self) -> (Vec<Socket>, Vec<Socket>) {
        if let Some(expected) = self.payload.expected_outputs() {
            let mut synced = Vec::with_capacity(expected.len());
            for name in expected {
                match self.outputs.iter().position(|s| s.name == name) {
                    Some(index) => synced.push(self.outputs.remove(index)),
                    None => synced.push(SceneOutputSocketData::new(name)),
                }
            }
            self.outputs = synced;
        }

        let inputs = (0..self.payload.base_inputs())
            .map(|i| Socket::input(format!("In{i}"), i))
            .collect();
        let outputs = self
            .outputs
            .iter()
            .enumerate()
            .map(|(i, data)| {
                let mut socket = Socket::output(data.name.clone(), i as u32);
                socket.connected = !data.destinations.is_empty();
                socket
            })
            .collect();
        (inputs, outputs)
    }
}

/// One persisted scene output socket
#[derive(Debug, Clone, Default)]
pub struct SceneOutputSocketData {
    /// Stable socket name
    pub name: String,
    /// Destination descriptors, one per outgoing connection
    pub destinations: Vec<SceneDestination>,
}

impl SceneOutputSocketData {
    /// Create an unwired output socket
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            destinations: Vec::new(),
        }
    }
}

/// A one-directional connection reference held by the source socket only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneDestination {
    /// Target node id
    pub node_id: u32,
    /// Target input socket ordinal
    pub ordinal: u32,
}

/// Kind-specific state of a persisted scene node.
///
/// As with quest kinds, this is the structurally distinct subset of the full
/// catalog, not the whole of it.
#[derive(Debug, Clone)]
pub enum SceneNodePayload {
    /// Scene entry point
    Start,
    /// Scene exit point
    End,
    /// A linear dialogue/action section
    Section,
    /// Bridge into the quest system
    Quest,
    /// Skip-forward control point
    CutControl,
    /// Player choice; the option list drives the output socket set
    Choice {
        /// Option labels, each backing one output socket
        options: Vec<String>,
    },
    /// Fan-in/fan-out relay; grows inputs on demand
    Hub,
    /// Fires once all inputs have fired; grows inputs on demand
    And,
    /// Fires on the first input only; grows inputs on demand
    Xor,
    /// Random branch selection; the branch count drives the output set
    Randomizer {
        /// Number of output branches
        branches: u32,
    },
}

impl SceneNodePayload {
    /// Whether this kind can grow an additional input socket on demand
    pub fn dynamic_input(&self) -> bool {
        matches!(self, Self::Hub | Self::And | Self::Xor)
    }

    /// Whether this kind can grow an additional output socket on demand
    pub fn dynamic_output(&self) -> bool {
        matches!(self, Self::Hub)
    }

    /// Number of input sockets a node of this kind starts with
    pub fn base_inputs(&self) -> u32 {
        match self {
            Self::Start => 0,
            Self::Hub | Self::And | Self::Xor => 2,
            _ => 1,
        }
    }

    /// The persisted output sockets a fresh node of this kind starts with
    pub fn default_outputs(&self) -> Vec<SceneOutputSocketData> {
        match self {
            Self::End => Vec::new(),
            Self::Choice { .. } | Self::Randomizer { .. } => {
                // List-driven kinds derive their set on the first generate.
                Vec::new()
            }
            Self::CutControl => vec![
                SceneOutputSocketData::new("Out"),
                SceneOutputSocketData::new("CutDestination"),
            ],
            Self::Hub => vec![SceneOutputSocketData::new("Out0")],
            _ => vec![SceneOutputSocketData::new("Out")],
        }
    }

    /// The output names a list-driven kind must currently have, or `None` for
    /// kinds whose persisted output list is authoritative
    fn expected_outputs(&self) -> Option<Vec<String>> {
        match self {
            Self::Choice { options } => Some(options.clone()),
            Self::Randomizer { branches } => {
                Some((0..*branches).map(|i| format!("Out{i}")).collect())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_sockets_synthesizes_inputs() {
        let mut node = SceneNodeData::new(4, "scnAndNode", SceneNodePayload::And);
        node.create_default_state();

        let (inputs, outputs) = node.generate_sockets();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[1].name, "In1");
        assert_eq!(outputs.len(), 1);
    }

    #[test]
    fn test_choice_outputs_follow_option_list() {
        let mut node = SceneNodeData::new(
            5,
            "scnChoiceNode",
            SceneNodePayload::Choice {
                options: vec!["Accept".into(), "Refuse".into()],
            },
        );
        node.create_default_state();
        node.generate_sockets();

        node.output_mut("Refuse").unwrap().destinations.push(SceneDestination {
            node_id: 9,
            ordinal: 0,
        });
        node.payload = SceneNodePayload::Choice {
            options: vec!["Refuse".into(), "Threaten".into()],
        };

        let (_, outputs) = node.generate_sockets();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].name, "Refuse");
        assert!(outputs[0].connected);
        assert!(!outputs[1].connected);
    }

    #[test]
    fn test_input_connected_scan() {
        let mut resource = SceneResource::new();
        let mut start = SceneNodeData::new(1, "scnStartNode", SceneNodePayload::Start);
        start.create_default_state();
        start.output_mut("Out").unwrap().destinations.push(SceneDestination {
            node_id: 2,
            ordinal: 0,
        });
        resource.graph.push(start);

        assert!(resource.input_is_connected(2, 0));
        assert!(!resource.input_is_connected(2, 1));
        assert!(!resource.input_is_connected(3, 0));
    }
}
