// SPDX-License-Identifier: MIT OR Apache-2.0
//! Socket reconciliation after an out-of-band property edit.
//!
//! The document property editor mutates persisted node payloads directly,
//! behind the graph's back. When such an edit changes a node's socket shape
//! (a switch case added, a randomizer branch count lowered), the node's
//! socket set must be rebuilt while every connection whose socket name
//! survived the edit stays wired. Connections on extinct sockets are removed
//! from the arena and from their far end.
//!
//! Only quest graphs support this; scene destination descriptors are
//! ordinal-addressed and cannot be re-keyed by name.

use crate::catalog::GraphKind;
use crate::connection::{Connection, ConnectionHandle, QuestSocketAddr};
use crate::graph::{Graph, GraphError};
use crate::node::NodeId;
use crate::socket::{SocketDirection, SocketRef};

/// Rebuild one node's socket set from its current persisted payload,
/// re-keying connections by socket name
pub fn recalculate_sockets(graph: &mut Graph, node_id: NodeId) -> Result<(), GraphError> {
    let Some(resource) = graph.quest_resource() else {
        return Err(GraphError::RecalculateUnsupported(GraphKind::Scene));
    };
    if graph.node(node_id).is_none() {
        return Err(GraphError::NodeNotFound(node_id));
    }
    let pid = node_id.0 as u16;

    let mut res = resource.borrow_mut();
    let (inputs, outputs, dropped) = {
        let node_data = res.node_mut(pid).ok_or(GraphError::NodeNotFound(node_id))?;
        let before: Vec<(String, SocketDirection, Vec<ConnectionHandle>)> = node_data
            .sockets
            .iter()
            .map(|s| (s.name.clone(), s.direction, s.connections.clone()))
            .collect();

        let (inputs, outputs) = node_data.generate_sockets();

        let mut dropped = Vec::new();
        for (name, direction, handles) in before {
            if node_data.socket(&name, direction).is_none() {
                dropped.extend(handles);
            }
        }
        (inputs, outputs, dropped)
    };

    // Detach every connection whose socket did not survive: delete the
    // record and scrub the handle from both ends' lists. On a self-loop the
    // far end is a surviving socket of the regenerated node itself, so no
    // end may be skipped; the extinct socket is already gone and the scrub
    // is a no-op for it.
    let mut far_ends: Vec<(u16, String, SocketDirection)> = Vec::new();
    for handle in dropped {
        let Some(record) = res.connections.remove(handle) else {
            continue;
        };
        let ends = [
            (record.source, SocketDirection::Output),
            (record.destination, SocketDirection::Input),
        ];
        for (addr, direction) in ends {
            if let Some(socket) = res
                .node_mut(addr.node)
                .and_then(|n| n.socket_mut(&addr.socket, direction))
            {
                socket.connections.retain(|h| *h != handle);
            }
            far_ends.push((addr.node, addr.socket, direction));
        }
    }

    let survivors: Vec<(ConnectionHandle, QuestSocketAddr, QuestSocketAddr)> = res
        .connections
        .iter()
        .filter(|(_, record)| record.source.node == pid || record.destination.node == pid)
        .map(|(handle, record)| (handle, record.source.clone(), record.destination.clone()))
        .collect();
    drop(res);

    // Swap in the regenerated socket set, then rebuild the view connections
    // touching this node from the surviving records. Socket indices may have
    // shifted, so view references on both sides are re-resolved by name.
    graph.set_node_sockets(node_id, inputs, outputs)?;
    graph.connections_mut().retain(|c| !c.involves_node(node_id));
    for (handle, source, destination) in survivors {
        let source_ref = output_ref(graph, &source);
        let target_ref = input_ref(graph, &destination);
        let (Some(source_ref), Some(target_ref)) = (source_ref, target_ref) else {
            continue;
        };
        graph.connections_mut().push(Connection {
            source: source_ref,
            target: target_ref,
            record: Some(handle),
        });
    }

    // Far ends of detached connections may have just lost their only wire.
    for (node, name, direction) in far_ends {
        let still_connected = resource
            .borrow()
            .node(node)
            .and_then(|n| n.socket(&name, direction))
            .is_some_and(|s| !s.connections.is_empty());
        let id = NodeId(u32::from(node));
        let index = graph.node(id).and_then(|n| match direction {
            SocketDirection::Input => n.input_index(&name),
            SocketDirection::Output => n.output_index(&name),
        });
        if let Some(index) = index {
            graph.set_socket_connected(
                SocketRef {
                    node: id,
                    direction,
                    index,
                },
                still_connected,
            );
        }
    }
    Ok(())
}

fn output_ref(graph: &Graph, addr: &QuestSocketAddr) -> Option<SocketRef> {
    let id = NodeId(u32::from(addr.node));
    let index = graph.node(id)?.output_index(&addr.socket)?;
    Some(SocketRef::output(id, index))
}

fn input_ref(graph: &Graph, addr: &QuestSocketAddr) -> Option<SocketRef> {
    let id = NodeId(u32::from(addr.node));
    let index = graph.node(id)?.input_index(&addr.socket)?;
    Some(SocketRef::input(id, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NodeCatalog;
    use crate::graphs::quest::{QuestNodePayload, QuestPhaseResource};
    use crate::graphs::scene::SceneResource;
    use crate::node::Point;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn catalog() -> Rc<NodeCatalog> {
        Rc::new(NodeCatalog::built_in())
    }

    /// Switch with two wired cases, connected to one end node.
    fn switch_graph() -> (Rc<RefCell<QuestPhaseResource>>, Graph, NodeId, NodeId) {
        let resource = Rc::new(RefCell::new(QuestPhaseResource::new()));
        let mut graph = Graph::quest("phase", Rc::clone(&resource), catalog());
        let switch = graph
            .create_node("questSwitchNodeDefinition", Point::new(0.0, 0.0))
            .unwrap();
        let end = graph
            .create_node("questEndNodeDefinition", Point::new(400.0, 0.0))
            .unwrap();

        // Property edit: give the switch two cases, then rebuild its sockets.
        resource
            .borrow_mut()
            .node_mut(switch.0 as u16)
            .unwrap()
            .payload = QuestNodePayload::Switch {
            cases: vec!["CaseA".into(), "CaseB".into()],
        };
        recalculate_sockets(&mut graph, switch).unwrap();

        let case_a = graph.node(switch).unwrap().output_index("CaseA").unwrap();
        let case_b = graph.node(switch).unwrap().output_index("CaseB").unwrap();
        graph
            .add_connection(SocketRef::output(switch, case_a), SocketRef::input(end, 0))
            .unwrap();
        graph
            .add_connection(SocketRef::output(switch, case_b), SocketRef::input(end, 0))
            .unwrap();
        (resource, graph, switch, end)
    }

    #[test]
    fn test_surviving_socket_names_keep_their_connections() {
        let (resource, mut graph, switch, end) = switch_graph();
        assert_eq!(graph.connection_count(), 2);

        resource
            .borrow_mut()
            .node_mut(switch.0 as u16)
            .unwrap()
            .payload = QuestNodePayload::Switch {
            cases: vec!["CaseB".into(), "CaseC".into()],
        };
        recalculate_sockets(&mut graph, switch).unwrap();

        assert_eq!(graph.connection_count(), 1);
        let node = graph.node(switch).unwrap();
        assert_eq!(node.outputs.len(), 2);
        let case_b = node.output_index("CaseB").unwrap();
        assert!(node.outputs[case_b].connected);
        let case_c = node.output_index("CaseC").unwrap();
        assert!(!node.outputs[case_c].connected);

        let res = resource.borrow();
        assert_eq!(res.connections.len(), 1);
        // The end node lost one of its two wires but keeps the other.
        assert_eq!(
            res.node(end.0 as u16)
                .unwrap()
                .socket("In", SocketDirection::Input)
                .unwrap()
                .connections
                .len(),
            1
        );
        drop(res);
        assert!(graph.node(end).unwrap().inputs[0].connected);
    }

    #[test]
    fn test_dropping_every_case_unwires_the_far_end() {
        let (resource, mut graph, switch, end) = switch_graph();

        resource
            .borrow_mut()
            .node_mut(switch.0 as u16)
            .unwrap()
            .payload = QuestNodePayload::Switch { cases: Vec::new() };
        recalculate_sockets(&mut graph, switch).unwrap();

        assert_eq!(graph.connection_count(), 0);
        assert!(resource.borrow().connections.is_empty());
        assert!(!graph.node(end).unwrap().inputs[0].connected);
        assert_eq!(graph.node(switch).unwrap().outputs.len(), 0);
    }

    #[test]
    fn test_inbound_connections_survive_socket_rebuild() {
        let resource = Rc::new(RefCell::new(QuestPhaseResource::new()));
        let mut graph = Graph::quest("phase", Rc::clone(&resource), catalog());
        let start = graph
            .create_node("questStartNodeDefinition", Point::new(0.0, 0.0))
            .unwrap();
        let switch = graph
            .create_node("questSwitchNodeDefinition", Point::new(400.0, 0.0))
            .unwrap();
        graph
            .add_connection(SocketRef::output(start, 0), SocketRef::input(switch, 0))
            .unwrap();

        resource
            .borrow_mut()
            .node_mut(switch.0 as u16)
            .unwrap()
            .payload = QuestNodePayload::Switch {
            cases: vec!["CaseA".into()],
        };
        recalculate_sockets(&mut graph, switch).unwrap();

        // "In" survives the rebuild, so the inbound wire stays.
        assert_eq!(graph.connection_count(), 1);
        assert!(graph.node(switch).unwrap().inputs[0].connected);
        assert_eq!(resource.borrow().connections.len(), 1);
    }

    #[test]
    fn test_self_loop_on_extinct_socket_is_fully_detached() {
        let resource = Rc::new(RefCell::new(QuestPhaseResource::new()));
        let mut graph = Graph::quest("phase", Rc::clone(&resource), catalog());
        let switch = graph
            .create_node("questSwitchNodeDefinition", Point::new(0.0, 0.0))
            .unwrap();

        resource
            .borrow_mut()
            .node_mut(switch.0 as u16)
            .unwrap()
            .payload = QuestNodePayload::Switch {
            cases: vec!["Loop".into()],
        };
        recalculate_sockets(&mut graph, switch).unwrap();

        // Wire the case back into the node's own input, then drop the case.
        let loop_out = graph.node(switch).unwrap().output_index("Loop").unwrap();
        graph
            .add_connection(
                SocketRef::output(switch, loop_out),
                SocketRef::input(switch, 0),
            )
            .unwrap();
        resource
            .borrow_mut()
            .node_mut(switch.0 as u16)
            .unwrap()
            .payload = QuestNodePayload::Switch { cases: Vec::new() };
        recalculate_sockets(&mut graph, switch).unwrap();

        assert_eq!(graph.connection_count(), 0);
        let res = resource.borrow();
        assert!(res.connections.is_empty());
        // The surviving input keeps no dangling handle.
        assert!(res
            .node(switch.0 as u16)
            .unwrap()
            .socket("In", SocketDirection::Input)
            .unwrap()
            .connections
            .is_empty());
        drop(res);
        assert!(!graph.node(switch).unwrap().inputs[0].connected);
    }

    #[test]
    fn test_scene_graphs_are_rejected() {
        let resource = Rc::new(RefCell::new(SceneResource::new()));
        let mut graph = Graph::scene("scene", resource, catalog());
        let node = graph.create_node("scnChoiceNode", Point::new(0.0, 0.0)).unwrap();

        let err = recalculate_sockets(&mut graph, node).unwrap_err();
        assert!(matches!(
            err,
            GraphError::RecalculateUnsupported(GraphKind::Scene)
        ));
    }
}
