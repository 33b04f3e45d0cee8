// SPDX-License-Identifier: MIT OR Apache-2.0
//! Drill-down navigation through nested phase graphs.
//!
//! The navigator owns the root graph plus a stack of opened sub-phase
//! graphs; the deepest entry is the one being edited. Sub-phase view state
//! is rebuilt on every descent and torn down on the way back up, while the
//! persisted sub-phase resource stays aliased with its parent node, so edits
//! made inside a phase survive closing and reopening it.

use crate::catalog::NodeCatalog;
use crate::graph::{Graph, GraphError, NestedPhase};
use crate::node::NodeId;

/// Result of asking to drill into a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubgraphOutcome {
    /// A nested graph was opened and is now current
    Opened,
    /// The node references an external resource; the caller decides whether
    /// to open that document
    ExternalResource(String),
    /// The node has no nested graph
    NotNested,
}

/// Breadcrumb-style navigator over a root graph and its nested phases
pub struct SubgraphNavigator {
    root: Graph,
    nested: Vec<Graph>,
}

impl SubgraphNavigator {
    /// Start navigation at a root graph
    pub fn new(root: Graph) -> Self {
        Self {
            root,
            nested: Vec::new(),
        }
    }

    /// The graph currently being edited
    pub fn current(&self) -> &Graph {
        self.nested.last().unwrap_or(&self.root)
    }

    /// The graph currently being edited, mutably
    pub fn current_mut(&mut self) -> &mut Graph {
        match self.nested.last_mut() {
            Some(graph) => graph,
            None => &mut self.root,
        }
    }

    /// How many levels deep the navigation is; zero at the root
    pub fn depth(&self) -> usize {
        self.nested.len()
    }

    /// Breadcrumb titles from the root down to the current graph
    pub fn breadcrumbs(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.root.title()).chain(self.nested.iter().map(Graph::title))
    }

    /// Drill into a node of the current graph.
    ///
    /// Embedded phases get a fresh editing view over the shared sub-phase
    /// resource; a phase that has no sub-graph yet gets an empty one.
    pub fn open_subgraph(&mut self, node: NodeId) -> Result<SubgraphOutcome, GraphError> {
        let current = self.current_mut();
        match current.nested_phase(node)? {
            NestedPhase::NotNested => Ok(SubgraphOutcome::NotNested),
            NestedPhase::External(path) => Ok(SubgraphOutcome::ExternalResource(path)),
            NestedPhase::Embedded(resource) => {
                let kind_token = current
                    .node(node)
                    .map(|n| n.kind_token.clone())
                    .unwrap_or_default();
                let title = format!(
                    "{} / {} [{node}]",
                    current.title(),
                    NodeCatalog::display_name(&kind_token)
                );
                let catalog = current.catalog();

                let mut graph = Graph::quest(title, resource, catalog);
                graph.generate_graph();
                graph.load_layout();
                self.nested.push(graph);
                Ok(SubgraphOutcome::Opened)
            }
        }
    }

    /// Step one level back up. Returns `false` at the root.
    pub fn go_back(&mut self) -> bool {
        match self.nested.pop() {
            Some(graph) => {
                graph.dispose();
                true
            }
            None => false,
        }
    }

    /// Jump to an absolute depth (zero is the root), tearing down everything
    /// below it. Returns `false` when the depth is not on the stack.
    pub fn jump_to(&mut self, depth: usize) -> bool {
        if depth > self.nested.len() {
            return false;
        }
        while self.nested.len() > depth {
            if let Some(graph) = self.nested.pop() {
                graph.dispose();
            }
        }
        true
    }

    /// Tear down the whole navigation, root included
    pub fn close(mut self) {
        while let Some(graph) = self.nested.pop() {
            graph.dispose();
        }
        self.root.dispose();
    }
}
