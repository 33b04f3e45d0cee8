// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of node kinds available per graph kind.
//!
//! The catalog is built once at startup and injected into every graph
//! instance; the per-family kind lists are precomputed at construction, so no
//! process-wide static is involved.

use crate::graphs::quest::QuestNodePayload;
use crate::graphs::scene::SceneNodePayload;
use indexmap::IndexMap;

/// One of the two supported graph topologies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphKind {
    /// Quest flow graph, symmetric shared connection records
    Quest,
    /// Cinematic scene graph, asymmetric destination descriptors
    Scene,
}

/// Freshly constructed kind-specific state for a persisted node
#[derive(Debug, Clone)]
pub enum NodePayload {
    /// A quest node payload
    Quest(QuestNodePayload),
    /// A scene node payload
    Scene(SceneNodePayload),
}

impl NodePayload {
    /// The graph kind this payload belongs to
    pub fn family(&self) -> GraphKind {
        match self {
            Self::Quest(_) => GraphKind::Quest,
            Self::Scene(_) => GraphKind::Scene,
        }
    }
}

/// Descriptor of one concrete node kind
pub struct NodeKindSpec {
    /// Kind token, e.g. `questConditionNodeDefinition`
    pub token: String,
    /// Which graph kind the token is compatible with
    pub family: GraphKind,
    constructor: fn() -> NodePayload,
}

impl NodeKindSpec {
    /// Register a new kind descriptor
    pub fn new(
        token: impl Into<String>,
        family: GraphKind,
        constructor: fn() -> NodePayload,
    ) -> Self {
        Self {
            token: token.into(),
            family,
            constructor,
        }
    }

    /// Construct a fresh payload of this kind
    pub fn instantiate(&self) -> NodePayload {
        (self.constructor)()
    }
}

/// Registry mapping kind tokens to constructors
pub struct NodeCatalog {
    kinds: IndexMap<String, NodeKindSpec>,
    quest_kinds: Vec<String>,
    scene_kinds: Vec<String>,
}

impl NodeCatalog {
    /// Build a catalog from a list of kind descriptors
    pub fn with_kinds(specs: Vec<NodeKindSpec>) -> Self {
        let mut kinds = IndexMap::new();
        let mut quest_kinds = Vec::new();
        let mut scene_kinds = Vec::new();
        for spec in specs {
            match spec.family {
                GraphKind::Quest => quest_kinds.push(spec.token.clone()),
                GraphKind::Scene => scene_kinds.push(spec.token.clone()),
            }
            kinds.insert(spec.token.clone(), spec);
        }
        Self {
            kinds,
            quest_kinds,
            scene_kinds,
        }
    }

    /// The built-in kind set shipped with the editor
    pub fn built_in() -> Self {
        use GraphKind::{Quest, Scene};
        Self::with_kinds(vec![
            NodeKindSpec::new("questStartNodeDefinition", Quest, || {
                NodePayload::Quest(QuestNodePayload::Start)
            }),
            NodeKindSpec::new("questEndNodeDefinition", Quest, || {
                NodePayload::Quest(QuestNodePayload::End)
            }),
            NodeKindSpec::new("questCheckpointNodeDefinition", Quest, || {
                NodePayload::Quest(QuestNodePayload::Checkpoint)
            }),
            NodeKindSpec::new("questFlowControlNodeDefinition", Quest, || {
                NodePayload::Quest(QuestNodePayload::FlowControl)
            }),
            NodeKindSpec::new("questConditionNodeDefinition", Quest, || {
                NodePayload::Quest(QuestNodePayload::Condition)
            }),
            NodeKindSpec::new("questSwitchNodeDefinition", Quest, || {
                NodePayload::Quest(QuestNodePayload::Switch { cases: Vec::new() })
            }),
            NodeKindSpec::new("questRandomizerNodeDefinition", Quest, || {
                NodePayload::Quest(QuestNodePayload::Randomizer { branches: 2 })
            }),
            NodeKindSpec::new("questLogicalAndNodeDefinition", Quest, || {
                NodePayload::Quest(QuestNodePayload::LogicalAnd)
            }),
            NodeKindSpec::new("questLogicalHubNodeDefinition", Quest, || {
                NodePayload::Quest(QuestNodePayload::LogicalHub)
            }),
            NodeKindSpec::new("questPhaseNodeDefinition", Quest, || {
                NodePayload::Quest(QuestNodePayload::Phase {
                    phase: None,
                    external_path: None,
                })
            }),
            NodeKindSpec::new("scnStartNode", Scene, || {
                NodePayload::Scene(SceneNodePayload::Start)
            }),
            NodeKindSpec::new("scnEndNode", Scene, || {
                NodePayload::Scene(SceneNodePayload::End)
            }),
            NodeKindSpec::new("scnSectionNode", Scene, || {
                NodePayload::Scene(SceneNodePayload::Section)
            }),
            NodeKindSpec::new("scnQuestNode", Scene, || {
                NodePayload::Scene(SceneNodePayload::Quest)
            }),
            NodeKindSpec::new("scnCutControlNode", Scene, || {
                NodePayload::Scene(SceneNodePayload::CutControl)
            }),
            NodeKindSpec::new("scnChoiceNode", Scene, || {
                NodePayload::Scene(SceneNodePayload::Choice { options: Vec::new() })
            }),
            NodeKindSpec::new("scnHubNode", Scene, || {
                NodePayload::Scene(SceneNodePayload::Hub)
            }),
            NodeKindSpec::new("scnAndNode", Scene, || {
                NodePayload::Scene(SceneNodePayload::And)
            }),
            NodeKindSpec::new("scnXorNode", Scene, || {
                NodePayload::Scene(SceneNodePayload::Xor)
            }),
            NodeKindSpec::new("scnRandomizerNode", Scene, || {
                NodePayload::Scene(SceneNodePayload::Randomizer { branches: 2 })
            }),
        ])
    }

    /// Get a kind descriptor by token
    pub fn get(&self, token: &str) -> Option<&NodeKindSpec> {
        self.kinds.get(token)
    }

    /// Tokens compatible with the given graph kind, in registration order
    pub fn kinds_for(&self, family: GraphKind) -> &[String] {
        match family {
            GraphKind::Quest => &self.quest_kinds,
            GraphKind::Scene => &self.scene_kinds,
        }
    }

    /// UI display name for a kind token: the family prefix (`quest`/`scn`)
    /// and a trailing `NodeDefinition`/`Node` suffix are stripped.
    pub fn display_name(token: &str) -> &str {
        let name = token
            .strip_prefix("quest")
            .or_else(|| token.strip_prefix("scn"))
            .unwrap_or(token);
        if let Some(stripped) = name.strip_suffix("NodeDefinition") {
            stripped
        } else if let Some(stripped) = name.strip_suffix("Node") {
            stripped
        } else {
            name
        }
    }
}

impl Default for NodeCatalog {
    fn default() -> Self {
        Self::built_in()
    }
}
