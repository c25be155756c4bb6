//! Storyboards (node graphs) and their narrative nodes

use crate::condition::Condition;
use crate::types::ids::{NodeId, RunnerId, StoryboardName};
use crate::types::program::{Archetype, Program};
use serde::{Deserialize, Serialize};

/// Runtime status of a narrative node
///
/// Serialized as an integer (0 = NotStarted, 1 = InProgress, 2 = Completed)
/// because that is the persisted save-game representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum NodeStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl From<NodeStatus> for u8 {
    fn from(status: NodeStatus) -> Self {
        match status {
            NodeStatus::NotStarted => 0,
            NodeStatus::InProgress => 1,
            NodeStatus::Completed => 2,
        }
    }
}

impl TryFrom<u8> for NodeStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NodeStatus::NotStarted),
            1 => Ok(NodeStatus::InProgress),
            2 => Ok(NodeStatus::Completed),
            other => Err(format!("invalid node status {other}")),
        }
    }
}

/// Graph unit pairing start conditions with a program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeNode {
    pub id: NodeId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub archetype: Archetype,
    #[serde(default)]
    pub is_start_node: bool,
    #[serde(default)]
    pub is_repeatable: bool,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Successor links, informational only
    #[serde(default)]
    pub next: Vec<NodeId>,
    #[serde(default)]
    pub program: Program,
}

impl NarrativeNode {
    pub fn new(id: impl Into<NodeId>, program: Program) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            archetype: program.archetype,
            is_start_node: false,
            is_repeatable: false,
            conditions: Vec::new(),
            next: Vec::new(),
            program,
        }
    }

    pub fn start_node(mut self) -> Self {
        self.is_start_node = true;
        self
    }

    pub fn repeatable(mut self) -> Self {
        self.is_repeatable = true;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn all_conditions_satisfied(&self) -> bool {
        self.conditions.iter().all(Condition::is_satisfied)
    }
}

/// Edge between two nodes, used for editing and visualization only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub from: NodeId,
    pub to: NodeId,
}

/// Named ordered collection of narrative nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storyboard {
    pub name: StoryboardName,
    #[serde(default)]
    pub nodes: Vec<NarrativeNode>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl Storyboard {
    pub fn new(name: impl Into<StoryboardName>, nodes: Vec<NarrativeNode>) -> Self {
        Self {
            name: name.into(),
            nodes,
            connections: Vec::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn node(&self, id: &NodeId) -> Option<&NarrativeNode> {
        self.nodes.iter().find(|node| &node.id == id)
    }

    /// First node flagged as a start node
    pub fn start_node(&self) -> Option<&NarrativeNode> {
        self.nodes.iter().find(|node| node.is_start_node)
    }
}

/// Authoring-side description of one runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerDefinition {
    pub id: RunnerId,
    #[serde(default)]
    pub priority: i32,
    pub storyboard: Storyboard,
}

/// A loadable set of runner definitions for one scene
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StoryPackage {
    #[serde(default)]
    pub runners: Vec<RunnerDefinition>,
}

impl StoryPackage {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
