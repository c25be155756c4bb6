//! Events carried by the deferred bus

use crate::types::ids::{NodeId, RunnerId, StoryboardName};
use crate::types::program::Reward;
use serde::{Deserialize, Serialize};

/// Topics for event routing; one per `StoryEvent` variant
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    AreaEntered,
    InteractionTriggered,
    NodeStarted,
    NodeCompleted,
    ProgramFinished,
    JumpRequested,
    TriggerRequested,
}

/// World and engine events published on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoryEvent {
    /// The player entered a trigger volume
    AreaEntered { trigger_id: String },
    /// The player used an interactable
    InteractionTriggered { interaction_id: String },
    NodeStarted {
        runner_id: RunnerId,
        storyboard: StoryboardName,
        node_id: NodeId,
    },
    NodeCompleted {
        runner_id: RunnerId,
        storyboard: StoryboardName,
        node_id: NodeId,
    },
    /// A program ran to a non-branching end
    ProgramFinished {
        runner_id: RunnerId,
        node_id: NodeId,
        rewards: Vec<Reward>,
    },
    /// A program ended with a branch to another node
    JumpRequested {
        origin_runner: RunnerId,
        origin_node: NodeId,
        storyboard: StoryboardName,
        node_id: NodeId,
    },
    /// A program asked another runner to start a node
    TriggerRequested { runner_id: RunnerId, node_id: NodeId },
}

impl StoryEvent {
    pub fn topic(&self) -> Topic {
        match self {
            StoryEvent::AreaEntered { .. } => Topic::AreaEntered,
            StoryEvent::InteractionTriggered { .. } => Topic::InteractionTriggered,
            StoryEvent::NodeStarted { .. } => Topic::NodeStarted,
            StoryEvent::NodeCompleted { .. } => Topic::NodeCompleted,
            StoryEvent::ProgramFinished { .. } => Topic::ProgramFinished,
            StoryEvent::JumpRequested { .. } => Topic::JumpRequested,
            StoryEvent::TriggerRequested { .. } => Topic::TriggerRequested,
        }
    }

    pub fn area_entered(trigger_id: impl Into<String>) -> Self {
        StoryEvent::AreaEntered {
            trigger_id: trigger_id.into(),
        }
    }

    pub fn interaction(interaction_id: impl Into<String>) -> Self {
        StoryEvent::InteractionTriggered {
            interaction_id: interaction_id.into(),
        }
    }
}
