//! Save-game projection of runner state

use crate::types::ids::{NodeId, RunnerId, StoryboardName};
use crate::types::storyboard::NodeStatus;
use serde::{Deserialize, Serialize};

/// Persisted status of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeState {
    pub node_id: NodeId,
    pub status: NodeStatus,
}

/// Flat, engine-agnostic record of one runner's node statuses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub runner_id: RunnerId,
    pub storyboard_name: StoryboardName,
    pub node_states: Vec<NodeState>,
}

impl SnapshotEntry {
    pub fn status_of(&self, node: &NodeId) -> Option<NodeStatus> {
        self.node_states
            .iter()
            .find(|state| &state.node_id == node)
            .map(|state| state.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_uses_persisted_field_names() {
        let entry = SnapshotEntry {
            runner_id: RunnerId::from("village"),
            storyboard_name: StoryboardName::from("main"),
            node_states: vec![NodeState {
                node_id: NodeId::from("intro"),
                status: NodeStatus::Completed,
            }],
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "runnerId": "village",
                "storyboardName": "main",
                "nodeStates": [{"nodeId": "intro", "status": 2}]
            })
        );
        assert_eq!(entry.status_of(&NodeId::from("intro")), Some(NodeStatus::Completed));
        assert_eq!(entry.status_of(&NodeId::from("missing")), None);
    }
}
