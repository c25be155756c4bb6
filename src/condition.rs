//! Start conditions gating narrative nodes
//!
//! A condition listens on one bus topic and latches `satisfied` the first
//! time a matching event arrives. It never clears itself; the owning runner
//! resets it when the node repeats or the storyboard is re-initialized.

use crate::bus::{EventBus, Handler, SubscriptionId};
use crate::types::event::{StoryEvent, Topic};
use crate::types::ids::{NodeId, RunnerId};
use crate::types::storyboard::NodeStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const TARGET: &str = "storyweave::conditions";

/// Delivery address of a condition: the "on satisfied" slot of its owner
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConditionKey {
    pub runner: RunnerId,
    pub node: NodeId,
    pub index: usize,
}

/// Read access to a runner's node statuses
pub trait StatusLookup {
    fn status_of(&self, node: &NodeId) -> Option<NodeStatus>;
}

impl StatusLookup for HashMap<NodeId, NodeStatus> {
    fn status_of(&self, node: &NodeId) -> Option<NodeStatus> {
        self.get(node).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionKind {
    AreaEntered { trigger_id: String },
    InteractionTriggered { interaction_id: String },
    PreviousNodeCompleted { target_node_id: NodeId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(flatten)]
    kind: ConditionKind,
    #[serde(skip)]
    satisfied: bool,
    #[serde(skip)]
    subscription: Option<SubscriptionId>,
}

impl Condition {
    pub fn new(kind: ConditionKind) -> Self {
        Self {
            kind,
            satisfied: false,
            subscription: None,
        }
    }

    pub fn area_entered(trigger_id: impl Into<String>) -> Self {
        Self::new(ConditionKind::AreaEntered {
            trigger_id: trigger_id.into(),
        })
    }

    pub fn interaction(interaction_id: impl Into<String>) -> Self {
        Self::new(ConditionKind::InteractionTriggered {
            interaction_id: interaction_id.into(),
        })
    }

    pub fn previous_node_completed(target: impl Into<NodeId>) -> Self {
        Self::new(ConditionKind::PreviousNodeCompleted {
            target_node_id: target.into(),
        })
    }

    pub fn kind(&self) -> &ConditionKind {
        &self.kind
    }

    pub fn is_satisfied(&self) -> bool {
        self.satisfied
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn description(&self) -> String {
        match &self.kind {
            ConditionKind::AreaEntered { trigger_id } => {
                format!("player enters area '{trigger_id}'")
            }
            ConditionKind::InteractionTriggered { interaction_id } => {
                format!("player triggers interaction '{interaction_id}'")
            }
            ConditionKind::PreviousNodeCompleted { target_node_id } => {
                format!("node '{target_node_id}' is completed")
            }
        }
    }

    pub fn topic(&self) -> Topic {
        match self.kind {
            ConditionKind::AreaEntered { .. } => Topic::AreaEntered,
            ConditionKind::InteractionTriggered { .. } => Topic::InteractionTriggered,
            ConditionKind::PreviousNodeCompleted { .. } => Topic::NodeCompleted,
        }
    }

    pub fn reset(&mut self) {
        self.satisfied = false;
    }

    /// Attach this condition's bus handler, delivering to `key`.
    pub fn subscribe(&mut self, bus: &mut EventBus, key: ConditionKey) {
        self.unsubscribe(bus);
        self.subscription = Some(bus.subscribe(self.topic(), Handler::Condition(key)));
    }

    pub fn unsubscribe(&mut self, bus: &mut EventBus) {
        if let Some(id) = self.subscription.take() {
            bus.unsubscribe(id);
        }
    }

    /// Feed a delivered event; true exactly when this call satisfied it.
    pub fn handle(&mut self, event: &StoryEvent) -> bool {
        if self.satisfied || !self.matches(event) {
            return false;
        }
        self.satisfied = true;
        log::debug!(target: TARGET, "satisfied: {}", self.description());
        true
    }

    /// Check state that may already hold without waiting for an event.
    ///
    /// Only `PreviousNodeCompleted` looks at anything; the other variants
    /// depend purely on future world events.
    pub fn evaluate(&mut self, context: &impl StatusLookup) -> bool {
        if self.satisfied {
            return false;
        }
        match &self.kind {
            ConditionKind::PreviousNodeCompleted { target_node_id }
                if context.status_of(target_node_id) == Some(NodeStatus::Completed) =>
            {
                self.satisfied = true;
                log::debug!(target: TARGET, "satisfied on evaluate: {}", self.description());
                true
            }
            _ => false,
        }
    }

    fn matches(&self, event: &StoryEvent) -> bool {
        match (&self.kind, event) {
            (
                ConditionKind::AreaEntered { trigger_id },
                StoryEvent::AreaEntered { trigger_id: entered },
            ) => trigger_id == entered,
            (
                ConditionKind::InteractionTriggered { interaction_id },
                StoryEvent::InteractionTriggered {
                    interaction_id: used,
                },
            ) => interaction_id == used,
            (
                ConditionKind::PreviousNodeCompleted { target_node_id },
                StoryEvent::NodeCompleted { node_id, .. },
            ) => target_node_id == node_id,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ConditionKey {
        ConditionKey {
            runner: RunnerId::from("r"),
            node: NodeId::from("n"),
            index: 0,
        }
    }

    #[test]
    fn area_condition_latches_once() {
        let mut condition = Condition::area_entered("gate");
        assert!(!condition.is_satisfied());

        assert!(!condition.handle(&StoryEvent::area_entered("well")));
        assert!(condition.handle(&StoryEvent::area_entered("gate")));
        assert!(condition.is_satisfied());
        assert!(!condition.handle(&StoryEvent::area_entered("gate")));
    }

    #[test]
    fn reset_clears_satisfaction() {
        let mut condition = Condition::interaction("lever");
        condition.handle(&StoryEvent::interaction("lever"));
        condition.reset();
        assert!(!condition.is_satisfied());
        assert!(condition.handle(&StoryEvent::interaction("lever")));
    }

    #[test]
    fn previous_node_condition_matches_completion() {
        let mut condition = Condition::previous_node_completed("intro");
        assert_eq!(condition.topic(), Topic::NodeCompleted);

        let other = StoryEvent::NodeCompleted {
            runner_id: "r".into(),
            storyboard: "main".into(),
            node_id: "other".into(),
        };
        assert!(!condition.handle(&other));

        let done = StoryEvent::NodeCompleted {
            runner_id: "r".into(),
            storyboard: "main".into(),
            node_id: "intro".into(),
        };
        assert!(condition.handle(&done));
    }

    #[test]
    fn evaluate_sees_settled_state() {
        let mut statuses = HashMap::new();
        statuses.insert(NodeId::from("intro"), NodeStatus::InProgress);

        let mut condition = Condition::previous_node_completed("intro");
        assert!(!condition.evaluate(&statuses));

        statuses.insert(NodeId::from("intro"), NodeStatus::Completed);
        assert!(condition.evaluate(&statuses));
        assert!(!condition.evaluate(&statuses));

        let mut area = Condition::area_entered("gate");
        assert!(!area.evaluate(&statuses));
    }

    #[test]
    fn subscribe_replaces_previous_subscription() {
        let mut bus = EventBus::attached();
        let mut condition = Condition::area_entered("gate");

        condition.subscribe(&mut bus, key());
        condition.subscribe(&mut bus, key());
        assert_eq!(bus.subscription_count(), 1);
        assert!(condition.is_subscribed());

        condition.unsubscribe(&mut bus);
        assert_eq!(bus.subscription_count(), 0);
        assert!(!condition.is_subscribed());
    }

    #[test]
    fn runtime_state_is_not_serialized() {
        let mut condition = Condition::area_entered("gate");
        condition.handle(&StoryEvent::area_entered("gate"));

        let json = serde_json::to_value(&condition).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "area_entered", "trigger_id": "gate"})
        );

        let restored: Condition = serde_json::from_value(json).unwrap();
        assert!(!restored.is_satisfied());
    }
}
