//! Per-storyboard node state machine
//!
//! A runner owns one storyboard and the status of each of its nodes
//! (NotStarted -> InProgress -> Completed, and back to NotStarted only for
//! repeatable nodes). It decides *which* node is ready; the controller
//! decides *when* it runs.

use crate::bus::{EventBus, Handler, SubscriptionId};
use crate::condition::ConditionKey;
use crate::config::RestorePolicy;
use crate::types::event::{StoryEvent, Topic};
use crate::types::ids::{NodeId, RunnerId, StoryboardName};
use crate::types::program::Program;
use crate::types::snapshot::{NodeState, SnapshotEntry};
use crate::types::storyboard::{NarrativeNode, NodeStatus, RunnerDefinition, Storyboard};
use std::collections::{HashMap, HashSet};

const TARGET: &str = "storyweave::scheduler";

#[derive(Debug)]
pub struct Runner {
    id: RunnerId,
    priority: i32,
    storyboard: Storyboard,
    node_status: HashMap<NodeId, NodeStatus>,
    node_lookup: HashMap<NodeId, usize>,
    subscriptions: Vec<SubscriptionId>,
}

impl Runner {
    /// Lower priority values are more important.
    pub fn new(id: impl Into<RunnerId>, priority: i32, storyboard: Storyboard) -> Self {
        Self {
            id: id.into(),
            priority,
            storyboard,
            node_status: HashMap::new(),
            node_lookup: HashMap::new(),
            subscriptions: Vec::new(),
        }
    }

    pub fn from_definition(definition: RunnerDefinition) -> Self {
        Self::new(definition.id, definition.priority, definition.storyboard)
    }

    pub fn id(&self) -> &RunnerId {
        &self.id
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn storyboard(&self) -> &Storyboard {
        &self.storyboard
    }

    pub fn storyboard_name(&self) -> &StoryboardName {
        &self.storyboard.name
    }

    pub fn node(&self, id: &NodeId) -> Option<&NarrativeNode> {
        self.node_lookup
            .get(id)
            .and_then(|&index| self.storyboard.nodes.get(index))
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.node_lookup.contains_key(id)
    }

    pub fn status_of(&self, id: &NodeId) -> Option<NodeStatus> {
        self.node_status.get(id).copied()
    }

    pub fn start_node_id(&self) -> Option<&NodeId> {
        self.storyboard.start_node().map(|node| &node.id)
    }

    /// Nodes currently marked InProgress, in storyboard order
    pub fn in_progress(&self) -> Vec<NodeId> {
        self.storyboard
            .nodes
            .iter()
            .filter(|node| self.status_of(&node.id) == Some(NodeStatus::InProgress))
            .map(|node| node.id.clone())
            .collect()
    }

    /// Rebuild status and lookup maps and (re)subscribe every condition.
    ///
    /// Returns nodes whose conditions already hold against settled state;
    /// the caller decides whether to start them.
    pub fn initialize_storyboard(&mut self, bus: &mut EventBus) -> Vec<NodeId> {
        self.teardown(bus);
        self.node_status.clear();
        self.node_lookup.clear();

        for (index, node) in self.storyboard.nodes.iter().enumerate() {
            if self.node_lookup.contains_key(&node.id) {
                log::warn!(
                    target: TARGET,
                    "runner '{}': duplicate node id '{}' ignored",
                    self.id,
                    node.id
                );
                continue;
            }
            if !node.archetype.accepts(node.program.archetype) {
                log::warn!(
                    target: TARGET,
                    "runner '{}': node '{}' is {:?} but its program is {:?}",
                    self.id,
                    node.id,
                    node.archetype,
                    node.program.archetype
                );
            }
            self.node_lookup.insert(node.id.clone(), index);
            self.node_status.insert(node.id.clone(), NodeStatus::NotStarted);
        }

        for (index, node) in self.storyboard.nodes.iter_mut().enumerate() {
            if self.node_lookup.get(&node.id) != Some(&index) {
                continue;
            }
            for (slot, condition) in node.conditions.iter_mut().enumerate() {
                condition.reset();
                condition.subscribe(
                    bus,
                    ConditionKey {
                        runner: self.id.clone(),
                        node: node.id.clone(),
                        index: slot,
                    },
                );
            }
        }

        for topic in [Topic::JumpRequested, Topic::TriggerRequested] {
            self.subscriptions
                .push(bus.subscribe(topic, Handler::Runner(self.id.clone())));
        }

        log::debug!(
            target: TARGET,
            "runner '{}' initialized storyboard '{}' ({} nodes)",
            self.id,
            self.storyboard.name,
            self.node_lookup.len()
        );
        self.evaluate_conditions(|_| true)
    }

    /// Drop every bus subscription this runner holds.
    pub fn teardown(&mut self, bus: &mut EventBus) {
        for id in self.subscriptions.drain(..) {
            bus.unsubscribe(id);
        }
        for node in &mut self.storyboard.nodes {
            for condition in &mut node.conditions {
                condition.unsubscribe(bus);
            }
        }
    }

    /// Feed an event delivered to one of this runner's conditions.
    ///
    /// Returns the node when this delivery made all of its conditions hold
    /// while it is NotStarted.
    pub fn on_condition_event(&mut self, key: &ConditionKey, event: &StoryEvent) -> Option<NodeId> {
        let index = *self.node_lookup.get(&key.node)?;
        let node = self.storyboard.nodes.get_mut(index)?;
        let condition = node.conditions.get_mut(key.index)?;
        if !condition.handle(event) {
            return None;
        }

        let status = self.node_status.get(&key.node).copied();
        if status != Some(NodeStatus::NotStarted) {
            log::trace!(
                target: TARGET,
                "runner '{}': node '{}' is {status:?}; condition ignored",
                self.id,
                key.node
            );
            return None;
        }
        node.all_conditions_satisfied().then(|| key.node.clone())
    }

    /// Mark `node` InProgress and hand out its program.
    ///
    /// `None` when the node is unknown or not NotStarted.
    pub fn begin_node(&mut self, node: &NodeId, bus: &mut EventBus) -> Option<Program> {
        let Some(status) = self.status_of(node) else {
            log::warn!(
                target: TARGET,
                "runner '{}': cannot start unknown node '{node}'",
                self.id
            );
            return None;
        };
        if status != NodeStatus::NotStarted {
            log::debug!(
                target: TARGET,
                "runner '{}': node '{node}' is {status:?}; start ignored",
                self.id
            );
            return None;
        }

        let program = self.node(node)?.program.clone();
        self.node_status.insert(node.clone(), NodeStatus::InProgress);
        bus.publish(StoryEvent::NodeStarted {
            runner_id: self.id.clone(),
            storyboard: self.storyboard.name.clone(),
            node_id: node.clone(),
        });
        log::debug!(target: TARGET, "runner '{}': node '{node}' started", self.id);
        Some(program)
    }

    /// Mark an InProgress node Completed and publish NodeCompleted.
    ///
    /// Repeatable nodes return to NotStarted with their conditions reset.
    /// Returns false when the node was not InProgress.
    pub fn complete_node(&mut self, node: &NodeId, bus: &mut EventBus) -> bool {
        if self.status_of(node) != Some(NodeStatus::InProgress) {
            log::warn!(
                target: TARGET,
                "runner '{}': complete of node '{node}' that is not in progress",
                self.id
            );
            return false;
        }

        self.node_status.insert(node.clone(), NodeStatus::Completed);
        bus.publish(StoryEvent::NodeCompleted {
            runner_id: self.id.clone(),
            storyboard: self.storyboard.name.clone(),
            node_id: node.clone(),
        });
        log::debug!(target: TARGET, "runner '{}': node '{node}' completed", self.id);

        if let Some(&index) = self.node_lookup.get(node)
            && let Some(narrative) = self.storyboard.nodes.get_mut(index)
            && narrative.is_repeatable
        {
            for condition in &mut narrative.conditions {
                condition.reset();
            }
            self.node_status.insert(node.clone(), NodeStatus::NotStarted);
            log::debug!(target: TARGET, "runner '{}': node '{node}' reset for repeat", self.id);
        }
        true
    }

    /// Force-complete InProgress nodes ahead of a jump into this storyboard.
    ///
    /// Ignored (returns false) when `storyboard` belongs to another runner.
    /// `keep` is left alone; it is the node currently executing.
    pub fn on_jump_requested(
        &mut self,
        storyboard: &StoryboardName,
        keep: Option<&NodeId>,
        bus: &mut EventBus,
    ) -> bool {
        if storyboard != &self.storyboard.name {
            return false;
        }
        for node in self.in_progress() {
            if Some(&node) != keep {
                self.complete_node(&node, bus);
            }
        }
        true
    }

    pub fn capture_state(&self) -> SnapshotEntry {
        SnapshotEntry {
            runner_id: self.id.clone(),
            storyboard_name: self.storyboard.name.clone(),
            node_states: self
                .storyboard
                .nodes
                .iter()
                .filter_map(|node| {
                    self.status_of(&node.id).map(|status| NodeState {
                        node_id: node.id.clone(),
                        status,
                    })
                })
                .collect(),
        }
    }

    /// Overwrite node statuses from a snapshot without publishing anything.
    ///
    /// `active` is the node currently executing for this runner; its status
    /// is kept. Only nodes whose status actually changes lose their condition
    /// latches, so restoring the state the runner already holds is a no-op.
    /// Returns nodes that should be started: ready nodes after condition
    /// evaluation, plus InProgress nodes under `RestorePolicy::Restart`.
    pub fn restore_state(
        &mut self,
        entry: &SnapshotEntry,
        policy: RestorePolicy,
        active: Option<&NodeId>,
    ) -> Vec<NodeId> {
        if entry.storyboard_name != self.storyboard.name {
            log::warn!(
                target: "storyweave::snapshot",
                "runner '{}': snapshot names storyboard '{}' but runner owns '{}'",
                self.id,
                entry.storyboard_name,
                self.storyboard.name
            );
        }

        let mut restart = Vec::new();
        let mut changed = HashSet::new();
        for state in &entry.node_states {
            if !self.contains_node(&state.node_id) {
                log::warn!(
                    target: "storyweave::snapshot",
                    "runner '{}': snapshot node '{}' not in storyboard; skipped",
                    self.id,
                    state.node_id
                );
                continue;
            }
            if Some(&state.node_id) == active {
                continue;
            }
            let status = match (state.status, policy) {
                (NodeStatus::InProgress, RestorePolicy::Restart) => {
                    restart.push(state.node_id.clone());
                    NodeStatus::NotStarted
                }
                (status, _) => status,
            };
            if self.status_of(&state.node_id) != Some(status) {
                changed.insert(state.node_id.clone());
            }
            self.node_status.insert(state.node_id.clone(), status);
        }

        for node in &mut self.storyboard.nodes {
            if changed.contains(&node.id)
                && self.node_status.get(&node.id) == Some(&NodeStatus::NotStarted)
            {
                for condition in &mut node.conditions {
                    condition.reset();
                }
            }
        }

        log::debug!(
            target: "storyweave::snapshot",
            "runner '{}' restored {} node states ({} changed)",
            self.id,
            entry.node_states.len(),
            changed.len()
        );

        // Settled state only moved if some status changed. Repeatable nodes
        // that were already waiting keep waiting for fresh events.
        let mut ready = if changed.is_empty() {
            Vec::new()
        } else {
            self.evaluate_conditions(|node| changed.contains(&node.id) || !node.is_repeatable)
        };
        for node in restart {
            if !ready.contains(&node) {
                ready.push(node);
            }
        }
        ready
    }

    /// NotStarted nodes accepted by `include`, with at least one condition,
    /// all of which hold after checking settled state.
    fn evaluate_conditions(&mut self, include: impl Fn(&NarrativeNode) -> bool) -> Vec<NodeId> {
        let statuses = self.node_status.clone();
        let mut ready = Vec::new();
        for node in &mut self.storyboard.nodes {
            if statuses.get(&node.id) != Some(&NodeStatus::NotStarted) || !include(node) {
                continue;
            }
            let mut changed = false;
            for condition in &mut node.conditions {
                changed |= condition.evaluate(&statuses);
            }
            if changed && node.all_conditions_satisfied() {
                ready.push(node.id.clone());
            }
        }
        ready
    }
}
