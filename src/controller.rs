//! Global scheduling controller
//!
//! The controller is the one context object a scene owns. It holds the
//! runner registry, the deferred bus, the interpreter and the single
//! "event executing" gate. Requests that arrive while the gate is held wait
//! in a pending list ordered by (runner priority, arrival sequence).
//!
//! Everything advances through [`Controller::tick`]:
//!
//! 1. kick off the initial events (first tick only),
//! 2. drain the bus, routing each event to conditions, runners and observers,
//! 3. resume the interpreter with the elapsed time.

use crate::bus::{EventBus, Handler, Route, SubscriptionId};
use crate::condition::ConditionKey;
use crate::config::{EngineConfig, SchedulingConfig};
use crate::error::NarrativeError;
use crate::interpreter::{Interpreter, ProgramOutcome};
use crate::runner::Runner;
use crate::stage::{NullStage, Stage};
use crate::types::event::{StoryEvent, Topic};
use crate::types::ids::{NodeId, RunnerId, StoryboardName};
use crate::types::program::Reward;
use crate::types::snapshot::SnapshotEntry;
use crate::types::storyboard::{NodeStatus, RunnerDefinition, StoryPackage};
use std::collections::BTreeMap;
use std::time::Duration;

const TARGET: &str = "storyweave::scheduler";
const SNAPSHOT: &str = "storyweave::snapshot";

/// A request waiting for the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub runner: RunnerId,
    pub node: NodeId,
    pub sequence: u64,
}

pub struct Controller<S: Stage = NullStage> {
    config: SchedulingConfig,
    bus: EventBus,
    runners: BTreeMap<RunnerId, Runner>,
    pending: Vec<PendingRequest>,
    next_sequence: u64,
    active: Option<(RunnerId, NodeId)>,
    interpreter: Interpreter,
    stage: S,
    kickstarted: bool,
}

impl Default for Controller<NullStage> {
    fn default() -> Self {
        Self::new(NullStage)
    }
}

impl<S: Stage> Controller<S> {
    pub fn new(stage: S) -> Self {
        Self::with_config(&EngineConfig::default(), stage)
    }

    pub fn with_config(config: &EngineConfig, stage: S) -> Self {
        Self {
            config: config.scheduling.clone(),
            bus: EventBus::attached(),
            runners: BTreeMap::new(),
            pending: Vec::new(),
            next_sequence: 0,
            active: None,
            interpreter: Interpreter::new(&config.interpreter),
            stage,
            kickstarted: false,
        }
    }

    /// Build a controller and register every runner of `package`.
    pub fn from_package(
        package: StoryPackage,
        config: &EngineConfig,
        stage: S,
    ) -> Result<Self, NarrativeError> {
        let mut controller = Self::with_config(config, stage);
        for definition in package.runners {
            controller.register_definition(definition)?;
        }
        Ok(controller)
    }

    // ----- registry -----

    /// Register a runner and initialize its storyboard.
    ///
    /// Duplicate ids are refused and the existing runner is left untouched.
    pub fn register(&mut self, mut runner: Runner) -> Result<(), NarrativeError> {
        let id = runner.id().clone();
        if self.runners.contains_key(&id) {
            log::error!(target: TARGET, "configuration error: runner '{id}' registered twice");
            return Err(NarrativeError::DuplicateRunner { runner: id });
        }

        let ready = runner.initialize_storyboard(&mut self.bus);
        log::debug!(
            target: TARGET,
            "registered runner '{id}' (priority {})",
            runner.priority()
        );
        self.runners.insert(id.clone(), runner);
        for node in ready {
            self.try_start_node(&id, &node);
        }
        Ok(())
    }

    pub fn register_definition(&mut self, definition: RunnerDefinition) -> Result<(), NarrativeError> {
        self.register(Runner::from_definition(definition))
    }

    /// Remove a runner, its subscriptions and its pending requests.
    ///
    /// Refused while the runner's program is executing.
    pub fn unregister(&mut self, id: &RunnerId) -> Result<Runner, NarrativeError> {
        if !self.runners.contains_key(id) {
            log::warn!(target: TARGET, "unregister of unknown runner '{id}'");
            return Err(NarrativeError::unknown_runner(id.clone()));
        }
        if let Some((runner, node)) = &self.active
            && runner == id
        {
            log::error!(
                target: TARGET,
                "invariant violation: runner '{id}' unregistered while node '{node}' is executing"
            );
            return Err(NarrativeError::RunnerBusy {
                runner: runner.clone(),
                node: node.clone(),
            });
        }

        self.pending.retain(|request| &request.runner != id);
        let mut runner = self
            .runners
            .remove(id)
            .ok_or_else(|| NarrativeError::unknown_runner(id.clone()))?;
        runner.teardown(&mut self.bus);
        log::debug!(target: TARGET, "unregistered runner '{id}'");
        Ok(runner)
    }

    pub fn runner(&self, id: &RunnerId) -> Option<&Runner> {
        self.runners.get(id)
    }

    /// Registered runners in id order
    pub fn runners(&self) -> impl Iterator<Item = &Runner> {
        self.runners.values()
    }

    pub fn node_status(&self, runner: &RunnerId, node: &NodeId) -> Option<NodeStatus> {
        self.runners.get(runner)?.status_of(node)
    }

    // ----- accessors -----

    pub fn stage(&self) -> &S {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut S {
        &mut self.stage
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn is_event_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_node(&self) -> Option<(&RunnerId, &NodeId)> {
        self.active.as_ref().map(|(runner, node)| (runner, node))
    }

    /// Pending requests in the order they would be released
    pub fn pending_requests(&self) -> Vec<PendingRequest> {
        let mut pending = self.pending.clone();
        pending.sort_by_key(|request| (self.priority_of(&request.runner), request.sequence));
        pending
    }

    // ----- scheduling -----

    /// Append a request with the next arrival sequence.
    ///
    /// Repeated requests for the same node each get their own entry; a
    /// request whose node can no longer begin is dropped on release.
    pub fn enqueue_node(&mut self, runner: &RunnerId, node: &NodeId) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        log::debug!(target: TARGET, "queued '{runner}/{node}' as #{sequence}");
        self.pending.push(PendingRequest {
            runner: runner.clone(),
            node: node.clone(),
            sequence,
        });
    }

    /// Start `node` now if the gate is free, otherwise queue it.
    pub fn try_start_node(&mut self, runner: &RunnerId, node: &NodeId) {
        if self.is_event_running() {
            self.enqueue_node(runner, node);
        } else {
            self.start_node(runner, node);
        }
    }

    /// Begin executing `node`. Returns true when its program is now running.
    ///
    /// A node with an empty program completes on the spot without rewards.
    pub fn start_node(&mut self, runner_id: &RunnerId, node: &NodeId) -> bool {
        let Some(runner) = self.runners.get_mut(runner_id) else {
            log::warn!(target: TARGET, "start of '{node}' for unknown runner '{runner_id}'");
            return false;
        };
        let Some(program) = runner.begin_node(node, &mut self.bus) else {
            return false;
        };

        if program.is_empty() {
            log::warn!(
                target: TARGET,
                "node '{runner_id}/{node}' has no program; completing immediately"
            );
            self.active = Some((runner_id.clone(), node.clone()));
            self.finish_active(Vec::new());
            return false;
        }

        match self.interpreter.start(program) {
            Ok(()) => {
                self.active = Some((runner_id.clone(), node.clone()));
                true
            }
            Err(err) => {
                log::error!(target: TARGET, "node '{runner_id}/{node}' could not start: {err}");
                if let Some(runner) = self.runners.get_mut(runner_id) {
                    runner.complete_node(node, &mut self.bus);
                }
                false
            }
        }
    }

    /// Release waiting requests, best first, until one holds the gate.
    pub fn try_start_next_pending_node(&mut self) {
        while !self.is_event_running() && !self.pending.is_empty() {
            let mut pending = std::mem::take(&mut self.pending);
            pending.sort_by_key(|request| (self.priority_of(&request.runner), request.sequence));
            let head = pending.remove(0);
            self.pending = pending;

            log::debug!(
                target: TARGET,
                "releasing '{}/{}' (#{})",
                head.runner,
                head.node,
                head.sequence
            );
            self.start_node(&head.runner, &head.node);
        }
    }

    /// Start the initial events once.
    ///
    /// When the most important priority equals the equal-footing value,
    /// every runner at that priority starts its start node in order of
    /// runner id, i.e. the runner's name (serialized through the pending
    /// list). Otherwise only the single most important runner does, ties
    /// broken by runner id.
    pub fn kickstart_initial_events(&mut self) {
        if self.kickstarted {
            return;
        }
        self.kickstarted = true;

        let Some(min) = self.runners.values().map(Runner::priority).min() else {
            return;
        };
        let candidates: Vec<RunnerId> = self
            .runners
            .values()
            .filter(|runner| runner.priority() == min)
            .map(|runner| runner.id().clone())
            .collect();
        let chosen = if min == self.config.equal_footing_priority {
            candidates
        } else {
            candidates.into_iter().take(1).collect()
        };

        for runner_id in chosen {
            let start = self
                .runners
                .get(&runner_id)
                .and_then(|runner| runner.start_node_id().cloned());
            match start {
                Some(node) => {
                    log::debug!(target: TARGET, "kickstart '{runner_id}/{node}'");
                    self.try_start_node(&runner_id, &node);
                }
                None => log::warn!(target: TARGET, "runner '{runner_id}' has no start node"),
            }
        }
    }

    // ----- tick -----

    /// Advance the scene by `dt`.
    pub fn tick(&mut self, dt: Duration) {
        self.kickstart_initial_events();
        self.drain_bus();
        self.pump(dt);
    }

    fn drain_bus(&mut self) {
        for event in self.bus.take_batch() {
            let topic = event.topic();
            let mut claimed = false;
            for id in self.bus.subscribers_of(topic) {
                match self.bus.route(id, &event) {
                    Some(Route::Condition(key)) => self.deliver_condition(&key, &event),
                    Some(Route::Runner(runner)) => {
                        claimed |= self.deliver_runner(&runner, &event);
                    }
                    None => {}
                }
            }
            self.settle(&event, claimed);
        }
    }

    fn deliver_condition(&mut self, key: &ConditionKey, event: &StoryEvent) {
        let ready = self
            .runners
            .get_mut(&key.runner)
            .and_then(|runner| runner.on_condition_event(key, event));
        if let Some(node) = ready {
            self.try_start_node(&key.runner, &node);
        }
    }

    /// Returns true when `runner_id` acted on the event.
    fn deliver_runner(&mut self, runner_id: &RunnerId, event: &StoryEvent) -> bool {
        match event {
            StoryEvent::TriggerRequested { runner_id: target, node_id } if target == runner_id => {
                self.start_known_node(runner_id, node_id);
                true
            }
            StoryEvent::JumpRequested {
                storyboard,
                node_id,
                ..
            } => {
                let keep = self
                    .active
                    .as_ref()
                    .filter(|(active, _)| active == runner_id)
                    .map(|(_, node)| node.clone());
                let Some(runner) = self.runners.get_mut(runner_id) else {
                    return false;
                };
                if !runner.on_jump_requested(storyboard, keep.as_ref(), &mut self.bus) {
                    return false;
                }
                log::debug!(target: "storyweave::flow", "jump into '{storyboard}/{node_id}'");
                self.start_known_node(runner_id, node_id);
                true
            }
            _ => false,
        }
    }

    fn start_known_node(&mut self, runner_id: &RunnerId, node: &NodeId) {
        let known = self
            .runners
            .get(runner_id)
            .is_some_and(|runner| runner.contains_node(node));
        if known {
            self.try_start_node(runner_id, node);
        } else {
            log::error!(
                target: TARGET,
                "data error: {}",
                NarrativeError::unknown_node(runner_id.clone(), node.clone())
            );
        }
    }

    /// Work that happens once per event after every subscriber saw it.
    fn settle(&mut self, event: &StoryEvent, claimed: bool) {
        match event {
            StoryEvent::TriggerRequested { runner_id, .. } if !claimed => {
                log::error!(
                    target: TARGET,
                    "data error: trigger for unregistered runner '{runner_id}'"
                );
            }
            StoryEvent::JumpRequested {
                origin_runner,
                origin_node,
                storyboard,
                ..
            } => {
                if !claimed {
                    log::error!(
                        target: TARGET,
                        "data error: {}",
                        NarrativeError::UnknownStoryboard {
                            storyboard: storyboard.clone()
                        }
                    );
                }
                if let Some(runner) = self.runners.get_mut(origin_runner)
                    && runner.status_of(origin_node) == Some(NodeStatus::InProgress)
                {
                    runner.complete_node(origin_node, &mut self.bus);
                }
                self.try_start_next_pending_node();
            }
            _ => {}
        }
    }

    fn pump(&mut self, dt: Duration) {
        let mut elapsed = dt;
        while self.interpreter.is_running() {
            let outcome = self.interpreter.resume(&mut self.stage, elapsed);
            elapsed = Duration::ZERO;
            for event in self.interpreter.take_emitted() {
                self.bus.publish(event);
            }

            match outcome {
                None => break,
                Some(ProgramOutcome::Finished { rewards }) => self.finish_active(rewards),
                Some(ProgramOutcome::Branched {
                    target_node,
                    target_storyboard,
                }) => {
                    self.branch_active(target_node, target_storyboard);
                    break;
                }
            }
        }
    }

    fn finish_active(&mut self, rewards: Vec<Reward>) {
        let Some((runner_id, node)) = self.active.take() else {
            return;
        };
        if let Some(runner) = self.runners.get_mut(&runner_id) {
            runner.complete_node(&node, &mut self.bus);
        }
        if !rewards.is_empty() {
            self.stage.grant_rewards(&rewards);
        }
        self.bus.publish(StoryEvent::ProgramFinished {
            runner_id,
            node_id: node,
            rewards,
        });
        self.try_start_next_pending_node();
    }

    /// Free the gate and publish the jump; the origin node is completed
    /// when the jump is delivered.
    fn branch_active(&mut self, target: NodeId, storyboard: Option<StoryboardName>) {
        let Some((runner_id, node)) = self.active.take() else {
            return;
        };
        let storyboard = storyboard.or_else(|| {
            self.runners
                .get(&runner_id)
                .map(|runner| runner.storyboard_name().clone())
        });
        let Some(storyboard) = storyboard else {
            log::error!(target: TARGET, "branch from unregistered runner '{runner_id}'");
            return;
        };
        log::debug!(
            target: "storyweave::flow",
            "'{runner_id}/{node}' branches to '{storyboard}/{target}'"
        );
        self.bus.publish(StoryEvent::JumpRequested {
            origin_runner: runner_id,
            origin_node: node,
            storyboard,
            node_id: target,
        });
    }

    fn priority_of(&self, runner: &RunnerId) -> i32 {
        self.runners
            .get(runner)
            .map(Runner::priority)
            .unwrap_or(i32::MAX)
    }

    // ----- host input -----

    pub fn continue_input(&mut self) -> Result<(), NarrativeError> {
        self.interpreter.continue_input()
    }

    pub fn select_choice(&mut self, index: usize) -> Result<(), NarrativeError> {
        self.interpreter.select_choice(index)
    }

    pub fn request_skip(&mut self) {
        self.interpreter.request_skip();
    }

    // ----- world events -----

    /// Queue a world event for the next tick.
    pub fn publish(&mut self, event: StoryEvent) {
        self.bus.publish(event);
    }

    pub fn enter_area(&mut self, trigger_id: impl Into<String>) {
        self.publish(StoryEvent::area_entered(trigger_id));
    }

    pub fn trigger_interaction(&mut self, interaction_id: impl Into<String>) {
        self.publish(StoryEvent::interaction(interaction_id));
    }

    /// Explicitly request `node` of `runner`, bypassing its conditions.
    pub fn trigger(&mut self, runner: &RunnerId, node: &NodeId) -> Result<(), NarrativeError> {
        let known = self
            .runners
            .get(runner)
            .ok_or_else(|| NarrativeError::unknown_runner(runner.clone()))?
            .contains_node(node);
        if !known {
            return Err(NarrativeError::unknown_node(runner.clone(), node.clone()));
        }
        self.try_start_node(runner, node);
        Ok(())
    }

    /// Receive every event of `topic` at the tick it is delivered.
    pub fn observe(
        &mut self,
        topic: Topic,
        callback: impl FnMut(&StoryEvent) + 'static,
    ) -> SubscriptionId {
        self.bus.subscribe(topic, Handler::Observer(Box::new(callback)))
    }

    pub fn stop_observing(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    // ----- snapshot -----

    /// Node statuses of every runner, in runner id order
    pub fn capture_all_state(&self) -> Vec<SnapshotEntry> {
        self.runners.values().map(Runner::capture_state).collect()
    }

    /// Apply saved node statuses.
    ///
    /// Entries for unknown runners are skipped with a warning. Completed
    /// nodes are never re-run; nodes whose conditions hold against the
    /// restored state are requested, then the pending list is released.
    pub fn restore_all_state(&mut self, entries: &[SnapshotEntry]) {
        let policy = self.config.restore_in_progress;
        let mut ready = Vec::new();
        for entry in entries {
            let active = self
                .active
                .as_ref()
                .filter(|(runner, _)| runner == &entry.runner_id)
                .map(|(_, node)| node.clone());
            let Some(runner) = self.runners.get_mut(&entry.runner_id) else {
                log::warn!(
                    target: SNAPSHOT,
                    "snapshot for unregistered runner '{}' ignored",
                    entry.runner_id
                );
                continue;
            };
            for node in runner.restore_state(entry, policy, active.as_ref()) {
                ready.push((entry.runner_id.clone(), node));
            }
        }

        self.pending.retain(|request| {
            self.runners
                .get(&request.runner)
                .and_then(|runner| runner.status_of(&request.node))
                == Some(NodeStatus::NotStarted)
        });
        for (runner, node) in ready {
            let waiting = self
                .pending
                .iter()
                .any(|request| request.runner == runner && request.node == node);
            if !waiting {
                self.try_start_node(&runner, &node);
            }
        }
        self.try_start_next_pending_node();
    }
}
