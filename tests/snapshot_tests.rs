//! Snapshot capture/restore and save slot persistence

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use storyweave::config::EngineConfig;
use storyweave::types::program::{Archetype, EndOfProgram, Instruction, Program, Reward};
use storyweave::types::snapshot::NodeState;
use storyweave::{
    Condition, Controller, FileSaveSlots, NarrativeNode, NodeStatus, RecordingStage,
    RestorePolicy, Runner, SaveSlotRepository, SnapshotEntry, StoryPackage, Storyboard, Topic,
};

fn rewarded(text: &str) -> Program {
    Program::new(
        Archetype::Dialogue,
        vec![
            Instruction::dialogue("", text),
            Instruction::EndOfProgram(EndOfProgram::with_rewards(vec![Reward {
                id: "xp".to_string(),
                amount: 10,
            }])),
        ],
    )
}

fn village() -> Runner {
    Runner::new(
        "village",
        0,
        Storyboard::new(
            "village",
            vec![
                NarrativeNode::new("intro", rewarded("intro")).start_node(),
                NarrativeNode::new("well", rewarded("well"))
                    .with_condition(Condition::interaction("well")),
                NarrativeNode::new("farewell", rewarded("farewell"))
                    .with_condition(Condition::previous_node_completed("well")),
            ],
        ),
    )
}

fn play_intro(controller: &mut Controller<RecordingStage>) {
    controller.tick(Duration::ZERO);
    controller.continue_input().unwrap();
    controller.tick(Duration::ZERO);
    controller.tick(Duration::ZERO);
}

fn count(controller: &mut Controller<RecordingStage>, topic: Topic) -> Rc<Cell<usize>> {
    let counter = Rc::new(Cell::new(0));
    let sink = Rc::clone(&counter);
    controller.observe(topic, move |_| sink.set(sink.get() + 1));
    counter
}

#[test]
fn restoring_a_fresh_capture_changes_nothing() {
    let mut controller = Controller::new(RecordingStage::new());
    controller.register(village()).unwrap();
    play_intro(&mut controller);

    let started = count(&mut controller, Topic::NodeStarted);
    let completed = count(&mut controller, Topic::NodeCompleted);
    let rewards_before = controller.stage().granted_rewards().len();

    let snapshot = controller.capture_all_state();
    controller.restore_all_state(&snapshot);
    controller.tick(Duration::ZERO);
    controller.tick(Duration::ZERO);

    assert_eq!(controller.capture_all_state(), snapshot);
    assert_eq!(started.get(), 0);
    assert_eq!(completed.get(), 0);
    assert_eq!(controller.stage().granted_rewards().len(), rewards_before);
    assert!(!controller.is_event_running());
}

/// Answer dialogue lines for a fixed number of ticks so chained nodes and
/// deferred events all play out
fn settle(controller: &mut Controller<RecordingStage>) {
    for _ in 0..16 {
        controller.tick(Duration::ZERO);
        controller.continue_input().ok();
    }
    controller.tick(Duration::ZERO);
}

struct Tally {
    started: Rc<Cell<usize>>,
    completed: Rc<Cell<usize>>,
    finished: Rc<Cell<usize>>,
}

impl Tally {
    fn watch(controller: &mut Controller<RecordingStage>) -> Self {
        Self {
            started: count(controller, Topic::NodeStarted),
            completed: count(controller, Topic::NodeCompleted),
            finished: count(controller, Topic::ProgramFinished),
        }
    }

    fn get(&self) -> (usize, usize, usize) {
        (self.started.get(), self.completed.get(), self.finished.get())
    }
}

#[test]
fn restore_does_not_rerun_a_repeatable_follow_up() {
    let shrine = Runner::new(
        "shrine",
        0,
        Storyboard::new(
            "shrine",
            vec![
                NarrativeNode::new("intro", rewarded("intro")).start_node(),
                NarrativeNode::new("chant", rewarded("chant"))
                    .repeatable()
                    .with_condition(Condition::previous_node_completed("intro")),
            ],
        ),
    );
    let mut controller = Controller::new(RecordingStage::new());
    let tally = Tally::watch(&mut controller);
    controller.register(shrine).unwrap();
    settle(&mut controller);

    assert_eq!(controller.stage().dialogue_lines(), vec!["intro", "chant"]);
    assert_eq!(
        controller.node_status(&"shrine".into(), &"chant".into()),
        Some(NodeStatus::NotStarted)
    );
    let before = tally.get();
    let rewards_before = controller.stage().granted_rewards().len();

    let snapshot = controller.capture_all_state();
    controller.restore_all_state(&snapshot);
    settle(&mut controller);
    controller.restore_all_state(&snapshot);
    settle(&mut controller);

    assert_eq!(tally.get(), before);
    assert_eq!(controller.stage().granted_rewards().len(), rewards_before);
    assert_eq!(controller.capture_all_state(), snapshot);
    assert!(!controller.is_event_running());
}

#[test]
fn restore_keeps_partially_satisfied_conditions() {
    let vault = NarrativeNode::new("vault", rewarded("vault"))
        .with_condition(Condition::area_entered("hall"))
        .with_condition(Condition::interaction("lever"));
    let mut controller = Controller::new(RecordingStage::new());
    let tally = Tally::watch(&mut controller);
    controller
        .register(Runner::new("keep", 0, Storyboard::new("keep", vec![vault])))
        .unwrap();

    controller.enter_area("hall");
    controller.tick(Duration::ZERO);
    let snapshot = controller.capture_all_state();
    controller.restore_all_state(&snapshot);
    controller.tick(Duration::ZERO);

    assert_eq!(tally.get(), (0, 0, 0));
    assert!(controller.stage().granted_rewards().is_empty());

    // The latched area condition survives, so the lever alone is enough
    controller.trigger_interaction("lever");
    controller.tick(Duration::ZERO);
    assert_eq!(
        controller.node_status(&"keep".into(), &"vault".into()),
        Some(NodeStatus::InProgress)
    );
}

#[test]
fn restore_while_a_request_waits_runs_it_once() {
    let single = |id: &str| {
        Runner::new(
            id,
            0,
            Storyboard::new(id, vec![NarrativeNode::new("n", rewarded(id))]),
        )
    };
    let mut controller = Controller::new(RecordingStage::new());
    let tally = Tally::watch(&mut controller);
    controller.register(single("first")).unwrap();
    controller.register(single("second")).unwrap();

    controller.trigger(&"first".into(), &"n".into()).unwrap();
    controller.trigger(&"second".into(), &"n".into()).unwrap();
    assert_eq!(controller.pending_requests().len(), 1);

    let snapshot = controller.capture_all_state();
    controller.restore_all_state(&snapshot);
    assert_eq!(controller.pending_requests().len(), 1);
    let (runner, _) = controller.active_node().unwrap();
    assert_eq!(runner.as_str(), "first");

    settle(&mut controller);
    assert_eq!(tally.get(), (2, 2, 2));
    assert_eq!(controller.stage().granted_rewards().len(), 2);
    assert_eq!(controller.stage().dialogue_lines(), vec!["first", "second"]);
}

#[test]
fn restore_into_a_fresh_scene_skips_completed_nodes() {
    let mut controller = Controller::new(RecordingStage::new());
    controller.register(village()).unwrap();
    play_intro(&mut controller);
    let snapshot = controller.capture_all_state();

    let mut restored = Controller::new(RecordingStage::new());
    restored.register(village()).unwrap();
    restored.restore_all_state(&snapshot);
    restored.tick(Duration::ZERO);

    // Kickoff finds the start node already completed
    assert!(!restored.is_event_running());
    assert_eq!(
        restored.node_status(&"village".into(), &"intro".into()),
        Some(NodeStatus::Completed)
    );
    assert!(restored.stage().dialogue_lines().is_empty());
}

#[test]
fn restore_starts_nodes_whose_conditions_already_hold() {
    let mut controller = Controller::new(RecordingStage::new());
    controller.register(village()).unwrap();

    let entry = SnapshotEntry {
        runner_id: "village".into(),
        storyboard_name: "village".into(),
        node_states: vec![
            NodeState {
                node_id: "intro".into(),
                status: NodeStatus::Completed,
            },
            NodeState {
                node_id: "well".into(),
                status: NodeStatus::Completed,
            },
        ],
    };
    controller.restore_all_state(&[entry]);

    let (_, node) = controller.active_node().unwrap();
    assert_eq!(node.as_str(), "farewell");
}

#[test]
fn restart_policy_reruns_interrupted_nodes() {
    let mut config = EngineConfig::default();
    config.scheduling.restore_in_progress = RestorePolicy::Restart;

    let entry = SnapshotEntry {
        runner_id: "village".into(),
        storyboard_name: "village".into(),
        node_states: vec![
            NodeState {
                node_id: "intro".into(),
                status: NodeStatus::Completed,
            },
            NodeState {
                node_id: "well".into(),
                status: NodeStatus::InProgress,
            },
        ],
    };

    let mut keep = Controller::new(RecordingStage::new());
    keep.register(village()).unwrap();
    keep.restore_all_state(std::slice::from_ref(&entry));
    assert!(!keep.is_event_running());
    assert_eq!(
        keep.node_status(&"village".into(), &"well".into()),
        Some(NodeStatus::InProgress)
    );

    let mut restart = Controller::with_config(&config, RecordingStage::new());
    restart.register(village()).unwrap();
    restart.restore_all_state(&[entry]);
    let (_, node) = restart.active_node().unwrap();
    assert_eq!(node.as_str(), "well");
}

#[test]
fn snapshot_for_unknown_runner_is_ignored() {
    let mut controller = Controller::new(RecordingStage::new());
    controller.register(village()).unwrap();
    let before = controller.capture_all_state();

    controller.restore_all_state(&[SnapshotEntry {
        runner_id: "ghost".into(),
        storyboard_name: "ghost".into(),
        node_states: vec![NodeState {
            node_id: "intro".into(),
            status: NodeStatus::Completed,
        }],
    }]);

    assert_eq!(controller.capture_all_state(), before);
}

#[tokio::test]
async fn save_slots_round_trip_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let slots = FileSaveSlots::new(dir.path());

    let mut controller = Controller::new(RecordingStage::new());
    controller.register(village()).unwrap();
    play_intro(&mut controller);
    let snapshot = controller.capture_all_state();

    slots.save_slot(2, &snapshot).await.unwrap();
    slots.save_slot(1, &[]).await.unwrap();
    assert_eq!(slots.list_slots().await.unwrap(), vec![1, 2]);

    let loaded = slots.load_slot(2).await.unwrap().unwrap();
    assert_eq!(loaded, snapshot);
    assert!(slots.load_slot(9).await.unwrap().is_none());

    let mut restored = Controller::new(RecordingStage::new());
    restored.register(village()).unwrap();
    restored.restore_all_state(&loaded);
    assert_eq!(restored.capture_all_state(), snapshot);

    slots.delete_slot(2).await.unwrap();
    assert_eq!(slots.list_slots().await.unwrap(), vec![1]);
}

#[test]
fn package_json_drives_a_whole_scene() {
    let json = r#"{
        "runners": [
            {
                "id": "inn",
                "priority": 0,
                "storyboard": {
                    "name": "inn",
                    "nodes": [
                        {
                            "id": "welcome",
                            "archetype": "dialogue",
                            "is_start_node": true,
                            "program": {
                                "archetype": "dialogue",
                                "instructions": [
                                    {"type": "dialogue", "speaker": "Keeper", "text": "Rest here."},
                                    {"type": "end_of_program", "rewards": [{"id": "room_key"}]}
                                ]
                            }
                        }
                    ]
                }
            }
        ]
    }"#;
    let package = StoryPackage::from_json_str(json).unwrap();
    let mut controller =
        Controller::from_package(package, &EngineConfig::default(), RecordingStage::new()).unwrap();

    play_intro(&mut controller);

    let rewards = controller.stage().granted_rewards();
    assert_eq!(rewards.len(), 1);
    assert_eq!(rewards[0].id, "room_key");
    assert_eq!(rewards[0].amount, 1);

    let bytes = storyweave::save(&controller.capture_all_state()).unwrap();
    let text = String::from_utf8(bytes.clone()).unwrap();
    assert!(text.contains("\"runnerId\": \"inn\""));
    assert!(text.contains("\"status\": 2"));
    assert_eq!(storyweave::load(&bytes).unwrap(), controller.capture_all_state());
}
