//! Tests for the interpreter module

use super::*;
use crate::stage::{RecordingStage, StageCall};
use crate::types::program::{
    Archetype, CameraCommand, ChoiceOption, EndOfProgram, Instruction, Program, Reward,
};

fn program(instructions: Vec<Instruction>) -> Program {
    Program::new(Archetype::Dialogue, instructions)
}

#[test]
fn dialogue_then_end_finishes_with_no_rewards() {
    let mut interpreter = Interpreter::default();
    let mut stage = RecordingStage::new();
    interpreter
        .start(program(vec![
            Instruction::dialogue("Guard", "Halt!"),
            Instruction::end(),
        ]))
        .unwrap();

    assert_eq!(interpreter.resume(&mut stage, Duration::ZERO), None);
    assert!(interpreter.is_waiting_for_input());
    assert_eq!(interpreter.cursor(), 0);

    // Still suspended until the host continues
    assert_eq!(interpreter.resume(&mut stage, Duration::from_secs(5)), None);

    interpreter.continue_input().unwrap();
    let outcome = interpreter.resume(&mut stage, Duration::ZERO);
    assert_eq!(outcome, Some(ProgramOutcome::Finished { rewards: vec![] }));
    assert!(!interpreter.is_running());
    assert_eq!(stage.dialogue_lines(), vec!["Halt!".to_string()]);
}

#[test]
fn implicit_end_is_appended() {
    let mut interpreter = Interpreter::default();
    let mut stage = RecordingStage::new();
    interpreter
        .start(program(vec![Instruction::label("only")]))
        .unwrap();

    let outcome = interpreter.resume(&mut stage, Duration::ZERO);
    assert_eq!(outcome, Some(ProgramOutcome::Finished { rewards: vec![] }));
}

#[test]
fn start_is_single_flight_and_rejects_empty_programs() {
    let mut interpreter = Interpreter::default();
    assert_eq!(
        interpreter.start(program(vec![])),
        Err(NarrativeError::EmptyProgram)
    );

    interpreter
        .start(program(vec![Instruction::dialogue("A", "x")]))
        .unwrap();
    assert_eq!(
        interpreter.start(program(vec![Instruction::end()])),
        Err(NarrativeError::InterpreterBusy)
    );
}

#[test]
fn jump_lands_exactly_on_label_index() {
    let mut interpreter = Interpreter::default();
    let mut stage = RecordingStage::new();
    interpreter
        .start(program(vec![
            Instruction::jump("target"),
            Instruction::dialogue("A", "skipped"),
            Instruction::label("target"),
            Instruction::dialogue("A", "reached"),
        ]))
        .unwrap();

    interpreter.resume(&mut stage, Duration::ZERO);
    assert_eq!(interpreter.cursor(), 3);
    assert_eq!(stage.dialogue_lines(), vec!["reached".to_string()]);
}

#[test]
fn jump_to_undefined_label_falls_through() {
    let mut interpreter = Interpreter::default();
    let mut stage = RecordingStage::new();
    interpreter
        .start(program(vec![
            Instruction::jump("missing"),
            Instruction::dialogue("A", "next"),
        ]))
        .unwrap();

    interpreter.resume(&mut stage, Duration::ZERO);
    assert_eq!(interpreter.cursor(), 1);
    assert_eq!(stage.dialogue_lines(), vec!["next".to_string()]);
}

#[test]
fn duplicate_labels_resolve_to_first_occurrence() {
    let mut interpreter = Interpreter::default();
    let mut stage = RecordingStage::new();
    interpreter
        .start(program(vec![
            Instruction::jump("dup"),
            Instruction::label("dup"),
            Instruction::dialogue("A", "first"),
            Instruction::label("dup"),
            Instruction::dialogue("A", "second"),
        ]))
        .unwrap();

    interpreter.resume(&mut stage, Duration::ZERO);
    assert_eq!(stage.dialogue_lines(), vec!["first".to_string()]);
}

#[test]
fn choice_redirects_to_selected_label() {
    let mut interpreter = Interpreter::default();
    let mut stage = RecordingStage::new();
    interpreter
        .start(program(vec![
            Instruction::Choice {
                prompt: Some("Which way?".to_string()),
                options: vec![
                    ChoiceOption::new("Left", "left"),
                    ChoiceOption::new("Right", "right"),
                ],
            },
            Instruction::label("left"),
            Instruction::dialogue("A", "went left"),
            Instruction::end(),
            Instruction::label("right"),
            Instruction::dialogue("A", "went right"),
        ]))
        .unwrap();

    assert_eq!(interpreter.resume(&mut stage, Duration::ZERO), None);
    assert!(interpreter.is_waiting_for_choice());
    assert_eq!(
        interpreter.pending_choices(),
        Some(vec!["Left".to_string(), "Right".to_string()])
    );
    assert_eq!(
        interpreter.select_choice(5),
        Err(NarrativeError::InvalidChoice { index: 5, count: 2 })
    );

    interpreter.select_choice(1).unwrap();
    assert_eq!(interpreter.cursor(), 4);
    interpreter.resume(&mut stage, Duration::ZERO);
    assert_eq!(stage.dialogue_lines(), vec!["went right".to_string()]);
}

#[test]
fn choice_to_undefined_label_falls_through() {
    let mut interpreter = Interpreter::default();
    let mut stage = RecordingStage::new();
    interpreter
        .start(program(vec![
            Instruction::Choice {
                prompt: None,
                options: vec![ChoiceOption::new("Go", "nowhere")],
            },
            Instruction::dialogue("A", "after"),
        ]))
        .unwrap();

    interpreter.resume(&mut stage, Duration::ZERO);
    interpreter.select_choice(0).unwrap();
    assert_eq!(interpreter.cursor(), 1);
}

#[test]
fn continue_without_wait_is_rejected() {
    let mut interpreter = Interpreter::default();
    assert_eq!(
        interpreter.continue_input(),
        Err(NarrativeError::NotWaiting { expected: "input" })
    );
    assert!(interpreter.select_choice(0).is_err());
}

#[test]
fn cinematic_dialogue_auto_advances_after_reveal() {
    let mut interpreter = Interpreter::default();
    let mut stage = RecordingStage::new();
    interpreter
        .start(Program::new(
            Archetype::CinematicText,
            vec![
                Instruction::Dialogue {
                    speaker: String::new(),
                    text: "Long ago...".to_string(),
                    reveal_seconds: Some(1.0),
                },
                Instruction::end(),
            ],
        ))
        .unwrap();

    assert_eq!(interpreter.resume(&mut stage, Duration::ZERO), None);
    assert!(!interpreter.is_waiting_for_input());
    assert_eq!(interpreter.remaining_wait(), Some(Duration::from_secs(1)));

    assert_eq!(
        interpreter.resume(&mut stage, Duration::from_millis(600)),
        None
    );
    let outcome = interpreter.resume(&mut stage, Duration::from_millis(400));
    assert_eq!(outcome, Some(ProgramOutcome::Finished { rewards: vec![] }));
}

#[test]
fn zero_length_reveal_advances_without_waiting() {
    let mut interpreter = Interpreter::default();
    let mut stage = RecordingStage::new();
    interpreter
        .start(Program::new(
            Archetype::CinematicText,
            vec![
                Instruction::Dialogue {
                    speaker: String::new(),
                    text: "Instantly".to_string(),
                    reveal_seconds: Some(0.0),
                },
                Instruction::end(),
            ],
        ))
        .unwrap();

    let outcome = interpreter.resume(&mut stage, Duration::ZERO);
    assert_eq!(outcome, Some(ProgramOutcome::Finished { rewards: vec![] }));
    assert_eq!(interpreter.remaining_wait(), None);
}

#[test]
fn skip_cuts_timed_wait_without_aborting() {
    let mut interpreter = Interpreter::default();
    let mut stage = RecordingStage::new();
    interpreter
        .start(program(vec![
            Instruction::CameraAction {
                action: CameraCommand::Shake {
                    intensity: 1.0,
                    seconds: 10.0,
                },
            },
            Instruction::dialogue("A", "after shake"),
        ]))
        .unwrap();

    interpreter.resume(&mut stage, Duration::ZERO);
    assert!(interpreter.remaining_wait().is_some());

    interpreter.request_skip();
    assert_eq!(interpreter.resume(&mut stage, Duration::ZERO), None);
    assert!(interpreter.is_running());
    assert!(interpreter.is_waiting_for_input());
    assert!(!interpreter.is_skip_requested());
    assert_eq!(stage.dialogue_lines(), vec!["after shake".to_string()]);
    assert!(stage.calls.contains(&StageCall::SkipListener(true)));
    assert!(stage.calls.contains(&StageCall::SkipListener(false)));
}

#[test]
fn choice_under_cinematic_archetype_is_skipped() {
    let mut interpreter = Interpreter::default();
    let mut stage = RecordingStage::instant();
    interpreter
        .start(Program::new(
            Archetype::CinematicText,
            vec![
                Instruction::Choice {
                    prompt: None,
                    options: vec![ChoiceOption::new("A", "a")],
                },
                Instruction::dialogue("", "continues"),
            ],
        ))
        .unwrap();

    let outcome = interpreter.resume(&mut stage, Duration::ZERO);
    assert_eq!(outcome, Some(ProgramOutcome::Finished { rewards: vec![] }));
    assert_eq!(stage.dialogue_lines(), vec!["continues".to_string()]);
    assert!(!stage
        .calls
        .iter()
        .any(|call| matches!(call, StageCall::Choices { .. })));
}

#[test]
fn unknown_instruction_is_skipped() {
    let mut interpreter = Interpreter::default();
    let mut stage = RecordingStage::new();
    interpreter
        .start(program(vec![
            Instruction::Unknown,
            Instruction::dialogue("A", "still here"),
        ]))
        .unwrap();

    interpreter.resume(&mut stage, Duration::ZERO);
    assert_eq!(interpreter.cursor(), 1);
    assert!(interpreter.is_waiting_for_input());
}

#[test]
fn branching_end_reports_target_instead_of_rewards() {
    let mut interpreter = Interpreter::default();
    let mut stage = RecordingStage::new();
    let mut end = EndOfProgram::branch_to("n2");
    end.rewards = vec![Reward {
        id: "coin".to_string(),
        amount: 3,
    }];
    interpreter
        .start(program(vec![Instruction::EndOfProgram(end)]))
        .unwrap();

    let outcome = interpreter.resume(&mut stage, Duration::ZERO);
    assert_eq!(
        outcome,
        Some(ProgramOutcome::Branched {
            target_node: NodeId::from("n2"),
            target_storyboard: None,
        })
    );
}

#[test]
fn branching_end_without_target_finishes_normally() {
    let mut interpreter = Interpreter::default();
    let mut stage = RecordingStage::new();
    interpreter
        .start(program(vec![Instruction::EndOfProgram(EndOfProgram {
            is_branching: true,
            ..Default::default()
        })]))
        .unwrap();

    let outcome = interpreter.resume(&mut stage, Duration::ZERO);
    assert_eq!(outcome, Some(ProgramOutcome::Finished { rewards: vec![] }));
}

#[test]
fn end_disables_listeners() {
    let mut interpreter = Interpreter::default();
    let mut stage = RecordingStage::new();
    interpreter
        .start(program(vec![Instruction::dialogue("A", "x")]))
        .unwrap();
    interpreter.resume(&mut stage, Duration::ZERO);
    interpreter.continue_input().unwrap();
    interpreter.resume(&mut stage, Duration::ZERO);

    let tail: Vec<_> = stage.calls.iter().rev().take(2).cloned().collect();
    assert_eq!(
        tail,
        vec![StageCall::SkipListener(false), StageCall::ContinueListener(false)]
    );
}

#[test]
fn trigger_instruction_is_emitted_for_the_controller() {
    let mut interpreter = Interpreter::default();
    let mut stage = RecordingStage::new();
    interpreter
        .start(program(vec![Instruction::TriggerOtherRunner {
            runner_id: "smith".into(),
            node_id: "forge".into(),
        }]))
        .unwrap();

    interpreter.resume(&mut stage, Duration::ZERO);
    assert_eq!(
        interpreter.take_emitted(),
        vec![StoryEvent::TriggerRequested {
            runner_id: "smith".into(),
            node_id: "forge".into(),
        }]
    );
    assert!(interpreter.take_emitted().is_empty());
}

#[test]
fn endless_loop_yields_after_step_budget() {
    let config = InterpreterConfig {
        max_steps_per_resume: 50,
        ..Default::default()
    };
    let mut interpreter = Interpreter::new(&config);
    let mut stage = RecordingStage::new();
    interpreter
        .start(program(vec![Instruction::label("top"), Instruction::jump("top")]))
        .unwrap();

    assert_eq!(interpreter.resume(&mut stage, Duration::ZERO), None);
    assert!(interpreter.is_running());
}
