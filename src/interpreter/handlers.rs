//! Instruction handlers and the archetype-keyed command table

use crate::error::InstructionError;
use crate::stage::{Completion, Stage};
use crate::types::event::StoryEvent;
use crate::types::ids::LabelName;
use crate::types::program::{
    ActorCommand, Archetype, AudioCommand, BackgroundCommand, ChoiceOption, EndOfProgram,
    Instruction, InstructionKind,
};
use std::collections::HashMap;
use std::time::Duration;

const TARGET: &str = "storyweave::flow";

/// What the interpreter does after a handler returns
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Move to the next instruction
    Advance,
    /// Continue at an absolute instruction index
    Redirect(usize),
    /// Suspend until the host signals "continue"
    WaitForInput,
    /// Suspend until the host selects one of the options
    WaitForChoice(Vec<ChoiceOption>),
    /// Suspend for a timed action; skip cuts it short
    WaitFor(Duration),
    /// Terminate the program
    End(EndOfProgram),
}

impl From<Completion> for Flow {
    fn from(completion: Completion) -> Self {
        match completion {
            Completion::Immediate => Flow::Advance,
            Completion::After(duration) => Flow::WaitFor(duration),
        }
    }
}

/// Everything a handler may touch while executing one instruction
pub struct Context<'a> {
    pub cursor: usize,
    pub labels: &'a HashMap<LabelName, usize>,
    pub stage: &'a mut dyn Stage,
    /// Events to publish once control returns to the controller
    pub emitted: &'a mut Vec<StoryEvent>,
    pub cinematic_reveal: Duration,
}

impl Context<'_> {
    /// Index of `label`, or the next instruction when it is undefined.
    pub fn resolve_label(&self, label: &LabelName) -> usize {
        resolve_label(self.labels, label, self.cursor)
    }
}

pub fn resolve_label(labels: &HashMap<LabelName, usize>, label: &LabelName, cursor: usize) -> usize {
    match labels.get(label) {
        Some(&target) => {
            log::debug!(target: TARGET, "[Jump] {cursor} -> {target} (label={label})");
            target
        }
        None => {
            log::warn!(
                target: TARGET,
                "[Jump] undefined label '{label}' at instruction {cursor}; falling through"
            );
            cursor + 1
        }
    }
}

pub type HandlerFn = fn(&mut Context<'_>, &Instruction) -> Result<Flow, InstructionError>;

/// Handler registry keyed by (archetype, instruction kind)
#[derive(Clone)]
pub struct CommandTable {
    handlers: HashMap<(Archetype, InstructionKind), HandlerFn>,
}

impl CommandTable {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Default dispatch.
    ///
    /// Generic and Dialogue programs share the input-driven handlers.
    /// CinematicText reveals dialogue on a timer and has no Choice handler,
    /// so choices inside cinematic programs are skipped.
    pub fn standard() -> Self {
        let mut table = Self::empty();
        for archetype in [Archetype::Generic, Archetype::Dialogue, Archetype::CinematicText] {
            for kind in InstructionKind::ALL {
                table.register(archetype, kind, standard_handler(kind));
            }
        }
        table.register(
            Archetype::CinematicText,
            InstructionKind::Dialogue,
            cinematic_dialogue,
        );
        table.unregister(Archetype::CinematicText, InstructionKind::Choice);
        table
    }

    pub fn register(&mut self, archetype: Archetype, kind: InstructionKind, handler: HandlerFn) {
        self.handlers.insert((archetype, kind), handler);
    }

    pub fn unregister(&mut self, archetype: Archetype, kind: InstructionKind) {
        self.handlers.remove(&(archetype, kind));
    }

    pub fn lookup(&self, archetype: Archetype, kind: InstructionKind) -> Option<HandlerFn> {
        self.handlers.get(&(archetype, kind)).copied()
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.handlers.keys().collect();
        keys.sort_by_key(|(archetype, kind)| (format!("{archetype:?}"), format!("{kind:?}")));
        f.debug_struct("CommandTable").field("handlers", &keys).finish()
    }
}

fn standard_handler(kind: InstructionKind) -> HandlerFn {
    match kind {
        InstructionKind::Dialogue => dialogue,
        InstructionKind::ActorAction => actor_action,
        InstructionKind::BackgroundAction => background_action,
        InstructionKind::Choice => choice,
        InstructionKind::Label => label,
        InstructionKind::Jump => jump,
        InstructionKind::Audio => audio,
        InstructionKind::EndOfProgram => end_of_program,
        InstructionKind::CameraAction => camera_action,
        InstructionKind::ScreenEffect => screen_effect,
        InstructionKind::TriggerOtherRunner => trigger_other_runner,
    }
}

fn mismatch(expected: &str, found: &Instruction) -> InstructionError {
    InstructionError::invalid(format!("{expected} handler received {:?}", found.kind()))
}

pub fn dialogue(ctx: &mut Context<'_>, instruction: &Instruction) -> Result<Flow, InstructionError> {
    let Instruction::Dialogue { speaker, text, .. } = instruction else {
        return Err(mismatch("dialogue", instruction));
    };
    ctx.stage.show_dialogue(speaker, text);
    Ok(Flow::WaitForInput)
}

/// Timed reveal that advances on its own
pub fn cinematic_dialogue(
    ctx: &mut Context<'_>,
    instruction: &Instruction,
) -> Result<Flow, InstructionError> {
    let Instruction::Dialogue {
        text,
        reveal_seconds,
        ..
    } = instruction
    else {
        return Err(mismatch("cinematic dialogue", instruction));
    };
    let duration = reveal_seconds
        .map(crate::stage::seconds_to_duration)
        .unwrap_or(ctx.cinematic_reveal);
    Ok(ctx.stage.show_cinematic_text(text, duration).into())
}

fn actor_action(ctx: &mut Context<'_>, instruction: &Instruction) -> Result<Flow, InstructionError> {
    let Instruction::ActorAction { actor, action } = instruction else {
        return Err(mismatch("actor", instruction));
    };
    if actor.is_empty() {
        return Err(InstructionError::invalid("actor action without an actor"));
    }
    let completion = ctx.stage.actor(actor, action);
    match action {
        ActorCommand::Show { .. } => Ok(Flow::Advance),
        _ => Ok(completion.into()),
    }
}

fn background_action(
    ctx: &mut Context<'_>,
    instruction: &Instruction,
) -> Result<Flow, InstructionError> {
    let Instruction::BackgroundAction { action } = instruction else {
        return Err(mismatch("background", instruction));
    };
    match action {
        BackgroundCommand::Show { image } => ctx.stage.show_background(image),
        BackgroundCommand::Hide => ctx.stage.hide_background(),
    }
    Ok(Flow::Advance)
}

fn choice(ctx: &mut Context<'_>, instruction: &Instruction) -> Result<Flow, InstructionError> {
    let Instruction::Choice { prompt, options } = instruction else {
        return Err(mismatch("choice", instruction));
    };
    if options.is_empty() {
        return Err(InstructionError::invalid("choice without options"));
    }
    let texts: Vec<String> = options.iter().map(|option| option.text.clone()).collect();
    log::debug!(
        target: TARGET,
        "[Choice] presenting {} options at {}",
        texts.len(),
        ctx.cursor
    );
    ctx.stage.show_choices(prompt.as_deref(), &texts);
    Ok(Flow::WaitForChoice(options.clone()))
}

fn label(_ctx: &mut Context<'_>, _instruction: &Instruction) -> Result<Flow, InstructionError> {
    Ok(Flow::Advance)
}

fn jump(ctx: &mut Context<'_>, instruction: &Instruction) -> Result<Flow, InstructionError> {
    let Instruction::Jump { label } = instruction else {
        return Err(mismatch("jump", instruction));
    };
    Ok(Flow::Redirect(ctx.resolve_label(label)))
}

fn audio(ctx: &mut Context<'_>, instruction: &Instruction) -> Result<Flow, InstructionError> {
    let Instruction::Audio { action } = instruction else {
        return Err(mismatch("audio", instruction));
    };
    let completion = ctx.stage.audio(action);
    match action {
        AudioCommand::PlayOneShot { .. } => Ok(Flow::Advance),
        _ => Ok(completion.into()),
    }
}

fn end_of_program(
    _ctx: &mut Context<'_>,
    instruction: &Instruction,
) -> Result<Flow, InstructionError> {
    let Instruction::EndOfProgram(end) = instruction else {
        return Err(mismatch("end of program", instruction));
    };
    Ok(Flow::End(end.clone()))
}

fn camera_action(ctx: &mut Context<'_>, instruction: &Instruction) -> Result<Flow, InstructionError> {
    let Instruction::CameraAction { action } = instruction else {
        return Err(mismatch("camera", instruction));
    };
    Ok(ctx.stage.camera(action).into())
}

fn screen_effect(ctx: &mut Context<'_>, instruction: &Instruction) -> Result<Flow, InstructionError> {
    let Instruction::ScreenEffect { effect } = instruction else {
        return Err(mismatch("screen effect", instruction));
    };
    Ok(ctx.stage.screen_effect(effect).into())
}

fn trigger_other_runner(
    ctx: &mut Context<'_>,
    instruction: &Instruction,
) -> Result<Flow, InstructionError> {
    let Instruction::TriggerOtherRunner { runner_id, node_id } = instruction else {
        return Err(mismatch("trigger", instruction));
    };
    if runner_id.as_str().is_empty() || node_id.as_str().is_empty() {
        return Err(InstructionError::invalid("trigger without runner or node id"));
    }
    ctx.emitted.push(StoryEvent::TriggerRequested {
        runner_id: runner_id.clone(),
        node_id: node_id.clone(),
    });
    Ok(Flow::Advance)
}
