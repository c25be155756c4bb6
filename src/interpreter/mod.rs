//! Command interpreter
//!
//! Executes one program at a time. The interpreter is a synchronous state
//! machine: `resume` runs instructions until one suspends (input, choice or
//! a timed action) or the program ends, and the controller calls it again
//! on later ticks with the elapsed time.

pub mod handlers;

#[cfg(test)]
mod tests;

pub use handlers::{CommandTable, Context, Flow, HandlerFn};

use crate::config::InterpreterConfig;
use crate::error::{InstructionError, NarrativeError};
use crate::stage::Stage;
use crate::types::event::StoryEvent;
use crate::types::ids::{LabelName, NodeId, StoryboardName};
use crate::types::program::{ChoiceOption, EndOfProgram, Instruction, Program, Reward};
use std::collections::HashMap;
use std::time::Duration;

const TARGET: &str = "storyweave::engine";

/// How a program run ended
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramOutcome {
    /// Normal end; rewards are granted by the owner
    Finished { rewards: Vec<Reward> },
    /// End with a redirect to another node
    Branched {
        target_node: NodeId,
        target_storyboard: Option<StoryboardName>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Suspension {
    Input,
    Choice(Vec<ChoiceOption>),
    Timer(Duration),
}

#[derive(Debug)]
pub struct Interpreter {
    program: Option<Program>,
    cursor: usize,
    labels: HashMap<LabelName, usize>,
    running: bool,
    waiting_for_input: bool,
    skip_requested: bool,
    suspension: Option<Suspension>,
    emitted: Vec<StoryEvent>,
    table: CommandTable,
    cinematic_reveal: Duration,
    max_steps_per_resume: usize,
}

impl Interpreter {
    pub fn new(config: &InterpreterConfig) -> Self {
        Self::with_table(config, CommandTable::standard())
    }

    pub fn with_table(config: &InterpreterConfig, table: CommandTable) -> Self {
        Self {
            program: None,
            cursor: 0,
            labels: HashMap::new(),
            running: false,
            waiting_for_input: false,
            skip_requested: false,
            suspension: None,
            emitted: Vec::new(),
            table,
            cinematic_reveal: crate::stage::seconds_to_duration(config.cinematic_reveal_seconds),
            max_steps_per_resume: config.max_steps_per_resume.max(1),
        }
    }

    pub fn table_mut(&mut self) -> &mut CommandTable {
        &mut self.table
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_waiting_for_input(&self) -> bool {
        self.waiting_for_input
    }

    pub fn is_waiting_for_choice(&self) -> bool {
        matches!(self.suspension, Some(Suspension::Choice(_)))
    }

    pub fn is_skip_requested(&self) -> bool {
        self.skip_requested
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Option texts while a choice is pending
    pub fn pending_choices(&self) -> Option<Vec<String>> {
        match &self.suspension {
            Some(Suspension::Choice(options)) => {
                Some(options.iter().map(|option| option.text.clone()).collect())
            }
            _ => None,
        }
    }

    /// Remaining time of the active timed wait
    pub fn remaining_wait(&self) -> Option<Duration> {
        match self.suspension {
            Some(Suspension::Timer(remaining)) => Some(remaining),
            _ => None,
        }
    }

    /// Events produced by instructions since the last call
    pub fn take_emitted(&mut self) -> Vec<StoryEvent> {
        std::mem::take(&mut self.emitted)
    }

    /// Begin executing `program` from its first instruction.
    ///
    /// Refused while another program runs, or when `program` is empty.
    pub fn start(&mut self, program: Program) -> Result<(), NarrativeError> {
        if self.running {
            log::warn!(target: TARGET, "start refused: a program is already running");
            return Err(NarrativeError::InterpreterBusy);
        }
        if program.is_empty() {
            log::warn!(target: TARGET, "start refused: program is empty");
            return Err(NarrativeError::EmptyProgram);
        }

        let (labels, duplicates) = program.label_index();
        for (name, index) in duplicates {
            log::warn!(
                target: TARGET,
                "duplicate label '{name}' at instruction {index} ignored; first occurrence wins"
            );
        }

        log::debug!(
            target: TARGET,
            "[Engine] start {:?} program with {} instructions",
            program.archetype,
            program.len()
        );
        self.program = Some(program);
        self.labels = labels;
        self.cursor = 0;
        self.running = true;
        self.waiting_for_input = false;
        self.skip_requested = false;
        self.suspension = None;
        Ok(())
    }

    /// Host "continue" signal; clears a wait-for-input suspension.
    pub fn continue_input(&mut self) -> Result<(), NarrativeError> {
        if !self.waiting_for_input {
            return Err(NarrativeError::NotWaiting { expected: "input" });
        }
        self.waiting_for_input = false;
        Ok(())
    }

    /// Host "choice selected" signal; moves the cursor to the option's label.
    pub fn select_choice(&mut self, index: usize) -> Result<(), NarrativeError> {
        let Some(Suspension::Choice(options)) = &self.suspension else {
            return Err(NarrativeError::NotWaiting { expected: "a choice" });
        };
        let option = options.get(index).ok_or(NarrativeError::InvalidChoice {
            index,
            count: options.len(),
        })?;

        log::debug!(
            target: TARGET,
            "[Choice] option {index} '{}' selected at {}",
            option.text,
            self.cursor
        );
        self.cursor = handlers::resolve_label(&self.labels, &option.target, self.cursor);
        self.suspension = None;
        Ok(())
    }

    /// Host "skip" signal; only shortens timed waits.
    pub fn request_skip(&mut self) {
        self.skip_requested = true;
    }

    /// Run until the next suspension or the end of the program.
    ///
    /// `elapsed` only counts against a timed wait that was already active.
    pub fn resume(&mut self, stage: &mut dyn Stage, elapsed: Duration) -> Option<ProgramOutcome> {
        if !self.running {
            return None;
        }
        if !self.settle_suspension(stage, elapsed) {
            return None;
        }

        for _ in 0..self.max_steps_per_resume {
            let Some(program) = &self.program else {
                return None;
            };
            let Some(instruction) = program.get(self.cursor).cloned() else {
                return Some(self.finish(stage, EndOfProgram::default()));
            };
            let archetype = program.archetype;

            match self.dispatch(archetype, &instruction, stage) {
                Ok(Flow::Advance) => self.cursor += 1,
                Ok(Flow::Redirect(target)) => self.cursor = target,
                Ok(Flow::WaitForInput) => {
                    self.waiting_for_input = true;
                    self.suspension = Some(Suspension::Input);
                    stage.set_continue_listener(true);
                    return None;
                }
                Ok(Flow::WaitForChoice(options)) => {
                    self.suspension = Some(Suspension::Choice(options));
                    return None;
                }
                Ok(Flow::WaitFor(duration)) if duration.is_zero() => self.cursor += 1,
                Ok(Flow::WaitFor(duration)) => {
                    self.skip_requested = false;
                    self.suspension = Some(Suspension::Timer(duration));
                    stage.set_skip_listener(true);
                    return None;
                }
                Ok(Flow::End(end)) => return Some(self.finish(stage, end)),
                Err(err) => {
                    log::warn!(
                        target: TARGET,
                        "skipping instruction {} ({:?}): {err}",
                        self.cursor,
                        instruction.kind()
                    );
                    self.cursor += 1;
                }
            }
        }

        log::warn!(
            target: TARGET,
            "step budget of {} exhausted at instruction {}; yielding until next tick",
            self.max_steps_per_resume,
            self.cursor
        );
        None
    }

    fn dispatch(
        &mut self,
        archetype: crate::types::program::Archetype,
        instruction: &Instruction,
        stage: &mut dyn Stage,
    ) -> Result<Flow, InstructionError> {
        let kind = instruction.kind().ok_or(InstructionError::Unknown)?;
        let handler = self
            .table
            .lookup(archetype, kind)
            .ok_or(InstructionError::NoHandler { kind })?;

        let mut ctx = Context {
            cursor: self.cursor,
            labels: &self.labels,
            stage,
            emitted: &mut self.emitted,
            cinematic_reveal: self.cinematic_reveal,
        };
        handler(&mut ctx, instruction)
    }

    /// Returns true when execution may continue past the current suspension.
    fn settle_suspension(&mut self, stage: &mut dyn Stage, elapsed: Duration) -> bool {
        match &mut self.suspension {
            None => true,
            Some(Suspension::Input) => {
                if self.waiting_for_input {
                    return false;
                }
                stage.set_continue_listener(false);
                self.suspension = None;
                self.cursor += 1;
                true
            }
            Some(Suspension::Choice(_)) => false,
            Some(Suspension::Timer(remaining)) => {
                if self.skip_requested {
                    log::debug!(target: TARGET, "[Skip] timed wait at {} cut short", self.cursor);
                    self.skip_requested = false;
                    *remaining = Duration::ZERO;
                } else {
                    *remaining = remaining.saturating_sub(elapsed);
                }
                if !remaining.is_zero() {
                    return false;
                }
                stage.set_skip_listener(false);
                self.suspension = None;
                self.cursor += 1;
                true
            }
        }
    }

    fn finish(&mut self, stage: &mut dyn Stage, end: EndOfProgram) -> ProgramOutcome {
        self.running = false;
        self.waiting_for_input = false;
        self.skip_requested = false;
        self.suspension = None;
        self.program = None;
        self.labels.clear();
        stage.set_continue_listener(false);
        stage.set_skip_listener(false);

        match (end.is_branching, end.target_node_id) {
            (true, Some(target_node)) => {
                log::debug!(target: TARGET, "[Engine] program branched to '{target_node}'");
                ProgramOutcome::Branched {
                    target_node,
                    target_storyboard: end.target_storyboard,
                }
            }
            (true, None) => {
                log::warn!(
                    target: TARGET,
                    "branching end without a target node; finishing normally"
                );
                ProgramOutcome::Finished {
                    rewards: end.rewards,
                }
            }
            (false, _) => {
                log::debug!(
                    target: TARGET,
                    "[Engine] program finished with {} rewards",
                    end.rewards.len()
                );
                ProgramOutcome::Finished {
                    rewards: end.rewards,
                }
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(&InterpreterConfig::default())
    }
}
