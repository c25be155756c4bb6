//! Interactive terminal session over a story package
//!
//! The player drives a `Controller` with world events typed at the prompt
//! and answers dialogue and choices as the interpreter asks for them.

use crate::cli::terminal::{self, TerminalStage};
use crate::config::EngineConfig;
use crate::controller::Controller;
use crate::stage::Stage;
use crate::storage::{FileSaveSlots, SaveSlotRepository};
use crate::types::event::{StoryEvent, Topic};
use crate::types::storyboard::StoryPackage;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

/// Ticks run per player action before the bus must be quiet
const MAX_SETTLE_TICKS: usize = 32;

/// One line of player input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Empty line
    Continue,
    /// 0-based choice index
    Choose(usize),
    Enter(String),
    Interact(String),
    Save(u32),
    Load(u32),
    Status,
    Quit,
    Invalid(String),
}

pub fn parse_command(input: &str) -> Command {
    let input = input.trim();
    if input.is_empty() {
        return Command::Continue;
    }
    if let Ok(number) = input.parse::<usize>() {
        return match number {
            1..=9 => Command::Choose(number - 1),
            _ => Command::Invalid("choices are numbered 1-9".to_string()),
        };
    }

    let (verb, argument) = match input.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (input, ""),
    };
    match (verb, argument) {
        ("q" | "quit", _) => Command::Quit,
        ("status", _) => Command::Status,
        ("enter", id) if !id.is_empty() => Command::Enter(id.to_string()),
        ("interact", id) if !id.is_empty() => Command::Interact(id.to_string()),
        ("save" | "load", slot) => match slot.parse::<u32>() {
            Ok(slot) if verb == "save" => Command::Save(slot),
            Ok(slot) => Command::Load(slot),
            Err(_) => Command::Invalid(format!("usage: {verb} <slot number>")),
        },
        _ => Command::Invalid(format!("unknown command '{input}'")),
    }
}

/// What the session needs from the player next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Choice,
    Continue,
    /// No program is running; waiting for a world event
    World,
}

pub struct PlaySession<S: Stage> {
    controller: Controller<S>,
    slots: FileSaveSlots,
}

impl<S: Stage> PlaySession<S> {
    pub fn new(
        package: StoryPackage,
        config: &EngineConfig,
        stage: S,
        save_dir: impl Into<PathBuf>,
    ) -> anyhow::Result<Self> {
        let controller = Controller::from_package(package, config, stage)?;
        Ok(Self {
            controller,
            slots: FileSaveSlots::new(save_dir),
        })
    }

    pub fn controller(&self) -> &Controller<S> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller<S> {
        &mut self.controller
    }

    /// Tick until the running program needs the player or the bus is quiet.
    pub fn settle(&mut self) {
        for _ in 0..MAX_SETTLE_TICKS {
            self.controller.tick(Duration::ZERO);
            if self.controller.bus().pending() == 0 || self.prompt() != Prompt::World {
                break;
            }
        }
    }

    pub fn prompt(&self) -> Prompt {
        let interpreter = self.controller.interpreter();
        if interpreter.is_waiting_for_choice() {
            Prompt::Choice
        } else if interpreter.is_waiting_for_input() {
            Prompt::Continue
        } else {
            Prompt::World
        }
    }

    /// Apply one command. Returns false when the player quits.
    pub async fn handle(&mut self, command: Command) -> anyhow::Result<bool> {
        match (command, self.prompt()) {
            (Command::Quit, _) => return Ok(false),
            (Command::Continue, Prompt::Continue) => self.controller.continue_input()?,
            (Command::Choose(index), Prompt::Choice) => {
                if let Err(err) = self.controller.select_choice(index) {
                    println!("{err}");
                }
            }
            (Command::Enter(id), Prompt::World) => self.controller.enter_area(id),
            (Command::Interact(id), Prompt::World) => self.controller.trigger_interaction(id),
            (Command::Save(slot), Prompt::World) => {
                let entries = self.controller.capture_all_state();
                self.slots.save_slot(slot, &entries).await?;
                println!("[Saved slot {slot}]");
            }
            (Command::Load(slot), Prompt::World) => match self.slots.load_slot(slot).await? {
                Some(entries) => {
                    self.controller.restore_all_state(&entries);
                    println!("[Loaded slot {slot}]");
                }
                None => println!("Slot {slot} is empty."),
            },
            (Command::Status, _) => self.print_status(),
            (Command::Invalid(reason), _) => println!("{reason}"),
            (_, Prompt::Choice) => println!("Select a choice (1-9) or 'q' to quit."),
            (_, Prompt::Continue) => println!("Press Enter to continue, or 'q' to quit."),
            (_, Prompt::World) => {
                println!("Try 'enter <area>', 'interact <id>', 'save <n>', 'load <n>' or 'q'.")
            }
        }
        Ok(true)
    }

    fn print_status(&self) {
        for runner in self.controller.runners() {
            println!("{} (priority {}):", runner.id(), runner.priority());
            for state in runner.capture_state().node_states {
                println!("  {:<20} {:?}", state.node_id.as_str(), state.status);
            }
        }
        if let Some((runner, node)) = self.controller.active_node() {
            println!("running: {runner}/{node}");
        }
        println!();
    }
}

/// Run the player mode
pub async fn run_play(json: &str, debug: bool, save_dir: PathBuf) -> anyhow::Result<()> {
    let package = StoryPackage::from_json_str(json)?;
    let config = EngineConfig::default();
    let mut session = PlaySession::new(package, &config, TerminalStage::stdout(debug), save_dir)?;

    if debug {
        session
            .controller_mut()
            .observe(Topic::ProgramFinished, |event| {
                if let StoryEvent::ProgramFinished {
                    runner_id, node_id, ..
                } = event
                {
                    println!("[debug] finished {runner_id}/{node_id}");
                }
            });
    }

    terminal::clear_screen();
    println!("=== storyweave player ===");
    println!();
    println!("Controls:");
    println!("  Enter:           next");
    println!("  1-9:             select choice");
    println!("  enter <area>:    walk into a trigger area");
    println!("  interact <id>:   use an interactable");
    println!("  save/load <n>:   save slots");
    println!("  status:          node statuses");
    println!("  q:               quit");
    println!();

    loop {
        session.settle();
        let prompt = match session.prompt() {
            Prompt::Choice => "Select (1-9):",
            Prompt::Continue => "",
            Prompt::World => ">",
        };
        let Some(input) = get_input(prompt)? else {
            break;
        };
        if !session.handle(parse_command(&input)).await? {
            break;
        }
    }

    println!("Goodbye!");
    Ok(())
}

/// Read one line; `None` at end of input
fn get_input(prompt: &str) -> io::Result<Option<String>> {
    if !prompt.is_empty() {
        print!("{prompt} ");
        io::stdout().flush()?;
    }

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}
