//! # storyweave
//!
//! A narrative scheduling and interpretation engine for games. Story content
//! is authored as storyboards: graphs of narrative nodes, each pairing start
//! conditions with a program of dialogue, choices and presentation commands.
//!
//! A [`Controller`] owns every [`Runner`] of a scene and guarantees that at
//! most one program executes at a time. Requests that arrive while a program
//! runs wait in a pending list and are released by runner priority (lower is
//! more important), then by arrival order.
//!
//! ## Quick Start
//!
//! ```rust
//! use storyweave::{Condition, Controller, NarrativeNode, RecordingStage, Runner, Storyboard};
//! use storyweave::types::program::{Archetype, Instruction, Program};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let greeting = Program::new(
//!     Archetype::Dialogue,
//!     vec![Instruction::dialogue("Elder", "Welcome to the village.")],
//! );
//! let storyboard = Storyboard::new(
//!     "village",
//!     vec![NarrativeNode::new("greeting", greeting).with_condition(Condition::area_entered("gate"))],
//! );
//!
//! let mut controller = Controller::new(RecordingStage::new());
//! controller.register(Runner::new("village", 0, storyboard))?;
//!
//! // World events are delivered on the next tick
//! controller.enter_area("gate");
//! controller.tick(Duration::ZERO);
//! assert_eq!(controller.stage().dialogue_lines(), vec!["Welcome to the village."]);
//!
//! // The dialogue line waits for the player
//! controller.continue_input()?;
//! controller.tick(Duration::ZERO);
//! assert!(!controller.is_event_running());
//! # Ok(())
//! # }
//! ```
//!
//! ## Save games
//!
//! [`Controller::capture_all_state`] projects every runner's node statuses
//! into flat [`SnapshotEntry`] records; [`storage`] turns them into bytes or
//! numbered save slots.

pub mod bus;
pub mod cli;
pub mod condition;
pub mod config;
pub mod controller;
pub mod debug;
pub mod error;
pub mod interpreter;
pub mod runner;
pub mod stage;
pub mod storage;
pub mod types;
pub mod validate;

pub use bus::{EventBus, SubscriptionId};
pub use condition::{Condition, ConditionKind};
pub use config::{EngineConfig, RestorePolicy};
pub use controller::Controller;
pub use error::{InstructionError, NarrativeError};
pub use interpreter::{Interpreter, ProgramOutcome};
pub use runner::Runner;
pub use stage::{Completion, NullStage, RecordingStage, Stage};
pub use storage::{FileSaveSlots, SaveSlotRepository, load, save};
pub use types::{
    NarrativeNode, NodeId, NodeStatus, RunnerId, SnapshotEntry, StoryEvent, StoryPackage,
    Storyboard, Topic,
};
