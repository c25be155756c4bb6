//! Core data types for the storyweave library
//!
//! - Ids: stable identifiers for runners, nodes, storyboards and labels
//! - Program: instruction lists executed by the interpreter
//! - Storyboard: narrative node graphs owned by runners
//! - Event: payloads carried by the deferred bus
//! - Snapshot: save-game projection of runner state

pub mod event;
pub mod ids;
pub mod program;
pub mod snapshot;
pub mod storyboard;

pub use event::{StoryEvent, Topic};
pub use ids::{LabelName, NodeId, RunnerId, StoryboardName};
pub use program::{Archetype, Instruction, InstructionKind, Program, Reward};
pub use snapshot::{NodeState, SnapshotEntry};
pub use storyboard::{NarrativeNode, NodeStatus, RunnerDefinition, StoryPackage, Storyboard};
