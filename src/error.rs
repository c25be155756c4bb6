//! Error types
//!
//! Configuration errors and invariant violations surface as `NarrativeError`
//! from the entry points that can refuse work. Failures inside a running
//! program are `InstructionError`s, which the dispatcher logs and skips.

use crate::types::ids::{NodeId, RunnerId, StoryboardName};
use crate::types::program::InstructionKind;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NarrativeError {
    #[error("Runner '{runner}' is already registered")]
    DuplicateRunner { runner: RunnerId },

    #[error("Runner '{runner}' is not registered")]
    UnknownRunner { runner: RunnerId },

    #[error("Node '{node}' not found in runner '{runner}'")]
    UnknownNode { runner: RunnerId, node: NodeId },

    #[error("No runner owns storyboard '{storyboard}'")]
    UnknownStoryboard { storyboard: StoryboardName },

    #[error("Runner '{runner}' is executing node '{node}' and cannot be unregistered")]
    RunnerBusy { runner: RunnerId, node: NodeId },

    #[error("Interpreter is already running a program")]
    InterpreterBusy,

    #[error("Program is empty")]
    EmptyProgram,

    #[error("Interpreter is not waiting for {expected}")]
    NotWaiting { expected: &'static str },

    #[error("Choice index {index} out of range ({count} options)")]
    InvalidChoice { index: usize, count: usize },

    #[error("Event bus has no delivery mechanism attached")]
    BusDetached,

    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl NarrativeError {
    pub fn unknown_runner(runner: impl Into<RunnerId>) -> Self {
        Self::UnknownRunner {
            runner: runner.into(),
        }
    }

    pub fn unknown_node(runner: impl Into<RunnerId>, node: impl Into<NodeId>) -> Self {
        Self::UnknownNode {
            runner: runner.into(),
            node: node.into(),
        }
    }
}

/// Failure of a single instruction; never aborts the program
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InstructionError {
    #[error("No handler registered for {kind:?}")]
    NoHandler { kind: InstructionKind },

    #[error("Unknown instruction")]
    Unknown,

    #[error("Invalid instruction: {reason}")]
    Invalid { reason: String },
}

impl InstructionError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}
