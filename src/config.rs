//! Engine configuration

use crate::debug::DebugConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scheduling and arbitration
    pub scheduling: SchedulingConfig,
    /// Command interpreter
    pub interpreter: InterpreterConfig,
    /// Diagnostic output
    pub debug: DebugConfig,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let mut config: Self = serde_json::from_str(json)?;
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// `STORYWEAVE_DEBUG` forces debug output on
    pub fn apply_env(&mut self) {
        if std::env::var(crate::debug::DEBUG_ENV).is_ok() {
            self.debug.enabled = true;
        }
    }
}

/// What restore does with a node saved as InProgress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestorePolicy {
    /// Keep the InProgress bookkeeping; the program is not resumed
    #[default]
    Keep,
    /// Reset the node and run its program again from the start
    Restart,
}

/// Scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Priority at which every runner starts on equal footing at kickoff
    pub equal_footing_priority: i32,
    /// Handling of InProgress nodes in restored snapshots
    pub restore_in_progress: RestorePolicy,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            equal_footing_priority: 0,
            restore_in_progress: RestorePolicy::Keep,
        }
    }
}

/// Interpreter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Reveal time for cinematic dialogue without an explicit duration
    pub cinematic_reveal_seconds: f32,
    /// Instructions executed per resume before yielding to the next tick
    pub max_steps_per_resume: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            cinematic_reveal_seconds: 2.0,
            max_steps_per_resume: 10_000,
        }
    }
}
