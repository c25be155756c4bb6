//! Program (narrative event) representation
//!
//! A program is the immutable, ordered instruction list attached to a
//! narrative node. It is authored outside the engine and only read at
//! execution time.

use crate::types::ids::{LabelName, NodeId, RunnerId, StoryboardName};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Tag selecting command-dispatch semantics and compatibility rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    #[default]
    Generic,
    Dialogue,
    CinematicText,
}

impl Archetype {
    /// Whether a node of this archetype may run a program of archetype `program`.
    ///
    /// Generic programs run anywhere; every other pairing must match exactly.
    pub fn accepts(self, program: Archetype) -> bool {
        program == Archetype::Generic || self == program
    }
}

/// Ordered instruction list for one narrative event
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub archetype: Archetype,
    #[serde(default, deserialize_with = "lenient_instructions")]
    pub instructions: Vec<Instruction>,
}

impl Program {
    pub fn new(archetype: Archetype, instructions: Vec<Instruction>) -> Self {
        Self {
            archetype,
            instructions,
        }
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Map label names to instruction indices.
    ///
    /// The first occurrence of a name wins; later duplicates are returned
    /// separately so callers can report them.
    pub fn label_index(&self) -> (HashMap<LabelName, usize>, Vec<(LabelName, usize)>) {
        let mut labels = HashMap::new();
        let mut duplicates = Vec::new();
        for (idx, instruction) in self.instructions.iter().enumerate() {
            if let Instruction::Label { name } = instruction {
                if labels.contains_key(name) {
                    duplicates.push((name.clone(), idx));
                } else {
                    labels.insert(name.clone(), idx);
                }
            }
        }
        (labels, duplicates)
    }
}

/// `null` and unrecognised entries become `Instruction::Unknown` so that a
/// single bad entry is skipped at run time instead of rejecting the program.
fn lenient_instructions<'de, D>(deserializer: D) -> Result<Vec<Instruction>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Option<Instruction>> = Vec::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|entry| entry.unwrap_or(Instruction::Unknown))
        .collect())
}

/// A single instruction of a program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
    /// Spoken line; waits for input unless the archetype auto-advances
    Dialogue {
        speaker: String,
        text: String,
        /// Reveal time used by cinematic text; falls back to configuration
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reveal_seconds: Option<f32>,
    },
    ActorAction {
        actor: String,
        action: ActorCommand,
    },
    BackgroundAction {
        action: BackgroundCommand,
    },
    /// Present options; the selected option's label becomes the next cursor
    Choice {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<String>,
        options: Vec<ChoiceOption>,
    },
    /// Jump target marker (no-op during execution)
    Label {
        name: LabelName,
    },
    Jump {
        label: LabelName,
    },
    Audio {
        action: AudioCommand,
    },
    EndOfProgram(EndOfProgram),
    CameraAction {
        action: CameraCommand,
    },
    ScreenEffect {
        effect: ScreenEffectCommand,
    },
    /// Ask another runner to start one of its nodes
    TriggerOtherRunner {
        runner_id: RunnerId,
        node_id: NodeId,
    },
    #[serde(other)]
    Unknown,
}

impl Instruction {
    /// Discriminator used for archetype-keyed dispatch
    pub fn kind(&self) -> Option<InstructionKind> {
        let kind = match self {
            Instruction::Dialogue { .. } => InstructionKind::Dialogue,
            Instruction::ActorAction { .. } => InstructionKind::ActorAction,
            Instruction::BackgroundAction { .. } => InstructionKind::BackgroundAction,
            Instruction::Choice { .. } => InstructionKind::Choice,
            Instruction::Label { .. } => InstructionKind::Label,
            Instruction::Jump { .. } => InstructionKind::Jump,
            Instruction::Audio { .. } => InstructionKind::Audio,
            Instruction::EndOfProgram(_) => InstructionKind::EndOfProgram,
            Instruction::CameraAction { .. } => InstructionKind::CameraAction,
            Instruction::ScreenEffect { .. } => InstructionKind::ScreenEffect,
            Instruction::TriggerOtherRunner { .. } => InstructionKind::TriggerOtherRunner,
            Instruction::Unknown => return None,
        };
        Some(kind)
    }

    pub fn dialogue(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Instruction::Dialogue {
            speaker: speaker.into(),
            text: text.into(),
            reveal_seconds: None,
        }
    }

    pub fn label(name: impl Into<LabelName>) -> Self {
        Instruction::Label { name: name.into() }
    }

    pub fn jump(label: impl Into<LabelName>) -> Self {
        Instruction::Jump {
            label: label.into(),
        }
    }

    pub fn end() -> Self {
        Instruction::EndOfProgram(EndOfProgram::default())
    }
}

/// Instruction discriminator without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstructionKind {
    Dialogue,
    ActorAction,
    BackgroundAction,
    Choice,
    Label,
    Jump,
    Audio,
    EndOfProgram,
    CameraAction,
    ScreenEffect,
    TriggerOtherRunner,
}

impl InstructionKind {
    pub const ALL: [InstructionKind; 11] = [
        InstructionKind::Dialogue,
        InstructionKind::ActorAction,
        InstructionKind::BackgroundAction,
        InstructionKind::Choice,
        InstructionKind::Label,
        InstructionKind::Jump,
        InstructionKind::Audio,
        InstructionKind::EndOfProgram,
        InstructionKind::CameraAction,
        InstructionKind::ScreenEffect,
        InstructionKind::TriggerOtherRunner,
    ];
}

/// A choice option with its jump target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub text: String,
    pub target: LabelName,
}

impl ChoiceOption {
    pub fn new(text: impl Into<String>, target: impl Into<LabelName>) -> Self {
        Self {
            text: text.into(),
            target: target.into(),
        }
    }
}

/// Terminal instruction, optionally redirecting to another node
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EndOfProgram {
    #[serde(default)]
    pub is_branching: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_node_id: Option<NodeId>,
    /// Storyboard owning the target; the originating storyboard when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_storyboard: Option<StoryboardName>,
    #[serde(default)]
    pub rewards: Vec<Reward>,
}

impl EndOfProgram {
    pub fn branch_to(node: impl Into<NodeId>) -> Self {
        Self {
            is_branching: true,
            target_node_id: Some(node.into()),
            ..Default::default()
        }
    }

    pub fn with_rewards(rewards: Vec<Reward>) -> Self {
        Self {
            rewards,
            ..Default::default()
        }
    }
}

/// Reward granted when a program finishes without branching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: String,
    #[serde(default = "default_reward_amount")]
    pub amount: u32,
}

fn default_reward_amount() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActorCommand {
    /// Fire-and-forget
    Show {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        position: Option<String>,
    },
    Hide,
    MoveTo { position: String, seconds: f32 },
    Animate { clip: String, seconds: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackgroundCommand {
    Show { image: String },
    Hide,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioCommand {
    PlayMusic {
        track: String,
        #[serde(default)]
        fade_seconds: f32,
    },
    StopMusic {
        #[serde(default)]
        fade_seconds: f32,
    },
    /// Fire-and-forget
    PlayOneShot { clip: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CameraCommand {
    Focus { target: String, seconds: f32 },
    Shake { intensity: f32, seconds: f32 },
    Reset {
        #[serde(default)]
        seconds: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScreenEffectCommand {
    FadeOut { seconds: f32 },
    FadeIn { seconds: f32 },
    Flash { seconds: f32 },
}
