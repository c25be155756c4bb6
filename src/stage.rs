//! External collaborators driven by the interpreter
//!
//! Presentation, actors, camera, audio, screen effects, input listeners and
//! reward granting all live outside the engine. The interpreter reaches them
//! through `Stage`; actions that take time report a `Completion` which the
//! interpreter waits out (or cuts short on skip) before advancing.

use crate::types::program::{
    ActorCommand, AudioCommand, BackgroundCommand, CameraCommand, Reward, ScreenEffectCommand,
};
use std::time::Duration;

/// How long the interpreter must wait after invoking a collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Immediate,
    After(Duration),
}

impl Completion {
    pub fn from_seconds(seconds: f32) -> Self {
        let duration = seconds_to_duration(seconds);
        if duration.is_zero() {
            Completion::Immediate
        } else {
            Completion::After(duration)
        }
    }
}

/// Non-finite or negative values collapse to zero
pub fn seconds_to_duration(seconds: f32) -> Duration {
    Duration::try_from_secs_f32(seconds).unwrap_or(Duration::ZERO)
}

pub trait Stage {
    fn show_dialogue(&mut self, _speaker: &str, _text: &str) {}

    fn show_choices(&mut self, _prompt: Option<&str>, _options: &[String]) {}

    fn show_background(&mut self, _image: &str) {}

    fn hide_background(&mut self) {}

    fn show_cinematic_text(&mut self, _text: &str, duration: Duration) -> Completion {
        Completion::After(duration)
    }

    fn actor(&mut self, _actor: &str, command: &ActorCommand) -> Completion {
        match command {
            ActorCommand::Show { .. } | ActorCommand::Hide => Completion::Immediate,
            ActorCommand::MoveTo { seconds, .. } | ActorCommand::Animate { seconds, .. } => {
                Completion::from_seconds(*seconds)
            }
        }
    }

    fn camera(&mut self, command: &CameraCommand) -> Completion {
        match command {
            CameraCommand::Focus { seconds, .. }
            | CameraCommand::Shake { seconds, .. }
            | CameraCommand::Reset { seconds } => Completion::from_seconds(*seconds),
        }
    }

    fn audio(&mut self, command: &AudioCommand) -> Completion {
        match command {
            AudioCommand::PlayMusic { fade_seconds, .. }
            | AudioCommand::StopMusic { fade_seconds } => Completion::from_seconds(*fade_seconds),
            AudioCommand::PlayOneShot { .. } => Completion::Immediate,
        }
    }

    fn screen_effect(&mut self, effect: &ScreenEffectCommand) -> Completion {
        match effect {
            ScreenEffectCommand::FadeOut { seconds }
            | ScreenEffectCommand::FadeIn { seconds }
            | ScreenEffectCommand::Flash { seconds } => Completion::from_seconds(*seconds),
        }
    }

    fn set_continue_listener(&mut self, _enabled: bool) {}

    fn set_skip_listener(&mut self, _enabled: bool) {}

    fn grant_rewards(&mut self, _rewards: &[Reward]) {}
}

/// Stage that presents nothing and keeps the nominal timings
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStage;

impl Stage for NullStage {}

/// One recorded collaborator call
#[derive(Debug, Clone, PartialEq)]
pub enum StageCall {
    Dialogue { speaker: String, text: String },
    Choices { prompt: Option<String>, options: Vec<String> },
    Background(BackgroundCommand),
    CinematicText { text: String, duration: Duration },
    Actor { actor: String, command: ActorCommand },
    Camera(CameraCommand),
    Audio(AudioCommand),
    ScreenEffect(ScreenEffectCommand),
    ContinueListener(bool),
    SkipListener(bool),
    Rewards(Vec<Reward>),
}

/// Stage that records every call; used by tests and dry runs
#[derive(Debug, Default, Clone)]
pub struct RecordingStage {
    pub calls: Vec<StageCall>,
    /// Report every timed action as finished immediately
    pub instant: bool,
}

impl RecordingStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instant() -> Self {
        Self {
            calls: Vec::new(),
            instant: true,
        }
    }

    pub fn dialogue_lines(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                StageCall::Dialogue { text, .. } | StageCall::CinematicText { text, .. } => {
                    Some(text.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn granted_rewards(&self) -> Vec<Reward> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                StageCall::Rewards(rewards) => Some(rewards.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn timed(&self, completion: Completion) -> Completion {
        if self.instant {
            Completion::Immediate
        } else {
            completion
        }
    }
}

impl Stage for RecordingStage {
    fn show_dialogue(&mut self, speaker: &str, text: &str) {
        self.calls.push(StageCall::Dialogue {
            speaker: speaker.to_string(),
            text: text.to_string(),
        });
    }

    fn show_choices(&mut self, prompt: Option<&str>, options: &[String]) {
        self.calls.push(StageCall::Choices {
            prompt: prompt.map(str::to_string),
            options: options.to_vec(),
        });
    }

    fn show_background(&mut self, image: &str) {
        self.calls.push(StageCall::Background(BackgroundCommand::Show {
            image: image.to_string(),
        }));
    }

    fn hide_background(&mut self) {
        self.calls
            .push(StageCall::Background(BackgroundCommand::Hide));
    }

    fn show_cinematic_text(&mut self, text: &str, duration: Duration) -> Completion {
        self.calls.push(StageCall::CinematicText {
            text: text.to_string(),
            duration,
        });
        self.timed(Completion::After(duration))
    }

    fn actor(&mut self, actor: &str, command: &ActorCommand) -> Completion {
        self.calls.push(StageCall::Actor {
            actor: actor.to_string(),
            command: command.clone(),
        });
        self.timed(NullStage.actor(actor, command))
    }

    fn camera(&mut self, command: &CameraCommand) -> Completion {
        self.calls.push(StageCall::Camera(command.clone()));
        self.timed(NullStage.camera(command))
    }

    fn audio(&mut self, command: &AudioCommand) -> Completion {
        self.calls.push(StageCall::Audio(command.clone()));
        self.timed(NullStage.audio(command))
    }

    fn screen_effect(&mut self, effect: &ScreenEffectCommand) -> Completion {
        self.calls.push(StageCall::ScreenEffect(effect.clone()));
        self.timed(NullStage.screen_effect(effect))
    }

    fn set_continue_listener(&mut self, enabled: bool) {
        self.calls.push(StageCall::ContinueListener(enabled));
    }

    fn set_skip_listener(&mut self, enabled: bool) {
        self.calls.push(StageCall::SkipListener(enabled));
    }

    fn grant_rewards(&mut self, rewards: &[Reward]) {
        self.calls.push(StageCall::Rewards(rewards.to_vec()));
    }
}
