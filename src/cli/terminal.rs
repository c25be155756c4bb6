//! Text rendering of stage calls for the terminal player
//!
//! Background and music are tracked so only changes are printed. Every
//! timed action completes immediately: the player is turn-based and has no
//! frame clock.

use crate::stage::{Completion, Stage};
use crate::types::program::{
    ActorCommand, AudioCommand, CameraCommand, Reward, ScreenEffectCommand,
};
use std::io::Write;
use std::time::Duration;

/// Clear the terminal screen
pub fn clear_screen() {
    print!("\x1b[2J\x1b[H");
    let _ = std::io::stdout().flush();
}

pub struct TerminalStage<W: Write> {
    out: W,
    background: Option<String>,
    music: Option<String>,
    /// Print actor, camera and effect calls too
    verbose: bool,
}

impl TerminalStage<std::io::Stdout> {
    pub fn stdout(verbose: bool) -> Self {
        Self::new(std::io::stdout(), verbose)
    }
}

impl<W: Write> TerminalStage<W> {
    pub fn new(out: W, verbose: bool) -> Self {
        Self {
            out,
            background: None,
            music: None,
            verbose,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
    }

    fn detail(&mut self, text: String) -> Completion {
        if self.verbose {
            self.line(&format!("[{text}]"));
        }
        Completion::Immediate
    }
}

impl<W: Write> Stage for TerminalStage<W> {
    fn show_dialogue(&mut self, speaker: &str, text: &str) {
        if !speaker.is_empty() {
            self.line(&format!("{speaker}:"));
        }
        self.line(text);
        self.line("");
    }

    fn show_choices(&mut self, prompt: Option<&str>, options: &[String]) {
        self.line("--- Choice ---");
        if let Some(prompt) = prompt {
            self.line(prompt);
        }
        for (i, option) in options.iter().enumerate() {
            self.line(&format!("{}. {option}", i + 1));
        }
        self.line("");
    }

    fn show_background(&mut self, image: &str) {
        if self.background.as_deref() != Some(image) {
            self.background = Some(image.to_string());
            self.line(&format!("[Background: {image}]"));
        }
    }

    fn hide_background(&mut self) {
        if self.background.take().is_some() {
            self.line("[Background cleared]");
        }
    }

    fn show_cinematic_text(&mut self, text: &str, _duration: Duration) -> Completion {
        self.line(&format!("  {text}"));
        self.line("");
        Completion::Immediate
    }

    fn actor(&mut self, actor: &str, command: &ActorCommand) -> Completion {
        let text = match command {
            ActorCommand::Show { position } => match position {
                Some(position) => format!("{actor} appears at {position}"),
                None => format!("{actor} appears"),
            },
            ActorCommand::Hide => format!("{actor} leaves"),
            ActorCommand::MoveTo { position, .. } => format!("{actor} moves to {position}"),
            ActorCommand::Animate { clip, .. } => format!("{actor}: {clip}"),
        };
        self.detail(text)
    }

    fn camera(&mut self, command: &CameraCommand) -> Completion {
        self.detail(format!("camera {command:?}"))
    }

    fn audio(&mut self, command: &AudioCommand) -> Completion {
        match command {
            AudioCommand::PlayMusic { track, .. } => {
                if self.music.as_deref() != Some(track.as_str()) {
                    self.music = Some(track.clone());
                    self.line(&format!("[Music: {track}]"));
                }
            }
            AudioCommand::StopMusic { .. } => {
                if self.music.take().is_some() {
                    self.line("[Music stopped]");
                }
            }
            AudioCommand::PlayOneShot { clip } => {
                self.detail(format!("sound {clip}"));
            }
        }
        Completion::Immediate
    }

    fn screen_effect(&mut self, effect: &ScreenEffectCommand) -> Completion {
        self.detail(format!("effect {effect:?}"))
    }

    fn grant_rewards(&mut self, rewards: &[Reward]) {
        for reward in rewards {
            self.line(&format!("[Reward: {} x{}]", reward.id, reward.amount));
        }
    }
}
