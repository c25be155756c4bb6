//! Debug logging
//!
//! The library logs through the `log` facade with one target per concern.
//! `DebugLogger` is the stderr/file backend used by the binary: it maps
//! targets to categories and filters by level and enabled categories.
//! Warnings and errors always pass so data and configuration problems are
//! never silent.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::Mutex;

/// Environment variable that enables debug output
pub const DEBUG_ENV: &str = "STORYWEAVE_DEBUG";

/// Debug log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// All internal state changes
    Trace,
    /// Development debugging information
    Debug,
    /// Important state changes
    Info,
    /// Potential issues
    Warn,
    /// Error situations
    Error,
}

impl LogLevel {
    fn filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

/// Debug log category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DebugCategory {
    /// Interpreter execution
    Engine,
    /// Control flow (jumps, choices)
    Flow,
    /// Bus publish and delivery
    Bus,
    /// Condition satisfaction
    Conditions,
    /// Runner and controller arbitration
    Scheduler,
    /// Capture and restore
    Snapshot,
}

impl DebugCategory {
    pub fn from_target(target: &str) -> Option<Self> {
        let concern = target.strip_prefix("storyweave::")?;
        match concern.split("::").next()? {
            "engine" => Some(DebugCategory::Engine),
            "flow" => Some(DebugCategory::Flow),
            "bus" => Some(DebugCategory::Bus),
            "conditions" => Some(DebugCategory::Conditions),
            "scheduler" => Some(DebugCategory::Scheduler),
            "snapshot" => Some(DebugCategory::Snapshot),
            _ => None,
        }
    }
}

/// Debug configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugConfig {
    /// Enable debug logging
    pub enabled: bool,
    /// Minimum log level
    pub level: LogLevel,
    /// Output destination
    pub output: DebugOutput,
    /// Enabled categories
    pub categories: HashSet<DebugCategory>,
}

impl Default for DebugConfig {
    fn default() -> Self {
        let mut categories = HashSet::new();
        categories.insert(DebugCategory::Engine);
        categories.insert(DebugCategory::Flow);
        categories.insert(DebugCategory::Scheduler);

        Self {
            enabled: std::env::var(DEBUG_ENV).is_ok(),
            level: LogLevel::Debug,
            output: DebugOutput::Stderr,
            categories,
        }
    }
}

impl DebugConfig {
    pub fn all_categories(mut self) -> Self {
        self.categories.extend([
            DebugCategory::Engine,
            DebugCategory::Flow,
            DebugCategory::Bus,
            DebugCategory::Conditions,
            DebugCategory::Scheduler,
            DebugCategory::Snapshot,
        ]);
        self
    }

    /// Whether a record at `level` for `target` should be written
    pub fn allows(&self, level: log::Level, target: &str) -> bool {
        if level <= log::Level::Warn {
            return true;
        }
        if !self.enabled || level > self.level.filter() {
            return false;
        }
        DebugCategory::from_target(target)
            .is_some_and(|category| self.categories.contains(&category))
    }
}

/// Debug output destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DebugOutput {
    /// Output to stderr
    Stderr,
    /// Append to file
    File(String),
}

/// `log` backend driven by a `DebugConfig`
pub struct DebugLogger {
    config: DebugConfig,
    file: Option<Mutex<File>>,
}

impl DebugLogger {
    pub fn new(config: DebugConfig) -> std::io::Result<Self> {
        let file = match &config.output {
            DebugOutput::Stderr => None,
            DebugOutput::File(path) => Some(Mutex::new(
                OpenOptions::new().create(true).append(true).open(path)?,
            )),
        };
        Ok(Self { config, file })
    }

    fn format(record: &log::Record<'_>) -> String {
        let category = DebugCategory::from_target(record.target())
            .map(|category| format!("{category:?}"))
            .unwrap_or_else(|| record.target().to_string());
        format!("[{}] {:10} {}", record.level(), category, record.args())
    }
}

impl log::Log for DebugLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        self.config.allows(metadata.level(), metadata.target())
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = Self::format(record);
        match &self.file {
            None => eprintln!("{line}"),
            Some(file) => {
                if let Ok(mut file) = file.lock() {
                    let _ = writeln!(file, "{line}");
                }
            }
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file
            && let Ok(mut file) = file.lock()
        {
            let _ = file.flush();
        }
    }
}

/// Install a `DebugLogger` as the global logger.
///
/// Fails if a logger is already installed.
pub fn init(config: DebugConfig) -> anyhow::Result<()> {
    let max_level = if config.enabled {
        config.level.filter()
    } else {
        log::LevelFilter::Warn
    };
    let logger = DebugLogger::new(config)?;
    log::set_logger(Box::leak(Box::new(logger)))
        .map_err(|err| anyhow::anyhow!("failed to install logger: {err}"))?;
    log::set_max_level(max_level);
    Ok(())
}
