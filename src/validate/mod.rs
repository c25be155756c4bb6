//! Authoring checks for storyboards and story packages
//!
//! Everything reported here is tolerated at run time (skipped, fallen
//! through or logged). The checks surface those problems before a scene is
//! played:
//! - program integrity (labels, unknown or unsupported instructions)
//! - graph integrity (start node, node ids, branch and trigger targets)

use crate::types::ids::{NodeId, RunnerId, StoryboardName};
use crate::types::storyboard::{StoryPackage, Storyboard};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod graph;
pub mod program;

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LintLevel {
    /// Behaves incorrectly at run time
    Error,
    /// Degrades at run time, likely unintended
    Warning,
    /// For your information
    Info,
}

/// Where an issue was found
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub runner: Option<RunnerId>,
    pub storyboard: Option<StoryboardName>,
    pub node: Option<NodeId>,
    pub instruction: Option<usize>,
}

impl Location {
    pub fn storyboard(name: &StoryboardName) -> Self {
        Self {
            storyboard: Some(name.clone()),
            ..Self::default()
        }
    }

    pub fn node(name: &StoryboardName, node: &NodeId) -> Self {
        Self {
            node: Some(node.clone()),
            ..Self::storyboard(name)
        }
    }

    pub fn at(mut self, instruction: usize) -> Self {
        self.instruction = Some(instruction);
        self
    }

    fn with_runner(mut self, runner: &RunnerId) -> Self {
        self.runner = Some(runner.clone());
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(runner) = &self.runner {
            parts.push(format!("runner '{runner}'"));
        }
        if let Some(storyboard) = &self.storyboard {
            parts.push(format!("storyboard '{storyboard}'"));
        }
        if let Some(node) = &self.node {
            parts.push(format!("node '{node}'"));
        }
        if let Some(index) = self.instruction {
            parts.push(format!("instruction {index}"));
        }
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LintIssue {
    pub level: LintLevel,
    pub message: String,
    pub location: Location,
    /// Check that produced the issue
    pub category: String,
}

impl fmt::Display for LintIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} [{}] {}: {}",
            self.level, self.category, self.location, self.message
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LintResult {
    pub issues: Vec<LintIssue>,
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
}

impl LintResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, level: LintLevel, category: &str, location: Location, message: String) {
        self.add_issue(LintIssue {
            level,
            message,
            location,
            category: category.to_string(),
        });
    }

    pub fn add_issue(&mut self, issue: LintIssue) {
        match issue.level {
            LintLevel::Error => self.error_count += 1,
            LintLevel::Warning => self.warning_count += 1,
            LintLevel::Info => self.info_count += 1,
        }
        self.issues.push(issue);
    }

    pub fn merge(&mut self, other: LintResult) {
        for issue in other.issues {
            self.add_issue(issue);
        }
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues of one category, for targeted assertions and reports
    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a LintIssue> {
        self.issues
            .iter()
            .filter(move |issue| issue.category == category)
    }
}

/// Check one storyboard in isolation.
///
/// Branch targets into other storyboards are not checked here; use
/// [`check_package`] for cross-storyboard references.
pub fn check_storyboard(storyboard: &Storyboard) -> LintResult {
    let mut result = LintResult::new();
    graph::check_storyboard(storyboard, &mut result);
    for node in &storyboard.nodes {
        let location = Location::node(&storyboard.name, &node.id);
        program::check(&node.program, &location, &mut result);
    }
    result
}

/// Check every runner of a package, including references between them.
pub fn check_package(package: &StoryPackage) -> LintResult {
    let mut result = LintResult::new();
    for definition in &package.runners {
        for mut issue in check_storyboard(&definition.storyboard).issues {
            issue.location = issue.location.with_runner(&definition.id);
            result.add_issue(issue);
        }
    }
    graph::check_package(package, &mut result);
    result
}
