//! Storyboard graph and cross-runner reference checks

use crate::condition::ConditionKind;
use crate::types::ids::{NodeId, StoryboardName};
use crate::types::program::Instruction;
use crate::types::storyboard::{StoryPackage, Storyboard};
use crate::validate::{LintLevel, LintResult, Location};
use std::collections::{HashMap, HashSet};

pub fn check_storyboard(storyboard: &Storyboard, result: &mut LintResult) {
    let name = &storyboard.name;
    let start_nodes = storyboard.nodes.iter().filter(|n| n.is_start_node).count();
    match start_nodes {
        0 => result.add(
            LintLevel::Warning,
            "start-node",
            Location::storyboard(name),
            "no start node; the runner only starts through conditions or triggers".to_string(),
        ),
        1 => {}
        n => result.add(
            LintLevel::Info,
            "start-node",
            Location::storyboard(name),
            format!("{n} start nodes; only the first is kicked off"),
        ),
    }

    let mut seen = HashSet::new();
    for node in &storyboard.nodes {
        if !seen.insert(&node.id) {
            result.add(
                LintLevel::Error,
                "nodes",
                Location::node(name, &node.id),
                "duplicate node id; later definitions are ignored".to_string(),
            );
        }
    }

    for node in &storyboard.nodes {
        let location = Location::node(name, &node.id);
        if !node.archetype.accepts(node.program.archetype) {
            result.add(
                LintLevel::Warning,
                "archetype",
                location.clone(),
                format!(
                    "{:?} node carries a {:?} program",
                    node.archetype, node.program.archetype
                ),
            );
        }

        for condition in &node.conditions {
            if let ConditionKind::PreviousNodeCompleted { target_node_id } = condition.kind()
                && !seen.contains(target_node_id)
            {
                result.add(
                    LintLevel::Info,
                    "conditions",
                    location.clone(),
                    format!("waits on node '{target_node_id}' outside this storyboard"),
                );
            }
        }

        for (index, target) in branch_targets(&node.program.instructions) {
            let local = target.storyboard.is_none_or(|board| board == name);
            if local && !seen.contains(target.node) {
                result.add(
                    LintLevel::Error,
                    "branch-target",
                    location.clone().at(index),
                    format!("branch to unknown node '{}'", target.node),
                );
            }
        }
    }

    for connection in &storyboard.connections {
        for end in [&connection.from, &connection.to] {
            if !seen.contains(end) {
                result.add(
                    LintLevel::Warning,
                    "connections",
                    Location::storyboard(name),
                    format!("connection refers to unknown node '{end}'"),
                );
            }
        }
    }
}

pub fn check_package(package: &StoryPackage, result: &mut LintResult) {
    let mut runners = HashSet::new();
    for definition in &package.runners {
        if !runners.insert(&definition.id) {
            result.add(
                LintLevel::Error,
                "runners",
                Location {
                    runner: Some(definition.id.clone()),
                    ..Location::default()
                },
                "duplicate runner id; registration is refused".to_string(),
            );
        }
    }

    let boards: HashMap<&StoryboardName, HashSet<&NodeId>> = package
        .runners
        .iter()
        .map(|d| {
            let nodes: HashSet<&NodeId> = d.storyboard.nodes.iter().map(|n| &n.id).collect();
            (&d.storyboard.name, nodes)
        })
        .collect();
    let runner_nodes: HashMap<_, HashSet<&NodeId>> = package
        .runners
        .iter()
        .map(|d| (&d.id, d.storyboard.nodes.iter().map(|n| &n.id).collect()))
        .collect();
    let all_nodes: HashSet<&NodeId> = boards.values().flatten().copied().collect();

    for definition in &package.runners {
        let name = &definition.storyboard.name;
        for node in &definition.storyboard.nodes {
            let location = Location {
                runner: Some(definition.id.clone()),
                ..Location::node(name, &node.id)
            };

            for condition in &node.conditions {
                if let ConditionKind::PreviousNodeCompleted { target_node_id } = condition.kind()
                    && !all_nodes.contains(target_node_id)
                {
                    result.add(
                        LintLevel::Warning,
                        "conditions",
                        location.clone(),
                        format!("waits on node '{target_node_id}' that no runner defines"),
                    );
                }
            }

            for (index, target) in branch_targets(&node.program.instructions) {
                let Some(board) = target.storyboard.filter(|board| *board != name) else {
                    continue;
                };
                let message = match boards.get(board) {
                    None => format!("branch into unknown storyboard '{board}'"),
                    Some(nodes) if !nodes.contains(target.node) => {
                        format!("branch to unknown node '{board}/{}'", target.node)
                    }
                    Some(_) => continue,
                };
                result.add(LintLevel::Error, "branch-target", location.clone().at(index), message);
            }

            for (index, instruction) in node.program.instructions.iter().enumerate() {
                let Instruction::TriggerOtherRunner { runner_id, node_id } = instruction else {
                    continue;
                };
                let message = match runner_nodes.get(runner_id) {
                    None => format!("trigger of unknown runner '{runner_id}'"),
                    Some(nodes) if !nodes.contains(node_id) => {
                        format!("trigger of unknown node '{runner_id}/{node_id}'")
                    }
                    Some(_) => continue,
                };
                result.add(LintLevel::Error, "trigger-target", location.clone().at(index), message);
            }
        }
    }
}

struct BranchTarget<'a> {
    node: &'a NodeId,
    storyboard: Option<&'a StoryboardName>,
}

fn branch_targets(instructions: &[Instruction]) -> impl Iterator<Item = (usize, BranchTarget<'_>)> {
    instructions
        .iter()
        .enumerate()
        .filter_map(|(index, instruction)| match instruction {
            Instruction::EndOfProgram(end) if end.is_branching => {
                end.target_node_id.as_ref().map(|node| {
                    (
                        index,
                        BranchTarget {
                            node,
                            storyboard: end.target_storyboard.as_ref(),
                        },
                    )
                })
            }
            _ => None,
        })
}
