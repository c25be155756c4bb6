//! Per-program checks

use crate::interpreter::CommandTable;
use crate::types::program::{Instruction, Program};
use crate::validate::{LintLevel, LintResult, Location};

/// Check labels, instruction validity and archetype support in `program`.
pub fn check(program: &Program, location: &Location, result: &mut LintResult) {
    if program.is_empty() {
        result.add(
            LintLevel::Warning,
            "empty-program",
            location.clone(),
            "node has no program and completes immediately".to_string(),
        );
        return;
    }

    let (labels, duplicates) = program.label_index();
    for (name, index) in duplicates {
        result.add(
            LintLevel::Warning,
            "labels",
            location.clone().at(index),
            format!("duplicate label '{name}'; the first occurrence wins"),
        );
    }

    let table = CommandTable::standard();
    for (index, instruction) in program.instructions.iter().enumerate() {
        let here = || location.clone().at(index);

        let Some(kind) = instruction.kind() else {
            result.add(
                LintLevel::Warning,
                "instructions",
                here(),
                "unknown instruction is skipped at run time".to_string(),
            );
            continue;
        };
        if table.lookup(program.archetype, kind).is_none() {
            result.add(
                LintLevel::Warning,
                "archetype",
                here(),
                format!(
                    "{kind:?} is not supported by {:?} programs and is skipped",
                    program.archetype
                ),
            );
        }

        match instruction {
            Instruction::Jump { label } if !labels.contains_key(label) => {
                result.add(
                    LintLevel::Error,
                    "labels",
                    here(),
                    format!("jump to undefined label '{label}'"),
                );
            }
            Instruction::Choice { options, .. } if options.is_empty() => {
                result.add(
                    LintLevel::Error,
                    "instructions",
                    here(),
                    "choice without options".to_string(),
                );
            }
            Instruction::Choice { options, .. } => {
                for option in options.iter().filter(|o| !labels.contains_key(&o.target)) {
                    result.add(
                        LintLevel::Error,
                        "labels",
                        here(),
                        format!(
                            "choice '{}' targets undefined label '{}'",
                            option.text, option.target
                        ),
                    );
                }
            }
            Instruction::EndOfProgram(end) if end.is_branching && end.target_node_id.is_none() => {
                result.add(
                    LintLevel::Warning,
                    "branching",
                    here(),
                    "branching end without a target node finishes normally".to_string(),
                );
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::program::{Archetype, ChoiceOption, EndOfProgram};

    fn run(program: Program) -> LintResult {
        let mut result = LintResult::new();
        check(&program, &Location::default(), &mut result);
        result
    }

    #[test]
    fn reports_label_problems() {
        let result = run(Program::new(
            Archetype::Dialogue,
            vec![
                Instruction::label("a"),
                Instruction::label("a"),
                Instruction::jump("missing"),
                Instruction::Choice {
                    prompt: None,
                    options: vec![ChoiceOption::new("Go", "a"), ChoiceOption::new("No", "nope")],
                },
            ],
        ));

        let labels: Vec<_> = result.in_category("labels").collect();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels[0].level, LintLevel::Warning);
        assert_eq!(labels[0].location.instruction, Some(1));
        assert_eq!(result.error_count, 2);
    }

    #[test]
    fn reports_unsupported_and_unknown_instructions() {
        let result = run(Program::new(
            Archetype::CinematicText,
            vec![
                Instruction::Unknown,
                Instruction::Choice {
                    prompt: None,
                    options: vec![ChoiceOption::new("x", "x")],
                },
                Instruction::label("x"),
                Instruction::EndOfProgram(EndOfProgram {
                    is_branching: true,
                    ..Default::default()
                }),
            ],
        ));

        assert_eq!(result.in_category("instructions").count(), 1);
        assert_eq!(result.in_category("archetype").count(), 1);
        assert_eq!(result.in_category("branching").count(), 1);
        assert!(!result.has_errors());
    }

    #[test]
    fn empty_program_is_a_warning() {
        let result = run(Program::default());
        assert_eq!(result.warning_count, 1);
        assert_eq!(result.in_category("empty-program").count(), 1);
    }
}
