//! Package validation command

use crate::types::storyboard::StoryPackage;
use crate::validate::{self, LintResult};

/// Validate a story package and print every issue.
///
/// Returns the lint result so the caller can pick an exit status.
pub fn run_check(json: &str) -> anyhow::Result<LintResult> {
    let package = StoryPackage::from_json_str(json)?;
    let result = validate::check_package(&package);

    for issue in &result.issues {
        println!("{issue}");
    }
    if result.is_clean() {
        println!("No issues found in {} runner(s).", package.runners.len());
    } else {
        println!();
        println!(
            "{} error(s), {} warning(s), {} info",
            result.error_count, result.warning_count, result.info_count
        );
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_broken_jump() {
        let json = r#"{"runners": [{"id": "r", "storyboard": {"name": "b", "nodes": [
            {"id": "n", "is_start_node": true,
             "program": {"instructions": [{"type": "jump", "label": "nowhere"}]}}
        ]}}]}"#;
        let result = run_check(json).unwrap();
        assert!(result.has_errors());
    }

    #[test]
    fn malformed_package_is_an_error() {
        assert!(run_check("{\"runners\": 3}").is_err());
    }
}
