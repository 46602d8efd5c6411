//! Operator prompts.
//!
//! Every interactive question goes through a [`Prompter`] so the workflow can
//! be driven by a scripted operator in tests.

use crate::error::{ReleaseError, Result};
use std::io::{BufRead, Write};

/// Answers read as "yes"
pub const YES_TOKENS: [&str; 6] = ["true", "1", "yes", "y", "on", "sure"];
/// Answers read as "no"
pub const NO_TOKENS: [&str; 5] = ["false", "0", "no", "n", "off"];

/// Source of operator answers
pub trait Prompter {
    /// Ask `question`, returning the trimmed answer or `default` on an empty answer
    fn ask(&self, question: &str, default: Option<&str>) -> Result<String>;
}

impl<P: Prompter + ?Sized> Prompter for &P {
    fn ask(&self, question: &str, default: Option<&str>) -> Result<String> {
        (**self).ask(question, default)
    }
}

/// Interpret a yes/no answer, `None` when it is neither
pub fn parse_yes_no(answer: &str) -> Option<bool> {
    let answer = answer.trim().to_lowercase();
    if YES_TOKENS.contains(&answer.as_str()) {
        Some(true)
    } else if NO_TOKENS.contains(&answer.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Ask until the answer is a yes/no token
pub fn ask_yes_no(prompter: &impl Prompter, question: &str, default: bool) -> Result<bool> {
    let default = if default { "yes" } else { "no" };
    loop {
        let answer = prompter.ask(question, Some(default))?;
        match parse_yes_no(&answer) {
            Some(value) => return Ok(value),
            None => log::debug!("'{}' is not a yes/no answer", answer),
        }
    }
}

/// Ask "Are you sure?" and abort unless the operator agrees
pub fn confirm_or_abort(prompter: &impl Prompter, what: &str) -> Result<()> {
    if ask_yes_no(prompter, &format!("{} Are you sure?", what), false)? {
        Ok(())
    } else {
        Err(ReleaseError::aborted(what))
    }
}

/// Prompts on stdout, answers from stdin
#[derive(Debug, Default)]
pub struct ConsolePrompter;

impl Prompter for ConsolePrompter {
    fn ask(&self, question: &str, default: Option<&str>) -> Result<String> {
        let mut stdout = std::io::stdout().lock();
        match default {
            Some(default) if !default.is_empty() => write!(stdout, "{} [{}]: ", question, default)?,
            _ => write!(stdout, "{} ", question)?,
        }
        stdout.flush()?;

        let mut input = String::new();
        if std::io::stdin().lock().read_line(&mut input)? == 0 {
            return Err(ReleaseError::aborted("input closed while waiting for an answer"));
        }
        let answer = input.trim();
        if answer.is_empty() {
            Ok(default.unwrap_or_default().to_string())
        } else {
            Ok(answer.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPrompter;

    #[test]
    fn yes_no_vocabulary() {
        for yes in ["yes", "Y", "true", "1", "on", "SURE"] {
            assert_eq!(parse_yes_no(yes), Some(true), "{yes}");
        }
        for no in ["no", "N", "false", "0", "off"] {
            assert_eq!(parse_yes_no(no), Some(false), "{no}");
        }
        assert_eq!(parse_yes_no("maybe"), None);
        assert_eq!(parse_yes_no(""), None);
    }

    #[test]
    fn ask_yes_no_repeats_until_valid() {
        let prompter = ScriptedPrompter::new(["perhaps", "dunno", "y"]);
        assert!(ask_yes_no(&prompter, "Release?", false).unwrap());
        assert_eq!(prompter.questions().len(), 3);
    }

    #[test]
    fn empty_answer_takes_default() {
        let prompter = ScriptedPrompter::new([""]);
        assert!(!ask_yes_no(&prompter, "Release?", false).unwrap());
    }

    #[test]
    fn declining_confirmation_aborts() {
        let prompter = ScriptedPrompter::new(["no"]);
        let err = confirm_or_abort(&prompter, "Deploying to prod.").unwrap_err();
        assert!(matches!(err, ReleaseError::Aborted { .. }));
        assert_eq!(prompter.questions(), vec!["Deploying to prod. Are you sure?"]);
    }

    #[test]
    fn exhausted_script_aborts() {
        let prompter = ScriptedPrompter::new(Vec::<String>::new());
        assert!(matches!(
            prompter.ask("anything?", None),
            Err(ReleaseError::Aborted { .. })
        ));
    }
}
