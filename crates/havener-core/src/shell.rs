//! Shell operator evaluation
//!
//! A string value may embed any number of `((shell <command>))` operators. Each
//! operator is replaced by the trimmed standard output of its command.
//!
//! ```yaml
//! image:
//!   tag: ((shell git rev-parse --short HEAD))
//! ```

use std::process::{Command, Stdio};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::ShellError;

/// `((shell <command>))`, the command is captured non-greedily
static SHELL_OPERATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(\(\s*shell\s+(.+?)\s*\)\)").expect("valid shell operator regex")
});

/// Executes shell commands on behalf of the evaluator and the hook runner
///
/// Implementations must be Send + Sync, commands are executed from blocking
/// worker threads.
pub trait CommandRunner: Send + Sync {
    /// Run `command` and return its standard output
    fn run(&self, command: &str) -> Result<String, ShellError>;
}

/// Runs commands through `sh -c`
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }

    /// Use a different POSIX shell binary
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> Result<String, ShellError> {
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ShellError::Spawn {
                command: command.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(ShellError::Failed {
                command: command.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Substitutes shell operators in single strings
#[derive(Clone, Copy)]
pub struct ShellEvaluator<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> ShellEvaluator<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Check whether a string embeds at least one shell operator
    pub fn contains_operator(input: &str) -> bool {
        SHELL_OPERATOR.is_match(input)
    }

    /// Evaluate every shell operator in `input`
    ///
    /// Operators are executed in order of appearance. The first failing command
    /// aborts the evaluation and no partially substituted string is returned.
    pub fn evaluate(&self, input: &str) -> Result<String, ShellError> {
        let mut output = input.to_string();

        for captures in SHELL_OPERATOR.captures_iter(input) {
            let (Some(operator), Some(command)) = (captures.get(0), captures.get(1)) else {
                continue;
            };

            debug!(command = command.as_str(), "evaluating shell operator");
            let result = self.runner.run(command.as_str())?;
            output = output.replace(operator.as_str(), result.trim());
        }

        Ok(output)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every command and answers from a fixed table
    #[derive(Default)]
    pub(crate) struct ScriptedRunner {
        pub(crate) calls: Mutex<Vec<String>>,
        pub(crate) failing: Vec<String>,
    }

    impl ScriptedRunner {
        pub(crate) fn failing_on(command: &str) -> Self {
            Self {
                failing: vec![command.to_string()],
                ..Default::default()
            }
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, command: &str) -> Result<String, ShellError> {
            self.calls.lock().unwrap().push(command.to_string());
            if self.failing.iter().any(|c| c == command) {
                return Err(ShellError::Failed {
                    command: command.to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: String::new(),
                });
            }
            Ok(format!("  <{}>\n", command))
        }
    }

    #[test]
    fn test_plain_string_is_unchanged() {
        let runner = ScriptedRunner::default();
        let evaluator = ShellEvaluator::new(&runner);

        assert_eq!(evaluator.evaluate("no operators here").unwrap(), "no operators here");
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_output_is_trimmed_and_substituted() {
        let runner = ScriptedRunner::default();
        let evaluator = ShellEvaluator::new(&runner);

        assert_eq!(evaluator.evaluate("a-((shell cmd))-b").unwrap(), "a-<cmd>-b");
        assert_eq!(runner.calls(), vec!["cmd"]);
    }

    #[test]
    fn test_whitespace_inside_operator() {
        let runner = ScriptedRunner::default();
        let evaluator = ShellEvaluator::new(&runner);

        assert_eq!(evaluator.evaluate("(( shell  cmd one  ))").unwrap(), "<cmd one>");
        assert_eq!(runner.calls(), vec!["cmd one"]);
    }

    #[test]
    fn test_multiple_operators_are_substituted_independently() {
        let runner = ScriptedRunner::default();
        let evaluator = ShellEvaluator::new(&runner);

        let result = evaluator
            .evaluate("((shell first)) and ((shell second))")
            .unwrap();
        assert_eq!(result, "<first> and <second>");
        assert_eq!(runner.calls(), vec!["first", "second"]);
    }

    #[test]
    fn test_identical_operators_each_run() {
        let runner = ScriptedRunner::default();
        let evaluator = ShellEvaluator::new(&runner);

        let result = evaluator.evaluate("((shell x))/((shell x))").unwrap();
        assert_eq!(result, "<x>/<x>");
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn test_capture_is_non_greedy() {
        let runner = ScriptedRunner::default();
        let evaluator = ShellEvaluator::new(&runner);

        evaluator.evaluate("((shell a)) ))").unwrap();
        assert_eq!(runner.calls(), vec!["a"]);
    }

    #[test]
    fn test_failure_stops_evaluation() {
        let runner = ScriptedRunner::failing_on("bad");
        let evaluator = ShellEvaluator::new(&runner);

        let err = evaluator
            .evaluate("((shell bad)) ((shell never))")
            .unwrap_err();
        assert_eq!(err.command(), "bad");
        assert_eq!(runner.calls(), vec!["bad"]);
    }

    #[test]
    fn test_contains_operator() {
        assert!(ShellEvaluator::contains_operator("x ((shell y)) z"));
        assert!(!ShellEvaluator::contains_operator("((shell))"));
        assert!(!ShellEvaluator::contains_operator("(shell y)"));
    }

    #[test]
    fn test_real_shell_echo() {
        let runner = ShellRunner::new();
        let evaluator = ShellEvaluator::new(&runner);

        assert_eq!(evaluator.evaluate("((shell echo hi))").unwrap(), "hi");
        assert_eq!(evaluator.evaluate("a-((shell echo hi))-b").unwrap(), "a-hi-b");
        assert_eq!(
            evaluator
                .evaluate("((shell echo one)) ((shell printf two))")
                .unwrap(),
            "one two"
        );
    }

    #[test]
    fn test_real_shell_non_zero_exit() {
        let runner = ShellRunner::new();
        let evaluator = ShellEvaluator::new(&runner);

        let err = evaluator.evaluate("x ((shell exit 3)) y").unwrap_err();
        assert!(matches!(err, ShellError::Failed { ref command, .. } if command == "exit 3"));
    }

    #[test]
    fn test_missing_shell_binary() {
        let runner = ShellRunner::with_shell("/nonexistent/havener-shell");
        let err = runner.run("true").unwrap_err();
        assert!(matches!(err, ShellError::Spawn { .. }));
    }
}
