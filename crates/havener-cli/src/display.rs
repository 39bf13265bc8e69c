//! Display formatting for CLI output
//!
//! Provides:
//! - a console [`Reporter`] for the deploy and purge workflows
//! - the interactive purge confirmation

use console::style;
use havener_kube::{Confirmation, Reporter};
use std::io::{self, BufRead, Write};

/// Renders workflow messages on the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn debug(&self, message: &str) {
        tracing::debug!("{}", message);
    }

    fn info(&self, message: &str) {
        println!("{} {}", style("→").blue().bold(), message);
    }

    fn warn(&self, message: &str) {
        eprintln!("{} {}", style("⚠").yellow(), message);
    }

    fn status(&self, title: &str, message: &str) {
        println!();
        println!("{}", style(title).green().bold());
        for line in message.lines() {
            println!("  {}", line);
        }
        println!();
    }

    fn task_output(&self, title: &str, task: &str, output: &str) {
        println!(
            "{} {} {}",
            style("✓").green().bold(),
            style(title).bold(),
            style(task).cyan()
        );
        for line in output.lines() {
            println!("  {}", style(line).dim());
        }
    }
}

/// Question asked before purging
pub fn purge_prompt(releases: &[String]) -> String {
    format!(
        "Are you sure you want to delete the Helm Releases {}? (yes/no): ",
        releases.join(", ")
    )
}

/// Only the literal answer `yes` confirms
pub fn is_confirmed(answer: &str) -> bool {
    answer.trim() == "yes"
}

/// Asks on stdin before anything is purged
///
/// The purge runs on the tokio runtime, so the blocking read is wrapped in
/// [`tokio::task::block_in_place`]; this needs the multi-threaded runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirmation;

impl Confirmation for StdinConfirmation {
    fn confirm(&self, releases: &[String]) -> bool {
        tokio::task::block_in_place(|| {
            read_confirmation(releases, &mut io::stdin().lock(), &mut io::stdout())
        })
    }
}

/// Ask the purge question on `output` and read the answer from `input`
fn read_confirmation<R: BufRead, W: Write>(
    releases: &[String],
    input: &mut R,
    output: &mut W,
) -> bool {
    match ask(&purge_prompt(releases), input, output) {
        Ok(answer) => is_confirmed(&answer),
        Err(e) => {
            tracing::warn!("unable to read confirmation: {}", e);
            false
        }
    }
}

fn ask<R: BufRead, W: Write>(question: &str, input: &mut R, output: &mut W) -> io::Result<String> {
    write!(output, "{}", style(question).bold())?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer)
}
