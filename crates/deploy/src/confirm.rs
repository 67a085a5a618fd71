//! Human confirmation gate.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

/// Asks the operator to approve a deployment.
pub trait Confirm {
    /// Returns `true` only on an explicit yes.
    fn ask(&mut self, prompt: &str) -> Result<bool>;
}

impl<T: Confirm + ?Sized> Confirm for Box<T> {
    fn ask(&mut self, prompt: &str) -> Result<bool> {
        (**self).ask(prompt)
    }
}

/// Prompts on stdout and reads the answer from stdin.
#[derive(Debug, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn ask(&mut self, prompt: &str) -> Result<bool> {
        let mut stdout = std::io::stdout();
        write!(stdout, "{} (y/N) ", prompt).context("Failed to write prompt")?;
        stdout.flush().context("Failed to flush prompt")?;

        let mut answer = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut answer)
            .context("Failed to read confirmation")?;

        Ok(is_yes(&answer))
    }
}

/// Approves every prompt without asking (`--yes`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn ask(&mut self, prompt: &str) -> Result<bool> {
        tracing::debug!(prompt, "Confirmation skipped");
        Ok(true)
    }
}

fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}
