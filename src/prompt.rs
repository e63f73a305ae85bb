//! Operator input from the terminal

use anyhow::{Context, Result};
use dialoguer::Password;
use provision::{NonInteractive, SecretInput};
use std::io::IsTerminal;

/// Hidden password prompt on the attended terminal
#[derive(Debug, Default)]
pub struct TerminalInput;

impl SecretInput for TerminalInput {
    fn is_interactive(&self) -> bool {
        true
    }

    fn read_secret(&mut self, prompt: &str) -> Result<Option<String>> {
        let answer = Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
            .context("Failed to read from terminal")?;

        Ok(Some(answer).filter(|a| !a.is_empty()))
    }
}

/// Choose the input for this run
///
/// Prompts only when asked to and someone is actually at the terminal.
pub fn select(non_interactive: bool) -> Box<dyn SecretInput> {
    if non_interactive {
        log::debug!("Prompting disabled by --non-interactive");
        return Box::new(NonInteractive);
    }
    if !std::io::stdin().is_terminal() || !console::user_attended_stderr() {
        log::debug!("No terminal attached, prompting disabled");
        return Box::new(NonInteractive);
    }
    Box::new(TerminalInput)
}
