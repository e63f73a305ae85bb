//! Operator input for secrets
//!
//! The pipeline asks for secrets through [`SecretInput`] only. The CLI
//! supplies a terminal implementation; automated runs use
//! [`NonInteractive`], which makes an unresolved secret a hard error instead
//! of a hung prompt.

use anyhow::Result;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Source of operator-entered secrets
pub trait SecretInput {
    /// Whether anyone can answer a prompt
    fn is_interactive(&self) -> bool;

    /// Ask for a secret. `Ok(None)` means no answer is available.
    fn read_secret(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Input for unattended runs: never answers
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

impl SecretInput for NonInteractive {
    fn is_interactive(&self) -> bool {
        false
    }

    fn read_secret(&mut self, _prompt: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

#[derive(Debug, Default)]
struct Script {
    answers: VecDeque<String>,
    prompts: Vec<String>,
}

/// Input that replays queued answers and records every prompt
///
/// Clones share state, so tests can inspect prompts after handing a clone
/// to the provisioner.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    script: Arc<Mutex<Script>>,
}

impl ScriptedInput {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let script = Script {
            answers: answers.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        };
        Self {
            script: Arc::new(Mutex::new(script)),
        }
    }

    /// Prompts shown so far
    pub fn prompts(&self) -> Vec<String> {
        self.lock().prompts.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SecretInput for ScriptedInput {
    fn is_interactive(&self) -> bool {
        true
    }

    fn read_secret(&mut self, prompt: &str) -> Result<Option<String>> {
        let mut script = self.lock();
        script.prompts.push(prompt.to_string());
        Ok(script.answers.pop_front())
    }
}
