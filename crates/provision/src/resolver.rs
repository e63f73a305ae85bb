//! Credential resolution
//!
//! Precedence for every secret, first hit wins:
//!
//! 1. value already in the context (pre-set, or resolved earlier this run)
//! 2. value extracted from the previously published artifact
//! 3. value entered by the operator
//!
//! Extraction lets a forced re-render keep the password a human or an
//! earlier run chose instead of asking again.

use crate::error::ResolveError;
use crate::input::SecretInput;
use crate::types::{Credential, Origin, RemoteConfigState, RenderContext};
use regex::Regex;

/// Finds a secret's value in artifact text
#[derive(Debug, Clone)]
pub struct Extractor {
    pattern: Regex,
}

impl Extractor {
    /// Match `define('<CONST>', '<value>');` on a line of its own
    pub fn for_constant(constant: &str) -> Self {
        let pattern = format!(r"^define\('{}', '(.*)'\);\r?$", regex::escape(constant));
        Self {
            pattern: Regex::new(&pattern).expect("escaped constant always forms a valid pattern"),
        }
    }

    /// Use a custom regex; it must have exactly one capture group
    pub fn from_pattern(variable: &str, pattern: &str) -> Result<Self, ResolveError> {
        let invalid = |message: String| ResolveError::InvalidPattern {
            variable: variable.to_string(),
            message,
        };

        let regex = Regex::new(pattern).map_err(|e| invalid(e.to_string()))?;
        // captures_len counts the implicit whole-match group
        if regex.captures_len() != 2 {
            return Err(invalid(format!(
                "expected exactly one capture group, found {}",
                regex.captures_len() - 1
            )));
        }
        Ok(Self { pattern: regex })
    }

    /// Build the extractor a credential asks for
    pub fn for_credential(credential: &Credential) -> Result<Self, ResolveError> {
        match &credential.pattern {
            Some(pattern) => Self::from_pattern(&credential.variable, pattern),
            None => Ok(Self::for_constant(&credential.constant)),
        }
    }

    /// First non-empty capture, scanning line by line
    pub fn extract(&self, content: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(content);
        text.lines().find_map(|line| {
            self.pattern
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        })
    }
}

/// Resolves one credential into a [`RenderContext`]
#[derive(Debug, Clone)]
pub struct Resolver {
    credential: Credential,
    extractor: Extractor,
}

impl Resolver {
    pub fn new(credential: Credential) -> Result<Self, ResolveError> {
        let extractor = Extractor::for_credential(&credential)?;
        Ok(Self {
            credential,
            extractor,
        })
    }

    /// Resolver for `DB_PASSWORD` matched by its constant name
    pub fn db_password() -> Self {
        let credential = Credential::db_password();
        Self {
            extractor: Extractor::for_constant(&credential.constant),
            credential,
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn variable(&self) -> &str {
        &self.credential.variable
    }

    /// Try to recover the value from the remote artifact
    ///
    /// Returns `true` if the value was taken from the remote state.
    pub fn extract(&self, ctx: &mut RenderContext, remote: &RemoteConfigState) -> bool {
        let variable = self.variable();
        if ctx.is_resolved(variable) || !remote.exists {
            return false;
        }

        let Some(content) = &remote.raw_content else {
            return false;
        };

        match self.extractor.extract(content) {
            Some(value) => {
                log::info!("Recovered {} from {}", variable, remote.path);
                ctx.set_if_unset(variable, value, Origin::ExtractedRemote)
            }
            None => {
                log::debug!("No {} found in {}", self.credential.constant, remote.path);
                false
            }
        }
    }

    /// Prompt the operator unless the value is already resolved
    pub fn ask(
        &self,
        ctx: &mut RenderContext,
        input: &mut dyn SecretInput,
        application: &str,
    ) -> Result<(), ResolveError> {
        let variable = self.variable();
        if ctx.is_resolved(variable) {
            return Ok(());
        }

        let unavailable = || ResolveError::NoValueAvailable {
            variable: variable.to_string(),
        };

        if !input.is_interactive() {
            return Err(unavailable());
        }

        let prompt = self.credential.prompt_text(application, ctx);
        let answer = input
            .read_secret(&prompt)
            .map_err(|e| ResolveError::Input {
                variable: variable.to_string(),
                message: format!("{e:#}"),
            })?;

        match answer {
            Some(value) if !value.is_empty() => {
                ctx.set_if_unset(variable, value, Origin::Prompted);
                Ok(())
            }
            _ => Err(unavailable()),
        }
    }

    /// Full precedence chain: context, then remote, then prompt
    pub fn resolve(
        &self,
        ctx: &mut RenderContext,
        remote: &RemoteConfigState,
        input: &mut dyn SecretInput,
        application: &str,
    ) -> Result<String, ResolveError> {
        self.extract(ctx, remote);
        self.ask(ctx, input, application)?;

        ctx.get(self.variable())
            .map(str::to_string)
            .ok_or_else(|| ResolveError::NoValueAvailable {
                variable: self.variable().to_string(),
            })
    }
}
