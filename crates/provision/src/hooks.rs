//! Hooks around the password steps
//!
//! Deployments with more than one secret set attach handlers before or after
//! a [`Step`] instead of changing the provisioner. Handlers run synchronously
//! in registration order; the first error aborts the run.

use crate::error::Error;
use crate::input::SecretInput;
use crate::resolver::Resolver;
use crate::types::{Credential, RemoteConfigState, RenderContext};
use anyhow::Result;
use std::collections::HashMap;
use std::fmt;

/// Named steps that accept hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Recover secrets from the existing artifact
    ResolvePasswords,
    /// Prompt for secrets still missing
    AskForPasswords,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ResolvePasswords => "resolve-passwords",
            Self::AskForPasswords => "ask-for-passwords",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// When a hook runs relative to its step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Before,
    After,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

/// What a hook can see and change
pub struct HookContext<'a> {
    /// Variables resolved so far
    pub context: &'a mut RenderContext,
    /// The artifact as probed at the start of the run
    pub remote: &'a RemoteConfigState,
    /// Operator input
    pub input: &'a mut dyn SecretInput,
    /// Application name, for prompts
    pub application: &'a str,
}

/// A handler attached to a step
pub trait Hook {
    fn run(&mut self, ctx: &mut HookContext<'_>) -> Result<()>;
}

impl<F> Hook for F
where
    F: FnMut(&mut HookContext<'_>) -> Result<()>,
{
    fn run(&mut self, ctx: &mut HookContext<'_>) -> Result<()> {
        self(ctx)
    }
}

/// Ordered handler lists per step and phase
#[derive(Default)]
pub struct Hooks {
    before: HashMap<Step, Vec<Box<dyn Hook>>>,
    after: HashMap<Step, Vec<Box<dyn Hook>>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before(&mut self, step: Step, hook: impl Hook + 'static) -> &mut Self {
        self.before.entry(step).or_default().push(Box::new(hook));
        self
    }

    pub fn after(&mut self, step: Step, hook: impl Hook + 'static) -> &mut Self {
        self.after.entry(step).or_default().push(Box::new(hook));
        self
    }

    /// Number of handlers registered for a step and phase
    pub fn count(&self, step: Step, phase: Phase) -> usize {
        let map = match phase {
            Phase::Before => &self.before,
            Phase::After => &self.after,
        };
        map.get(&step).map_or(0, Vec::len)
    }

    pub(crate) fn run(
        &mut self,
        step: Step,
        phase: Phase,
        ctx: &mut HookContext<'_>,
    ) -> Result<(), Error> {
        let map = match phase {
            Phase::Before => &mut self.before,
            Phase::After => &mut self.after,
        };
        let Some(hooks) = map.get_mut(&step) else {
            return Ok(());
        };

        for (index, hook) in hooks.iter_mut().enumerate() {
            log::debug!("Running {} hook #{} for {}", phase.name(), index, step);
            hook.run(ctx).map_err(|e| Error::Hook {
                step: step.name(),
                phase: phase.name(),
                index,
                message: format!("{e:#}"),
            })?;
        }
        Ok(())
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn counts(map: &HashMap<Step, Vec<Box<dyn Hook>>>) -> Vec<(Step, usize)> {
            map.iter().map(|(step, hooks)| (*step, hooks.len())).collect()
        }

        f.debug_struct("Hooks")
            .field("before", &counts(&self.before))
            .field("after", &counts(&self.after))
            .finish()
    }
}

/// Hook that resolves an additional credential
///
/// Register [`CredentialHook::extract`] after [`Step::ResolvePasswords`] and
/// [`CredentialHook::ask`] after [`Step::AskForPasswords`] to give an extra
/// secret the same precedence as the database password.
#[derive(Debug, Clone)]
pub struct CredentialHook {
    resolver: Resolver,
    prompt: bool,
}

impl CredentialHook {
    /// Recover the credential from the remote artifact
    pub fn extract(credential: Credential) -> Result<Self, crate::error::ResolveError> {
        Ok(Self {
            resolver: Resolver::new(credential)?,
            prompt: false,
        })
    }

    /// Prompt for the credential if still missing
    pub fn ask(credential: Credential) -> Result<Self, crate::error::ResolveError> {
        Ok(Self {
            resolver: Resolver::new(credential)?,
            prompt: true,
        })
    }
}

impl Hook for CredentialHook {
    fn run(&mut self, ctx: &mut HookContext<'_>) -> Result<()> {
        if self.prompt {
            self.resolver
                .ask(ctx.context, &mut *ctx.input, ctx.application)?;
        } else {
            self.resolver.extract(ctx.context, ctx.remote);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{NonInteractive, ScriptedInput};
    use crate::types::Origin;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn handler<F>(f: F) -> F
    where
        F: FnMut(&mut HookContext<'_>) -> Result<()>,
    {
        f
    }

    fn run_hooks(hooks: &mut Hooks, step: Step, phase: Phase) -> Result<RenderContext, Error> {
        let mut context = RenderContext::new();
        let remote = RemoteConfigState::absent("/srv/config/wp-config.php");
        let mut input = NonInteractive;
        let mut ctx = HookContext {
            context: &mut context,
            remote: &remote,
            input: &mut input,
            application: "blog",
        };
        hooks.run(step, phase, &mut ctx)?;
        Ok(context)
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = Hooks::new();

        for label in ["first", "second", "third"] {
            let log = Rc::clone(&log);
            hooks.after(
                Step::ResolvePasswords,
                handler(move |_| {
                    log.borrow_mut().push(label);
                    Ok(())
                }),
            );
        }

        run_hooks(&mut hooks, Step::ResolvePasswords, Phase::After).unwrap();
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
        assert_eq!(hooks.count(Step::ResolvePasswords, Phase::After), 3);
        assert_eq!(hooks.count(Step::ResolvePasswords, Phase::Before), 0);
    }

    #[test]
    fn test_first_failure_aborts() {
        let ran = Rc::new(RefCell::new(false));
        let ran_clone = Rc::clone(&ran);
        let mut hooks = Hooks::new();
        hooks
            .before(
                Step::AskForPasswords,
                handler(|_| anyhow::bail!("vault sealed")),
            )
            .before(
                Step::AskForPasswords,
                handler(move |_| {
                    *ran_clone.borrow_mut() = true;
                    Ok(())
                }),
            );

        let err = run_hooks(&mut hooks, Step::AskForPasswords, Phase::Before).unwrap_err();
        match err {
            Error::Hook {
                step,
                phase,
                index,
                message,
            } => {
                assert_eq!(step, "ask-for-passwords");
                assert_eq!(phase, "before");
                assert_eq!(index, 0);
                assert_eq!(message, "vault sealed");
            }
            other => panic!("Expected Error::Hook, got {other:?}"),
        }
        assert!(!*ran.borrow());
    }

    #[test]
    fn test_hooks_can_set_variables() {
        let mut hooks = Hooks::new();
        hooks.after(
            Step::ResolvePasswords,
            handler(|ctx| {
                ctx.context
                    .set_if_unset("cache_password", "from-hook", Origin::PreSet);
                Ok(())
            }),
        );

        let context = run_hooks(&mut hooks, Step::ResolvePasswords, Phase::After).unwrap();
        assert_eq!(context.get("cache_password"), Some("from-hook"));
    }

    #[test]
    fn test_credential_hooks() {
        let credential = Credential::new("cache_password", "CACHE_PASSWORD");
        let remote = RemoteConfigState {
            exists: true,
            path: "/srv/config/wp-config.php".to_string(),
            raw_content: Some(b"define('CACHE_PASSWORD', 'redis!');\n".to_vec()),
        };

        let mut context = RenderContext::new();
        let mut input = ScriptedInput::new(["typed"]);
        let mut ctx = HookContext {
            context: &mut context,
            remote: &remote,
            input: &mut input,
            application: "blog",
        };

        let mut extract = CredentialHook::extract(credential.clone()).unwrap();
        let mut ask = CredentialHook::ask(credential).unwrap();
        extract.run(&mut ctx).unwrap();
        ask.run(&mut ctx).unwrap();

        let var = context.variable("cache_password").unwrap();
        assert_eq!(var.value, "redis!");
        assert_eq!(var.origin, Origin::ExtractedRemote);
        assert!(input.prompts().is_empty());
    }
}
