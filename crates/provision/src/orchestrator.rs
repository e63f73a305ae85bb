//! Provisioning orchestrator - the idempotency gate and the pipeline
//!
//! Order within one run is fixed:
//! existence check → resolve credentials → obtain keys → render →
//! ensure directory → publish.
//!
//! Any failure aborts the remaining steps. Nothing is rolled back; the
//! existence check on the next run decides whether to try again.

use crate::error::{Error, Result};
use crate::hooks::{HookContext, Hooks, Phase, Step};
use crate::input::SecretInput;
use crate::keys::{KeySource, obtain};
use crate::render::Template;
use crate::resolver::Resolver;
use crate::target::RemoteTarget;
use crate::types::{
    Credential, Origin, Outcome, PromoteOutcome, RemoteConfigState, RemoteLayout, RenderContext,
    vars,
};

/// Rendered artifact that was not published
#[derive(Debug, Clone)]
pub struct Preview {
    /// The artifact as observed on the target
    pub remote: RemoteConfigState,
    /// What would be published
    pub rendered: Vec<u8>,
    /// Everything that went into it
    pub context: RenderContext,
}

/// Provisions the configuration artifact on one target
pub struct Provisioner {
    target: Box<dyn RemoteTarget>,
    keys: Box<dyn KeySource>,
    input: Box<dyn SecretInput>,
    application: String,
    layout: RemoteLayout,
    template: Template,
    resolvers: Vec<Resolver>,
    hooks: Hooks,
    presets: RenderContext,
}

impl Provisioner {
    /// Create a provisioner with the built-in template and the database
    /// password as the only credential.
    pub fn new(
        target: Box<dyn RemoteTarget>,
        keys: Box<dyn KeySource>,
        input: Box<dyn SecretInput>,
        application: impl Into<String>,
        layout: RemoteLayout,
    ) -> Self {
        Self {
            target,
            keys,
            input,
            application: application.into(),
            layout,
            template: Template::builtin(),
            resolvers: vec![Resolver::db_password()],
            hooks: Hooks::new(),
            presets: RenderContext::new(),
        }
    }

    /// Replace the template
    pub fn template(&mut self, template: Template) -> &mut Self {
        self.template = template;
        self
    }

    /// Replace the default database password credential
    pub fn credential(&mut self, credential: Credential) -> Result<&mut Self> {
        let resolver = Resolver::new(credential)?;
        match self
            .resolvers
            .iter_mut()
            .find(|r| r.variable() == resolver.variable())
        {
            Some(existing) => *existing = resolver,
            None => self.resolvers.push(resolver),
        }
        Ok(self)
    }

    /// Pre-set a variable. Pre-set values win over every other source.
    pub fn preset(&mut self, name: &str, value: &str) -> &mut Self {
        self.presets.set_if_unset(name, value, Origin::PreSet);
        self
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    pub fn layout(&self) -> &RemoteLayout {
        &self.layout
    }

    /// Names of variables holding secrets, for masking output
    pub fn secret_variables(&self) -> Vec<String> {
        self.resolvers
            .iter()
            .map(|r| r.variable().to_string())
            .chain(std::iter::once(vars::SECURITY_KEYS.to_string()))
            .collect()
    }

    /// Run the full workflow
    ///
    /// Returns [`Outcome::Skipped`] without touching anything else when the
    /// artifact exists and `force` is false.
    pub fn provision(&mut self, force: bool) -> Result<Outcome> {
        let remote = self.probe()?;
        let path = remote.path.clone();

        if remote.exists && !force {
            log::info!("{} already exists, skipping", path);
            return Ok(Outcome::Skipped { path });
        }
        if remote.exists {
            log::warn!("Force override: re-provisioning {}", path);
        }

        let mut ctx = self.presets.clone();
        let rendered = self.build(&mut ctx, &remote)?;

        let dir = self.layout.shared_config_dir();
        self.target.create_dir_all(&dir)?;
        self.target.write_atomic(&path, &rendered)?;
        log::info!("Published {} to {}", path, self.target.describe());

        Ok(Outcome::Published {
            path,
            variables: ctx.origins(),
        })
    }

    /// Check mandatory inputs, then observe the artifact
    pub fn probe(&self) -> Result<RemoteConfigState> {
        self.check_required()?;
        let path = self.layout.shared_artifact();
        Ok(RemoteConfigState::probe(self.target.as_ref(), &path)?)
    }

    /// Resolve, obtain keys and render against an observed state, without
    /// publishing
    pub fn preview(&mut self, remote: RemoteConfigState) -> Result<Preview> {
        self.check_required()?;
        let mut ctx = self.presets.clone();
        let rendered = self.build(&mut ctx, &remote)?;
        Ok(Preview {
            remote,
            rendered,
            context: ctx,
        })
    }

    /// Recover credentials from the existing artifact (with hooks)
    pub fn resolve_passwords(&mut self) -> Result<RenderContext> {
        let remote = self.probe()?;
        let mut ctx = self.presets.clone();
        self.run_step(Step::ResolvePasswords, &mut ctx, &remote)?;
        Ok(ctx)
    }

    /// Prompt for credentials not pre-set (with hooks)
    pub fn ask_for_passwords(&mut self) -> Result<RenderContext> {
        self.check_required()?;
        let remote = RemoteConfigState::absent(&self.layout.shared_artifact());
        let mut ctx = self.presets.clone();
        self.run_step(Step::AskForPasswords, &mut ctx, &remote)?;
        Ok(ctx)
    }

    /// Copy the published artifact into the active release
    pub fn promote(&self) -> Result<PromoteOutcome> {
        let from = self.layout.shared_artifact();
        let to = self.layout.release_artifact();

        if !self.target.exists(&from)? {
            return Err(Error::ArtifactMissing { path: from });
        }

        if self.target.exists(&to)? {
            let shared = blake3::hash(&self.target.read(&from)?);
            let release = blake3::hash(&self.target.read(&to)?);
            if shared == release {
                log::info!("{} already up to date", to);
                return Ok(PromoteOutcome::Unchanged { to });
            }
        }

        self.target.copy(&from, &to)?;
        log::info!("Copied {} to {}", from, to);
        Ok(PromoteOutcome::Copied { from, to })
    }

    fn check_required(&self) -> Result<()> {
        for variable in [vars::DB_USERNAME, vars::DB_DATABASE] {
            if !self.presets.is_resolved(variable) {
                return Err(Error::MissingRequiredInput {
                    variable: variable.to_string(),
                    example: format!("For example: provisioner.preset(\"{variable}\", \"bunny_prd\")"),
                });
            }
        }
        Ok(())
    }

    fn build(&mut self, ctx: &mut RenderContext, remote: &RemoteConfigState) -> Result<Vec<u8>> {
        self.run_step(Step::ResolvePasswords, ctx, remote)?;
        self.run_step(Step::AskForPasswords, ctx, remote)?;
        obtain(ctx, self.keys.as_ref())?;
        Ok(self.template.render(ctx)?)
    }

    fn run_step(
        &mut self,
        step: Step,
        ctx: &mut RenderContext,
        remote: &RemoteConfigState,
    ) -> Result<()> {
        let mut hook_ctx = HookContext {
            context: ctx,
            remote,
            input: self.input.as_mut(),
            application: &self.application,
        };

        self.hooks.run(step, Phase::Before, &mut hook_ctx)?;

        for resolver in &self.resolvers {
            match step {
                Step::ResolvePasswords => {
                    resolver.extract(hook_ctx.context, remote);
                }
                Step::AskForPasswords => {
                    resolver.ask(hook_ctx.context, &mut *hook_ctx.input, &self.application)?;
                }
            }
        }

        self.hooks.run(step, Phase::After, &mut hook_ctx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProviderError, RemoteIoError, RenderError, ResolveError};
    use crate::hooks::CredentialHook;
    use crate::input::{NonInteractive, ScriptedInput};
    use crate::keys::StaticKeySource;
    use crate::target::{LocalTarget, MemoryTarget};
    use tempfile::TempDir;

    const SHARED: &str = "/srv/blog/shared";
    const ARTIFACT: &str = "/srv/blog/shared/config/wp-config.php";
    const KEYS: &str = "define('AUTH_KEY', 'SALT_A...');\ndefine('NONCE_SALT', 'SALT_H...');\n";
    const EXISTING: &str = "<?php\ndefine('DB_PASSWORD', 'sw0rdfish');\r\n";

    struct Fixture {
        target: MemoryTarget,
        keys: StaticKeySource,
        input: ScriptedInput,
        provisioner: Provisioner,
    }

    fn fixture(target: MemoryTarget, answers: &[&str]) -> Fixture {
        let keys = StaticKeySource::new(KEYS);
        let input = ScriptedInput::new(answers.iter().copied());
        let layout = RemoteLayout::new(SHARED, "/srv/blog/current", "wp-config.php");

        let mut provisioner = Provisioner::new(
            Box::new(target.clone()),
            Box::new(keys.clone()),
            Box::new(input.clone()),
            "blog",
            layout,
        );
        provisioner
            .preset(vars::DB_USERNAME, "bunny_prd")
            .preset(vars::DB_DATABASE, "blog_production")
            .preset(vars::DB_ADAPTER, "mysql")
            .preset(vars::DB_HOST, "localhost");

        Fixture {
            target,
            keys,
            input,
            provisioner,
        }
    }

    fn published(target: &MemoryTarget) -> String {
        String::from_utf8(target.file(ARTIFACT).unwrap()).unwrap()
    }

    #[test]
    fn test_fresh_target_end_to_end() {
        let mut f = fixture(MemoryTarget::new(), &["secret123"]);

        let outcome = f.provisioner.provision(false).unwrap();

        match &outcome {
            Outcome::Published { path, variables } => {
                assert_eq!(path, ARTIFACT);
                assert!(variables.contains(&("db_password".to_string(), Origin::Prompted)));
                assert!(variables.contains(&("security_keys".to_string(), Origin::Generated)));
                assert!(variables.contains(&("db_username".to_string(), Origin::PreSet)));
            }
            Outcome::Skipped { .. } => panic!("Expected Published"),
        }

        let text = published(&f.target);
        assert!(text.contains("define('DB_PASSWORD', 'secret123');"));
        assert!(text.contains("define('DB_USER', 'bunny_prd');"));
        assert!(text.contains(KEYS));
        assert_eq!(
            f.input.prompts(),
            vec!["blog database password for bunny_prd@blog_production"]
        );
        assert_eq!(f.keys.calls(), 1);
        assert_eq!(
            f.target.operations(),
            vec![
                format!("exists {ARTIFACT}"),
                "mkdir /srv/blog/shared/config".to_string(),
                format!("write {ARTIFACT}"),
            ]
        );
    }

    #[test]
    fn test_existing_artifact_is_skipped() {
        let target = MemoryTarget::new().with_file(ARTIFACT, EXISTING);
        let mut f = fixture(target, &["secret123"]);

        let outcome = f.provisioner.provision(false).unwrap();

        assert_eq!(
            outcome,
            Outcome::Skipped {
                path: ARTIFACT.to_string()
            }
        );
        assert_eq!(f.target.write_count(), 0);
        assert_eq!(f.keys.calls(), 0);
        assert!(f.input.prompts().is_empty());
        assert_eq!(published(&f.target), EXISTING);
    }

    #[test]
    fn test_force_reuses_remote_password() {
        let target = MemoryTarget::new().with_file(ARTIFACT, EXISTING);
        let mut f = fixture(target, &[]);

        let outcome = f.provisioner.provision(true).unwrap();

        assert!(outcome.is_published());
        let text = published(&f.target);
        assert!(text.contains("define('DB_PASSWORD', 'sw0rdfish');"));
        assert!(f.input.prompts().is_empty());
        assert_eq!(f.keys.calls(), 1);
    }

    #[test]
    fn test_force_without_extractable_password_prompts() {
        let target = MemoryTarget::new().with_file(ARTIFACT, "<?php\n");
        let mut f = fixture(target, &["typed"]);

        f.provisioner.provision(true).unwrap();

        assert!(published(&f.target).contains("define('DB_PASSWORD', 'typed');"));
        assert_eq!(f.input.prompts().len(), 1);
    }

    #[test]
    fn test_preset_password_wins_over_remote() {
        let target = MemoryTarget::new().with_file(ARTIFACT, EXISTING);
        let mut f = fixture(target, &[]);
        f.provisioner.preset(vars::DB_PASSWORD, "from-env");

        f.provisioner.provision(true).unwrap();

        assert!(published(&f.target).contains("define('DB_PASSWORD', 'from-env');"));
    }

    #[test]
    fn test_preset_keys_are_not_regenerated() {
        let mut f = fixture(MemoryTarget::new(), &["secret123"]);
        f.provisioner
            .preset(vars::SECURITY_KEYS, "define('AUTH_KEY', 'kept');");

        f.provisioner.provision(false).unwrap();

        assert_eq!(f.keys.calls(), 0);
        assert!(published(&f.target).contains("define('AUTH_KEY', 'kept');"));
    }

    #[test]
    fn test_missing_username_fails_before_remote() {
        let target = MemoryTarget::new();
        let mut provisioner = Provisioner::new(
            Box::new(target.clone()),
            Box::new(StaticKeySource::new(KEYS)),
            Box::new(NonInteractive),
            "blog",
            RemoteLayout::new(SHARED, "/srv/blog/current", "wp-config.php"),
        );
        provisioner.preset(vars::DB_DATABASE, "blog_production");

        let err = provisioner.provision(false).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingRequiredInput { ref variable, .. } if variable == "db_username"
        ));
        assert!(target.operations().is_empty());
    }

    #[test]
    fn test_non_interactive_without_password_aborts() {
        let target = MemoryTarget::new();
        let mut provisioner = Provisioner::new(
            Box::new(target.clone()),
            Box::new(StaticKeySource::new(KEYS)),
            Box::new(NonInteractive),
            "blog",
            RemoteLayout::new(SHARED, "/srv/blog/current", "wp-config.php"),
        );
        provisioner
            .preset(vars::DB_USERNAME, "bunny_prd")
            .preset(vars::DB_DATABASE, "blog_production");

        let err = provisioner.provision(false).unwrap_err();
        assert!(matches!(
            err,
            Error::Resolve(ResolveError::NoValueAvailable { .. })
        ));
        assert_eq!(target.write_count(), 0);
    }

    #[test]
    fn test_key_generator_failure_publishes_nothing() {
        let target = MemoryTarget::new();
        let mut provisioner = Provisioner::new(
            Box::new(target.clone()),
            Box::new(StaticKeySource::unavailable()),
            Box::new(ScriptedInput::new(["secret123"])),
            "blog",
            RemoteLayout::new(SHARED, "/srv/blog/current", "wp-config.php"),
        );
        provisioner
            .preset(vars::DB_USERNAME, "bunny_prd")
            .preset(vars::DB_DATABASE, "blog_production")
            .preset(vars::DB_ADAPTER, "mysql")
            .preset(vars::DB_HOST, "localhost");

        let err = provisioner.provision(false).unwrap_err();
        assert!(matches!(
            err,
            Error::Provider(ProviderError::Unavailable { .. })
        ));
        assert_eq!(target.write_count(), 0);
    }

    #[test]
    fn test_template_mismatch_publishes_nothing() {
        let mut f = fixture(MemoryTarget::new(), &["secret123"]);
        f.provisioner
            .template(Template::new("custom", "{{ db_password }} {{ table_prefix }}"));

        let err = f.provisioner.provision(false).unwrap_err();
        assert!(matches!(
            err,
            Error::Render(RenderError::MissingVariable(ref name)) if name == "table_prefix"
        ));
        assert_eq!(f.target.write_count(), 0);
    }

    #[test]
    fn test_publish_failure_is_surfaced() {
        let target = MemoryTarget::new().failing_writes("Permission denied");
        let mut f = fixture(target, &["secret123"]);

        let err = f.provisioner.provision(false).unwrap_err();
        assert!(matches!(err, Error::Remote(RemoteIoError::CreateDir { .. })));
        assert!(err.to_string().contains("Permission denied"));
        assert!(f.target.file(ARTIFACT).is_none());
    }

    #[test]
    fn test_rerun_after_publish_is_a_no_op() {
        let mut f = fixture(MemoryTarget::new(), &["secret123"]);
        f.provisioner.provision(false).unwrap();
        let writes = f.target.write_count();

        let second = f.provisioner.provision(false).unwrap();
        assert!(!second.is_published());
        assert_eq!(f.target.write_count(), writes);
        assert_eq!(f.keys.calls(), 1);
    }

    #[test]
    fn test_extra_credential_through_hooks() {
        let target = MemoryTarget::new()
            .with_file(ARTIFACT, "define('DB_PASSWORD', 'a');\ndefine('CACHE_PASSWORD', 'b');\n");
        let mut f = fixture(target, &[]);
        let cache = Credential::new("cache_password", "CACHE_PASSWORD");
        f.provisioner
            .template(Template::new("custom", "{{ db_password }}/{{ cache_password }}"));
        f.provisioner
            .hooks_mut()
            .after(
                Step::ResolvePasswords,
                CredentialHook::extract(cache.clone()).unwrap(),
            )
            .after(Step::AskForPasswords, CredentialHook::ask(cache).unwrap());

        f.provisioner.provision(true).unwrap();

        assert_eq!(published(&f.target), "a/b");
    }

    fn sealed_vault(_: &mut HookContext<'_>) -> anyhow::Result<()> {
        anyhow::bail!("vault sealed")
    }

    #[test]
    fn test_failing_hook_aborts_before_keys() {
        let mut f = fixture(MemoryTarget::new(), &["secret123"]);
        f.provisioner
            .hooks_mut()
            .after(Step::ResolvePasswords, sealed_vault);

        let err = f.provisioner.provision(false).unwrap_err();
        assert!(matches!(err, Error::Hook { index: 0, .. }));
        assert!(err.to_string().contains("vault sealed"));
        assert!(f.input.prompts().is_empty());
        assert_eq!(f.keys.calls(), 0);
        assert_eq!(f.target.write_count(), 0);
    }

    #[test]
    fn test_hook_prompts_come_first() {
        let mut f = fixture(MemoryTarget::new(), &["secret123"]);
        f.provisioner.hooks_mut().before(
            Step::ResolvePasswords,
            CredentialHook::ask(Credential::new("api_token", "API_TOKEN")).unwrap(),
        );
        // The hook takes the only answer, leaving none for the database password
        let err = f.provisioner.provision(false).unwrap_err();
        assert!(matches!(
            err,
            Error::Resolve(ResolveError::NoValueAvailable { ref variable }) if variable == "db_password"
        ));
        assert_eq!(f.keys.calls(), 0);
        assert_eq!(f.target.write_count(), 0);
    }

    #[test]
    fn test_resolve_passwords_only_extracts() {
        let target = MemoryTarget::new().with_file(ARTIFACT, EXISTING);
        let mut f = fixture(target, &["unused"]);

        let ctx = f.provisioner.resolve_passwords().unwrap();

        assert_eq!(ctx.get("db_password"), Some("sw0rdfish"));
        assert!(f.input.prompts().is_empty());
        assert_eq!(f.target.write_count(), 0);
    }

    #[test]
    fn test_ask_for_passwords_only_prompts() {
        let target = MemoryTarget::new().with_file(ARTIFACT, EXISTING);
        let mut f = fixture(target, &["typed"]);

        let ctx = f.provisioner.ask_for_passwords().unwrap();

        let var = ctx.variable("db_password").unwrap();
        assert_eq!(var.value, "typed");
        assert_eq!(var.origin, Origin::Prompted);
        assert!(f.target.operations().is_empty());
    }

    #[test]
    fn test_preview_does_not_write() {
        let target = MemoryTarget::new().with_file(ARTIFACT, EXISTING);
        let mut f = fixture(target, &[]);

        let remote = f.provisioner.probe().unwrap();
        let preview = f.provisioner.preview(remote).unwrap();

        assert!(preview.remote.exists);
        assert!(String::from_utf8(preview.rendered).unwrap().contains("sw0rdfish"));
        assert_eq!(f.target.write_count(), 0);
    }

    #[test]
    fn test_promote_copies_then_reports_unchanged() {
        let target = MemoryTarget::new()
            .with_file(ARTIFACT, "published")
            .with_dir("/srv/blog/current/public");
        let f = fixture(target, &[]);

        let first = f.provisioner.promote().unwrap();
        assert_eq!(
            first,
            PromoteOutcome::Copied {
                from: ARTIFACT.to_string(),
                to: "/srv/blog/current/public/wp-config.php".to_string(),
            }
        );
        assert_eq!(
            f.target.file("/srv/blog/current/public/wp-config.php"),
            Some(b"published".to_vec())
        );

        let second = f.provisioner.promote().unwrap();
        assert!(matches!(second, PromoteOutcome::Unchanged { .. }));
        assert_eq!(f.keys.calls(), 0);
        assert!(f.input.prompts().is_empty());
    }

    #[test]
    fn test_promote_without_artifact_fails() {
        let f = fixture(MemoryTarget::new(), &[]);
        let err = f.provisioner.promote().unwrap_err();
        assert!(matches!(err, Error::ArtifactMissing { .. }));
    }

    #[test]
    fn test_replacing_the_default_credential() {
        let target = MemoryTarget::new().with_file(ARTIFACT, "$db_password = 'legacy';\n");
        let mut f = fixture(target, &[]);
        f.provisioner
            .credential(
                Credential::db_password().with_pattern(r"^\$db_password = '(.*)';$"),
            )
            .unwrap();

        f.provisioner.provision(true).unwrap();
        assert!(published(&f.target).contains("define('DB_PASSWORD', 'legacy');"));
    }

    #[test]
    fn test_local_target_end_to_end() {
        let temp = TempDir::new().unwrap();
        let shared = temp.path().join("shared").to_string_lossy().to_string();
        let current = temp.path().join("current").to_string_lossy().to_string();
        std::fs::create_dir_all(temp.path().join("current/public")).unwrap();

        let layout = RemoteLayout::new(&shared, &current, "wp-config.php");
        let mut provisioner = Provisioner::new(
            Box::new(LocalTarget::new()),
            Box::new(StaticKeySource::new(KEYS)),
            Box::new(ScriptedInput::new(["secret123"])),
            "blog",
            layout.clone(),
        );
        provisioner
            .preset(vars::DB_USERNAME, "bunny_prd")
            .preset(vars::DB_DATABASE, "blog_production")
            .preset(vars::DB_ADAPTER, "mysql")
            .preset(vars::DB_HOST, "localhost");

        assert!(provisioner.provision(false).unwrap().is_published());
        assert!(!provisioner.provision(false).unwrap().is_published());
        provisioner.promote().unwrap();

        let released = std::fs::read_to_string(layout.release_artifact()).unwrap();
        assert!(released.contains("define('DB_PASSWORD', 'secret123');"));
    }
}
