pub mod configure;
pub mod passwords;
pub mod promote;
pub mod render;

use crate::Context;
use crate::config::DeployConfig;
use crate::paths;
use crate::progress::SpinnerKeySource;
use crate::prompt;
use crate::ssh::SshTarget;
use anyhow::{Context as _, Result};
use provision::{
    CredentialHook, HttpKeySource, KeySource, LocalTarget, Provisioner, RemoteTarget, SecretInput,
    Step, Template, vars,
};
use std::fs;

/// Load, override and validate the deployment config
pub fn load_config(ctx: &Context) -> Result<DeployConfig> {
    let config = read_config(ctx)?;
    config.validate()?;
    Ok(config)
}

/// Load and override the deployment config without checking the database
/// identity, for commands that never render
pub fn read_config(ctx: &Context) -> Result<DeployConfig> {
    let path = paths::config_file(ctx.config.as_deref())?;
    let config = DeployConfig::load(&path)?;
    log::debug!(
        "Loaded {} ({} {})",
        path.display(),
        config.application,
        config.deploy_env
    );
    Ok(config)
}

/// SSH when a host is configured, the local filesystem otherwise
pub fn target(config: &DeployConfig) -> Box<dyn RemoteTarget> {
    match &config.target.host {
        Some(host) => {
            let mut ssh = SshTarget::new(host, config.target.ssh_options.clone());
            if let Some(program) = &config.target.ssh_command {
                ssh = ssh.with_program(paths::expand(program));
            }
            Box::new(ssh)
        }
        None => {
            log::info!("No target host configured, using the local filesystem");
            Box::new(LocalTarget::new())
        }
    }
}

/// Provisioner wired to the configured target, generator and terminal
pub fn provisioner(ctx: &Context, config: &DeployConfig) -> Result<Provisioner> {
    let keys = SpinnerKeySource::new(
        HttpKeySource::new(&config.keys.endpoint, config.key_timeout()),
        ctx.quiet,
    );
    provisioner_with_keys(ctx, config, Box::new(keys))
}

/// Like [`provisioner`], with another key source
pub fn provisioner_with_keys(
    ctx: &Context,
    config: &DeployConfig,
    keys: Box<dyn KeySource>,
) -> Result<Provisioner> {
    build(
        config,
        target(config),
        keys,
        prompt::select(ctx.non_interactive),
    )
}

fn build(
    config: &DeployConfig,
    target: Box<dyn RemoteTarget>,
    keys: Box<dyn KeySource>,
    input: Box<dyn SecretInput>,
) -> Result<Provisioner> {
    let mut provisioner = Provisioner::new(target, keys, input, &config.application, config.layout());

    if let Some(path) = config.template_path() {
        let source = fs::read_to_string(&path)
            .with_context(|| format!("Could not read template {}", path.display()))?;
        provisioner.template(Template::new(path.display().to_string(), source));
    }

    for (name, value) in config.presets() {
        provisioner.preset(&name, &value);
    }

    for credential in &config.credentials {
        if credential.variable == vars::DB_PASSWORD {
            provisioner.credential(credential.clone())?;
            continue;
        }
        provisioner
            .hooks_mut()
            .after(
                Step::ResolvePasswords,
                CredentialHook::extract(credential.clone())?,
            )
            .after(
                Step::AskForPasswords,
                CredentialHook::ask(credential.clone())?,
            );
    }

    Ok(provisioner)
}

/// Names of every secret the provisioner may resolve
pub fn secret_variables(provisioner: &Provisioner, config: &DeployConfig) -> Vec<String> {
    let mut names = provisioner.secret_variables();
    for credential in &config.credentials {
        if !names.contains(&credential.variable) {
            names.push(credential.variable.clone());
        }
    }
    names
}
