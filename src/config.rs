//! Deployment configuration (`confseed.toml`)
//!
//! One file describes one deployment lineage: where the shared and release
//! paths live, how to reach the target, the database identity and any extra
//! secrets. Selected values can be overridden from the environment so CI can
//! inject secrets without writing them to disk.

use crate::paths;
use anyhow::{Context, Result};
use provision::{Credential, DEFAULT_KEY_ENDPOINT, RemoteLayout, vars};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variables that override config values
pub const ENV_DB_USERNAME: &str = "CONFSEED_DB_USERNAME";
pub const ENV_DB_PASSWORD: &str = "CONFSEED_DB_PASSWORD";
pub const ENV_SECURITY_KEYS: &str = "CONFSEED_SECURITY_KEYS";
pub const ENV_DEPLOY_ENV: &str = "CONFSEED_DEPLOY_ENV";
pub const ENV_HOST: &str = "CONFSEED_HOST";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    pub application: String,
    #[serde(default = "default_deploy_env")]
    pub deploy_env: String,
    #[serde(default = "default_artifact_name")]
    pub artifact_name: String,
    pub shared_path: String,
    pub release_path: String,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub template: TemplateConfig,
    /// Extra secret sets, resolved through hooks
    #[serde(default)]
    pub credentials: Vec<Credential>,
    /// Extra template variables
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// `user@host` for SSH; local filesystem when absent
    pub host: Option<String>,
    #[serde(default)]
    pub ssh_options: Vec<String>,
    /// Client binary; `ssh` from PATH when absent
    pub ssh_command: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub username: Option<String>,
    #[serde(default = "default_adapter")]
    pub adapter: String,
    #[serde(default = "default_db_host")]
    pub host: String,
    /// Defaults to `<application>_<deploy_env>`
    pub database: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            username: None,
            adapter: default_adapter(),
            host: default_db_host(),
            database: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeysConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Pre-generated key block
    pub value: Option<String>,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            value: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateConfig {
    pub path: Option<String>,
}

fn default_deploy_env() -> String {
    "production".to_string()
}

fn default_artifact_name() -> String {
    "wp-config.php".to_string()
}

fn default_adapter() -> String {
    "mysql".to_string()
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_endpoint() -> String {
    DEFAULT_KEY_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl DeployConfig {
    /// Load from a TOML file and apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let mut config = Self::parse(&content)
            .with_context(|| format!("Invalid config format in {}", path.display()))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from `lookup` (the process environment in production)
    ///
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(username) = get(ENV_DB_USERNAME) {
            self.database.username = Some(username);
        }
        if let Some(password) = get(ENV_DB_PASSWORD) {
            log::debug!("Database password pre-set from {}", ENV_DB_PASSWORD);
            self.database.password = Some(password);
        }
        if let Some(keys) = get(ENV_SECURITY_KEYS) {
            log::debug!("Key block pre-set from {}", ENV_SECURITY_KEYS);
            self.keys.value = Some(keys);
        }
        if let Some(env) = get(ENV_DEPLOY_ENV) {
            self.deploy_env = env;
        }
        if let Some(host) = get(ENV_HOST) {
            self.target.host = Some(host);
        }
    }

    /// Check mandatory identifiers before any remote interaction
    pub fn validate(&self) -> Result<(), provision::Error> {
        if self.application.trim().is_empty() {
            return Err(provision::Error::MissingRequiredInput {
                variable: "application".to_string(),
                example: "Set it at the top of confseed.toml:\n\n  application = \"blog\""
                    .to_string(),
            });
        }

        let username = self.database.username.as_deref().unwrap_or_default();
        if username.trim().is_empty() {
            return Err(provision::Error::MissingRequiredInput {
                variable: vars::DB_USERNAME.to_string(),
                example: format!(
                    "Add it to confseed.toml:\n\n  [database]\n  username = \"bunny_prd\"\n\nor set {ENV_DB_USERNAME}"
                ),
            });
        }
        Ok(())
    }

    /// Database name, derived from application and environment unless set
    pub fn database_name(&self) -> String {
        self.database
            .database
            .clone()
            .unwrap_or_else(|| format!("{}_{}", self.application, self.deploy_env))
    }

    pub fn layout(&self) -> RemoteLayout {
        RemoteLayout::new(
            paths::expand_str(&self.shared_path),
            paths::expand_str(&self.release_path),
            self.artifact_name.clone(),
        )
    }

    /// Values known before any remote interaction, in precedence order
    pub fn presets(&self) -> Vec<(String, String)> {
        let mut presets = vec![
            (
                vars::DB_USERNAME.to_string(),
                self.database.username.clone().unwrap_or_default(),
            ),
            (vars::DB_ADAPTER.to_string(), self.database.adapter.clone()),
            (vars::DB_HOST.to_string(), self.database.host.clone()),
            (vars::DB_DATABASE.to_string(), self.database_name()),
        ];
        if let Some(password) = &self.database.password {
            presets.push((vars::DB_PASSWORD.to_string(), password.clone()));
        }
        if let Some(keys) = &self.keys.value {
            presets.push((vars::SECURITY_KEYS.to_string(), keys.clone()));
        }
        for (name, value) in &self.vars {
            if vars::REQUIRED.contains(&name.as_str()) {
                log::warn!("Ignoring [vars].{name}: set it in its own section");
                continue;
            }
            presets.push((name.clone(), value.clone()));
        }
        presets
    }

    pub fn template_path(&self) -> Option<PathBuf> {
        self.template.path.as_deref().map(paths::expand)
    }

    pub fn key_timeout(&self) -> Duration {
        Duration::from_secs(self.keys.timeout_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================
