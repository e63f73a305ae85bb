//! Core types for provisioning

use crate::error::RemoteIoError;
use crate::target::RemoteTarget;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Variable names every template may rely on.
pub mod vars {
    pub const DB_USERNAME: &str = "db_username";
    pub const DB_PASSWORD: &str = "db_password";
    pub const DB_ADAPTER: &str = "db_adapter";
    pub const DB_HOST: &str = "db_host";
    pub const DB_DATABASE: &str = "db_database";
    pub const SECURITY_KEYS: &str = "security_keys";

    /// Variables the built-in template consumes.
    pub const REQUIRED: [&str; 6] = [
        DB_USERNAME,
        DB_PASSWORD,
        DB_ADAPTER,
        DB_HOST,
        DB_DATABASE,
        SECURITY_KEYS,
    ];
}

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Supplied through configuration or the environment
    PreSet,
    /// Recovered from the previously published artifact
    ExtractedRemote,
    /// Entered by the operator
    Prompted,
    /// Freshly generated
    Generated,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::PreSet => "pre-set",
            Self::ExtractedRemote => "extracted from remote",
            Self::Prompted => "prompted",
            Self::Generated => "generated",
        };
        f.write_str(label)
    }
}

/// A named value and its provenance
#[derive(Clone, PartialEq, Eq)]
pub struct ConfigVariable {
    pub name: String,
    pub value: String,
    pub origin: Origin,
}

// Values are secrets more often than not.
impl fmt::Debug for ConfigVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigVariable")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .field("origin", &self.origin)
            .finish()
    }
}

/// Resolved variables for one run, in insertion order
///
/// A variable with a non-empty value is never overwritten within the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    vars: Vec<ConfigVariable>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a variable
    pub fn variable(&self, name: &str) -> Option<&ConfigVariable> {
        self.vars.iter().find(|v| v.name == name)
    }

    /// Look up a non-empty value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.variable(name)
            .map(|v| v.value.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Whether the variable already has a non-empty value
    pub fn is_resolved(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set a value unless one is already resolved
    ///
    /// Returns `true` if the value was stored. Empty values are never stored.
    pub fn set_if_unset(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        origin: Origin,
    ) -> bool {
        let name = name.into();
        let value = value.into();

        if value.is_empty() || self.is_resolved(&name) {
            return false;
        }

        match self.vars.iter_mut().find(|v| v.name == name) {
            Some(existing) => {
                existing.value = value;
                existing.origin = origin;
            }
            None => self.vars.push(ConfigVariable {
                name,
                value,
                origin,
            }),
        }
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigVariable> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Names and origins, without values
    pub fn origins(&self) -> Vec<(String, Origin)> {
        self.vars
            .iter()
            .map(|v| (v.name.clone(), v.origin))
            .collect()
    }
}

/// The remote artifact as observed once at the start of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfigState {
    pub exists: bool,
    pub path: String,
    pub raw_content: Option<Vec<u8>>,
}

impl RemoteConfigState {
    /// Probe the target for the artifact and read it if present
    pub fn probe(target: &dyn RemoteTarget, path: &str) -> Result<Self, RemoteIoError> {
        if !target.exists(path)? {
            log::debug!("{} not found on {}", path, target.describe());
            return Ok(Self::absent(path));
        }

        let content = target.read(path)?;
        log::debug!(
            "Found {} on {} ({} bytes)",
            path,
            target.describe(),
            content.len()
        );
        Ok(Self {
            exists: true,
            path: path.to_string(),
            raw_content: Some(content),
        })
    }

    /// State for a target with no artifact
    pub fn absent(path: &str) -> Self {
        Self {
            exists: false,
            path: path.to_string(),
            raw_content: None,
        }
    }
}

/// Opaque block of generated key definitions
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKeySet(String);

impl SecretKeySet {
    /// Wrap key material, rejecting blank input
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for SecretKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKeySet(<{} bytes>)", self.0.len())
    }
}

/// A secret to resolve: its variable and how to find it in the old artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Template variable (e.g. `db_password`)
    pub variable: String,
    /// Constant name in `define('<CONST>', '<value>');`
    pub constant: String,
    /// Prompt shown to the operator
    #[serde(default)]
    pub prompt: Option<String>,
    /// Full extraction regex with one capture group, replacing `constant`
    #[serde(default)]
    pub pattern: Option<String>,
}

impl Credential {
    pub fn new(variable: impl Into<String>, constant: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            constant: constant.into(),
            prompt: None,
            pattern: None,
        }
    }

    /// The database password credential every deployment needs
    pub fn db_password() -> Self {
        Self::new(vars::DB_PASSWORD, "DB_PASSWORD")
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Prompt text naming the application and target database
    pub fn prompt_text(&self, application: &str, ctx: &RenderContext) -> String {
        if let Some(prompt) = &self.prompt {
            return prompt.clone();
        }

        let label = if self.variable == vars::DB_PASSWORD {
            "database password".to_string()
        } else {
            self.variable.replace('_', " ")
        };
        let user = ctx.get(vars::DB_USERNAME).unwrap_or("?");
        let database = ctx.get(vars::DB_DATABASE).unwrap_or("?");
        format!("{application} {label} for {user}@{database}")
    }
}

/// Where the artifact lives on the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLayout {
    shared_path: String,
    release_path: String,
    artifact_name: String,
}

impl RemoteLayout {
    pub fn new(
        shared_path: impl Into<String>,
        release_path: impl Into<String>,
        artifact_name: impl Into<String>,
    ) -> Self {
        Self {
            shared_path: trim_root(shared_path.into()),
            release_path: trim_root(release_path.into()),
            artifact_name: artifact_name.into(),
        }
    }

    pub fn artifact_name(&self) -> &str {
        &self.artifact_name
    }

    /// `<shared_path>/config`
    pub fn shared_config_dir(&self) -> String {
        format!("{}/config", self.shared_path)
    }

    /// `<shared_path>/config/<artifact_name>`
    pub fn shared_artifact(&self) -> String {
        format!("{}/{}", self.shared_config_dir(), self.artifact_name)
    }

    /// `<release_path>/public/<artifact_name>`
    pub fn release_artifact(&self) -> String {
        format!("{}/public/{}", self.release_path, self.artifact_name)
    }
}

fn trim_root(path: String) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() && path.starts_with('/') {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// Result of a provisioning run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Artifact written; lists where every variable came from
    Published {
        path: String,
        variables: Vec<(String, Origin)>,
    },
    /// Artifact already present and no force override
    Skipped { path: String },
}

impl Outcome {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Published { path, .. } => write!(f, "published {path}"),
            Self::Skipped { path } => write!(f, "{path} already exists, skipping"),
        }
    }
}

/// Result of copying the shared artifact into the release
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromoteOutcome {
    Copied { from: String, to: String },
    /// Release copy already matches the shared artifact
    Unchanged { to: String },
}
