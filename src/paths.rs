//! Path resolution for confseed
//!
//! # Config File Resolution Priority
//!
//! 1. `--config <file>` (or `CONFSEED_CONFIG`, handled by clap)
//! 2. `./confseed.toml` in the working directory
//!
//! Every path taken from the command line or the config file goes through
//! [`expand`], so `~` and `$VAR` work everywhere.

use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE: &str = "confseed.toml";

/// Environment variable for config file override
pub const ENV_CONFIG: &str = "CONFSEED_CONFIG";

/// Locate the deployment config file
pub fn config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    config_file_in(explicit, Path::new("."))
}

fn config_file_in(explicit: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    if let Some(path) = explicit {
        let path = expand(&path.to_string_lossy());
        log::debug!("Using config file: {}", path.display());
        return Ok(path);
    }

    let default = cwd.join(CONFIG_FILE);
    if default.is_file() {
        log::debug!("Using config file from working directory");
        return Ok(default);
    }

    bail!(
        "No {} found in the working directory\n\nPass --config <file> or set {}",
        CONFIG_FILE,
        ENV_CONFIG
    )
}

/// Expand a path string with tilde and environment variable expansion
///
/// Unknown variables are left unchanged.
///
/// # Examples
///
/// ```ignore
/// let path = paths::expand("~/sites/blog/confseed.toml");
/// let shared = paths::expand("$DEPLOY_ROOT/shared");
/// ```
pub fn expand(path: &str) -> PathBuf {
    PathBuf::from(expand_str(path))
}

/// String form of [`expand`], for remote paths that never touch the local
/// filesystem
pub fn expand_str(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or(std::borrow::Cow::Borrowed(path))
        .into_owned()
}

// ============================================================================
// Tests
// ============================================================================
