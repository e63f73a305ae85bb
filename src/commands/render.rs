//! `confseed render` - render the configuration without reading the target
//!
//! Nothing is extracted from the target; every secret is pre-set, prompted
//! or generated.

use crate::Context;
use crate::ui;
use anyhow::{Context as _, Result};
use provision::RemoteConfigState;
use std::fs;
use std::io::Write;
use std::path::Path;

pub fn run(ctx: &Context, output: Option<&Path>) -> Result<()> {
    let config = super::load_config(ctx)?;
    let mut provisioner = super::provisioner(ctx, &config)?;

    let remote = RemoteConfigState::absent(&provisioner.layout().shared_artifact());
    let preview = provisioner.preview(remote)?;

    match output {
        Some(path) => {
            write_private(path, &preview.rendered)
                .with_context(|| format!("Could not write {}", path.display()))?;
            if !ctx.quiet {
                ui::success(&format!("Rendered {}", path.display()));
            }
        }
        None => {
            std::io::stdout()
                .write_all(&preview.rendered)
                .context("Could not write to stdout")?;
        }
    }
    Ok(())
}

/// Write a file readable by owner and group only
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o640);
    }
    options.open(path)?.write_all(contents)
}
