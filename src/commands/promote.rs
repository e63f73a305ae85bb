//! `confseed promote` - copy the shared configuration into the release

use crate::Context;
use crate::ui;
use anyhow::Result;
use provision::PromoteOutcome;

pub fn run(ctx: &Context) -> Result<()> {
    // Copying needs only the layout, not the database identity
    let config = super::read_config(ctx)?;
    let provisioner = super::provisioner(ctx, &config)?;

    match provisioner.promote()? {
        PromoteOutcome::Copied { from, to } => {
            ui::success(&format!("Copied {from} to {to}"));
        }
        PromoteOutcome::Unchanged { to } => {
            if !ctx.quiet {
                ui::info(&format!("{to} is already up to date"));
            }
        }
    }
    Ok(())
}
