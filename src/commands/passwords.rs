//! `confseed resolve-passwords` and `confseed ask-for-passwords`
//!
//! Run one password step with its hooks and report where each value came
//! from. Values themselves are never printed.

use crate::Context;
use crate::ui;
use anyhow::Result;
use provision::RenderContext;

pub fn resolve(ctx: &Context) -> Result<()> {
    let config = super::load_config(ctx)?;
    let mut provisioner = super::provisioner(ctx, &config)?;
    let secrets = super::secret_variables(&provisioner, &config);

    let resolved = provisioner.resolve_passwords()?;
    report(ctx, "Recovered from the existing configuration", &resolved, &secrets);
    Ok(())
}

pub fn ask(ctx: &Context) -> Result<()> {
    let config = super::load_config(ctx)?;
    let mut provisioner = super::provisioner(ctx, &config)?;
    let secrets = super::secret_variables(&provisioner, &config);

    let resolved = provisioner.ask_for_passwords()?;
    report(ctx, "Passwords", &resolved, &secrets);
    Ok(())
}

fn report(ctx: &Context, title: &str, resolved: &RenderContext, secrets: &[String]) {
    if ctx.quiet {
        return;
    }

    ui::header(title);
    for line in summarize(resolved, secrets) {
        println!("{line}");
    }
}

/// One line per secret: its origin, or that it is still missing
fn summarize(resolved: &RenderContext, secrets: &[String]) -> Vec<String> {
    secrets
        .iter()
        .map(|name| match resolved.variable(name) {
            Some(var) => format!("  {name}: {}", var.origin),
            None => format!("  {name}: unresolved"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use provision::Origin;

    #[test]
    fn test_summarize_never_shows_values() {
        let mut resolved = RenderContext::new();
        resolved.set_if_unset("db_password", "sw0rdfish", Origin::ExtractedRemote);

        let lines = summarize(
            &resolved,
            &["db_password".to_string(), "cache_password".to_string()],
        );

        assert_eq!(
            lines,
            vec![
                "  db_password: extracted from remote".to_string(),
                "  cache_password: unresolved".to_string(),
            ]
        );
        assert!(lines.iter().all(|l| !l.contains("sw0rdfish")));
    }
}
