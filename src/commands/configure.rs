//! `confseed configure` - publish the configuration once per lineage

use crate::Context;
use crate::cli::ConfigureArgs;
use crate::ui;
use anyhow::Result;
use colored::Colorize;
use provision::{Outcome, Preview, Provisioner, RenderContext, StaticKeySource};

/// Stands in for the key block during a dry run
const DRY_RUN_KEYS: &str =
    "/* Security keys are generated when the configuration is published */";

pub fn run(ctx: &Context, args: ConfigureArgs) -> Result<()> {
    let config = super::load_config(ctx)?;

    if args.dry_run {
        let keys = StaticKeySource::new(DRY_RUN_KEYS);
        let mut provisioner = super::provisioner_with_keys(ctx, &config, Box::new(keys))?;
        let secrets = super::secret_variables(&provisioner, &config);
        return dry_run(ctx, &mut provisioner, args.force, &secrets);
    }

    let mut provisioner = super::provisioner(ctx, &config)?;

    match provisioner.provision(args.force)? {
        Outcome::Published { path, variables } => {
            ui::success(&format!("Published {path}"));
            if args.force {
                ui::warn("Re-provisioned with --force; run `confseed promote` to update the release");
            }
            if ctx.verbose > 0 {
                for (name, origin) in variables {
                    ui::kv(&name, &origin.to_string());
                }
            }
        }
        Outcome::Skipped { path } => {
            if !ctx.quiet {
                ui::info(&format!("{path} already exists, keeping it"));
                ui::dim("Use --force (or CONFSEED_FORCE=1) to re-provision");
            }
        }
    }
    Ok(())
}

fn dry_run(
    ctx: &Context,
    provisioner: &mut Provisioner,
    force: bool,
    secrets: &[String],
) -> Result<()> {
    let remote = provisioner.probe()?;
    if remote.exists && !force {
        ui::info(&format!("{} already exists, nothing to do", remote.path));
        return Ok(());
    }

    let preview = provisioner.preview(remote)?;
    print_preview(ctx, &preview, secrets);
    Ok(())
}

fn print_preview(ctx: &Context, preview: &Preview, secrets: &[String]) {
    let rendered = mask_secrets(&String::from_utf8_lossy(&preview.rendered), &preview.context, secrets);

    ui::header(&format!("Would publish {}", preview.remote.path));
    for var in preview.context.iter() {
        ui::kv(&var.name, &var.origin.to_string());
    }
    println!();

    match &preview.remote.raw_content {
        Some(existing) => {
            let existing =
                mask_secrets(&String::from_utf8_lossy(existing), &preview.context, secrets);
            let changes = diff_lines(&existing, &rendered);
            if changes.is_empty() {
                ui::info("No changes");
            }
            for line in changes {
                match line.chars().next() {
                    Some('-') => println!("    {}", line.red()),
                    _ => println!("    {}", line.green()),
                }
            }
        }
        None if ctx.verbose > 0 => {
            for line in rendered.lines() {
                println!("    {}", format!("+ {line}").green());
            }
        }
        None => ui::dim("New file (run with -v to show it)"),
    }

    println!();
    ui::dim("Dry run: nothing was written");
}

/// Replace every resolved secret value with a mask
fn mask_secrets(text: &str, context: &RenderContext, secrets: &[String]) -> String {
    let mut values: Vec<&str> = secrets
        .iter()
        .filter_map(|name| context.get(name))
        .collect();
    // Longest first so a secret containing another is masked whole
    values.sort_by_key(|v| std::cmp::Reverse(v.len()));

    let mut masked = text.to_string();
    for value in values {
        masked = masked.replace(value, &ui::mask(value));
    }
    masked
}

/// Changed lines between two texts, prefixed with `-` or `+`
fn diff_lines(old: &str, new: &str) -> Vec<String> {
    let diff = similar::TextDiff::from_lines(old, new);
    diff.iter_all_changes()
        .filter_map(|change| {
            let line = change.value().trim_end_matches(['\r', '\n']);
            match change.tag() {
                similar::ChangeTag::Delete => Some(format!("- {line}")),
                similar::ChangeTag::Insert => Some(format!("+ {line}")),
                similar::ChangeTag::Equal => None,
            }
        })
        .collect()
}
