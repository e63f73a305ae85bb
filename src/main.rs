mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod prompt;
mod ssh;
mod ui;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config: Option<PathBuf>,
    pub non_interactive: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
        non_interactive: cli.non_interactive,
    };

    let result = match cli.command {
        Command::Configure(args) => commands::configure::run(&ctx, args),
        Command::Promote => commands::promote::run(&ctx),
        Command::ResolvePasswords => commands::passwords::resolve(&ctx),
        Command::AskForPasswords => commands::passwords::ask(&ctx),
        Command::Render { output } => commands::render::run(&ctx, output.as_deref()),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "confseed", &mut io::stdout());
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

/// Print an error with its cause chain and, for provisioning errors, a hint
fn report(err: &anyhow::Error) {
    ui::error(&format!("{err:#}"));
    if let Some(provision_err) = err.downcast_ref::<provision::Error>() {
        ui::dim(provision_err.advice());
    }
}
