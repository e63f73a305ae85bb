use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "confseed")]
#[command(version)]
#[command(
    about = "Provision wp-config.php once per deployment and keep its secrets across redeploys",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Deployment configuration file
    #[arg(short, long, global = true, env = "CONFSEED_CONFIG")]
    pub config: Option<PathBuf>,

    /// Never prompt; fail when a secret cannot be resolved otherwise
    #[arg(
        long,
        global = true,
        env = "CONFSEED_NON_INTERACTIVE",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub non_interactive: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Publish the configuration to the shared path unless it already exists
    Configure(ConfigureArgs),

    /// Copy the published configuration into the current release
    Promote,

    /// Show which secrets can be recovered from the existing configuration
    ResolvePasswords,

    /// Prompt for secrets that are not pre-set
    AskForPasswords,

    /// Render the configuration locally without touching the target
    Render {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct ConfigureArgs {
    /// Re-provision even if the configuration already exists
    #[arg(
        short,
        long,
        env = "CONFSEED_FORCE",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub force: bool,

    /// Show what would be published without writing anything
    ///
    /// The target is still read and unresolved passwords are still prompted
    /// for. The key generator is not contacted; a placeholder is shown instead.
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}
