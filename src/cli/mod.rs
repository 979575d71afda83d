pub mod handlers;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "deployer", author, version, about, long_about = None)]
pub struct Cli {
    /// Only print warnings and errors
    #[arg(long, global = true)]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Configure the repository to watch and the command to run
    Setup(SetupArgs),

    /// Clone, deploy once, then redeploy on every change
    Start {
        /// Capture and print the command output
        #[arg(long)]
        verbose: bool,
    },

    /// Forget the current configuration
    Reset {
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Print the current configuration
    Configs,

    Version,
}

/// Values missing on the command line are prompted for.
#[derive(Args, Debug, Clone, Default)]
pub struct SetupArgs {
    /// Git repository URL to watch
    #[arg(long)]
    pub git_url: Option<String>,

    /// Shell command run inside the checkout
    #[arg(long = "command")]
    pub execute_command: Option<String>,

    #[arg(long)]
    pub track_commits: Option<bool>,

    #[arg(long)]
    pub track_tags: Option<bool>,

    /// Minutes between two checks
    #[arg(long)]
    pub sleep_interval: Option<u64>,

    /// Clone and run the command once when setup completes
    #[arg(long)]
    pub run_after_setup: Option<bool>,

    /// Refuse to run the command without root privileges
    #[arg(long)]
    pub require_privileged: Option<bool>,

    /// Never prompt, use defaults for missing values
    #[arg(long)]
    pub no_input: bool,
}
